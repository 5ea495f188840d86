//! CLI command handler: `sum` prints per-file digests, `du` prints totals. Ctrl-C cancels both.

use anyhow::{Context, Result};
use log::debug;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::Opts;
use crate::du::disk_usage;
use crate::engine::arg_parser::{Cli, Commands, CommonArgs};
use crate::engine::progress::{du_progress, sum_progress};
use crate::engine::tools::{digest_hex, format_usage};
use crate::pipeline::CancelToken;
use crate::sum::sum_tree;
use crate::utils::setup_logging;
use crate::utils::treesum_toml::{apply_file_to_opts, load_treesum_toml};

/// Overwrite opts field from CLI when the flag was given.
macro_rules! apply_cli_opt {
    ($args:expr, $opts:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(v) = $args.$field {
                $opts.$field = v;
            }
        )+
    };
}

/// Defaults, then `.treesum.toml`, then CLI flags. A malformed config file fails the run.
fn setup_opts(cli: &Cli) -> Result<Opts> {
    let mut opts = Opts::default();
    if let Some(file) = load_treesum_toml(&cli.config_dir())? {
        apply_file_to_opts(&file, &mut opts);
    }
    let common: &CommonArgs = cli.common();
    apply_cli_opt!(
        common,
        opts,
        verbose,
        workers,
        open_files,
        follow_links,
        tick_ms,
        json
    );
    if !common.exclude.is_empty() {
        opts.exclude = common.exclude.clone();
    }
    match &cli.command {
        Commands::Sum { strategy, .. } => {
            if let Some(s) = strategy {
                opts.strategy = *s;
            }
        }
        Commands::Du { strict, .. } => {
            if let Some(s) = strict {
                opts.strict = *s;
            }
        }
    }
    setup_logging(opts.verbose);
    Ok(opts)
}

/// Token canceled by Ctrl-C.
fn cancel_on_ctrlc() -> Result<CancelToken> {
    let token = CancelToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        log::warn!("Interrupted; canceling");
        handler_token.cancel();
    })
    .context("set Ctrl+C handler")?;
    Ok(token)
}

/// Run the selected subcommand.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli)?;
    debug!("{} CONFIG:{:#?}", env!("CARGO_PKG_NAME").to_uppercase(), opts);
    let token = cancel_on_ctrlc()?;
    match &cli.command {
        Commands::Sum { dir, .. } => handle_sum(dir, &opts, &token),
        Commands::Du { roots, .. } => {
            let roots = if roots.is_empty() {
                vec![PathBuf::from(".")]
            } else {
                roots.clone()
            };
            handle_du(&roots, &opts, &token)
        }
    }
}

fn handle_sum(dir: &std::path::Path, opts: &Opts, token: &CancelToken) -> Result<()> {
    let sums = sum_tree(dir, opts, token, sum_progress(opts.verbose))?;
    let sorted: BTreeMap<String, String> = sums
        .iter()
        .map(|(path, digest)| (path.display().to_string(), digest_hex(digest)))
        .collect();
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&sorted)?);
    } else {
        for (path, hex) in &sorted {
            println!("{}  {}", hex, path);
        }
    }
    Ok(())
}

fn handle_du(roots: &[PathBuf], opts: &Opts, token: &CancelToken) -> Result<()> {
    let usage = disk_usage(roots, opts, token, du_progress(opts.verbose))?;
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&usage)?);
    } else {
        println!("{}", format_usage(usage.files, usage.bytes));
    }
    Ok(())
}
