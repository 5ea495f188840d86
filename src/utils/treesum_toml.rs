//! Load `.treesum.toml` from a directory (CLI only).
//! Lib callers pass [`TreeOpts`](crate::TreeOpts).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io;
use std::path::Path;

use crate::{Opts, Strategy};
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TreesumToml {
    #[serde(default)]
    settings: Settings,
}

#[derive(Debug, Default, Deserialize)]
struct Settings {
    workers: Option<usize>,
    open_files: Option<usize>,
    strategy: Option<Strategy>,
    follow_links: Option<bool>,
    exclude: Option<Vec<String>>,
    verbose: Option<bool>,
    tick_ms: Option<u64>,
    strict: Option<bool>,
    json: Option<bool>,
}

/// Load the config file from `dir` if present. Ok(None) if missing; a malformed or unreadable
/// file is an error.
pub(crate) fn load_treesum_toml(dir: &Path) -> Result<Option<TreesumToml>> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };
    let file = parse_treesum_toml(&s).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(file))
}

pub(crate) fn parse_treesum_toml(s: &str) -> Result<TreesumToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($settings:expr, $opts:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(v) = $settings.$field.clone() {
                $opts.$field = v;
            }
        )+
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI flags.
pub(crate) fn apply_file_to_opts(file: &TreesumToml, opts: &mut Opts) {
    let s = &file.settings;
    apply_file_opt!(
        s,
        opts,
        workers,
        open_files,
        strategy,
        follow_links,
        exclude,
        verbose,
        tick_ms,
        strict,
        json,
    );
}
