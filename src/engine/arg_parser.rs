use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::Strategy;

struct DefaultArgs;

impl DefaultArgs {
    pub const DIR: &'static str = ".";
}

/// Hash or size directory trees with a cancellable concurrent pipeline.
#[derive(Clone, Parser)]
#[command(name = "treesum")]
#[command(about = "Hash every file under a directory, or total its disk usage. Ctrl-C cancels.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Print the blake3 digest of every regular file under DIR, sorted by path.
    Sum {
        /// Directory to hash. Default: current directory.
        #[arg(value_name = "DIR", default_value = DefaultArgs::DIR)]
        dir: PathBuf,

        /// How the hashing stage is laid out.
        #[arg(long, short = 's', value_enum)]
        strategy: Option<Strategy>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print the number of files and total size under each ROOT.
    Du {
        /// Directories to measure. Default: current directory.
        #[arg(value_name = "ROOT")]
        roots: Vec<PathBuf>,

        /// Strict mode: fail on the first unreadable directory instead of skipping it.
        #[arg(
            long,
            num_args = 0..=1,
            require_equals = true,
            default_missing_value = "true",
            value_parser = clap::value_parser!(bool),
        )]
        strict: Option<bool>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Clone, Args)]
pub struct CommonArgs {
    /// Verbose output: periodic progress and debug logging.
    #[arg(
        long,
        short = 'v',
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = clap::value_parser!(bool),
    )]
    pub verbose: Option<bool>,

    /// Worker threads.
    #[arg(long, short = 'w', value_parser = clap::value_parser!(usize))]
    pub workers: Option<usize>,

    /// Max files or directories open at once (capped by the process FD limit).
    #[arg(long, short = 'o', value_parser = clap::value_parser!(usize))]
    pub open_files: Option<usize>,

    /// Follow symbolic links.
    #[arg(
        long,
        short = 'f',
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = clap::value_parser!(bool),
    )]
    pub follow_links: Option<bool>,

    /// Exclude patterns (glob syntax). Can specify multiple: -e pattern1 pattern2 pattern3
    #[arg(long, short = 'e', num_args = 1..)]
    pub exclude: Vec<String>,

    /// Progress interval in milliseconds (with --verbose).
    #[arg(long, value_parser = clap::value_parser!(u64))]
    pub tick_ms: Option<u64>,

    /// Print results as JSON.
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = clap::value_parser!(bool),
    )]
    pub json: Option<bool>,
}

impl Cli {
    /// Directory whose `.treesum.toml` applies: DIR for `sum`, the first ROOT for `du`.
    pub fn config_dir(&self) -> PathBuf {
        match &self.command {
            Commands::Sum { dir, .. } => dir.clone(),
            Commands::Du { roots, .. } => roots
                .first()
                .cloned()
                .unwrap_or_else(|| PathBuf::from(DefaultArgs::DIR)),
        }
    }

    pub fn common(&self) -> &CommonArgs {
        match &self.command {
            Commands::Sum { common, .. } | Commands::Du { common, .. } => common,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_bool_flag_does_not_swallow_the_path() {
        let cli = Cli::try_parse_from(["treesum", "sum", "-v", "x"]).unwrap();
        assert_eq!(cli.common().verbose, Some(true));
        assert_eq!(cli.config_dir(), PathBuf::from("x"));

        let cli = Cli::try_parse_from(["treesum", "du", "--strict", "-f", "a", "b"]).unwrap();
        let Commands::Du { roots, strict, .. } = &cli.command else {
            panic!("expected du");
        };
        assert_eq!(*strict, Some(true));
        assert_eq!(roots, &vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(cli.common().follow_links, Some(true));
    }

    #[test]
    fn bool_flag_takes_explicit_value_with_equals() {
        let cli =
            Cli::try_parse_from(["treesum", "sum", "--verbose=false", "--json", "x"]).unwrap();
        assert_eq!(cli.common().verbose, Some(false));
        assert_eq!(cli.common().json, Some(true));
    }

    #[test]
    fn flags_absent_stay_unset() {
        let cli = Cli::try_parse_from(["treesum", "sum"]).unwrap();
        assert_eq!(cli.common().verbose, None);
        assert_eq!(cli.config_dir(), PathBuf::from("."));
    }
}
