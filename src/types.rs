//! Public and internal types for the treesum API and pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::pipeline::Aggregate;
use crate::utils::config::PipelineConsts;

/// Blake3 digest of a file's contents.
pub type Digest = [u8; 32];

/// Map of path (relative to the summed root) → content digest.
pub type TreeSums = HashMap<PathBuf, Digest>;

/// Running totals of a disk-usage walk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiskUsage {
    pub files: u64,
    pub bytes: u64,
}

impl<I> Aggregate<I, u64> for DiskUsage {
    fn absorb(&mut self, _item: I, size: u64) {
        self.files += 1;
        self.bytes += size;
    }
}

/// How the hashing stage is laid out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Fixed pool of workers sharing one output channel.
    #[default]
    Pool,
    /// One output channel per worker, multiplexed by a fan-in merge.
    FanIn,
    /// One short-lived worker per file, bounded by the open-files semaphore.
    PerItem,
}

/// Lib-only options for [`sum_dir`](crate::sum_dir) and [`du_dirs`](crate::du_dirs).
#[derive(Clone, Debug, Default)]
pub struct TreeOpts {
    /// Worker count. When None, [`PipelineConsts::DEFAULT_WORKERS`].
    pub workers: Option<usize>,
    /// Max files/directories open at once. When None, derived from the FD limit.
    pub open_files: Option<usize>,
    /// Hashing stage layout.
    pub strategy: Strategy,
    /// Follow symbolic links.
    pub follow_links: bool,
    /// Exclude patterns (glob syntax, e.g. `node_modules`, `*.log`).
    pub exclude: Vec<String>,
    /// Fail on the first unreadable directory instead of skipping it (disk usage only).
    pub strict: bool,
}

impl From<&TreeOpts> for Opts {
    fn from(o: &TreeOpts) -> Self {
        let defaults = Opts::default();
        Opts {
            workers: o.workers.unwrap_or(defaults.workers),
            open_files: o.open_files.unwrap_or(defaults.open_files),
            strategy: o.strategy,
            follow_links: o.follow_links,
            exclude: o.exclude.clone(),
            strict: o.strict,
            ..defaults
        }
    }
}

/// Full options (CLI and lib).
#[derive(Clone, Debug)]
pub struct Opts {
    /// Worker threads in the transform pool / crawler.
    pub workers: usize,
    /// Semaphore slots guarding open files and directory handles (capped by the FD limit).
    pub open_files: usize,
    /// Capacity of the channels between stages.
    pub channel_cap: usize,
    /// Hashing stage layout.
    pub strategy: Strategy,
    /// Follow symbolic links.
    pub follow_links: bool,
    /// Exclude patterns (glob syntax).
    pub exclude: Vec<String>,
    /// Periodic progress reporting.
    pub verbose: bool,
    /// Progress report interval in milliseconds.
    pub tick_ms: u64,
    /// Disk usage: fail on the first unreadable directory instead of skipping it.
    pub strict: bool,
    /// Print results as JSON.
    pub json: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            workers: PipelineConsts::DEFAULT_WORKERS,
            open_files: PipelineConsts::DEFAULT_OPEN_FILES,
            channel_cap: PipelineConsts::DEFAULT_CHANNEL_CAP,
            strategy: Strategy::default(),
            follow_links: false,
            exclude: Vec::new(),
            verbose: false,
            tick_ms: PipelineConsts::PROGRESS_TICK_MS,
            strict: false,
            json: false,
        }
    }
}
