//! Treesum: cancellable concurrent pipelines for hashing and sizing directory trees

pub mod du;
pub mod engine;
pub mod pipeline;
pub mod sum;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

use log::debug;
use std::path::{Path, PathBuf};

use crate::pipeline::CancelToken;

/// Result alias used by public treesum API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

fn log_config(opts: &Opts) {
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        opts
    );
}

/// Digest every regular file under `root`; keys are relative to `root`.
///
/// Returns the first error hit (unreadable file or directory). On error, no partial map is returned
/// and every worker thread has exited.
///
/// ```ignore
/// let sums = treesum::sum_dir(Path::new("."), &TreeOpts::default())?;
/// for (path, digest) in &sums {
///     println!("{}  {}", treesum::engine::digest_hex(digest), path.display());
/// }
/// ```
pub fn sum_dir(root: &Path, opts: &TreeOpts) -> Result<TreeSums> {
    let opts = Opts::from(opts);
    log_config(&opts);
    sum::sum_tree(root, &opts, &CancelToken::new(), |_| {})
}

/// Count files and total their sizes under `roots`.
///
/// Unreadable directories are skipped unless [`TreeOpts::strict`].
pub fn du_dirs(roots: &[PathBuf], opts: &TreeOpts) -> Result<DiskUsage> {
    let opts = Opts::from(opts);
    log_config(&opts);
    du::disk_usage(roots, &opts, &CancelToken::new(), |_| {})
}
