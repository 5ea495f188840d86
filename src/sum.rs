//! Tree digest: walk → hash workers → map of path to digest.

use anyhow::Result;
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::Opts;
use crate::engine::hashing::hash_file;
use crate::engine::tools::{check_root_dir, path_relative_to};
use crate::pipeline::{
    CancelToken, DirLister, FsLister, PipelineContext, PipelineTuning, Transform, collect_outcomes,
    run_pipeline, walk_files,
};
use crate::types::{Digest, TreeSums};
use crate::utils::config::PackagePaths;
use crate::utils::fd_limit::cap_open_files;

/// Tuning for one run, with the open-files slots capped by the FD limit.
pub fn tuning_from_opts(opts: &Opts) -> PipelineTuning {
    PipelineTuning {
        workers: opts.workers.max(1),
        open_files: cap_open_files(opts.open_files),
        channel_cap: opts.channel_cap,
    }
}

/// Default exclusions followed by the configured ones.
pub fn exclude_patterns(opts: &Opts) -> Vec<String> {
    let mut exclude = PackagePaths::get().default_exclude_patterns();
    exclude.extend(opts.exclude.iter().cloned());
    exclude
}

/// Walk context for `root` with the configured filters.
pub fn walk_context(root: &Path, opts: &Opts) -> PipelineContext {
    PipelineContext {
        root: root.to_path_buf(),
        exclude: exclude_patterns(opts),
        follow_links: opts.follow_links,
    }
}

/// Digest every regular file under `root`. Keys are relative to `root`.
///
/// Fails with the first error: an unreadable file, a traversal failure, or cancellation of
/// `token` (e.g. Ctrl-C). `token` is canceled on every return path; all pipeline threads have
/// exited by the time this returns.
pub fn sum_tree<P>(root: &Path, opts: &Opts, token: &CancelToken, progress: P) -> Result<TreeSums>
where
    P: FnMut(&TreeSums),
{
    let lister = Arc::new(FsLister {
        follow_links: opts.follow_links,
    });
    let transform: Arc<dyn Transform<PathBuf, Digest>> =
        Arc::new(|path: &PathBuf| hash_file(path));
    sum_tree_with(root, opts, token, lister, transform, progress)
}

/// [`sum_tree`] with the directory lister and the per-file computation supplied by the caller.
pub fn sum_tree_with<V, P>(
    root: &Path,
    opts: &Opts,
    token: &CancelToken,
    lister: Arc<dyn DirLister>,
    transform: Arc<dyn Transform<PathBuf, V>>,
    progress: P,
) -> Result<HashMap<PathBuf, V>>
where
    V: Send + 'static,
    P: FnMut(&HashMap<PathBuf, V>),
{
    let _cancel_on_return = token.drop_guard();
    check_root_dir(root)?;
    let tuning = tuning_from_opts(opts);
    let done = token.done();

    let source = walk_files(&done, walk_context(root, opts), lister, tuning.channel_cap);
    let pipeline = run_pipeline(&done, source, transform, &tuning, opts.strategy);
    let every = opts
        .verbose
        .then(|| Duration::from_millis(opts.tick_ms.max(1)));
    let sums = collect_outcomes(token, pipeline, HashMap::new(), every, progress)?;
    debug!("sum: {} files under {}", sums.len(), root.display());

    Ok(sums
        .into_iter()
        .map(|(path, value)| {
            let rel = path_relative_to(&path, root).unwrap_or(path);
            (rel, value)
        })
        .collect())
}
