//! Disk usage: crawl directories with a bounded pool, sizes flow to a counting sink.

use anyhow::{Context, Result};
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::Opts;
use crate::engine::tools::{check_root_dir, should_include_in_walk};
use crate::pipeline::{
    CancelToken, CrawlOpts, DirLister, EntryKind, ErrorPolicy, Expand, Expansion, FsLister,
    Outcome, PipelineHandles, Semaphore, collect_outcomes, crawl,
};
use crate::sum::{exclude_patterns, tuning_from_opts};
use crate::types::DiskUsage;

/// Total file count and bytes under `roots`.
///
/// Unreadable directories are logged and skipped unless `opts.strict`, in which case the first
/// one fails the run. `token` is canceled on every return path.
pub fn disk_usage<P>(
    roots: &[PathBuf],
    opts: &Opts,
    token: &CancelToken,
    progress: P,
) -> Result<DiskUsage>
where
    P: FnMut(&DiskUsage),
{
    let lister = Arc::new(FsLister {
        follow_links: opts.follow_links,
    });
    disk_usage_with(roots, opts, token, lister, progress)
}

/// [`disk_usage`] with the directory lister supplied by the caller.
pub fn disk_usage_with<P>(
    roots: &[PathBuf],
    opts: &Opts,
    token: &CancelToken,
    lister: Arc<dyn DirLister>,
    progress: P,
) -> Result<DiskUsage>
where
    P: FnMut(&DiskUsage),
{
    let _cancel_on_return = token.drop_guard();
    for root in roots {
        check_root_dir(root)?;
    }
    let tuning = tuning_from_opts(opts);
    let done = token.done();
    let semaphore = Semaphore::new(tuning.open_files);

    let expand: Arc<dyn Expand<PathBuf, Outcome<PathBuf, u64>>> = {
        let done = done.clone();
        let exclude = exclude_patterns(opts);
        let follow_links = opts.follow_links;
        Arc::new(move |dir: &PathBuf| -> Result<Expansion<PathBuf, Outcome<PathBuf, u64>>> {
            // Canceled while waiting for a slot: nothing more to report.
            let Some(_permit) = semaphore.acquire(&done) else {
                return Ok(Expansion::default());
            };
            let entries = lister
                .list(dir)
                .with_context(|| format!("listing {}", dir.display()))?;
            let mut expansion = Expansion::default();
            for entry in entries {
                let path = dir.join(&entry.name);
                if !should_include_in_walk(&path, dir, &exclude) {
                    continue;
                }
                match entry.kind {
                    // Canonical names so the crawler's seen set also catches link cycles.
                    EntryKind::Dir if follow_links => {
                        expansion
                            .children
                            .push(path.canonicalize().unwrap_or(path));
                    }
                    EntryKind::Dir => expansion.children.push(path),
                    EntryKind::File => expansion.outputs.push(Outcome {
                        item: path,
                        value: Ok(entry.size),
                    }),
                    EntryKind::Other => {}
                }
            }
            Ok(expansion)
        })
    };

    let crawl_opts = CrawlOpts {
        workers: tuning.workers,
        dedup: true,
        policy: if opts.strict {
            ErrorPolicy::Abort
        } else {
            ErrorPolicy::Skip
        },
        channel_cap: tuning.channel_cap,
    };
    let source = crawl(&done, roots.to_vec(), expand, &crawl_opts);
    let (results, handle) = source.stage.into_parts();
    let pipeline = PipelineHandles {
        results,
        report: source.report,
        handles: vec![handle],
    };
    let every = opts
        .verbose
        .then(|| Duration::from_millis(opts.tick_ms.max(1)));
    let usage = collect_outcomes(token, pipeline, DiskUsage::default(), every, progress)?;
    debug!(
        "du: {} files, {} bytes under {} roots",
        usage.files,
        usage.bytes,
        roots.len()
    );
    Ok(usage)
}
