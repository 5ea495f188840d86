//! Source stages: the directory walk and the seed-list emitter.

use crossbeam_channel::{Sender, bounded};
use log::debug;
use std::collections::HashSet;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crate::engine::tools::should_include_in_walk;

use super::cancel::Done;
use super::context::{Source, Stage, StageHandle, send_or_cancel};
use super::error::{PipelineError, WalkResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
    /// Symlinks (when not followed), sockets, devices.
    Other,
}

/// One entry of a directory listing.
#[derive(Clone, Debug)]
pub struct DirEntryInfo {
    pub name: OsString,
    pub kind: EntryKind,
    /// Size in bytes for regular files, 0 otherwise.
    pub size: u64,
}

/// Directory-listing capability used by every traversal.
pub trait DirLister: Send + Sync {
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>>;
}

/// Lists the real filesystem, one level at a time, sorted by name.
#[derive(Clone, Debug, Default)]
pub struct FsLister {
    pub follow_links: bool,
}

impl DirLister for FsLister {
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
        let mut out = Vec::new();
        let iter = walkdir::WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(self.follow_links)
            .sort_by_file_name();
        for entry in iter {
            let entry = match entry {
                Ok(entry) => entry,
                // Dangling symlink while following links: nothing to list or hash.
                Err(err) if self.follow_links && err.depth() > 0 && is_not_found(&err) => {
                    debug!("skipping dangling link: {}", err);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let ft = entry.file_type();
            let (kind, size) = if ft.is_dir() {
                (EntryKind::Dir, 0)
            } else if ft.is_file() {
                (EntryKind::File, entry.metadata()?.len())
            } else {
                (EntryKind::Other, 0)
            };
            out.push(DirEntryInfo {
                name: entry.file_name().to_os_string(),
                kind,
                size,
            });
        }
        Ok(out)
    }
}

fn is_not_found(err: &walkdir::Error) -> bool {
    err.io_error()
        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
}

/// Walk configuration: root, filters, link policy.
#[derive(Clone, Debug)]
pub struct PipelineContext {
    pub root: PathBuf,
    pub exclude: Vec<String>,
    pub follow_links: bool,
}

impl PipelineContext {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            exclude: Vec::new(),
            follow_links: false,
        }
    }
}

/// Start a thread that walks `ctx.root` depth-first and sends the path of every regular file.
///
/// The walk result is sent exactly once on `report` (capacity 1, so that send never blocks),
/// before the item channel closes. If `done` fires the walk stops with
/// [`PipelineError::WalkCanceled`].
pub fn walk_files(
    done: &Done,
    ctx: PipelineContext,
    lister: Arc<dyn DirLister>,
    channel_cap: usize,
) -> Source<PathBuf> {
    let (tx, rx) = bounded::<PathBuf>(channel_cap);
    let (report_tx, report) = bounded::<WalkResult>(1);
    let done = done.clone();
    let walker = thread::spawn(move || {
        let mut count = 0_usize;
        let result = run_walk_loop(&ctx, lister.as_ref(), &tx, &done, &mut count);
        debug!(
            "walk: {} files sent from {} ({})",
            count,
            ctx.root.display(),
            match &result {
                Ok(()) => "complete".to_string(),
                Err(e) => e.to_string(),
            }
        );
        let _ = report_tx.send(result);
        drop(tx);
    });
    Source {
        stage: Stage {
            rx,
            handle: StageHandle::single("walk", walker),
        },
        report,
    }
}

/// Depth-first walk with an explicit stack. Checks `done` before each entry.
pub fn run_walk_loop(
    ctx: &PipelineContext,
    lister: &dyn DirLister,
    tx: &Sender<PathBuf>,
    done: &Done,
    count: &mut usize,
) -> WalkResult {
    let mut stack = vec![ctx.root.clone()];
    let mut visited: HashSet<PathBuf> = HashSet::new();
    while let Some(dir) = stack.pop() {
        if done.is_canceled() {
            return Err(PipelineError::WalkCanceled);
        }
        if ctx.follow_links {
            // Link cycles would otherwise walk forever.
            let canonical = dir.canonicalize().unwrap_or_else(|_| dir.clone());
            if !visited.insert(canonical) {
                continue;
            }
        }
        let entries = lister
            .list(&dir)
            .map_err(|source| PipelineError::Traversal {
                path: dir.clone(),
                source,
            })?;
        let mut subdirs = Vec::new();
        for entry in entries {
            if done.is_canceled() {
                return Err(PipelineError::WalkCanceled);
            }
            let path = dir.join(&entry.name);
            if !should_include_in_walk(&path, &ctx.root, &ctx.exclude) {
                continue;
            }
            match entry.kind {
                EntryKind::Dir => subdirs.push(path),
                EntryKind::File => {
                    if !send_or_cancel(tx, path, done) {
                        return Err(PipelineError::WalkCanceled);
                    }
                    *count += 1;
                }
                EntryKind::Other => {}
            }
        }
        // Reverse so the first subdirectory is walked first.
        stack.extend(subdirs.into_iter().rev());
    }
    Ok(())
}

/// Seed-list source: send every item of `items`, then close.
pub fn emit<T, I>(done: &Done, items: I, channel_cap: usize) -> Stage<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = T> + Send + 'static,
{
    let (tx, rx) = bounded::<T>(channel_cap);
    let done = done.clone();
    let handle = thread::spawn(move || {
        for item in items {
            if !send_or_cancel(&tx, item, &done) {
                break;
            }
        }
    });
    Stage {
        rx,
        handle: StageHandle::single("emit", handle),
    }
}
