//! Progress display for verbose runs. The sink calls these from its ticker, so nothing here
//! runs on a worker thread.

use kdam::{Animation, Bar, BarExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::engine::tools::format_usage;
use crate::types::DiskUsage;

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Create a counter for unknown total (shows count without percentage)
pub fn create_counter(desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        position = 0,
        unit = " files"
    )))
}

/// Move the counter to `n`. Uses try_lock so a contended bar just skips this tick.
pub fn set_counter(pb: &ProgressBar, n: usize) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.update_to(n);
    }
}

/// Force a refresh of the bar (e.g. so counter shows "0 files" immediately).
pub fn refresh_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.refresh();
    }
}

/// Tick callback for the digest: counter of files hashed so far, or a no-op when not verbose.
pub fn sum_progress<T>(verbose: bool) -> impl FnMut(&HashMap<PathBuf, T>) {
    let bar = verbose.then(|| {
        let b = create_counter("Hashing");
        refresh_bar(&b);
        b
    });
    move |sums| {
        if let Some(bar) = &bar {
            set_counter(bar, sums.len());
        }
    }
}

/// Tick callback for disk usage: prints the running totals line to stderr.
pub fn du_progress(verbose: bool) -> impl FnMut(&DiskUsage) {
    move |usage| {
        if verbose {
            eprintln!("{}", format_usage(usage.files, usage.bytes));
        }
    }
}
