use crossbeam_channel::bounded;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use treesum::engine::hash_bytes;
use treesum::pipeline::{
    CancelToken, DirEntryInfo, DirLister, PipelineError, PipelineHandles, PipelineTuning,
    Source, Transform, collect_outcomes, emit, run_pipeline,
};
use treesum::{DiskUsage, Opts, Strategy, TreeOpts, du, sum};

const STRATEGIES: [Strategy; 3] = [Strategy::Pool, Strategy::FanIn, Strategy::PerItem];

/// a.txt and b.txt share contents; sub/c.txt differs.
fn sample_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"hello").unwrap();
    fs::write(dir.path().join("b.txt"), b"hello").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub").join("c.txt"), b"world").unwrap();
    dir
}

fn expected_sums() -> HashMap<PathBuf, [u8; 32]> {
    HashMap::from([
        (PathBuf::from("a.txt"), hash_bytes(b"hello")),
        (PathBuf::from("b.txt"), hash_bytes(b"hello")),
        (PathBuf::from("sub").join("c.txt"), hash_bytes(b"world")),
    ])
}

fn pipeline_error(err: &anyhow::Error) -> Option<&PipelineError> {
    err.downcast_ref::<PipelineError>()
}

/// Lister whose every call fails.
struct DeniedLister;

impl DirLister for DeniedLister {
    fn list(&self, _dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
    }
}

/// Numbers 0..n through `workers` workers (and as many open-file slots) laid out per
/// `strategy`, collected into a map.
fn run_numbers(
    token: &CancelToken,
    n: u32,
    workers: usize,
    strategy: Strategy,
    transform: Arc<dyn Transform<u32, u32>>,
) -> anyhow::Result<HashMap<u32, u32>> {
    let done = token.done();
    let (report_tx, report) = bounded(1);
    report_tx.send(Ok(())).unwrap();
    let source = Source {
        stage: emit(&done, 0..n, 0),
        report,
    };
    let tuning = PipelineTuning {
        workers,
        open_files: workers,
        channel_cap: 4,
    };
    let pipeline: PipelineHandles<u32, u32> =
        run_pipeline(&done, source, transform, &tuning, strategy);
    collect_outcomes(token, pipeline, HashMap::new(), None, |_| {})
}

// --- sum ---

#[test]
fn test_sum_tree_every_strategy() {
    let dir = sample_tree();
    for strategy in STRATEGIES {
        let opts = Opts {
            strategy,
            workers: 4,
            ..Opts::default()
        };
        let sums = sum::sum_tree(dir.path(), &opts, &CancelToken::new(), |_| {}).unwrap();
        assert_eq!(sums, expected_sums(), "strategy {:?}", strategy);
    }
}

#[test]
fn test_sum_dir_lib_entry_point() {
    let dir = sample_tree();
    let sums = treesum::sum_dir(dir.path(), &TreeOpts::default()).unwrap();
    assert_eq!(sums, expected_sums());
}

#[test]
fn test_sum_empty_dir_is_empty_map() {
    let dir = tempfile::tempdir().unwrap();
    let sums = treesum::sum_dir(dir.path(), &TreeOpts::default()).unwrap();
    assert!(sums.is_empty());
}

#[test]
fn test_sum_respects_exclude_and_config_file() {
    let dir = sample_tree();
    fs::write(dir.path().join("debug.log"), b"noise").unwrap();
    fs::write(dir.path().join(".treesum.toml"), b"[settings]\n").unwrap();
    let opts = TreeOpts {
        exclude: vec!["*.log".to_string()],
        ..TreeOpts::default()
    };
    let sums = treesum::sum_dir(dir.path(), &opts).unwrap();
    assert_eq!(sums, expected_sums());
}

#[test]
fn test_sum_missing_root_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    assert!(treesum::sum_dir(&missing, &TreeOpts::default()).is_err());
}

#[test]
fn test_sum_traversal_error_surfaces() {
    let dir = sample_tree();
    let transform: Arc<dyn Transform<PathBuf, usize>> =
        Arc::new(|_: &PathBuf| -> anyhow::Result<usize> { Ok(0) });
    let err = sum::sum_tree_with(
        dir.path(),
        &Opts::default(),
        &CancelToken::new(),
        Arc::new(DeniedLister),
        transform,
        |_| {},
    )
    .unwrap_err();
    assert!(matches!(
        pipeline_error(&err),
        Some(PipelineError::Traversal { .. })
    ));
}

#[test]
fn test_sum_canceled_before_start() {
    let dir = sample_tree();
    let token = CancelToken::new();
    token.cancel();
    let err = sum::sum_tree(dir.path(), &Opts::default(), &token, |_| {}).unwrap_err();
    assert!(pipeline_error(&err).is_some_and(|e| e.is_cancellation()));
}

#[test]
fn test_sum_token_canceled_after_return() {
    let dir = sample_tree();
    let token = CancelToken::new();
    sum::sum_tree(dir.path(), &Opts::default(), &token, |_| {}).unwrap();
    assert!(token.is_canceled());
}

// --- pool / sink ---

#[test]
fn test_first_error_wins_and_stops_early() {
    for strategy in STRATEGIES {
        let token = CancelToken::new();
        let processed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&processed);
        let transform: Arc<dyn Transform<u32, u32>> =
            Arc::new(move |i: &u32| -> anyhow::Result<u32> {
                counter.fetch_add(1, Ordering::SeqCst);
                if *i == 500 {
                    anyhow::bail!("item {} failed", i);
                }
                thread::sleep(Duration::from_millis(1));
                Ok(*i * 2)
            });
        let err = run_numbers(&token, 1000, 20, strategy, transform).unwrap_err();
        assert_eq!(err.to_string(), "item 500 failed", "strategy {:?}", strategy);

        // Every stage has been joined: nothing is still computing.
        let seen = processed.load(Ordering::SeqCst);
        assert!(seen < 1000, "{:?} processed {} of 1000", strategy, seen);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(processed.load(Ordering::SeqCst), seen, "strategy {:?}", strategy);
    }
}

#[test]
fn test_many_failures_surface_one_error() {
    for strategy in STRATEGIES {
        let token = CancelToken::new();
        let transform: Arc<dyn Transform<u32, u32>> =
            Arc::new(|i: &u32| -> anyhow::Result<u32> { anyhow::bail!("item {} failed", i) });
        let err = run_numbers(&token, 200, 8, strategy, transform).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("item ") && msg.ends_with(" failed"), "{}", msg);
    }
}

#[test]
fn test_all_results_collected() {
    for strategy in STRATEGIES {
        let token = CancelToken::new();
        let transform: Arc<dyn Transform<u32, u32>> =
            Arc::new(|i: &u32| -> anyhow::Result<u32> { Ok(*i * 2) });
        let map = run_numbers(&token, 300, 7, strategy, transform).unwrap();
        assert_eq!(map.len(), 300, "strategy {:?}", strategy);
        assert!(map.iter().all(|(k, v)| *v == k * 2));
    }
}

#[test]
fn test_external_cancel_returns_promptly() {
    for strategy in STRATEGIES {
        let token = CancelToken::new();
        let canceler = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            canceler.cancel();
        });
        let transform: Arc<dyn Transform<u32, u32>> =
            Arc::new(|i: &u32| -> anyhow::Result<u32> {
                thread::sleep(Duration::from_millis(1));
                Ok(*i)
            });
        let start = Instant::now();
        let err = run_numbers(&token, u32::MAX, 4, strategy, transform).unwrap_err();
        assert!(
            pipeline_error(&err).is_some_and(|e| e.is_cancellation()),
            "strategy {:?}: {}",
            strategy,
            err
        );
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}

#[test]
fn test_per_item_threads_bounded_by_open_files() {
    let token = CancelToken::new();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
    let transform: Arc<dyn Transform<u32, u32>> = Arc::new(move |i: &u32| -> anyhow::Result<u32> {
        let now = a.fetch_add(1, Ordering::SeqCst) + 1;
        p.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(2));
        a.fetch_sub(1, Ordering::SeqCst);
        Ok(*i)
    });
    let map = run_numbers(&token, 200, 3, Strategy::PerItem, transform).unwrap();
    assert_eq!(map.len(), 200);
    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak concurrency {}", peak);
}

// --- du ---

#[test]
fn test_du_totals() {
    let dir = sample_tree();
    let usage = treesum::du_dirs(&[dir.path().to_path_buf()], &TreeOpts::default()).unwrap();
    assert_eq!(usage, DiskUsage { files: 3, bytes: 15 });
}

#[test]
fn test_du_repeated_root_counted_once() {
    let dir = sample_tree();
    let root = dir.path().to_path_buf();
    let usage = treesum::du_dirs(&[root.clone(), root], &TreeOpts::default()).unwrap();
    assert_eq!(usage, DiskUsage { files: 3, bytes: 15 });
}

#[test]
fn test_du_several_roots() {
    let a = sample_tree();
    let b = tempfile::tempdir().unwrap();
    fs::write(b.path().join("big.bin"), vec![0u8; 1000]).unwrap();
    let roots = vec![a.path().to_path_buf(), b.path().to_path_buf()];
    let usage = treesum::du_dirs(&roots, &TreeOpts::default()).unwrap();
    assert_eq!(usage, DiskUsage { files: 4, bytes: 1015 });
}

#[test]
fn test_du_skips_unreadable_unless_strict() {
    let dir = sample_tree();
    let roots = vec![dir.path().to_path_buf()];

    let lenient = du::disk_usage_with(
        &roots,
        &Opts::default(),
        &CancelToken::new(),
        Arc::new(DeniedLister),
        |_| {},
    )
    .unwrap();
    assert_eq!(lenient, DiskUsage::default());

    let strict = Opts {
        strict: true,
        ..Opts::default()
    };
    let err = du::disk_usage_with(
        &roots,
        &strict,
        &CancelToken::new(),
        Arc::new(DeniedLister),
        |_| {},
    )
    .unwrap_err();
    assert!(matches!(
        pipeline_error(&err),
        Some(PipelineError::Expand { .. })
    ));
}

#[test]
fn test_du_canceled_before_start() {
    let dir = sample_tree();
    let token = CancelToken::new();
    token.cancel();
    let err = du::disk_usage(&[dir.path().to_path_buf()], &Opts::default(), &token, |_| {})
        .unwrap_err();
    assert!(pipeline_error(&err).is_some_and(|e| e.is_cancellation()));
}
