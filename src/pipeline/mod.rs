//! Pipeline runtime: cancellation, bounding, source, transform, fan-in and sink stages.
//!
//! Dependency order, leaves first: [`cancel`] → [`semaphore`] → [`walk`]/[`crawl`] →
//! [`pool`] → [`merge`] → [`collect`]. [`orchestrator`] wires them together.

pub mod cancel;
pub mod collect;
pub mod context;
pub mod crawl;
pub mod error;
pub mod error_handler;
pub mod merge;
pub mod orchestrator;
pub mod pool;
pub mod semaphore;
pub mod walk;

pub use cancel::{CancelGuard, CancelToken, Done};
pub use collect::{Aggregate, check_walk_report, collect, drain};
pub use context::{
    PipelineTuning, Source, Stage, StageHandle, close_after_all, recv_or_cancel, send_or_cancel,
};
pub use crawl::{CrawlOpts, ErrorPolicy, Expand, Expansion, crawl};
pub use error::{PipelineError, WalkResult};
pub use error_handler::check_for_first_error;
pub use merge::merge;
pub use orchestrator::{
    PipelineHandles, collect_outcomes, run_pipeline, shutdown_pipeline_handles,
};
pub use pool::{Outcome, Transform, fan_out, spawn_per_item, spawn_pool};
pub use semaphore::{Permit, Semaphore};
pub use walk::{
    DirEntryInfo, DirLister, EntryKind, FsLister, PipelineContext, emit, run_walk_loop,
    walk_files,
};
