//! Structured pipeline failures. Wrapped in `anyhow::Error` at the public API; callers can
//! `downcast_ref::<PipelineError>()` to tell cancellation apart from real failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The source stage observed cancellation before the traversal finished.
    #[error("walk canceled")]
    WalkCanceled,

    /// The run was canceled while results were still in flight (results are incomplete).
    #[error("canceled")]
    Canceled,

    /// Listing a directory failed.
    #[error("listing {path}: {source}")]
    Traversal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A worker thread of `stage` panicked; its results are lost.
    #[error("{stage} worker panicked")]
    WorkerPanicked { stage: &'static str },

    /// A worklist item could not be expanded and the crawl was set to abort.
    #[error("expanding {item}: {message}")]
    Expand { item: String, message: String },

    /// The source thread exited without reporting a walk result.
    #[error("source stage exited without reporting")]
    SourceLost,
}

impl PipelineError {
    /// True for the two cancellation variants.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PipelineError::WalkCanceled | PipelineError::Canceled)
    }
}

/// Result sent once on a source's report channel.
pub type WalkResult = std::result::Result<(), PipelineError>;
