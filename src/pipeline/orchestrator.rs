use crossbeam_channel::Receiver;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

use crate::Strategy;

use super::cancel::{CancelToken, Done};
use super::collect::{Aggregate, collect};
use super::context::{PipelineTuning, Source, StageHandle};
use super::error::{PipelineError, WalkResult};
use super::error_handler::check_for_first_error;
use super::merge::merge;
use super::pool::{Outcome, Transform, fan_out, spawn_per_item, spawn_pool};
use super::semaphore::Semaphore;

/// A started pipeline: the final result stream, the source's walk report, and every stage handle
/// (joined in order by [`shutdown_pipeline_handles`]).
pub struct PipelineHandles<I, V> {
    pub results: Receiver<Outcome<I, V>>,
    pub report: Receiver<WalkResult>,
    pub handles: Vec<StageHandle>,
}

/// Wire `source` → transform stage (laid out per `strategy`) and return the handles.
/// Every stage observes `done`; all semaphore slots come from one [`Semaphore`].
pub fn run_pipeline<I, V>(
    done: &Done,
    source: Source<I>,
    transform: Arc<dyn Transform<I, V>>,
    tuning: &PipelineTuning,
    strategy: Strategy,
) -> PipelineHandles<I, V>
where
    I: Send + 'static,
    V: Send + 'static,
{
    let Source { stage, report } = source;
    let (items, source_handle) = stage.into_parts();
    let semaphore = Semaphore::new(tuning.open_files);
    debug!(
        "pipeline: {:?}, {} workers, {} open-file slots",
        strategy, tuning.workers, tuning.open_files
    );

    let mut handles = vec![source_handle];
    let results = match strategy {
        Strategy::Pool => {
            let stage = spawn_pool(
                done,
                items,
                tuning.workers,
                Some(semaphore),
                transform,
                tuning.channel_cap,
            );
            let (rx, handle) = stage.into_parts();
            handles.push(handle);
            rx
        }
        Strategy::FanIn => {
            let outputs = fan_out(
                done,
                items,
                tuning.workers,
                Some(semaphore),
                transform,
                tuning.channel_cap,
            );
            let (merged, upstream) = merge(done, outputs, tuning.channel_cap);
            handles.extend(upstream);
            let (rx, handle) = merged.into_parts();
            handles.push(handle);
            rx
        }
        Strategy::PerItem => {
            let stage = spawn_per_item(done, items, semaphore, transform, tuning.channel_cap);
            let (rx, handle) = stage.into_parts();
            handles.push(handle);
            rx
        }
    };

    PipelineHandles {
        results,
        report,
        handles,
    }
}

/// Shut down the pipeline by joining every stage. Returns the first stage failure, but joins all
/// of them regardless.
pub fn shutdown_pipeline_handles(handles: Vec<StageHandle>) -> Result<(), PipelineError> {
    let mut first = Ok(());
    for handle in handles {
        let name = handle.name();
        if let Err(e) = handle.join() {
            debug!("{name}: {e}");
            if first.is_ok() {
                first = Err(e);
            }
        }
    }
    first
}

/// Sink side of a run: drain into `agg`, then cancel on failure and join every stage before
/// returning, so no thread outlives the call. On failure only the in-flight items are waited
/// for, never the remaining input.
pub fn collect_outcomes<I, V, A, R>(
    token: &CancelToken,
    pipeline: PipelineHandles<I, V>,
    agg: A,
    every: Option<Duration>,
    report: R,
) -> anyhow::Result<A>
where
    A: Aggregate<I, V>,
    R: FnMut(&A),
{
    let PipelineHandles {
        results,
        report: walk_report,
        handles,
    } = pipeline;
    let sink = collect(&results, &walk_report, &token.done(), agg, every, report);
    if sink.is_err() {
        token.cancel();
    }
    drop(results);
    let stages = shutdown_pipeline_handles(handles);
    check_for_first_error(sink, stages)
}
