//! Sink: drain the final stream into an aggregate on the calling thread, first error wins.

use crossbeam_channel::{Receiver, never, select, tick};
use log::debug;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use super::cancel::Done;
use super::error::{PipelineError, WalkResult};
use super::pool::Outcome;

/// Something results can be folded into. Only the sink thread ever touches it.
pub trait Aggregate<I, V> {
    fn absorb(&mut self, item: I, value: V);
}

impl<I: Eq + Hash, V> Aggregate<I, V> for HashMap<I, V> {
    fn absorb(&mut self, item: I, value: V) {
        self.insert(item, value);
    }
}

/// Drain `results` into `agg`.
///
/// Returns the first per-item error as soon as it arrives, without waiting for the rest; the
/// caller cancels and joins the stages afterwards. When `every` is set, `report` is called with
/// the running aggregate on each tick. If `done` has fired by the time the stream closes, the
/// aggregate is incomplete and [`PipelineError::Canceled`] is returned instead.
pub fn drain<I, V, A, R>(
    results: &Receiver<Outcome<I, V>>,
    done: &Done,
    mut agg: A,
    every: Option<Duration>,
    mut report: R,
) -> anyhow::Result<A>
where
    A: Aggregate<I, V>,
    R: FnMut(&A),
{
    let ticker = every.map(tick).unwrap_or_else(never);
    let mut received = 0_usize;
    loop {
        select! {
            recv(results) -> msg => match msg {
                Ok(Outcome { item, value }) => {
                    agg.absorb(item, value?);
                    received += 1;
                }
                Err(_) => break,
            },
            recv(ticker) -> _ => report(&agg),
        }
    }
    debug!("sink: stream closed after {received} results");
    report(&agg);
    if done.is_canceled() {
        return Err(PipelineError::Canceled.into());
    }
    Ok(agg)
}

/// [`drain`], then check the source's walk report. A traversal failure is independent of the
/// per-item results, so it is only visible here.
pub fn collect<I, V, A, R>(
    results: &Receiver<Outcome<I, V>>,
    report_rx: &Receiver<WalkResult>,
    done: &Done,
    agg: A,
    every: Option<Duration>,
    report: R,
) -> anyhow::Result<A>
where
    A: Aggregate<I, V>,
    R: FnMut(&A),
{
    let agg = drain(results, done, agg, every, report)?;
    check_walk_report(report_rx)?;
    Ok(agg)
}

/// Read the single walk result. The source sends it before closing its output, so once the
/// output is drained this never blocks.
pub fn check_walk_report(report_rx: &Receiver<WalkResult>) -> Result<(), PipelineError> {
    match report_rx.recv() {
        Ok(result) => result,
        Err(_) => Err(PipelineError::SourceLost),
    }
}
