//! Stage plumbing shared by every pipeline component: the stage/source handles, the join-all
//! completion barrier that closes a stage's output, and cancellation-aware send/receive.

use crossbeam_channel::{Receiver, Sender, select};
use log::{debug, error};
use std::thread::{self, JoinHandle};

use super::cancel::Done;
use super::error::{PipelineError, WalkResult};

/// Tuning for one run: pool size, semaphore slots, channel capacity.
#[derive(Clone, Debug)]
pub struct PipelineTuning {
    pub workers: usize,
    pub open_files: usize,
    pub channel_cap: usize,
}

/// Output of a running stage: the receiver downstream reads from, plus the handle of the barrier
/// that closes it.
pub struct Stage<T> {
    pub rx: Receiver<T>,
    pub handle: StageHandle,
}

impl<T> Stage<T> {
    pub fn into_parts(self) -> (Receiver<T>, StageHandle) {
        (self.rx, self.handle)
    }
}

/// A source stage also reports its traversal result exactly once on a single-slot channel.
pub struct Source<T> {
    pub stage: Stage<T>,
    pub report: Receiver<WalkResult>,
}

/// Join handle of a stage's completion barrier.
pub struct StageHandle {
    name: &'static str,
    closer: JoinHandle<WalkResult>,
}

impl StageHandle {
    /// Stage with a single thread that owns the output sender itself (sources, dispatchers).
    pub fn single(name: &'static str, worker: JoinHandle<()>) -> Self {
        let closer = thread::spawn(move || join_worker(name, worker));
        Self { name, closer }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wait until every worker of the stage has exited and its output is closed.
    pub fn join(self) -> WalkResult {
        self.closer
            .join()
            .unwrap_or(Err(PipelineError::WorkerPanicked { stage: self.name }))
    }
}

fn join_worker(name: &'static str, worker: JoinHandle<()>) -> WalkResult {
    worker.join().map_err(|_| {
        error!("{name}: worker panicked");
        PipelineError::WorkerPanicked { stage: name }
    })
}

/// Completion barrier: join every worker, then drop `tx`. Workers each hold their own clone of
/// `tx`, so the channel disconnects exactly when the last sender goes away, i.e. here, after all
/// of them have exited. Never drop `tx` anywhere else.
pub fn close_after_all<T: Send + 'static>(
    name: &'static str,
    workers: Vec<JoinHandle<()>>,
    tx: Sender<T>,
) -> StageHandle {
    let closer = thread::spawn(move || {
        let count = workers.len();
        let mut result = Ok(());
        for worker in workers {
            if let Err(e) = join_worker(name, worker) {
                result = Err(e);
            }
        }
        drop(tx);
        debug!("{name}: {count} workers done, output closed");
        result
    });
    StageHandle { name, closer }
}

/// Send `value` unless `done` fires first. Returns false when the value was discarded, either
/// because of cancellation or because the receiver is gone; the caller should stop.
pub fn send_or_cancel<T>(tx: &Sender<T>, value: T, done: &Done) -> bool {
    select! {
        send(tx, value) -> res => res.is_ok(),
        recv(done.channel()) -> _ => false,
    }
}

/// Receive the next value, or `None` when the input is closed and drained or `done` fires.
pub fn recv_or_cancel<T>(rx: &Receiver<T>, done: &Done) -> Option<T> {
    select! {
        recv(rx) -> msg => msg.ok(),
        recv(done.channel()) -> _ => None,
    }
}
