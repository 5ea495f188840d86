//! Transform stages: a fixed pool sharing one output, a fan-out of per-worker outputs, and a
//! per-item spawner bounded by a semaphore.

use crossbeam_channel::{Receiver, Sender, bounded};
use log::debug;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::cancel::Done;
use super::context::{Stage, close_after_all, recv_or_cancel, send_or_cancel};
use super::semaphore::Semaphore;

/// Per-item compute step. Any `Fn(&I) -> anyhow::Result<V>` closure qualifies.
pub trait Transform<I, V>: Send + Sync {
    fn apply(&self, item: &I) -> anyhow::Result<V>;
}

impl<I, V, F> Transform<I, V> for F
where
    F: Fn(&I) -> anyhow::Result<V> + Send + Sync,
{
    fn apply(&self, item: &I) -> anyhow::Result<V> {
        self(item)
    }
}

/// Result of processing one item: the item and either its value or its error.
#[derive(Debug)]
pub struct Outcome<I, V> {
    pub item: I,
    pub value: anyhow::Result<V>,
}

/// What a worker needs besides its channels.
struct WorkerCtx<I, V> {
    done: Done,
    semaphore: Option<Semaphore>,
    transform: Arc<dyn Transform<I, V>>,
}

impl<I, V> Clone for WorkerCtx<I, V> {
    fn clone(&self) -> Self {
        Self {
            done: self.done.clone(),
            semaphore: self.semaphore.clone(),
            transform: Arc::clone(&self.transform),
        }
    }
}

impl<I, V> WorkerCtx<I, V> {
    /// Compute one item under a semaphore slot. `None` if canceled while waiting for the slot.
    fn process(&self, item: I) -> Option<Outcome<I, V>> {
        let _permit = match &self.semaphore {
            Some(sema) => Some(sema.acquire(&self.done)?),
            None => None,
        };
        let value = self.transform.apply(&item);
        Some(Outcome { item, value })
    }
}

/// Worker loop: receive, compute, send, until the input is drained or `done` fires.
fn worker_loop<I, V>(input: Receiver<I>, output: Sender<Outcome<I, V>>, ctx: WorkerCtx<I, V>) {
    let mut processed = 0_usize;
    while !ctx.done.is_canceled() {
        let Some(item) = recv_or_cancel(&input, &ctx.done) else {
            break;
        };
        let Some(outcome) = ctx.process(item) else {
            break;
        };
        if !send_or_cancel(&output, outcome, &ctx.done) {
            break;
        }
        processed += 1;
    }
    debug!("worker exiting after {processed} items");
}

/// Spawn exactly `workers` threads (at least one) reading from `input` and writing to one shared
/// output. The output closes once the last worker has exited.
pub fn spawn_pool<I, V>(
    done: &Done,
    input: Receiver<I>,
    workers: usize,
    semaphore: Option<Semaphore>,
    transform: Arc<dyn Transform<I, V>>,
    channel_cap: usize,
) -> Stage<Outcome<I, V>>
where
    I: Send + 'static,
    V: Send + 'static,
{
    let (tx, rx) = bounded(channel_cap);
    let ctx = WorkerCtx {
        done: done.clone(),
        semaphore,
        transform,
    };
    let handles: Vec<JoinHandle<()>> = (0..workers.max(1))
        .map(|_| {
            let input = input.clone();
            let tx = tx.clone();
            let ctx = ctx.clone();
            thread::spawn(move || worker_loop(input, tx, ctx))
        })
        .collect();
    debug!("pool: {} workers", handles.len());
    Stage {
        rx,
        handle: close_after_all("pool", handles, tx),
    }
}

/// Like [`spawn_pool`] but every worker gets its own output stage. Combine with
/// [`merge`](super::merge::merge).
pub fn fan_out<I, V>(
    done: &Done,
    input: Receiver<I>,
    workers: usize,
    semaphore: Option<Semaphore>,
    transform: Arc<dyn Transform<I, V>>,
    channel_cap: usize,
) -> Vec<Stage<Outcome<I, V>>>
where
    I: Send + 'static,
    V: Send + 'static,
{
    (0..workers.max(1))
        .map(|_| {
            let (tx, rx) = bounded(channel_cap);
            let ctx = WorkerCtx {
                done: done.clone(),
                semaphore: semaphore.clone(),
                transform: Arc::clone(&transform),
            };
            let input = input.clone();
            let worker_tx = tx.clone();
            let handle = thread::spawn(move || worker_loop(input, worker_tx, ctx));
            Stage {
                rx,
                handle: close_after_all("fan-out", vec![handle], tx),
            }
        })
        .collect()
}

/// One short-lived thread per item. Concurrency is bounded only by `semaphore`, which is taken
/// before the thread is spawned, so at most `capacity` item threads exist at once.
pub fn spawn_per_item<I, V>(
    done: &Done,
    input: Receiver<I>,
    semaphore: Semaphore,
    transform: Arc<dyn Transform<I, V>>,
    channel_cap: usize,
) -> Stage<Outcome<I, V>>
where
    I: Send + 'static,
    V: Send + 'static,
{
    let (tx, rx) = bounded(channel_cap);
    let done = done.clone();
    let spawner_tx = tx.clone();
    let spawner = thread::spawn(move || {
        let mut running: Vec<JoinHandle<()>> = Vec::new();
        while !done.is_canceled() {
            let Some(item) = recv_or_cancel(&input, &done) else {
                break;
            };
            let Some(permit) = semaphore.acquire(&done) else {
                break;
            };
            let tx = spawner_tx.clone();
            let done = done.clone();
            let transform = Arc::clone(&transform);
            running.push(thread::spawn(move || {
                let value = transform.apply(&item);
                drop(permit);
                let _ = send_or_cancel(&tx, Outcome { item, value }, &done);
            }));
            let (finished, still_running): (Vec<_>, Vec<_>) =
                running.into_iter().partition(|h| h.is_finished());
            running = still_running;
            join_all_or_resume(finished);
        }
        debug!("per-item: spawner done, waiting on {} items", running.len());
        drop(spawner_tx);
        join_all_or_resume(running);
    });
    Stage {
        rx,
        handle: close_after_all("per-item", vec![spawner], tx),
    }
}

/// Join every handle; re-raise the first item panic on this thread so the stage barrier sees it.
fn join_all_or_resume(handles: Vec<JoinHandle<()>>) {
    let mut panic = None;
    for h in handles {
        if let Err(payload) = h.join() {
            panic.get_or_insert(payload);
        }
    }
    if let Some(payload) = panic {
        std::panic::resume_unwind(payload);
    }
}
