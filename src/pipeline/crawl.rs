//! Worklist crawl: a bounded pool of expanders fed by one dispatcher thread.
//!
//! The dispatcher owns the pending queue, the "seen" set and the in-flight count; nothing else
//! can reach them. Expanders turn an item into child items (fed back into the queue) and outputs
//! (sent downstream). The crawl ends when the queue is empty and no expansion is in flight.

use crossbeam_channel::{Receiver, Select, Sender, bounded};
use log::{debug, warn};
use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::cancel::Done;
use super::context::{Source, Stage, close_after_all, recv_or_cancel, send_or_cancel};
use super::error::{PipelineError, WalkResult};

/// What expanding one item produced.
pub struct Expansion<I, O> {
    pub children: Vec<I>,
    pub outputs: Vec<O>,
}

impl<I, O> Default for Expansion<I, O> {
    fn default() -> Self {
        Self {
            children: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

pub trait Expand<I, O>: Send + Sync {
    fn expand(&self, item: &I) -> anyhow::Result<Expansion<I, O>>;
}

impl<I, O, F> Expand<I, O> for F
where
    F: Fn(&I) -> anyhow::Result<Expansion<I, O>> + Send + Sync,
{
    fn expand(&self, item: &I) -> anyhow::Result<Expansion<I, O>> {
        self(item)
    }
}

/// What to do when an expansion fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Report the failure on the source's report channel and stop.
    Abort,
    /// Log it and keep crawling.
    #[default]
    Skip,
}

#[derive(Clone, Debug)]
pub struct CrawlOpts {
    pub workers: usize,
    /// Skip items already seen (needed for graphs with cycles).
    pub dedup: bool,
    pub policy: ErrorPolicy,
    pub channel_cap: usize,
}

type Found<I, O> = (I, anyhow::Result<Expansion<I, O>>);

/// Start the crawl from `seeds`. Outputs arrive on the returned source's stage; the crawl result
/// (ok, canceled, or the aborting error) on its report channel.
pub fn crawl<I, O>(
    done: &Done,
    seeds: Vec<I>,
    expand: Arc<dyn Expand<I, O>>,
    opts: &CrawlOpts,
) -> Source<O>
where
    I: Eq + Hash + Clone + Debug + Send + 'static,
    O: Send + 'static,
{
    let (work_tx, work_rx) = bounded::<I>(0);
    let (found_tx, found_rx) = bounded::<Found<I, O>>(opts.workers.max(1));
    let (out_tx, out_rx) = bounded::<O>(opts.channel_cap);
    let (report_tx, report) = bounded::<WalkResult>(1);

    let mut handles: Vec<JoinHandle<()>> = (0..opts.workers.max(1))
        .map(|_| {
            let work_rx = work_rx.clone();
            let found_tx = found_tx.clone();
            let expand = Arc::clone(&expand);
            let done = done.clone();
            thread::spawn(move || expander_loop(work_rx, found_tx, expand, done))
        })
        .collect();
    drop(found_tx);

    let dispatcher = Dispatcher {
        seen: HashSet::new(),
        queue: VecDeque::new(),
        in_flight: 0,
        skipped: 0,
        dedup: opts.dedup,
        policy: opts.policy,
        done: done.clone(),
    };
    let dispatcher_out = out_tx.clone();
    handles.push(thread::spawn(move || {
        let result = dispatcher.run(seeds, work_tx, found_rx, dispatcher_out);
        let _ = report_tx.send(result);
    }));

    Source {
        stage: Stage {
            rx: out_rx,
            handle: close_after_all("crawl", handles, out_tx),
        },
        report,
    }
}

fn expander_loop<I, O>(
    work_rx: Receiver<I>,
    found_tx: Sender<Found<I, O>>,
    expand: Arc<dyn Expand<I, O>>,
    done: Done,
) {
    while !done.is_canceled() {
        let Some(item) = recv_or_cancel(&work_rx, &done) else {
            break;
        };
        let result = expand.expand(&item);
        if !send_or_cancel(&found_tx, (item, result), &done) {
            break;
        }
    }
}

/// Every expander is gone: either they saw cancellation, or they panicked.
fn lost(done: &Done) -> PipelineError {
    if done.is_canceled() {
        PipelineError::WalkCanceled
    } else {
        PipelineError::WorkerPanicked { stage: "crawl" }
    }
}

struct Dispatcher<I> {
    seen: HashSet<I>,
    queue: VecDeque<I>,
    in_flight: usize,
    skipped: usize,
    dedup: bool,
    policy: ErrorPolicy,
    done: Done,
}

impl<I> Dispatcher<I>
where
    I: Eq + Hash + Clone + Debug,
{
    fn enqueue(&mut self, item: I) {
        if !self.dedup || self.seen.insert(item.clone()) {
            self.queue.push_back(item);
        }
    }

    /// Forward the outputs and queue the children of one finished expansion.
    fn absorb<O>(&mut self, found: Found<I, O>, out_tx: &Sender<O>, done: &Done) -> WalkResult {
        let (item, result) = found;
        match result {
            Ok(expansion) => {
                for output in expansion.outputs {
                    if !send_or_cancel(out_tx, output, done) {
                        return Err(PipelineError::WalkCanceled);
                    }
                }
                for child in expansion.children {
                    self.enqueue(child);
                }
            }
            Err(e) if self.policy == ErrorPolicy::Abort => {
                return Err(PipelineError::Expand {
                    item: format!("{item:?}"),
                    message: format!("{e:#}"),
                });
            }
            Err(e) => {
                warn!("skipping {item:?}: {e:#}");
                self.skipped += 1;
            }
        }
        Ok(())
    }

    fn run<O>(
        mut self,
        seeds: Vec<I>,
        work_tx: Sender<I>,
        found_rx: Receiver<Found<I, O>>,
        out_tx: Sender<O>,
    ) -> WalkResult {
        for seed in seeds {
            self.enqueue(seed);
        }
        let done = self.done.clone();
        let mut dispatched = 0_usize;
        while !(self.queue.is_empty() && self.in_flight == 0) {
            if done.is_canceled() {
                return Err(PipelineError::WalkCanceled);
            }
            let next = self.queue.pop_front();
            let mut sel = Select::new();
            let send_idx = next.as_ref().map(|_| sel.send(&work_tx));
            sel.recv(&found_rx);
            let done_idx = sel.recv(done.channel());
            let oper = sel.select();
            let idx = oper.index();

            if idx == done_idx {
                let _ = oper.recv(done.channel());
                return Err(PipelineError::WalkCanceled);
            }
            match next {
                Some(item) if send_idx == Some(idx) => {
                    if oper.send(&work_tx, item).is_err() {
                        return Err(lost(&done));
                    }
                    self.in_flight += 1;
                    dispatched += 1;
                }
                // An expansion came back first; the pending item goes back to the front.
                next => {
                    if let Some(item) = next {
                        self.queue.push_front(item);
                    }
                    let Ok(found) = oper.recv(&found_rx) else {
                        return Err(lost(&done));
                    };
                    self.in_flight -= 1;
                    self.absorb(found, &out_tx, &done)?;
                }
            }
        }
        debug!(
            "crawl: {} items expanded, {} skipped, {} distinct seen",
            dispatched,
            self.skipped,
            self.seen.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::cancel::CancelToken;
    use std::collections::HashMap;

    fn graph() -> Arc<HashMap<&'static str, Vec<&'static str>>> {
        Arc::new(HashMap::from([
            ("a", vec!["b", "c"]),
            ("b", vec!["a", "d"]),
            ("c", vec!["d", "e"]),
            ("d", vec!["a"]),
            ("e", vec![]),
        ]))
    }

    fn opts(workers: usize, policy: ErrorPolicy) -> CrawlOpts {
        CrawlOpts {
            workers,
            dedup: true,
            policy,
            channel_cap: 0,
        }
    }

    #[test]
    fn visits_each_node_once_and_terminates() {
        let token = CancelToken::new();
        let g = graph();
        let expand = move |node: &&'static str| -> anyhow::Result<Expansion<&'static str, String>> {
            Ok(Expansion {
                children: g.get(node).cloned().unwrap_or_default(),
                outputs: vec![node.to_string()],
            })
        };
        let expand: Arc<dyn Expand<&'static str, String>> = Arc::new(expand);
        let source = crawl(&token.done(), vec!["a"], expand, &opts(3, ErrorPolicy::Abort));
        let mut visited: Vec<String> = source.stage.rx.iter().collect();
        visited.sort();
        assert_eq!(visited, vec!["a", "b", "c", "d", "e"]);
        source.stage.handle.join().unwrap();
        assert!(source.report.recv().unwrap().is_ok());
    }

    #[test]
    fn abort_policy_reports_first_failure() {
        let token = CancelToken::new();
        let g = graph();
        let expand = move |node: &&'static str| -> anyhow::Result<Expansion<&'static str, ()>> {
            if *node == "d" {
                anyhow::bail!("boom");
            }
            Ok(Expansion {
                children: g.get(node).cloned().unwrap_or_default(),
                outputs: vec![],
            })
        };
        let expand: Arc<dyn Expand<&'static str, ()>> = Arc::new(expand);
        let source = crawl(&token.done(), vec!["a"], expand, &opts(2, ErrorPolicy::Abort));
        assert_eq!(source.stage.rx.iter().count(), 0);
        let err = source.report.recv().unwrap().unwrap_err();
        assert!(matches!(err, PipelineError::Expand { ref message, .. } if message == "boom"));
        token.cancel();
        source.stage.handle.join().unwrap();
    }

    #[test]
    fn single_expander_drains_wide_tree() {
        let token = CancelToken::new();
        let expand = |n: &u32| -> anyhow::Result<Expansion<u32, u32>> {
            Ok(Expansion {
                children: [2 * n + 1, 2 * n + 2].into_iter().filter(|c| *c < 500).collect(),
                outputs: vec![*n],
            })
        };
        let expand: Arc<dyn Expand<u32, u32>> = Arc::new(expand);
        let source = crawl(&token.done(), vec![0], expand, &opts(1, ErrorPolicy::Abort));
        let mut got: Vec<u32> = source.stage.rx.iter().collect();
        got.sort();
        assert_eq!(got, (0..500).collect::<Vec<_>>());
        assert!(source.report.recv().unwrap().is_ok());
        source.stage.handle.join().unwrap();
    }

    #[test]
    fn skip_policy_keeps_going() {
        let token = CancelToken::new();
        let g = graph();
        type Node = &'static str;
        let expand = move |node: &Node| -> anyhow::Result<Expansion<Node, Node>> {
            if *node == "c" {
                anyhow::bail!("unreachable host");
            }
            Ok(Expansion {
                children: g.get(node).cloned().unwrap_or_default(),
                outputs: vec![*node],
            })
        };
        let expand: Arc<dyn Expand<&'static str, &'static str>> = Arc::new(expand);
        let source = crawl(&token.done(), vec!["a"], expand, &opts(4, ErrorPolicy::Skip));
        let mut got: Vec<_> = source.stage.rx.iter().collect();
        got.sort();
        // "e" is only reachable through "c".
        assert_eq!(got, vec!["a", "b", "d"]);
        assert!(source.report.recv().unwrap().is_ok());
    }

    #[test]
    fn cancel_stops_an_endless_crawl() {
        let token = CancelToken::new();
        let expand = |n: &u64| -> anyhow::Result<Expansion<u64, u64>> {
            Ok(Expansion {
                children: vec![n + 1, n + 2],
                outputs: vec![*n],
            })
        };
        let expand: Arc<dyn Expand<u64, u64>> = Arc::new(expand);
        let source = crawl(&token.done(), vec![0_u64], expand, &opts(4, ErrorPolicy::Abort));
        for _ in 0..50 {
            source.stage.rx.recv().unwrap();
        }
        token.cancel();
        source.stage.handle.join().unwrap();
        let result = source.report.recv().unwrap();
        assert!(matches!(result, Err(PipelineError::WalkCanceled)));
    }
}
