//! Fan-in: multiplex several stages onto one channel.

use crossbeam_channel::bounded;
use log::debug;
use std::thread::{self, JoinHandle};

use super::cancel::Done;
use super::context::{Stage, StageHandle, close_after_all, recv_or_cancel, send_or_cancel};

/// Start one relay per input that forwards until its input closes or `done` fires. The merged
/// output closes once every relay has finished. Order within one input is preserved; across
/// inputs it is unspecified.
///
/// Returns the merged stage and the handles of the input stages, which the caller joins along
/// with the merged one.
pub fn merge<T: Send + 'static>(
    done: &Done,
    inputs: Vec<Stage<T>>,
    channel_cap: usize,
) -> (Stage<T>, Vec<StageHandle>) {
    let (tx, rx) = bounded::<T>(channel_cap);
    let mut upstream = Vec::with_capacity(inputs.len());
    let relays: Vec<JoinHandle<()>> = inputs
        .into_iter()
        .map(|stage| {
            let (input, handle) = stage.into_parts();
            upstream.push(handle);
            let tx = tx.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut forwarded = 0_usize;
                while let Some(value) = recv_or_cancel(&input, &done) {
                    if !send_or_cancel(&tx, value, &done) {
                        break;
                    }
                    forwarded += 1;
                }
                debug!("merge: relay done after {forwarded} items");
            })
        })
        .collect();
    let merged = Stage {
        rx,
        handle: close_after_all("merge", relays, tx),
    };
    (merged, upstream)
}
