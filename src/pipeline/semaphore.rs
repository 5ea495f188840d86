//! Counting semaphore built on a bounded channel: each held permit is one buffered message.
//! Acquire is cancellable; release happens when the [`Permit`] is dropped, including on the
//! error and panic paths.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select};

use super::cancel::Done;

#[derive(Clone)]
pub struct Semaphore {
    slots: Sender<()>,
    held: Receiver<()>,
    capacity: usize,
}

/// A held slot. Dropping it releases the slot.
pub struct Permit {
    held: Receiver<()>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        // The matching message was buffered by acquire, so this never blocks.
        let _ = self.held.try_recv();
    }
}

impl Semaphore {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (slots, held) = bounded(capacity);
        Self {
            slots,
            held,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.capacity - self.slots.len()
    }

    /// Wait for a slot, or return `None` if `done` fires first.
    pub fn acquire(&self, done: &Done) -> Option<Permit> {
        select! {
            send(self.slots, ()) -> res => res.ok().map(|_| self.permit()),
            recv(done.channel()) -> _ => None,
        }
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<Permit> {
        match self.slots.try_send(()) {
            Ok(()) => Some(self.permit()),
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => None,
        }
    }

    fn permit(&self) -> Permit {
        Permit {
            held: self.held.clone(),
        }
    }
}
