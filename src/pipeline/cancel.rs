//! One-shot broadcast cancellation.
//!
//! A [`CancelToken`] holds the only sender of a channel that never carries a message. Canceling
//! drops that sender, which disconnects the channel: every [`Done`] observer then sees a receive
//! that completes immediately, whether it polls or waits on it inside `select!`. The owner never
//! needs to know how many observers exist.

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use std::sync::{Arc, Mutex};

/// Uninhabited message type: nothing is ever sent on the cancellation channel.
pub enum Never {}

/// Observer side of a [`CancelToken`]. Cheap to clone; hand one to every stage.
#[derive(Clone)]
pub struct Done {
    rx: Receiver<Never>,
}

impl Done {
    /// Non-blocking poll: true once the token has been canceled.
    pub fn is_canceled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Channel to use as a `recv(..)` arm in `select!`. It becomes ready only on cancellation.
    pub fn channel(&self) -> &Receiver<Never> {
        &self.rx
    }

    /// Block until canceled.
    pub fn wait(&self) {
        let _ = self.rx.recv();
    }
}

/// Owner side of the broadcast. Clones share the same signal.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<Mutex<Option<Sender<Never>>>>,
    done: Done,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded::<Never>(0);
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
            done: Done { rx },
        }
    }

    /// Observer handle for a stage.
    pub fn done(&self) -> Done {
        self.done.clone()
    }

    /// Fire the broadcast. Idempotent: only the first call has an effect.
    pub fn cancel(&self) {
        let mut slot = match self.tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.take().is_some() {
            log::debug!("cancellation broadcast");
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.done.is_canceled()
    }

    /// Guard that cancels the token when dropped, so every return path of the owning scope
    /// broadcasts.
    pub fn drop_guard(&self) -> CancelGuard {
        CancelGuard {
            token: self.clone(),
        }
    }
}

/// Cancels its token on drop. See [`CancelToken::drop_guard`].
pub struct CancelGuard {
    token: CancelToken,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::select;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn starts_active() {
        let token = CancelToken::new();
        assert!(!token.is_canceled());
        assert!(!token.done().is_canceled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        token.clone().cancel();
        assert!(token.is_canceled());
    }

    #[test]
    fn guard_cancels_on_scope_exit() {
        let token = CancelToken::new();
        {
            let _guard = token.drop_guard();
            assert!(!token.is_canceled());
        }
        assert!(token.is_canceled());
    }

    #[test]
    fn wakes_every_observer() {
        let token = CancelToken::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let done = token.done();
                thread::spawn(move || done.wait())
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn select_arm_fires_after_cancel() {
        let token = CancelToken::new();
        let done = token.done();
        let (_tx, rx) = bounded::<u32>(0);
        token.cancel();
        let fired = select! {
            recv(rx) -> _ => false,
            recv(done.channel()) -> _ => true,
        };
        assert!(fired);
    }
}
