use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use portable_atomic::{AtomicBool, Ordering};

/// Cooperative stop flag for thread workers.
///
/// The flag itself is a single atomic that workers poll between jobs. Threads
/// parked inside a channel operation cannot poll, so the signal also owns a
/// channel that never carries a message: raising the signal drops its only
/// sender, which makes every `recv` on [`StopSignal::waker`] ready at once.
#[derive(Debug)]
pub(crate) struct StopSignal {
    raised: AtomicBool,
    wake_tx: Mutex<Option<Sender<()>>>,
    wake_rx: Receiver<()>,
}

impl StopSignal {
    pub(crate) fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(0);
        Self {
            raised: AtomicBool::new(false),
            wake_tx: Mutex::new(Some(wake_tx)),
            wake_rx,
        }
    }

    /// Raises the signal. Returns `false` if it was already raised.
    pub(crate) fn raise(&self) -> bool {
        if self.raised.swap(true, Ordering::AcqRel) {
            return false;
        }
        drop(self.wake_tx.lock().take());
        true
    }

    pub(crate) fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// A receiver that becomes permanently ready once the signal is raised.
    pub(crate) const fn waker(&self) -> &Receiver<()> {
        &self.wake_rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread, time::Duration};

    #[test]
    fn raise_is_idempotent() {
        let signal = StopSignal::new();
        assert!(!signal.is_raised());
        assert!(signal.raise());
        assert!(!signal.raise());
        assert!(signal.is_raised());
    }

    #[test]
    fn raise_wakes_parked_threads() {
        let signal = Arc::new(StopSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.waker().recv().is_err())
        };

        thread::sleep(Duration::from_millis(20));
        signal.raise();
        assert!(waiter.join().unwrap());
    }
}
