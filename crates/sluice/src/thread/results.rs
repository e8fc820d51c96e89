use crate::{Outcome, sequencer::Sequencer};
use crossbeam_channel::{Receiver, TryRecvError};

/// Blocking iterator over a [`ThreadPool`](super::ThreadPool)'s outcomes.
///
/// Finite and not restartable: it ends once the pool has shut down and every
/// outcome has been yielded. In ordered mode it yields outcomes in submission
/// order.
#[derive(Debug)]
pub struct Results<Out> {
    rx: Receiver<Outcome<Out>>,
    sequencer: Sequencer<Out>,
    closed: bool,
}

impl<Out> Results<Out> {
    pub(crate) const fn new(rx: Receiver<Outcome<Out>>, sequencer: Sequencer<Out>) -> Self {
        Self {
            rx,
            sequencer,
            closed: false,
        }
    }

    /// Returns the next outcome if one can be released without blocking.
    pub fn try_next(&mut self) -> Option<Outcome<Out>> {
        loop {
            if let Some(outcome) = self.sequencer.pop() {
                return Some(outcome);
            }
            if self.closed {
                return None;
            }
            match self.rx.try_recv() {
                Ok(outcome) => self.sequencer.push(outcome),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => self.close(),
            }
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.sequencer.finish();
    }
}

impl<Out> Iterator for Results<Out> {
    type Item = Outcome<Out>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(outcome) = self.sequencer.pop() {
                return Some(outcome);
            }
            if self.closed {
                return None;
            }
            match self.rx.recv() {
                Ok(outcome) => self.sequencer.push(outcome),
                Err(_) => self.close(),
            }
        }
    }
}
