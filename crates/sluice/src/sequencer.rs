//! Consumer-side reordering of outcomes.
//!
//! Workers emit outcomes in completion order. In [`DeliveryMode::Ordered`] the
//! [`Sequencer`] holds early arrivals keyed by sequence number and releases
//! them once every lower sequence number has been released.
//!
//! The buffer never holds more than `window` outcomes. An outcome that arrives
//! while the buffer is full is released immediately as
//! [`JobError::ReorderOverflow`] under its own sequence number, and that
//! number is remembered so the release cursor can step over it later.

use crate::{DeliveryMode, JobError, Outcome};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug)]
pub(crate) struct Sequencer<T> {
    mode: DeliveryMode,
    window: usize,
    next: u64,
    pending: BTreeMap<u64, Outcome<T>>,
    overflowed: BTreeSet<u64>,
    ready: VecDeque<Outcome<T>>,
}

impl<T> Sequencer<T> {
    pub(crate) fn new(mode: DeliveryMode, window: usize) -> Self {
        Self {
            mode,
            window,
            next: 0,
            pending: BTreeMap::new(),
            overflowed: BTreeSet::new(),
            ready: VecDeque::new(),
        }
    }

    /// Accepts one outcome from the result sink.
    pub(crate) fn push(&mut self, outcome: Outcome<T>) {
        if self.mode == DeliveryMode::Unordered {
            self.ready.push_back(outcome);
            return;
        }

        let seq = outcome.seq;
        if seq == self.next {
            self.ready.push_back(outcome);
            self.next += 1;
            self.advance();
        } else if seq < self.next {
            // Only reachable after `finish` skipped a gap.
            self.ready.push_back(outcome);
        } else if self.pending.len() >= self.window {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "Reorder window of {} exceeded, releasing seq {} early",
                self.window,
                seq
            );
            self.overflowed.insert(seq);
            self.ready.push_back(Outcome::err(
                seq,
                JobError::ReorderOverflow {
                    window: self.window,
                },
            ));
        } else {
            self.pending.insert(seq, outcome);
        }
    }

    /// Takes the next releasable outcome, if any.
    pub(crate) fn pop(&mut self) -> Option<Outcome<T>> {
        self.ready.pop_front()
    }

    /// Releases everything still buffered, lowest sequence first.
    ///
    /// Called once the sink is closed: no outcome can fill a remaining gap.
    pub(crate) fn finish(&mut self) {
        while let Some((seq, outcome)) = self.pending.pop_first() {
            self.next = seq + 1;
            self.ready.push_back(outcome);
        }
        self.overflowed.clear();
    }

    #[cfg(test)]
    pub(crate) fn buffered(&self) -> usize {
        self.pending.len()
    }

    fn advance(&mut self) {
        loop {
            if let Some(outcome) = self.pending.remove(&self.next) {
                self.ready.push_back(outcome);
            } else if !self.overflowed.remove(&self.next) {
                break;
            }
            self.next += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(seq: &mut Sequencer<u64>) -> Vec<u64> {
        core::iter::from_fn(|| seq.pop()).map(|o| o.seq).collect()
    }

    #[test]
    fn unordered_passes_through() {
        let mut s = Sequencer::new(DeliveryMode::Unordered, 1);
        for seq in [3, 1, 2, 0] {
            s.push(Outcome::ok(seq, seq * 10));
        }
        assert_eq!(drain(&mut s), vec![3, 1, 2, 0]);
    }

    #[test]
    fn ordered_releases_in_sequence() {
        let mut s = Sequencer::new(DeliveryMode::Ordered, 8);
        s.push(Outcome::ok(2, 20));
        s.push(Outcome::ok(1, 10));
        assert!(s.pop().is_none());
        assert_eq!(s.buffered(), 2);

        s.push(Outcome::ok(0, 0));
        assert_eq!(drain(&mut s), vec![0, 1, 2]);

        s.push(Outcome::ok(4, 40));
        s.push(Outcome::ok(3, 30));
        assert_eq!(drain(&mut s), vec![3, 4]);
        assert_eq!(s.buffered(), 0);
    }

    #[test]
    fn ordered_overflow_is_released_early_as_error() {
        let mut s = Sequencer::new(DeliveryMode::Ordered, 2);
        s.push(Outcome::ok(1, 10));
        s.push(Outcome::ok(2, 20));
        s.push(Outcome::ok(3, 30));

        let early = s.pop().unwrap();
        assert_eq!(early.seq, 3);
        assert_eq!(
            early.result,
            Err(JobError::ReorderOverflow { window: 2 })
        );
        assert!(s.pop().is_none());

        // The cursor must step over seq 3 once the gap at 0 is filled.
        s.push(Outcome::ok(0, 0));
        s.push(Outcome::ok(4, 40));
        assert_eq!(drain(&mut s), vec![0, 1, 2, 4]);
    }

    #[test]
    fn finish_flushes_gaps() {
        let mut s = Sequencer::new(DeliveryMode::Ordered, 8);
        s.push(Outcome::ok(0, 0));
        s.push(Outcome::ok(3, 30));
        s.push(Outcome::ok(2, 20));
        assert_eq!(drain(&mut s), vec![0]);

        s.finish();
        assert_eq!(drain(&mut s), vec![2, 3]);

        // A straggler below the cursor is still delivered.
        s.push(Outcome::ok(1, 10));
        assert_eq!(drain(&mut s), vec![1]);
    }
}
