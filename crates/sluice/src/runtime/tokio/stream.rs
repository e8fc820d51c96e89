use crate::{Outcome, sequencer::Sequencer};
use async_channel::Receiver;
use core::{
    pin::Pin,
    task::{Context, Poll, ready},
};
use futures::Stream;
use pin_project_lite::pin_project;

pin_project! {
    /// Stream of a [`TaskPool`](super::TaskPool)'s outcomes.
    ///
    /// Finite and not restartable: it ends once the pool has shut down and
    /// every outcome has been yielded. In ordered mode it yields outcomes in
    /// submission order.
    #[must_use = "streams do nothing unless polled"]
    pub struct ResultStream<Out> {
        #[pin]
        rx: Receiver<Outcome<Out>>,
        sequencer: Sequencer<Out>,
        closed: bool,
    }
}

impl<Out> ResultStream<Out> {
    pub(crate) const fn new(rx: Receiver<Outcome<Out>>, sequencer: Sequencer<Out>) -> Self {
        Self {
            rx,
            sequencer,
            closed: false,
        }
    }
}

impl<Out> Stream for ResultStream<Out> {
    type Item = Outcome<Out>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if let Some(outcome) = this.sequencer.pop() {
                return Poll::Ready(Some(outcome));
            }
            if *this.closed {
                return Poll::Ready(None);
            }
            match ready!(this.rx.as_mut().poll_next(cx)) {
                Some(outcome) => this.sequencer.push(outcome),
                None => {
                    *this.closed = true;
                    this.sequencer.finish();
                }
            }
        }
    }
}
