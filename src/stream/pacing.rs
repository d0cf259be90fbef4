//! Render pacing for viewer state streams

use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};

use crate::types::ViewerState;

pin_project! {
    /// Yields at most one [`ViewerState`] per interval, newest wins.
    ///
    /// Terminal states (DISCONNECTED, ERROR) skip the interval so teardown
    /// is rendered as soon as it happens.
    pub struct Paced<S> {
        #[pin]
        states: S,
        interval: Interval,
        pending: Option<ViewerState>,
        finished: bool,
    }
}

impl<S> Paced<S>
where
    S: Stream<Item = ViewerState>,
{
    pub fn new(states: S, period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { states, interval, pending: None, finished: false }
    }
}

impl<S> Stream for Paced<S>
where
    S: Stream<Item = ViewerState>,
{
    type Item = ViewerState;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        while !*this.finished {
            match this.states.as_mut().poll_next(cx) {
                Poll::Ready(Some(state)) if state.status.is_terminal() => {
                    *this.pending = None;
                    return Poll::Ready(Some(state));
                }
                Poll::Ready(Some(state)) => *this.pending = Some(state),
                Poll::Ready(None) => *this.finished = true,
                Poll::Pending => break,
            }
        }

        if this.pending.is_none() {
            return if *this.finished { Poll::Ready(None) } else { Poll::Pending };
        }

        match this.interval.poll_tick(cx) {
            Poll::Ready(_) => Poll::Ready(this.pending.take()),
            Poll::Pending => Poll::Pending,
        }
    }
}
