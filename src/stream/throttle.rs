//! Rate limiting for frame subscriptions

use futures::Stream;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep, sleep};

/// Extension trait adding [`Throttle`] to any stream.
pub trait ThrottleExt: Stream {
    /// Emit at most one item per `period`, latest item wins.
    fn throttle(self, period: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, period)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// Stream combinator delivering at most one item per period.
    ///
    /// Items arriving while the gate is closed replace each other, so a slow
    /// subscriber always sees the newest frame. The first item passes at once.
    pub struct Throttle<S: Stream> {
        #[pin]
        inner: S,
        #[pin]
        gate: Sleep,
        period: Duration,
        latest: Option<S::Item>,
        finished: bool,
    }
}

impl<S: Stream> Throttle<S> {
    pub fn new(inner: S, period: Duration) -> Self {
        Self { inner, gate: sleep(Duration::ZERO), period, latest: None, finished: false }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        while !*this.finished {
            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.latest = Some(item),
                Poll::Ready(None) => *this.finished = true,
                Poll::Pending => break,
            }
        }

        if this.latest.is_none() {
            return if *this.finished { Poll::Ready(None) } else { Poll::Pending };
        }
        if this.gate.as_mut().poll(cx).is_pending() {
            return Poll::Pending;
        }

        let next_open = Instant::now() + *this.period;
        this.gate.as_mut().reset(next_open);
        Poll::Ready(this.latest.take())
    }
}
