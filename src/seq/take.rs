//! Take combinators.

use super::{Advance, Sequence};
use crate::error::Result;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Sequence for the [`take`](super::SequenceExt::take) method.
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct Take<S> {
    upstream: S,
    remaining: usize,
    disposed: bool,
}

impl<S> Take<S> {
    pub(crate) fn new(upstream: S, remaining: usize) -> Self {
        Self {
            upstream,
            remaining,
            disposed: false,
        }
    }
}

impl<S: Sequence + Unpin> Sequence for Take<S> {
    type Item = S::Item;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        if self.remaining == 0 {
            return Poll::Ready(Ok(None));
        }

        let this = &mut *self;
        match Pin::new(&mut this.upstream).poll_advance(cx) {
            Poll::Ready(Ok(Some(item))) => {
                this.remaining -= 1;
                Poll::Ready(Ok(Some(item)))
            }
            Poll::Ready(Ok(None)) => {
                this.remaining = 0;
                Poll::Ready(Ok(None))
            }
            Poll::Ready(Err(e)) => {
                this.remaining = 0;
                Poll::Ready(Err(e))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_dispose(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let this = &mut *self;
        if this.disposed {
            return Poll::Ready(Ok(()));
        }
        let result = match Pin::new(&mut this.upstream).poll_dispose(cx) {
            Poll::Ready(result) => result,
            Poll::Pending => return Poll::Pending,
        };
        this.disposed = true;
        this.remaining = 0;
        Poll::Ready(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.remaining == 0 {
            return (0, Some(0));
        }

        let (lower, upper) = self.upstream.size_hint();
        let lower = lower.min(self.remaining);
        let upper = upper.map_or(Some(self.remaining), |x| Some(x.min(self.remaining)));

        (lower, upper)
    }
}

/// Sequence for the [`take_while`](super::SequenceExt::take_while) method.
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct TakeWhile<S, P> {
    upstream: S,
    predicate: P,
    done: bool,
    disposed: bool,
}

impl<S, P> TakeWhile<S, P> {
    pub(crate) fn new(upstream: S, predicate: P) -> Self {
        Self {
            upstream,
            predicate,
            done: false,
            disposed: false,
        }
    }
}

impl<S, P> Sequence for TakeWhile<S, P>
where
    S: Sequence + Unpin,
    P: FnMut(&S::Item) -> bool + Unpin,
{
    type Item = S::Item;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        if self.done {
            return Poll::Ready(Ok(None));
        }

        let this = &mut *self;
        match Pin::new(&mut this.upstream).poll_advance(cx) {
            Poll::Ready(Ok(Some(item))) => {
                if (this.predicate)(&item) {
                    Poll::Ready(Ok(Some(item)))
                } else {
                    this.done = true;
                    Poll::Ready(Ok(None))
                }
            }
            Poll::Ready(Ok(None)) => {
                this.done = true;
                Poll::Ready(Ok(None))
            }
            Poll::Ready(Err(e)) => {
                this.done = true;
                Poll::Ready(Err(e))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_dispose(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let this = &mut *self;
        if this.disposed {
            return Poll::Ready(Ok(()));
        }
        let result = match Pin::new(&mut this.upstream).poll_dispose(cx) {
            Poll::Ready(result) => result,
            Poll::Pending => return Poll::Pending,
        };
        this.disposed = true;
        this.done = true;
        Poll::Ready(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        (0, self.upstream.size_hint().1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::SequenceExt;
    use crate::source;
    use crate::test_utils::{block_on, init_test, DisposeProbe};

    #[test]
    fn take_limits() {
        init_test("take_limits");
        let out = block_on(source::iter(vec![1, 2, 3, 4, 5]).take(3).to_vec()).expect("drain");
        crate::assert_with_log!(out == vec![1, 2, 3], "taken", vec![1, 2, 3], out);
        crate::test_complete!("take_limits");
    }

    #[test]
    fn take_zero_never_pulls() {
        init_test("take_zero_never_pulls");
        let (probe, counters) = DisposeProbe::new(vec![1, 2, 3]);
        let out = block_on(probe.take(0).to_vec()).expect("drain");
        assert!(out.is_empty());
        crate::assert_with_log!(
            counters.advances() == 0,
            "no upstream pulls",
            0,
            counters.advances()
        );
        crate::test_complete!("take_zero_never_pulls");
    }

    #[test]
    fn take_more_than_available() {
        init_test("take_more_than_available");
        let count = block_on(source::iter(vec![1, 2]).take(10).count()).expect("count");
        crate::assert_with_log!(count == 2, "count", 2, count);
        crate::test_complete!("take_more_than_available");
    }

    #[test]
    fn take_while_stops_at_first_failure() {
        init_test("take_while_stops_at_first_failure");
        let out = block_on(
            source::iter(vec![1, 2, 3, 2, 1])
                .take_while(|x| *x < 3)
                .to_vec(),
        )
        .expect("drain");
        crate::assert_with_log!(out == vec![1, 2], "prefix", vec![1, 2], out);
        crate::test_complete!("take_while_stops_at_first_failure");
    }

    #[test]
    fn take_size_hint() {
        init_test("take_size_hint");
        let seq = source::iter(vec![1, 2, 3, 4, 5]).take(3);
        let hint = seq.size_hint();
        crate::assert_with_log!(hint == (3, Some(3)), "hint", (3, Some(3)), hint);
        crate::test_complete!("take_size_hint");
    }
}
