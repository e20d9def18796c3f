//! Skip combinators.

use super::{Advance, Sequence};
use crate::error::Result;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Sequence for the [`skip`](super::SequenceExt::skip) method.
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct Skip<S> {
    upstream: S,
    remaining: usize,
    disposed: bool,
}

impl<S> Skip<S> {
    pub(crate) fn new(upstream: S, remaining: usize) -> Self {
        Self {
            upstream,
            remaining,
            disposed: false,
        }
    }
}

impl<S: Sequence + Unpin> Sequence for Skip<S> {
    type Item = S::Item;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        let this = &mut *self;
        while this.remaining > 0 {
            match Pin::new(&mut this.upstream).poll_advance(cx) {
                Poll::Ready(Ok(Some(_))) => this.remaining -= 1,
                Poll::Ready(Ok(None)) => return Poll::Ready(Ok(None)),
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            }
        }

        Pin::new(&mut this.upstream).poll_advance(cx)
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
        Poll::Ready(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.upstream.size_hint();
        let lower = lower.saturating_sub(self.remaining);
        let upper = upper.map(|x| x.saturating_sub(self.remaining));
        (lower, upper)
    }
}

/// Sequence for the [`skip_while`](super::SequenceExt::skip_while) method.
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct SkipWhile<S, P> {
    upstream: S,
    predicate: P,
    forwarding: bool,
    disposed: bool,
}

impl<S, P> SkipWhile<S, P> {
    pub(crate) fn new(upstream: S, predicate: P) -> Self {
        Self {
            upstream,
            predicate,
            forwarding: false,
            disposed: false,
        }
    }
}

impl<S, P> Sequence for SkipWhile<S, P>
where
    S: Sequence + Unpin,
    P: FnMut(&S::Item) -> bool + Unpin,
{
    type Item = S::Item;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        let this = &mut *self;
        if this.forwarding {
            return Pin::new(&mut this.upstream).poll_advance(cx);
        }

        loop {
            match Pin::new(&mut this.upstream).poll_advance(cx) {
                Poll::Ready(Ok(Some(item))) => {
                    if !(this.predicate)(&item) {
                        this.forwarding = true;
                        return Poll::Ready(Ok(Some(item)));
                    }
                }
                Poll::Ready(Ok(None)) => return Poll::Ready(Ok(None)),
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            }
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
        Poll::Ready(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.upstream.size_hint();
        if self.forwarding {
            (lower, upper)
        } else {
            (0, upper)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::SequenceExt;
    use crate::source;
    use crate::test_utils::{block_on, init_test};

    #[test]
    fn skip_discards_prefix() {
        init_test("skip_discards_prefix");
        let out = block_on(source::iter(vec![1, 2, 3, 4, 5]).skip(2).to_vec()).expect("drain");
        crate::assert_with_log!(out == vec![3, 4, 5], "suffix", vec![3, 4, 5], out);
        crate::test_complete!("skip_discards_prefix");
    }

    #[test]
    fn skip_past_end_is_empty() {
        init_test("skip_past_end_is_empty");
        let out = block_on(source::iter(vec![1, 2]).skip(5).to_vec()).expect("drain");
        assert!(out.is_empty());
        crate::test_complete!("skip_past_end_is_empty");
    }

    #[test]
    fn skip_while_forwards_after_first_failure() {
        init_test("skip_while_forwards_after_first_failure");
        let out = block_on(
            source::iter(vec![1, 2, 3, 1, 2])
                .skip_while(|x| *x < 3)
                .to_vec(),
        )
        .expect("drain");
        crate::assert_with_log!(out == vec![3, 1, 2], "suffix", vec![3, 1, 2], out);
        crate::test_complete!("skip_while_forwards_after_first_failure");
    }

    #[test]
    fn skip_size_hint() {
        init_test("skip_size_hint");
        let seq = source::iter(vec![1, 2, 3, 4, 5]).skip(2);
        let hint = seq.size_hint();
        crate::assert_with_log!(hint == (3, Some(3)), "hint", (3, Some(3)), hint);
        crate::test_complete!("skip_size_hint");
    }
}
