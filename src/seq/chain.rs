//! Sequential concatenation.

use super::{Advance, Sequence};
use crate::error::{Error, Result};
use std::pin::Pin;
use std::task::{Context, Poll};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    First,
    DisposingFirst,
    Second,
    Done,
}

/// Sequence for the [`chain`](super::SequenceExt::chain) method.
///
/// The first cursor is disposed as soon as it is exhausted, before the
/// second one is pulled, so its resources are not held across the tail.
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct Chain<S1, S2> {
    first: S1,
    second: S2,
    phase: Phase,
    first_disposed: bool,
    first_dispose_err: Option<Error>,
    disposed: bool,
}

impl<S1, S2> Chain<S1, S2> {
    pub(crate) fn new(first: S1, second: S2) -> Self {
        Self {
            first,
            second,
            phase: Phase::First,
            first_disposed: false,
            first_dispose_err: None,
            disposed: false,
        }
    }
}

impl<S1, S2> Sequence for Chain<S1, S2>
where
    S1: Sequence + Unpin,
    S2: Sequence<Item = S1::Item> + Unpin,
{
    type Item = S1::Item;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        let this = &mut *self;
        loop {
            match this.phase {
                Phase::First => match Pin::new(&mut this.first).poll_advance(cx) {
                    Poll::Ready(Ok(Some(item))) => return Poll::Ready(Ok(Some(item))),
                    Poll::Ready(Ok(None)) => this.phase = Phase::DisposingFirst,
                    Poll::Ready(Err(e)) => {
                        this.phase = Phase::Done;
                        return Poll::Ready(Err(e));
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Phase::DisposingFirst => match Pin::new(&mut this.first).poll_dispose(cx) {
                    Poll::Ready(Ok(())) => {
                        this.first_disposed = true;
                        this.phase = Phase::Second;
                    }
                    Poll::Ready(Err(e)) => {
                        this.first_disposed = true;
                        this.phase = Phase::Done;
                        return Poll::Ready(Err(e));
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Phase::Second => match Pin::new(&mut this.second).poll_advance(cx) {
                    Poll::Ready(Ok(Some(item))) => return Poll::Ready(Ok(Some(item))),
                    Poll::Ready(Ok(None)) => {
                        this.phase = Phase::Done;
                        return Poll::Ready(Ok(None));
                    }
                    Poll::Ready(Err(e)) => {
                        this.phase = Phase::Done;
                        return Poll::Ready(Err(e));
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Phase::Done => return Poll::Ready(Ok(None)),
            }
        }
    }

    fn poll_dispose(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let this = &mut *self;
        if this.disposed {
            return Poll::Ready(Ok(()));
        }
        if !this.first_disposed {
            match Pin::new(&mut this.first).poll_dispose(cx) {
                Poll::Ready(result) => {
                    this.first_disposed = true;
                    if let Err(e) = result {
                        this.first_dispose_err = Some(e);
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
        let second_result = match Pin::new(&mut this.second).poll_dispose(cx) {
            Poll::Ready(result) => result,
            Poll::Pending => return Poll::Pending,
        };
        this.disposed = true;
        this.phase = Phase::Done;
        Poll::Ready(match (this.first_dispose_err.take(), second_result) {
            (None, result) => result,
            (Some(e), Ok(())) => Err(e),
            (Some(e), Err(second_err)) => {
                tracing::warn!(error = %second_err, "second disposal also failed");
                Err(e)
            }
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.phase {
            Phase::First | Phase::DisposingFirst => {
                let (l1, u1) = self.first.size_hint();
                let (l2, u2) = self.second.size_hint();
                let lower = l1.saturating_add(l2);
                let upper = match (u1, u2) {
                    (Some(a), Some(b)) => a.checked_add(b),
                    _ => None,
                };
                (lower, upper)
            }
            Phase::Second => self.second.size_hint(),
            Phase::Done => (0, Some(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::seq::SequenceExt;
    use crate::source;
    use crate::test_utils::{block_on, init_test, DisposeProbe};

    #[test]
    fn chain_concatenates() {
        init_test("chain_concatenates");
        let out = block_on(
            source::iter(vec![1, 2])
                .chain(source::iter(vec![3, 4]))
                .to_vec(),
        )
        .expect("drain");
        crate::assert_with_log!(out == vec![1, 2, 3, 4], "chained", vec![1, 2, 3, 4], out);
        crate::test_complete!("chain_concatenates");
    }

    #[test]
    fn first_disposed_before_second_is_pulled() {
        init_test("first_disposed_before_second_is_pulled");
        let (first, first_counters) = DisposeProbe::new(vec![1]);
        let (second, second_counters) = DisposeProbe::new(vec![2]);
        let mut chained = first.chain(second);

        let one = block_on(chained.next()).expect("advance");
        assert_eq!(one, Some(1));
        let two = block_on(chained.next()).expect("advance");
        assert_eq!(two, Some(2));
        // Pulling into the second leg means the first leg is already gone.
        crate::assert_with_log!(
            first_counters.disposes() == 1,
            "first disposed",
            1,
            first_counters.disposes()
        );
        assert_eq!(second_counters.disposes(), 0);

        block_on(chained.dispose()).expect("dispose");
        assert_eq!(first_counters.disposes(), 1);
        assert_eq!(second_counters.disposes(), 1);
        crate::test_complete!("first_disposed_before_second_is_pulled");
    }

    #[test]
    fn dispose_midway_releases_both() {
        init_test("dispose_midway_releases_both");
        let (first, first_counters) = DisposeProbe::new(vec![1, 2, 3]);
        let (second, second_counters) = DisposeProbe::new(vec![4]);
        let mut chained = first.chain(second);
        let _ = block_on(chained.next()).expect("advance");
        block_on(chained.dispose()).expect("dispose");
        assert_eq!(first_counters.disposes(), 1);
        assert_eq!(second_counters.disposes(), 1);
        crate::test_complete!("dispose_midway_releases_both");
    }

    #[test]
    fn chain_with_empty_legs() {
        init_test("chain_with_empty_legs");
        let out = block_on(
            source::empty::<i32>()
                .chain(source::iter(vec![1]))
                .chain(source::empty())
                .to_vec(),
        )
        .expect("drain");
        crate::assert_with_log!(out == vec![1], "single", vec![1], out);
        crate::test_complete!("chain_with_empty_legs");
    }
}
