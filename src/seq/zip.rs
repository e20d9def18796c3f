//! Pairwise combination of two sequences.

use super::{Advance, Sequence};
use crate::error::{Error, Result};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Sequence for the [`zip`](super::SequenceExt::zip) method.
///
/// Pulls strictly in order: one element from the first sequence, then one
/// from the second. Either side ending ends the pair stream; an element
/// already pulled from the first side when the second ends is discarded.
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct Zip<S1: Sequence, S2> {
    first: S1,
    second: S2,
    held: Option<S1::Item>,
    done: bool,
    first_disposed: bool,
    first_dispose_err: Option<Error>,
    disposed: bool,
}

impl<S1: Sequence, S2> Zip<S1, S2> {
    pub(crate) fn new(first: S1, second: S2) -> Self {
        Self {
            first,
            second,
            held: None,
            done: false,
            first_disposed: false,
            first_dispose_err: None,
            disposed: false,
        }
    }
}

impl<S1, S2> Sequence for Zip<S1, S2>
where
    S1: Sequence + Unpin,
    S1::Item: Unpin,
    S2: Sequence + Unpin,
{
    type Item = (S1::Item, S2::Item);

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(Ok(None));
        }

        loop {
            if this.held.is_none() {
                match Pin::new(&mut this.first).poll_advance(cx) {
                    Poll::Ready(Ok(Some(item))) => this.held = Some(item),
                    Poll::Ready(Ok(None)) => {
                        this.done = true;
                        return Poll::Ready(Ok(None));
                    }
                    Poll::Ready(Err(e)) => {
                        this.done = true;
                        return Poll::Ready(Err(e));
                    }
                    Poll::Pending => return Poll::Pending,
                }
            }

            match Pin::new(&mut this.second).poll_advance(cx) {
                Poll::Ready(Ok(Some(second_item))) => {
                    let Some(first_item) = this.held.take() else {
                        continue;
                    };
                    return Poll::Ready(Ok(Some((first_item, second_item))));
                }
                Poll::Ready(Ok(None)) => {
                    this.held = None;
                    this.done = true;
                    return Poll::Ready(Ok(None));
                }
                Poll::Ready(Err(e)) => {
                    this.done = true;
                    return Poll::Ready(Err(e));
                }
                Poll::Pending => return Poll::Pending,
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
        this.done = true;
        this.held = None;
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
        if self.done {
            return (0, Some(0));
        }
        let held = usize::from(self.held.is_some());
        let (l1, u1) = self.first.size_hint();
        let (l2, u2) = self.second.size_hint();
        let lower = (l1.saturating_add(held)).min(l2);
        let upper = match (u1, u2) {
            (Some(a), Some(b)) => Some(a.saturating_add(held).min(b)),
            (Some(a), None) => Some(a.saturating_add(held)),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
        (lower, upper)
    }
}

#[cfg(test)]
mod tests {
    use crate::seq::{Sequence, SequenceExt};
    use crate::source;
    use crate::test_utils::{block_on, init_test, DisposeProbe};

    #[test]
    fn zip_pairs_in_order() {
        init_test("zip_pairs_in_order");
        let out = block_on(
            source::iter(vec![1, 2, 3])
                .zip(source::iter(vec!["a", "b", "c"]))
                .to_vec(),
        )
        .expect("drain");
        let expected = vec![(1, "a"), (2, "b"), (3, "c")];
        crate::assert_with_log!(out == expected, "pairs", expected, out);
        crate::test_complete!("zip_pairs_in_order");
    }

    #[test]
    fn shorter_side_bounds_output() {
        init_test("shorter_side_bounds_output");
        let out = block_on(
            source::iter(vec![1, 2, 3, 4])
                .zip(source::iter(vec![10, 20]))
                .to_vec(),
        )
        .expect("drain");
        let expected = vec![(1, 10), (2, 20)];
        crate::assert_with_log!(out == expected, "pairs", expected, out);
        crate::test_complete!("shorter_side_bounds_output");
    }

    #[test]
    fn dispose_releases_both_sides() {
        init_test("dispose_releases_both_sides");
        let (first, first_counters) = DisposeProbe::new(vec![1, 2, 3]);
        let (second, second_counters) = DisposeProbe::new(vec![4, 5]);
        let out = block_on(first.zip(second).to_vec()).expect("drain");
        assert_eq!(out.len(), 2);
        crate::assert_with_log!(
            first_counters.disposes() == 1,
            "first disposed",
            1,
            first_counters.disposes()
        );
        crate::assert_with_log!(
            second_counters.disposes() == 1,
            "second disposed",
            1,
            second_counters.disposes()
        );
        crate::test_complete!("dispose_releases_both_sides");
    }

    #[test]
    fn zip_size_hint_takes_minimum() {
        init_test("zip_size_hint_takes_minimum");
        let zipped = source::range(0, 5).zip(source::range(0, 3));
        let hint = zipped.size_hint();
        crate::assert_with_log!(hint == (3, Some(3)), "hint", (3, Some(3)), hint);
        crate::test_complete!("zip_size_hint_takes_minimum");
    }
}
