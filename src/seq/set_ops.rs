//! Set-algebra combinators.
//!
//! Both operators materialize the second sequence into a hash set on the
//! first advance, dispose it immediately, and only then start pulling the
//! first sequence. The set is the only buffered state.

use super::{Advance, Sequence};
use crate::error::Result;
use std::collections::HashSet;
use std::hash::Hash;
use std::pin::Pin;
use std::task::{Context, Poll};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Materialize,
    DisposeSecond,
    Pull,
    Done,
}

/// Sequence for the [`except`](super::SequenceExt::except) method.
///
/// Yields elements of the first sequence whose value does not occur in the
/// second, each distinct value at most once.
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct Except<S1: Sequence, S2> {
    first: S1,
    second: S2,
    seen: HashSet<S1::Item>,
    phase: Phase,
    second_disposed: bool,
    disposed: bool,
}

impl<S1: Sequence, S2> Except<S1, S2> {
    pub(crate) fn new(first: S1, second: S2) -> Self {
        Self {
            first,
            second,
            seen: HashSet::new(),
            phase: Phase::Materialize,
            second_disposed: false,
            disposed: false,
        }
    }
}

impl<S1, S2> Sequence for Except<S1, S2>
where
    S1: Sequence + Unpin,
    S2: Sequence<Item = S1::Item> + Unpin,
    S1::Item: Clone + Eq + Hash + Unpin,
{
    type Item = S1::Item;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        let this = &mut *self;
        loop {
            match this.phase {
                Phase::Materialize => match Pin::new(&mut this.second).poll_advance(cx) {
                    Poll::Ready(Ok(Some(item))) => {
                        this.seen.insert(item);
                    }
                    Poll::Ready(Ok(None)) => this.phase = Phase::DisposeSecond,
                    Poll::Ready(Err(e)) => {
                        this.phase = Phase::Done;
                        return Poll::Ready(Err(e));
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Phase::DisposeSecond => match Pin::new(&mut this.second).poll_dispose(cx) {
                    Poll::Ready(Ok(())) => {
                        this.second_disposed = true;
                        this.phase = Phase::Pull;
                    }
                    Poll::Ready(Err(e)) => {
                        this.second_disposed = true;
                        this.phase = Phase::Done;
                        return Poll::Ready(Err(e));
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Phase::Pull => match Pin::new(&mut this.first).poll_advance(cx) {
                    Poll::Ready(Ok(Some(item))) => {
                        if !this.seen.contains(&item) {
                            this.seen.insert(item.clone());
                            return Poll::Ready(Ok(Some(item)));
                        }
                    }
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
        if !this.second_disposed {
            match Pin::new(&mut this.second).poll_dispose(cx) {
                Poll::Ready(result) => {
                    this.second_disposed = true;
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "second disposal failed");
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
        let result = match Pin::new(&mut this.first).poll_dispose(cx) {
            Poll::Ready(result) => result,
            Poll::Pending => return Poll::Pending,
        };
        this.disposed = true;
        this.phase = Phase::Done;
        this.seen.clear();
        Poll::Ready(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.phase == Phase::Done {
            return (0, Some(0));
        }
        (0, self.first.size_hint().1)
    }
}

/// Sequence for the [`intersect`](super::SequenceExt::intersect) method.
///
/// Yields elements of the first sequence whose value occurs in the second,
/// consuming each matched set entry so a value matches at most once.
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct Intersect<S1: Sequence, S2> {
    first: S1,
    second: S2,
    remaining: HashSet<S1::Item>,
    phase: Phase,
    second_disposed: bool,
    disposed: bool,
}

impl<S1: Sequence, S2> Intersect<S1, S2> {
    pub(crate) fn new(first: S1, second: S2) -> Self {
        Self {
            first,
            second,
            remaining: HashSet::new(),
            phase: Phase::Materialize,
            second_disposed: false,
            disposed: false,
        }
    }
}

impl<S1, S2> Sequence for Intersect<S1, S2>
where
    S1: Sequence + Unpin,
    S2: Sequence<Item = S1::Item> + Unpin,
    S1::Item: Eq + Hash + Unpin,
{
    type Item = S1::Item;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        let this = &mut *self;
        loop {
            match this.phase {
                Phase::Materialize => match Pin::new(&mut this.second).poll_advance(cx) {
                    Poll::Ready(Ok(Some(item))) => {
                        this.remaining.insert(item);
                    }
                    Poll::Ready(Ok(None)) => this.phase = Phase::DisposeSecond,
                    Poll::Ready(Err(e)) => {
                        this.phase = Phase::Done;
                        return Poll::Ready(Err(e));
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Phase::DisposeSecond => match Pin::new(&mut this.second).poll_dispose(cx) {
                    Poll::Ready(Ok(())) => {
                        this.second_disposed = true;
                        this.phase = Phase::Pull;
                    }
                    Poll::Ready(Err(e)) => {
                        this.second_disposed = true;
                        this.phase = Phase::Done;
                        return Poll::Ready(Err(e));
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Phase::Pull => {
                    if this.remaining.is_empty() {
                        // nothing left to match; no point pulling further
                        this.phase = Phase::Done;
                        return Poll::Ready(Ok(None));
                    }
                    match Pin::new(&mut this.first).poll_advance(cx) {
                        Poll::Ready(Ok(Some(item))) => {
                            if this.remaining.remove(&item) {
                                return Poll::Ready(Ok(Some(item)));
                            }
                        }
                        Poll::Ready(Ok(None)) => {
                            this.phase = Phase::Done;
                            return Poll::Ready(Ok(None));
                        }
                        Poll::Ready(Err(e)) => {
                            this.phase = Phase::Done;
                            return Poll::Ready(Err(e));
                        }
                        Poll::Pending => return Poll::Pending,
                    }
                }
                Phase::Done => return Poll::Ready(Ok(None)),
            }
        }
    }

    fn poll_dispose(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let this = &mut *self;
        if this.disposed {
            return Poll::Ready(Ok(()));
        }
        if !this.second_disposed {
            match Pin::new(&mut this.second).poll_dispose(cx) {
                Poll::Ready(result) => {
                    this.second_disposed = true;
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "second disposal failed");
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
        let result = match Pin::new(&mut this.first).poll_dispose(cx) {
            Poll::Ready(result) => result,
            Poll::Pending => return Poll::Pending,
        };
        this.disposed = true;
        this.phase = Phase::Done;
        this.remaining.clear();
        Poll::Ready(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.phase == Phase::Done {
            return (0, Some(0));
        }
        (0, self.first.size_hint().1)
    }
}

#[cfg(test)]
mod tests {
    use crate::seq::SequenceExt;
    use crate::source;
    use crate::test_utils::{block_on, init_test, DisposeProbe};

    #[test]
    fn except_removes_and_dedups() {
        init_test("except_removes_and_dedups");
        let out = block_on(
            source::iter(vec![1, 2, 2, 3, 4, 4])
                .except(source::iter(vec![2, 3]))
                .to_vec(),
        )
        .expect("drain");
        crate::assert_with_log!(out == vec![1, 4], "difference", vec![1, 4], out);
        crate::test_complete!("except_removes_and_dedups");
    }

    #[test]
    fn except_against_empty_is_distinct() {
        init_test("except_against_empty_is_distinct");
        let out = block_on(
            source::iter(vec![1, 1, 2])
                .except(source::empty())
                .to_vec(),
        )
        .expect("drain");
        crate::assert_with_log!(out == vec![1, 2], "deduped", vec![1, 2], out);
        crate::test_complete!("except_against_empty_is_distinct");
    }

    #[test]
    fn intersect_matches_each_key_once() {
        init_test("intersect_matches_each_key_once");
        let out = block_on(
            source::iter(vec![1, 2, 2, 3, 3])
                .intersect(source::iter(vec![2, 3, 5]))
                .to_vec(),
        )
        .expect("drain");
        crate::assert_with_log!(out == vec![2, 3], "intersection", vec![2, 3], out);
        crate::test_complete!("intersect_matches_each_key_once");
    }

    #[test]
    fn second_side_disposed_before_first_pull() {
        init_test("second_side_disposed_before_first_pull");
        let (first, first_counters) = DisposeProbe::new(vec![1, 2]);
        let (second, second_counters) = DisposeProbe::new(vec![2]);
        let mut op = first.except(second);

        let item = block_on(op.next()).expect("advance");
        assert_eq!(item, Some(1));
        crate::assert_with_log!(
            second_counters.disposes() == 1,
            "second disposed early",
            1,
            second_counters.disposes()
        );
        assert_eq!(first_counters.disposes(), 0);
        block_on(op.dispose()).expect("dispose");
        assert_eq!(first_counters.disposes(), 1);
        crate::test_complete!("second_side_disposed_before_first_pull");
    }

    #[test]
    fn intersect_stops_pulling_once_set_is_spent() {
        init_test("intersect_stops_pulling_once_set_is_spent");
        let (first, counters) = DisposeProbe::new(vec![1, 2, 3, 4, 5]);
        let out = block_on(first.intersect(source::iter(vec![1])).to_vec()).expect("drain");
        assert_eq!(out, vec![1]);
        // one pull for the match, none after the set emptied
        crate::assert_with_log!(counters.advances() == 1, "pulls", 1, counters.advances());
        crate::test_complete!("intersect_stops_pulling_once_set_is_spent");
    }
}
