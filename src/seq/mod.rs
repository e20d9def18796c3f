//! The asynchronous pull protocol and its operator library.
//!
//! This module provides the [`Sequence`] trait and related combinators for
//! pull-driven asynchronous iteration.
//!
//! # The protocol
//!
//! - [`Sequence::poll_advance`] requests the next element. It settles as
//!   `Ok(Some(item))` (an element was produced), `Ok(None)` (exhausted —
//!   terminal and idempotent: every later advance also settles `Ok(None)`),
//!   or `Err(e)` (failed or canceled; callers must still dispose).
//! - [`Sequence::poll_dispose`] releases everything the cursor owns,
//!   cascading to its upstream cursor(s). It is idempotent; a second call
//!   never double-disposes.
//! - At most one advance may be in flight per cursor; `&mut self` enforces
//!   this statically.
//!
//! Every combinator is a flat poll loop: a long run of synchronously-ready
//! upstream advances is consumed by `loop { .. }` in place, never by
//! recursive re-entry, so stack depth is independent of element count.
//!
//! # Combinators
//!
//! ## Transformation
//! - [`Map`], [`FilterMap`], [`Enumerate`], [`Inspect`]: synchronous decisions
//! - [`Then`], [`FilterThen`]: per-element awaited decisions
//! - [`Pairwise`]: sliding pairs
//!
//! ## Selection
//! - [`Filter`], [`Take`], [`TakeWhile`], [`Skip`], [`SkipWhile`]
//! - [`Distinct`], [`DistinctBy`]: de-duplication via an auxiliary set
//! - [`SkipLast`], [`TakeLast`]: bounded trailing buffers
//! - [`TakeUntil`], [`SkipUntil`], [`TakeUntilCanceled`], [`SkipUntilCanceled`]
//!
//! ## Windowing and combination
//! - [`Buffer`], [`BufferStride`]: fixed and strided windows
//! - [`Chain`]: sequential concatenation
//! - [`Zip`]: pairwise combination of two sequences
//! - [`Except`], [`Intersect`]: set difference / intersection
//!
//! ## Decoupling
//! - [`publish`](SequenceExt::publish): one-to-many broadcast bridge
//! - [`detach`](SequenceExt::detach): eager drain through a hand-off queue
//!
//! ## Terminal operations
//! - [`to_vec`](SequenceExt::to_vec), [`count`](SequenceExt::count),
//!   [`fold`](SequenceExt::fold), [`sum`](SequenceExt::sum),
//!   [`min`](SequenceExt::min), [`max`](SequenceExt::max),
//!   [`any`](SequenceExt::any),
//!   [`all`](SequenceExt::all), [`for_each`](SequenceExt::for_each),
//!   [`try_for_each`](SequenceExt::try_for_each),
//!   [`first`](SequenceExt::first), [`last`](SequenceExt::last),
//!   [`single`](SequenceExt::single),
//!   [`sequence_equal`](SequenceExt::sequence_equal)
//!
//! Terminal drains guarantee disposal of the whole chain on every exit path.

pub mod buffer;
pub mod chain;
pub mod detach;
pub mod drive;
pub mod last_ops;
pub mod machine;
pub mod next;
pub mod ops;
pub mod publish;
pub mod seq_equal;
pub mod set_ops;
pub mod skip;
pub mod take;
pub mod until;
pub mod zip;

pub use buffer::{Buffer, BufferStride};
pub use chain::Chain;
pub use detach::{Detached, Pump};
pub use drive::{
    All, Any, Count, Fold, ForEach, Sum, Summable, ToVec, TryForEach, WithCardinality,
    WithExtremum,
};
pub use last_ops::{SkipLast, TakeLast};
pub use machine::{Decide, DecideAsync, Machine, Step, ThenMachine};
pub use next::{Dispose, Next};
pub use ops::{
    Distinct, DistinctBy, Enumerate, Filter, FilterMap, FilterThen, Inspect, Map, Pairwise, Then,
};
pub use publish::{Driver, Publisher, Subscription};
pub use seq_equal::SequenceEqual;
pub use set_ops::{Except, Intersect};
pub use skip::{Skip, SkipWhile};
pub use take::{Take, TakeWhile};
pub use until::{SkipUntil, SkipUntilCanceled, TakeUntil, TakeUntilCanceled, WithCancel};
pub use zip::Zip;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::observe::{Observer, Subscribe, SubscribeFn};
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::task::{Context, Poll};

/// The settled outcome of one advance: an element, exhaustion, or a failure.
pub type Advance<T> = Result<Option<T>>;

/// An asynchronous pull-driven sequence of values.
///
/// This is the async analogue of [`Iterator`], with explicit disposal. See
/// the [module docs](self) for the full protocol contract.
pub trait Sequence {
    /// The type of element this sequence produces.
    type Item;

    /// Requests the next element.
    ///
    /// Settles `Ok(Some(item))`, `Ok(None)` on exhaustion (terminal,
    /// idempotent), or `Err(e)` on failure or cancellation. After an error
    /// the cursor is in a terminal state; callers must still dispose it.
    fn poll_advance(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>>;

    /// Releases all resources owned by this cursor, transitively.
    ///
    /// Idempotent: calling it again after completion settles `Ok(())`
    /// without re-disposing upstream.
    fn poll_dispose(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>>;

    /// Bounds on the number of remaining elements, iterator-style.
    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, None)
    }
}

impl<S: Sequence + Unpin + ?Sized> Sequence for &mut S {
    type Item = S::Item;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        Pin::new(&mut **self).poll_advance(cx)
    }

    fn poll_dispose(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut **self).poll_dispose(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (**self).size_hint()
    }
}

impl<S: Sequence + Unpin + ?Sized> Sequence for Box<S> {
    type Item = S::Item;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        Pin::new(&mut **self).poll_advance(cx)
    }

    fn poll_dispose(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut **self).poll_dispose(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (**self).size_hint()
    }
}

/// Extension trait providing combinator methods for sequences.
///
/// Automatically implemented for every [`Sequence`].
pub trait SequenceExt: Sequence {
    /// Pulls the next element from the sequence.
    fn next(&mut self) -> Next<'_, Self>
    where
        Self: Unpin,
    {
        Next::new(self)
    }

    /// Disposes the sequence, releasing the whole chain.
    fn dispose(&mut self) -> Dispose<'_, Self>
    where
        Self: Unpin,
    {
        Dispose::new(self)
    }

    /// Transforms each element using a closure.
    fn map<T, F>(self, f: F) -> Map<Self, F>
    where
        Self: Sized,
        F: FnMut(Self::Item) -> T,
    {
        ops::map(self, f)
    }

    /// Yields only elements matching the predicate.
    fn filter<P>(self, predicate: P) -> Filter<Self, P>
    where
        Self: Sized,
        P: FnMut(&Self::Item) -> bool,
    {
        ops::filter(self, predicate)
    }

    /// Filters and transforms in one step.
    fn filter_map<T, F>(self, f: F) -> FilterMap<Self, F>
    where
        Self: Sized,
        F: FnMut(Self::Item) -> Option<T>,
    {
        ops::filter_map(self, f)
    }

    /// Pairs each element with its zero-based index.
    ///
    /// The index faults with [`Error::Overflow`](crate::Error::Overflow) instead of wrapping.
    fn enumerate(self) -> Enumerate<Self>
    where
        Self: Sized,
    {
        ops::enumerate(self)
    }

    /// Observes each element without consuming it.
    fn inspect<F>(self, f: F) -> Inspect<Self, F>
    where
        Self: Sized,
        F: FnMut(&Self::Item),
    {
        ops::inspect(self, f)
    }

    /// Transforms each element through an awaited future.
    fn then<Fut, F>(self, f: F) -> Then<Self, F>
    where
        Self: Sized,
        F: FnMut(Self::Item) -> Fut,
        Fut: Future,
    {
        ops::then(self, f)
    }

    /// Filters through an awaited predicate future.
    fn filter_then<Fut, P>(self, predicate: P) -> FilterThen<Self, P>
    where
        Self: Sized,
        Self::Item: Unpin,
        P: FnMut(&Self::Item) -> Fut,
        Fut: Future<Output = bool>,
    {
        ops::filter_then(self, predicate)
    }

    /// Takes the first `n` elements.
    fn take(self, n: usize) -> Take<Self>
    where
        Self: Sized,
    {
        Take::new(self, n)
    }

    /// Takes elements while the predicate holds.
    fn take_while<P>(self, predicate: P) -> TakeWhile<Self, P>
    where
        Self: Sized,
        P: FnMut(&Self::Item) -> bool,
    {
        TakeWhile::new(self, predicate)
    }

    /// Skips the first `n` elements.
    fn skip(self, n: usize) -> Skip<Self>
    where
        Self: Sized,
    {
        Skip::new(self, n)
    }

    /// Skips elements while the predicate holds.
    fn skip_while<P>(self, predicate: P) -> SkipWhile<Self, P>
    where
        Self: Sized,
        P: FnMut(&Self::Item) -> bool,
    {
        SkipWhile::new(self, predicate)
    }

    /// Suppresses elements already seen, keyed by the element itself.
    fn distinct(self) -> Distinct<Self>
    where
        Self: Sized,
        Self::Item: Clone + Eq + Hash,
    {
        ops::distinct(self)
    }

    /// Suppresses elements whose projected key was already seen.
    fn distinct_by<K, F>(self, key: F) -> DistinctBy<Self, F, K>
    where
        Self: Sized,
        F: FnMut(&Self::Item) -> K,
        K: Eq + Hash,
    {
        ops::distinct_by(self, key)
    }

    /// Yields overlapping pairs `(previous, current)`.
    fn pairwise(self) -> Pairwise<Self>
    where
        Self: Sized,
        Self::Item: Clone,
    {
        ops::pairwise(self)
    }

    /// Collects elements into non-overlapping windows of `size`.
    ///
    /// A final partial window is yielded only if non-empty.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    fn buffer(self, size: usize) -> Buffer<Self>
    where
        Self: Sized,
    {
        buffer::buffer(self, size)
    }

    /// Collects elements into windows of `size`, opening a new window every
    /// `stride` elements.
    ///
    /// With `stride < size` windows overlap; with `stride > size` the
    /// elements between windows are dropped.
    ///
    /// # Panics
    ///
    /// Panics if `size` or `stride` is zero.
    fn buffer_stride(self, size: usize, stride: usize) -> BufferStride<Self>
    where
        Self: Sized,
    {
        buffer::buffer_stride(self, size, stride)
    }

    /// Yields all elements of this sequence, then all elements of `other`.
    fn chain<S2>(self, other: S2) -> Chain<Self, S2>
    where
        Self: Sized,
        S2: Sequence<Item = Self::Item>,
    {
        Chain::new(self, other)
    }

    /// Pairs elements of two sequences; the shorter side bounds the output.
    fn zip<S2>(self, other: S2) -> Zip<Self, S2>
    where
        Self: Sized,
        S2: Sequence,
    {
        Zip::new(self, other)
    }

    /// Yields elements of this sequence absent from `other`, de-duplicated.
    fn except<S2>(self, other: S2) -> Except<Self, S2>
    where
        Self: Sized,
        S2: Sequence<Item = Self::Item>,
        Self::Item: Clone + Eq + Hash,
    {
        Except::new(self, other)
    }

    /// Yields elements of this sequence present in `other`, each matched key
    /// at most once.
    fn intersect<S2>(self, other: S2) -> Intersect<Self, S2>
    where
        Self: Sized,
        S2: Sequence<Item = Self::Item>,
        Self::Item: Eq + Hash,
    {
        Intersect::new(self, other)
    }

    /// Yields everything except the final `n` elements.
    fn skip_last(self, n: usize) -> SkipLast<Self>
    where
        Self: Sized,
    {
        last_ops::skip_last(self, n)
    }

    /// Yields only the final `n` elements, oldest first.
    fn take_last(self, n: usize) -> TakeLast<Self>
    where
        Self: Sized,
    {
        last_ops::take_last(self, n)
    }

    /// Ends the sequence when `trigger` completes.
    ///
    /// An advance already in flight settles normally; the next advance
    /// reports exhaustion.
    fn take_until<Fut>(self, trigger: Fut) -> TakeUntil<Self, Fut>
    where
        Self: Sized,
        Fut: Future,
    {
        TakeUntil::new(self, trigger)
    }

    /// Discards elements until `trigger` completes, then forwards.
    ///
    /// The first real pull waits for the trigger; upstream is not touched
    /// before it fires.
    fn skip_until<Fut>(self, trigger: Fut) -> SkipUntil<Self, Fut>
    where
        Self: Sized,
        Fut: Future,
    {
        SkipUntil::new(self, trigger)
    }

    /// Ends the sequence gracefully when `token` fires.
    fn take_until_canceled(self, token: &CancelToken) -> TakeUntilCanceled<Self>
    where
        Self: Sized,
    {
        TakeUntilCanceled::new(self, token, &CancelToken::never())
    }

    /// Ends the sequence gracefully when either token fires; the first to
    /// fire wins atomically.
    fn take_until_any_canceled(
        self,
        first: &CancelToken,
        second: &CancelToken,
    ) -> TakeUntilCanceled<Self>
    where
        Self: Sized,
    {
        TakeUntilCanceled::new(self, first, second)
    }

    /// Discards elements (pull-and-discard) until `token` fires, then
    /// forwards.
    fn skip_until_canceled(self, token: &CancelToken) -> SkipUntilCanceled<Self>
    where
        Self: Sized,
    {
        SkipUntilCanceled::new(self, token, &CancelToken::never())
    }

    /// Discards elements until either token fires; first to fire wins.
    fn skip_until_any_canceled(
        self,
        first: &CancelToken,
        second: &CancelToken,
    ) -> SkipUntilCanceled<Self>
    where
        Self: Sized,
    {
        SkipUntilCanceled::new(self, first, second)
    }

    /// Fails the sequence with [`Error::Canceled`](crate::Error::Canceled) when `token` fires.
    ///
    /// The token is checked synchronously at the top of every advance.
    fn with_cancel(self, token: &CancelToken) -> WithCancel<Self>
    where
        Self: Sized,
    {
        WithCancel::new(self, token)
    }

    /// Splits the sequence into a multicast [`Publisher`] and the [`Driver`]
    /// future that feeds it.
    ///
    /// The driver is the background consumption loop: spawn it (or poll it
    /// alongside the subscribers) to start broadcasting. Subscribers only see
    /// elements broadcast after their registration. Dropping the driver
    /// terminates all subscribers with a cancellation.
    fn publish(self) -> (Publisher<Self::Item>, Driver<Self>)
    where
        Self: Sized,
        Self::Item: Clone,
    {
        publish::publish(self)
    }

    /// Decouples producer pace from consumer pace through an unbounded
    /// hand-off queue.
    ///
    /// Returns the consumer-side cursor and the [`Pump`] future that eagerly
    /// drains this sequence into the queue. Disposal of the cursor closes the
    /// queue so the pump stops writing.
    fn detach(self) -> (Detached<Self::Item>, Pump<Self>)
    where
        Self: Sized,
    {
        detach::detach(self)
    }

    /// Collects every element into a `Vec`, then disposes the chain.
    fn to_vec(self) -> ToVec<Self>
    where
        Self: Sized,
    {
        drive::to_vec(self)
    }

    /// Counts the elements, faulting on overflow.
    fn count(self) -> Count<Self>
    where
        Self: Sized,
    {
        drive::count(self)
    }

    /// Reduces the sequence into a single accumulated value.
    fn fold<Acc, F>(self, init: Acc, f: F) -> Fold<Self, Acc, F>
    where
        Self: Sized,
        F: FnMut(Acc, Self::Item) -> Acc,
    {
        drive::fold(self, init, f)
    }

    /// Totals the elements, faulting on overflow.
    fn sum(self) -> Sum<Self>
    where
        Self: Sized,
        Self::Item: Summable,
    {
        drive::sum(self)
    }

    /// Resolves the smallest element, or [`Error::NoElements`](crate::Error::NoElements).
    fn min(self) -> WithExtremum<Self>
    where
        Self: Sized,
        Self::Item: PartialOrd,
    {
        drive::min(self)
    }

    /// Resolves the largest element, or [`Error::NoElements`](crate::Error::NoElements).
    fn max(self) -> WithExtremum<Self>
    where
        Self: Sized,
        Self::Item: PartialOrd,
    {
        drive::max(self)
    }

    /// Resolves true as soon as any element matches.
    fn any<P>(self, predicate: P) -> Any<Self, P>
    where
        Self: Sized,
        P: FnMut(&Self::Item) -> bool,
    {
        drive::any(self, predicate)
    }

    /// Resolves false as soon as any element fails to match.
    fn all<P>(self, predicate: P) -> All<Self, P>
    where
        Self: Sized,
        P: FnMut(&Self::Item) -> bool,
    {
        drive::all(self, predicate)
    }

    /// Runs a closure on every element.
    fn for_each<F>(self, f: F) -> ForEach<Self, F>
    where
        Self: Sized,
        F: FnMut(Self::Item),
    {
        drive::for_each(self, f)
    }

    /// Runs a fallible closure on every element, short-circuiting on error.
    fn try_for_each<F>(self, f: F) -> TryForEach<Self, F>
    where
        Self: Sized,
        F: FnMut(Self::Item) -> Result<()>,
    {
        drive::try_for_each(self, f)
    }

    /// Resolves the first element, or [`Error::NoElements`](crate::Error::NoElements).
    fn first(self) -> WithCardinality<Self>
    where
        Self: Sized,
    {
        drive::first(self, None)
    }

    /// Resolves the first element, or the type default on empty.
    fn first_or_default(self) -> WithCardinality<Self>
    where
        Self: Sized,
        Self::Item: Default,
    {
        drive::first(self, Some(Self::Item::default))
    }

    /// Resolves the last element, or [`Error::NoElements`](crate::Error::NoElements).
    fn last(self) -> WithCardinality<Self>
    where
        Self: Sized,
    {
        drive::last(self, None)
    }

    /// Resolves the last element, or the type default on empty.
    fn last_or_default(self) -> WithCardinality<Self>
    where
        Self: Sized,
        Self::Item: Default,
    {
        drive::last(self, Some(Self::Item::default))
    }

    /// Resolves the only element; [`Error::NoElements`](crate::Error::NoElements) on empty,
    /// [`Error::MoreThanOne`](crate::Error::MoreThanOne) on a second element.
    fn single(self) -> WithCardinality<Self>
    where
        Self: Sized,
    {
        drive::single(self, None)
    }

    /// Resolves the only element, or the type default on empty; still
    /// [`Error::MoreThanOne`](crate::Error::MoreThanOne) on a second element.
    fn single_or_default(self) -> WithCardinality<Self>
    where
        Self: Sized,
        Self::Item: Default,
    {
        drive::single(self, Some(Self::Item::default))
    }

    /// Resolves true if both sequences yield equal elements in equal order.
    fn sequence_equal<S2>(self, other: S2) -> SequenceEqual<Self, S2>
    where
        Self: Sized,
        S2: Sequence<Item = Self::Item>,
        Self::Item: PartialEq,
    {
        SequenceEqual::new(self, other)
    }

    /// Drains the sequence into an observer.
    ///
    /// Terminal completion and errors are routed to the observer;
    /// [`Error::Canceled`](crate::Error::Canceled) is swallowed (cancellation is not an error).
    fn subscribe<O>(self, observer: O) -> Subscribe<Self, O>
    where
        Self: Sized,
        O: Observer<Self::Item>,
    {
        Subscribe::new(self, observer)
    }

    /// Drains the sequence into a callback with no error handler.
    ///
    /// Errors — from the callback or upstream — abort the drain and are
    /// reported to the process-wide unobserved-error sink, except
    /// cancellation, which is suppressed.
    fn subscribe_fn<F>(self, f: F) -> SubscribeFn<Self, F>
    where
        Self: Sized,
        F: FnMut(Self::Item) -> Result<()>,
    {
        SubscribeFn::new(self, f)
    }

    /// Boxes this sequence for type erasure.
    fn boxed(self) -> Box<Self>
    where
        Self: Sized,
    {
        Box::new(self)
    }
}

impl<S: Sequence + ?Sized> SequenceExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source;
    use crate::test_utils::{block_on, init_test, noop_waker};

    #[test]
    fn combinators_chain() {
        init_test("combinators_chain");

        let out = block_on(
            source::iter(vec![1i32, 2, 3, 4, 5, 6])
                .filter(|x| x % 2 == 0)
                .map(|x| x * 10)
                .to_vec(),
        )
        .expect("drain");
        crate::assert_with_log!(out == vec![20, 40, 60], "collected", vec![20, 40, 60], out);
        crate::test_complete!("combinators_chain");
    }

    #[test]
    fn next_pulls_one_at_a_time() {
        init_test("next_pulls_one_at_a_time");

        let mut seq = source::iter(vec![1, 2]);
        let first = block_on(seq.next()).expect("advance");
        crate::assert_with_log!(first == Some(1), "first", Some(1), first);
        let second = block_on(seq.next()).expect("advance");
        crate::assert_with_log!(second == Some(2), "second", Some(2), second);
        let end = block_on(seq.next()).expect("advance");
        crate::assert_with_log!(end.is_none(), "end", None::<i32>, end);
        // Terminal is idempotent.
        let end = block_on(seq.next()).expect("advance");
        crate::assert_with_log!(end.is_none(), "still end", None::<i32>, end);
        crate::test_complete!("next_pulls_one_at_a_time");
    }

    #[test]
    fn mut_ref_and_box_forward() {
        init_test("mut_ref_and_box_forward");

        let mut inner = source::iter(vec![7u8]);
        let value = block_on((&mut inner).next()).expect("advance");
        crate::assert_with_log!(value == Some(7), "by ref", Some(7), value);

        let mut boxed = source::iter(vec![9u8]).boxed();
        let value = block_on(boxed.next()).expect("advance");
        crate::assert_with_log!(value == Some(9), "boxed", Some(9), value);
        crate::test_complete!("mut_ref_and_box_forward");
    }

    #[test]
    fn size_hint_default() {
        init_test("size_hint_default");

        struct Bare;
        impl Sequence for Bare {
            type Item = ();
            fn poll_advance(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
            ) -> std::task::Poll<Advance<()>> {
                std::task::Poll::Ready(Ok(None))
            }
            fn poll_dispose(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
            ) -> std::task::Poll<Result<()>> {
                std::task::Poll::Ready(Ok(()))
            }
        }

        let hint = Bare.size_hint();
        crate::assert_with_log!(hint == (0, None), "hint", (0, None::<usize>), hint);
        let waker = noop_waker();
        let mut cx = std::task::Context::from_waker(&waker);
        let poll = std::pin::Pin::new(&mut Bare).poll_advance(&mut cx);
        assert!(matches!(poll, std::task::Poll::Ready(Ok(None))));
        crate::test_complete!("size_hint_default");
    }
}
