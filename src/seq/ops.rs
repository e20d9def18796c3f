//! Operators expressed as decision states over the machine templates.
//!
//! Each operator here is a [`Machine`] or [`ThenMachine`] type alias plus a
//! small decision state; the templates own all control flow. Operators with
//! irregular control flow (buffering, concatenation, set operations, until
//! races) live in their own modules.

use super::machine::{Decide, DecideAsync, Machine, Step, ThenMachine};
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Sequence for the [`map`](super::SequenceExt::map) method.
pub type Map<S, F> = Machine<S, MapState<F>>;

/// Decision state for [`Map`].
#[derive(Debug)]
pub struct MapState<F>(F);

impl<In, T, F> Decide<In> for MapState<F>
where
    F: FnMut(In) -> T,
{
    type Out = T;

    fn decide(&mut self, input: Option<In>) -> Result<Step<T>> {
        Ok(input.map_or(Step::Done, |item| Step::Yield((self.0)(item))))
    }
}

pub(crate) fn map<S, T, F: FnMut(S::Item) -> T>(upstream: S, f: F) -> Map<S, F>
where
    S: super::Sequence,
{
    Machine::new(upstream, MapState(f))
}

/// Sequence for the [`filter`](super::SequenceExt::filter) method.
pub type Filter<S, P> = Machine<S, FilterState<P>>;

/// Decision state for [`Filter`].
#[derive(Debug)]
pub struct FilterState<P>(P);

impl<In, P> Decide<In> for FilterState<P>
where
    P: FnMut(&In) -> bool,
{
    type Out = In;

    fn decide(&mut self, input: Option<In>) -> Result<Step<In>> {
        Ok(match input {
            Some(item) if (self.0)(&item) => Step::Yield(item),
            Some(_) => Step::Skip,
            None => Step::Done,
        })
    }
}

pub(crate) fn filter<S, P: FnMut(&S::Item) -> bool>(upstream: S, predicate: P) -> Filter<S, P>
where
    S: super::Sequence,
{
    Machine::new(upstream, FilterState(predicate))
}

/// Sequence for the [`filter_map`](super::SequenceExt::filter_map) method.
pub type FilterMap<S, F> = Machine<S, FilterMapState<F>>;

/// Decision state for [`FilterMap`].
#[derive(Debug)]
pub struct FilterMapState<F>(F);

impl<In, T, F> Decide<In> for FilterMapState<F>
where
    F: FnMut(In) -> Option<T>,
{
    type Out = T;

    fn decide(&mut self, input: Option<In>) -> Result<Step<T>> {
        Ok(match input {
            Some(item) => (self.0)(item).map_or(Step::Skip, Step::Yield),
            None => Step::Done,
        })
    }
}

pub(crate) fn filter_map<S, T, F: FnMut(S::Item) -> Option<T>>(
    upstream: S,
    f: F,
) -> FilterMap<S, F>
where
    S: super::Sequence,
{
    Machine::new(upstream, FilterMapState(f))
}

/// Sequence for the [`enumerate`](super::SequenceExt::enumerate) method.
pub type Enumerate<S> = Machine<S, EnumerateState>;

/// Decision state for [`Enumerate`].
#[derive(Debug, Default)]
pub struct EnumerateState {
    index: usize,
}

impl<In> Decide<In> for EnumerateState {
    type Out = (usize, In);

    fn decide(&mut self, input: Option<In>) -> Result<Step<(usize, In)>> {
        match input {
            Some(item) => {
                let index = self.index;
                self.index = index.checked_add(1).ok_or(Error::Overflow)?;
                Ok(Step::Yield((index, item)))
            }
            None => Ok(Step::Done),
        }
    }
}

pub(crate) fn enumerate<S: super::Sequence>(upstream: S) -> Enumerate<S> {
    Machine::new(upstream, EnumerateState::default())
}

/// Sequence for the [`inspect`](super::SequenceExt::inspect) method.
pub type Inspect<S, F> = Machine<S, InspectState<F>>;

/// Decision state for [`Inspect`].
#[derive(Debug)]
pub struct InspectState<F>(F);

impl<In, F> Decide<In> for InspectState<F>
where
    F: FnMut(&In),
{
    type Out = In;

    fn decide(&mut self, input: Option<In>) -> Result<Step<In>> {
        Ok(match input {
            Some(item) => {
                (self.0)(&item);
                Step::Yield(item)
            }
            None => Step::Done,
        })
    }
}

pub(crate) fn inspect<S, F: FnMut(&S::Item)>(upstream: S, f: F) -> Inspect<S, F>
where
    S: super::Sequence,
{
    Machine::new(upstream, InspectState(f))
}

/// Sequence for the [`distinct`](super::SequenceExt::distinct) method.
pub type Distinct<S> = Machine<S, DistinctState<<S as super::Sequence>::Item>>;

/// Decision state for [`Distinct`]: the insert-or-skip rule.
#[derive(Debug)]
pub struct DistinctState<T> {
    seen: HashSet<T>,
}

impl<T> Decide<T> for DistinctState<T>
where
    T: Clone + Eq + Hash,
{
    type Out = T;

    fn decide(&mut self, input: Option<T>) -> Result<Step<T>> {
        Ok(match input {
            Some(item) => {
                if self.seen.insert(item.clone()) {
                    Step::Yield(item)
                } else {
                    Step::Skip
                }
            }
            None => Step::Done,
        })
    }
}

pub(crate) fn distinct<S>(upstream: S) -> Distinct<S>
where
    S: super::Sequence,
    S::Item: Clone + Eq + Hash,
{
    Machine::new(
        upstream,
        DistinctState {
            seen: HashSet::new(),
        },
    )
}

/// Sequence for the [`distinct_by`](super::SequenceExt::distinct_by) method.
pub type DistinctBy<S, F, K> = Machine<S, DistinctByState<F, K>>;

/// Decision state for [`DistinctBy`].
#[derive(Debug)]
pub struct DistinctByState<F, K> {
    key: F,
    seen: HashSet<K>,
}

impl<In, K, F> Decide<In> for DistinctByState<F, K>
where
    F: FnMut(&In) -> K,
    K: Eq + Hash,
{
    type Out = In;

    fn decide(&mut self, input: Option<In>) -> Result<Step<In>> {
        Ok(match input {
            Some(item) => {
                let key = (self.key)(&item);
                if self.seen.insert(key) {
                    Step::Yield(item)
                } else {
                    Step::Skip
                }
            }
            None => Step::Done,
        })
    }
}

pub(crate) fn distinct_by<S, K, F>(upstream: S, key: F) -> DistinctBy<S, F, K>
where
    S: super::Sequence,
    F: FnMut(&S::Item) -> K,
    K: Eq + Hash,
{
    Machine::new(
        upstream,
        DistinctByState {
            key,
            seen: HashSet::new(),
        },
    )
}

/// Sequence for the [`pairwise`](super::SequenceExt::pairwise) method.
pub type Pairwise<S> = Machine<S, PairwiseState<<S as super::Sequence>::Item>>;

/// Decision state for [`Pairwise`]: a one-element sliding window.
#[derive(Debug)]
pub struct PairwiseState<T> {
    previous: Option<T>,
}

impl<T: Clone> Decide<T> for PairwiseState<T> {
    type Out = (T, T);

    fn decide(&mut self, input: Option<T>) -> Result<Step<(T, T)>> {
        Ok(match input {
            Some(item) => match self.previous.replace(item.clone()) {
                Some(previous) => Step::Yield((previous, item)),
                None => Step::Skip,
            },
            None => Step::Done,
        })
    }
}

pub(crate) fn pairwise<S>(upstream: S) -> Pairwise<S>
where
    S: super::Sequence,
    S::Item: Clone,
{
    Machine::new(upstream, PairwiseState { previous: None })
}

/// Sequence for the [`then`](super::SequenceExt::then) method.
pub type Then<S, F> = ThenMachine<S, ThenState<F>>;

/// Async decision state for [`Then`].
#[derive(Debug)]
pub struct ThenState<F>(F);

/// Future adapter that yields whatever the user future resolves.
#[must_use = "futures do nothing unless polled"]
pub struct YieldAfter<Fut>(Pin<Box<Fut>>);

impl<Fut: Future> Future for YieldAfter<Fut> {
    type Output = Result<Step<Fut::Output>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0.as_mut().poll(cx).map(|value| Ok(Step::Yield(value)))
    }
}

impl<In, F, Fut> DecideAsync<In> for ThenState<F>
where
    F: FnMut(In) -> Fut,
    Fut: Future,
{
    type Out = Fut::Output;
    type Fut = YieldAfter<Fut>;

    fn decide(&mut self, input: In) -> Self::Fut {
        YieldAfter(Box::pin((self.0)(input)))
    }
}

pub(crate) fn then<S, F, Fut>(upstream: S, f: F) -> Then<S, F>
where
    S: super::Sequence,
    F: FnMut(S::Item) -> Fut,
    Fut: Future,
{
    ThenMachine::new(upstream, ThenState(f))
}

/// Sequence for the [`filter_then`](super::SequenceExt::filter_then) method.
pub type FilterThen<S, P> = ThenMachine<S, FilterThenState<P>>;

/// Async decision state for [`FilterThen`].
#[derive(Debug)]
pub struct FilterThenState<P>(P);

/// Future adapter that keeps the element if the predicate future says so.
#[must_use = "futures do nothing unless polled"]
pub struct KeepAfter<Fut, T> {
    predicate: Pin<Box<Fut>>,
    item: Option<T>,
}

impl<Fut, T> Future for KeepAfter<Fut, T>
where
    Fut: Future<Output = bool>,
    T: Unpin,
{
    type Output = Result<Step<T>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let keep = match self.predicate.as_mut().poll(cx) {
            Poll::Ready(keep) => keep,
            Poll::Pending => return Poll::Pending,
        };
        Poll::Ready(Ok(match self.item.take() {
            Some(item) if keep => Step::Yield(item),
            _ => Step::Skip,
        }))
    }
}

impl<In, P, Fut> DecideAsync<In> for FilterThenState<P>
where
    P: FnMut(&In) -> Fut,
    Fut: Future<Output = bool>,
    In: Unpin,
{
    type Out = In;
    type Fut = KeepAfter<Fut, In>;

    fn decide(&mut self, input: In) -> Self::Fut {
        let predicate = Box::pin((self.0)(&input));
        KeepAfter {
            predicate,
            item: Some(input),
        }
    }
}

pub(crate) fn filter_then<S, P, Fut>(upstream: S, predicate: P) -> FilterThen<S, P>
where
    S: super::Sequence,
    S::Item: Unpin,
    P: FnMut(&S::Item) -> Fut,
    Fut: Future<Output = bool>,
{
    ThenMachine::new(upstream, FilterThenState(predicate))
}
