//! Terminal drains.
//!
//! Every value-producing terminal operation is the same loop: pull until the
//! accumulator short-circuits or the sequence ends, then dispose the whole
//! chain, then settle. [`Drive`] is that loop; the accumulators supply the
//! per-operation behavior.
//!
//! Disposal runs on every exit path, including failure. When both the drain
//! and the disposal fail, the drain error wins and the disposal error is
//! logged.

use super::{Advance, Sequence};
use crate::error::{Error, Result};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Folds elements into a terminal outcome, with optional short-circuit.
pub trait Accumulate<In> {
    /// The settled value of the drain.
    type Output;

    /// Absorbs one element. Returning `Ok(Some(output))` stops the drain
    /// early with that outcome.
    fn feed(&mut self, item: In) -> Result<Option<Self::Output>>;

    /// Produces the outcome after the sequence ends without a short-circuit.
    fn finish(&mut self) -> Result<Self::Output>;
}

enum DriveState<T> {
    Pulling,
    Disposing(Option<Result<T>>),
    Done,
}

/// Future that drains a sequence through an [`Accumulate`], disposing the
/// chain before it settles.
#[must_use = "futures do nothing unless awaited"]
pub struct Drive<S: Sequence, A: Accumulate<S::Item>> {
    seq: S,
    acc: A,
    state: DriveState<A::Output>,
}

impl<S: Sequence, A: Accumulate<S::Item>> Drive<S, A> {
    fn new(seq: S, acc: A) -> Self {
        Self {
            seq,
            acc,
            state: DriveState::Pulling,
        }
    }
}

impl<S, A> Future for Drive<S, A>
where
    S: Sequence + Unpin,
    A: Accumulate<S::Item> + Unpin,
    A::Output: Unpin,
{
    type Output = Result<A::Output>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        loop {
            match &mut this.state {
                DriveState::Pulling => {
                    let advance: Advance<S::Item> = match Pin::new(&mut this.seq).poll_advance(cx)
                    {
                        Poll::Ready(advance) => advance,
                        Poll::Pending => return Poll::Pending,
                    };
                    let outcome = match advance {
                        Ok(Some(item)) => match this.acc.feed(item) {
                            Ok(None) => continue,
                            Ok(Some(output)) => Ok(output),
                            Err(e) => Err(e),
                        },
                        Ok(None) => this.acc.finish(),
                        Err(e) => Err(e),
                    };
                    this.state = DriveState::Disposing(Some(outcome));
                }
                DriveState::Disposing(outcome) => {
                    let disposal = match Pin::new(&mut this.seq).poll_dispose(cx) {
                        Poll::Ready(disposal) => disposal,
                        Poll::Pending => return Poll::Pending,
                    };
                    let outcome = outcome.take().expect("outcome taken twice");
                    this.state = DriveState::Done;
                    return Poll::Ready(match (outcome, disposal) {
                        (Ok(value), Ok(())) => Ok(value),
                        (Ok(_), Err(disposal_err)) => Err(disposal_err),
                        (Err(e), Ok(())) => Err(e),
                        (Err(e), Err(disposal_err)) => {
                            tracing::warn!(
                                error = %disposal_err,
                                "disposal failed after an earlier drain error"
                            );
                            Err(e)
                        }
                    });
                }
                DriveState::Done => panic!("drain future polled after completion"),
            }
        }
    }
}

/// Accumulator collecting all elements into a `Vec`.
#[derive(Debug)]
pub struct Collect<T> {
    items: Vec<T>,
}

// Hand-written: the derive would demand `T: Default` for no reason.
impl<T> Default for Collect<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Accumulate<T> for Collect<T> {
    type Output = Vec<T>;

    fn feed(&mut self, item: T) -> Result<Option<Vec<T>>> {
        self.items.push(item);
        Ok(None)
    }

    fn finish(&mut self) -> Result<Vec<T>> {
        Ok(std::mem::take(&mut self.items))
    }
}

/// Accumulator counting elements.
#[derive(Debug, Default)]
pub struct Counting {
    count: usize,
}

impl<T> Accumulate<T> for Counting {
    type Output = usize;

    fn feed(&mut self, _item: T) -> Result<Option<usize>> {
        self.count = self
            .count
            .checked_add(1)
            .ok_or(Error::Overflow)?;
        Ok(None)
    }

    fn finish(&mut self) -> Result<usize> {
        Ok(self.count)
    }
}

/// Element types that can be totaled with overflow detection.
pub trait Summable: Sized {
    /// The additive identity.
    fn zero() -> Self;

    /// Adds `other`, reporting `None` on overflow.
    fn checked_accumulate(self, other: Self) -> Option<Self>;
}

macro_rules! summable_int {
    ($($t:ty),*) => {$(
        impl Summable for $t {
            fn zero() -> Self {
                0
            }

            fn checked_accumulate(self, other: Self) -> Option<Self> {
                self.checked_add(other)
            }
        }
    )*};
}

summable_int!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

macro_rules! summable_float {
    ($($t:ty),*) => {$(
        impl Summable for $t {
            fn zero() -> Self {
                0.0
            }

            fn checked_accumulate(self, other: Self) -> Option<Self> {
                Some(self + other)
            }
        }
    )*};
}

summable_float!(f32, f64);

/// Accumulator totaling elements, faulting on overflow.
#[derive(Debug)]
pub struct Summing<T> {
    total: Option<T>,
}

impl<T: Summable> Accumulate<T> for Summing<T> {
    type Output = T;

    fn feed(&mut self, item: T) -> Result<Option<T>> {
        let total = self.total.take().expect("sum accumulator missing");
        self.total = Some(total.checked_accumulate(item).ok_or(Error::Overflow)?);
        Ok(None)
    }

    fn finish(&mut self) -> Result<T> {
        Ok(self.total.take().expect("sum accumulator missing"))
    }
}

/// Accumulator reducing elements with a closure.
#[derive(Debug)]
pub struct Folding<Acc, F> {
    acc: Option<Acc>,
    f: F,
}

impl<T, Acc, F: FnMut(Acc, T) -> Acc> Accumulate<T> for Folding<Acc, F> {
    type Output = Acc;

    fn feed(&mut self, item: T) -> Result<Option<Acc>> {
        let acc = self.acc.take().expect("fold accumulator missing");
        self.acc = Some((self.f)(acc, item));
        Ok(None)
    }

    fn finish(&mut self) -> Result<Acc> {
        Ok(self.acc.take().expect("fold accumulator missing"))
    }
}

/// Accumulator resolving true on the first match.
#[derive(Debug)]
pub struct AnyMatch<P> {
    predicate: P,
}

impl<T, P: FnMut(&T) -> bool> Accumulate<T> for AnyMatch<P> {
    type Output = bool;

    fn feed(&mut self, item: T) -> Result<Option<bool>> {
        if (self.predicate)(&item) {
            Ok(Some(true))
        } else {
            Ok(None)
        }
    }

    fn finish(&mut self) -> Result<bool> {
        Ok(false)
    }
}

/// Accumulator resolving false on the first mismatch.
#[derive(Debug)]
pub struct AllMatch<P> {
    predicate: P,
}

impl<T, P: FnMut(&T) -> bool> Accumulate<T> for AllMatch<P> {
    type Output = bool;

    fn feed(&mut self, item: T) -> Result<Option<bool>> {
        if (self.predicate)(&item) {
            Ok(None)
        } else {
            Ok(Some(false))
        }
    }

    fn finish(&mut self) -> Result<bool> {
        Ok(true)
    }
}

/// Accumulator running a closure per element.
#[derive(Debug)]
pub struct Visit<F> {
    f: F,
}

impl<T, F: FnMut(T)> Accumulate<T> for Visit<F> {
    type Output = ();

    fn feed(&mut self, item: T) -> Result<Option<()>> {
        (self.f)(item);
        Ok(None)
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Accumulator running a fallible closure per element.
#[derive(Debug)]
pub struct TryVisit<F> {
    f: F,
}

impl<T, F: FnMut(T) -> Result<()>> Accumulate<T> for TryVisit<F> {
    type Output = ();

    fn feed(&mut self, item: T) -> Result<Option<()>> {
        (self.f)(item)?;
        Ok(None)
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    First,
    Last,
    Single,
}

/// Accumulator resolving exactly one element per a cardinality rule.
#[derive(Debug)]
pub struct Cardinality<T> {
    mode: Mode,
    fallback: Option<fn() -> T>,
    held: Option<T>,
}

impl<T> Accumulate<T> for Cardinality<T> {
    type Output = T;

    fn feed(&mut self, item: T) -> Result<Option<T>> {
        match self.mode {
            Mode::First => Ok(Some(item)),
            Mode::Last => {
                self.held = Some(item);
                Ok(None)
            }
            Mode::Single => {
                if self.held.is_some() {
                    return Err(Error::MoreThanOne);
                }
                self.held = Some(item);
                Ok(None)
            }
        }
    }

    fn finish(&mut self) -> Result<T> {
        match (self.held.take(), self.fallback) {
            (Some(value), _) => Ok(value),
            (None, Some(fallback)) => Ok(fallback()),
            (None, None) => Err(Error::NoElements),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Extreme {
    Min,
    Max,
}

/// Accumulator keeping the smallest or largest element seen.
#[derive(Debug)]
pub struct Extremum<T> {
    extreme: Extreme,
    best: Option<T>,
}

impl<T: PartialOrd> Accumulate<T> for Extremum<T> {
    type Output = T;

    fn feed(&mut self, item: T) -> Result<Option<T>> {
        let replace = match (&self.best, self.extreme) {
            (None, _) => true,
            (Some(best), Extreme::Min) => item < *best,
            (Some(best), Extreme::Max) => item > *best,
        };
        if replace {
            self.best = Some(item);
        }
        Ok(None)
    }

    fn finish(&mut self) -> Result<T> {
        self.best.take().ok_or(Error::NoElements)
    }
}

/// Future for [`to_vec`](super::SequenceExt::to_vec).
pub type ToVec<S> = Drive<S, Collect<<S as Sequence>::Item>>;

/// Future for [`count`](super::SequenceExt::count).
pub type Count<S> = Drive<S, Counting>;

/// Future for [`fold`](super::SequenceExt::fold).
pub type Fold<S, Acc, F> = Drive<S, Folding<Acc, F>>;

/// Future for [`sum`](super::SequenceExt::sum).
pub type Sum<S> = Drive<S, Summing<<S as Sequence>::Item>>;

/// Future for the extremum drains ([`min`](super::SequenceExt::min) and
/// [`max`](super::SequenceExt::max)).
pub type WithExtremum<S> = Drive<S, Extremum<<S as Sequence>::Item>>;

/// Future for [`any`](super::SequenceExt::any).
pub type Any<S, P> = Drive<S, AnyMatch<P>>;

/// Future for [`all`](super::SequenceExt::all).
pub type All<S, P> = Drive<S, AllMatch<P>>;

/// Future for [`for_each`](super::SequenceExt::for_each).
pub type ForEach<S, F> = Drive<S, Visit<F>>;

/// Future for [`try_for_each`](super::SequenceExt::try_for_each).
pub type TryForEach<S, F> = Drive<S, TryVisit<F>>;

/// Future for the cardinality drains
/// ([`first`](super::SequenceExt::first), [`last`](super::SequenceExt::last),
/// [`single`](super::SequenceExt::single) and their `_or_default` forms).
pub type WithCardinality<S> = Drive<S, Cardinality<<S as Sequence>::Item>>;

pub(crate) fn to_vec<S: Sequence>(seq: S) -> ToVec<S> {
    Drive::new(seq, Collect::default())
}

pub(crate) fn count<S: Sequence>(seq: S) -> Count<S> {
    Drive::new(seq, Counting::default())
}

pub(crate) fn fold<S: Sequence, Acc, F>(seq: S, init: Acc, f: F) -> Fold<S, Acc, F>
where
    F: FnMut(Acc, S::Item) -> Acc,
{
    Drive::new(
        seq,
        Folding {
            acc: Some(init),
            f,
        },
    )
}

pub(crate) fn sum<S: Sequence>(seq: S) -> Sum<S>
where
    S::Item: Summable,
{
    Drive::new(
        seq,
        Summing {
            total: Some(S::Item::zero()),
        },
    )
}

pub(crate) fn min<S: Sequence>(seq: S) -> WithExtremum<S>
where
    S::Item: PartialOrd,
{
    Drive::new(
        seq,
        Extremum {
            extreme: Extreme::Min,
            best: None,
        },
    )
}

pub(crate) fn max<S: Sequence>(seq: S) -> WithExtremum<S>
where
    S::Item: PartialOrd,
{
    Drive::new(
        seq,
        Extremum {
            extreme: Extreme::Max,
            best: None,
        },
    )
}

pub(crate) fn any<S: Sequence, P>(seq: S, predicate: P) -> Any<S, P>
where
    P: FnMut(&S::Item) -> bool,
{
    Drive::new(seq, AnyMatch { predicate })
}

pub(crate) fn all<S: Sequence, P>(seq: S, predicate: P) -> All<S, P>
where
    P: FnMut(&S::Item) -> bool,
{
    Drive::new(seq, AllMatch { predicate })
}

pub(crate) fn for_each<S: Sequence, F>(seq: S, f: F) -> ForEach<S, F>
where
    F: FnMut(S::Item),
{
    Drive::new(seq, Visit { f })
}

pub(crate) fn try_for_each<S: Sequence, F>(seq: S, f: F) -> TryForEach<S, F>
where
    F: FnMut(S::Item) -> Result<()>,
{
    Drive::new(seq, TryVisit { f })
}

pub(crate) fn first<S: Sequence>(
    seq: S,
    fallback: Option<fn() -> S::Item>,
) -> WithCardinality<S> {
    Drive::new(
        seq,
        Cardinality {
            mode: Mode::First,
            fallback,
            held: None,
        },
    )
}

pub(crate) fn last<S: Sequence>(
    seq: S,
    fallback: Option<fn() -> S::Item>,
) -> WithCardinality<S> {
    Drive::new(
        seq,
        Cardinality {
            mode: Mode::Last,
            fallback,
            held: None,
        },
    )
}

pub(crate) fn single<S: Sequence>(
    seq: S,
    fallback: Option<fn() -> S::Item>,
) -> WithCardinality<S> {
    Drive::new(
        seq,
        Cardinality {
            mode: Mode::Single,
            fallback,
            held: None,
        },
    )
}
