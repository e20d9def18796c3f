//! Tail-window combinators.
//!
//! Both keep a bounded ring of at most `n` elements, so memory is
//! proportional to `n`, never to the sequence length.

use super::machine::{Decide, Machine, Step};
use super::Sequence;
use crate::error::Result;
use std::collections::VecDeque;

/// Sequence for the [`skip_last`](super::SequenceExt::skip_last) method.
pub type SkipLast<S> = Machine<S, SkipLastState<<S as Sequence>::Item>>;

/// Sequence for the [`take_last`](super::SequenceExt::take_last) method.
pub type TakeLast<S> = Machine<S, TakeLastState<<S as Sequence>::Item>>;

pub(crate) fn skip_last<S: Sequence>(upstream: S, n: usize) -> SkipLast<S> {
    Machine::new(
        upstream,
        SkipLastState {
            lag: n,
            ring: VecDeque::with_capacity(n),
        },
    )
}

pub(crate) fn take_last<S: Sequence>(upstream: S, n: usize) -> TakeLast<S> {
    Machine::new(
        upstream,
        TakeLastState {
            keep: n,
            ring: VecDeque::with_capacity(n),
        },
    )
}

/// Decision state for [`SkipLast`]: emit every element lagged by `n`, so the
/// final `n` never leave the ring.
#[derive(Debug)]
pub struct SkipLastState<T> {
    lag: usize,
    ring: VecDeque<T>,
}

impl<T> Decide<T> for SkipLastState<T> {
    type Out = T;

    fn decide(&mut self, input: Option<T>) -> Result<Step<T>> {
        let Some(item) = input else {
            // ring still holds exactly the suppressed tail
            return Ok(Step::Done);
        };
        if self.lag == 0 {
            return Ok(Step::Yield(item));
        }
        self.ring.push_back(item);
        if self.ring.len() > self.lag {
            Ok(self.ring.pop_front().map_or(Step::Skip, Step::Yield))
        } else {
            Ok(Step::Skip)
        }
    }
}

/// Decision state for [`TakeLast`]: absorb everything into the ring, then
/// drain it oldest-first once upstream ends.
#[derive(Debug)]
pub struct TakeLastState<T> {
    keep: usize,
    ring: VecDeque<T>,
}

impl<T> Decide<T> for TakeLastState<T> {
    type Out = T;

    fn decide(&mut self, input: Option<T>) -> Result<Step<T>> {
        match input {
            Some(item) => {
                if self.keep == 0 {
                    return Ok(Step::Skip);
                }
                if self.ring.len() == self.keep {
                    self.ring.pop_front();
                }
                self.ring.push_back(item);
                Ok(Step::Skip)
            }
            None => Ok(self.ring.pop_front().map_or(Step::Done, Step::Yield)),
        }
    }
}
