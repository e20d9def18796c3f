//! Reusable decision-machine templates for "pull, decide, loop" operators.
//!
//! Most operators share one control-flow skeleton: pull one upstream
//! element, run a synchronous decision, and either yield, pull again, or
//! terminate. [`Machine`] implements that skeleton once as a flat poll loop;
//! concrete operators supply only a [`Decide`] state. [`ThenMachine`] is the
//! second template for decisions that must themselves be awaited (async
//! selectors and predicates), adding one nested suspension point per element
//! with the same flat-loop guarantee.
//!
//! Both templates guarantee:
//!
//! - one pending upstream advance at a time
//! - decision errors surface as failed advances
//! - terminal idempotence (`Ok(None)` forever after the first)
//! - no stack growth across long synchronously-ready runs

use super::{Advance, Sequence};
use crate::error::Result;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// The outcome of one decision step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<T> {
    /// Yield this value to the consumer.
    Yield(T),
    /// Pull the next upstream element and decide again.
    Skip,
    /// Terminate the sequence.
    Done,
}

/// A synchronous per-element decision.
///
/// `input` is `Some(item)` for an upstream element and `None` once upstream
/// is exhausted. After the first `None` the machine stops pulling and keeps
/// consulting `decide(None)` — the drain phase — until `Done`, which lets
/// flush-style operators emit trailing output. `Skip` during the drain phase
/// is treated as `Done`.
pub trait Decide<In> {
    /// The element type this decision produces.
    type Out;

    /// Runs one decision step.
    fn decide(&mut self, input: Option<In>) -> Result<Step<Self::Out>>;
}

/// Base template: pull upstream, run a synchronous decision, loop flat.
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct Machine<S, D> {
    upstream: S,
    decide: D,
    drained: bool,
    done: bool,
    disposed: bool,
}

impl<S, D> Machine<S, D> {
    pub(crate) fn new(upstream: S, decide: D) -> Self {
        Self {
            upstream,
            decide,
            drained: false,
            done: false,
            disposed: false,
        }
    }
}

impl<S, D> Sequence for Machine<S, D>
where
    S: Sequence + Unpin,
    D: Decide<S::Item> + Unpin,
{
    type Item = D::Out;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(Ok(None));
        }

        loop {
            let input = if this.drained {
                None
            } else {
                match Pin::new(&mut this.upstream).poll_advance(cx) {
                    Poll::Ready(Ok(Some(item))) => Some(item),
                    Poll::Ready(Ok(None)) => {
                        this.drained = true;
                        None
                    }
                    Poll::Ready(Err(e)) => {
                        this.done = true;
                        return Poll::Ready(Err(e));
                    }
                    Poll::Pending => return Poll::Pending,
                }
            };
            let draining = this.drained;

            match this.decide.decide(input) {
                Ok(Step::Yield(out)) => return Poll::Ready(Ok(Some(out))),
                Ok(Step::Skip) if !draining => {}
                Ok(Step::Skip | Step::Done) => {
                    this.done = true;
                    return Poll::Ready(Ok(None));
                }
                Err(e) => {
                    this.done = true;
                    return Poll::Ready(Err(e));
                }
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
        this.done = true;
        Poll::Ready(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        // A decision may skip or flush, so only the upper bound survives
        // unchanged for non-flushing decisions; stay conservative.
        (0, self.upstream.size_hint().1)
    }
}

/// A per-element decision that must be awaited.
///
/// Unlike [`Decide`] there is no drain phase: once upstream is exhausted the
/// machine terminates. The returned future settles the decision for exactly
/// one element.
pub trait DecideAsync<In> {
    /// The element type this decision produces.
    type Out;
    /// The in-flight decision.
    type Fut: Future<Output = Result<Step<Self::Out>>> + Unpin;

    /// Starts one decision step.
    fn decide(&mut self, input: In) -> Self::Fut;
}

/// Second template: pull upstream, await the decision, loop flat.
///
/// Two chained suspension points per element (the upstream advance, then the
/// decision future), still one pending operation at a time.
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct ThenMachine<S, D>
where
    S: Sequence,
    D: DecideAsync<S::Item>,
{
    upstream: S,
    decide: D,
    pending: Option<D::Fut>,
    done: bool,
    disposed: bool,
}

impl<S, D> ThenMachine<S, D>
where
    S: Sequence,
    D: DecideAsync<S::Item>,
{
    pub(crate) fn new(upstream: S, decide: D) -> Self {
        Self {
            upstream,
            decide,
            pending: None,
            done: false,
            disposed: false,
        }
    }
}

impl<S, D> Sequence for ThenMachine<S, D>
where
    S: Sequence + Unpin,
    D: DecideAsync<S::Item> + Unpin,
{
    type Item = D::Out;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(Ok(None));
        }

        loop {
            if let Some(fut) = this.pending.as_mut() {
                let step = match Pin::new(fut).poll(cx) {
                    Poll::Ready(step) => step,
                    Poll::Pending => return Poll::Pending,
                };
                this.pending = None;
                match step {
                    Ok(Step::Yield(out)) => return Poll::Ready(Ok(Some(out))),
                    Ok(Step::Skip) => {}
                    Ok(Step::Done) => {
                        this.done = true;
                        return Poll::Ready(Ok(None));
                    }
                    Err(e) => {
                        this.done = true;
                        return Poll::Ready(Err(e));
                    }
                }
            }

            match Pin::new(&mut this.upstream).poll_advance(cx) {
                Poll::Ready(Ok(Some(item))) => {
                    this.pending = Some(this.decide.decide(item));
                }
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
    }

    fn poll_dispose(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let this = &mut *self;
        if this.disposed {
            return Poll::Ready(Ok(()));
        }
        // Abandon any in-flight decision before releasing upstream.
        this.pending = None;
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
        let pending = usize::from(self.pending.is_some());
        let (_, upper) = self.upstream.size_hint();
        (0, upper.and_then(|u| u.checked_add(pending)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::seq::SequenceExt;
    use crate::source;
    use crate::test_utils::{block_on, init_test, noop_waker};

    /// Yields every element until `limit` elements passed, then flushes a
    /// sentinel during the drain phase. Exercises both phases at once.
    struct FlushTail {
        flushed: bool,
    }

    impl Decide<i32> for FlushTail {
        type Out = i32;

        fn decide(&mut self, input: Option<i32>) -> Result<Step<i32>> {
            match input {
                Some(item) => Ok(Step::Yield(item)),
                None if !self.flushed => {
                    self.flushed = true;
                    Ok(Step::Yield(-1))
                }
                None => Ok(Step::Done),
            }
        }
    }

    #[test]
    fn machine_drain_phase_flushes() {
        init_test("machine_drain_phase_flushes");

        let machine = Machine::new(source::iter(vec![1, 2]), FlushTail { flushed: false });
        let out = block_on(machine.to_vec()).expect("drain");
        crate::assert_with_log!(out == vec![1, 2, -1], "flushed", vec![1, 2, -1], out);
        crate::test_complete!("machine_drain_phase_flushes");
    }

    struct FailOn(i32);

    impl Decide<i32> for FailOn {
        type Out = i32;

        fn decide(&mut self, input: Option<i32>) -> Result<Step<i32>> {
            match input {
                Some(item) if item == self.0 => Err(Error::msg("decision failed")),
                Some(item) => Ok(Step::Yield(item)),
                None => Ok(Step::Done),
            }
        }
    }

    #[test]
    fn machine_decision_error_becomes_failed_advance() {
        init_test("machine_decision_error_becomes_failed_advance");

        let mut machine = Machine::new(source::iter(vec![1, 2, 3]), FailOn(2));
        let first = block_on(machine.next()).expect("advance");
        crate::assert_with_log!(first == Some(1), "first", Some(1), first);
        let err = block_on(machine.next()).expect_err("decision error");
        crate::assert_with_log!(
            err.to_string() == "decision failed",
            "error",
            "decision failed",
            err.to_string()
        );
        // Terminal after the error.
        let end = block_on(machine.next()).expect("advance");
        crate::assert_with_log!(end.is_none(), "terminal", None::<i32>, end);
        crate::test_complete!("machine_decision_error_becomes_failed_advance");
    }

    #[test]
    fn machine_long_synchronous_run_is_flat() {
        init_test("machine_long_synchronous_run_is_flat");

        // A hundred thousand synchronously-ready skips must not overflow the
        // stack: the machine loops, it does not recurse.
        struct DropAll;
        impl Decide<u32> for DropAll {
            type Out = u32;
            fn decide(&mut self, input: Option<u32>) -> Result<Step<u32>> {
                Ok(input.map_or(Step::Done, |_| Step::Skip))
            }
        }

        let mut machine = Machine::new(source::range(0, 100_000), DropAll);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let poll = Pin::new(&mut machine).poll_advance(&mut cx);
        assert!(matches!(poll, Poll::Ready(Ok(None))));
        crate::test_complete!("machine_long_synchronous_run_is_flat");
    }

    #[test]
    fn then_machine_awaits_each_decision() {
        init_test("then_machine_awaits_each_decision");

        let out = block_on(
            source::iter(vec![1i32, 2, 3])
                .then(|x| async move { x * 10 })
                .to_vec(),
        )
        .expect("drain");
        crate::assert_with_log!(out == vec![10, 20, 30], "mapped", vec![10, 20, 30], out);
        crate::test_complete!("then_machine_awaits_each_decision");
    }

    #[test]
    fn dispose_is_idempotent() {
        init_test("dispose_is_idempotent");

        let mut machine = Machine::new(source::iter(vec![1]), FailOn(99));
        let disposed = block_on(machine.dispose());
        assert!(disposed.is_ok());
        let disposed_again = block_on(machine.dispose());
        assert!(disposed_again.is_ok());
        // A disposed machine is terminal.
        let end = block_on(machine.next()).expect("advance");
        crate::assert_with_log!(end.is_none(), "terminal", None::<i32>, end);
        crate::test_complete!("dispose_is_idempotent");
    }
}
