//! Eager draining through a hand-off queue.
//!
//! [`detach`](super::SequenceExt::detach) splits a sequence into a
//! [`Detached`] cursor and a [`Pump`] future. The pump pulls upstream as
//! fast as it settles and pushes into an unbounded queue; the cursor pops at
//! its own pace. Producer and consumer pace are fully decoupled.

use super::{Advance, Sequence};
use crate::error::{Error, Result};
use crate::handoff::{self, Receiver, Sender};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pub(crate) fn detach<S: Sequence>(upstream: S) -> (Detached<S::Item>, Pump<S>) {
    let (sender, receiver) = handoff::handoff();
    (
        Detached { receiver },
        Pump {
            upstream,
            sender,
            phase: Phase::Pull,
            outcome: None,
        },
    )
}

/// The consumer side of [`detach`](super::SequenceExt::detach): a cursor over
/// the hand-off queue.
///
/// Disposing it closes the queue, so the pump stops writing and winds down
/// on its next push.
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct Detached<T> {
    receiver: Receiver<T>,
}

impl<T> Sequence for Detached<T> {
    type Item = T;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<T>> {
        Pin::new(&mut self.receiver).poll_advance(cx)
    }

    fn poll_dispose(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.receiver).poll_dispose(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.receiver.size_hint()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pull,
    Dispose,
    Done,
}

/// The producer side of [`detach`](super::SequenceExt::detach): drains
/// upstream into the queue until it ends, fails, or the consumer goes away.
///
/// Resolves `Ok(())` on normal completion or consumer closure, `Err(e)` when
/// upstream failed; the same error is also delivered through the queue.
/// Upstream is disposed on every exit path.
#[must_use = "futures do nothing unless awaited"]
#[derive(Debug)]
pub struct Pump<S: Sequence> {
    upstream: S,
    sender: Sender<S::Item>,
    phase: Phase,
    outcome: Option<Result<()>>,
}

impl<S> Future for Pump<S>
where
    S: Sequence + Unpin,
    S::Item: Unpin,
{
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        loop {
            match this.phase {
                Phase::Pull => match Pin::new(&mut this.upstream).poll_advance(cx) {
                    Poll::Ready(Ok(Some(item))) => {
                        if this.sender.push(item).is_err() {
                            // consumer disposed its cursor; not a failure
                            tracing::trace!("pump stopping, consumer gone");
                            this.outcome = Some(Ok(()));
                            this.phase = Phase::Dispose;
                        }
                    }
                    Poll::Ready(Ok(None)) => {
                        this.sender.close();
                        this.outcome = Some(Ok(()));
                        this.phase = Phase::Dispose;
                    }
                    Poll::Ready(Err(e)) => {
                        // the queue and the pump caller both observe the error
                        this.sender.fail(e.clone());
                        this.outcome = Some(Err(e));
                        this.phase = Phase::Dispose;
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Phase::Dispose => {
                    let dispose_result = match Pin::new(&mut this.upstream).poll_dispose(cx) {
                        Poll::Ready(result) => result,
                        Poll::Pending => return Poll::Pending,
                    };
                    this.phase = Phase::Done;
                    let outcome = this.outcome.take().expect("outcome taken twice");
                    return Poll::Ready(match (outcome, dispose_result) {
                        (Ok(()), result) => result,
                        (Err(e), Ok(())) => Err(e),
                        (Err(e), Err(dispose_err)) => {
                            tracing::warn!(
                                error = %dispose_err,
                                "disposal failed after an earlier pump error"
                            );
                            Err(e)
                        }
                    });
                }
                Phase::Done => panic!("pump polled after completion"),
            }
        }
    }
}

impl<S: Sequence> Pump<S> {
    /// Fails the queue without consuming more of upstream.
    ///
    /// The next poll disposes upstream and resolves with the error.
    pub fn abort(&mut self, error: Error) {
        if self.phase == Phase::Pull {
            self.sender.fail(error.clone());
            self.outcome = Some(Err(error));
            self.phase = Phase::Dispose;
        }
    }
}
