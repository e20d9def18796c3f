//! Element-wise comparison of two sequences.

use super::Sequence;
use crate::error::{Error, Result};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Compare,
    Dispose,
    Done,
}

/// Future for the [`sequence_equal`](super::SequenceExt::sequence_equal)
/// method.
///
/// Pulls the two sequences in lockstep and resolves false at the first
/// mismatch or length difference, true when both end together. Both chains
/// are disposed before the future settles, whatever the outcome.
#[must_use = "futures do nothing unless awaited"]
pub struct SequenceEqual<S1: Sequence, S2> {
    first: S1,
    second: S2,
    left: Option<Option<S1::Item>>,
    outcome: Option<Result<bool>>,
    phase: Phase,
    first_disposed: bool,
    first_dispose_err: Option<Error>,
}

impl<S1: Sequence, S2> SequenceEqual<S1, S2> {
    pub(crate) fn new(first: S1, second: S2) -> Self {
        Self {
            first,
            second,
            left: None,
            outcome: None,
            phase: Phase::Compare,
            first_disposed: false,
            first_dispose_err: None,
        }
    }
}

impl<S1, S2> Future for SequenceEqual<S1, S2>
where
    S1: Sequence + Unpin,
    S1::Item: PartialEq + Unpin,
    S2: Sequence<Item = S1::Item> + Unpin,
{
    type Output = Result<bool>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        loop {
            match this.phase {
                Phase::Compare => {
                    if this.left.is_none() {
                        match Pin::new(&mut this.first).poll_advance(cx) {
                            Poll::Ready(Ok(advance)) => this.left = Some(advance),
                            Poll::Ready(Err(e)) => {
                                this.outcome = Some(Err(e));
                                this.phase = Phase::Dispose;
                                continue;
                            }
                            Poll::Pending => return Poll::Pending,
                        }
                    }
                    match Pin::new(&mut this.second).poll_advance(cx) {
                        Poll::Ready(Ok(right)) => {
                            let Some(left) = this.left.take() else {
                                continue;
                            };
                            match (left, right) {
                                (Some(a), Some(b)) if a == b => {}
                                (None, None) => {
                                    this.outcome = Some(Ok(true));
                                    this.phase = Phase::Dispose;
                                }
                                _ => {
                                    this.outcome = Some(Ok(false));
                                    this.phase = Phase::Dispose;
                                }
                            }
                        }
                        Poll::Ready(Err(e)) => {
                            this.outcome = Some(Err(e));
                            this.phase = Phase::Dispose;
                        }
                        Poll::Pending => return Poll::Pending,
                    }
                }
                Phase::Dispose => {
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
                    this.phase = Phase::Done;
                    let outcome = this.outcome.take().expect("outcome taken twice");
                    let disposal = match (this.first_dispose_err.take(), second_result) {
                        (None, result) => result,
                        (Some(e), Ok(())) => Err(e),
                        (Some(e), Err(second_err)) => {
                            tracing::warn!(error = %second_err, "second disposal also failed");
                            Err(e)
                        }
                    };
                    return Poll::Ready(match (outcome, disposal) {
                        (Ok(value), Ok(())) => Ok(value),
                        (Ok(_), Err(disposal_err)) => Err(disposal_err),
                        (Err(e), Ok(())) => Err(e),
                        (Err(e), Err(disposal_err)) => {
                            tracing::warn!(
                                error = %disposal_err,
                                "disposal failed after an earlier comparison error"
                            );
                            Err(e)
                        }
                    });
                }
                Phase::Done => panic!("comparison future polled after completion"),
            }
        }
    }
}
