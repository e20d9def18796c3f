//! Trigger- and token-gated combinators.
//!
//! Two flavors of "until": a one-shot trigger future, and cancellation
//! tokens raced through [`RaceTrigger`] so that when two tokens are watched
//! the first to fire wins exactly once.

use super::{Advance, Sequence};
use crate::cancel::{CancelToken, RaceTrigger};
use crate::error::{Error, Result};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Sequence for the [`take_until`](super::SequenceExt::take_until) method.
#[must_use = "sequences do nothing unless polled"]
pub struct TakeUntil<S, Fut> {
    upstream: S,
    trigger: Option<Pin<Box<Fut>>>,
    done: bool,
    disposed: bool,
}

impl<S, Fut> TakeUntil<S, Fut> {
    pub(crate) fn new(upstream: S, trigger: Fut) -> Self {
        Self {
            upstream,
            trigger: Some(Box::pin(trigger)),
            done: false,
            disposed: false,
        }
    }
}

impl<S, Fut> Sequence for TakeUntil<S, Fut>
where
    S: Sequence + Unpin,
    Fut: Future,
{
    type Item = S::Item;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(Ok(None));
        }

        // The trigger is consulted before upstream, so a fired trigger ends
        // the sequence even while upstream stays ready.
        if let Some(trigger) = this.trigger.as_mut() {
            if trigger.as_mut().poll(cx).is_ready() {
                this.trigger = None;
                this.done = true;
                return Poll::Ready(Ok(None));
            }
        }

        match Pin::new(&mut this.upstream).poll_advance(cx) {
            Poll::Ready(Ok(Some(item))) => Poll::Ready(Ok(Some(item))),
            Poll::Ready(Ok(None)) => {
                this.trigger = None;
                this.done = true;
                Poll::Ready(Ok(None))
            }
            Poll::Ready(Err(e)) => {
                this.trigger = None;
                this.done = true;
                Poll::Ready(Err(e))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_dispose(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let this = &mut *self;
        if this.disposed {
            return Poll::Ready(Ok(()));
        }
        this.trigger = None;
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
        (0, self.upstream.size_hint().1)
    }
}

impl<S: std::fmt::Debug, Fut> std::fmt::Debug for TakeUntil<S, Fut> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TakeUntil")
            .field("upstream", &self.upstream)
            .field("armed", &self.trigger.is_some())
            .field("done", &self.done)
            .finish()
    }
}

/// Sequence for the [`skip_until`](super::SequenceExt::skip_until) method.
///
/// Until the trigger fires, an advance waits on the trigger alone; upstream
/// is never pulled early, so no element can be consumed and lost.
#[must_use = "sequences do nothing unless polled"]
pub struct SkipUntil<S, Fut> {
    upstream: S,
    trigger: Option<Pin<Box<Fut>>>,
    done: bool,
    disposed: bool,
}

impl<S, Fut> SkipUntil<S, Fut> {
    pub(crate) fn new(upstream: S, trigger: Fut) -> Self {
        Self {
            upstream,
            trigger: Some(Box::pin(trigger)),
            done: false,
            disposed: false,
        }
    }
}

impl<S, Fut> Sequence for SkipUntil<S, Fut>
where
    S: Sequence + Unpin,
    Fut: Future,
{
    type Item = S::Item;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(Ok(None));
        }

        if let Some(trigger) = this.trigger.as_mut() {
            match trigger.as_mut().poll(cx) {
                Poll::Ready(_) => this.trigger = None,
                Poll::Pending => return Poll::Pending,
            }
        }

        match Pin::new(&mut this.upstream).poll_advance(cx) {
            Poll::Ready(Ok(Some(item))) => Poll::Ready(Ok(Some(item))),
            Poll::Ready(Ok(None)) => {
                this.done = true;
                Poll::Ready(Ok(None))
            }
            Poll::Ready(Err(e)) => {
                this.done = true;
                Poll::Ready(Err(e))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_dispose(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let this = &mut *self;
        if this.disposed {
            return Poll::Ready(Ok(()));
        }
        this.trigger = None;
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
        (0, self.upstream.size_hint().1)
    }
}

impl<S: std::fmt::Debug, Fut> std::fmt::Debug for SkipUntil<S, Fut> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkipUntil")
            .field("upstream", &self.upstream)
            .field("waiting", &self.trigger.is_some())
            .field("done", &self.done)
            .finish()
    }
}

/// Sequence for [`take_until_canceled`](super::SequenceExt::take_until_canceled)
/// and [`take_until_any_canceled`](super::SequenceExt::take_until_any_canceled).
///
/// Ends gracefully (exhaustion, not an error) when a watched token fires.
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct TakeUntilCanceled<S> {
    upstream: S,
    race: RaceTrigger,
    done: bool,
    disposed: bool,
}

impl<S> TakeUntilCanceled<S> {
    pub(crate) fn new(upstream: S, first: &CancelToken, second: &CancelToken) -> Self {
        Self {
            upstream,
            race: RaceTrigger::new(first, second),
            done: false,
            disposed: false,
        }
    }
}

impl<S: Sequence + Unpin> Sequence for TakeUntilCanceled<S> {
    type Item = S::Item;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(Ok(None));
        }

        if this.race.park(cx.waker()).is_some() {
            this.race.release();
            this.done = true;
            return Poll::Ready(Ok(None));
        }

        match Pin::new(&mut this.upstream).poll_advance(cx) {
            Poll::Ready(Ok(Some(item))) => Poll::Ready(Ok(Some(item))),
            Poll::Ready(Ok(None)) => {
                this.race.release();
                this.done = true;
                Poll::Ready(Ok(None))
            }
            Poll::Ready(Err(e)) => {
                this.race.release();
                this.done = true;
                Poll::Ready(Err(e))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_dispose(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let this = &mut *self;
        if this.disposed {
            return Poll::Ready(Ok(()));
        }
        this.race.release();
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
        (0, self.upstream.size_hint().1)
    }
}

/// Sequence for [`skip_until_canceled`](super::SequenceExt::skip_until_canceled)
/// and [`skip_until_any_canceled`](super::SequenceExt::skip_until_any_canceled).
///
/// Until a watched token fires, elements are pulled and discarded; after the
/// fire, elements flow through.
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct SkipUntilCanceled<S> {
    upstream: S,
    race: RaceTrigger,
    forwarding: bool,
    done: bool,
    disposed: bool,
}

impl<S> SkipUntilCanceled<S> {
    pub(crate) fn new(upstream: S, first: &CancelToken, second: &CancelToken) -> Self {
        Self {
            upstream,
            race: RaceTrigger::new(first, second),
            forwarding: false,
            done: false,
            disposed: false,
        }
    }
}

impl<S: Sequence + Unpin> Sequence for SkipUntilCanceled<S> {
    type Item = S::Item;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(Ok(None));
        }

        loop {
            if !this.forwarding && this.race.park(cx.waker()).is_some() {
                this.race.release();
                this.forwarding = true;
                continue;
            }

            match Pin::new(&mut this.upstream).poll_advance(cx) {
                Poll::Ready(Ok(Some(item))) => {
                    if this.forwarding {
                        return Poll::Ready(Ok(Some(item)));
                    }
                    // still in the discard phase; drop it and pull again
                }
                Poll::Ready(Ok(None)) => {
                    this.race.release();
                    this.done = true;
                    return Poll::Ready(Ok(None));
                }
                Poll::Ready(Err(e)) => {
                    this.race.release();
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
        this.race.release();
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
        if self.forwarding {
            self.upstream.size_hint()
        } else {
            (0, self.upstream.size_hint().1)
        }
    }
}

/// Sequence for the [`with_cancel`](super::SequenceExt::with_cancel) method.
///
/// A cheap synchronous gate: the token is checked at the top of every
/// advance and a fired token fails the advance with
/// [`Error::Canceled`]. A pending upstream advance is not interrupted.
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct WithCancel<S> {
    upstream: S,
    token: CancelToken,
    done: bool,
    disposed: bool,
}

impl<S> WithCancel<S> {
    pub(crate) fn new(upstream: S, token: &CancelToken) -> Self {
        Self {
            upstream,
            token: token.clone(),
            done: false,
            disposed: false,
        }
    }
}

impl<S: Sequence + Unpin> Sequence for WithCancel<S> {
    type Item = S::Item;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(Ok(None));
        }
        if this.token.is_requested() {
            this.done = true;
            return Poll::Ready(Err(Error::Canceled));
        }

        match Pin::new(&mut this.upstream).poll_advance(cx) {
            Poll::Ready(Ok(Some(item))) => Poll::Ready(Ok(Some(item))),
            Poll::Ready(Ok(None)) => {
                this.done = true;
                Poll::Ready(Ok(None))
            }
            Poll::Ready(Err(e)) => {
                this.done = true;
                Poll::Ready(Err(e))
            }
            Poll::Pending => Poll::Pending,
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
        (0, self.upstream.size_hint().1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelSource;
    use crate::seq::SequenceExt;
    use crate::source;
    use crate::test_utils::{block_on, init_test, noop_waker, DisposeProbe};

    #[test]
    fn take_until_ready_trigger_is_empty() {
        init_test("take_until_ready_trigger_is_empty");
        let (probe, counters) = DisposeProbe::new(vec![1, 2, 3]);
        let out = block_on(probe.take_until(async {}).to_vec()).expect("drain");
        assert!(out.is_empty());
        crate::assert_with_log!(counters.advances() == 0, "untouched", 0, counters.advances());
        crate::assert_with_log!(counters.disposes() == 1, "disposed", 1, counters.disposes());
        crate::test_complete!("take_until_ready_trigger_is_empty");
    }

    #[test]
    fn take_until_pending_trigger_forwards() {
        init_test("take_until_pending_trigger_forwards");
        let out = block_on(
            source::iter(vec![1, 2])
                .take_until(std::future::pending::<()>())
                .to_vec(),
        )
        .expect("drain");
        crate::assert_with_log!(out == vec![1, 2], "forwarded", vec![1, 2], out);
        crate::test_complete!("take_until_pending_trigger_forwards");
    }

    #[test]
    fn skip_until_does_not_touch_upstream_before_fire() {
        init_test("skip_until_does_not_touch_upstream_before_fire");
        let (probe, counters) = DisposeProbe::new(vec![1, 2, 3]);
        let mut gated = probe.skip_until(std::future::pending::<()>());
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let poll = Pin::new(&mut gated).poll_advance(&mut cx);
        assert!(poll.is_pending());
        crate::assert_with_log!(counters.advances() == 0, "untouched", 0, counters.advances());
        crate::test_complete!("skip_until_does_not_touch_upstream_before_fire");
    }

    #[test]
    fn skip_until_ready_trigger_forwards_everything() {
        init_test("skip_until_ready_trigger_forwards_everything");
        let out = block_on(source::iter(vec![1, 2]).skip_until(async {}).to_vec())
            .expect("drain");
        crate::assert_with_log!(out == vec![1, 2], "forwarded", vec![1, 2], out);
        crate::test_complete!("skip_until_ready_trigger_forwards_everything");
    }

    #[test]
    fn take_until_canceled_ends_gracefully() {
        init_test("take_until_canceled_ends_gracefully");
        let cancel = CancelSource::new();
        cancel.cancel();
        let out = block_on(
            source::iter(vec![1, 2, 3])
                .take_until_canceled(&cancel.token())
                .to_vec(),
        )
        .expect("graceful end");
        assert!(out.is_empty());
        crate::test_complete!("take_until_canceled_ends_gracefully");
    }

    #[test]
    fn take_until_canceled_midway() {
        init_test("take_until_canceled_midway");
        let cancel = CancelSource::new();
        let token = cancel.token();
        let out = block_on(
            source::iter(vec![1, 2, 3, 4])
                .inspect(move |x| {
                    if *x == 2 {
                        cancel.cancel();
                    }
                })
                .take_until_canceled(&token)
                .to_vec(),
        )
        .expect("graceful end");
        crate::assert_with_log!(out == vec![1, 2], "prefix", vec![1, 2], out);
        crate::test_complete!("take_until_canceled_midway");
    }

    #[test]
    fn take_until_any_canceled_first_wins() {
        init_test("take_until_any_canceled_first_wins");
        let alpha = CancelSource::new();
        let beta = CancelSource::new();
        beta.cancel();
        let out = block_on(
            source::iter(vec![1, 2, 3])
                .take_until_any_canceled(&alpha.token(), &beta.token())
                .to_vec(),
        )
        .expect("graceful end");
        assert!(out.is_empty());
        crate::test_complete!("take_until_any_canceled_first_wins");
    }

    #[test]
    fn skip_until_canceled_discards_then_forwards() {
        init_test("skip_until_canceled_discards_then_forwards");
        let cancel = CancelSource::new();
        let token = cancel.token();
        let out = block_on(
            source::iter(vec![1, 2, 3, 4, 5])
                .inspect(move |x| {
                    if *x == 2 {
                        cancel.cancel();
                    }
                })
                .skip_until_canceled(&token)
                .to_vec(),
        )
        .expect("drain");
        crate::assert_with_log!(out == vec![3, 4, 5], "suffix", vec![3, 4, 5], out);
        crate::test_complete!("skip_until_canceled_discards_then_forwards");
    }

    #[test]
    fn skip_until_canceled_never_fired_discards_all() {
        init_test("skip_until_canceled_never_fired_discards_all");
        let quiet = CancelSource::new();
        let out = block_on(
            source::iter(vec![1, 2, 3])
                .skip_until_canceled(&quiet.token())
                .to_vec(),
        )
        .expect("drain");
        assert!(out.is_empty());
        crate::test_complete!("skip_until_canceled_never_fired_discards_all");
    }

    #[test]
    fn with_cancel_fails_with_canceled() {
        init_test("with_cancel_fails_with_canceled");
        let cancel = CancelSource::new();
        let token = cancel.token();
        let err = block_on(
            source::iter(vec![1, 2, 3, 4])
                .inspect(move |x| {
                    if *x == 2 {
                        cancel.cancel();
                    }
                })
                .with_cancel(&token)
                .to_vec(),
        )
        .expect_err("canceled");
        assert!(err.is_canceled());
        crate::test_complete!("with_cancel_fails_with_canceled");
    }

    #[test]
    fn with_cancel_passes_through_when_quiet() {
        init_test("with_cancel_passes_through_when_quiet");
        let quiet = CancelSource::new();
        let out = block_on(
            source::iter(vec![1, 2])
                .with_cancel(&quiet.token())
                .to_vec(),
        )
        .expect("drain");
        crate::assert_with_log!(out == vec![1, 2], "forwarded", vec![1, 2], out);
        crate::test_complete!("with_cancel_passes_through_when_quiet");
    }
}
