//! Push-style bridges over the pull protocol.
//!
//! [`Observer`] is the push-side contract: elements arrive through
//! `on_next`, and exactly one terminal notification follows, `on_completed`
//! or `on_error`. The [`subscribe`](crate::seq::SequenceExt::subscribe) and
//! [`subscribe_fn`](crate::seq::SequenceExt::subscribe_fn) drains convert a
//! pulling loop into those calls; [`pipe`] goes the other way, turning an
//! observer fed from anywhere into a pullable [`Sequence`].
//!
//! Cancellation is not an error in either direction: a canceled drain
//! disposes quietly without a terminal notification.

use crate::error::{Error, Result};
use crate::handoff::{self, Receiver, Sender};
use crate::seq::{Advance, Sequence};
use crate::unobserved;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A push-side consumer of sequence elements.
pub trait Observer<T> {
    /// Receives one element. An error aborts the feeding drain.
    fn on_next(&mut self, item: T) -> Result<()>;

    /// Receives the terminal error. Called at most once, after which no
    /// other method is called.
    fn on_error(&mut self, error: Error);

    /// Signals normal completion. Called at most once, after which no other
    /// method is called.
    fn on_completed(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pull,
    Dispose,
    Done,
}

/// Future for the [`subscribe`](crate::seq::SequenceExt::subscribe) method.
///
/// Pulls the sequence to exhaustion, pushing each element into the observer.
/// Upstream errors and `on_next` errors are routed to `on_error`, except
/// cancellation, which ends the drain silently. Upstream is disposed on
/// every exit path; a disposal failure after the terminal notification is
/// logged, not re-raised.
#[must_use = "futures do nothing unless awaited"]
#[derive(Debug)]
pub struct Subscribe<S, O> {
    upstream: S,
    observer: O,
    phase: Phase,
}

impl<S, O> Subscribe<S, O> {
    pub(crate) fn new(upstream: S, observer: O) -> Self {
        Self {
            upstream,
            observer,
            phase: Phase::Pull,
        }
    }
}

impl<S, O> Future for Subscribe<S, O>
where
    S: Sequence + Unpin,
    S::Item: Unpin,
    O: Observer<S::Item> + Unpin,
{
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        loop {
            match this.phase {
                Phase::Pull => match Pin::new(&mut this.upstream).poll_advance(cx) {
                    Poll::Ready(Ok(Some(item))) => match this.observer.on_next(item) {
                        Ok(()) => {}
                        Err(e) => {
                            if !e.is_canceled() {
                                this.observer.on_error(e);
                            }
                            this.phase = Phase::Dispose;
                        }
                    },
                    Poll::Ready(Ok(None)) => {
                        this.observer.on_completed();
                        this.phase = Phase::Dispose;
                    }
                    Poll::Ready(Err(e)) => {
                        if !e.is_canceled() {
                            this.observer.on_error(e);
                        }
                        this.phase = Phase::Dispose;
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Phase::Dispose => {
                    match Pin::new(&mut this.upstream).poll_dispose(cx) {
                        Poll::Ready(Ok(())) => {}
                        Poll::Ready(Err(e)) => {
                            tracing::warn!(error = %e, "disposal failed after drain settled");
                        }
                        Poll::Pending => return Poll::Pending,
                    }
                    this.phase = Phase::Done;
                    return Poll::Ready(());
                }
                Phase::Done => panic!("drain polled after completion"),
            }
        }
    }
}

/// Future for the [`subscribe_fn`](crate::seq::SequenceExt::subscribe_fn)
/// method.
///
/// Like [`Subscribe`] but with no error channel: any error, from the
/// callback or upstream, aborts the drain and goes to the process-wide
/// unobserved-error sink. Cancellation is suppressed there too.
#[must_use = "futures do nothing unless awaited"]
#[derive(Debug)]
pub struct SubscribeFn<S, F> {
    upstream: S,
    f: F,
    phase: Phase,
}

impl<S, F> SubscribeFn<S, F> {
    pub(crate) fn new(upstream: S, f: F) -> Self {
        Self {
            upstream,
            f,
            phase: Phase::Pull,
        }
    }
}

impl<S, F> Future for SubscribeFn<S, F>
where
    S: Sequence + Unpin,
    S::Item: Unpin,
    F: FnMut(S::Item) -> Result<()> + Unpin,
{
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        loop {
            match this.phase {
                Phase::Pull => match Pin::new(&mut this.upstream).poll_advance(cx) {
                    Poll::Ready(Ok(Some(item))) => {
                        if let Err(e) = (this.f)(item) {
                            unobserved::report(&e);
                            this.phase = Phase::Dispose;
                        }
                    }
                    Poll::Ready(Ok(None)) => this.phase = Phase::Dispose,
                    Poll::Ready(Err(e)) => {
                        unobserved::report(&e);
                        this.phase = Phase::Dispose;
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Phase::Dispose => {
                    match Pin::new(&mut this.upstream).poll_dispose(cx) {
                        Poll::Ready(Ok(())) => {}
                        Poll::Ready(Err(e)) => unobserved::report(&e),
                        Poll::Pending => return Poll::Pending,
                    }
                    this.phase = Phase::Done;
                    return Poll::Ready(());
                }
                Phase::Done => panic!("drain polled after completion"),
            }
        }
    }
}

/// Creates a push-to-pull bridge.
///
/// The writer half implements [`Observer`] and may be fed from any thread;
/// the reader half is a [`Sequence`] yielding everything pushed, in order.
/// Terminal notifications carry across: `on_completed` ends the reader,
/// `on_error` surfaces its error once. Disposing the reader makes further
/// `on_next` calls report [`Error::Closed`].
#[must_use]
pub fn pipe<T>() -> (PipeWriter<T>, PipeReader<T>) {
    let (sender, receiver) = handoff::handoff();
    (PipeWriter { sender }, PipeReader { receiver })
}

/// The observer half of a [`pipe`].
#[derive(Debug)]
pub struct PipeWriter<T> {
    sender: Sender<T>,
}

impl<T> Observer<T> for PipeWriter<T> {
    fn on_next(&mut self, item: T) -> Result<()> {
        self.sender.push(item)
    }

    fn on_error(&mut self, error: Error) {
        self.sender.fail(error);
    }

    fn on_completed(&mut self) {
        self.sender.close();
    }
}

/// The sequence half of a [`pipe`].
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct PipeReader<T> {
    receiver: Receiver<T>,
}

impl<T> Sequence for PipeReader<T> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::SequenceExt;
    use crate::source;
    use crate::test_utils::{block_on, init_test};

    #[derive(Debug, Default)]
    struct Recording {
        items: Vec<i32>,
        completed: bool,
        error: Option<String>,
    }

    impl Observer<i32> for &mut Recording {
        fn on_next(&mut self, item: i32) -> Result<()> {
            self.items.push(item);
            Ok(())
        }

        fn on_error(&mut self, error: Error) {
            self.error = Some(error.to_string());
        }

        fn on_completed(&mut self) {
            self.completed = true;
        }
    }

    #[test]
    fn subscribe_delivers_items_then_completion() {
        init_test("subscribe_delivers_items_then_completion");
        let mut rec = Recording::default();
        block_on(source::iter(vec![1, 2, 3]).subscribe(&mut rec));
        crate::assert_with_log!(rec.items == vec![1, 2, 3], "items", vec![1, 2, 3], rec.items);
        assert!(rec.completed);
        assert!(rec.error.is_none());
        crate::test_complete!("subscribe_delivers_items_then_completion");
    }

    #[test]
    fn subscribe_routes_failure_to_on_error() {
        init_test("subscribe_routes_failure_to_on_error");
        let mut rec = Recording::default();
        block_on(
            source::iter(vec![1])
                .chain(source::fault(Error::msg("boom")))
                .subscribe(&mut rec),
        );
        assert_eq!(rec.items, vec![1]);
        assert!(!rec.completed);
        assert_eq!(rec.error.as_deref(), Some("boom"));
        crate::test_complete!("subscribe_routes_failure_to_on_error");
    }

    #[test]
    fn subscribe_swallows_cancellation() {
        init_test("subscribe_swallows_cancellation");
        let mut rec = Recording::default();
        block_on(source::fault(Error::Canceled).subscribe(&mut rec));
        assert!(!rec.completed);
        assert!(rec.error.is_none());
        crate::test_complete!("subscribe_swallows_cancellation");
    }

    #[test]
    fn subscribe_fn_aborts_on_callback_error() {
        init_test("subscribe_fn_aborts_on_callback_error");
        let mut seen = Vec::new();
        block_on(source::iter(vec![1, 2, 3]).subscribe_fn(|x| {
            if x == 2 {
                return Err(Error::msg("enough"));
            }
            seen.push(x);
            Ok(())
        }));
        crate::assert_with_log!(seen == vec![1], "seen before abort", vec![1], seen);
        crate::test_complete!("subscribe_fn_aborts_on_callback_error");
    }

    #[test]
    fn pipe_carries_items_and_completion() {
        init_test("pipe_carries_items_and_completion");
        let (mut writer, reader) = pipe();
        writer.on_next(1).expect("push");
        writer.on_next(2).expect("push");
        writer.on_completed();
        let out = block_on(reader.to_vec()).expect("drain");
        crate::assert_with_log!(out == vec![1, 2], "piped", vec![1, 2], out);
        crate::test_complete!("pipe_carries_items_and_completion");
    }

    #[test]
    fn pipe_carries_errors_and_rejects_after_reader_dispose() {
        init_test("pipe_carries_errors_and_rejects_after_reader_dispose");
        let (mut writer, mut reader) = pipe::<i32>();
        writer.on_error(Error::msg("broken pipe"));
        let err = block_on(reader.next()).expect_err("failure");
        assert_eq!(err.to_string(), "broken pipe");

        let (mut writer, mut reader) = pipe::<i32>();
        block_on(reader.dispose()).expect("dispose");
        let err = writer.on_next(1).expect_err("closed");
        assert!(matches!(err, Error::Closed));
        crate::test_complete!("pipe_carries_errors_and_rejects_after_reader_dispose");
    }

    #[test]
    fn pipe_feeds_from_another_thread() {
        init_test("pipe_feeds_from_another_thread");
        let (mut writer, reader) = pipe();
        let feeder = std::thread::spawn(move || {
            for i in 0..10 {
                writer.on_next(i).expect("push");
            }
            writer.on_completed();
        });
        let out = block_on(reader.to_vec()).expect("drain");
        feeder.join().expect("feeder thread");
        assert_eq!(out, (0..10).collect::<Vec<_>>());
        crate::test_complete!("pipe_feeds_from_another_thread");
    }
}
