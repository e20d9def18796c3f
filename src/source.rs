//! Leaf sources: cursors with no upstream.
//!
//! Everything here produces elements from a closed-form rule or an existing
//! collection, requiring no suspension — except [`never`], which parks until
//! its cancellation token fires, and [`from_future`], which defers a single
//! value.

use crate::cancel::{CancelToken, Registration};
use crate::error::{Error, Result};
use crate::seq::{Advance, Sequence};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Converts a synchronous collection into a sequence.
pub fn iter<I: IntoIterator>(collection: I) -> Iter<I::IntoIter> {
    Iter {
        inner: Some(collection.into_iter()),
    }
}

/// Sequence for the [`iter`] function.
#[derive(Debug, Clone)]
#[must_use = "sequences do nothing unless polled"]
pub struct Iter<I> {
    inner: Option<I>,
}

impl<I: Iterator + Unpin> Sequence for Iter<I> {
    type Item = I::Item;

    fn poll_advance(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Advance<I::Item>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(Ok(None));
        };
        match inner.next() {
            Some(item) => Poll::Ready(Ok(Some(item))),
            None => {
                self.inner = None;
                Poll::Ready(Ok(None))
            }
        }
    }

    fn poll_dispose(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner = None;
        Poll::Ready(Ok(()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.as_ref().map_or((0, Some(0)), Iterator::size_hint)
    }
}

/// Yields `count` consecutive integers starting at `start`.
///
/// # Panics
///
/// Panics if `start + count` would overflow.
pub fn range(start: u32, count: u32) -> Range {
    assert!(
        start.checked_add(count).is_some(),
        "range end must not overflow"
    );
    Range {
        next: start,
        end: start + count,
    }
}

/// Sequence for the [`range`] function.
#[derive(Debug, Clone)]
#[must_use = "sequences do nothing unless polled"]
pub struct Range {
    next: u32,
    end: u32,
}

impl Sequence for Range {
    type Item = u32;

    fn poll_advance(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Advance<u32>> {
        if self.next >= self.end {
            return Poll::Ready(Ok(None));
        }
        let value = self.next;
        self.next += 1;
        Poll::Ready(Ok(Some(value)))
    }

    fn poll_dispose(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.next = self.end;
        Poll::Ready(Ok(()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

/// Yields `value` exactly `count` times.
pub fn repeat<T: Clone>(value: T, count: usize) -> Repeat<T> {
    Repeat {
        value: Some(value),
        remaining: count,
    }
}

/// Sequence for the [`repeat`] function.
#[derive(Debug, Clone)]
#[must_use = "sequences do nothing unless polled"]
pub struct Repeat<T> {
    value: Option<T>,
    remaining: usize,
}

impl<T: Clone + Unpin> Sequence for Repeat<T> {
    type Item = T;

    fn poll_advance(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Advance<T>> {
        if self.remaining == 0 {
            return Poll::Ready(Ok(None));
        }
        self.remaining -= 1;
        let value = if self.remaining == 0 {
            self.value.take()
        } else {
            self.value.clone()
        };
        Poll::Ready(Ok(value))
    }

    fn poll_dispose(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.remaining = 0;
        self.value = None;
        Poll::Ready(Ok(()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Yields a single value.
pub fn once<T>(value: T) -> Once<T> {
    Once { value: Some(value) }
}

/// Sequence for the [`once`] function.
#[derive(Debug, Clone)]
#[must_use = "sequences do nothing unless polled"]
pub struct Once<T> {
    value: Option<T>,
}

impl<T: Unpin> Sequence for Once<T> {
    type Item = T;

    fn poll_advance(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Advance<T>> {
        Poll::Ready(Ok(self.value.take()))
    }

    fn poll_dispose(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.value = None;
        Poll::Ready(Ok(()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::from(self.value.is_some());
        (remaining, Some(remaining))
    }
}

/// Yields the single value a future resolves to.
pub fn from_future<Fut: Future>(future: Fut) -> FromFuture<Fut> {
    FromFuture {
        future: Some(Box::pin(future)),
    }
}

/// Sequence for the [`from_future`] function.
#[must_use = "sequences do nothing unless polled"]
pub struct FromFuture<Fut> {
    future: Option<Pin<Box<Fut>>>,
}

impl<Fut: Future> Sequence for FromFuture<Fut> {
    type Item = Fut::Output;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<Fut::Output>> {
        let Some(future) = self.future.as_mut() else {
            return Poll::Ready(Ok(None));
        };
        match future.as_mut().poll(cx) {
            Poll::Ready(value) => {
                self.future = None;
                Poll::Ready(Ok(Some(value)))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_dispose(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.future = None;
        Poll::Ready(Ok(()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::from(self.future.is_some());
        (remaining, Some(remaining))
    }
}

impl<Fut> std::fmt::Debug for FromFuture<Fut> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FromFuture")
            .field("resolved", &self.future.is_none())
            .finish()
    }
}

/// The empty sequence.
#[must_use]
pub fn empty<T>() -> Empty<T> {
    Empty {
        _marker: std::marker::PhantomData,
    }
}

/// Sequence for the [`empty`] function.
#[derive(Debug, Clone)]
#[must_use = "sequences do nothing unless polled"]
pub struct Empty<T> {
    // fn-pointer marker: the item is an output, and the cursor must stay
    // Unpin whatever the item type is
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> Sequence for Empty<T> {
    type Item = T;

    fn poll_advance(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Advance<T>> {
        Poll::Ready(Ok(None))
    }

    fn poll_dispose(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(0))
    }
}

/// A sequence that never produces and settles only when `token` fires.
///
/// The first advance registers against the token and parks; when the token
/// fires the pending advance settles as [`Error::Canceled`].
#[must_use]
pub fn never<T>(token: &CancelToken) -> Never<T> {
    Never {
        token: token.clone(),
        shared: Arc::new(Mutex::new(None)),
        registration: None,
        done: false,
        _marker: std::marker::PhantomData,
    }
}

/// Sequence for the [`never`] function.
#[must_use = "sequences do nothing unless polled"]
pub struct Never<T> {
    token: CancelToken,
    shared: Arc<Mutex<Option<Waker>>>,
    registration: Option<Registration>,
    done: bool,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> Sequence for Never<T> {
    type Item = T;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<T>> {
        if self.done {
            return Poll::Ready(Ok(None));
        }
        if self.token.is_requested() {
            self.done = true;
            self.registration = None;
            return Poll::Ready(Err(Error::Canceled));
        }

        *self.shared.lock() = Some(cx.waker().clone());
        if self.registration.is_none() {
            let shared = Arc::clone(&self.shared);
            let registration = self.token.register(move || {
                if let Some(waker) = shared.lock().take() {
                    waker.wake();
                }
            });
            self.registration = Some(registration);
            // The token may have fired between the check above and the
            // registration; re-check so the park cannot be missed.
            if self.token.is_requested() {
                self.done = true;
                self.registration = None;
                return Poll::Ready(Err(Error::Canceled));
            }
        }
        Poll::Pending
    }

    fn poll_dispose(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.done = true;
        self.registration = None;
        Poll::Ready(Ok(()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(0))
    }
}

impl<T> std::fmt::Debug for Never<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Never").field("done", &self.done).finish()
    }
}

/// A sequence whose first advance fails with `error`.
pub fn fault<T>(error: Error) -> Fault<T> {
    Fault {
        error: Some(error),
        _marker: std::marker::PhantomData,
    }
}

/// Sequence for the [`fault`] function.
#[derive(Debug, Clone)]
#[must_use = "sequences do nothing unless polled"]
pub struct Fault<T> {
    error: Option<Error>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> Sequence for Fault<T> {
    type Item = T;

    fn poll_advance(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Advance<T>> {
        match self.error.take() {
            Some(error) => Poll::Ready(Err(error)),
            None => Poll::Ready(Ok(None)),
        }
    }

    fn poll_dispose(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.error = None;
        Poll::Ready(Ok(()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(0))
    }
}
