//! Single-step futures over a borrowed cursor.

use super::{Advance, Sequence};
use crate::error::Result;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Future for the [`next`](super::SequenceExt::next) method.
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct Next<'a, S: ?Sized> {
    seq: &'a mut S,
}

impl<'a, S: ?Sized> Next<'a, S> {
    pub(crate) fn new(seq: &'a mut S) -> Self {
        Self { seq }
    }
}

impl<S: Sequence + Unpin + ?Sized> Future for Next<'_, S> {
    type Output = Advance<S::Item>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut *self.seq).poll_advance(cx)
    }
}

/// Future for the [`dispose`](super::SequenceExt::dispose) method.
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct Dispose<'a, S: ?Sized> {
    seq: &'a mut S,
}

impl<'a, S: ?Sized> Dispose<'a, S> {
    pub(crate) fn new(seq: &'a mut S) -> Self {
        Self { seq }
    }
}

impl<S: Sequence + Unpin + ?Sized> Future for Dispose<'_, S> {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut *self.seq).poll_dispose(cx)
    }
}
