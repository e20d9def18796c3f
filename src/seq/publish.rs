//! One-to-many broadcast bridge.
//!
//! [`publish`](super::SequenceExt::publish) splits a sequence into a
//! cloneable [`Publisher`] handle and the [`Driver`] future that feeds it.
//! Nothing is pulled until the driver is polled; each broadcast element is
//! cloned into every subscriber registered at that moment. A subscriber only
//! sees elements broadcast after its registration.
//!
//! Dropping the driver before upstream ends terminates every subscriber with
//! a cancellation.

use super::{Advance, Sequence};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

pub(crate) fn publish<S: Sequence>(upstream: S) -> (Publisher<S::Item>, Driver<S>) {
    let hub = Arc::new(Hub {
        registry: Mutex::new(Registry {
            slots: Vec::new(),
            free: Vec::new(),
            terminal: None,
        }),
    });
    (
        Publisher {
            hub: Arc::clone(&hub),
        },
        Driver {
            upstream,
            hub,
            phase: Phase::Pull,
            outcome: None,
        },
    )
}

#[derive(Debug, Clone)]
enum Terminal {
    Closed,
    Failed(Error),
}

#[derive(Debug)]
struct SubInner<T> {
    queue: VecDeque<T>,
    terminal: Option<Terminal>,
    waker: Option<Waker>,
}

#[derive(Debug)]
struct Registry<T> {
    slots: Vec<Option<Arc<Mutex<SubInner<T>>>>>,
    free: Vec<usize>,
    // set once by the driver; late subscribers observe it immediately
    terminal: Option<Terminal>,
}

#[derive(Debug)]
struct Hub<T> {
    registry: Mutex<Registry<T>>,
}

impl<T: Clone> Hub<T> {
    fn broadcast(&self, item: &T) {
        let registry = self.registry.lock();
        for slot in registry.slots.iter().flatten() {
            let mut inner = slot.lock();
            inner.queue.push_back(item.clone());
            if let Some(waker) = inner.waker.take() {
                waker.wake();
            }
        }
    }
}

impl<T> Hub<T> {
    fn terminate(&self, terminal: &Terminal) {
        let mut registry = self.registry.lock();
        if registry.terminal.is_some() {
            return;
        }
        registry.terminal = Some(terminal.clone());
        for slot in registry.slots.iter().flatten() {
            let mut inner = slot.lock();
            inner.terminal = Some(terminal.clone());
            if let Some(waker) = inner.waker.take() {
                waker.wake();
            }
        }
    }

    fn deregister(&self, key: usize) {
        let mut registry = self.registry.lock();
        if let Some(slot) = registry.slots.get_mut(key) {
            if slot.take().is_some() {
                registry.free.push(key);
            }
        }
    }
}

/// A cloneable handle for attaching subscribers to a published sequence.
#[derive(Debug)]
pub struct Publisher<T> {
    hub: Arc<Hub<T>>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
        }
    }
}

impl<T> Publisher<T> {
    /// Registers a new subscriber.
    ///
    /// The subscription yields every element broadcast from this point on.
    /// If the driver already terminated, the subscription starts in the
    /// matching terminal state.
    pub fn subscribe(&self) -> Subscription<T> {
        let mut registry = self.hub.registry.lock();
        let inner = Arc::new(Mutex::new(SubInner {
            queue: VecDeque::new(),
            terminal: registry.terminal.clone(),
            waker: None,
        }));
        let key = if let Some(key) = registry.free.pop() {
            registry.slots[key] = Some(Arc::clone(&inner));
            key
        } else {
            registry.slots.push(Some(Arc::clone(&inner)));
            registry.slots.len() - 1
        };
        tracing::trace!(key, "subscriber registered");
        Subscription {
            hub: Arc::clone(&self.hub),
            inner,
            key,
            done: false,
            disposed: false,
        }
    }
}

/// A single subscriber's cursor over the broadcast, itself a [`Sequence`].
///
/// Disposal deregisters the subscriber; elements broadcast afterwards are
/// never cloned for it.
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct Subscription<T> {
    hub: Arc<Hub<T>>,
    inner: Arc<Mutex<SubInner<T>>>,
    key: usize,
    done: bool,
    disposed: bool,
}

impl<T> Sequence for Subscription<T> {
    type Item = T;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<T>> {
        if self.done {
            return Poll::Ready(Ok(None));
        }
        let mut inner = self.inner.lock();
        if let Some(item) = inner.queue.pop_front() {
            return Poll::Ready(Ok(Some(item)));
        }
        match inner.terminal.take() {
            Some(Terminal::Closed) => {
                drop(inner);
                self.done = true;
                Poll::Ready(Ok(None))
            }
            Some(Terminal::Failed(error)) => {
                drop(inner);
                self.done = true;
                Poll::Ready(Err(error))
            }
            None => {
                inner.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }

    fn poll_dispose(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        if self.disposed {
            return Poll::Ready(Ok(()));
        }
        self.disposed = true;
        self.done = true;
        self.hub.deregister(self.key);
        let mut inner = self.inner.lock();
        inner.queue.clear();
        inner.waker = None;
        Poll::Ready(Ok(()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let inner = self.inner.lock();
        let queued = inner.queue.len();
        match inner.terminal {
            Some(_) => (queued, Some(queued)),
            None => (queued, None),
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if !self.disposed {
            self.hub.deregister(self.key);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pull,
    Dispose,
    Done,
}

/// The background consumption loop of a published sequence.
///
/// Pulls upstream and broadcasts each element. Resolves when upstream ends
/// or fails; upstream is disposed on every exit path, including drop before
/// completion (which cancels all subscribers).
#[must_use = "futures do nothing unless awaited"]
#[derive(Debug)]
pub struct Driver<S: Sequence> {
    upstream: S,
    hub: Arc<Hub<S::Item>>,
    phase: Phase,
    outcome: Option<Result<()>>,
}

impl<S> Future for Driver<S>
where
    S: Sequence + Unpin,
    S::Item: Clone + Unpin,
{
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        loop {
            match this.phase {
                Phase::Pull => match Pin::new(&mut this.upstream).poll_advance(cx) {
                    Poll::Ready(Ok(Some(item))) => this.hub.broadcast(&item),
                    Poll::Ready(Ok(None)) => {
                        tracing::trace!("publish driver finished, closing subscribers");
                        this.hub.terminate(&Terminal::Closed);
                        this.outcome = Some(Ok(()));
                        this.phase = Phase::Dispose;
                    }
                    Poll::Ready(Err(e)) => {
                        this.hub.terminate(&Terminal::Failed(e.clone()));
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
                                "disposal failed after an earlier broadcast error"
                            );
                            Err(e)
                        }
                    });
                }
                Phase::Done => panic!("publish driver polled after completion"),
            }
        }
    }
}

impl<S: Sequence> Drop for Driver<S> {
    fn drop(&mut self) {
        if self.phase != Phase::Done {
            tracing::trace!("publish driver dropped, cancelling subscribers");
            self.hub.terminate(&Terminal::Failed(Error::Canceled));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::seq::SequenceExt;
    use crate::source;
    use crate::test_utils::{block_on, init_test, DisposeProbe};

    #[test]
    fn all_subscribers_see_every_element() {
        init_test("all_subscribers_see_every_element");
        let (publisher, driver) = source::iter(vec![1, 2, 3]).publish();
        let a = publisher.subscribe();
        let b = publisher.subscribe();
        block_on(driver).expect("driver");
        let out_a = block_on(a.to_vec()).expect("drain a");
        let out_b = block_on(b.to_vec()).expect("drain b");
        crate::assert_with_log!(out_a == vec![1, 2, 3], "a", vec![1, 2, 3], out_a);
        crate::assert_with_log!(out_b == vec![1, 2, 3], "b", vec![1, 2, 3], out_b);
        crate::test_complete!("all_subscribers_see_every_element");
    }

    #[test]
    fn late_subscriber_sees_only_terminal() {
        init_test("late_subscriber_sees_only_terminal");
        let (publisher, driver) = source::iter(vec![1, 2]).publish();
        block_on(driver).expect("driver");
        let late = publisher.subscribe();
        let out = block_on(late.to_vec()).expect("drain");
        assert!(out.is_empty());
        crate::test_complete!("late_subscriber_sees_only_terminal");
    }

    #[test]
    fn upstream_error_reaches_every_subscriber() {
        init_test("upstream_error_reaches_every_subscriber");
        let (publisher, driver) = source::iter(vec![1])
            .chain(source::fault(Error::msg("boom")))
            .publish();
        let mut sub = publisher.subscribe();
        let driver_err = block_on(driver).expect_err("driver error");
        assert_eq!(driver_err.to_string(), "boom");
        let first = block_on(sub.next()).expect("advance");
        assert_eq!(first, Some(1));
        let err = block_on(sub.next()).expect_err("broadcast error");
        assert_eq!(err.to_string(), "boom");
        // error delivered once, then terminal
        let end = block_on(sub.next()).expect("advance");
        assert!(end.is_none());
        crate::test_complete!("upstream_error_reaches_every_subscriber");
    }

    #[test]
    fn dropping_the_driver_cancels_subscribers() {
        init_test("dropping_the_driver_cancels_subscribers");
        let (publisher, driver) = source::iter(vec![1, 2, 3]).publish();
        let mut sub = publisher.subscribe();
        drop(driver);
        let err = block_on(sub.next()).expect_err("canceled");
        assert!(err.is_canceled());
        crate::test_complete!("dropping_the_driver_cancels_subscribers");
    }

    #[test]
    fn disposed_subscriber_is_deregistered() {
        init_test("disposed_subscriber_is_deregistered");
        let (publisher, driver) = source::iter(vec![1, 2, 3]).publish();
        let mut early = publisher.subscribe();
        block_on(early.dispose()).expect("dispose");
        let survivor = publisher.subscribe();
        block_on(driver).expect("driver");
        let out = block_on(survivor.to_vec()).expect("drain");
        crate::assert_with_log!(out == vec![1, 2, 3], "survivor", vec![1, 2, 3], out);
        crate::test_complete!("disposed_subscriber_is_deregistered");
    }

    #[test]
    fn driver_disposes_upstream() {
        init_test("driver_disposes_upstream");
        let (probe, counters) = DisposeProbe::new(vec![1, 2]);
        let (publisher, driver) = probe.publish();
        let _sub = publisher.subscribe();
        block_on(driver).expect("driver");
        crate::assert_with_log!(
            counters.disposes() == 1,
            "upstream disposed",
            1,
            counters.disposes()
        );
        crate::test_complete!("driver_disposes_upstream");
    }
}
