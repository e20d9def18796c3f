//! Unbounded producer/consumer hand-off queue.
//!
//! The queue decouples a producing loop from a pulling consumer: the
//! producer pushes without waiting, the consumer parks when the queue is
//! empty and is woken on push or termination. The element path is the
//! lock-free [`SegQueue`]; only the waker and terminal state sit behind a
//! mutex.
//!
//! Termination is one-shot: the producer closes (normal end) or fails
//! (error), the consumer closes by disposing. After a close from either
//! side, producer pushes are rejected with [`Error::Closed`].

use crate::error::{Error, Result};
use crate::seq::{Advance, Sequence};
use crossbeam_queue::SegQueue;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

#[derive(Debug)]
enum Terminal {
    Open,
    Closed,
    Failed(Error),
}

#[derive(Debug)]
struct Shared<T> {
    queue: SegQueue<T>,
    terminal: Mutex<Terminal>,
    consumer_waker: Mutex<Option<Waker>>,
    consumer_gone: AtomicBool,
}

impl<T> Shared<T> {
    fn wake_consumer(&self) {
        if let Some(waker) = self.consumer_waker.lock().take() {
            waker.wake();
        }
    }
}

/// Creates a connected producer/consumer pair.
#[must_use]
pub fn handoff<T>() -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        queue: SegQueue::new(),
        terminal: Mutex::new(Terminal::Open),
        consumer_waker: Mutex::new(None),
        consumer_gone: AtomicBool::new(false),
    });
    (
        Sender {
            shared: Arc::clone(&shared),
        },
        Receiver {
            shared,
            done: false,
            disposed: false,
        },
    )
}

/// The producing half of a hand-off queue.
#[derive(Debug)]
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Sender<T> {
    /// Enqueues an element, or reports [`Error::Closed`] once the queue is
    /// terminated or the consumer is gone.
    pub fn push(&self, item: T) -> Result<()> {
        if self.shared.consumer_gone.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        {
            let terminal = self.shared.terminal.lock();
            if !matches!(*terminal, Terminal::Open) {
                return Err(Error::Closed);
            }
            self.shared.queue.push(item);
        }
        self.shared.wake_consumer();
        Ok(())
    }

    /// Marks normal completion. Already-queued elements still drain.
    pub fn close(&self) {
        let mut terminal = self.shared.terminal.lock();
        if matches!(*terminal, Terminal::Open) {
            *terminal = Terminal::Closed;
        }
        drop(terminal);
        self.shared.wake_consumer();
    }

    /// Marks failure. Already-queued elements still drain, then the error
    /// surfaces once.
    pub fn fail(&self, error: Error) {
        let mut terminal = self.shared.terminal.lock();
        if matches!(*terminal, Terminal::Open) {
            *terminal = Terminal::Failed(error);
        }
        drop(terminal);
        self.shared.wake_consumer();
    }

    /// Returns true once the consumer has been disposed.
    #[must_use]
    pub fn is_consumer_gone(&self) -> bool {
        self.shared.consumer_gone.load(Ordering::SeqCst)
    }
}

/// The consuming half of a hand-off queue; a leaf [`Sequence`].
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
    done: bool,
    disposed: bool,
}

impl<T> Sequence for Receiver<T> {
    type Item = T;

    fn poll_advance(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Advance<T>> {
        if self.done {
            return Poll::Ready(Ok(None));
        }

        if let Some(item) = self.shared.queue.pop() {
            return Poll::Ready(Ok(Some(item)));
        }

        // Park before the terminal re-check so a push between the failed pop
        // and the park cannot be lost.
        *self.shared.consumer_waker.lock() = Some(cx.waker().clone());

        if let Some(item) = self.shared.queue.pop() {
            return Poll::Ready(Ok(Some(item)));
        }

        let outcome = {
            let mut terminal = self.shared.terminal.lock();
            match &*terminal {
                Terminal::Open => None,
                Terminal::Closed => Some(Ok(None)),
                Terminal::Failed(_) => {
                    let Terminal::Failed(error) =
                        std::mem::replace(&mut *terminal, Terminal::Closed)
                    else {
                        return Poll::Pending;
                    };
                    Some(Err(error))
                }
            }
        };
        match outcome {
            Some(result) => {
                self.done = true;
                Poll::Ready(result)
            }
            None => Poll::Pending,
        }
    }

    fn poll_dispose(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        if self.disposed {
            return Poll::Ready(Ok(()));
        }
        self.disposed = true;
        self.done = true;
        self.shared.consumer_gone.store(true, Ordering::SeqCst);
        // drop anything still queued
        while self.shared.queue.pop().is_some() {}
        Poll::Ready(Ok(()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        (self.shared.queue.len(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::SequenceExt;
    use crate::test_utils::{block_on, init_test, noop_waker};

    #[test]
    fn push_then_pull() {
        init_test("push_then_pull");
        let (tx, mut rx) = handoff();
        tx.push(1).expect("push");
        tx.push(2).expect("push");
        tx.close();
        let first = block_on(rx.next()).expect("advance");
        assert_eq!(first, Some(1));
        let second = block_on(rx.next()).expect("advance");
        assert_eq!(second, Some(2));
        let end = block_on(rx.next()).expect("advance");
        assert!(end.is_none());
        // idempotent terminal
        let end = block_on(rx.next()).expect("advance");
        assert!(end.is_none());
        crate::test_complete!("push_then_pull");
    }

    #[test]
    fn empty_open_queue_parks() {
        init_test("empty_open_queue_parks");
        let (_tx, mut rx) = handoff::<i32>();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let poll = Pin::new(&mut rx).poll_advance(&mut cx);
        assert!(poll.is_pending());
        crate::test_complete!("empty_open_queue_parks");
    }

    #[test]
    fn failure_surfaces_after_queued_elements() {
        init_test("failure_surfaces_after_queued_elements");
        let (tx, mut rx) = handoff();
        tx.push(1).expect("push");
        tx.fail(Error::msg("broke"));
        let first = block_on(rx.next()).expect("advance");
        assert_eq!(first, Some(1));
        let err = block_on(rx.next()).expect_err("failure");
        assert_eq!(err.to_string(), "broke");
        // error delivered once, then terminal
        let end = block_on(rx.next()).expect("advance");
        assert!(end.is_none());
        crate::test_complete!("failure_surfaces_after_queued_elements");
    }

    #[test]
    fn consumer_disposal_rejects_pushes() {
        init_test("consumer_disposal_rejects_pushes");
        let (tx, mut rx) = handoff();
        tx.push(1).expect("push");
        block_on(rx.dispose()).expect("dispose");
        assert!(tx.is_consumer_gone());
        let err = tx.push(2).expect_err("closed");
        assert!(matches!(err, Error::Closed));
        crate::test_complete!("consumer_disposal_rejects_pushes");
    }

    #[test]
    fn cross_thread_push_wakes_consumer() {
        init_test("cross_thread_push_wakes_consumer");
        let (tx, mut rx) = handoff();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            tx.push(42).expect("push");
            tx.close();
        });
        let out = block_on(rx.to_vec()).expect("drain");
        assert_eq!(out, vec![42]);
        writer.join().expect("writer thread");
        crate::test_complete!("cross_thread_push_wakes_consumer");
    }
}
