//! Test utilities.
//!
//! Shared helpers for unit and integration tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - A minimal single-future executor and wakers
//! - An instrumented leaf sequence for pull/disposal accounting
//!
//! # Example
//! ```
//! use pullseq::test_utils::{block_on, init_test};
//! use pullseq::{source, SequenceExt};
//!
//! init_test("doubles");
//! let out = block_on(source::range(0, 3).map(|x| x * 2).to_vec()).unwrap();
//! assert_eq!(out, vec![0, 2, 4]);
//! ```

use crate::seq::{Advance, Sequence};
use crate::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::task::{Context, Poll, Wake, Waker};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Initialize logging and announce the test phase in one call.
pub fn init_test(name: &str) {
    init_test_logging();
    crate::test_phase!(name);
}

struct NoopWake;

impl Wake for NoopWake {
    fn wake(self: Arc<Self>) {}
}

/// A waker that does nothing when woken.
///
/// Useful for driving sequences by hand in tests.
#[must_use]
pub fn noop_waker() -> Waker {
    Waker::from(Arc::new(NoopWake))
}

struct ThreadWake {
    thread: std::thread::Thread,
}

impl Wake for ThreadWake {
    fn wake(self: Arc<Self>) {
        self.thread.unpark();
    }
}

/// Drive a single future to completion on the current thread.
///
/// Parks between polls, so wakes from other threads (cancellation
/// callbacks, queue writers) are honored.
pub fn block_on<F: Future>(future: F) -> F::Output {
    let mut future = std::pin::pin!(future);
    let waker = Waker::from(Arc::new(ThreadWake {
        thread: std::thread::current(),
    }));
    let mut cx = Context::from_waker(&waker);
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(output) => return output,
            Poll::Pending => std::thread::park(),
        }
    }
}

#[derive(Debug, Default)]
struct ProbeState {
    advances: AtomicUsize,
    disposes: AtomicUsize,
}

/// Shared counters for a [`DisposeProbe`].
///
/// Remains readable after the probe itself has been moved into a
/// pipeline and consumed.
#[derive(Debug, Clone)]
pub struct ProbeCounters(Arc<ProbeState>);

impl ProbeCounters {
    /// Number of upstream advances the probe has served.
    #[must_use]
    pub fn advances(&self) -> usize {
        self.0.advances.load(Ordering::SeqCst)
    }

    /// Number of times the probe has been disposed.
    #[must_use]
    pub fn disposes(&self) -> usize {
        self.0.disposes.load(Ordering::SeqCst)
    }
}

/// A leaf sequence that counts advances and disposals.
#[derive(Debug)]
#[must_use = "sequences do nothing unless polled"]
pub struct DisposeProbe<T> {
    items: std::vec::IntoIter<T>,
    state: Arc<ProbeState>,
    disposed: bool,
}

impl<T> DisposeProbe<T> {
    /// Wraps `items` in a probe, returning the probe and its counters.
    pub fn new(items: Vec<T>) -> (Self, ProbeCounters) {
        let state = Arc::new(ProbeState::default());
        let probe = Self {
            items: items.into_iter(),
            state: Arc::clone(&state),
            disposed: false,
        };
        (probe, ProbeCounters(state))
    }
}

impl<T: Unpin> Sequence for DisposeProbe<T> {
    type Item = T;

    fn poll_advance(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Advance<T>> {
        if self.disposed {
            return Poll::Ready(Ok(None));
        }
        self.state.advances.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(Ok(self.items.next()))
    }

    fn poll_dispose(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        if !self.disposed {
            self.disposed = true;
            self.state.disposes.fetch_add(1, Ordering::SeqCst);
        }
        Poll::Ready(Ok(()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.disposed {
            (0, Some(0))
        } else {
            self.items.size_hint()
        }
    }
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
