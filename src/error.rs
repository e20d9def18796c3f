//! Error types for pull-sequence pipelines.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Upstream failures propagate through wrapping operators with their
//!   payload untouched; every operator still disposes its own resources on
//!   the failure path
//! - Cancellation is a distinct signal, not a generic failure: sinks and
//!   default handlers swallow it
//! - Cardinality failures (`NoElements`, `MoreThanOne`) are their own
//!   variants so callers can tell them apart from upstream errors
//! - Counters fault on overflow rather than silently wrapping

use std::sync::Arc;

/// A specialized `Result` for sequence operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type surfaced by sequence advances and terminal drains.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The operation observed a cancellation request.
    #[error("operation canceled")]
    Canceled,

    /// A cardinality-sensitive terminal (`first`, `last`, `single`) ran on an
    /// empty sequence.
    #[error("sequence contains no elements")]
    NoElements,

    /// `single` found a second element.
    #[error("sequence contains more than one element")]
    MoreThanOne,

    /// A counter or index overflowed.
    #[error("arithmetic overflow while counting sequence elements")]
    Overflow,

    /// A hand-off queue or broadcast registry was closed while still in use.
    #[error("sequence channel closed")]
    Closed,

    /// An error produced by user code (a callback, an awaited selector, or a
    /// leaf `fault` source), forwarded untouched.
    #[error(transparent)]
    Other(Arc<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Wraps an arbitrary error as a sequence error.
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Arc::new(err))
    }

    /// Wraps a plain message as a sequence error.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Other(Arc::new(Message(message.into())))
    }

    /// Returns true if this error is a cancellation signal.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// A stringly error payload for [`Error::msg`].
#[derive(Debug)]
struct Message(String);

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(Error::Canceled.to_string(), "operation canceled");
        assert_eq!(
            Error::NoElements.to_string(),
            "sequence contains no elements"
        );
        assert_eq!(
            Error::MoreThanOne.to_string(),
            "sequence contains more than one element"
        );
        assert_eq!(Error::msg("boom").to_string(), "boom");
    }

    #[test]
    fn canceled_classification() {
        assert!(Error::Canceled.is_canceled());
        assert!(!Error::NoElements.is_canceled());
        assert!(!Error::msg("x").is_canceled());
    }

    #[test]
    fn other_preserves_payload() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err = Error::other(io);
        assert_eq!(err.to_string(), "pipe");
        assert!(matches!(err, Error::Other(_)));
    }
}
