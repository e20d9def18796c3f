//! Pullseq: pull-based asynchronous sequences with composable lazy operators.
//!
//! # Overview
//!
//! A sequence here is the async analogue of an [`Iterator`]: a cursor that is
//! *pulled* one element at a time and may suspend between pulls. Every stage
//! of a pipeline is a hand-written poll-driven state machine; there is no
//! executor dependency and no `async fn` in the core machinery, so the crate
//! can be driven by any runtime (or by hand in tests).
//!
//! # Core Guarantees
//!
//! - **Strictly serialized pulls**: at most one in-flight advance per cursor,
//!   enforced by `&mut self`
//! - **Idempotent termination**: once a cursor reports exhaustion, every
//!   later advance also reports exhaustion
//! - **Disposal exactly once**: disposing the terminal cursor cascades to
//!   every intermediate and leaf cursor, on every exit path (completion,
//!   error, cancellation)
//! - **Flat resumption**: long runs of synchronously-ready pulls loop in
//!   place; the call stack never grows with the element count
//! - **Cooperative cancellation**: tokens are observed, never owned; dual
//!   token races resolve first-wins atomically
//!
//! # Module Structure
//!
//! - [`seq`]: The [`Sequence`] trait, combinators, and terminal drains
//! - [`source`]: Leaf sources (collections, ranges, single values, never)
//! - [`cancel`]: Cancellation sources, tokens, and registrations
//! - [`observe`]: Push-style observer bridges in both directions
//! - [`handoff`]: The unbounded producer/consumer hand-off queue
//! - [`unobserved`]: Process-wide sink for errors nobody handled
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```ignore
//! use pullseq::seq::SequenceExt;
//! use pullseq::source;
//!
//! async fn example() -> pullseq::Result<()> {
//!     let windows = source::iter(1..=5)
//!         .filter(|x| x % 2 == 1)
//!         .buffer(2)
//!         .to_vec()
//!         .await?;
//!     assert_eq!(windows, vec![vec![1, 3], vec![5]]);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod cancel;
pub mod error;
pub mod handoff;
pub mod observe;
pub mod seq;
pub mod source;
pub mod unobserved;

#[doc(hidden)]
pub mod test_utils;

pub use cancel::{CancelSource, CancelToken, Registration};
pub use error::{Error, Result};
pub use seq::{Advance, Sequence, SequenceExt};
