//! Watch-based listing for Tidelog.
//!
//! Listing a bucket means replaying its log from the first entry and stopping
//! once everything that existed when the listing started has been applied.
//! This crate provides:
//! - [`ObjectIndex`] -- per-key state rebuilt from put and delete entries
//! - [`CompletionDetector`] -- decides when replay has caught up with the
//!   watermark captured at the start, independently of how many objects
//!   are live
//! - [`EnumerationSession`] -- subscribe, replay, detect completion,
//!   materialize, release; bounded by a caller deadline

pub mod detector;
pub mod error;
pub mod index;
pub mod session;

pub use detector::{caught_up, CompletionDetector, Progress};
pub use error::{WatchError, WatchResult};
pub use index::ObjectIndex;
pub use session::{EnumerationSession, Listing, SessionState};
