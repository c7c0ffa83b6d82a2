use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of an entry within a single bucket's log.
///
/// Sequences start at 1 and increase by exactly one per appended entry, so a
/// bucket's log never has gaps. [`Sequence::ZERO`] means "nothing applied".
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sequence(u64);

impl Sequence {
    /// The position before the first entry.
    pub const ZERO: Self = Self(0);

    /// The sequence of the first entry in any log.
    pub const FIRST: Self = Self(1);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The sequence that the next appended entry will receive.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for Sequence {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Highest sequence present in a log at the moment it was observed.
///
/// A watermark of zero means the log held no entries at all. Watermarks count
/// every entry, tombstones included, so a bucket whose objects were all
/// deleted still has a non-zero watermark.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Watermark(u64);

impl Watermark {
    /// Watermark of a log with no entries.
    pub const EMPTY: Self = Self(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The watermark whose last entry is `sequence`.
    pub const fn at(sequence: Sequence) -> Self {
        Self(sequence.get())
    }

    /// Last sequence covered by this watermark.
    pub const fn as_sequence(self) -> Sequence {
        Sequence::new(self.0)
    }

    /// Returns `true` once every entry up to this watermark has been applied.
    pub const fn is_reached_by(self, highest_applied: Sequence) -> bool {
        highest_applied.get() >= self.0
    }

    /// Entries still outstanding when `highest_applied` has been applied.
    pub const fn remaining_after(self, highest_applied: Sequence) -> u64 {
        self.0.saturating_sub(highest_applied.get())
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wm:{}", self.0)
    }
}
