use tidelog_stream::StreamError;
use tidelog_types::{BucketName, Sequence, Watermark};

use crate::session::SessionState;

/// Errors produced by enumeration sessions.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The log stream failed while capturing the watermark, subscribing,
    /// or releasing the subscription.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// The caller's deadline elapsed before the session finished.
    #[error("listing {bucket} timed out while {state}: applied {highest_applied} of {watermark:?}")]
    Timeout {
        bucket: BucketName,
        state: SessionState,
        watermark: Option<Watermark>,
        highest_applied: Sequence,
    },

    /// The stream closed the subscription before replay reached the watermark.
    #[error("subscription to {bucket} closed after {highest_applied}, before reaching {watermark}")]
    SubscriptionClosed {
        bucket: BucketName,
        watermark: Watermark,
        highest_applied: Sequence,
    },

    /// An entry arrived that does not directly follow the last applied one.
    #[error("sequence gap in {bucket}: expected {expected}, received {received}")]
    SequenceGap {
        bucket: BucketName,
        expected: Sequence,
        received: Sequence,
    },

    /// The stream declared its history exhausted while entries below the
    /// watermark were still missing.
    #[error("stream reported {bucket} caught up at {reported} but {remaining} entries below {watermark} were never delivered")]
    PrematureCatchUp {
        bucket: BucketName,
        reported: Watermark,
        watermark: Watermark,
        remaining: u64,
    },

    /// `run` was called on a session that had already started.
    #[error("session for {bucket} already started (state: {state})")]
    AlreadyStarted {
        bucket: BucketName,
        state: SessionState,
    },
}

impl WatchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Failures of the log stream or of its delivery contract.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Stream(_)
                | Self::SubscriptionClosed { .. }
                | Self::SequenceGap { .. }
                | Self::PrematureCatchUp { .. }
        )
    }
}

/// Result alias for watch operations.
pub type WatchResult<T> = Result<T, WatchError>;
