use std::fmt;

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use tidelog_types::{BucketName, LogEntry, Sequence, Watermark};

/// Unique identifier for a subscription (UUID v7, so ids sort by creation).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub:{}", self.0.simple())
    }
}

/// One item delivered on a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The next entry of the log, in sequence order.
    Entry(LogEntry),
    /// Every entry up to `watermark` (the log's watermark when the
    /// subscription was registered) has been delivered. Sent exactly once,
    /// after the historical entries and before any live ones.
    CaughtUp { watermark: Watermark },
}

type ReleaseFn = Box<dyn FnOnce(SubscriptionId) + Send>;

/// A live subscription to one bucket's log.
///
/// The handle owns the backend-side registration. It is released either
/// explicitly through [`LogStream::unsubscribe`](crate::LogStream::unsubscribe)
/// or implicitly when the handle is dropped, so a cancelled or failed consumer
/// never leaves an orphaned registration behind.
pub struct Subscription {
    id: SubscriptionId,
    bucket: BucketName,
    from: Sequence,
    receiver: mpsc::UnboundedReceiver<Delivery>,
    release: Option<ReleaseFn>,
}

impl Subscription {
    /// Wrap a delivery channel. `release` runs exactly once, on explicit
    /// release or on drop, whichever comes first.
    pub fn new(
        id: SubscriptionId,
        bucket: BucketName,
        from: Sequence,
        receiver: mpsc::UnboundedReceiver<Delivery>,
        release: impl FnOnce(SubscriptionId) + Send + 'static,
    ) -> Self {
        Self {
            id,
            bucket,
            from,
            receiver,
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn bucket(&self) -> &BucketName {
        &self.bucket
    }

    /// First sequence this subscription was asked to deliver.
    pub fn start(&self) -> Sequence {
        self.from
    }

    /// Wait for the next delivery. `None` means the stream closed the
    /// subscription; no further entries will arrive.
    pub async fn next(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    /// Returns `true` once the backend registration has been released.
    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }

    /// Release the backend registration. Idempotent.
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            self.receiver.close();
            release(self.id);
            debug!(id = %self.id, bucket = %self.bucket, "subscription released");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("bucket", &self.bucket)
            .field("from", &self.from)
            .field("released", &self.is_released())
            .finish()
    }
}
