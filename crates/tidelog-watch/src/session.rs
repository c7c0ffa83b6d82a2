use std::fmt;

use serde::Serialize;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use tidelog_stream::{Delivery, LogStream, Subscription};
use tidelog_types::{BucketName, ObjectRecord, Sequence, Watermark};

use crate::detector::{CompletionDetector, Progress};
use crate::error::{WatchError, WatchResult};
use crate::index::ObjectIndex;

/// Lifecycle of an [`EnumerationSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum SessionState {
    Created,
    /// Capturing the watermark and establishing the subscription.
    Subscribing,
    /// Applying delivered entries until the watermark is reached.
    Replaying,
    /// Materializing the index and releasing the subscription.
    Completing,
    Done,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Subscribing => "subscribing",
            Self::Replaying => "replaying",
            Self::Completing => "completing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Complete listing of a bucket as of the captured watermark.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub bucket: BucketName,
    pub watermark: Watermark,
    /// Live records, ordered by key.
    pub records: Vec<ObjectRecord>,
}

impl Listing {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.key.as_str())
    }
}

/// One run of the listing protocol against a single bucket.
///
/// The session captures the bucket's watermark, subscribes from the first
/// sequence, applies deliveries to a private [`ObjectIndex`] and finishes as
/// soon as the [`CompletionDetector`] reports the watermark reached. An empty
/// log finishes right after subscribing, without waiting for a delivery.
///
/// The subscription is owned by the running future: it is released on
/// success, on failure, and when the future is dropped mid-flight.
pub struct EnumerationSession<'a, S: LogStream + ?Sized> {
    stream: &'a S,
    bucket: BucketName,
    state: SessionState,
    index: ObjectIndex,
    detector: Option<CompletionDetector>,
}

impl<'a, S: LogStream + ?Sized> EnumerationSession<'a, S> {
    pub fn new(stream: &'a S, bucket: BucketName) -> Self {
        Self {
            stream,
            bucket,
            state: SessionState::Created,
            index: ObjectIndex::new(),
            detector: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn bucket(&self) -> &BucketName {
        &self.bucket
    }

    /// Watermark captured for this session, once it has been.
    pub fn watermark(&self) -> Option<Watermark> {
        self.detector.map(|d| d.watermark())
    }

    pub fn highest_applied(&self) -> Sequence {
        self.detector
            .map(|d| d.highest_applied())
            .unwrap_or(Sequence::ZERO)
    }

    pub fn index(&self) -> &ObjectIndex {
        &self.index
    }

    /// Run the session to completion or failure, bounded by `deadline`.
    pub async fn run(&mut self, deadline: Instant) -> WatchResult<Listing> {
        if self.state != SessionState::Created {
            return Err(WatchError::AlreadyStarted {
                bucket: self.bucket.clone(),
                state: self.state,
            });
        }

        let result = self.drive(deadline).await;
        match &result {
            Ok(listing) => {
                info!(
                    bucket = %self.bucket,
                    watermark = %listing.watermark,
                    objects = listing.len(),
                    "listing complete"
                );
            }
            Err(error) => {
                self.transition(SessionState::Failed);
                warn!(bucket = %self.bucket, %error, "listing failed");
            }
        }
        result
    }

    async fn drive(&mut self, deadline: Instant) -> WatchResult<Listing> {
        let stream = self.stream;

        self.transition(SessionState::Subscribing);
        let watermark = match timeout_at(deadline, stream.current_watermark(&self.bucket)).await {
            Ok(watermark) => watermark?,
            Err(_) => return Err(self.timeout_error()),
        };
        let mut detector = CompletionDetector::new(watermark);
        self.detector = Some(detector);

        let mut subscription =
            match timeout_at(deadline, stream.subscribe(&self.bucket, Sequence::FIRST)).await {
                Ok(subscription) => subscription?,
                Err(_) => return Err(self.timeout_error()),
            };

        self.transition(SessionState::Replaying);
        // An already-satisfied watermark completes here, before any delivery.
        let mut progress = detector.check();
        self.detector = Some(detector);

        while !progress.is_complete() {
            progress = self
                .replay_next(&mut subscription, &mut detector, deadline)
                .await?;
            self.detector = Some(detector);
        }

        self.transition(SessionState::Completing);
        let records = self.index.materialize();
        match timeout_at(deadline, stream.unsubscribe(subscription)).await {
            Ok(released) => released?,
            Err(_) => return Err(self.timeout_error()),
        }

        self.transition(SessionState::Done);
        Ok(Listing {
            bucket: self.bucket.clone(),
            watermark,
            records,
        })
    }

    /// Wait for one delivery and apply it.
    async fn replay_next(
        &mut self,
        subscription: &mut Subscription,
        detector: &mut CompletionDetector,
        deadline: Instant,
    ) -> WatchResult<Progress> {
        let delivery = match timeout_at(deadline, subscription.next()).await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                return Err(WatchError::SubscriptionClosed {
                    bucket: self.bucket.clone(),
                    watermark: detector.watermark(),
                    highest_applied: detector.highest_applied(),
                })
            }
            Err(_) => return Err(self.timeout_error()),
        };

        match delivery {
            Delivery::Entry(entry) => {
                let expected = detector.highest_applied().next();
                if entry.sequence < expected {
                    debug!(bucket = %self.bucket, seq = %entry.sequence, "skipping redelivered entry");
                    return Ok(detector.check());
                }
                if entry.sequence > expected {
                    return Err(WatchError::SequenceGap {
                        bucket: self.bucket.clone(),
                        expected,
                        received: entry.sequence,
                    });
                }
                self.index.apply(&entry);
                let progress = detector.observe(entry.sequence);
                debug!(
                    bucket = %self.bucket,
                    seq = %entry.sequence,
                    kind = %entry.kind(),
                    ?progress,
                    "entry replayed"
                );
                Ok(progress)
            }
            Delivery::CaughtUp { watermark: reported } => {
                // History is exhausted; reaching this while pending means
                // entries below the watermark will never arrive.
                let progress = detector.check();
                match progress {
                    Progress::Pending { remaining } => Err(WatchError::PrematureCatchUp {
                        bucket: self.bucket.clone(),
                        reported,
                        watermark: detector.watermark(),
                        remaining,
                    }),
                    _ => Ok(progress),
                }
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(bucket = %self.bucket, from = %self.state, to = %next, "session transition");
        self.state = next;
    }

    fn timeout_error(&self) -> WatchError {
        WatchError::Timeout {
            bucket: self.bucket.clone(),
            state: self.state,
            watermark: self.watermark(),
            highest_applied: self.highest_applied(),
        }
    }
}
