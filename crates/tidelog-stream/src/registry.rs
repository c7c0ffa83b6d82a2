use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::debug;

use tidelog_types::{BucketName, EntryOp, LogEntry, ObjectKey, Sequence, Watermark};

use crate::error::{StreamError, StreamResult};
use crate::subscription::{Delivery, Subscription, SubscriptionId};

/// Internal subscriber: a start position paired with a delivery channel.
struct Subscriber {
    id: SubscriptionId,
    from: Sequence,
    sender: mpsc::UnboundedSender<Delivery>,
}

/// One bucket's entries plus the subscribers tailing it.
#[derive(Default)]
struct BucketLog {
    entries: Vec<LogEntry>,
    subscribers: Vec<Subscriber>,
}

impl BucketLog {
    fn watermark(&self) -> Watermark {
        Watermark::new(self.entries.len() as u64)
    }

    /// Deliver a freshly appended entry to every interested subscriber.
    /// Subscribers whose receivers are gone are pruned.
    fn route(&mut self, entry: &LogEntry) {
        self.subscribers.retain(|sub| {
            if entry.sequence >= sub.from {
                sub.sender.send(Delivery::Entry(entry.clone())).is_ok()
            } else {
                !sub.sender.is_closed()
            }
        });
    }
}

#[derive(Default)]
struct State {
    buckets: HashMap<BucketName, BucketLog>,
    shut_down: bool,
}

/// Shared per-bucket logs and subscriber fan-out used by every backend.
///
/// All mutation of a bucket happens under one write lock, so sequence
/// assignment, persistence, storage and routing of an entry are atomic with
/// respect to subscription registration.
#[derive(Default)]
pub(crate) struct Registry {
    state: RwLock<State>,
}

impl Registry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Append an entry, calling `persist` before it becomes visible.
    ///
    /// If `persist` fails nothing is stored and no sequence is consumed.
    pub(crate) fn append_with<F>(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        op: EntryOp,
        persist: F,
    ) -> StreamResult<LogEntry>
    where
        F: FnOnce(&LogEntry) -> StreamResult<()>,
    {
        let mut state = self.state.write().expect("registry lock poisoned");
        if state.shut_down {
            return Err(StreamError::Shutdown);
        }
        let log = state.buckets.entry(bucket.clone()).or_default();
        let entry = LogEntry {
            sequence: log.watermark().as_sequence().next(),
            bucket: bucket.clone(),
            key: key.clone(),
            op,
            timestamp: Utc::now(),
        };

        persist(&entry)?;

        log.entries.push(entry.clone());
        log.route(&entry);

        debug!(bucket = %bucket, seq = %entry.sequence, kind = %entry.kind(), "entry appended");
        Ok(entry)
    }

    /// Re-insert an entry read back from durable storage.
    pub(crate) fn restore(&self, entry: LogEntry) -> StreamResult<()> {
        let mut state = self.state.write().expect("registry lock poisoned");
        let log = state.buckets.entry(entry.bucket.clone()).or_default();
        let expected = log.watermark().as_sequence().next();
        if entry.sequence != expected {
            return Err(StreamError::SequenceMismatch {
                bucket: entry.bucket,
                expected,
                found: entry.sequence,
            });
        }
        log.entries.push(entry);
        Ok(())
    }

    pub(crate) fn watermark(&self, bucket: &BucketName) -> StreamResult<Watermark> {
        let state = self.state.read().expect("registry lock poisoned");
        if state.shut_down {
            return Err(StreamError::Shutdown);
        }
        Ok(state
            .buckets
            .get(bucket)
            .map(BucketLog::watermark)
            .unwrap_or(Watermark::EMPTY))
    }

    /// Register a subscriber and enqueue its history in one critical section.
    pub(crate) fn subscribe(
        self: &Arc<Self>,
        bucket: &BucketName,
        from: Sequence,
    ) -> StreamResult<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();

        let mut state = self.state.write().expect("registry lock poisoned");
        if state.shut_down {
            return Err(StreamError::Shutdown);
        }
        let log = state.buckets.entry(bucket.clone()).or_default();
        let watermark = log.watermark();

        // Sequences are 1-based and gap-free, so `from` maps to an index.
        let skip = from.get().saturating_sub(1) as usize;
        let mut replayed = 0usize;
        for entry in log.entries.iter().skip(skip) {
            // The receiver is still held locally; sending cannot fail.
            let _ = tx.send(Delivery::Entry(entry.clone()));
            replayed += 1;
        }
        let _ = tx.send(Delivery::CaughtUp { watermark });

        log.subscribers.push(Subscriber {
            id,
            from,
            sender: tx,
        });
        drop(state);

        debug!(%id, bucket = %bucket, from = %from, %watermark, replayed, "subscription registered");

        let registry: Weak<Self> = Arc::downgrade(self);
        let release_bucket = bucket.clone();
        Ok(Subscription::new(id, bucket.clone(), from, rx, move |id| {
            if let Some(registry) = registry.upgrade() {
                registry.remove(&release_bucket, id);
            }
        }))
    }

    /// Drop a subscriber. Returns `true` if it was registered.
    pub(crate) fn remove(&self, bucket: &BucketName, id: SubscriptionId) -> bool {
        let mut state = self.state.write().expect("registry lock poisoned");
        let Some(log) = state.buckets.get_mut(bucket) else {
            return false;
        };
        let before = log.subscribers.len();
        log.subscribers.retain(|sub| sub.id != id);
        let removed = before != log.subscribers.len();
        // A bucket that was only ever subscribed to leaves no trace.
        if log.entries.is_empty() && log.subscribers.is_empty() {
            state.buckets.remove(bucket);
        }
        removed
    }

    pub(crate) fn last_entry(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
    ) -> StreamResult<Option<LogEntry>> {
        let state = self.state.read().expect("registry lock poisoned");
        if state.shut_down {
            return Err(StreamError::Shutdown);
        }
        Ok(state.buckets.get(bucket).and_then(|log| {
            log.entries
                .iter()
                .rev()
                .find(|entry| &entry.key == key)
                .cloned()
        }))
    }

    pub(crate) fn buckets(&self) -> Vec<BucketName> {
        let state = self.state.read().expect("registry lock poisoned");
        let mut names: Vec<BucketName> = state
            .buckets
            .iter()
            .filter(|(_, log)| !log.entries.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub(crate) fn subscriber_count(&self, bucket: &BucketName) -> usize {
        let state = self.state.read().expect("registry lock poisoned");
        state
            .buckets
            .get(bucket)
            .map(|log| log.subscribers.len())
            .unwrap_or(0)
    }

    pub(crate) fn entry_count(&self) -> usize {
        let state = self.state.read().expect("registry lock poisoned");
        state.buckets.values().map(|log| log.entries.len()).sum()
    }

    #[cfg(test)]
    pub(crate) fn tracked_buckets(&self) -> usize {
        self.state.read().expect("registry lock poisoned").buckets.len()
    }

    /// Refuse further requests and close every subscription channel.
    pub(crate) fn shutdown(&self) {
        let mut state = self.state.write().expect("registry lock poisoned");
        state.shut_down = true;
        state.buckets.retain(|_, log| {
            log.subscribers.clear();
            !log.entries.is_empty()
        });
    }
}
