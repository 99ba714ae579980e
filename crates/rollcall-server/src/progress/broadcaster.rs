//! Best-effort fan-out of progress snapshots
//!
//! Delivery is at-most-once per snapshot per subscriber. `publish` never
//! waits: a subscriber whose buffer is full misses that snapshot, and a
//! subscriber whose receiver is gone is pruned.

use futures::Stream;
use std::{
    collections::HashMap,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard},
    task::{Context, Poll},
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};
use uuid::Uuid;

use super::types::ProgressRecord;

/// Default per-subscriber buffer
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 16;

pub type SubscriberId = Uuid;

/// A registered subscriber's receiving end
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<ProgressRecord>,
}

/// Counts from one `publish` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
    pub pruned: usize,
}

/// Process-wide set of progress subscribers
#[derive(Debug)]
pub struct ProgressBroadcaster {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<ProgressRecord>>>,
    buffer: usize,
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl ProgressBroadcaster {
    /// Create a broadcaster whose subscribers each buffer up to `buffer` snapshots
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        self.lock().insert(id, tx);
        debug!(subscriber_id = %id, "Progress subscriber registered");
        Subscription { id, receiver: rx }
    }

    /// Subscribe and get a stream that unsubscribes itself when dropped
    pub fn subscribe_stream(self: &Arc<Self>) -> ProgressStream {
        let Subscription { id, receiver } = self.subscribe();
        ProgressStream {
            id,
            receiver,
            broadcaster: Arc::clone(self),
        }
    }

    /// Remove a subscriber. Safe to call more than once.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!(subscriber_id = %id, "Progress subscriber removed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Offer `snapshot` to every subscriber without blocking.
    pub fn publish(&self, snapshot: &ProgressRecord) -> PublishReport {
        let mut report = PublishReport::default();
        let mut subscribers = self.lock();

        subscribers.retain(|id, tx| match tx.try_send(snapshot.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                trace!(subscriber_id = %id, file_name = %snapshot.file_name, "Subscriber busy, snapshot dropped");
                report.dropped += 1;
                true
            }
            Err(TrySendError::Closed(_)) => {
                report.pruned += 1;
                false
            }
        });

        report
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<ProgressRecord>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Snapshot stream tied to one subscription
#[derive(Debug)]
pub struct ProgressStream {
    id: SubscriberId,
    receiver: mpsc::Receiver<ProgressRecord>,
    broadcaster: Arc<ProgressBroadcaster>,
}

impl ProgressStream {
    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl Stream for ProgressStream {
    type Item = ProgressRecord;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for ProgressStream {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    fn snapshot(name: &str, processed: u64) -> ProgressRecord {
        let mut record = ProgressRecord::new(name);
        record.total_records = 1000;
        record.processed = processed;
        record
    }

    #[tokio::test]
    async fn test_subscriber_receives_snapshot() {
        let broadcaster = ProgressBroadcaster::new(4);
        let mut sub = broadcaster.subscribe();

        let report = broadcaster.publish(&snapshot("grades.csv", 100));
        assert_eq!(report.delivered, 1);

        let received = tokio::time::timeout(Duration::from_millis(100), sub.receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.file_name, "grades.csv");
        assert_eq!(received.processed, 100);
    }

    #[tokio::test]
    async fn test_full_subscriber_does_not_block_publisher() {
        let broadcaster = ProgressBroadcaster::new(1);
        let _idle = broadcaster.subscribe();
        let mut active = broadcaster.subscribe();

        let first = broadcaster.publish(&snapshot("grades.csv", 1));
        assert_eq!(first.delivered, 2);

        // `_idle` never reads; its single slot is now full.
        active.receiver.recv().await.unwrap();
        let second = broadcaster.publish(&snapshot("grades.csv", 2));
        assert_eq!(second.delivered, 1);
        assert_eq!(second.dropped, 1);
        assert_eq!(broadcaster.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_pruned() {
        let broadcaster = ProgressBroadcaster::default();
        let sub = broadcaster.subscribe();
        drop(sub);

        let report = broadcaster.publish(&snapshot("grades.csv", 1));
        assert_eq!(report.pruned, 1);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let broadcaster = ProgressBroadcaster::default();
        let sub = broadcaster.subscribe();

        assert!(broadcaster.unsubscribe(sub.id));
        assert!(!broadcaster.unsubscribe(sub.id));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_unsubscribes_on_drop() {
        let broadcaster = Arc::new(ProgressBroadcaster::default());
        let mut stream = broadcaster.subscribe_stream();
        assert_eq!(broadcaster.subscriber_count(), 1);

        broadcaster.publish(&snapshot("grades.csv", 7));
        assert_eq!(stream.next().await.unwrap().processed, 7);

        let id = stream.id();
        drop(stream);
        assert_eq!(broadcaster.subscriber_count(), 0);
        assert!(!broadcaster.unsubscribe(id));
    }

    #[test]
    fn test_zero_buffer_is_raised_to_one() {
        let broadcaster = ProgressBroadcaster::new(0);
        let _sub = broadcaster.subscribe();
        assert_eq!(broadcaster.publish(&snapshot("grades.csv", 1)).delivered, 1);
    }
}
