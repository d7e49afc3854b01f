//! Batched store sinks.
//!
//! A bounded in-memory queue decouples the poll cycle from store latency:
//! the cycle pushes and moves on, a writer task drains and flushes. On
//! overflow the oldest rows are dropped with a warning, since the next cadence
//! supersedes them anyway. Flush failures are logged and the batch is
//! discarded; there is no in-memory retry.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::storage::StoreError;

/// Grace period for the final drain on shutdown.
pub const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Bounded drop-oldest queue feeding one writer task.
pub struct SinkQueue<T> {
    inner: Arc<SinkInner<T>>,
}

struct SinkInner<T> {
    label: &'static str,
    capacity: usize,
    queue: Mutex<VecDeque<T>>,
    notify: Notify,
}

impl<T> Clone for SinkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> SinkQueue<T> {
    /// Queue holding at most `capacity` rows.
    pub fn new(label: &'static str, capacity: usize) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                label,
                capacity,
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
            }),
        }
    }

    /// Enqueue a batch; the oldest rows give way when the queue is full.
    pub fn push_many(&self, items: impl IntoIterator<Item = T>) {
        let mut dropped = 0usize;
        {
            let mut queue = self.inner.queue.lock();
            for item in items {
                if queue.len() >= self.inner.capacity {
                    queue.pop_front();
                    dropped += 1;
                }
                queue.push_back(item);
            }
        }
        if dropped > 0 {
            warn!(
                sink = self.inner.label,
                dropped, "sink queue overflow, oldest rows dropped"
            );
        }
        self.inner.notify.notify_one();
    }

    /// Take everything currently queued.
    pub fn drain(&self) -> Vec<T> {
        self.inner.queue.lock().drain(..).collect()
    }

    /// Rows currently queued.
    pub fn len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn the writer task. `flush` persists one drained batch; errors
    /// are logged and the batch is gone. On cancellation the queue gets one
    /// final flush bounded by [`DRAIN_GRACE`].
    pub fn spawn_writer<F, Fut>(&self, cancel: CancellationToken, flush: F) -> JoinHandle<()>
    where
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StoreError>> + Send,
    {
        let queue = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = queue.inner.notify.notified() => {
                        queue.flush_once(&flush).await;
                    }
                }
            }
            // Final drain under the shutdown grace period.
            let _ = tokio::time::timeout(DRAIN_GRACE, queue.flush_once(&flush)).await;
            debug!(sink = queue.inner.label, "sink writer stopped");
        })
    }

    async fn flush_once<F, Fut>(&self, flush: &F)
    where
        F: Fn(Vec<T>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<(), StoreError>> + Send,
    {
        let batch = self.drain();
        if batch.is_empty() {
            return;
        }
        let size = batch.len();
        if let Err(e) = flush(batch).await {
            warn!(
                sink = self.inner.label,
                rows = size,
                error = %e,
                "sink batch write failed, batch dropped"
            );
        } else {
            debug!(sink = self.inner.label, rows = size, "sink batch written");
        }
    }
}
