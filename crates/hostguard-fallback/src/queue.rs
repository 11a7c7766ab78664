//! The deferred-retry queue behind the queue-and-retry strategy.
//!
//! Parked operations are reattempted by a single drain task on a fixed
//! interval, so drains never overlap. Reattempt backoff is deliberately
//! linear (`retry_interval * attempts`) where retry-with-backoff is
//! exponential: queued retries are patient background work, not a caller
//! waiting on the line.

use crate::events::FallbackEvent;
use crate::{Operation, OperationOptions};
use hostguard_core::Listeners;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

struct QueueItem<T, E> {
    id: u64,
    operation: Operation<T, E>,
    options: OperationOptions,
    /// Attempts made so far; the strategy's immediate attempt counts as 1.
    attempts: u32,
    next_retry_at: Instant,
    tx: oneshot::Sender<Result<T, E>>,
}

struct QueueShared<T, E> {
    items: Mutex<Vec<QueueItem<T, E>>>,
    capacity: usize,
    retry_interval: Duration,
    max_attempts: u32,
    default_timeout: Duration,
    listeners: Listeners<FallbackEvent>,
    drain: Mutex<Option<JoinHandle<()>>>,
    seq: AtomicU64,
}

pub(crate) struct RetryQueue<T, E> {
    shared: Arc<QueueShared<T, E>>,
}

impl<T, E> RetryQueue<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub(crate) fn new(
        capacity: usize,
        retry_interval: Duration,
        max_attempts: u32,
        default_timeout: Duration,
        listeners: Listeners<FallbackEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                items: Mutex::new(Vec::new()),
                capacity,
                retry_interval,
                max_attempts,
                default_timeout,
                listeners,
                drain: Mutex::new(None),
                seq: AtomicU64::new(0),
            }),
        }
    }

    /// Parks a failed operation for background retries.
    ///
    /// Returns `None` when the queue is at capacity. The receiver resolves
    /// with the operation's terminal outcome; it errors if the queue shuts
    /// down first.
    pub(crate) async fn enqueue(
        &self,
        operation: Operation<T, E>,
        options: OperationOptions,
        service: &str,
    ) -> Option<oneshot::Receiver<Result<T, E>>> {
        self.ensure_drain_task().await;

        let shared = &self.shared;
        let mut items = shared.items.lock().await;
        if items.len() >= shared.capacity {
            return None;
        }

        let (tx, rx) = oneshot::channel();
        let id = shared.seq.fetch_add(1, Ordering::Relaxed);
        items.push(QueueItem {
            id,
            operation,
            options,
            attempts: 1,
            next_retry_at: Instant::now() + shared.retry_interval,
            tx,
        });
        let depth = items.len();
        drop(items);

        shared.listeners.emit(&FallbackEvent::QueueEnqueued {
            service: service.to_string(),
            at: Instant::now(),
            item_id: id,
            depth,
        });

        #[cfg(feature = "metrics")]
        ::metrics::gauge!("fallback_queue_depth").set(depth as f64);

        Some(rx)
    }

    pub(crate) async fn depth(&self) -> usize {
        self.shared.items.lock().await.len()
    }

    /// Stops the drain task and drops parked items; their receivers see the
    /// channel close.
    pub(crate) async fn shutdown(&self) {
        if let Some(task) = self.shared.drain.lock().await.take() {
            task.abort();
        }
        self.shared.items.lock().await.clear();
    }

    /// Spawns the drain loop on first use. The task holds only a weak
    /// reference, so dropping the orchestrator ends it.
    async fn ensure_drain_task(&self) {
        let mut drain = self.shared.drain.lock().await;
        if drain.is_some() {
            return;
        }

        let weak = Arc::downgrade(&self.shared);
        let interval = self.shared.retry_interval;
        *drain = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first interval tick fires immediately; nothing is due yet.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                QueueShared::drain_due(&shared).await;
            }
        }));
    }
}

impl<T, E> QueueShared<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Retries every item whose backoff has elapsed. Items are processed
    /// one at a time; a reattempt that fails again is rescheduled with
    /// linearly growing delay until its attempts are spent.
    async fn drain_due(shared: &Arc<Self>) {
        let now = Instant::now();
        let due: Vec<QueueItem<T, E>> = {
            let mut items = shared.items.lock().await;
            let mut due = Vec::new();
            let mut idx = 0;
            while idx < items.len() {
                if items[idx].next_retry_at <= now {
                    due.push(items.swap_remove(idx));
                } else {
                    idx += 1;
                }
            }
            due
        };

        for item in due {
            Self::process(shared, item, now).await;
        }
    }

    async fn process(shared: &Arc<Self>, mut item: QueueItem<T, E>, now: Instant) {
        let service = item
            .options
            .service_name
            .clone()
            .unwrap_or_else(|| "fallback".to_string());

        shared.listeners.emit(&FallbackEvent::QueueRetry {
            service: service.clone(),
            at: Instant::now(),
            item_id: item.id,
            attempt: item.attempts,
        });

        let deadline = item.options.timeout.unwrap_or(shared.default_timeout);
        let outcome =
            tokio::time::timeout(deadline, (item.operation)(item.options.clone())).await;

        match outcome {
            Ok(Ok(value)) => {
                shared.listeners.emit(&FallbackEvent::QueueSuccess {
                    service,
                    at: Instant::now(),
                    item_id: item.id,
                });
                let _ = item.tx.send(Ok(value));
            }
            Ok(Err(err)) => {
                item.attempts += 1;
                if item.attempts > shared.max_attempts {
                    shared.listeners.emit(&FallbackEvent::QueueGaveUp {
                        service,
                        at: Instant::now(),
                        item_id: item.id,
                        attempts: item.attempts,
                    });
                    let _ = item.tx.send(Err(err));
                } else {
                    item.next_retry_at = now + shared.retry_interval * item.attempts;
                    shared.items.lock().await.push(item);
                }
            }
            Err(_elapsed) => {
                item.attempts += 1;
                if item.attempts > shared.max_attempts {
                    shared.listeners.emit(&FallbackEvent::QueueGaveUp {
                        service,
                        at: Instant::now(),
                        item_id: item.id,
                        attempts: item.attempts,
                    });
                    // No application error to deliver; dropping the sender
                    // closes the waiter's channel.
                } else {
                    item.next_retry_at = now + shared.retry_interval * item.attempts;
                    shared.items.lock().await.push(item);
                }
            }
        }
    }
}

impl<T, E> Drop for RetryQueue<T, E> {
    fn drop(&mut self) {
        // The drain task only holds a weak reference and would exit on its
        // next tick anyway; aborting here just makes cleanup prompt.
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            if let Some(task) = shared.drain.get_mut().take() {
                task.abort();
            }
        }
    }
}
