//! Bounded background enhancement pool.
//!
//! Replaces fire-and-forget task chains with an explicit queue and a
//! bounded number of workers, and exposes `pending`/`drain` so callers
//! that persist or clear the index can first wait out in-flight
//! enhancement writes.

use super::EnhancerRegistry;
use crate::config::EnhanceConfig;
use crate::models::Memory;
use crate::storage::Index;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, Semaphore, mpsc};

/// Handle to the enhancement worker pool.
pub struct EnhancerPool {
    tx: mpsc::Sender<Memory>,
    pending: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl EnhancerPool {
    /// Starts the pool. Workers enhance each queued memory, re-index the
    /// result and persist the index; each step is best-effort.
    #[must_use]
    pub fn start(registry: Arc<EnhancerRegistry>, index: Arc<Index>, config: &EnhanceConfig) -> Self {
        let (tx, mut rx) = mpsc::channel::<Memory>(config.queue_depth);
        let pending = Arc::new(AtomicUsize::new(0));
        let notify = Arc::new(Notify::new());
        let semaphore = Arc::new(Semaphore::new(config.workers.max(1)));

        {
            let pending = Arc::clone(&pending);
            let notify = Arc::clone(&notify);
            tokio::spawn(async move {
                while let Some(memory) = rx.recv().await {
                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                        break;
                    };
                    let registry = Arc::clone(&registry);
                    let index = Arc::clone(&index);
                    let pending = Arc::clone(&pending);
                    let notify = Arc::clone(&notify);
                    tokio::spawn(async move {
                        let _permit = permit;
                        let id = memory.id.clone();
                        match registry.enhance(memory).await {
                            Ok(enhanced) => {
                                index.index(std::slice::from_ref(&enhanced));
                                if let Err(e) = index.save() {
                                    tracing::warn!(id = %id, error = %e, "failed to persist index after enhancement");
                                }
                            }
                            Err(e) => {
                                tracing::warn!(id = %id, error = %e, "enhancement failed, keeping original memory");
                            }
                        }
                        pending.fetch_sub(1, Ordering::AcqRel);
                        notify.notify_waiters();
                    });
                }
            });
        }

        Self {
            tx,
            pending,
            notify,
        }
    }

    /// Queues a memory for enhancement. Applies backpressure when the
    /// queue is full; drops the work with a warning if the pool has shut
    /// down.
    pub async fn enqueue(&self, memory: Memory) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if let Err(e) = self.tx.send(memory).await {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            self.notify.notify_waiters();
            tracing::warn!(id = %e.0.id, "enhancement pool is closed, dropping work");
        }
    }

    /// Number of enhancements queued or in flight.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Waits until every queued enhancement has completed.
    pub async fn drain(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}
