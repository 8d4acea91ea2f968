//! Background persistence for write-through-async caches
//!
//! Each cache owns at most one writer thread. Store and delete jobs are
//! queued in the order the core applied the matching writes, and the thread
//! replays them strictly in that order, so the backing store never ends up
//! behind the cache for a key.
//!
//! Dropping the owning core closes the queue; jobs already queued are still
//! persisted before the thread exits. When no thread can be started the
//! queue starts closed and every job runs on the submitting thread.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use super::{CacheKey, CacheValue};
use crate::bridge::Store;
use crate::entry::Attributes;
use crate::error::{CacheError, StoreError};
use crate::sink::{deliver, ErrorSink, Operation};
use crate::stats::MetricsCollector;

/// One deferred store call
pub(crate) enum WriteJob<K, V> {
    Store { key: K, value: V, attributes: Attributes },
    Delete(K),
}

struct QueueState<K, V> {
    pending: VecDeque<WriteJob<K, V>>,
    closed: bool,
}

struct Queue<K, V> {
    state: Mutex<QueueState<K, V>>,
    ready: Condvar,
}

impl<K, V> Queue<K, V> {
    fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    /// Next job in FIFO order; `None` once closed and drained
    fn next(&self) -> Option<WriteJob<K, V>> {
        let mut state = self.state.lock();
        loop {
            if let Some(job) = state.pending.pop_front() {
                return Some(job);
            }
            if state.closed {
                return None;
            }
            self.ready.wait(&mut state);
        }
    }
}

/// Runs jobs against the store and reports failures
struct Persister<K, V> {
    store: Arc<dyn Store<K, V>>,
    sink: Arc<dyn ErrorSink>,
    metrics: MetricsCollector,
}

impl<K, V> Persister<K, V>
where
    K: CacheKey,
    V: CacheValue,
{
    fn run(&self, job: WriteJob<K, V>) {
        let (operation, key, outcome) = match job {
            WriteJob::Store { key, value, attributes } => {
                let outcome = self.guarded(|store| store.store(&key, &value, &attributes));
                (Operation::Put, key, outcome)
            }
            WriteJob::Delete(key) => {
                let outcome = self.guarded(|store| store.delete(&key));
                (Operation::Remove, key, outcome)
            }
        };
        match outcome {
            Ok(()) => debug!(key = ?key, %operation, "background write persisted"),
            Err(source) => {
                self.metrics.record_store_failure();
                deliver(self.sink.as_ref(), operation, &CacheError::store_failure(&key, source));
            }
        }
    }

    /// A panicking store must not take the writer thread down with it
    fn guarded(
        &self,
        call: impl FnOnce(&dyn Store<K, V>) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        catch_unwind(AssertUnwindSafe(|| call(self.store.as_ref())))
            .unwrap_or_else(|_| Err(StoreError::other("store panicked")))
    }
}

/// Handle to a cache's writer thread
pub(crate) struct AsyncWriter<K, V> {
    queue: Arc<Queue<K, V>>,
    persister: Arc<Persister<K, V>>,
}

impl<K, V> AsyncWriter<K, V>
where
    K: CacheKey,
    V: CacheValue,
{
    pub(crate) fn start(
        store: Arc<dyn Store<K, V>>,
        sink: Arc<dyn ErrorSink>,
        metrics: MetricsCollector,
    ) -> Self {
        let queue = Arc::new(Queue {
            state: Mutex::new(QueueState { pending: VecDeque::new(), closed: false }),
            ready: Condvar::new(),
        });
        let persister = Arc::new(Persister { store, sink, metrics });

        let worker_queue = Arc::clone(&queue);
        let worker = Arc::clone(&persister);
        let spawned = thread::Builder::new().name("stowage-writer".into()).spawn(move || {
            info!("background writer started");
            while let Some(job) = worker_queue.next() {
                worker.run(job);
            }
            info!("background writer stopped");
        });
        if let Err(err) = spawned {
            warn!(error = %err, "could not start background writer; writes run inline");
            queue.close();
        }

        Self { queue, persister }
    }

    /// Queue `job` behind every job submitted before it
    pub(crate) fn submit(&self, job: WriteJob<K, V>) {
        let mut state = self.queue.state.lock();
        if state.closed {
            drop(state);
            self.persister.run(job);
            return;
        }
        state.pending.push_back(job);
        drop(state);
        self.queue.ready.notify_one();
    }

    /// Jobs waiting for the writer thread
    pub(crate) fn backlog(&self) -> usize {
        self.queue.state.lock().pending.len()
    }
}

impl<K, V> Drop for AsyncWriter<K, V> {
    fn drop(&mut self) {
        self.queue.close();
    }
}

impl<K, V> fmt::Debug for AsyncWriter<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncWriter").finish_non_exhaustive()
    }
}
