//! Delivery of built documents to the store.
//!
//! Writes are either performed inline by the appending thread, or handed to a bounded queue drained by worker
//! threads. Background failures never reach the caller; they are logged and counted in [AppenderStats].

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::JoinHandle,
};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn, Span};

use crate::{
    error::AppenderError,
    store::{StoreCollection, StoreError},
    value::LogDocument,
};

/// What happens when the background queue is full.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overflow {
    /// Discard the write. The append call never blocks.
    #[default]
    Drop,
    /// Wait for room in the queue.
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum WriteMode {
    /// The append call performs the insert and reports store failures.
    Inline,
    /// Fire-and-forget through a bounded queue.
    Background {
        queue_capacity: usize,
        workers: usize,
        #[serde(default)]
        overflow: Overflow,
    },
}

impl Default for WriteMode {
    fn default() -> Self {
        WriteMode::Background {
            queue_capacity: 1024,
            workers: 1,
            overflow: Overflow::Drop,
        }
    }
}

/// Counters describing what happened to submitted documents.
#[derive(Debug, Default)]
pub struct AppenderStats {
    submitted: AtomicU64,
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// A point-in-time copy of [AppenderStats].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub written: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl AppenderStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// A worker that can't be spawned is a resource problem, not a configuration one, so a later append retries.
fn spawn_failure(err: std::io::Error) -> AppenderError {
    AppenderError::ProvisioningError(StoreError::backend(err))
}

/// One insert call.
#[derive(Debug)]
pub enum WriteJob {
    One(LogDocument),
    Many(Vec<LogDocument>),
}

impl WriteJob {
    pub fn len(&self) -> usize {
        match self {
            WriteJob::One(_) => 1,
            WriteJob::Many(docs) => docs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write<C: StoreCollection + ?Sized>(&self, collection: &C) -> Result<(), StoreError> {
        match self {
            WriteJob::One(doc) => collection.insert_one(doc),
            WriteJob::Many(docs) => collection.insert_many(docs),
        }
    }
}

/// Owns the write path for one collection. Dropping it closes the queue and waits for queued writes to drain.
pub struct WriteDispatcher<C: StoreCollection> {
    collection: Arc<C>,
    overflow: Overflow,
    sender: Option<Sender<WriteJob>>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<AppenderStats>,
}

impl<C: StoreCollection> WriteDispatcher<C> {
    pub fn new(
        collection: Arc<C>,
        mode: WriteMode,
        stats: Arc<AppenderStats>,
    ) -> Result<Self, AppenderError> {
        let mut dispatcher = Self {
            collection,
            overflow: Overflow::default(),
            sender: None,
            workers: vec![],
            stats,
        };

        if let WriteMode::Background {
            queue_capacity,
            workers,
            overflow,
        } = mode
        {
            let (sender, receiver) = channel::bounded(queue_capacity.max(1));
            // Workers report under the span that was active when the collection was resolved.
            let span = Span::current();
            dispatcher.overflow = overflow;
            dispatcher.sender = Some(sender);
            for worker in 0..workers.max(1) {
                let handle = std::thread::Builder::new()
                    .name(format!("mongolog-writer-{worker}"))
                    .spawn({
                        let receiver = receiver.clone();
                        let collection = dispatcher.collection.clone();
                        let stats = dispatcher.stats.clone();
                        let span = span.clone();
                        move || span.in_scope(|| Self::drain(receiver, collection, stats))
                    })
                    .map_err(spawn_failure)?;
                dispatcher.workers.push(handle);
            }
        }

        Ok(dispatcher)
    }

    pub fn collection(&self) -> &Arc<C> {
        &self.collection
    }

    /// Hands a write to the store. Only inline mode reports store failures.
    pub fn submit(&self, job: WriteJob) -> Result<(), AppenderError> {
        let count = job.len();
        AppenderStats::add(&self.stats.submitted, count);

        let Some(sender) = &self.sender else {
            return match job.write(self.collection.as_ref()) {
                Ok(()) => {
                    AppenderStats::add(&self.stats.written, count);
                    Ok(())
                }
                Err(err) => {
                    AppenderStats::add(&self.stats.failed, count);
                    Err(AppenderError::WriteError(err))
                }
            };
        };

        let rejected = match self.overflow {
            Overflow::Drop => match sender.try_send(job) {
                Ok(()) => None,
                Err(TrySendError::Full(_)) => Some("queue full"),
                Err(TrySendError::Disconnected(_)) => Some("writers stopped"),
            },
            Overflow::Block => sender.send(job).err().map(|_| "writers stopped"),
        };

        if let Some(reason) = rejected {
            AppenderStats::add(&self.stats.dropped, count);
            warn!(
                collection = self.collection.name(),
                documents = count,
                "Dropped log write: {reason}"
            );
        }
        Ok(())
    }

    fn drain(receiver: Receiver<WriteJob>, collection: Arc<C>, stats: Arc<AppenderStats>) {
        for job in receiver.iter() {
            let count = job.len();
            match job.write(collection.as_ref()) {
                Ok(()) => AppenderStats::add(&stats.written, count),
                Err(err) => {
                    AppenderStats::add(&stats.failed, count);
                    error!(
                        collection = collection.name(),
                        documents = count,
                        "Failed to write log documents: {err}"
                    );
                }
            }
        }
        debug!(collection = collection.name(), "Write worker finished");
    }
}

impl<C: StoreCollection> Drop for WriteDispatcher<C> {
    fn drop(&mut self) {
        // Closing the channel lets workers finish whatever is queued.
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Write worker panicked");
            }
        }
    }
}
