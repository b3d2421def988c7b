//! Asynchronous chunk generation with a configurable thread pool.
//!
//! Offloads sampling and carving to background threads, supports
//! cancellation of queued requests, and delivers completed chunks via
//! bounded channels. Results arrive in completion order; each one is
//! independent of the order requests were made in.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, bounded};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use glam::IVec3;
use strata_noise::InvariantError;

use crate::engine::{GeneratedChunk, TerrainEngine};

/// The outcome of one background request.
#[derive(Debug)]
pub struct ChunkOutcome {
    pub chunk: IVec3,
    pub result: Result<GeneratedChunk, InvariantError>,
}

/// Why a submission was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("generation queue is full; chunk {0} not queued")]
    QueueFull(IVec3),
    #[error("chunk {0} is already pending")]
    AlreadyPending(IVec3),
}

/// Internal wrapper that carries the request and its cancellation flag.
struct QueuedTask {
    chunk: IVec3,
    cancelled: Arc<AtomicBool>,
}

/// Manages asynchronous chunk generation across a thread pool.
pub struct AsyncChunkGenerator {
    /// Sender for submitting generation requests.
    task_sender: Sender<QueuedTask>,
    /// Receiver for collecting completed chunks.
    result_receiver: Receiver<ChunkOutcome>,
    /// Shared cancellation flag per request.
    active_tasks: Arc<DashMap<IVec3, Arc<AtomicBool>>>,
    /// Current number of in-flight requests.
    in_flight: Arc<AtomicU64>,
    workers: usize,
}

impl AsyncChunkGenerator {
    /// Create a generator over `engine`.
    ///
    /// - `thread_count`: worker threads. Typically `num_cpus - 2` to leave
    ///   headroom for the host's own threads.
    /// - `max_concurrent`: queue depth is twice this; excess submissions are
    ///   rejected.
    /// - `result_capacity`: bounded channel capacity for completed chunks.
    ///
    /// Fails only if no worker thread could be spawned.
    pub fn new(
        engine: Arc<TerrainEngine>,
        thread_count: usize,
        max_concurrent: usize,
        result_capacity: usize,
    ) -> std::io::Result<Self> {
        let (task_sender, task_receiver) = bounded::<QueuedTask>(max_concurrent.max(1) * 2);
        let (result_sender, result_receiver) = bounded::<ChunkOutcome>(result_capacity.max(1));
        let in_flight = Arc::new(AtomicU64::new(0));

        let mut workers = 0;
        let mut last_error = None;
        for index in 0..thread_count.max(1) {
            let receiver = task_receiver.clone();
            let sender = result_sender.clone();
            let in_flight = Arc::clone(&in_flight);
            let engine = Arc::clone(&engine);

            let spawned = std::thread::Builder::new()
                .name(format!("chunk-gen-worker-{index}"))
                .spawn(move || {
                    while let Ok(task) = receiver.recv() {
                        // Check cancellation before starting work.
                        if task.cancelled.load(Ordering::Relaxed) {
                            in_flight.fetch_sub(1, Ordering::Relaxed);
                            continue;
                        }

                        let result = engine.request_chunk(task.chunk);

                        if !task.cancelled.load(Ordering::Relaxed) {
                            let _ = sender.send(ChunkOutcome {
                                chunk: task.chunk,
                                result,
                            });
                        }
                        in_flight.fetch_sub(1, Ordering::Relaxed);
                    }
                });
            match spawned {
                Ok(_) => workers += 1,
                Err(err) => {
                    tracing::warn!(%err, "Failed to spawn chunk generation worker");
                    last_error = Some(err);
                }
            }
        }
        if workers == 0 {
            if let Some(err) = last_error {
                return Err(err);
            }
        }
        tracing::info!(workers, max_concurrent, "Chunk generation pool started");

        Ok(Self {
            task_sender,
            result_receiver,
            active_tasks: Arc::new(DashMap::new()),
            in_flight,
            workers,
        })
    }

    /// Create a generator with a thread count based on CPU cores.
    pub fn with_defaults(engine: Arc<TerrainEngine>) -> std::io::Result<Self> {
        Self::new(engine, default_thread_count(), 64, 128)
    }

    /// Number of running worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Queue a chunk for background generation.
    ///
    /// A chunk that is already pending keeps its original request.
    pub fn submit(&self, chunk: IVec3) -> Result<(), SubmitError> {
        let cancelled = Arc::new(AtomicBool::new(false));
        match self.active_tasks.entry(chunk) {
            Entry::Occupied(_) => return Err(SubmitError::AlreadyPending(chunk)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&cancelled));
            }
        }
        self.in_flight.fetch_add(1, Ordering::Relaxed);

        self.task_sender
            .try_send(QueuedTask { chunk, cancelled })
            .map_err(|e| {
                self.in_flight.fetch_sub(1, Ordering::Relaxed);
                let chunk = e.into_inner().chunk;
                self.active_tasks.remove(&chunk);
                SubmitError::QueueFull(chunk)
            })
    }

    /// Cancel a pending request. A request already being generated may
    /// still finish, but its result is discarded.
    pub fn cancel(&self, chunk: &IVec3) {
        if let Some((_, cancelled)) = self.active_tasks.remove(chunk) {
            cancelled.store(true, Ordering::Relaxed);
        }
    }

    /// Drain all completed chunks from the result channel.
    pub fn drain_results(&self) -> Vec<ChunkOutcome> {
        let mut results = Vec::new();
        while let Ok(outcome) = self.result_receiver.try_recv() {
            self.active_tasks.remove(&outcome.chunk);
            results.push(outcome);
        }
        results
    }

    /// Number of requests currently queued or executing.
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Returns `true` if a request for `chunk` is pending.
    pub fn is_pending(&self, chunk: &IVec3) -> bool {
        self.active_tasks.contains_key(chunk)
    }
}

/// `num_cpus - 2`, at least one.
pub fn default_thread_count() -> usize {
    let cpus = num_cpus::get().max(2);
    (cpus - 2).max(1)
}
