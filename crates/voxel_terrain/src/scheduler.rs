//! Chunk rebuild scheduling.
//!
//! ```text
//!   build(chunk) ──► try_begin_build ──ok──► worker pool ──► task.run
//!                         │                                     │
//!                       busy                             finish_build,
//!                         ▼                              notify dispatcher
//!                   FIFO + key set  ◄── dispatcher thread ◄─────┘
//!                   (one entry per      waits on condvar, pops the first
//!                    chunk)             entry whose chunk is idle
//! ```
//!
//! At most one rebuild per chunk is in flight. Requests arriving while a
//! chunk is building collapse into a single queued entry, and that entry
//! meshes whatever the volume holds when it is dispatched.
//!
//! Shutdown drops queued entries and waits for in-flight tasks; it never
//! interrupts a running task.

use std::collections::{HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use web_time::Instant;

use crate::chunk::{Chunk, ChunkKey};
use crate::error::{TerrainError, TerrainResult};

/// Work executed for each dispatched chunk.
pub trait BuildTask: Send + Sync + 'static {
  fn run(&self, chunk: &Arc<Chunk>) -> TerrainResult<()>;

  /// Called after `run` failed or panicked, before the chunk is released.
  fn abandoned(&self, _chunk: &Arc<Chunk>, _error: &TerrainError) {}
}

impl<F> BuildTask for F
where
  F: Fn(&Arc<Chunk>) -> TerrainResult<()> + Send + Sync + 'static,
{
  fn run(&self, chunk: &Arc<Chunk>) -> TerrainResult<()> {
    self(chunk)
  }
}

/// What happened to a `build` request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildRequest {
  /// Sent straight to the worker pool.
  Dispatched,
  /// Chunk was busy; a new queue entry was created.
  Queued,
  /// Chunk was busy and already queued.
  Coalesced,
}

/// Counters since the scheduler started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
  pub dispatched: u64,
  pub coalesced: u64,
  pub failed: u64,
}

struct QueueEntry {
  chunk: Arc<Chunk>,
  enqueued_at: Instant,
}

#[derive(Default)]
struct QueueState {
  entries: VecDeque<QueueEntry>,
  pending: HashSet<ChunkKey>,
  in_flight: usize,
  shutdown: bool,
}

impl QueueState {
  fn is_idle(&self) -> bool {
    self.in_flight == 0 && self.entries.is_empty()
  }
}

struct Shared {
  state: Mutex<QueueState>,
  /// Signalled when an entry is queued or a chunk finishes.
  available: Condvar,
  /// Signalled when nothing is queued or running.
  idle: Condvar,
  pool: rayon::ThreadPool,
  task: Box<dyn BuildTask>,
  dispatched: AtomicU64,
  coalesced: AtomicU64,
  failed: AtomicU64,
}

impl Shared {
  fn lock(&self) -> MutexGuard<'_, QueueState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Worker pool plus deduplicating rebuild queue.
pub struct BuildScheduler {
  shared: Arc<Shared>,
  dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl BuildScheduler {
  pub fn new<T: BuildTask>(pool_size: usize, task: T) -> TerrainResult<Self> {
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(pool_size.max(1))
      .thread_name(|i| format!("chunk-build-{i}"))
      .build()?;
    let shared = Arc::new(Shared {
      state: Mutex::new(QueueState::default()),
      available: Condvar::new(),
      idle: Condvar::new(),
      pool,
      task: Box::new(task),
      dispatched: AtomicU64::new(0),
      coalesced: AtomicU64::new(0),
      failed: AtomicU64::new(0),
    });

    let dispatcher_shared = Arc::clone(&shared);
    let dispatcher = std::thread::Builder::new()
      .name("chunk-build-dispatch".into())
      .spawn(move || dispatch_loop(dispatcher_shared))?;

    Ok(Self {
      shared,
      dispatcher: Mutex::new(Some(dispatcher)),
    })
  }

  /// Start a rebuild now, or queue one behind the rebuild in flight.
  pub fn build(&self, chunk: Arc<Chunk>) -> TerrainResult<BuildRequest> {
    let mut state = self.shared.lock();
    if state.shutdown {
      return Err(TerrainError::SchedulerShutdown);
    }
    if chunk.try_begin_build() {
      state.in_flight += 1;
      drop(state);
      tracing::debug!(chunk = %chunk.key(), "dispatching rebuild");
      spawn_build(&self.shared, chunk);
      return Ok(BuildRequest::Dispatched);
    }
    Ok(enqueue(&self.shared, &mut state, chunk))
  }

  /// Queue a rebuild for the dispatcher regardless of build state.
  pub fn queue(&self, chunk: Arc<Chunk>) -> TerrainResult<BuildRequest> {
    let mut state = self.shared.lock();
    if state.shutdown {
      return Err(TerrainError::SchedulerShutdown);
    }
    Ok(enqueue(&self.shared, &mut state, chunk))
  }

  /// Entries waiting for dispatch.
  pub fn pending_len(&self) -> usize {
    self.shared.lock().entries.len()
  }

  pub fn in_flight(&self) -> usize {
    self.shared.lock().in_flight
  }

  pub fn is_queued(&self, key: ChunkKey) -> bool {
    self.shared.lock().pending.contains(&key)
  }

  pub fn is_shutdown(&self) -> bool {
    self.shared.lock().shutdown
  }

  pub fn stats(&self) -> SchedulerStats {
    SchedulerStats {
      dispatched: self.shared.dispatched.load(Ordering::Relaxed),
      coalesced: self.shared.coalesced.load(Ordering::Relaxed),
      failed: self.shared.failed.load(Ordering::Relaxed),
    }
  }

  pub fn num_threads(&self) -> usize {
    self.shared.pool.current_num_threads()
  }

  /// Block until nothing is queued or running.
  pub fn wait_idle(&self) {
    let mut state = self.shared.lock();
    while !state.is_idle() {
      state = self.shared.idle.wait(state).unwrap_or_else(PoisonError::into_inner);
    }
  }

  /// Like [`wait_idle`](Self::wait_idle) with a deadline. Returns false on
  /// timeout.
  pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut state = self.shared.lock();
    while !state.is_idle() {
      let now = Instant::now();
      if now >= deadline {
        return false;
      }
      state = self
        .shared
        .idle
        .wait_timeout(state, deadline - now)
        .unwrap_or_else(PoisonError::into_inner)
        .0;
    }
    true
  }

  /// Drop queued entries, stop the dispatcher and wait for running tasks.
  /// Later calls are no-ops.
  pub fn shutdown(&self) {
    {
      let mut state = self.shared.lock();
      if state.shutdown {
        return;
      }
      state.shutdown = true;
      let dropped = state.entries.len();
      state.entries.clear();
      state.pending.clear();
      if dropped > 0 {
        tracing::warn!(dropped, "shutdown dropped queued rebuilds");
      }
      self.shared.available.notify_all();
    }

    let handle = self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(handle) = handle {
      if handle.join().is_err() {
        tracing::error!("build dispatcher thread panicked");
      }
    }

    self.wait_idle();
    tracing::debug!("build scheduler stopped");
  }
}

impl Drop for BuildScheduler {
  fn drop(&mut self) {
    self.shutdown();
  }
}

impl std::fmt::Debug for BuildScheduler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let state = self.shared.lock();
    f.debug_struct("BuildScheduler")
      .field("queued", &state.entries.len())
      .field("in_flight", &state.in_flight)
      .field("shutdown", &state.shutdown)
      .finish()
  }
}

// =============================================================================
// Internals
// =============================================================================

fn enqueue(shared: &Shared, state: &mut QueueState, chunk: Arc<Chunk>) -> BuildRequest {
  let key = chunk.key();
  if !state.pending.insert(key) {
    shared.coalesced.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(chunk = %key, "rebuild already queued");
    return BuildRequest::Coalesced;
  }
  state.entries.push_back(QueueEntry {
    chunk,
    enqueued_at: Instant::now(),
  });
  tracing::debug!(chunk = %key, queued = state.entries.len(), "rebuild queued");
  shared.available.notify_one();
  BuildRequest::Queued
}

fn dispatch_loop(shared: Arc<Shared>) {
  let mut state = shared.lock();
  loop {
    if state.shutdown {
      break;
    }
    let ready = state.entries.iter().position(|e| !e.chunk.is_building());
    let Some(entry) = ready.and_then(|i| state.entries.remove(i)) else {
      state = shared.available.wait(state).unwrap_or_else(PoisonError::into_inner);
      continue;
    };

    let key = entry.chunk.key();
    state.pending.remove(&key);
    if !entry.chunk.try_begin_build() {
      // Another path started it between the scan and now; retry later.
      state.pending.insert(key);
      state.entries.push_back(entry);
      state = shared.available.wait(state).unwrap_or_else(PoisonError::into_inner);
      continue;
    }
    state.in_flight += 1;
    drop(state);

    tracing::debug!(
      chunk = %key,
      waited_us = entry.enqueued_at.elapsed().as_micros() as u64,
      "dispatching queued rebuild"
    );
    spawn_build(&shared, entry.chunk);
    state = shared.lock();
  }
}

fn spawn_build(shared: &Arc<Shared>, chunk: Arc<Chunk>) {
  shared.dispatched.fetch_add(1, Ordering::Relaxed);
  let worker = Arc::clone(shared);
  shared.pool.spawn(move || {
    let key = chunk.key();
    let outcome = match catch_unwind(AssertUnwindSafe(|| worker.task.run(&chunk))) {
      Ok(result) => result,
      Err(payload) => Err(TerrainError::RebuildPanicked {
        key: key.0,
        message: panic_message(payload.as_ref()),
      }),
    };

    if let Err(error) = outcome {
      worker.failed.fetch_add(1, Ordering::Relaxed);
      tracing::error!(chunk = %key, %error, "rebuild abandoned");
      // The hook is user code too.
      let hook = catch_unwind(AssertUnwindSafe(|| worker.task.abandoned(&chunk, &error)));
      if hook.is_err() {
        tracing::error!(chunk = %key, "abandon hook panicked");
      }
    }

    // Clear the flag before taking the queue lock so a dispatcher woken
    // below sees the chunk as idle.
    chunk.finish_build();
    let mut state = worker.lock();
    state.in_flight = state.in_flight.saturating_sub(1);
    worker.available.notify_all();
    if state.is_idle() {
      worker.idle.notify_all();
    }
  });
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;
