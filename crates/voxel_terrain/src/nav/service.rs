//! Asynchronous path queries on a dedicated worker pool.
//!
//! ```ignore
//! let service = NavigationService::new(pathfinder, 4)?;
//! let deliveries = service.deliveries();
//! service.navigate(ActorId(7), start, goal);
//!
//! // Later, from any thread
//! for delivery in deliveries.try_iter() {
//!     steer(delivery.actor, &delivery.path);
//! }
//! ```
//!
//! Paths finished while nobody holds a receiver are dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use glam::IVec3;

use super::pathfinder::Pathfinder;
use crate::error::TerrainResult;
use crate::subscribers::Subscribers;

/// Caller-chosen identifier that a path is delivered to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u64);

/// Result of one `navigate` call.
#[derive(Clone, Debug, PartialEq)]
pub struct PathDelivery {
  pub actor: ActorId,
  pub start: IVec3,
  pub goal: IVec3,
  /// Empty when no path exists.
  pub path: Vec<IVec3>,
}

pub struct NavigationService {
  pool: rayon::ThreadPool,
  pathfinder: Pathfinder,
  deliveries: Arc<Subscribers<PathDelivery>>,
  in_flight: Arc<AtomicUsize>,
}

impl NavigationService {
  pub fn new(pathfinder: Pathfinder, threads: usize) -> TerrainResult<Self> {
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(threads.max(1))
      .thread_name(|i| format!("nav-worker-{i}"))
      .build()?;
    Ok(Self {
      pool,
      pathfinder,
      deliveries: Arc::new(Subscribers::new()),
      in_flight: Arc::new(AtomicUsize::new(0)),
    })
  }

  pub fn pathfinder(&self) -> &Pathfinder {
    &self.pathfinder
  }

  /// Queue a query. The path arrives on [`deliveries`](Self::deliveries).
  pub fn navigate(&self, actor: ActorId, start: IVec3, goal: IVec3) {
    let pathfinder = self.pathfinder.clone();
    let deliveries = Arc::clone(&self.deliveries);
    let in_flight = Arc::clone(&self.in_flight);
    in_flight.fetch_add(1, Ordering::AcqRel);
    self.pool.spawn(move || {
      let path = pathfinder.find_path(start, goal);
      deliveries.publish(PathDelivery {
        actor,
        start,
        goal,
        path,
      });
      in_flight.fetch_sub(1, Ordering::AcqRel);
    });
  }

  /// Synchronous query on the calling thread.
  pub fn find_path(&self, start: IVec3, goal: IVec3) -> Vec<IVec3> {
    self.pathfinder.find_path(start, goal)
  }

  /// Subscribe to paths finished from now on. Each receiver gets its own
  /// copy of every delivery.
  pub fn deliveries(&self) -> Receiver<PathDelivery> {
    self.deliveries.subscribe()
  }

  /// Queries queued or running.
  pub fn pending(&self) -> usize {
    self.in_flight.load(Ordering::Acquire)
  }

  pub fn num_threads(&self) -> usize {
    self.pool.current_num_threads()
  }
}

impl std::fmt::Debug for NavigationService {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("NavigationService")
      .field("threads", &self.pool.current_num_threads())
      .field("pending", &self.pending())
      .finish()
  }
}
