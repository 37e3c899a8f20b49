//! VoxelWorld - the terrain core behind one handle.
//!
//! Owns the chunk map, the navigation index, the rebuild scheduler and the
//! navigation workers. Everything is constructed here and torn down by
//! [`VoxelWorld::shutdown`] (or drop); there are no global singletons.
//!
//! # Usage
//!
//! ```ignore
//! let world = VoxelWorld::new(TerrainConfig::default(), Plane::new(4.0))?;
//! world.generate_chunk(ChunkKey::new(0, 0, 0));
//! world.build(ChunkKey::new(0, 0, 0))?;
//! world.wait_idle();
//!
//! world.set_voxel(IVec3::new(3, 3, 3), 1.0)?;   // dig, queues a rebuild
//! world.navigate(ActorId(1), start, goal);        // path arrives on deliveries()
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::Receiver;
use glam::IVec3;
use smallvec::SmallVec;

use crate::chunk::{Chunk, ChunkKey, ChunkMap, ChunkSurface};
use crate::config::TerrainConfig;
use crate::density::DensitySource;
use crate::error::{TerrainError, TerrainResult};
use crate::metrics::BuildMetrics;
use crate::nav::{ActorId, Direction, NavGraph, NavigationService, PathDelivery, Pathfinder};
use crate::rebuild::{BuildEvent, Rebuilder};
use crate::scheduler::{BuildRequest, BuildScheduler, SchedulerStats};
use crate::subscribers::Subscribers;

pub struct VoxelWorld {
  config: TerrainConfig,
  chunks: Arc<ChunkMap>,
  graph: Arc<NavGraph>,
  generator: Arc<dyn DensitySource>,
  metrics: Arc<Mutex<BuildMetrics>>,
  events: Arc<Subscribers<BuildEvent>>,
  scheduler: BuildScheduler,
  navigation: NavigationService,
}

impl VoxelWorld {
  /// Validate `config` and start the worker pools. `generator` fills new
  /// chunks and answers for voxels outside loaded chunks.
  pub fn new<G: DensitySource + 'static>(config: TerrainConfig, generator: G) -> TerrainResult<Self> {
    config.validate()?;

    let chunks = Arc::new(ChunkMap::new(config.chunk_dims));
    let graph = Arc::new(NavGraph::new());
    let generator: Arc<dyn DensitySource> = Arc::new(generator);
    let metrics = Arc::new(Mutex::new(BuildMetrics::new()));
    let events = Arc::new(Subscribers::new());

    let rebuilder = Rebuilder::new(
      Arc::clone(&chunks),
      Arc::clone(&graph),
      Arc::clone(&generator),
      config.clone(),
      Arc::clone(&metrics),
      Arc::clone(&events),
    );
    let scheduler = BuildScheduler::new(config.build_pool_size, rebuilder)?;
    let pathfinder = Pathfinder::new(Arc::clone(&chunks), Arc::clone(&graph), config.max_edge_weight);
    let navigation = NavigationService::new(pathfinder, config.nav_pool_size)?;

    tracing::info!(
      chunk_dims = %config.chunk_dims,
      lod = config.lod,
      build_threads = scheduler.num_threads(),
      nav_threads = navigation.num_threads(),
      "voxel world started"
    );

    Ok(Self {
      config,
      chunks,
      graph,
      generator,
      metrics,
      events,
      scheduler,
      navigation,
    })
  }

  #[inline]
  pub fn config(&self) -> &TerrainConfig {
    &self.config
  }

  #[inline]
  pub fn chunks(&self) -> &Arc<ChunkMap> {
    &self.chunks
  }

  #[inline]
  pub fn graph(&self) -> &Arc<NavGraph> {
    &self.graph
  }

  pub fn chunk(&self, key: ChunkKey) -> Option<Arc<Chunk>> {
    self.chunks.get(key)
  }

  // ---------------------------------------------------------------------------
  // Chunks and voxels
  // ---------------------------------------------------------------------------

  /// Load `key`, filling its volume from the generator. Returns the
  /// existing chunk when already loaded. Does not schedule a rebuild.
  pub fn generate_chunk(&self, key: ChunkKey) -> Arc<Chunk> {
    if let Some(existing) = self.chunks.get(key) {
      return existing;
    }
    let chunk = Arc::new(Chunk::new(key, self.config.chunk_dims, self.config.gravity));
    let offset = chunk.offset();
    chunk
      .volume()
      .fill_with(|local| self.generator.density((offset + local).as_vec3()));

    // A racing generate for the same key keeps whichever landed first.
    let inserted = self.chunks.get_or_insert(chunk);
    tracing::debug!(chunk = %key, solid = inserted.volume().solid_count(), "chunk generated");
    inserted
  }

  pub fn get_voxel(&self, p: IVec3) -> TerrainResult<f32> {
    let chunk = self.loaded(p)?;
    Ok(chunk.voxel_world(p))
  }

  /// Write one voxel, drop the navigation nodes that depended on it and
  /// request rebuilds of every loaded chunk whose surface can see it.
  ///
  /// After [`shutdown`](Self::shutdown) the edit is rejected untouched.
  pub fn set_voxel(&self, p: IVec3, value: f32) -> TerrainResult<()> {
    let chunk = self.loaded(p)?;
    if self.scheduler.is_shutdown() {
      return Err(TerrainError::SchedulerShutdown);
    }
    chunk.set_voxel(chunk.to_local(p), value);
    let removed = self.graph.invalidate_around(&self.chunks, p);
    tracing::trace!(position = %p, value, removed, "voxel set");

    // A corner voxel touches its own chunk plus at most three face neighbours.
    let mut targets: SmallVec<[Arc<Chunk>; 4]> = SmallVec::new();
    targets.push(Arc::clone(&chunk));
    for dir in Direction::ALL {
      let key = self.chunks.key_of(p + dir.offset());
      if key == chunk.key() {
        continue;
      }
      if let Some(neighbour) = self.chunks.get(key) {
        targets.push(neighbour);
      }
    }
    for target in targets {
      self.scheduler.build(target)?;
    }
    Ok(())
  }

  fn loaded(&self, p: IVec3) -> TerrainResult<Arc<Chunk>> {
    let key = self.chunks.key_of(p);
    self.chunks.get(key).ok_or(TerrainError::ChunkNotFound(key.0))
  }

  // ---------------------------------------------------------------------------
  // Rebuilds
  // ---------------------------------------------------------------------------

  pub fn build(&self, key: ChunkKey) -> TerrainResult<BuildRequest> {
    let chunk = self.chunks.get(key).ok_or(TerrainError::ChunkNotFound(key.0))?;
    self.scheduler.build(chunk)
  }

  /// Build every loaded chunk.
  pub fn build_all(&self) -> TerrainResult<()> {
    for key in self.chunks.keys() {
      self.build(key)?;
    }
    Ok(())
  }

  /// Latest published surface of a chunk.
  pub fn mesh(&self, key: ChunkKey) -> Option<Arc<ChunkSurface>> {
    self.chunks.get(key).and_then(|c| c.surface())
  }

  /// Subscribe to rebuild completions published from now on, including
  /// seam re-stitches of already built chunks. Each receiver gets every
  /// event; dropping it unsubscribes.
  pub fn events(&self) -> Receiver<BuildEvent> {
    self.events.subscribe()
  }

  pub fn metrics(&self) -> BuildMetrics {
    self.metrics.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn scheduler_stats(&self) -> SchedulerStats {
    self.scheduler.stats()
  }

  pub fn wait_idle(&self) {
    self.scheduler.wait_idle();
  }

  pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
    self.scheduler.wait_idle_timeout(timeout)
  }

  // ---------------------------------------------------------------------------
  // Navigation
  // ---------------------------------------------------------------------------

  /// Queue a path query; the result is delivered to `actor` on
  /// [`deliveries`](Self::deliveries).
  pub fn navigate(&self, actor: ActorId, start: IVec3, goal: IVec3) {
    self.navigation.navigate(actor, start, goal);
  }

  pub fn deliveries(&self) -> Receiver<PathDelivery> {
    self.navigation.deliveries()
  }

  /// Synchronous path query on the calling thread.
  pub fn find_path(&self, start: IVec3, goal: IVec3) -> Vec<IVec3> {
    self.navigation.find_path(start, goal)
  }

  /// Stop accepting rebuilds, drop queued ones and wait for running ones.
  pub fn shutdown(&self) {
    self.scheduler.shutdown();
  }
}

impl std::fmt::Debug for VoxelWorld {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("VoxelWorld")
      .field("chunks", &self.chunks.len())
      .field("nav_nodes", &self.graph.len())
      .field("scheduler", &self.scheduler)
      .field("navigation", &self.navigation)
      .finish()
  }
}

#[cfg(test)]
#[path = "world_test.rs"]
mod world_test;
