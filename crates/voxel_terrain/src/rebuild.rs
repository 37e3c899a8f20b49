//! The per-chunk rebuild task run by the scheduler.
//!
//! ```text
//!   capture voxels (chunk + 1 margin, + 2 on the max side)
//!     └─► octree build ─► simplify ─► contour
//!           └─► navigation update for dirty positions
//!                 └─► [seam lock] seam ─► publish ─► re-stitch
//!                                                     negative neighbours
//!                       └─► BuildEvent per published surface
//! ```
//!
//! The capture is the only step that reads voxel locks. Everything after it
//! samples the captured grid.
//!
//! A chunk's seam reads the trees of its 7 positive-side neighbours, so
//! publishing chunk C makes the seams of C - (1,0,0) .. C - (1,1,1) stale.
//! Seam building and every publish happen under one lock, and each publish
//! re-stitches those neighbours before releasing it. Whatever order chunks
//! finish in, every published seam reflects the currently published trees.

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use glam::IVec3;
use web_time::Instant;

use crate::chunk::{Chunk, ChunkKey, ChunkMap, ChunkSurface};
use crate::config::TerrainConfig;
use crate::density::{DensitySource, SampledGrid, VolumeDensity};
use crate::error::{TerrainError, TerrainResult};
use crate::mesh::MeshBuffers;
use crate::metrics::BuildMetrics;
use crate::nav::NavGraph;
use crate::octree::seam::{build_seam_octree, SEAM_NEIGHBOUR_OFFSETS};
use crate::octree::Octree;
use crate::scheduler::BuildTask;
use crate::subscribers::Subscribers;

/// Completion notice for one published rebuild.
#[derive(Clone, Debug)]
pub struct BuildEvent {
  pub key: ChunkKey,
  pub surface: Arc<ChunkSurface>,
  pub duration: Duration,
}

/// Shared state a rebuild reads and writes.
pub struct Rebuilder {
  chunks: Arc<ChunkMap>,
  graph: Arc<NavGraph>,
  generator: Arc<dyn DensitySource>,
  config: TerrainConfig,
  metrics: Arc<Mutex<BuildMetrics>>,
  events: Arc<Subscribers<BuildEvent>>,
  seams: Mutex<()>,
}

impl Rebuilder {
  pub fn new(
    chunks: Arc<ChunkMap>,
    graph: Arc<NavGraph>,
    generator: Arc<dyn DensitySource>,
    config: TerrainConfig,
    metrics: Arc<Mutex<BuildMetrics>>,
    events: Arc<Subscribers<BuildEvent>>,
  ) -> Self {
    Self {
      chunks,
      graph,
      generator,
      config,
      metrics,
      events,
      seams: Mutex::new(()),
    }
  }

  /// Voxel values needed to build `chunk`: one voxel of margin below and
  /// two above, so max-side cells and their normals stay inside the grid.
  pub fn capture(&self, chunk: &Chunk) -> SampledGrid {
    let density = VolumeDensity::new(&self.chunks, &*self.generator);
    SampledGrid::capture(&density, chunk.offset() - IVec3::ONE, chunk.dims() + IVec3::splat(3))
  }

  /// Run every rebuild stage for `chunk` and publish the result.
  pub fn rebuild(&self, chunk: &Arc<Chunk>) -> TerrainResult<Arc<ChunkSurface>> {
    let _span = tracing::info_span!("rebuild", chunk = %chunk.key()).entered();
    let started = Instant::now();

    let grid = self.capture(chunk);
    let mut octree = Octree::build(&grid, chunk.offset(), chunk.dims(), self.config.lod, &self.config.qef)?;
    if self.config.simplify_threshold > 0.0 {
      octree.simplify(self.config.simplify_threshold, &self.config.qef);
    }
    let mesh = Arc::new(octree.generate_mesh());
    let octree = Arc::new(octree);

    let dirty = chunk.take_nav_dirty();
    let nav = match catch_unwind(AssertUnwindSafe(|| self.graph.apply_dirty(chunk, dirty.clone(), &grid))) {
      Ok(nav) => nav,
      Err(payload) => {
        chunk.restore_nav_dirty(dirty);
        resume_unwind(payload);
      }
    };

    let (surface, restitched) = {
      let _seams = self.seams.lock().unwrap_or_else(PoisonError::into_inner);
      let surface = Arc::new(ChunkSurface {
        seam: self.seam_mesh(chunk.key(), &octree),
        octree,
        mesh,
        generation: chunk.next_generation(),
      });
      chunk.publish(Arc::clone(&surface));
      (surface, self.restitch_dependents(chunk.key()))
    };

    let duration = started.elapsed();
    self
      .metrics
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .record_rebuild(duration.as_micros() as u64, surface.mesh.triangle_count(), nav.created, nav.removed);

    tracing::debug!(
      triangles = surface.mesh.triangle_count(),
      seam_triangles = surface.seam.triangle_count(),
      nav_nodes = chunk.nav_node_count(),
      generation = surface.generation,
      restitched = restitched.len(),
      elapsed_us = duration.as_micros() as u64,
      "chunk published"
    );

    self.events.publish(BuildEvent {
      key: chunk.key(),
      surface: Arc::clone(&surface),
      duration,
    });
    for (key, restitched) in restitched {
      self.events.publish(BuildEvent {
        key,
        surface: restitched,
        duration,
      });
    }
    Ok(surface)
  }

  /// Seam triangles of chunk `key` against the published trees of its
  /// positive-side neighbours. Empty when none of them has been built yet.
  /// Callers hold the seam lock.
  fn seam_mesh(&self, key: ChunkKey, octree: &Octree) -> MeshBuffers {
    let neighbours: Vec<Option<Arc<ChunkSurface>>> = SEAM_NEIGHBOUR_OFFSETS[1..]
      .iter()
      .map(|offset| self.chunks.get(ChunkKey(key.0 + *offset)).and_then(|c| c.surface()))
      .collect();
    if neighbours.iter().all(Option::is_none) {
      return MeshBuffers::new();
    }

    let mut trees: [Option<&Octree>; 8] = [None; 8];
    trees[0] = Some(octree);
    for (slot, surface) in trees[1..].iter_mut().zip(&neighbours) {
      *slot = surface.as_ref().map(|s| s.octree.as_ref());
    }
    let offset = key.0 * self.chunks.dims();
    build_seam_octree(offset, self.chunks.dims(), trees).generate_mesh()
  }

  /// Rebuild the seams of the published chunks whose seam reads chunk
  /// `key`. Callers hold the seam lock.
  fn restitch_dependents(&self, key: ChunkKey) -> Vec<(ChunkKey, Arc<ChunkSurface>)> {
    let mut restitched = Vec::new();
    for offset in &SEAM_NEIGHBOUR_OFFSETS[1..] {
      let dependent = ChunkKey(key.0 - *offset);
      let Some(chunk) = self.chunks.get(dependent) else {
        continue;
      };
      let Some(current) = chunk.surface() else {
        continue;
      };
      let surface = Arc::new(current.with_seam(self.seam_mesh(dependent, &current.octree)));
      chunk.publish(Arc::clone(&surface));
      tracing::trace!(chunk = %dependent, seam_triangles = surface.seam.triangle_count(), "seam restitched");
      restitched.push((dependent, surface));
    }
    restitched
  }
}

impl BuildTask for Rebuilder {
  fn run(&self, chunk: &Arc<Chunk>) -> TerrainResult<()> {
    self.rebuild(chunk).map(|_| ())
  }

  fn abandoned(&self, chunk: &Arc<Chunk>, error: &TerrainError) {
    tracing::warn!(chunk = %chunk.key(), %error, "keeping previous surface");
    self.metrics.lock().unwrap_or_else(PoisonError::into_inner).record_failure();
  }
}

impl std::fmt::Debug for Rebuilder {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Rebuilder").field("config", &self.config).finish_non_exhaustive()
  }
}
