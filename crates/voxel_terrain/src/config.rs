//! TerrainConfig - fixed parameters for chunk storage, surface extraction,
//! navigation and the worker pools.
//!
//! Values are chosen once when a world is constructed and validated there.
//! Nothing here is reconfigurable while the world is running.

use glam::IVec3;

use crate::chunk::GravityField;
use crate::error::{TerrainError, TerrainResult};

/// Default chunk edge length in voxels.
pub const CHUNK_SIZE: i32 = 16;

/// Default number of rebuild workers.
pub const POOL_SIZE: usize = 16;

/// Default number of pathfinding workers.
pub const NAV_POOL_SIZE: usize = 32;

/// Largest supported octree LOD (leaf size 2^7 = 128 voxels).
pub const MAX_LOD: u32 = 7;

/// Parameters of the per-cell least-squares vertex solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QefSettings {
  /// Jacobi sweeps over the 3x3 normal matrix.
  pub sweeps: u32,
  /// Off-diagonal magnitude below which a rotation is skipped.
  pub tolerance: f32,
  /// Singular values below this (or whose inverse is below it) are dropped
  /// from the pseudo-inverse.
  pub pinv_tolerance: f32,
}

impl Default for QefSettings {
  fn default() -> Self {
    Self {
      sweeps: 4,
      tolerance: 1e-6,
      pinv_tolerance: 0.1,
    }
  }
}

/// World-wide terrain configuration.
#[derive(Clone, Debug)]
pub struct TerrainConfig {
  /// Chunk dimensions in voxels (x, y, z).
  pub chunk_dims: IVec3,

  /// Octree leaf LOD. Leaves span `2^lod` voxels per axis.
  pub lod: u32,

  /// Vertex solve parameters.
  pub qef: QefSettings,

  /// Maximum QEF residual for collapsing children into a pseudo node.
  /// Zero disables simplification.
  pub simplify_threshold: f32,

  /// Pathfinder heuristic weight parameter.
  pub max_edge_weight: f32,

  /// Rebuild worker threads.
  pub build_pool_size: usize,

  /// Navigation query worker threads.
  pub nav_pool_size: usize,

  /// Source of each navigation node's local "down".
  pub gravity: GravityField,
}

impl Default for TerrainConfig {
  fn default() -> Self {
    Self {
      chunk_dims: IVec3::splat(CHUNK_SIZE),
      lod: 0,
      qef: QefSettings::default(),
      simplify_threshold: 0.0,
      max_edge_weight: 1.0,
      build_pool_size: POOL_SIZE,
      nav_pool_size: NAV_POOL_SIZE,
      gravity: GravityField::default(),
    }
  }
}

impl TerrainConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_chunk_dims(mut self, dims: IVec3) -> Self {
    self.chunk_dims = dims;
    self
  }

  pub fn with_lod(mut self, lod: u32) -> Self {
    self.lod = lod;
    self
  }

  pub fn with_qef(mut self, qef: QefSettings) -> Self {
    self.qef = qef;
    self
  }

  pub fn with_simplify_threshold(mut self, threshold: f32) -> Self {
    self.simplify_threshold = threshold;
    self
  }

  pub fn with_max_edge_weight(mut self, weight: f32) -> Self {
    self.max_edge_weight = weight;
    self
  }

  pub fn with_build_pool_size(mut self, threads: usize) -> Self {
    self.build_pool_size = threads;
    self
  }

  pub fn with_nav_pool_size(mut self, threads: usize) -> Self {
    self.nav_pool_size = threads;
    self
  }

  pub fn with_gravity(mut self, gravity: GravityField) -> Self {
    self.gravity = gravity;
    self
  }

  /// Edge length of an octree leaf in voxels.
  #[inline]
  pub fn leaf_size(&self) -> i32 {
    1 << self.lod
  }

  /// Reject configurations the octree or pools cannot work with.
  pub fn validate(&self) -> TerrainResult<()> {
    let invalid = |msg: String| Err(TerrainError::InvalidConfig(msg));

    if self.chunk_dims.min_element() <= 0 {
      return invalid(format!("chunk dimensions must be positive, got {}", self.chunk_dims));
    }
    if self.lod > MAX_LOD {
      return invalid(format!("lod {} exceeds maximum {}", self.lod, MAX_LOD));
    }
    let leaf = self.leaf_size();
    if self.chunk_dims % leaf != IVec3::ZERO {
      return invalid(format!(
        "chunk dimensions {} are not a multiple of the leaf size {}",
        self.chunk_dims, leaf
      ));
    }
    if self.qef.sweeps == 0 {
      return invalid("qef sweeps must be at least 1".into());
    }
    if !(self.simplify_threshold >= 0.0 && self.simplify_threshold.is_finite()) {
      return invalid(format!("simplify threshold {} is not a finite non-negative value", self.simplify_threshold));
    }
    if !(self.max_edge_weight >= 0.0 && self.max_edge_weight.is_finite()) {
      return invalid(format!("max edge weight {} is not a finite non-negative value", self.max_edge_weight));
    }
    if self.build_pool_size == 0 || self.nav_pool_size == 0 {
      return invalid("thread pools need at least one worker".into());
    }
    Ok(())
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
