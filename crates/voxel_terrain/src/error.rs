//! Error types shared across the terrain core.
//!
//! Only conditions a caller can act on surface here. Empty geometry and
//! unreachable path goals are ordinary results (an empty buffer, an empty
//! path), and lock contention is always handled by blocking.

use glam::IVec3;

/// Errors produced by world setup, edits and rebuild tasks.
#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
  #[error("invalid terrain configuration: {0}")]
  InvalidConfig(String),

  #[error("chunk {0} is not loaded")]
  ChunkNotFound(IVec3),

  #[error("local coordinate {local} is outside chunk {key}")]
  OutOfChunk { key: IVec3, local: IVec3 },

  #[error("build scheduler has shut down")]
  SchedulerShutdown,

  #[error("rebuild of chunk {key} panicked: {message}")]
  RebuildPanicked { key: IVec3, message: String },

  /// The density field produced NaN or infinity inside a surface cell.
  #[error("cell at {0} produced a non-finite vertex")]
  NonFiniteVertex(IVec3),

  #[error("failed to build thread pool: {0}")]
  ThreadPool(#[from] rayon::ThreadPoolBuildError),

  #[error("failed to spawn dispatcher thread: {0}")]
  Spawn(#[from] std::io::Error),
}

pub type TerrainResult<T> = Result<T, TerrainError>;
