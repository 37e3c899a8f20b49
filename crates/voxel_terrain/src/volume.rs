//! Dense per-chunk scalar field.
//!
//! Values are signed densities: negative is solid, zero or positive is air.
//! Storage is a flat `Vec<f32>` indexed `x + width * (y + height * z)`.
//!
//! Coordinates wrap modulo the chunk dimensions, so callers translate world
//! positions to chunk-local ones before access. Reads share an `RwLock`,
//! writes take it exclusively; a poisoned lock is recovered since the data
//! is plain scalars and can never be half-written.

use std::sync::{PoisonError, RwLock};

use glam::IVec3;

/// Thread-safe dense 3D scalar field owned by one chunk.
#[derive(Debug)]
pub struct VoxelVolume {
  dims: IVec3,
  data: RwLock<Vec<f32>>,
}

impl VoxelVolume {
  /// Create a volume filled with air (`1.0`).
  pub fn new(dims: IVec3) -> Self {
    debug_assert!(dims.min_element() > 0, "volume dimensions must be positive");
    let len = (dims.x * dims.y * dims.z) as usize;
    Self {
      dims,
      data: RwLock::new(vec![1.0; len]),
    }
  }

  #[inline]
  pub fn dimensions(&self) -> IVec3 {
    self.dims
  }

  #[inline]
  pub fn len(&self) -> usize {
    (self.dims.x * self.dims.y * self.dims.z) as usize
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Flat index of a local coordinate, wrapped into range.
  #[inline]
  pub fn index(&self, x: i32, y: i32, z: i32) -> usize {
    let x = x.rem_euclid(self.dims.x);
    let y = y.rem_euclid(self.dims.y);
    let z = z.rem_euclid(self.dims.z);
    (x + self.dims.x * (y + self.dims.y * z)) as usize
  }

  pub fn get(&self, x: i32, y: i32, z: i32) -> f32 {
    let idx = self.index(x, y, z);
    self.data.read().unwrap_or_else(PoisonError::into_inner)[idx]
  }

  pub fn set(&self, x: i32, y: i32, z: i32, value: f32) {
    let idx = self.index(x, y, z);
    self.data.write().unwrap_or_else(PoisonError::into_inner)[idx] = value;
  }

  #[inline]
  pub fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
    self.get(x, y, z) < 0.0
  }

  /// Overwrite every voxel from `f(local)` under a single write lock.
  pub fn fill_with(&self, mut f: impl FnMut(IVec3) -> f32) {
    let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
    for z in 0..self.dims.z {
      for y in 0..self.dims.y {
        for x in 0..self.dims.x {
          let idx = (x + self.dims.x * (y + self.dims.y * z)) as usize;
          data[idx] = f(IVec3::new(x, y, z));
        }
      }
    }
  }

  /// Copy of the raw values, taken under one read lock.
  pub fn snapshot(&self) -> Vec<f32> {
    self.data.read().unwrap_or_else(PoisonError::into_inner).clone()
  }

  /// Number of solid voxels.
  pub fn solid_count(&self) -> usize {
    let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
    data.iter().filter(|v| **v < 0.0).count()
  }
}

#[cfg(test)]
#[path = "volume_test.rs"]
mod volume_test;
