//! Density functions consumed by octree construction.
//!
//! A density source maps a world position to a signed scalar: negative is
//! solid, zero or positive is air. Generators are injected as a
//! [`DensitySource`]; any `Fn(Vec3) -> f32` closure qualifies.
//!
//! The SDF primitives are deterministic and easy to verify, which makes them
//! the building blocks for test worlds and simple generators.

use glam::{IVec3, Vec3};

use crate::chunk::ChunkMap;

/// Central difference step for surface normals.
pub const NORMAL_STEP: f32 = 0.001;

/// Injected pure density function `(world position) -> scalar`.
pub trait DensitySource: Send + Sync {
  fn density(&self, p: Vec3) -> f32;
}

impl<F> DensitySource for F
where
  F: Fn(Vec3) -> f32 + Send + Sync,
{
  #[inline]
  fn density(&self, p: Vec3) -> f32 {
    self(p)
  }
}

/// Surface normal by central differences, normalized (zero when flat).
pub fn normal_at<D: DensitySource + ?Sized>(density: &D, p: Vec3) -> Vec3 {
  let h = NORMAL_STEP;
  let dx = density.density(p + Vec3::X * h) - density.density(p - Vec3::X * h);
  let dy = density.density(p + Vec3::Y * h) - density.density(p - Vec3::Y * h);
  let dz = density.density(p + Vec3::Z * h) - density.density(p - Vec3::Z * h);
  Vec3::new(dx, dy, dz).normalize_or_zero()
}

// =============================================================================
// SDF primitives
// =============================================================================

/// Solid ball.
#[derive(Clone, Copy, Debug)]
pub struct Sphere {
  pub center: Vec3,
  pub radius: f32,
}

impl Sphere {
  pub fn new(center: Vec3, radius: f32) -> Self {
    Self { center, radius }
  }
}

impl DensitySource for Sphere {
  fn density(&self, p: Vec3) -> f32 {
    (p - self.center).length() - self.radius
  }
}

/// Solid axis-aligned box.
#[derive(Clone, Copy, Debug)]
pub struct Cuboid {
  pub center: Vec3,
  pub half_extents: Vec3,
}

impl Cuboid {
  pub fn new(center: Vec3, half_extents: Vec3) -> Self {
    Self {
      center,
      half_extents,
    }
  }
}

impl DensitySource for Cuboid {
  fn density(&self, p: Vec3) -> f32 {
    let d = (p - self.center).abs() - self.half_extents;
    let outside = d.max(Vec3::ZERO).length();
    let inside = d.max_element().min(0.0);
    outside + inside
  }
}

/// Flat ground, solid below `height`.
#[derive(Clone, Copy, Debug)]
pub struct Plane {
  pub height: f32,
}

impl Plane {
  pub fn new(height: f32) -> Self {
    Self { height }
  }
}

impl DensitySource for Plane {
  fn density(&self, p: Vec3) -> f32 {
    p.y - self.height
  }
}

/// Solid wherever either operand is solid.
#[derive(Clone, Copy, Debug)]
pub struct Union<A, B>(pub A, pub B);

impl<A: DensitySource, B: DensitySource> DensitySource for Union<A, B> {
  fn density(&self, p: Vec3) -> f32 {
    self.0.density(p).min(self.1.density(p))
  }
}

/// Carve the second operand out of the first.
#[derive(Clone, Copy, Debug)]
pub struct Subtract<A, B>(pub A, pub B);

impl<A: DensitySource, B: DensitySource> DensitySource for Subtract<A, B> {
  fn density(&self, p: Vec3) -> f32 {
    self.0.density(p).max(-self.1.density(p))
  }
}

// =============================================================================
// World-backed sampling
// =============================================================================

/// Reads voxel values from loaded chunks, falling back to the generator
/// where no chunk is loaded.
///
/// As a [`DensitySource`] it floors the position to the containing voxel.
pub struct VolumeDensity<'a> {
  chunks: &'a ChunkMap,
  generator: &'a dyn DensitySource,
}

impl<'a> VolumeDensity<'a> {
  pub fn new(chunks: &'a ChunkMap, generator: &'a dyn DensitySource) -> Self {
    Self { chunks, generator }
  }

  /// Value of the voxel at an integer world position.
  pub fn voxel(&self, p: IVec3) -> f32 {
    match self.chunks.get(self.chunks.key_of(p)) {
      Some(chunk) => chunk.voxel_world(p),
      None => self.generator.density(p.as_vec3()),
    }
  }

  #[inline]
  pub fn is_solid(&self, p: IVec3) -> bool {
    self.voxel(p) < 0.0
  }
}

impl DensitySource for VolumeDensity<'_> {
  fn density(&self, p: Vec3) -> f32 {
    self.voxel(p.floor().as_ivec3())
  }
}

/// Box of voxel values captured once, then sampled lock-free with
/// trilinear interpolation.
///
/// Rebuild tasks capture the chunk plus a one voxel margin so construction
/// never touches a lock per density evaluation. Positions outside the box
/// clamp to its edge.
#[derive(Clone, Debug)]
pub struct SampledGrid {
  origin: IVec3,
  dims: IVec3,
  values: Vec<f32>,
}

impl SampledGrid {
  /// Capture `dims` samples starting at world voxel `origin`.
  pub fn capture(volume: &VolumeDensity<'_>, origin: IVec3, dims: IVec3) -> Self {
    Self::from_fn(origin, dims, |p| volume.voxel(p))
  }

  pub fn from_fn(origin: IVec3, dims: IVec3, mut f: impl FnMut(IVec3) -> f32) -> Self {
    let mut values = Vec::with_capacity((dims.x * dims.y * dims.z) as usize);
    for z in 0..dims.z {
      for y in 0..dims.y {
        for x in 0..dims.x {
          values.push(f(origin + IVec3::new(x, y, z)));
        }
      }
    }
    Self {
      origin,
      dims,
      values,
    }
  }

  #[inline]
  pub fn origin(&self) -> IVec3 {
    self.origin
  }

  #[inline]
  pub fn dims(&self) -> IVec3 {
    self.dims
  }

  /// Sample at an integer world position, clamped into the box.
  #[inline]
  pub fn at(&self, p: IVec3) -> f32 {
    let local = (p - self.origin).clamp(IVec3::ZERO, self.dims - 1);
    self.values[(local.x + self.dims.x * (local.y + self.dims.y * local.z)) as usize]
  }
}

impl DensitySource for SampledGrid {
  fn density(&self, p: Vec3) -> f32 {
    let base = p.floor();
    let t = p - base;
    let b = base.as_ivec3();

    let c000 = self.at(b);
    let c100 = self.at(b + IVec3::X);
    let c010 = self.at(b + IVec3::Y);
    let c110 = self.at(b + IVec3::new(1, 1, 0));
    let c001 = self.at(b + IVec3::Z);
    let c101 = self.at(b + IVec3::new(1, 0, 1));
    let c011 = self.at(b + IVec3::new(0, 1, 1));
    let c111 = self.at(b + IVec3::ONE);

    let x00 = c000 + (c100 - c000) * t.x;
    let x10 = c010 + (c110 - c010) * t.x;
    let x01 = c001 + (c101 - c001) * t.x;
    let x11 = c011 + (c111 - c011) * t.x;
    let y0 = x00 + (x10 - x00) * t.y;
    let y1 = x01 + (x11 - x01) * t.y;
    y0 + (y1 - y0) * t.z
  }
}

#[cfg(test)]
#[path = "density_test.rs"]
mod density_test;
