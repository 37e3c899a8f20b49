//! Output buffers handed to the presentation layer.

use glam::Vec3;

/// Single vertex: position plus averaged surface normal.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshVertex {
  pub position: Vec3,
  pub normal: Vec3,
}

/// Axis-aligned bounding box tracked while vertices are pushed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMaxAabb {
  pub min: Vec3,
  pub max: Vec3,
}

impl MinMaxAabb {
  /// Inverted box that any point will expand.
  pub fn empty() -> Self {
    Self {
      min: Vec3::splat(f32::INFINITY),
      max: Vec3::splat(f32::NEG_INFINITY),
    }
  }

  #[inline]
  pub fn encapsulate(&mut self, point: Vec3) {
    self.min = self.min.min(point);
    self.max = self.max.max(point);
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.min.cmpgt(self.max).any()
  }

  #[inline]
  pub fn contains(&self, point: Vec3) -> bool {
    point.cmpge(self.min).all() && point.cmple(self.max).all()
  }
}

impl Default for MinMaxAabb {
  fn default() -> Self {
    Self::empty()
  }
}

/// Indexed triangle list. Fully solid or fully empty regions produce an
/// empty buffer, never an error.
#[derive(Clone, Debug, Default)]
pub struct MeshBuffers {
  pub vertices: Vec<MeshVertex>,
  pub indices: Vec<u32>,
  pub bounds: MinMaxAabb,
}

impl MeshBuffers {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a vertex and return its index.
  pub fn push_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
    let index = self.vertices.len() as u32;
    self.vertices.push(MeshVertex { position, normal });
    self.bounds.encapsulate(position);
    index
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.indices.is_empty()
  }

  #[inline]
  pub fn vertex_count(&self) -> usize {
    self.vertices.len()
  }

  #[inline]
  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }

  pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
    self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_aabb_empty_then_encapsulate() {
    let mut aabb = MinMaxAabb::empty();
    assert!(aabb.is_empty());
    aabb.encapsulate(Vec3::new(1.0, 2.0, 3.0));
    aabb.encapsulate(Vec3::new(-1.0, 5.0, 0.0));
    assert!(!aabb.is_empty());
    assert_eq!(aabb.min, Vec3::new(-1.0, 2.0, 0.0));
    assert_eq!(aabb.max, Vec3::new(1.0, 5.0, 3.0));
    assert!(aabb.contains(Vec3::new(0.0, 3.0, 1.0)));
  }

  #[test]
  fn test_buffers_counts() {
    let mut mesh = MeshBuffers::new();
    assert!(mesh.is_empty());
    let a = mesh.push_vertex(Vec3::ZERO, Vec3::Y);
    let b = mesh.push_vertex(Vec3::X, Vec3::Y);
    let c = mesh.push_vertex(Vec3::Z, Vec3::Y);
    mesh.indices.extend([a, b, c]);
    assert_eq!(mesh.vertex_count(), 3);
    assert_eq!(mesh.triangle_count(), 1);
    assert_eq!(mesh.triangles().next(), Some([0, 1, 2]));
  }
}
