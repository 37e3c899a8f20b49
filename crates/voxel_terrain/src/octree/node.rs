//! Octree node payload.

use glam::{IVec3, Vec3};

use super::arena::NodeId;
use super::qef::Qef;
use super::tables::CHILD_MIN_OFFSETS;

/// Role of a node in the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
  /// Has children, never carries draw info.
  Internal,
  /// Collapsed from children by simplification.
  Pseudo,
  /// Built directly from density samples.
  Leaf,
}

/// Surface vertex data carried by Leaf and Pseudo nodes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawInfo {
  /// Vertex index assigned during contouring.
  pub index: Option<u32>,
  pub position: Vec3,
  pub normal: Vec3,
  /// Bit `i` set when corner `i` is solid.
  pub corners: u8,
  pub qef: Qef,
}

impl DrawInfo {
  #[inline]
  pub fn corner_solid(&self, corner: usize) -> bool {
    (self.corners >> corner) & 1 == 1
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OctreeNode {
  pub kind: NodeKind,
  pub min: IVec3,
  pub size: i32,
  pub children: [Option<NodeId>; 8],
  pub draw: Option<DrawInfo>,
}

impl OctreeNode {
  pub fn internal(min: IVec3, size: i32) -> Self {
    Self {
      kind: NodeKind::Internal,
      min,
      size,
      children: [None; 8],
      draw: None,
    }
  }

  pub fn leaf(min: IVec3, size: i32, draw: DrawInfo) -> Self {
    Self {
      kind: NodeKind::Leaf,
      min,
      size,
      children: [None; 8],
      draw: Some(draw),
    }
  }

  #[inline]
  pub fn is_internal(&self) -> bool {
    self.kind == NodeKind::Internal
  }

  /// Exclusive max corner.
  #[inline]
  pub fn max(&self) -> IVec3 {
    self.min + IVec3::splat(self.size)
  }

  /// Min corner of child octant `i`.
  #[inline]
  pub fn child_min(&self, i: usize) -> IVec3 {
    self.min + CHILD_MIN_OFFSETS[i] * (self.size / 2)
  }

  /// Whether a point lies inside the node's closed bounds.
  #[inline]
  pub fn contains_point(&self, p: Vec3) -> bool {
    let min = self.min.as_vec3();
    let max = self.max().as_vec3();
    p.cmpge(min).all() && p.cmple(max).all()
  }

  pub fn child_count(&self) -> usize {
    self.children.iter().flatten().count()
  }
}
