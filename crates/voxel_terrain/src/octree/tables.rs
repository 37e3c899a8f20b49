//! Adjacency tables for octree dual contouring.
//!
//! # Corner / child numbering
//!
//! Corner `i` (and child octant `i`) sits at offset
//! `((i >> 2) & 1, (i >> 1) & 1, i & 1)`, so X is bit 2 and Z is bit 0:
//!
//! ```text
//!       3──────7          0=(0,0,0)  1=(0,0,1)  2=(0,1,0)  3=(0,1,1)
//!      /│     /│          4=(1,0,0)  5=(1,0,1)  6=(1,1,0)  7=(1,1,1)
//!     2─┼────6 │
//!     │ 1────┼─5         +Y
//!     │/     │/           │  +Z
//!     0──────4            │ /
//!                         └───+X
//! ```
//!
//! # Edges
//!
//! ```text
//! X-axis: 0:[0,4]  1:[1,5]  2:[2,6]  3:[3,7]
//! Y-axis: 4:[0,2]  5:[1,3]  6:[4,6]  7:[5,7]
//! Z-axis: 8:[0,1]  9:[2,3] 10:[4,5] 11:[6,7]
//! ```
//!
//! The contour tables describe, for a cell split into 8 children, which
//! child pairs share an internal face and which child quadruples share an
//! internal edge, plus how those recurse when one side is itself split.

use glam::IVec3;

/// Offset of child / corner `i` in units of the child size.
pub const CHILD_MIN_OFFSETS: [IVec3; 8] = [
  IVec3::new(0, 0, 0),
  IVec3::new(0, 0, 1),
  IVec3::new(0, 1, 0),
  IVec3::new(0, 1, 1),
  IVec3::new(1, 0, 0),
  IVec3::new(1, 0, 1),
  IVec3::new(1, 1, 0),
  IVec3::new(1, 1, 1),
];

/// Corner endpoints of each of the 12 cell edges.
pub const EDGE_VERTEX_MAP: [[usize; 2]; 12] = [
  [0, 4], [1, 5], [2, 6], [3, 7], // x-axis
  [0, 2], [1, 3], [4, 6], [5, 7], // y-axis
  [0, 1], [2, 3], [4, 5], [6, 7], // z-axis
];

/// Internal faces of a cell: `[child_a, child_b, axis]`.
pub const CELL_PROC_FACE_MASK: [[usize; 3]; 12] = [
  [0, 4, 0], [1, 5, 0], [2, 6, 0], [3, 7, 0],
  [0, 2, 1], [4, 6, 1], [1, 3, 1], [5, 7, 1],
  [0, 1, 2], [2, 3, 2], [4, 5, 2], [6, 7, 2],
];

/// Internal edges of a cell: `[c0, c1, c2, c3, axis]`.
pub const CELL_PROC_EDGE_MASK: [[usize; 5]; 6] = [
  [0, 1, 2, 3, 0],
  [4, 5, 6, 7, 0],
  [0, 4, 1, 5, 1],
  [2, 6, 3, 7, 1],
  [0, 2, 4, 6, 2],
  [1, 3, 5, 7, 2],
];

/// Face recursion: for a face on `axis`, the 4 child pairs `[a, b, axis]`.
pub const FACE_PROC_FACE_MASK: [[[usize; 3]; 4]; 3] = [
  [[4, 0, 0], [5, 1, 0], [6, 2, 0], [7, 3, 0]],
  [[2, 0, 1], [6, 4, 1], [3, 1, 1], [7, 5, 1]],
  [[1, 0, 2], [3, 2, 2], [5, 4, 2], [7, 6, 2]],
];

/// Edges inside a face: `[order, c0, c1, c2, c3, edge_axis]`, where `order`
/// selects a row of [`FACE_PROC_EDGE_ORDERS`].
pub const FACE_PROC_EDGE_MASK: [[[usize; 6]; 4]; 3] = [
  [[1, 4, 0, 5, 1, 1], [1, 6, 2, 7, 3, 1], [0, 4, 6, 0, 2, 2], [0, 5, 7, 1, 3, 2]],
  [[0, 2, 3, 0, 1, 0], [0, 6, 7, 4, 5, 0], [1, 2, 0, 6, 4, 2], [1, 3, 1, 7, 5, 2]],
  [[1, 1, 0, 3, 2, 0], [1, 5, 4, 7, 6, 0], [0, 1, 5, 0, 4, 1], [0, 3, 7, 2, 6, 1]],
];

/// Which of the two face nodes feeds each of the 4 edge slots.
pub const FACE_PROC_EDGE_ORDERS: [[usize; 4]; 2] = [[0, 0, 1, 1], [0, 1, 0, 1]];

/// Edge recursion: the 2 sub-edges along an edge on `axis`,
/// `[c0, c1, c2, c3, axis]`.
pub const EDGE_PROC_EDGE_MASK: [[[usize; 5]; 2]; 3] = [
  [[3, 2, 1, 0, 0], [7, 6, 5, 4, 0]],
  [[5, 1, 4, 0, 1], [7, 3, 6, 2, 1]],
  [[6, 4, 2, 0, 2], [7, 5, 3, 1, 2]],
];

/// For the 4 nodes around an edge on `axis`, which of each node's 12
/// edges is the shared one.
pub const PROCESS_EDGE_MASK: [[usize; 4]; 3] = [[3, 2, 1, 0], [7, 5, 6, 4], [11, 10, 9, 8]];

/// Most edge crossings accumulated per leaf.
pub const MAX_CROSSINGS: usize = 6;

/// Steps of the bounded zero-crossing search along an edge.
pub const CROSSING_STEPS: u32 = 8;

#[cfg(test)]
mod tests {
  use super::*;

  /// Every edge connects corners differing in exactly the axis bit.
  #[test]
  fn test_edges_follow_axis_bits() {
    for (edge, &[a, b]) in EDGE_VERTEX_MAP.iter().enumerate() {
      let axis = edge / 4;
      let axis_bit = 4 >> axis;
      assert_eq!(a ^ b, axis_bit, "edge {edge} [{a},{b}]");
      let delta = CHILD_MIN_OFFSETS[b] - CHILD_MIN_OFFSETS[a];
      assert_eq!(delta[axis], 1);
    }
  }

  /// Cell faces pair children that differ only along the face axis.
  #[test]
  fn test_cell_faces_are_adjacent_pairs() {
    for &[a, b, axis] in &CELL_PROC_FACE_MASK {
      assert_eq!(a ^ b, 4 >> axis);
      assert!(a < b);
    }
  }

  /// The 4 children around an internal edge share the edge axis coordinate.
  #[test]
  fn test_cell_edges_share_axis_coordinate() {
    for mask in &CELL_PROC_EDGE_MASK {
      let axis = mask[4];
      let bit = 4 >> axis;
      let first = mask[0] & bit;
      assert!(mask[..4].iter().all(|c| c & bit == first));
    }
  }

  /// The shared edge picked for each node around an edge lies on that axis.
  #[test]
  fn test_process_edges_on_axis() {
    for (axis, row) in PROCESS_EDGE_MASK.iter().enumerate() {
      for &edge in row {
        assert_eq!(edge / 4, axis);
      }
    }
  }
}
