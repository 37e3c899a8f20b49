//! Seam octrees stitching a chunk to its positive-side neighbours.
//!
//! Each chunk's octree is contoured on its own, which leaves a gap along
//! its max faces. The seam tree for chunk C gathers:
//!
//! ```text
//!   C itself          leaves touching any max face
//!   C + (1,0,0)       leaves on its min-x face
//!   C + (0,0,1)       leaves on its min-z face
//!   C + (1,0,1)       leaves on the min-x/min-z edge
//!   C + (0,1,0)       leaves on its min-y face
//!   C + (1,1,0)       leaves on the min-x/min-y edge
//!   C + (0,1,1)       leaves on the min-y/min-z edge
//!   C + (1,1,1)       leaves at its min corner
//! ```
//!
//! and assembles them bottom-up into one tree, which contours the cracks
//! regardless of the LOD on either side. Triangles fully inside C's boundary
//! layer are produced again here.

use glam::IVec3;

use super::arena::NodeArena;
use super::Octree;

/// Neighbour chunk offsets, in the order seam selection expects.
pub const SEAM_NEIGHBOUR_OFFSETS: [IVec3; 8] = [
  IVec3::new(0, 0, 0),
  IVec3::new(1, 0, 0),
  IVec3::new(0, 0, 1),
  IVec3::new(1, 0, 1),
  IVec3::new(0, 1, 0),
  IVec3::new(1, 1, 0),
  IVec3::new(0, 1, 1),
  IVec3::new(1, 1, 1),
];

/// Whether a node with chunk-local bounds `min .. max` of neighbour
/// `neighbour` takes part in the seam.
pub fn selects_seam_node(neighbour: usize, min: IVec3, max: IVec3, chunk_dims: IVec3) -> bool {
  if neighbour == 0 {
    return max.cmpeq(chunk_dims).any();
  }
  let offset = SEAM_NEIGHBOUR_OFFSETS[neighbour];
  (0..3).all(|axis| offset[axis] == 0 || min[axis] == 0)
}

/// Build the seam tree for the chunk at `chunk_min` from the octrees of
/// itself and its 7 positive neighbours (missing neighbours are skipped).
pub fn build_seam_octree(chunk_min: IVec3, chunk_dims: IVec3, trees: [Option<&Octree>; 8]) -> Octree {
  let mut arena = NodeArena::new();
  let mut seeds = Vec::new();

  for (i, tree) in trees.iter().enumerate() {
    let Some(tree) = tree else {
      continue;
    };
    let neighbour_min = chunk_min + SEAM_NEIGHBOUR_OFFSETS[i] * chunk_dims;

    for id in tree.leaves() {
      let Some(node) = tree.node(id) else {
        continue;
      };
      let local_min = node.min - neighbour_min;
      let local_max = local_min + IVec3::splat(node.size);
      if !selects_seam_node(i, local_min, local_max, chunk_dims) {
        continue;
      }

      let mut seed = node.clone();
      seed.children = [None; 8];
      if let Some(draw) = seed.draw.as_mut() {
        draw.index = None;
      }
      seeds.push(arena.insert(seed));
    }
  }

  Octree::from_leaves(arena, seeds, chunk_min)
}
