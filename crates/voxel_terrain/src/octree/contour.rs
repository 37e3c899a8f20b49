//! Triangle generation by recursive cell / face / edge traversal.
//!
//! ```text
//! cell_proc(node)
//!   ├── cell_proc(child) x8
//!   ├── face_proc(child pair, axis) x12     internal faces
//!   └── edge_proc(child quad, axis) x6      internal edges
//!
//! face_proc(a, b)       descend the split side(s) until both are leaves,
//!                       then the 4 edges lying in the shared face
//! edge_proc(a, b, c, d) descend until all four are leaves, then emit
//!                       a quad if the shared edge changes sign
//! ```
//!
//! A leaf standing in for a split neighbour is reused at every recursion
//! level, which is what lets cells of different sizes stitch.

use super::arena::{NodeArena, NodeId};
use super::node::OctreeNode;
use super::tables::{
  CELL_PROC_EDGE_MASK, CELL_PROC_FACE_MASK, EDGE_PROC_EDGE_MASK, EDGE_VERTEX_MAP, FACE_PROC_EDGE_MASK,
  FACE_PROC_EDGE_ORDERS, FACE_PROC_FACE_MASK, PROCESS_EDGE_MASK,
};
use crate::mesh::MeshBuffers;

type Entry<'a> = (NodeId, &'a OctreeNode);

#[inline]
fn resolve(arena: &NodeArena, id: Option<NodeId>) -> Option<Entry<'_>> {
  let id = id?;
  Some((id, arena.get(id)?))
}

/// Child `octant` of an internal node, or the node itself when it is not
/// split further.
#[inline]
fn descend(entry: Entry<'_>, octant: usize) -> Option<NodeId> {
  let (id, node) = entry;
  if node.is_internal() {
    node.children[octant]
  } else {
    Some(id)
  }
}

/// Give every Leaf/Pseudo node below `id` a vertex in `mesh`.
pub fn generate_vertex_indices(arena: &mut NodeArena, id: NodeId, mesh: &mut MeshBuffers) {
  let Some(node) = arena.get_mut(id) else {
    return;
  };
  if node.is_internal() {
    let children = node.children;
    for child in children.iter().flatten() {
      generate_vertex_indices(arena, *child, mesh);
    }
  } else if let Some(draw) = node.draw.as_mut() {
    draw.index = Some(mesh.push_vertex(draw.position, draw.normal));
  }
}

pub fn cell_proc(arena: &NodeArena, id: Option<NodeId>, indices: &mut Vec<u32>) {
  let Some((_, node)) = resolve(arena, id) else {
    return;
  };
  if !node.is_internal() {
    return;
  }
  let children = node.children;

  for child in children {
    cell_proc(arena, child, indices);
  }

  for &[a, b, axis] in &CELL_PROC_FACE_MASK {
    face_proc(arena, [children[a], children[b]], axis, indices);
  }

  for mask in &CELL_PROC_EDGE_MASK {
    let quad = [children[mask[0]], children[mask[1]], children[mask[2]], children[mask[3]]];
    edge_proc(arena, quad, mask[4], indices);
  }
}

fn face_proc(arena: &NodeArena, ids: [Option<NodeId>; 2], axis: usize, indices: &mut Vec<u32>) {
  let [Some(a), Some(b)] = ids.map(|id| resolve(arena, id)) else {
    return;
  };
  if !a.1.is_internal() && !b.1.is_internal() {
    return;
  }
  let pair = [a, b];

  for &[ca, cb, sub_axis] in &FACE_PROC_FACE_MASK[axis] {
    face_proc(arena, [descend(a, ca), descend(b, cb)], sub_axis, indices);
  }

  for mask in &FACE_PROC_EDGE_MASK[axis] {
    let order = FACE_PROC_EDGE_ORDERS[mask[0]];
    let quad = [0, 1, 2, 3].map(|j| descend(pair[order[j]], mask[1 + j]));
    edge_proc(arena, quad, mask[5], indices);
  }
}

fn edge_proc(arena: &NodeArena, ids: [Option<NodeId>; 4], axis: usize, indices: &mut Vec<u32>) {
  let [Some(a), Some(b), Some(c), Some(d)] = ids.map(|id| resolve(arena, id)) else {
    return;
  };
  let quad = [a, b, c, d];

  if quad.iter().all(|(_, node)| !node.is_internal()) {
    process_edge(quad, axis, indices);
    return;
  }

  for mask in &EDGE_PROC_EDGE_MASK[axis] {
    let sub = [0, 1, 2, 3].map(|j| descend(quad[j], mask[j]));
    edge_proc(arena, sub, mask[4], indices);
  }
}

/// Emit the two triangles of the quad around a shared edge.
///
/// The smallest node decides: its edge must change sign, and the material at
/// its first edge corner picks the winding.
fn process_edge(quad: [Entry<'_>; 4], axis: usize, indices: &mut Vec<u32>) {
  let mut min_size = i32::MAX;
  let mut min_index = 0;
  let mut flip = false;
  let mut sign_change = [false; 4];
  let mut vertex = [0u32; 4];

  for (i, (_, node)) in quad.iter().enumerate() {
    let Some(draw) = node.draw.as_ref() else {
      return;
    };
    let Some(index) = draw.index else {
      return;
    };
    let [c0, c1] = EDGE_VERTEX_MAP[PROCESS_EDGE_MASK[axis][i]];
    let s0 = draw.corner_solid(c0);
    let s1 = draw.corner_solid(c1);

    if node.size < min_size {
      min_size = node.size;
      min_index = i;
      flip = s0;
    }
    vertex[i] = index;
    sign_change[i] = s0 != s1;
  }

  if !sign_change[min_index] {
    return;
  }

  let triangles = if flip {
    [[0, 3, 1], [0, 2, 3]]
  } else {
    [[0, 1, 3], [0, 3, 2]]
  };
  for tri in triangles {
    let [a, b, c] = tri.map(|k| vertex[k]);
    // Neighbours of different size can repeat a vertex; skip the sliver.
    if a != b && b != c && a != c {
      indices.extend([a, b, c]);
    }
  }
}
