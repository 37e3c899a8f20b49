//! View-dependent LOD: a skeleton tree refined around a focus sphere.
//!
//! `expand_nodes` splits every node whose cube touches the sphere until it
//! reaches `min_size`; everything else stays coarse. Each terminal node of
//! the skeleton is a [`LodRegion`] meshed with a constant cell count, so a
//! region twice as large uses cells twice as large.

use glam::{IVec3, Vec3};

use super::arena::{NodeArena, NodeId};
use super::construct::build_leaves;
use super::node::OctreeNode;
use super::tables::CHILD_MIN_OFFSETS;
use super::Octree;
use crate::config::QefSettings;
use crate::density::DensitySource;
use crate::error::TerrainResult;

/// Terminal region of a LOD skeleton.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LodRegion {
  pub min: IVec3,
  pub size: i32,
  /// `log2(size / min_size)`; leaves of this region are `2^lod` wide.
  pub lod: u32,
}

/// Closest-point test between an axis-aligned cube and a sphere.
pub fn cube_intersects_sphere(min: IVec3, size: i32, center: Vec3, radius: f32) -> bool {
  let lo = min.as_vec3();
  let hi = lo + Vec3::splat(size as f32);
  let closest = center.clamp(lo, hi);
  closest.distance_squared(center) <= radius * radius
}

/// Internal-node skeleton for the cube `root_min .. root_min + root_size`.
/// `root_size` must be `min_size` times a power of two.
pub fn expand_nodes(root_min: IVec3, root_size: i32, focus: Vec3, radius: f32, min_size: i32) -> Octree {
  let mut arena = NodeArena::new();
  let root = arena.insert(OctreeNode::internal(root_min, root_size));
  let mut stack = vec![root];

  while let Some(id) = stack.pop() {
    let Some((min, size)) = arena.get(id).map(|n| (n.min, n.size)) else {
      continue;
    };
    if size <= min_size || !cube_intersects_sphere(min, size, focus, radius) {
      continue;
    }
    let child_size = size / 2;
    for (octant, offset) in CHILD_MIN_OFFSETS.iter().enumerate() {
      let child = arena.insert(OctreeNode::internal(min + *offset * child_size, child_size));
      if let Some(node) = arena.get_mut(id) {
        node.children[octant] = Some(child);
      }
      stack.push(child);
    }
  }

  Octree::with_root(arena, Some(root))
}

/// Terminal skeleton nodes with their LOD, in depth-first order.
pub fn find_lod_regions(skeleton: &Octree, min_size: i32) -> Vec<LodRegion> {
  terminal_nodes(skeleton)
    .into_iter()
    .filter_map(|id| skeleton.node(id))
    .map(|node| LodRegion {
      min: node.min,
      size: node.size,
      lod: (node.size / min_size.max(1)).max(1).ilog2(),
    })
    .collect()
}

fn terminal_nodes(skeleton: &Octree) -> Vec<NodeId> {
  let mut out = Vec::new();
  let mut stack: Vec<NodeId> = skeleton.root().into_iter().collect();
  while let Some(id) = stack.pop() {
    let Some(node) = skeleton.node(id) else {
      continue;
    };
    if node.is_internal() && node.child_count() == 0 {
      out.push(id);
    } else {
      stack.extend(node.children.iter().rev().flatten().copied());
    }
  }
  out
}

/// Fill every terminal region of a skeleton with leaves built at the
/// region's LOD, then drop branches that ended up without geometry.
pub fn populate_lod<D: DensitySource + ?Sized>(
  mut skeleton: Octree,
  density: &D,
  min_size: i32,
  settings: &QefSettings,
) -> TerrainResult<Octree> {
  let terminals = terminal_nodes(&skeleton);
  for terminal in terminals {
    let Some((min, size)) = skeleton.node(terminal).map(|n| (n.min, n.size)) else {
      continue;
    };
    let lod = (size / min_size.max(1)).max(1).ilog2();
    let leaf_size = 1 << lod;
    let leaves = build_leaves(
      &mut skeleton.arena,
      density,
      min,
      IVec3::splat(size),
      leaf_size,
      settings,
    )?;
    if leaf_size == size {
      // Single-cell region: the terminal itself becomes the leaf.
      for leaf in leaves {
        let Some(built) = skeleton.arena.remove(leaf) else {
          continue;
        };
        if let Some(node) = skeleton.arena.get_mut(terminal) {
          node.kind = built.kind;
          node.draw = built.draw;
        }
      }
      continue;
    }
    for leaf in leaves {
      insert_leaf(&mut skeleton.arena, terminal, leaf);
    }
  }

  if let Some(root) = skeleton.root {
    if prune_empty(&mut skeleton.arena, root) {
      skeleton.root = None;
    }
  }
  Ok(skeleton)
}

/// Hang `leaf` below `parent`, creating internal nodes down to its size.
fn insert_leaf(arena: &mut NodeArena, parent: NodeId, leaf: NodeId) {
  let Some((leaf_min, leaf_size)) = arena.get(leaf).map(|n| (n.min, n.size)) else {
    return;
  };
  let mut current = parent;
  loop {
    let Some((min, size, children)) = arena.get(current).map(|n| (n.min, n.size, n.children)) else {
      return;
    };
    let child_size = size / 2;
    if child_size < leaf_size {
      return;
    }
    let offset = (leaf_min - min) / child_size;
    let octant = ((offset.x << 2) | (offset.y << 1) | offset.z) as usize;
    if octant >= 8 {
      return;
    }

    if child_size == leaf_size {
      if let Some(node) = arena.get_mut(current) {
        node.children[octant] = Some(leaf);
      }
      return;
    }

    current = match children[octant] {
      Some(child) => child,
      None => {
        let child = arena.insert(OctreeNode::internal(min + CHILD_MIN_OFFSETS[octant] * child_size, child_size));
        if let Some(node) = arena.get_mut(current) {
          node.children[octant] = Some(child);
        }
        child
      }
    };
  }
}

/// Remove internal nodes without any leaf below them. Returns true when
/// `id` itself was removed.
fn prune_empty(arena: &mut NodeArena, id: NodeId) -> bool {
  let Some(node) = arena.get(id) else {
    return true;
  };
  if !node.is_internal() {
    return false;
  }
  let children = node.children;
  let mut remaining = 0;
  for (octant, child) in children.iter().enumerate() {
    let Some(child) = *child else {
      continue;
    };
    if prune_empty(arena, child) {
      if let Some(node) = arena.get_mut(id) {
        node.children[octant] = None;
      }
    } else {
      remaining += 1;
    }
  }
  if remaining == 0 {
    arena.remove(id);
    return true;
  }
  false
}
