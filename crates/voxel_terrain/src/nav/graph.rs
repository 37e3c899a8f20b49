//! Global node index and chunk-level graph maintenance.
//!
//! Lock order everywhere: chunk node map, then a node's edge map, then
//! this index. Each lock is taken and released before the next one; none
//! of them are held across another acquisition.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use glam::IVec3;

use super::node::{is_walkable, Direction, NavEdge, NavNode, NodeHash, MATERIAL_GROUND};
use crate::chunk::{Chunk, ChunkMap, NavDirty};
use crate::density::DensitySource;

/// The 26 offsets of a 3x3x3 block minus its center, x slowest.
pub fn reach_offsets() -> impl Iterator<Item = IVec3> {
  (-1..=1)
    .flat_map(|x| (-1..=1).flat_map(move |y| (-1..=1).map(move |z| IVec3::new(x, y, z))))
    .filter(|o| *o != IVec3::ZERO)
}

/// Counts from one chunk's navigation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NavUpdate {
  pub removed: usize,
  pub created: usize,
  pub linked: usize,
}

/// World-wide index of navigation nodes.
#[derive(Debug, Default)]
pub struct NavGraph {
  nodes: RwLock<HashMap<NodeHash, Arc<NavNode>>>,
}

impl NavGraph {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&self, node: Arc<NavNode>) -> Option<Arc<NavNode>> {
    let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
    nodes.insert(node.hash(), node)
  }

  pub fn remove(&self, hash: NodeHash) -> Option<Arc<NavNode>> {
    let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
    nodes.remove(&hash)
  }

  pub fn get(&self, hash: NodeHash) -> Option<Arc<NavNode>> {
    let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
    nodes.get(&hash).cloned()
  }

  pub fn get_at(&self, p: IVec3) -> Option<Arc<NavNode>> {
    self.get(NodeHash::from_position(p))
  }

  pub fn contains(&self, hash: NodeHash) -> bool {
    self.nodes.read().unwrap_or_else(PoisonError::into_inner).contains_key(&hash)
  }

  pub fn len(&self) -> usize {
    self.nodes.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Sorted hashes of every indexed node.
  pub fn hashes(&self) -> Vec<NodeHash> {
    let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
    let mut out: Vec<_> = nodes.keys().copied().collect();
    out.sort_unstable();
    out
  }

  /// Remove a node from its chunk and this index and unlink every edge
  /// touching it.
  ///
  /// The node leaves both indices before its edges are taken, so a linker
  /// that raced past the lookup sees it gone when it re-checks.
  pub fn remove_node(&self, chunk: &Chunk, hash: NodeHash) -> Option<Arc<NavNode>> {
    let local = chunk.remove_nav_node(hash);
    let indexed = self.remove(hash);
    let node = local.or(indexed)?;
    for edge in node.take_edges() {
      if let Some(other) = self.get(edge.other(hash)) {
        other.remove_edge(hash);
      }
    }
    Some(node)
  }

  /// Whether `node` is the instance currently indexed under its hash.
  fn is_current(&self, node: &Arc<NavNode>) -> bool {
    self.get(node.hash()).is_some_and(|n| Arc::ptr_eq(&n, node))
  }

  /// Drop the nodes whose open faces depend on the voxel at `p` (the voxel
  /// itself and its six face neighbours) and mark those positions dirty in
  /// their chunks. Returns how many nodes were removed.
  pub fn invalidate_around(&self, chunks: &ChunkMap, p: IVec3) -> usize {
    let mut removed = 0;
    for q in std::iter::once(p).chain(Direction::ALL.iter().map(|d| p + d.offset())) {
      let Some(chunk) = chunks.get_at(q) else {
        continue;
      };
      if self.remove_node(&chunk, NodeHash::from_position(q)).is_some() {
        removed += 1;
      }
      chunk.mark_nav_dirty(q);
    }
    removed
  }

  /// Take the dirty positions of `chunk` and re-evaluate them.
  pub fn update_chunk<D: DensitySource + ?Sized>(&self, chunk: &Chunk, density: &D) -> NavUpdate {
    self.apply_dirty(chunk, chunk.take_nav_dirty(), density)
  }

  /// Re-evaluate `dirty` positions of `chunk` against `density` and link
  /// newly created nodes into the graph. Existing nodes at those positions
  /// are removed first, so a position either ends with a fresh node or none.
  #[tracing::instrument(level = "debug", skip_all, name = "nav::apply_dirty", fields(chunk = %chunk.key()))]
  pub fn apply_dirty<D: DensitySource + ?Sized>(&self, chunk: &Chunk, dirty: NavDirty, density: &D) -> NavUpdate {
    let mut stats = NavUpdate::default();
    if dirty.is_empty() {
      return stats;
    }

    let positions: Vec<IVec3> = if dirty.full {
      for node in chunk.nav_nodes() {
        if self.remove_node(chunk, node.hash()).is_some() {
          stats.removed += 1;
        }
      }
      let dims = chunk.dims();
      let mut all = Vec::with_capacity((dims.x * dims.y * dims.z) as usize);
      for x in 0..dims.x {
        for y in 0..dims.y {
          for z in 0..dims.z {
            all.push(chunk.offset() + IVec3::new(x, y, z));
          }
        }
      }
      all
    } else {
      let mut some: Vec<IVec3> = dirty.positions.into_iter().filter(|p| chunk.contains_world(*p)).collect();
      some.sort_by_key(|p| p.to_array());
      some
    };

    let mut created = Vec::new();
    for p in positions {
      if self.remove_node(chunk, NodeHash::from_position(p)).is_some() {
        stats.removed += 1;
      }
      let mask = direction_mask(density, p);
      if mask == 0 {
        continue;
      }
      let gravity = chunk.gravity_at(p);
      if !is_walkable(mask, gravity) {
        continue;
      }
      let node = Arc::new(NavNode::new(p, MATERIAL_GROUND, gravity, mask));
      chunk.insert_nav_node(Arc::clone(&node));
      self.insert(Arc::clone(&node));
      created.push(node);
    }
    stats.created = created.len();

    for node in &created {
      stats.linked += self.link_neighbours(chunk, node);
    }

    tracing::trace!(
      removed = stats.removed,
      created = stats.created,
      linked = stats.linked,
      "navigation updated"
    );
    stats
  }

  /// Connect `node` to every existing node in its 26-neighbourhood.
  fn link_neighbours(&self, chunk: &Chunk, node: &Arc<NavNode>) -> usize {
    let mut linked = 0;
    for offset in reach_offsets() {
      let q = node.position() + offset;
      let hash = NodeHash::from_position(q);
      let other = if chunk.contains_world(q) {
        chunk.nav_node(hash)
      } else {
        self.get(hash)
      };
      let Some(other) = other else {
        continue;
      };
      if node.edge_to(hash).is_some() {
        continue;
      }
      let edge = NavEdge::new(node.hash(), hash, offset.as_vec3().length());
      node.add_edge(edge);
      other.add_edge(edge);

      // Either end may have been removed concurrently after the lookup.
      if !self.is_current(node) || !self.is_current(&other) {
        node.remove_edge(hash);
        other.remove_edge(node.hash());
        continue;
      }
      linked += 1;
    }
    linked
  }
}

/// Open-face mask of the voxel at `p`: bit `d` is set when `p` is air and
/// the voxel at `p - d` is solid.
pub fn direction_mask<D: DensitySource + ?Sized>(density: &D, p: IVec3) -> u8 {
  let solid = |q: IVec3| density.density(q.as_vec3()) < 0.0;
  if solid(p) {
    return 0;
  }
  Direction::ALL
    .iter()
    .filter(|d| solid(p - d.offset()))
    .fold(0, |mask, d| mask | d.bit())
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod graph_test;
