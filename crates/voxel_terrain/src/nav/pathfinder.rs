//! Weighted A* over the navigation graph.
//!
//! Start and goal resolve to an exact node when one exists at the given
//! position, otherwise to the nearest node of the chunk containing it.
//! Before searching, every node of the chunks crossed by the straight line
//! from start chunk to goal chunk is copied into a local cache so most
//! lookups avoid the global index lock.
//!
//! The heuristic scales Manhattan distance by
//! `1 + (k * (1 - d / max_d) - k)^2` with `k = sqrt(max_edge_weight)`.
//! For `max_edge_weight > 1` this can overestimate, so the returned path is
//! shortest under the weighted search, not necessarily under raw edge cost.
//!
//! Searches are deterministic for a fixed graph: edges are expanded in hash
//! order and open-set ties break on node hash.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use glam::IVec3;

use super::graph::NavGraph;
use super::node::{NavNode, NodeHash};
use super::raycast::GridRay;
use crate::chunk::ChunkMap;

/// Open-set entry, reversed so `BinaryHeap` pops the smallest `f`.
struct OpenEntry {
  f: f32,
  hash: NodeHash,
}

impl PartialEq for OpenEntry {
  fn eq(&self, other: &Self) -> bool {
    self.f.total_cmp(&other.f) == Ordering::Equal && self.hash == other.hash
  }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for OpenEntry {
  fn cmp(&self, other: &Self) -> Ordering {
    other.f.total_cmp(&self.f).then_with(|| other.hash.cmp(&self.hash))
  }
}

/// Heuristic weight for a node `d` away from the goal on a query whose
/// start was `max_d` away.
pub fn heuristic_weight(d: f32, max_d: f32, max_edge_weight: f32) -> f32 {
  if max_d <= 0.0 {
    return 1.0;
  }
  let k = max_edge_weight.max(0.0).sqrt();
  let s = k * (1.0 - d / max_d) - k;
  1.0 + s * s
}

#[inline]
fn manhattan(a: IVec3, b: IVec3) -> f32 {
  (a - b).abs().element_sum() as f32
}

/// Query handle over a world's chunks and global node index.
#[derive(Clone, Debug)]
pub struct Pathfinder {
  chunks: Arc<ChunkMap>,
  graph: Arc<NavGraph>,
  max_edge_weight: f32,
}

impl Pathfinder {
  pub fn new(chunks: Arc<ChunkMap>, graph: Arc<NavGraph>, max_edge_weight: f32) -> Self {
    Self {
      chunks,
      graph,
      max_edge_weight,
    }
  }

  #[inline]
  pub fn max_edge_weight(&self) -> f32 {
    self.max_edge_weight
  }

  /// Exact node at `p`, else the nearest node in `p`'s chunk.
  pub fn resolve(&self, p: IVec3) -> Option<Arc<NavNode>> {
    let hash = NodeHash::from_position(p);
    match self.chunks.get_at(p) {
      Some(chunk) => chunk.nav_node(hash).or_else(|| chunk.nearest_nav_node(p)),
      None => self.graph.get(hash),
    }
  }

  /// Node positions from start to goal inclusive. Empty when either end
  /// has no node nearby or the goal is unreachable.
  #[tracing::instrument(level = "debug", skip(self), name = "nav::find_path")]
  pub fn find_path(&self, start: IVec3, goal: IVec3) -> Vec<IVec3> {
    let (Some(start), Some(goal)) = (self.resolve(start), self.resolve(goal)) else {
      tracing::debug!("start or goal has no navigation node");
      return Vec::new();
    };
    if start.hash() == goal.hash() {
      return vec![start.position()];
    }

    let cache = self.preload(start.position(), goal.position());
    let lookup = |hash: NodeHash| cache.get(&hash).cloned().or_else(|| self.graph.get(hash));

    let goal_pos = goal.position();
    let max_d = manhattan(start.position(), goal_pos);
    let h = |p: IVec3| {
      let d = manhattan(p, goal_pos);
      heuristic_weight(d, max_d, self.max_edge_weight) * d
    };

    let mut g_score: HashMap<NodeHash, f32> = HashMap::new();
    let mut came_from: HashMap<NodeHash, NodeHash> = HashMap::new();
    let mut closed: HashSet<NodeHash> = HashSet::new();
    let mut open = BinaryHeap::new();

    g_score.insert(start.hash(), 0.0);
    open.push(OpenEntry {
      f: h(start.position()),
      hash: start.hash(),
    });

    while let Some(OpenEntry { hash: current, .. }) = open.pop() {
      if current == goal.hash() {
        let path = reconstruct(&came_from, start.hash(), current);
        tracing::debug!(len = path.len(), expanded = closed.len(), "path found");
        return path;
      }
      if !closed.insert(current) {
        continue;
      }
      let Some(node) = lookup(current) else {
        continue;
      };
      let current_g = g_score.get(&current).copied().unwrap_or(f32::INFINITY);

      for edge in node.edges() {
        let neighbour = edge.other(current);
        if closed.contains(&neighbour) {
          continue;
        }
        let Some(next) = lookup(neighbour) else {
          continue;
        };
        if !next.is_walkable() {
          continue;
        }
        let tentative = current_g + edge.cost();
        if tentative < g_score.get(&neighbour).copied().unwrap_or(f32::INFINITY) {
          g_score.insert(neighbour, tentative);
          came_from.insert(neighbour, current);
          open.push(OpenEntry {
            f: tentative + h(next.position()),
            hash: neighbour,
          });
        }
      }
    }

    tracing::debug!(expanded = closed.len(), "goal unreachable");
    Vec::new()
  }

  /// Nodes of every chunk on the grid line between the two chunks.
  fn preload(&self, start: IVec3, goal: IVec3) -> HashMap<NodeHash, Arc<NavNode>> {
    let mut cache = HashMap::new();
    let from = self.chunks.key_of(start).0;
    let to = self.chunks.key_of(goal).0;
    for key in GridRay::new(from, to) {
      if let Some(chunk) = self.chunks.get(key.into()) {
        cache.extend(chunk.nav_nodes().into_iter().map(|n| (n.hash(), n)));
      }
    }
    cache
  }
}

fn reconstruct(came_from: &HashMap<NodeHash, NodeHash>, start: NodeHash, goal: NodeHash) -> Vec<IVec3> {
  let mut path = vec![goal.position()];
  let mut current = goal;
  while current != start {
    match came_from.get(&current) {
      Some(&prev) => {
        path.push(prev.position());
        current = prev;
      }
      None => break,
    }
  }
  path.reverse();
  path
}

#[cfg(test)]
#[path = "pathfinder_test.rs"]
mod pathfinder_test;
