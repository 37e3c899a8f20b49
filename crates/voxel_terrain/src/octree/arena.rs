//! Slot arena with generational ids.
//!
//! Octree nodes live in a `Vec` and refer to their children by [`NodeId`].
//! Removed slots go on a free list; the generation bump makes stale ids
//! resolve to `None` instead of aliasing whatever reuses the slot.

use super::node::OctreeNode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
  index: u32,
  generation: u32,
}

impl NodeId {
  #[inline]
  pub fn index(self) -> usize {
    self.index as usize
  }
}

#[derive(Clone, Debug)]
struct Slot {
  generation: u32,
  node: Option<OctreeNode>,
}

#[derive(Clone, Debug, Default)]
pub struct NodeArena {
  slots: Vec<Slot>,
  free: Vec<u32>,
  live: usize,
}

impl NodeArena {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, node: OctreeNode) -> NodeId {
    self.live += 1;
    if let Some(index) = self.free.pop() {
      let slot = &mut self.slots[index as usize];
      slot.node = Some(node);
      return NodeId {
        index,
        generation: slot.generation,
      };
    }
    let index = self.slots.len() as u32;
    self.slots.push(Slot {
      generation: 0,
      node: Some(node),
    });
    NodeId {
      index,
      generation: 0,
    }
  }

  #[inline]
  pub fn get(&self, id: NodeId) -> Option<&OctreeNode> {
    self
      .slots
      .get(id.index())
      .filter(|slot| slot.generation == id.generation)
      .and_then(|slot| slot.node.as_ref())
  }

  #[inline]
  pub fn get_mut(&mut self, id: NodeId) -> Option<&mut OctreeNode> {
    self
      .slots
      .get_mut(id.index())
      .filter(|slot| slot.generation == id.generation)
      .and_then(|slot| slot.node.as_mut())
  }

  /// Free a single slot. Children are not touched.
  pub fn remove(&mut self, id: NodeId) -> Option<OctreeNode> {
    let slot = self.slots.get_mut(id.index())?;
    if slot.generation != id.generation {
      return None;
    }
    let node = slot.node.take()?;
    slot.generation = slot.generation.wrapping_add(1);
    self.free.push(id.index);
    self.live -= 1;
    Some(node)
  }

  /// Free a node and everything below it.
  pub fn remove_subtree(&mut self, id: NodeId) {
    let mut stack = vec![id];
    while let Some(id) = stack.pop() {
      if let Some(node) = self.remove(id) {
        stack.extend(node.children.iter().flatten().copied());
      }
    }
  }

  /// Number of live nodes.
  #[inline]
  pub fn len(&self) -> usize {
    self.live
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.live == 0
  }
}
