//! Navigation nodes and edges.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{PoisonError, RwLock};

use glam::{IVec3, Vec3};

/// Angular tolerance for walkable faces: `|1 - dot(-face, gravity)|`.
pub const WALKABLE_TOLERANCE: f32 = 0.5;

/// Material tag for nodes standing on generated terrain.
pub const MATERIAL_GROUND: u8 = 1;

const HASH_BITS: u32 = 21;
const HASH_MASK: u64 = (1 << HASH_BITS) - 1;

/// Spatial hash of an integer voxel position (21 bits per axis).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHash(pub u64);

impl NodeHash {
  pub fn from_position(p: IVec3) -> Self {
    let x = (p.x as u64) & HASH_MASK;
    let y = (p.y as u64) & HASH_MASK;
    let z = (p.z as u64) & HASH_MASK;
    Self((x << (2 * HASH_BITS)) | (y << HASH_BITS) | z)
  }

  pub fn position(self) -> IVec3 {
    let unpack = |v: u64| {
      let v = (v & HASH_MASK) as i32;
      // Sign-extend from 21 bits.
      (v << (32 - HASH_BITS)) >> (32 - HASH_BITS)
    };
    IVec3::new(
      unpack(self.0 >> (2 * HASH_BITS)),
      unpack(self.0 >> HASH_BITS),
      unpack(self.0),
    )
  }
}

/// Axis directions of the six voxel faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
  Top = 0,
  Bottom = 1,
  West = 2,
  East = 3,
  North = 4,
  South = 5,
}

impl Direction {
  pub const ALL: [Direction; 6] = [
    Direction::Top,
    Direction::Bottom,
    Direction::West,
    Direction::East,
    Direction::North,
    Direction::South,
  ];

  #[inline]
  pub const fn bit(self) -> u8 {
    1 << self as u8
  }

  pub const fn offset(self) -> IVec3 {
    match self {
      Direction::Top => IVec3::new(0, 1, 0),
      Direction::Bottom => IVec3::new(0, -1, 0),
      Direction::West => IVec3::new(-1, 0, 0),
      Direction::East => IVec3::new(1, 0, 0),
      Direction::North => IVec3::new(0, 0, 1),
      Direction::South => IVec3::new(0, 0, -1),
    }
  }
}

/// Whether any open face in `mask` points against gravity closely enough
/// to stand on.
pub fn is_walkable(mask: u8, gravity: Vec3) -> bool {
  let gravity = gravity.normalize_or_zero();
  Direction::ALL.iter().any(|d| {
    mask & d.bit() != 0 && (1.0 - (-d.offset().as_vec3()).dot(gravity)).abs() < WALKABLE_TOLERANCE
  })
}

/// Undirected traversal edge. Both endpoints store an equal copy.
#[derive(Clone, Copy, Debug)]
pub struct NavEdge {
  a: NodeHash,
  b: NodeHash,
  cost: f32,
}

impl NavEdge {
  pub fn new(a: NodeHash, b: NodeHash, cost: f32) -> Self {
    Self { a, b, cost }
  }

  #[inline]
  pub fn cost(&self) -> f32 {
    self.cost
  }

  #[inline]
  pub fn endpoints(&self) -> (NodeHash, NodeHash) {
    (self.a.min(self.b), self.a.max(self.b))
  }

  /// The endpoint that is not `from`.
  #[inline]
  pub fn other(&self, from: NodeHash) -> NodeHash {
    if self.a == from {
      self.b
    } else {
      self.a
    }
  }
}

impl PartialEq for NavEdge {
  fn eq(&self, other: &Self) -> bool {
    self.endpoints() == other.endpoints()
  }
}

impl Eq for NavEdge {}

impl std::hash::Hash for NavEdge {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    self.endpoints().hash(state);
  }
}

/// Walkable surface point above (in gravity terms) a solid voxel face.
#[derive(Debug)]
pub struct NavNode {
  position: IVec3,
  hash: NodeHash,
  material: u8,
  gravity: Vec3,
  directions: AtomicU8,
  edges: RwLock<HashMap<NodeHash, NavEdge>>,
}

impl NavNode {
  pub fn new(position: IVec3, material: u8, gravity: Vec3, directions: u8) -> Self {
    Self {
      position,
      hash: NodeHash::from_position(position),
      material,
      gravity,
      directions: AtomicU8::new(directions),
      edges: RwLock::new(HashMap::new()),
    }
  }

  #[inline]
  pub fn position(&self) -> IVec3 {
    self.position
  }

  #[inline]
  pub fn hash(&self) -> NodeHash {
    self.hash
  }

  #[inline]
  pub fn material(&self) -> u8 {
    self.material
  }

  #[inline]
  pub fn gravity(&self) -> Vec3 {
    self.gravity
  }

  #[inline]
  pub fn directions(&self) -> u8 {
    self.directions.load(Ordering::Acquire)
  }

  pub fn set_directions(&self, mask: u8) {
    self.directions.store(mask, Ordering::Release);
  }

  #[inline]
  pub fn has_direction(&self, dir: Direction) -> bool {
    self.directions() & dir.bit() != 0
  }

  pub fn is_walkable(&self) -> bool {
    is_walkable(self.directions(), self.gravity)
  }

  pub fn add_edge(&self, edge: NavEdge) {
    let other = edge.other(self.hash);
    let mut edges = self.edges.write().unwrap_or_else(PoisonError::into_inner);
    edges.insert(other, edge);
  }

  pub fn remove_edge(&self, other: NodeHash) -> Option<NavEdge> {
    let mut edges = self.edges.write().unwrap_or_else(PoisonError::into_inner);
    edges.remove(&other)
  }

  pub fn edge_to(&self, other: NodeHash) -> Option<NavEdge> {
    let edges = self.edges.read().unwrap_or_else(PoisonError::into_inner);
    edges.get(&other).copied()
  }

  /// Snapshot of all edges, ordered by neighbour hash.
  pub fn edges(&self) -> Vec<NavEdge> {
    let edges = self.edges.read().unwrap_or_else(PoisonError::into_inner);
    let mut out: Vec<NavEdge> = edges.values().copied().collect();
    out.sort_by_key(|e| e.other(self.hash));
    out
  }

  pub fn edge_count(&self) -> usize {
    self.edges.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  /// Drop every edge, returning them so the far ends can be unlinked.
  pub(crate) fn take_edges(&self) -> Vec<NavEdge> {
    let mut edges = self.edges.write().unwrap_or_else(PoisonError::into_inner);
    edges.drain().map(|(_, e)| e).collect()
  }
}
