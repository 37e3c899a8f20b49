//! Chunks: the unit of voxel storage and rebuild scheduling.
//!
//! ```text
//!   world voxel p ──div_euclid(dims)──► ChunkKey
//!                 ──rem_euclid(dims)──► chunk-local coordinate
//!
//!   Chunk
//!   ├── VoxelVolume            (exclusive, RwLock inside)
//!   ├── nav nodes              hash -> Arc<NavNode>, shared with NavGraph
//!   ├── building flag          at most one rebuild in flight
//!   ├── nav dirty set          positions to re-evaluate on next rebuild
//!   └── published surface     Arc<ChunkSurface>, replaced by swap
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use glam::{IVec3, Vec3};

use crate::error::{TerrainError, TerrainResult};
use crate::mesh::MeshBuffers;
use crate::nav::{NavNode, NodeHash};
use crate::octree::Octree;
use crate::volume::VoxelVolume;

/// Integer chunk coordinate. World origin of the chunk is `key * dims`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkKey(pub IVec3);

impl ChunkKey {
  pub const fn new(x: i32, y: i32, z: i32) -> Self {
    Self(IVec3::new(x, y, z))
  }
}

impl From<IVec3> for ChunkKey {
  fn from(v: IVec3) -> Self {
    Self(v)
  }
}

impl std::fmt::Display for ChunkKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "({}, {}, {})", self.0.x, self.0.y, self.0.z)
  }
}

// =============================================================================
// Gravity
// =============================================================================

/// Where "down" points for navigation nodes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GravityField {
  /// Same direction everywhere.
  Uniform(Vec3),
  /// Towards a center of gravity (planetoids).
  Point(Vec3),
}

impl Default for GravityField {
  fn default() -> Self {
    GravityField::Uniform(Vec3::NEG_Y)
  }
}

impl GravityField {
  /// Normalized gravity at a world position. Falls back to -Y at the center.
  pub fn gravity_at(&self, p: Vec3) -> Vec3 {
    match *self {
      GravityField::Uniform(dir) => dir.normalize_or(Vec3::NEG_Y),
      GravityField::Point(center) => (center - p).normalize_or(Vec3::NEG_Y),
    }
  }
}

// =============================================================================
// Published surface
// =============================================================================

/// Result of one completed rebuild.
///
/// Readers hold an `Arc` to this and never observe a partially built tree;
/// a rebuild swaps in a new one and the old tree drops with its last reader.
/// Re-stitching a seam publishes a new surface sharing the same tree and
/// mesh.
#[derive(Debug)]
pub struct ChunkSurface {
  pub octree: Arc<Octree>,
  /// Triangles from the chunk's own octree.
  pub mesh: Arc<MeshBuffers>,
  /// Triangles stitching this chunk to its positive-side neighbours.
  pub seam: MeshBuffers,
  /// Per-chunk count of full rebuilds. Seam re-stitches keep it.
  pub generation: u64,
}

impl ChunkSurface {
  /// Same tree and mesh with a replacement seam.
  pub fn with_seam(&self, seam: MeshBuffers) -> Self {
    Self {
      octree: Arc::clone(&self.octree),
      mesh: Arc::clone(&self.mesh),
      seam,
      generation: self.generation,
    }
  }
}

/// Navigation positions awaiting re-evaluation.
#[derive(Debug, Default, Clone)]
pub struct NavDirty {
  /// Re-scan every voxel of the chunk.
  pub full: bool,
  pub positions: HashSet<IVec3>,
}

impl NavDirty {
  pub fn is_empty(&self) -> bool {
    !self.full && self.positions.is_empty()
  }

  fn absorb(&mut self, other: NavDirty) {
    self.full |= other.full;
    self.positions.extend(other.positions);
  }
}

// =============================================================================
// Chunk
// =============================================================================

#[derive(Debug)]
pub struct Chunk {
  key: ChunkKey,
  offset: IVec3,
  volume: VoxelVolume,
  gravity: GravityField,
  nav_nodes: RwLock<HashMap<NodeHash, Arc<NavNode>>>,
  nav_dirty: Mutex<NavDirty>,
  building: AtomicBool,
  surface: RwLock<Option<Arc<ChunkSurface>>>,
  generation: AtomicU64,
}

impl Chunk {
  /// New air-filled chunk. The whole chunk starts nav-dirty.
  pub fn new(key: ChunkKey, dims: IVec3, gravity: GravityField) -> Self {
    Self {
      key,
      offset: key.0 * dims,
      volume: VoxelVolume::new(dims),
      gravity,
      nav_nodes: RwLock::new(HashMap::new()),
      nav_dirty: Mutex::new(NavDirty {
        full: true,
        positions: HashSet::new(),
      }),
      building: AtomicBool::new(false),
      surface: RwLock::new(None),
      generation: AtomicU64::new(0),
    }
  }

  #[inline]
  pub fn key(&self) -> ChunkKey {
    self.key
  }

  /// World-space voxel origin.
  #[inline]
  pub fn offset(&self) -> IVec3 {
    self.offset
  }

  #[inline]
  pub fn dims(&self) -> IVec3 {
    self.volume.dimensions()
  }

  #[inline]
  pub fn volume(&self) -> &VoxelVolume {
    &self.volume
  }

  #[inline]
  pub fn gravity(&self) -> &GravityField {
    &self.gravity
  }

  pub fn gravity_at(&self, p: IVec3) -> Vec3 {
    self.gravity.gravity_at(p.as_vec3())
  }

  pub fn contains_world(&self, p: IVec3) -> bool {
    let local = p - self.offset;
    local.cmpge(IVec3::ZERO).all() && local.cmplt(self.dims()).all()
  }

  #[inline]
  pub fn to_local(&self, p: IVec3) -> IVec3 {
    p - self.offset
  }

  /// Voxel at a chunk-local coordinate.
  #[inline]
  pub fn get_voxel(&self, local: IVec3) -> f32 {
    self.volume.get(local.x, local.y, local.z)
  }

  /// Raw write to a chunk-local coordinate. Does not touch navigation or
  /// request a rebuild; the world facade does both.
  #[inline]
  pub fn set_voxel(&self, local: IVec3, value: f32) {
    self.volume.set(local.x, local.y, local.z, value);
  }

  /// Bounds-checked [`get_voxel`](Self::get_voxel).
  pub fn try_get_voxel(&self, local: IVec3) -> TerrainResult<f32> {
    self.check_local(local)?;
    Ok(self.get_voxel(local))
  }

  /// Bounds-checked [`set_voxel`](Self::set_voxel).
  pub fn try_set_voxel(&self, local: IVec3, value: f32) -> TerrainResult<()> {
    self.check_local(local)?;
    self.set_voxel(local, value);
    Ok(())
  }

  fn check_local(&self, local: IVec3) -> TerrainResult<()> {
    if local.cmpge(IVec3::ZERO).all() && local.cmplt(self.dims()).all() {
      Ok(())
    } else {
      Err(TerrainError::OutOfChunk { key: self.key.0, local })
    }
  }

  #[inline]
  pub fn voxel_world(&self, p: IVec3) -> f32 {
    self.get_voxel(self.to_local(p))
  }

  // ---------------------------------------------------------------------------
  // Navigation nodes
  // ---------------------------------------------------------------------------

  pub fn nav_node(&self, hash: NodeHash) -> Option<Arc<NavNode>> {
    let nodes = self.nav_nodes.read().unwrap_or_else(PoisonError::into_inner);
    nodes.get(&hash).cloned()
  }

  pub fn nav_nodes(&self) -> Vec<Arc<NavNode>> {
    let nodes = self.nav_nodes.read().unwrap_or_else(PoisonError::into_inner);
    nodes.values().cloned().collect()
  }

  pub fn nav_node_count(&self) -> usize {
    self.nav_nodes.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub(crate) fn insert_nav_node(&self, node: Arc<NavNode>) -> Option<Arc<NavNode>> {
    let mut nodes = self.nav_nodes.write().unwrap_or_else(PoisonError::into_inner);
    nodes.insert(node.hash(), node)
  }

  pub(crate) fn remove_nav_node(&self, hash: NodeHash) -> Option<Arc<NavNode>> {
    let mut nodes = self.nav_nodes.write().unwrap_or_else(PoisonError::into_inner);
    nodes.remove(&hash)
  }

  /// Existing node nearest to a world position, by linear scan.
  pub fn nearest_nav_node(&self, p: IVec3) -> Option<Arc<NavNode>> {
    let nodes = self.nav_nodes.read().unwrap_or_else(PoisonError::into_inner);
    nodes
      .values()
      .min_by_key(|n| ((n.position() - p).length_squared(), n.hash()))
      .cloned()
  }

  pub fn mark_nav_dirty(&self, p: IVec3) {
    let mut dirty = self.nav_dirty.lock().unwrap_or_else(PoisonError::into_inner);
    dirty.positions.insert(p);
  }

  pub(crate) fn take_nav_dirty(&self) -> NavDirty {
    std::mem::take(&mut *self.nav_dirty.lock().unwrap_or_else(PoisonError::into_inner))
  }

  /// Put back work taken by a rebuild that was abandoned.
  pub(crate) fn restore_nav_dirty(&self, dirty: NavDirty) {
    self.nav_dirty.lock().unwrap_or_else(PoisonError::into_inner).absorb(dirty);
  }

  pub fn has_nav_dirty(&self) -> bool {
    !self.nav_dirty.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
  }

  // ---------------------------------------------------------------------------
  // Build state
  // ---------------------------------------------------------------------------

  #[inline]
  pub fn is_building(&self) -> bool {
    self.building.load(Ordering::Acquire)
  }

  /// Idle -> Building. Returns false if a rebuild is already in flight.
  #[inline]
  pub fn try_begin_build(&self) -> bool {
    self
      .building
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  /// Building -> Idle.
  #[inline]
  pub fn finish_build(&self) {
    self.building.store(false, Ordering::Release);
  }

  // ---------------------------------------------------------------------------
  // Published surface
  // ---------------------------------------------------------------------------

  pub fn surface(&self) -> Option<Arc<ChunkSurface>> {
    self.surface.read().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub(crate) fn next_generation(&self) -> u64 {
    self.generation.fetch_add(1, Ordering::Relaxed) + 1
  }

  /// Swap in a freshly built surface, returning the previous one.
  pub(crate) fn publish(&self, surface: Arc<ChunkSurface>) -> Option<Arc<ChunkSurface>> {
    let mut slot = self.surface.write().unwrap_or_else(PoisonError::into_inner);
    slot.replace(surface)
  }
}

// =============================================================================
// ChunkMap
// =============================================================================

/// All loaded chunks of a world, keyed by chunk coordinate.
#[derive(Debug)]
pub struct ChunkMap {
  dims: IVec3,
  chunks: RwLock<HashMap<ChunkKey, Arc<Chunk>>>,
}

impl ChunkMap {
  pub fn new(dims: IVec3) -> Self {
    Self {
      dims,
      chunks: RwLock::new(HashMap::new()),
    }
  }

  #[inline]
  pub fn dims(&self) -> IVec3 {
    self.dims
  }

  /// Chunk containing a world voxel.
  #[inline]
  pub fn key_of(&self, p: IVec3) -> ChunkKey {
    ChunkKey(p.div_euclid(self.dims))
  }

  pub fn get(&self, key: ChunkKey) -> Option<Arc<Chunk>> {
    self.chunks.read().unwrap_or_else(PoisonError::into_inner).get(&key).cloned()
  }

  pub fn get_at(&self, p: IVec3) -> Option<Arc<Chunk>> {
    self.get(self.key_of(p))
  }

  pub fn insert(&self, chunk: Arc<Chunk>) -> Option<Arc<Chunk>> {
    let mut chunks = self.chunks.write().unwrap_or_else(PoisonError::into_inner);
    chunks.insert(chunk.key(), chunk)
  }

  /// Insert unless the key is taken. Returns whichever chunk ends up stored.
  pub fn get_or_insert(&self, chunk: Arc<Chunk>) -> Arc<Chunk> {
    let mut chunks = self.chunks.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(chunks.entry(chunk.key()).or_insert(chunk))
  }

  pub fn keys(&self) -> Vec<ChunkKey> {
    let chunks = self.chunks.read().unwrap_or_else(PoisonError::into_inner);
    let mut keys: Vec<_> = chunks.keys().copied().collect();
    keys.sort_by_key(|k| k.0.to_array());
    keys
  }

  pub fn len(&self) -> usize {
    self.chunks.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
#[path = "chunk_test.rs"]
mod chunk_test;
