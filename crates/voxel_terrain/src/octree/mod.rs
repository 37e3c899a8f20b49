//! Adaptive octree surface extraction (dual contouring).
//!
//! # Pipeline
//!
//! ```text
//! density ──► build_leaves ──► build_from_leaves ──► simplify ──► contour
//!             one Leaf per      group into parents    collapse     one vertex per
//!             surface cell      bottom-up             by QEF error leaf, quads per
//!                                                                  sign-changing edge
//! ```
//!
//! Trees are stored in a [`NodeArena`]; a tree is never shared, and a
//! rebuilt tree replaces the old one wholesale.
//!
//! # Modules
//!
//! - [`tables`]: corner/edge numbering and contour recursion tables
//! - [`qef`]: least-squares vertex placement
//! - [`construct`]: leaves from density, bottom-up assembly
//! - [`simplify`]: collapse into pseudo nodes
//! - [`contour`]: vertex and index generation
//! - [`seam`]: cross-chunk stitching
//! - [`lod`]: view-dependent skeletons

pub mod arena;
pub mod construct;
pub mod contour;
pub mod lod;
pub mod node;
pub mod qef;
pub mod seam;
pub mod simplify;
pub mod tables;

use glam::{IVec3, Vec3};

pub use arena::{NodeArena, NodeId};
pub use lod::LodRegion;
pub use node::{DrawInfo, NodeKind, OctreeNode};
pub use qef::{Qef, QefSolution};

use crate::config::QefSettings;
use crate::density::DensitySource;
use crate::error::TerrainResult;
use crate::mesh::MeshBuffers;

/// One octree with its node storage.
#[derive(Clone, Debug, Default)]
pub struct Octree {
  arena: NodeArena,
  root: Option<NodeId>,
}

impl Octree {
  pub fn new() -> Self {
    Self::default()
  }

  pub(crate) fn with_root(arena: NodeArena, root: Option<NodeId>) -> Self {
    Self { arena, root }
  }

  /// Assemble loose nodes already stored in `arena` into one tree.
  pub fn from_leaves(mut arena: NodeArena, leaves: Vec<NodeId>, region_min: IVec3) -> Self {
    let root = construct::build_from_leaves(&mut arena, leaves, region_min);
    Self { arena, root }
  }

  /// Uniform-LOD tree over `min .. min + dims` with leaves `2^lod` wide.
  /// A region without sign changes yields an empty tree.
  #[tracing::instrument(level = "debug", skip_all, name = "octree::build", fields(min = %min, lod = lod))]
  pub fn build<D: DensitySource + ?Sized>(
    density: &D,
    min: IVec3,
    dims: IVec3,
    lod: u32,
    settings: &QefSettings,
  ) -> TerrainResult<Self> {
    let mut arena = NodeArena::new();
    let leaves = construct::build_leaves(&mut arena, density, min, dims, 1 << lod, settings)?;
    tracing::trace!(leaves = leaves.len(), "constructed leaves");
    Ok(Self::from_leaves(arena, leaves, min))
  }

  /// Tree refined around `focus`: regions within `radius` use `min_size`
  /// regions of unit cells, farther regions progressively coarser cells.
  #[tracing::instrument(level = "debug", skip_all, name = "octree::build_adaptive")]
  pub fn build_adaptive<D: DensitySource + ?Sized>(
    density: &D,
    root_min: IVec3,
    root_size: i32,
    focus: Vec3,
    radius: f32,
    min_size: i32,
    settings: &QefSettings,
  ) -> TerrainResult<Self> {
    let skeleton = lod::expand_nodes(root_min, root_size, focus, radius, min_size);
    lod::populate_lod(skeleton, density, min_size, settings)
  }

  #[inline]
  pub fn root(&self) -> Option<NodeId> {
    self.root
  }

  #[inline]
  pub fn node(&self, id: NodeId) -> Option<&OctreeNode> {
    self.arena.get(id)
  }

  #[inline]
  pub fn arena(&self) -> &NodeArena {
    &self.arena
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.root.is_none()
  }

  /// Live nodes of every kind.
  #[inline]
  pub fn node_count(&self) -> usize {
    self.arena.len()
  }

  /// Leaf and Pseudo nodes in depth-first child order.
  pub fn leaves(&self) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = self.root.into_iter().collect();
    while let Some(id) = stack.pop() {
      let Some(node) = self.arena.get(id) else {
        continue;
      };
      if node.is_internal() {
        stack.extend(node.children.iter().rev().flatten().copied());
      } else {
        out.push(id);
      }
    }
    out
  }

  pub fn leaf_count(&self) -> usize {
    self.leaves().len()
  }

  /// Collapse mergeable subtrees whose QEF residual is within `threshold`.
  #[tracing::instrument(level = "debug", skip_all, name = "octree::simplify")]
  pub fn simplify(&mut self, threshold: f32, settings: &QefSettings) {
    if let Some(root) = self.root {
      simplify::simplify(&mut self.arena, root, threshold, settings);
    }
  }

  /// Assign vertex indices and generate the triangle list.
  #[tracing::instrument(level = "debug", skip_all, name = "octree::contour")]
  pub fn generate_mesh(&mut self) -> MeshBuffers {
    let mut mesh = MeshBuffers::new();
    let Some(root) = self.root else {
      return mesh;
    };
    contour::generate_vertex_indices(&mut self.arena, root, &mut mesh);
    contour::cell_proc(&self.arena, Some(root), &mut mesh.indices);
    mesh
  }
}
