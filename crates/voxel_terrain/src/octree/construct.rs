//! Leaf construction from a density field and bottom-up tree assembly.

use std::collections::HashMap;

use glam::{IVec3, Vec3};
use rayon::prelude::*;

use super::arena::{NodeArena, NodeId};
use super::node::{DrawInfo, OctreeNode};
use super::qef::Qef;
use super::tables::{CHILD_MIN_OFFSETS, CROSSING_STEPS, EDGE_VERTEX_MAP, MAX_CROSSINGS};
use crate::config::QefSettings;
use crate::density::{normal_at, DensitySource};
use crate::error::{TerrainError, TerrainResult};

/// Bitmask of solid corners for the cell at `min` with edge `size`.
pub fn corner_mask<D: DensitySource + ?Sized>(density: &D, min: IVec3, size: i32) -> u8 {
  let mut corners = 0u8;
  for (i, offset) in CHILD_MIN_OFFSETS.iter().enumerate() {
    let p = (min + *offset * size).as_vec3();
    if density.density(p) < 0.0 {
      corners |= 1 << i;
    }
  }
  corners
}

/// Bounded linear search for the point of least |density| on `p0..p1`.
///
/// Evaluates `CROSSING_STEPS + 1` evenly spaced samples; earliest wins ties.
pub fn approximate_zero_crossing<D: DensitySource + ?Sized>(density: &D, p0: Vec3, p1: Vec3) -> Vec3 {
  let mut best = f32::MAX;
  let mut best_t = 0.0;
  for step in 0..=CROSSING_STEPS {
    let t = step as f32 / CROSSING_STEPS as f32;
    let d = density.density(p0.lerp(p1, t)).abs();
    if d < best {
      best = d;
      best_t = t;
    }
  }
  p0.lerp(p1, best_t)
}

/// Draw info for one cell, or `None` when the cell has no sign change.
pub fn construct_leaf<D: DensitySource + ?Sized>(
  density: &D,
  min: IVec3,
  size: i32,
  settings: &QefSettings,
) -> TerrainResult<Option<DrawInfo>> {
  let corners = corner_mask(density, min, size);
  if corners == 0 || corners == u8::MAX {
    return Ok(None);
  }

  let mut qef = Qef::new();
  let mut normal_sum = Vec3::ZERO;
  let mut crossings = 0usize;

  for &[c0, c1] in &EDGE_VERTEX_MAP {
    if crossings == MAX_CROSSINGS {
      break;
    }
    let s0 = (corners >> c0) & 1;
    let s1 = (corners >> c1) & 1;
    if s0 == s1 {
      continue;
    }

    let p0 = (min + CHILD_MIN_OFFSETS[c0] * size).as_vec3();
    let p1 = (min + CHILD_MIN_OFFSETS[c1] * size).as_vec3();
    let p = approximate_zero_crossing(density, p0, p1);
    let n = normal_at(density, p);

    qef.add(p, n);
    normal_sum += n;
    crossings += 1;
  }

  let cell = OctreeNode::internal(min, size);
  let solution = qef.solve(settings);
  let mut position = solution.position;
  if !position.is_finite() || !cell.contains_point(position) {
    position = qef.mass_point();
  }
  if !position.is_finite() {
    return Err(TerrainError::NonFiniteVertex(min));
  }

  Ok(Some(DrawInfo {
    index: None,
    position,
    normal: (normal_sum / crossings as f32).normalize_or_zero(),
    corners,
    qef,
  }))
}

/// Build a leaf for every surface cell of a uniform grid with spacing
/// `leaf_size` covering `min .. min + dims`.
///
/// Cells are evaluated in parallel; the returned ids keep grid order
/// (x slowest, z fastest).
pub fn build_leaves<D: DensitySource + ?Sized>(
  arena: &mut NodeArena,
  density: &D,
  min: IVec3,
  dims: IVec3,
  leaf_size: i32,
  settings: &QefSettings,
) -> TerrainResult<Vec<NodeId>> {
  let step = leaf_size as usize;
  let mut cells = Vec::new();
  for x in (0..dims.x).step_by(step) {
    for y in (0..dims.y).step_by(step) {
      for z in (0..dims.z).step_by(step) {
        cells.push(min + IVec3::new(x, y, z));
      }
    }
  }

  let built = cells
    .par_iter()
    .map(|&cell| construct_leaf(density, cell, leaf_size, settings).map(|draw| (cell, draw)))
    .collect::<TerrainResult<Vec<_>>>()?;

  Ok(
    built
      .into_iter()
      .filter_map(|(cell, draw)| draw.map(|draw| arena.insert(OctreeNode::leaf(cell, leaf_size, draw))))
      .collect(),
  )
}

/// Assemble loose nodes into a tree by repeatedly grouping nodes of half the
/// current parent size under a parent whose origin is aligned to
/// `region_min`. Nodes of any other size pass through to the next round.
///
/// Returns the single remaining node, or `None` for an empty input.
pub fn build_from_leaves(arena: &mut NodeArena, mut nodes: Vec<NodeId>, region_min: IVec3) -> Option<NodeId> {
  let smallest = nodes.iter().filter_map(|id| arena.get(*id)).map(|n| n.size).min()?;
  let mut parent_size = smallest * 2;

  while nodes.len() > 1 && parent_size > 0 {
    let mut next = Vec::with_capacity(nodes.len());
    let mut parents: HashMap<IVec3, NodeId> = HashMap::new();

    for id in nodes {
      let Some((min, size)) = arena.get(id).map(|n| (n.min, n.size)) else {
        continue;
      };
      if size * 2 != parent_size {
        next.push(id);
        continue;
      }

      let parent_min = min - (min - region_min).rem_euclid(IVec3::splat(parent_size));
      let Some(octant) = CHILD_MIN_OFFSETS
        .iter()
        .position(|offset| parent_min + *offset * size == min)
      else {
        next.push(id);
        continue;
      };

      let parent = *parents.entry(parent_min).or_insert_with(|| {
        let parent = arena.insert(OctreeNode::internal(parent_min, parent_size));
        next.push(parent);
        parent
      });
      if let Some(parent) = arena.get_mut(parent) {
        parent.children[octant] = Some(id);
      }
    }

    nodes = next;
    parent_size = parent_size.checked_mul(2).unwrap_or(0);
  }

  nodes.first().copied()
}
