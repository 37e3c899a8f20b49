//! Bottom-up collapse of internal nodes into pseudo nodes.

use glam::Vec3;

use super::arena::{NodeArena, NodeId};
use super::node::{DrawInfo, NodeKind};
use super::qef::Qef;
use crate::config::QefSettings;

/// Simplify the subtree at `id` in place.
///
/// An internal node collapses when every present child is a Leaf or Pseudo
/// node and the merged QEF residual is within `threshold`. A threshold of
/// zero never collapses.
pub fn simplify(arena: &mut NodeArena, id: NodeId, threshold: f32, settings: &QefSettings) {
  let Some(node) = arena.get(id) else {
    return;
  };
  if !node.is_internal() {
    return;
  }
  let children = node.children;

  let mut qef = Qef::new();
  let mut signs: [Option<bool>; 8] = [None; 8];
  let mut mid_sign = None;
  let mut normal_sum = Vec3::ZERO;
  let mut merged = 0usize;
  let mut collapsible = true;

  for (i, child) in children.iter().enumerate() {
    let Some(child) = *child else {
      continue;
    };
    simplify(arena, child, threshold, settings);

    match arena.get(child).and_then(|c| if c.is_internal() { None } else { c.draw.as_ref() }) {
      Some(draw) => {
        qef.merge(&draw.qef);
        // Corner 7 - i of child i is the parent's center.
        mid_sign = Some(draw.corner_solid(7 - i));
        signs[i] = Some(draw.corner_solid(i));
        normal_sum += draw.normal;
        merged += 1;
      }
      None => collapsible = false,
    }
  }

  if !collapsible || merged == 0 || threshold <= 0.0 {
    return;
  }

  let solution = qef.solve(settings);
  if !(solution.error <= threshold) {
    return;
  }

  let Some(node) = arena.get(id) else {
    return;
  };
  let mut position = solution.position;
  if !position.is_finite() || !node.contains_point(position) {
    position = qef.mass_point();
  }

  let mut corners = 0u8;
  for (i, sign) in signs.iter().enumerate() {
    if sign.or(mid_sign).unwrap_or(false) {
      corners |= 1 << i;
    }
  }

  for child in children.iter().flatten() {
    arena.remove_subtree(*child);
  }

  if let Some(node) = arena.get_mut(id) {
    node.kind = NodeKind::Pseudo;
    node.children = [None; 8];
    node.draw = Some(DrawInfo {
      index: None,
      position,
      normal: (normal_sum / merged as f32).normalize_or_zero(),
      corners,
      qef,
    });
  }
}
