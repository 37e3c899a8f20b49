//! Integer grid traversal between two cells (Amanatides & Woo).

use glam::{IVec3, Vec3};

/// Hard cap on traversal length.
pub const MAX_RAY_STEPS: usize = 32_000;

/// Cells visited by a straight segment from the center of `from` to the
/// center of `to`, both endpoints included. Face-adjacent steps only.
#[derive(Clone, Debug)]
pub struct GridRay {
  cell: IVec3,
  end: IVec3,
  step: IVec3,
  t_max: Vec3,
  t_delta: Vec3,
  steps: usize,
  done: bool,
}

impl GridRay {
  pub fn new(from: IVec3, to: IVec3) -> Self {
    let delta = (to - from).as_vec3();
    let step = (to - from).signum();
    // Starting at a cell center, the first boundary is half a cell away.
    let axis = |d: f32| {
      if d == 0.0 {
        (f32::INFINITY, f32::INFINITY)
      } else {
        let inv = 1.0 / d.abs();
        (0.5 * inv, inv)
      }
    };
    let (tx, dx) = axis(delta.x);
    let (ty, dy) = axis(delta.y);
    let (tz, dz) = axis(delta.z);
    Self {
      cell: from,
      end: to,
      step,
      t_max: Vec3::new(tx, ty, tz),
      t_delta: Vec3::new(dx, dy, dz),
      steps: 0,
      done: false,
    }
  }
}

impl Iterator for GridRay {
  type Item = IVec3;

  fn next(&mut self) -> Option<IVec3> {
    if self.done {
      return None;
    }
    let current = self.cell;
    self.steps += 1;
    if current == self.end || self.steps >= MAX_RAY_STEPS {
      self.done = true;
      return Some(current);
    }

    if self.t_max.x <= self.t_max.y && self.t_max.x <= self.t_max.z {
      self.cell.x += self.step.x;
      self.t_max.x += self.t_delta.x;
    } else if self.t_max.y <= self.t_max.z {
      self.cell.y += self.step.y;
      self.t_max.y += self.t_delta.y;
    } else {
      self.cell.z += self.step.z;
      self.t_max.z += self.t_delta.z;
    }
    Some(current)
  }
}
