//! Quadratic error function accumulator and solver.
//!
//! Each surface crossing contributes a plane `n · x = n · p`. The QEF stores
//! the normal equations `AᵀA x = Aᵀb` compactly (6 unique entries of the
//! symmetric `AᵀA`, the vector `Aᵀb`, the scalar `bᵀb`) plus the running sum
//! of points for the mass point.
//!
//! Solving shifts the system to the mass point, diagonalizes `AᵀA` with a few
//! Jacobi sweeps, and applies a truncated pseudo-inverse so flat or
//! edge-like configurations stay near the mass point instead of diverging.

use glam::{DMat3, DVec3, Vec3};

use crate::config::QefSettings;

/// Accumulated plane constraints for one cell.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Qef {
  /// Upper triangle of AᵀA: xx, xy, xz, yy, yz, zz.
  ata: [f32; 6],
  atb: Vec3,
  btb: f32,
  point_sum: Vec3,
  count: u32,
}

/// Position minimizing the QEF and its residual.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QefSolution {
  pub position: Vec3,
  pub error: f32,
}

impl Qef {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a crossing point with its surface normal. The normal is
  /// normalized here; a zero normal only moves the mass point.
  pub fn add(&mut self, point: Vec3, normal: Vec3) {
    let n = normal.normalize_or_zero();
    self.ata[0] += n.x * n.x;
    self.ata[1] += n.x * n.y;
    self.ata[2] += n.x * n.z;
    self.ata[3] += n.y * n.y;
    self.ata[4] += n.y * n.z;
    self.ata[5] += n.z * n.z;

    let dot = n.dot(point);
    self.atb += n * dot;
    self.btb += dot * dot;

    self.point_sum += point;
    self.count += 1;
  }

  /// Fold another cell's constraints into this one.
  pub fn merge(&mut self, other: &Qef) {
    for (a, b) in self.ata.iter_mut().zip(other.ata.iter()) {
      *a += *b;
    }
    self.atb += other.atb;
    self.btb += other.btb;
    self.point_sum += other.point_sum;
    self.count += other.count;
  }

  #[inline]
  pub fn count(&self) -> u32 {
    self.count
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.count == 0
  }

  /// Average of all accumulated points.
  pub fn mass_point(&self) -> Vec3 {
    if self.count == 0 {
      Vec3::ZERO
    } else {
      self.point_sum / self.count as f32
    }
  }

  fn ata_matrix(&self) -> DMat3 {
    let a = self.ata.map(f64::from);
    DMat3::from_cols(
      DVec3::new(a[0], a[1], a[2]),
      DVec3::new(a[1], a[3], a[4]),
      DVec3::new(a[2], a[4], a[5]),
    )
  }

  /// Residual `xᵀAᵀAx − 2xᵀAᵀb + bᵀb`, clamped at zero.
  pub fn error_at(&self, x: Vec3) -> f32 {
    let a = self.ata_matrix();
    let x = x.as_dvec3();
    let err = x.dot(a * x) - 2.0 * x.dot(self.atb.as_dvec3()) + f64::from(self.btb);
    err.max(0.0) as f32
  }

  /// Solve for the position minimizing the summed squared plane distances.
  pub fn solve(&self, settings: &QefSettings) -> QefSolution {
    if self.count == 0 {
      return QefSolution {
        position: Vec3::ZERO,
        error: 0.0,
      };
    }

    let mass_point = self.mass_point().as_dvec3();
    let a = self.ata_matrix();
    let b = self.atb.as_dvec3() - a * mass_point;

    let (eigenvalues, v) = jacobi_eigen(a, settings.sweeps, f64::from(settings.tolerance));
    let pinv = pseudo_inverse(eigenvalues, v, f64::from(settings.pinv_tolerance));
    let x = pinv * b + mass_point;

    let position = x.as_vec3();
    QefSolution {
      position,
      error: self.error_at(position),
    }
  }
}

/// Cyclic Jacobi diagonalization of a symmetric 3x3 matrix.
/// Returns the diagonal (eigenvalues) and the accumulated rotation V with
/// `A = V diag Vᵀ`.
fn jacobi_eigen(a: DMat3, sweeps: u32, tolerance: f64) -> (DVec3, DMat3) {
  // Row-major working copies.
  let mut m = a.transpose().to_cols_array_2d();
  let mut v = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

  for _ in 0..sweeps {
    for (p, q) in [(0usize, 1usize), (0, 2), (1, 2)] {
      rotate(&mut m, &mut v, p, q, tolerance);
    }
  }

  let eigenvalues = DVec3::new(m[0][0], m[1][1], m[2][2]);
  let v = DMat3::from_cols_array_2d(&v).transpose();
  (eigenvalues, v)
}

/// One Jacobi rotation zeroing `m[p][q]`.
fn rotate(m: &mut [[f64; 3]; 3], v: &mut [[f64; 3]; 3], p: usize, q: usize, tolerance: f64) {
  let apq = m[p][q];
  if apq.abs() < tolerance {
    return;
  }
  let app = m[p][p];
  let aqq = m[q][q];

  let theta = (aqq - app) / (2.0 * apq);
  let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
  let c = 1.0 / (t * t + 1.0).sqrt();
  let s = t * c;

  m[p][p] = app - t * apq;
  m[q][q] = aqq + t * apq;
  m[p][q] = 0.0;
  m[q][p] = 0.0;

  let r = 3 - p - q;
  let arp = m[r][p];
  let arq = m[r][q];
  m[r][p] = c * arp - s * arq;
  m[p][r] = m[r][p];
  m[r][q] = s * arp + c * arq;
  m[q][r] = m[r][q];

  for row in v.iter_mut() {
    let vp = row[p];
    let vq = row[q];
    row[p] = c * vp - s * vq;
    row[q] = s * vp + c * vq;
  }
}

/// `V diag(1/σ) Vᵀ`, dropping σ that are tiny or whose inverse is tiny.
fn pseudo_inverse(sigma: DVec3, v: DMat3, tolerance: f64) -> DMat3 {
  let inv = |x: f64| {
    if x.abs() < tolerance || (1.0 / x).abs() < tolerance {
      0.0
    } else {
      1.0 / x
    }
  };
  let d = DMat3::from_diagonal(DVec3::new(inv(sigma.x), inv(sigma.y), inv(sigma.z)));
  v * d * v.transpose()
}

#[cfg(test)]
#[path = "qef_test.rs"]
mod qef_test;
