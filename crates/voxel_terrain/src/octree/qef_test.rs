use super::*;

fn settings() -> QefSettings {
  QefSettings::default()
}

/// Three orthogonal planes meet in exactly one point.
#[test]
fn test_corner_solves_to_intersection() {
  let mut qef = Qef::new();
  qef.add(Vec3::new(2.0, 0.3, 0.7), Vec3::X);
  qef.add(Vec3::new(0.1, 5.0, 0.9), Vec3::Y);
  qef.add(Vec3::new(0.4, 0.2, -1.0), Vec3::Z);

  let solution = qef.solve(&settings());
  assert!((solution.position - Vec3::new(2.0, 5.0, -1.0)).length() < 1e-4, "{:?}", solution);
  assert!(solution.error < 1e-6);
}

/// Coplanar constraints leave two directions free: the solution stays on
/// the plane at the mass point's tangential coordinates.
#[test]
fn test_flat_plane_keeps_mass_point_tangent() {
  let mut qef = Qef::new();
  qef.add(Vec3::new(0.0, 1.0, 0.0), Vec3::Y);
  qef.add(Vec3::new(1.0, 1.0, 0.0), Vec3::Y);
  qef.add(Vec3::new(0.0, 1.0, 1.0), Vec3::Y);
  qef.add(Vec3::new(1.0, 1.0, 1.0), Vec3::Y);

  let solution = qef.solve(&settings());
  assert!((solution.position - Vec3::new(0.5, 1.0, 0.5)).length() < 1e-5);
  assert!(solution.error < 1e-6);
}

/// Two planes at a ridge: the solution lies on both.
#[test]
fn test_tilted_ridge() {
  let n1 = Vec3::new(1.0, 1.0, 0.0).normalize();
  let n2 = Vec3::new(-1.0, 1.0, 0.0).normalize();
  let mut qef = Qef::new();
  qef.add(Vec3::new(1.0, 0.0, 0.5), n1);
  qef.add(Vec3::new(-1.0, 0.0, 0.5), n2);

  let solution = qef.solve(&settings());
  assert!((solution.position - Vec3::new(0.0, 1.0, 0.5)).length() < 1e-4, "{:?}", solution);
}

#[test]
fn test_zero_normals_fall_to_mass_point() {
  let mut qef = Qef::new();
  qef.add(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO);
  qef.add(Vec3::new(3.0, 2.0, 1.0), Vec3::ZERO);

  assert_eq!(qef.mass_point(), Vec3::new(2.0, 2.0, 2.0));
  let solution = qef.solve(&settings());
  assert_eq!(solution.position, Vec3::new(2.0, 2.0, 2.0));
  assert_eq!(solution.error, 0.0);
}

#[test]
fn test_empty_qef() {
  let qef = Qef::new();
  assert!(qef.is_empty());
  assert_eq!(qef.mass_point(), Vec3::ZERO);
  assert_eq!(qef.solve(&settings()).error, 0.0);
}

/// Merging is the same as adding every constraint to one accumulator.
#[test]
fn test_merge_matches_single_accumulator() {
  let points = [
    (Vec3::new(0.5, 0.0, 0.0), Vec3::new(1.0, 0.2, 0.0)),
    (Vec3::new(0.0, 0.5, 0.0), Vec3::new(0.0, 1.0, 0.3)),
    (Vec3::new(0.0, 0.0, 0.5), Vec3::new(0.1, 0.0, 1.0)),
    (Vec3::new(0.5, 0.5, 0.0), Vec3::new(0.7, 0.7, 0.0)),
  ];

  let mut whole = Qef::new();
  let mut left = Qef::new();
  let mut right = Qef::new();
  for (i, (p, n)) in points.iter().enumerate() {
    whole.add(*p, *n);
    if i < 2 {
      left.add(*p, *n);
    } else {
      right.add(*p, *n);
    }
  }
  left.merge(&right);

  assert_eq!(left.count(), whole.count());
  assert!((left.mass_point() - whole.mass_point()).length() < 1e-6);
  let a = left.solve(&settings());
  let b = whole.solve(&settings());
  assert!((a.position - b.position).length() < 1e-5);
  assert!((a.error - b.error).abs() < 1e-5);
}

/// Points off the plane leave a positive residual.
#[test]
fn test_error_grows_with_inconsistency() {
  let mut qef = Qef::new();
  qef.add(Vec3::new(0.0, 0.0, 0.0), Vec3::Y);
  qef.add(Vec3::new(0.0, 1.0, 0.0), Vec3::Y);

  let solution = qef.solve(&settings());
  assert!((solution.position.y - 0.5).abs() < 1e-5);
  assert!((solution.error - 0.5).abs() < 1e-4, "{:?}", solution);
  assert!(qef.error_at(Vec3::new(0.0, 3.0, 0.0)) > solution.error);
}
