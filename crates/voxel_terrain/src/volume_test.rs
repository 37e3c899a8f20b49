use std::sync::Arc;

use rand::Rng;

use super::*;

#[test]
fn test_new_volume_is_air() {
  let volume = VoxelVolume::new(IVec3::new(8, 128, 8));
  assert_eq!(volume.len(), 8 * 128 * 8);
  assert_eq!(volume.solid_count(), 0);
  assert_eq!(volume.get(3, 100, 7), 1.0);
}

#[test]
fn test_index_layout() {
  let volume = VoxelVolume::new(IVec3::new(8, 128, 8));
  assert_eq!(volume.index(0, 0, 0), 0);
  assert_eq!(volume.index(1, 0, 0), 1);
  assert_eq!(volume.index(0, 1, 0), 8);
  assert_eq!(volume.index(0, 0, 1), 8 * 128);
  assert_eq!(volume.index(7, 127, 7), volume.len() - 1);
}

#[test]
fn test_coordinates_wrap_modulo_dims() {
  let volume = VoxelVolume::new(IVec3::splat(8));
  volume.set(9, -1, 16, -3.0);
  assert_eq!(volume.get(1, 7, 0), -3.0);
}

/// get after set returns the stored value for random in-range coordinates.
#[test]
fn test_random_round_trip() {
  let mut rng = rand::rng();
  let volume = VoxelVolume::new(IVec3::new(16, 32, 16));

  for _ in 0..500 {
    let x = rng.random_range(0..16);
    let y = rng.random_range(0..32);
    let z = rng.random_range(0..16);
    let v: f32 = rng.random_range(-10.0..10.0);
    volume.set(x, y, z, v);
    assert_eq!(volume.get(x, y, z), v);
  }
}

#[test]
fn test_fill_with_local_coords() {
  let volume = VoxelVolume::new(IVec3::splat(4));
  volume.fill_with(|p| if p.y < 2 { -1.0 } else { 1.0 });
  assert_eq!(volume.solid_count(), 4 * 4 * 2);
  assert!(volume.is_solid(3, 1, 3));
  assert!(!volume.is_solid(3, 2, 3));

  let snapshot = volume.snapshot();
  assert_eq!(snapshot[volume.index(0, 0, 0)], -1.0);
}

#[test]
fn test_concurrent_writers_disjoint_rows() {
  let volume = Arc::new(VoxelVolume::new(IVec3::splat(8)));
  let handles: Vec<_> = (0..8)
    .map(|z| {
      let volume = Arc::clone(&volume);
      std::thread::spawn(move || {
        for y in 0..8 {
          for x in 0..8 {
            volume.set(x, y, z, -(z as f32) - 1.0);
          }
        }
      })
    })
    .collect();
  for handle in handles {
    handle.join().unwrap();
  }
  for z in 0..8 {
    assert_eq!(volume.get(5, 5, z), -(z as f32) - 1.0);
  }
}
