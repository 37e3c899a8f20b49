use super::*;

#[test]
fn test_default_config_is_valid() {
  let config = TerrainConfig::default();
  assert!(config.validate().is_ok());
  assert_eq!(config.chunk_dims, IVec3::splat(16));
  assert_eq!(config.qef.sweeps, 4);
  assert_eq!(config.max_edge_weight, 1.0);
  assert_eq!(config.build_pool_size, 16);
  assert_eq!(config.nav_pool_size, 32);
}

#[test]
fn test_leaf_size_doubles_per_lod() {
  assert_eq!(TerrainConfig::new().with_lod(0).leaf_size(), 1);
  assert_eq!(TerrainConfig::new().with_lod(1).leaf_size(), 2);
  assert_eq!(TerrainConfig::new().with_lod(3).leaf_size(), 8);
}

/// Tall chunks like 8x128x8 are fine as long as every axis tiles by the leaf.
#[test]
fn test_non_cubic_chunk_accepted() {
  let config = TerrainConfig::new()
    .with_chunk_dims(IVec3::new(8, 128, 8))
    .with_lod(2);
  assert!(config.validate().is_ok());
}

#[test]
fn test_chunk_not_multiple_of_leaf_rejected() {
  let config = TerrainConfig::new()
    .with_chunk_dims(IVec3::new(12, 16, 16))
    .with_lod(3);
  assert!(matches!(config.validate(), Err(TerrainError::InvalidConfig(_))));
}

#[test]
fn test_zero_pool_rejected() {
  let config = TerrainConfig::new().with_build_pool_size(0);
  assert!(config.validate().is_err());

  let config = TerrainConfig::new().with_nav_pool_size(0);
  assert!(config.validate().is_err());
}

#[test]
fn test_bad_thresholds_rejected() {
  assert!(TerrainConfig::new().with_simplify_threshold(-1.0).validate().is_err());
  assert!(TerrainConfig::new().with_simplify_threshold(f32::NAN).validate().is_err());
  assert!(TerrainConfig::new().with_max_edge_weight(f32::INFINITY).validate().is_err());
  assert!(TerrainConfig::new().with_lod(MAX_LOD + 1).validate().is_err());
}
