use super::*;
use glam::Vec3;

use crate::density::Plane;

const TIMEOUT: Duration = Duration::from_secs(20);

fn small_config() -> TerrainConfig {
  TerrainConfig::new()
    .with_chunk_dims(IVec3::splat(8))
    .with_build_pool_size(2)
    .with_nav_pool_size(2)
}

fn single_voxel(p: Vec3) -> f32 {
  if p.floor().as_ivec3() == IVec3::splat(4) {
    -1.0
  } else {
    1.0
  }
}

#[test]
fn test_invalid_config_rejected() {
  let result = VoxelWorld::new(small_config().with_build_pool_size(0), Plane::new(0.0));
  assert!(matches!(result, Err(TerrainError::InvalidConfig(_))));
}

#[test]
fn test_voxel_access_requires_loaded_chunk() {
  let world = VoxelWorld::new(small_config(), Plane::new(2.5)).expect("world");
  assert!(matches!(world.get_voxel(IVec3::ONE), Err(TerrainError::ChunkNotFound(_))));
  assert!(matches!(world.build(ChunkKey::new(0, 0, 0)), Err(TerrainError::ChunkNotFound(_))));

  world.generate_chunk(ChunkKey::new(0, 0, 0));
  assert_eq!(world.get_voxel(IVec3::new(1, 1, 1)).expect("voxel"), -1.5);
  assert_eq!(world.get_voxel(IVec3::new(1, 5, 1)).expect("voxel"), 2.5);
  assert!(matches!(
    world.set_voxel(IVec3::new(-1, 0, 0), 1.0),
    Err(TerrainError::ChunkNotFound(_))
  ));
}

#[test]
fn test_generate_chunk_is_idempotent() {
  let world = VoxelWorld::new(small_config(), Plane::new(2.5)).expect("world");
  let first = world.generate_chunk(ChunkKey::new(0, 0, 0));
  first.set_voxel(IVec3::ZERO, 7.0);
  let second = world.generate_chunk(ChunkKey::new(0, 0, 0));
  assert!(Arc::ptr_eq(&first, &second));
  assert_eq!(world.get_voxel(IVec3::ZERO).expect("voxel"), 7.0);
}

#[test]
fn test_single_voxel_world_builds_box_and_one_node() {
  let world = VoxelWorld::new(small_config(), single_voxel).expect("world");
  let events = world.events();
  world.generate_chunk(ChunkKey::new(0, 0, 0));
  assert_eq!(world.build(ChunkKey::new(0, 0, 0)).expect("build"), BuildRequest::Dispatched);
  assert!(world.wait_idle_timeout(TIMEOUT));

  let event = events.recv_timeout(TIMEOUT).expect("build event");
  assert_eq!(event.key, ChunkKey::new(0, 0, 0));
  assert_eq!(event.surface.mesh.vertex_count(), 8);
  assert_eq!(event.surface.mesh.triangle_count(), 12);
  assert!(event.surface.seam.is_empty());

  let surface = world.mesh(ChunkKey::new(0, 0, 0)).expect("published");
  assert!(Arc::ptr_eq(&surface, &event.surface));
  assert_eq!(surface.generation, 1);

  assert_eq!(world.graph().len(), 1);
  let node = world.graph().get_at(IVec3::new(4, 5, 4)).expect("node on top");
  assert!(node.has_direction(Direction::Top));
  assert!(node.is_walkable());

  let metrics = world.metrics();
  assert_eq!(metrics.completed, 1);
  assert_eq!(metrics.triangles.last(), Some(&12));
}

#[test]
fn test_digging_the_voxel_clears_mesh_and_graph() {
  let world = VoxelWorld::new(small_config(), single_voxel).expect("world");
  world.generate_chunk(ChunkKey::new(0, 0, 0));
  world.build(ChunkKey::new(0, 0, 0)).expect("build");
  assert!(world.wait_idle_timeout(TIMEOUT));
  assert_eq!(world.graph().len(), 1);

  world.set_voxel(IVec3::splat(4), 1.0).expect("set");
  // The node is gone before the rebuild runs.
  assert!(world.graph().get_at(IVec3::new(4, 5, 4)).is_none());
  assert!(world.wait_idle_timeout(TIMEOUT));

  let surface = world.mesh(ChunkKey::new(0, 0, 0)).expect("published");
  assert!(surface.mesh.is_empty());
  assert_eq!(surface.generation, 2);
  assert!(world.graph().is_empty());
}

#[test]
fn test_boundary_edit_rebuilds_neighbour() {
  let world = VoxelWorld::new(small_config(), Plane::new(2.5)).expect("world");
  for x in 0..2 {
    world.generate_chunk(ChunkKey::new(x, 0, 0));
  }
  world.build_all().expect("build");
  assert!(world.wait_idle_timeout(TIMEOUT));
  let before = world.metrics().completed;

  world.set_voxel(IVec3::new(7, 2, 3), 1.0).expect("set");
  assert!(world.wait_idle_timeout(TIMEOUT));
  assert_eq!(world.metrics().completed, before + 2);
  for x in 0..2 {
    assert_eq!(world.mesh(ChunkKey::new(x, 0, 0)).expect("mesh").generation, 2);
  }
}

#[test]
fn test_seam_appears_once_neighbour_is_published() {
  let world = VoxelWorld::new(small_config(), Plane::new(2.5)).expect("world");
  for x in 0..2 {
    world.generate_chunk(ChunkKey::new(x, 0, 0));
  }
  world.build(ChunkKey::new(1, 0, 0)).expect("build");
  assert!(world.wait_idle_timeout(TIMEOUT));
  world.build(ChunkKey::new(0, 0, 0)).expect("build");
  assert!(world.wait_idle_timeout(TIMEOUT));

  let surface = world.mesh(ChunkKey::new(0, 0, 0)).expect("mesh");
  assert!(!surface.mesh.is_empty());
  assert!(surface.seam.triangle_count() > 0);
  // Seam vertices straddle the shared face at x = 8.
  assert!(surface.seam.vertices.iter().any(|v| v.position.x > 8.0));
  assert!(surface.seam.vertices.iter().any(|v| v.position.x < 8.0));
}

#[test]
fn test_seam_restitched_when_neighbour_publishes_later() {
  let world = VoxelWorld::new(small_config(), Plane::new(2.5)).expect("world");
  for x in 0..2 {
    world.generate_chunk(ChunkKey::new(x, 0, 0));
  }
  world.build(ChunkKey::new(0, 0, 0)).expect("build");
  assert!(world.wait_idle_timeout(TIMEOUT));
  let alone = world.mesh(ChunkKey::new(0, 0, 0)).expect("mesh");
  assert!(alone.seam.is_empty());

  let events = world.events();
  world.build(ChunkKey::new(1, 0, 0)).expect("build");
  assert!(world.wait_idle_timeout(TIMEOUT));

  let stitched = world.mesh(ChunkKey::new(0, 0, 0)).expect("mesh");
  assert!(stitched.seam.triangle_count() > 0);
  assert!(stitched.seam.vertices.iter().any(|v| v.position.x > 8.0));
  // Same tree and mesh, only the seam changed.
  assert!(Arc::ptr_eq(&stitched.octree, &alone.octree));
  assert!(Arc::ptr_eq(&stitched.mesh, &alone.mesh));
  assert_eq!(stitched.generation, 1);

  let received: Vec<BuildEvent> = events.try_iter().collect();
  assert_eq!(received.len(), 2);
  let restitch = received
    .iter()
    .find(|e| e.key == ChunkKey::new(0, 0, 0))
    .expect("re-stitch event");
  assert!(Arc::ptr_eq(&restitch.surface, &stitched));
}

#[test]
fn test_seams_do_not_depend_on_build_order() {
  for _ in 0..4 {
    let world = VoxelWorld::new(small_config().with_build_pool_size(4), Plane::new(2.5)).expect("world");
    for x in 0..2 {
      for z in 0..2 {
        world.generate_chunk(ChunkKey::new(x, 0, z));
      }
    }
    world.build_all().expect("build");
    assert!(world.wait_idle_timeout(TIMEOUT));

    let origin = world.mesh(ChunkKey::new(0, 0, 0)).expect("mesh");
    assert!(origin.seam.triangle_count() > 0);
    for key in [ChunkKey::new(1, 0, 0), ChunkKey::new(0, 0, 1)] {
      assert!(world.mesh(key).expect("mesh").seam.triangle_count() > 0, "{key}");
    }
  }
}

#[test]
fn test_superseded_surfaces_are_released_without_subscribers() {
  let world = VoxelWorld::new(small_config(), Plane::new(2.5)).expect("world");
  world.generate_chunk(ChunkKey::new(0, 0, 0));
  world.build(ChunkKey::new(0, 0, 0)).expect("build");
  assert!(world.wait_idle_timeout(TIMEOUT));
  let first = Arc::downgrade(&world.mesh(ChunkKey::new(0, 0, 0)).expect("mesh"));

  // A subscriber that goes away stops retaining events.
  drop(world.events());
  for _ in 0..5 {
    world.build(ChunkKey::new(0, 0, 0)).expect("build");
    assert!(world.wait_idle_timeout(TIMEOUT));
  }
  assert_eq!(world.mesh(ChunkKey::new(0, 0, 0)).expect("mesh").generation, 6);
  assert!(first.upgrade().is_none());
}

#[test]
fn test_simplification_reduces_flat_ground() {
  let plain = VoxelWorld::new(small_config(), Plane::new(2.5)).expect("world");
  let simplified = VoxelWorld::new(small_config().with_simplify_threshold(0.1), Plane::new(2.5)).expect("world");
  for world in [&plain, &simplified] {
    world.generate_chunk(ChunkKey::new(0, 0, 0));
    world.build(ChunkKey::new(0, 0, 0)).expect("build");
    assert!(world.wait_idle_timeout(TIMEOUT));
  }
  let full = plain.mesh(ChunkKey::new(0, 0, 0)).expect("mesh");
  let reduced = simplified.mesh(ChunkKey::new(0, 0, 0)).expect("mesh");
  assert!(full.mesh.triangle_count() > 0);
  assert!(reduced.mesh.vertex_count() > 0);
  assert!(reduced.mesh.vertex_count() < full.mesh.vertex_count());
}

#[test]
fn test_navigate_delivers_to_actor() {
  let world = VoxelWorld::new(small_config(), Plane::new(2.5)).expect("world");
  for x in 0..2 {
    world.generate_chunk(ChunkKey::new(x, 0, 0));
  }
  world.build_all().expect("build");
  assert!(world.wait_idle_timeout(TIMEOUT));

  let deliveries = world.deliveries();
  let start = IVec3::new(0, 3, 0);
  let goal = IVec3::new(15, 3, 0);
  world.navigate(ActorId(7), start, goal);
  let delivery = deliveries.recv_timeout(TIMEOUT).expect("delivery");
  assert_eq!(delivery.actor, ActorId(7));
  assert_eq!(delivery.path.first(), Some(&start));
  assert_eq!(delivery.path.last(), Some(&goal));
  assert_eq!(delivery.path, world.find_path(start, goal));
}

#[test]
fn test_shutdown_rejects_new_builds() {
  let world = VoxelWorld::new(small_config(), Plane::new(2.5)).expect("world");
  world.generate_chunk(ChunkKey::new(0, 0, 0));
  world.build(ChunkKey::new(0, 0, 0)).expect("build");
  assert!(world.wait_idle_timeout(TIMEOUT));
  let nodes = world.graph().len();
  world.shutdown();
  assert!(matches!(world.build(ChunkKey::new(0, 0, 0)), Err(TerrainError::SchedulerShutdown)));

  // A rejected edit leaves the volume and the graph untouched.
  let surface_voxel = IVec3::new(3, 2, 3);
  let before = world.get_voxel(surface_voxel).expect("voxel");
  assert!(matches!(
    world.set_voxel(surface_voxel, 5.0),
    Err(TerrainError::SchedulerShutdown)
  ));
  assert_eq!(world.get_voxel(surface_voxel).expect("voxel"), before);
  assert!(world.graph().get_at(surface_voxel + IVec3::Y).is_some());
  assert_eq!(world.graph().len(), nodes);
}
