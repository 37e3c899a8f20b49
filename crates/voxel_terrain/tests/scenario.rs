//! End-to-end terrain scenarios through the public world API.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use glam::{IVec3, Vec3};
use voxel_terrain::{
  ActorId, ChunkKey, Direction, NodeHash, Plane, Sphere, TerrainConfig, Union, VoxelWorld,
};

const TIMEOUT: Duration = Duration::from_secs(30);

fn config() -> TerrainConfig {
  TerrainConfig::new()
    .with_chunk_dims(IVec3::splat(8))
    .with_build_pool_size(4)
    .with_nav_pool_size(4)
}

fn ground_world(chunks_x: i32, chunks_z: i32) -> VoxelWorld {
  let world = VoxelWorld::new(config(), Plane::new(2.5)).expect("world");
  for x in 0..chunks_x {
    for z in 0..chunks_z {
      world.generate_chunk(ChunkKey::new(x, 0, z));
    }
  }
  world.build_all().expect("build");
  assert!(world.wait_idle_timeout(TIMEOUT));
  world
}

/// Every node is indexed both in its chunk and globally, and every edge is
/// mirrored at its other endpoint.
fn assert_graph_consistent(world: &VoxelWorld) {
  let graph = world.graph();
  let mut in_chunks = HashSet::new();
  for key in world.chunks().keys() {
    let chunk = world.chunk(key).expect("chunk");
    for node in chunk.nav_nodes() {
      assert!(chunk.contains_world(node.position()));
      assert!(graph.contains(node.hash()), "{} missing from global index", node.position());
      in_chunks.insert(node.hash());
      for edge in node.edges() {
        let other = graph.get(edge.other(node.hash())).expect("edge target indexed");
        assert!(other.edge_to(node.hash()).is_some(), "one-sided edge at {}", node.position());
      }
    }
  }
  let indexed: HashSet<NodeHash> = graph.hashes().into_iter().collect();
  assert_eq!(indexed, in_chunks);
}

#[test]
fn single_voxel_chunk_matches_reference_counts() {
  let world = VoxelWorld::new(config(), |p: Vec3| -> f32 {
    if p.floor().as_ivec3() == IVec3::splat(4) {
      -1.0
    } else {
      1.0
    }
  })
  .expect("world");
  world.generate_chunk(ChunkKey::new(0, 0, 0));
  world.build(ChunkKey::new(0, 0, 0)).expect("build");
  assert!(world.wait_idle_timeout(TIMEOUT));

  let surface = world.mesh(ChunkKey::new(0, 0, 0)).expect("mesh");
  assert_eq!(surface.mesh.triangle_count(), 12);
  assert_eq!(surface.mesh.vertex_count(), 8);
  for v in &surface.mesh.vertices {
    assert!(v.position.cmpge(Vec3::splat(3.0)).all() && v.position.cmple(Vec3::splat(6.0)).all());
  }

  let nodes = world.graph().hashes();
  assert_eq!(nodes.len(), 1);
  let node = world.graph().get(nodes[0]).expect("node");
  assert_eq!(node.position(), IVec3::new(4, 5, 4));
  assert_eq!(node.directions(), Direction::Top.bit());
}

#[test]
fn removing_solid_voxel_leaves_no_dangling_nodes() {
  let world = ground_world(2, 2);
  assert_graph_consistent(&world);
  let before = world.graph().len();
  assert_eq!(before, 16 * 16);

  // Dig a 2x2 pit straddling all four chunks.
  let pit = [IVec3::new(7, 2, 7), IVec3::new(8, 2, 7), IVec3::new(7, 2, 8), IVec3::new(8, 2, 8)];
  for p in pit {
    world.set_voxel(p, 1.0).expect("dig");
    let above = NodeHash::from_position(p + IVec3::Y);
    assert!(!world.graph().contains(above));
    let chunk = world.chunks().get_at(p).expect("chunk");
    assert!(chunk.nav_node(above).is_none());
  }

  assert!(world.wait_idle_timeout(TIMEOUT));
  assert_graph_consistent(&world);
  for p in pit {
    assert!(world.graph().get_at(p).is_some(), "pit floor node at {p}");
    assert!(world.graph().get_at(p + IVec3::Y).is_none());
  }
  assert_eq!(world.graph().len(), before);
}

#[test]
fn concurrent_paths_stay_identical_during_distant_edits() {
  let world = Arc::new(ground_world(4, 1));
  let start = IVec3::new(0, 3, 0);
  let goal = IVec3::new(7, 3, 6);
  let expected = world.find_path(start, goal);
  assert!(!expected.is_empty());

  let editor = {
    let world = Arc::clone(&world);
    std::thread::spawn(move || {
      for i in 0..40 {
        let p = IVec3::new(24 + i % 8, 2, (i / 8) % 8);
        world.set_voxel(p, if i % 2 == 0 { 1.0 } else { -1.0 }).expect("edit");
      }
    })
  };

  let searchers: Vec<_> = (0..4)
    .map(|_| {
      let world = Arc::clone(&world);
      let expected = expected.clone();
      std::thread::spawn(move || {
        for _ in 0..20 {
          assert_eq!(world.find_path(start, goal), expected);
        }
      })
    })
    .collect();

  editor.join().expect("editor");
  for searcher in searchers {
    searcher.join().expect("searcher");
  }
  assert!(world.wait_idle_timeout(TIMEOUT));
  assert_eq!(world.find_path(start, goal), expected);
  assert_graph_consistent(&world);
}

#[test]
fn navigate_delivers_every_actor() {
  let world = ground_world(2, 1);
  let deliveries = world.deliveries();
  for actor in 0..8u64 {
    world.navigate(ActorId(actor), IVec3::new(0, 3, actor as i32), IVec3::new(15, 3, 7));
  }
  // A query into an unloaded chunk still gets an answer.
  world.navigate(ActorId(99), IVec3::new(0, 3, 0), IVec3::new(100, 3, 0));

  let mut seen = HashSet::new();
  for _ in 0..9 {
    let delivery = deliveries.recv_timeout(TIMEOUT).expect("delivery");
    if delivery.actor == ActorId(99) {
      assert!(delivery.path.is_empty());
    } else {
      assert_eq!(delivery.path.last(), Some(&IVec3::new(15, 3, 7)));
    }
    seen.insert(delivery.actor);
  }
  assert_eq!(seen.len(), 9);
}

#[test]
fn burst_of_edits_coalesces_rebuilds() {
  let world = VoxelWorld::new(
    config().with_build_pool_size(1),
    Union(Plane::new(2.5), Sphere::new(Vec3::new(4.0, 4.0, 4.0), 2.0)),
  )
  .expect("world");
  world.generate_chunk(ChunkKey::new(0, 0, 0));
  world.build(ChunkKey::new(0, 0, 0)).expect("build");

  for x in 1..7 {
    for z in 1..7 {
      world.set_voxel(IVec3::new(x, 5, z), -1.0).expect("edit");
    }
  }
  assert!(world.wait_idle_timeout(TIMEOUT));

  let stats = world.scheduler_stats();
  assert!(stats.dispatched < 36, "dispatched {}", stats.dispatched);
  assert!(stats.coalesced > 0);

  // The last rebuild saw the final volume.
  let surface = world.mesh(ChunkKey::new(0, 0, 0)).expect("mesh");
  assert!(surface.mesh.vertices.iter().any(|v| v.position.y > 5.0));
  assert_eq!(world.metrics().failed, 0);
}
