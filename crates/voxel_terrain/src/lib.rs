//! voxel_terrain - chunked voxel terrain with dual contouring and navigation
//!
//! Chunks hold dense signed-density volumes (negative is solid). Each
//! rebuild turns a chunk into an adaptive octree, contours it into a
//! triangle mesh, stitches seams against neighbouring chunks and refreshes
//! the walkable-surface graph used for pathfinding.
//!
//! # Features
//!
//! - **Dual contouring**: QEF-placed vertices, octree simplification,
//!   cross-chunk seams and view-dependent LOD skeletons
//! - **Navigation**: per-voxel walkable nodes under uniform or point
//!   gravity, weighted A* with asynchronous delivery
//! - **Scheduling**: deduplicated rebuild queue over a worker pool, at most
//!   one rebuild in flight per chunk, publish-by-swap surfaces
//!
//! # Example
//!
//! ```ignore
//! use voxel_terrain::{ChunkKey, Plane, TerrainConfig, VoxelWorld};
//!
//! let world = VoxelWorld::new(TerrainConfig::default(), Plane::new(4.5))?;
//! let events = world.events();
//! world.generate_chunk(ChunkKey::new(0, 0, 0));
//! world.build(ChunkKey::new(0, 0, 0))?;
//!
//! for event in events.iter() {
//!     println!("{} -> {} triangles", event.key, event.surface.mesh.triangle_count());
//! }
//! ```

pub mod chunk;
pub mod config;
pub mod density;
pub mod error;
pub mod mesh;
pub mod metrics;
pub mod nav;
pub mod octree;
pub mod rebuild;
pub mod scheduler;
pub mod subscribers;
pub mod volume;
pub mod world;

pub use chunk::{Chunk, ChunkKey, ChunkMap, ChunkSurface, GravityField};
pub use config::{QefSettings, TerrainConfig, CHUNK_SIZE, MAX_LOD, NAV_POOL_SIZE, POOL_SIZE};
pub use density::{normal_at, Cuboid, DensitySource, Plane, SampledGrid, Sphere, Subtract, Union, VolumeDensity};
pub use error::{TerrainError, TerrainResult};
pub use mesh::{MeshBuffers, MeshVertex, MinMaxAabb};
pub use metrics::{BuildMetrics, RollingWindow};
pub use nav::{ActorId, Direction, NavEdge, NavGraph, NavNode, NavigationService, NodeHash, PathDelivery, Pathfinder};
pub use octree::{LodRegion, NodeId, Octree, OctreeNode, Qef};
pub use rebuild::{BuildEvent, Rebuilder};
pub use scheduler::{BuildRequest, BuildScheduler, BuildTask, SchedulerStats};
pub use subscribers::Subscribers;
pub use volume::VoxelVolume;
pub use world::VoxelWorld;
