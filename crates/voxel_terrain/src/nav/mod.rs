//! Walkable-surface navigation.
//!
//! ```text
//!   Chunk A node map ─┐                 ┌─ Chunk B node map
//!                     ├─ Arc<NavNode> ──┤
//!   NavGraph index ───┘   edge map      └─ (nodes near the A/B face link
//!                         NavEdge{a,b}      across it through the index)
//! ```
//!
//! A node sits in an air voxel next to a solid one. Its direction mask has
//! bit `d` set when the voxel at `position - d` is solid, and it exists only
//! while at least one of those faces is walkable under the local gravity.
//! Edges connect nodes in a 26-neighbourhood with Euclidean cost and are
//! stored by value at both endpoints.
//!
//! Locks are acquired chunk map, then edge map, then global index, one at a
//! time; see [`graph`].

pub mod graph;
pub mod node;
pub mod pathfinder;
pub mod raycast;
pub mod service;

pub use graph::{direction_mask, NavGraph, NavUpdate};
pub use node::{is_walkable, Direction, NavEdge, NavNode, NodeHash, MATERIAL_GROUND};
pub use pathfinder::Pathfinder;
pub use raycast::GridRay;
pub use service::{ActorId, NavigationService, PathDelivery};
