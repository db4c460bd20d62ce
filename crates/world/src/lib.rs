//! # MudSync World Library
//!
//! The client's mirror of the game world and the engine that keeps it in
//! step with the server.
//!
//! ## Architecture
//!
//! - [`character`]: players and NPCs, each with a ten slot waypoint ring
//!   feeding the movement interpolator
//! - [`registry`]: server-indexed arena plus the dense live list that sync
//!   messages address by position
//! - [`tile_entities`]: ground items, scenery and walls
//! - [`region`]: loaded sector tracking and rebasing
//! - [`social`]: friend and ignore lists
//! - [`collaborators`]: sector loader and terrain traits
//! - [`sync`]: the [`RegionSyncEngine`] that applies decoded messages
//! - [`state`]: [`WorldState`], which owns all of the above
//!
//! ## Usage Example
//!
//! ```rust
//! use mudsync_protocol::init_codec;
//! use mudsync_world::{HeadlessWorld, RegionSyncEngine, SyncConfig, WorldState};
//!
//! let mut engine = RegionSyncEngine::new(
//!     init_codec(),
//!     Box::new(HeadlessWorld::new()),
//!     Box::new(HeadlessWorld::new()),
//!     SyncConfig::default(),
//! );
//! let mut world = WorldState::new();
//! engine.apply_server_message(&mut world, b"Welcome").unwrap();
//! assert_eq!(world.messages.len(), 1);
//! ```

pub mod character;
pub mod collaborators;
pub mod error;
pub mod region;
pub mod registry;
pub mod social;
pub mod state;
pub mod sync;
pub mod tile_entities;

pub use character::{Character, Npc, Player, ProjectileTarget, Tracked, WAYPOINT_RING_SIZE};
pub use collaborators::{HeadlessWorld, SectorLoader, WorldMap};
pub use error::WorldError;
pub use region::{Rebase, Region};
pub use registry::EntityRegistry;
pub use social::{Friend, FriendChange, FriendList};
pub use state::{LogLine, MessageLog, WorldSnapshot, WorldState};
pub use sync::{RegionSyncEngine, SyncConfig};
pub use tile_entities::{GroundItem, SceneryObject, TileEntity, TileEntityList, WallObject};
