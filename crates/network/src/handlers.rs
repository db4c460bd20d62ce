//! # Packet Handler System
//!
//! Maps server opcodes to the functions that apply them to the world.
//!
//! # Architecture
//!
//! Handlers are plain synchronous functions. Decoding and applying one
//! message never waits on anything, so each handler runs to completion
//! under the world write lock and the next frame is not looked at until it
//! returns.
//!
//! # Example
//!
//! ```rust
//! use mudsync_network::{Flow, HandlerRegistry};
//! use mudsync_protocol::ServerOpcode;
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register_function(ServerOpcode::LogoutDeny, |_ctx, _payload| Ok(Flow::Continue));
//! assert!(registry.has_handler(ServerOpcode::LogoutDeny));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use mudsync_core::{Result, SyncError};
use mudsync_protocol::ServerOpcode;
use mudsync_world::{RegionSyncEngine, WorldState};

/// What the session should do after a handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The server ended the session
    Close,
}

/// Everything a handler may touch
pub struct SyncContext<'a> {
    pub engine: &'a mut RegionSyncEngine,
    pub world: &'a mut WorldState,
}

/// Type for packet handler functions
pub type HandlerFunction =
    Arc<dyn Fn(&mut SyncContext<'_>, &[u8]) -> Result<Flow> + Send + Sync>;

/// Registry of packet handlers
///
/// # Purpose
/// Maintains a mapping from server opcodes to handler functions.
/// Provides O(1) lookup and dispatch.
pub struct HandlerRegistry {
    handlers: HashMap<ServerOpcode, HandlerFunction>,
}

impl HandlerRegistry {
    /// Create an empty registry
    #[inline]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Create a registry with a handler for every world message
    pub fn with_world_handlers() -> Self {
        let mut registry = Self::new();
        registry.register_world_handlers();
        registry
    }

    /// Register a function-based handler
    ///
    /// # Arguments
    /// * `opcode` - The opcode to handle
    /// * `handler` - Function to call for frames with this opcode
    pub fn register_function<F>(&mut self, opcode: ServerOpcode, handler: F)
    where
        F: Fn(&mut SyncContext<'_>, &[u8]) -> Result<Flow> + Send + Sync + 'static,
    {
        tracing::debug!("Registered handler for opcode {:?}", opcode);
        self.handlers.insert(opcode, Arc::new(handler));
    }

    fn register_world_handlers(&mut self) {
        self.register_function(ServerOpcode::CloseConnection, |_ctx, _payload| {
            tracing::info!("Server closed the connection");
            Ok(Flow::Close)
        });
        self.register_function(ServerOpcode::LogoutDeny, |_ctx, _payload| {
            tracing::info!("Logout refused by the server");
            Ok(Flow::Continue)
        });
        self.register_function(ServerOpcode::WorldInfo, |ctx, payload| {
            ctx.engine.apply_world_info(ctx.world, payload).map(|_| Flow::Continue)
        });
        self.register_function(ServerOpcode::RegionPlayers, |ctx, payload| {
            ctx.engine.sync_players(ctx.world, payload).map(|_| Flow::Continue)
        });
        self.register_function(ServerOpcode::RegionNpcs, |ctx, payload| {
            ctx.engine.sync_npcs(ctx.world, payload).map(|_| Flow::Continue)
        });
        self.register_function(ServerOpcode::RegionGroundItems, |ctx, payload| {
            ctx.engine.sync_ground_items(ctx.world, payload).map(|_| Flow::Continue)
        });
        self.register_function(ServerOpcode::RegionObjects, |ctx, payload| {
            ctx.engine.sync_scenery(ctx.world, payload).map(|_| Flow::Continue)
        });
        self.register_function(ServerOpcode::RegionWallObjects, |ctx, payload| {
            ctx.engine.sync_walls(ctx.world, payload).map(|_| Flow::Continue)
        });
        self.register_function(ServerOpcode::RegionPlayerUpdate, |ctx, payload| {
            ctx.engine.apply_player_updates(ctx.world, payload).map(|_| Flow::Continue)
        });
        self.register_function(ServerOpcode::RegionNpcUpdate, |ctx, payload| {
            ctx.engine.apply_npc_updates(ctx.world, payload).map(|_| Flow::Continue)
        });
        self.register_function(ServerOpcode::Message, |ctx, payload| {
            ctx.engine.apply_server_message(ctx.world, payload).map(|_| Flow::Continue)
        });
        self.register_function(ServerOpcode::FriendMessage, |ctx, payload| {
            ctx.engine.apply_friend_message(ctx.world, payload).map(|_| Flow::Continue)
        });
        self.register_function(ServerOpcode::FriendList, |ctx, payload| {
            ctx.engine.apply_friend_list(ctx.world, payload).map(|_| Flow::Continue)
        });
        self.register_function(ServerOpcode::FriendStatusChange, |ctx, payload| {
            ctx.engine.apply_friend_status(ctx.world, payload).map(|_| Flow::Continue)
        });
        self.register_function(ServerOpcode::IgnoreList, |ctx, payload| {
            ctx.engine.apply_ignore_list(ctx.world, payload).map(|_| Flow::Continue)
        });
    }

    /// Dispatch a payload to the handler for `opcode`
    ///
    /// # Errors
    /// Returns an error if:
    /// - No handler is registered for this opcode
    /// - The handler itself returns an error
    pub fn dispatch(&self, opcode: ServerOpcode, ctx: &mut SyncContext<'_>, payload: &[u8]) -> Result<Flow> {
        let handler = self
            .handlers
            .get(&opcode)
            .ok_or(SyncError::UnknownOpcode(opcode.as_u8()))?;

        handler(ctx, payload)
    }

    /// Check if a handler is registered for an opcode
    pub fn has_handler(&self, opcode: ServerOpcode) -> bool {
        self.handlers.contains_key(&opcode)
    }

    /// Get the number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
