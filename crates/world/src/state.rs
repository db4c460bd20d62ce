//! The client's mirror of the world
//!
//! [`WorldState`] owns every registry. The sync engine is its only writer;
//! renderers read it between ticks.

use std::collections::VecDeque;

use mudsync_core::{MeshPosition, ServerIndex, TilePosition};
use mudsync_protocol::decode_name;
use serde::Serialize;

use crate::character::{Npc, Player, Tracked};
use crate::region::{Rebase, Region};
use crate::registry::EntityRegistry;
use crate::social::{Friend, FriendList};
use crate::tile_entities::{GroundItem, SceneryObject, TileEntityList, WallObject};

/// Players visible at once
pub const MAX_PLAYERS: usize = 500;
/// Player server indices addressable
pub const PLAYER_SLOTS: usize = 4000;
/// NPCs visible at once
pub const MAX_NPCS: usize = 500;
/// NPC server indices addressable
pub const NPC_SLOTS: usize = 5000;
pub const MAX_GROUND_ITEMS: usize = 5000;
pub const MAX_SCENERY: usize = 1500;
pub const MAX_WALLS: usize = 500;

/// Lines kept in the message log
pub const MESSAGE_LOG_SIZE: usize = 100;
/// Friend message ids remembered for duplicate suppression
pub const FRIEND_MESSAGE_HISTORY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogLine {
    Server { text: String },
    Chat { sender: String, text: String },
    Friend { sender: String, text: String },
}

/// Bounded log of server and private messages
#[derive(Debug, Clone)]
pub struct MessageLog {
    lines: VecDeque<LogLine>,
    friend_ids: VecDeque<u32>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self {
            lines: VecDeque::with_capacity(MESSAGE_LOG_SIZE),
            friend_ids: VecDeque::with_capacity(FRIEND_MESSAGE_HISTORY),
        }
    }

    pub fn push_server(&mut self, text: String) {
        self.push(LogLine::Server { text });
    }

    pub fn push_chat(&mut self, sender: String, text: String) {
        self.push(LogLine::Chat { sender, text });
    }

    /// Log a private message unless its id was seen recently
    ///
    /// # Returns
    /// `false` for a duplicate
    pub fn push_friend(&mut self, message_id: u32, sender: String, text: String) -> bool {
        if self.friend_ids.contains(&message_id) {
            return false;
        }
        if self.friend_ids.len() == FRIEND_MESSAGE_HISTORY {
            self.friend_ids.pop_front();
        }
        self.friend_ids.push_back(message_id);
        self.push(LogLine::Friend { sender, text });
        true
    }

    fn push(&mut self, line: LogLine) {
        if self.lines.len() == MESSAGE_LOG_SIZE {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn lines(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct WorldState {
    pub players: EntityRegistry<Player>,
    pub npcs: EntityRegistry<Npc>,
    pub ground_items: TileEntityList<GroundItem>,
    pub scenery: TileEntityList<SceneryObject>,
    pub walls: TileEntityList<WallObject>,
    pub region: Region,
    pub local_player: ServerIndex,
    pub messages: MessageLog,
    pub friends: FriendList,
    /// Name hashes of ignored players
    pub ignores: Vec<u64>,
    ticks: u64,
}

impl WorldState {
    pub fn new() -> Self {
        tracing::debug!("Creating world state");
        Self {
            players: EntityRegistry::with_capacity(PLAYER_SLOTS, MAX_PLAYERS),
            npcs: EntityRegistry::with_capacity(NPC_SLOTS, MAX_NPCS),
            ground_items: TileEntityList::with_capacity(MAX_GROUND_ITEMS),
            scenery: TileEntityList::with_capacity(MAX_SCENERY),
            walls: TileEntityList::with_capacity(MAX_WALLS),
            region: Region::new(),
            local_player: ServerIndex::default(),
            messages: MessageLog::new(),
            friends: FriendList::new(),
            ignores: Vec::new(),
            ticks: 0,
        }
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn local_player(&self) -> Option<&Player> {
        self.players.get(self.local_player)
    }

    /// Advance movement and timers of every live character by one tick
    pub fn tick(&mut self) {
        self.players.for_each_live_mut(|player| player.character.tick());
        self.npcs.for_each_live_mut(|npc| npc.character.tick());
        self.ticks += 1;
    }

    /// Shift every stored coordinate after a sector change
    pub fn rebase(&mut self, rebase: Rebase) {
        self.players.rebase(rebase.dx, rebase.dy);
        self.npcs.rebase(rebase.dx, rebase.dy);
        self.ground_items.rebase(rebase.dx, rebase.dy);
        self.scenery.rebase(rebase.dx, rebase.dy);
        self.walls.rebase(rebase.dx, rebase.dy);
    }

    /// Forget everything; used when a session ends
    pub fn reset(&mut self) {
        self.players.clear();
        self.npcs.clear();
        self.ground_items.clear();
        self.scenery.clear();
        self.walls.clear();
        self.region.reset();
        self.local_player = ServerIndex::default();
        self.messages = MessageLog::new();
        self.friends.clear();
        self.ignores.clear();
        self.ticks = 0;
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            ticks: self.ticks,
            local_player: self.local_player.get(),
            origin: self.region.origin,
            local_tile: self.region.local_tile,
            plane: self.region.plane_index,
            players: self
                .players
                .iter()
                .map(|player| CharacterSnapshot::of(player, player.name().map(str::to_string), None))
                .collect(),
            npcs: self
                .npcs
                .iter()
                .map(|npc| CharacterSnapshot::of(npc, None, Some(npc.type_id)))
                .collect(),
            ground_items: self.ground_items.as_slice().to_vec(),
            scenery: self.scenery.as_slice().to_vec(),
            walls: self.walls.as_slice().to_vec(),
            messages: self.messages.lines().cloned().collect(),
            friends: self.friends.as_slice().to_vec(),
            ignores: self.ignores.iter().map(|hash| decode_name(*hash)).collect(),
        }
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable summary of one character
#[derive(Debug, Clone, Serialize)]
pub struct CharacterSnapshot {
    pub index: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_id: Option<u16>,
    pub position: MeshPosition,
    pub tile: TilePosition,
    pub animation: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub health: (u8, u8),
}

impl CharacterSnapshot {
    fn of<T: Tracked>(entity: &T, name: Option<String>, type_id: Option<u16>) -> Self {
        let character = entity.character();
        Self {
            index: character.server_index.get(),
            name,
            type_id,
            position: character.current,
            tile: character.current.to_tile(),
            animation: character.animation_current,
            message: character.message.clone(),
            health: (character.health_current, character.health_max),
        }
    }
}

/// Serializable summary of the whole mirror
#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    pub ticks: u64,
    pub local_player: u16,
    pub origin: TilePosition,
    pub local_tile: TilePosition,
    pub plane: i32,
    pub players: Vec<CharacterSnapshot>,
    pub npcs: Vec<CharacterSnapshot>,
    pub ground_items: Vec<GroundItem>,
    pub scenery: Vec<SceneryObject>,
    pub walls: Vec<WallObject>,
    pub messages: Vec<LogLine>,
    pub friends: Vec<Friend>,
    pub ignores: Vec<String>,
}
