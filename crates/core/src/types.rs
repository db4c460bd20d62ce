//! Core type definitions

use serde::{Deserialize, Serialize};

/// Identity the world server assigns to one player or NPC.
///
/// Stable across ticks until the server explicitly removes the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ServerIndex(pub u16);

impl ServerIndex {
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    pub fn get(&self) -> u16 {
        self.0
    }

    /// Slot in a registry arena
    #[inline]
    pub fn slot(&self) -> usize {
        self.0 as usize
    }
}

impl From<u16> for ServerIndex {
    fn from(index: u16) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for ServerIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of entity tracked by the world mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Npc,
    GroundItem,
    Scenery,
    Wall,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Npc => "npc",
            Self::GroundItem => "ground item",
            Self::Scenery => "scenery",
            Self::Wall => "wall",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
