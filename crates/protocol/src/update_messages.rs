//! # Entity Update Messages
//!
//! Byte-aligned messages that decorate entities already placed by the sync
//! messages (chat, damage, projectiles, appearance) plus the session-level
//! world info and social messages.
//!
//! Chat payloads are packed with the [`ChatCodec`] and prefixed with a
//! smart symbol count.

use crate::bit_reader::BitReader;
use crate::chat_codec::ChatCodec;
use crate::names::decode_name;
use mudsync_core::{Result, ServerIndex, SyncError};

/// Equipment slots carried by an appearance update
pub const EQUIPMENT_SLOTS: usize = 12;

/// Local player identity and plane geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldInfo {
    pub local_index: ServerIndex,
    pub plane_width: u16,
    pub plane_height: u16,
    pub plane: u16,
    pub plane_multiplier: u16,
}

impl WorldInfo {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = BitReader::new(payload);
        Ok(Self {
            local_index: ServerIndex(reader.read_u16()?),
            plane_width: reader.read_u16()?,
            plane_height: reader.read_u16()?,
            plane: reader.read_u16()?,
            plane_multiplier: reader.read_u16()?,
        })
    }
}

/// Full player appearance
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Appearance {
    /// Changes whenever the appearance changes, so it can be cached
    pub ticket: u16,
    pub name: String,
    pub equipment: Vec<u8>,
    pub hair_colour: u8,
    pub top_colour: u8,
    pub bottom_colour: u8,
    pub skin_colour: u8,
    pub level: u8,
    pub skull: bool,
}

impl Appearance {
    fn read(reader: &mut BitReader<'_>) -> Result<Self> {
        let ticket = reader.read_u16()?;
        let name = decode_name(reader.read_u64()?);
        let count = reader.read_u8()? as usize;
        if count > EQUIPMENT_SLOTS {
            return Err(SyncError::Handler(format!(
                "Appearance lists {} equipment items, at most {} fit",
                count, EQUIPMENT_SLOTS
            )));
        }
        let equipment = reader.read_bytes(count)?.to_vec();
        Ok(Self {
            ticket,
            name,
            equipment,
            hair_colour: reader.read_u8()?,
            top_colour: reader.read_u8()?,
            bottom_colour: reader.read_u8()?,
            skin_colour: reader.read_u8()?,
            level: reader.read_u8()?,
            skull: reader.read_u8()? == 1,
        })
    }
}

/// Hit splat data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Damage {
    pub damage: u8,
    pub current: u8,
    pub max: u8,
}

impl Damage {
    fn read(reader: &mut BitReader<'_>) -> Result<Self> {
        Ok(Self {
            damage: reader.read_u8()?,
            current: reader.read_u8()?,
            max: reader.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerUpdate {
    Bubble { item_id: u16 },
    Chat(String),
    Damage(Damage),
    NpcProjectile { sprite: u16, target: ServerIndex },
    PlayerProjectile { sprite: u16, target: ServerIndex },
    Appearance(Appearance),
    QuestMessage(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerUpdateRecord {
    pub server_index: ServerIndex,
    pub update: PlayerUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NpcUpdate {
    Chat { target: ServerIndex, text: String },
    Damage(Damage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcUpdateRecord {
    pub server_index: ServerIndex,
    pub update: NpcUpdate,
}

/// Decode a player update message
///
/// # Packet Format
/// ```text
/// {u16 count}({u16 server index}{u8 type}{type fields})*count
/// ```
pub fn decode_player_updates(payload: &[u8], codec: &ChatCodec) -> Result<Vec<PlayerUpdateRecord>> {
    let mut reader = BitReader::new(payload);
    let count = reader.read_u16()? as usize;
    let mut records = Vec::with_capacity(count.min(payload.len()));

    for _ in 0..count {
        let server_index = ServerIndex(reader.read_u16()?);
        let update = match reader.read_u8()? {
            0 => PlayerUpdate::Bubble { item_id: reader.read_u16()? },
            1 => PlayerUpdate::Chat(codec.read_message(&mut reader)?),
            2 => PlayerUpdate::Damage(Damage::read(&mut reader)?),
            3 => PlayerUpdate::NpcProjectile {
                sprite: reader.read_u16()?,
                target: ServerIndex(reader.read_u16()?),
            },
            4 => PlayerUpdate::PlayerProjectile {
                sprite: reader.read_u16()?,
                target: ServerIndex(reader.read_u16()?),
            },
            5 => PlayerUpdate::Appearance(Appearance::read(&mut reader)?),
            6 => PlayerUpdate::QuestMessage(codec.read_message(&mut reader)?),
            other => {
                return Err(SyncError::Handler(format!(
                    "Unknown player update type {} for {}",
                    other, server_index
                )))
            }
        };
        records.push(PlayerUpdateRecord { server_index, update });
    }

    Ok(records)
}

/// Decode an NPC update message
///
/// # Packet Format
/// ```text
/// {u16 count}({u16 server index}{u8 type}{type fields})*count
/// ```
pub fn decode_npc_updates(payload: &[u8], codec: &ChatCodec) -> Result<Vec<NpcUpdateRecord>> {
    let mut reader = BitReader::new(payload);
    let count = reader.read_u16()? as usize;
    let mut records = Vec::with_capacity(count.min(payload.len()));

    for _ in 0..count {
        let server_index = ServerIndex(reader.read_u16()?);
        let update = match reader.read_u8()? {
            1 => NpcUpdate::Chat {
                target: ServerIndex(reader.read_u16()?),
                text: codec.read_message(&mut reader)?,
            },
            2 => NpcUpdate::Damage(Damage::read(&mut reader)?),
            other => {
                return Err(SyncError::Handler(format!(
                    "Unknown NPC update type {} for {}",
                    other, server_index
                )))
            }
        };
        records.push(NpcUpdateRecord { server_index, update });
    }

    Ok(records)
}

/// Private message from a friend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendMessage {
    pub sender: String,
    pub message_id: u32,
    pub text: String,
}

impl FriendMessage {
    pub fn decode(payload: &[u8], codec: &ChatCodec) -> Result<Self> {
        let mut reader = BitReader::new(payload);
        Ok(Self {
            sender: decode_name(reader.read_u64()?),
            message_id: reader.read_u32()?,
            text: codec.read_message(&mut reader)?,
        })
    }
}

/// Online state of one friend
///
/// `online` is 0 when offline, 255 on this world, otherwise the world number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FriendStatus {
    pub name_hash: u64,
    pub online: u8,
}

impl FriendStatus {
    fn read(reader: &mut BitReader<'_>) -> Result<Self> {
        Ok(Self {
            name_hash: reader.read_u64()?,
            online: reader.read_u8()?,
        })
    }

    /// Decode a single status change
    ///
    /// # Packet Format
    /// ```text
    /// {u64 name}{u8 online}
    /// ```
    pub fn decode(payload: &[u8]) -> Result<Self> {
        Self::read(&mut BitReader::new(payload))
    }
}

/// Decode the full friend list
///
/// # Packet Format
/// ```text
/// {u8 count}({u64 name}{u8 online})*
/// ```
pub fn decode_friend_list(payload: &[u8]) -> Result<Vec<FriendStatus>> {
    let mut reader = BitReader::new(payload);
    let count = reader.read_u8()? as usize;
    (0..count).map(|_| FriendStatus::read(&mut reader)).collect()
}

/// Decode the ignore list into name hashes
///
/// # Packet Format
/// ```text
/// {u8 count}{u64 name}*
/// ```
pub fn decode_ignore_list(payload: &[u8]) -> Result<Vec<u64>> {
    let mut reader = BitReader::new(payload);
    let count = reader.read_u8()? as usize;
    (0..count).map(|_| reader.read_u64()).collect()
}

/// Plain server message; the whole payload is Latin-1 text
pub fn decode_server_message(payload: &[u8]) -> String {
    BitReader::new(payload).read_remaining_string()
}
