//! # Region Sync Messages
//!
//! Decoding of the per-tick delta messages into tagged records.
//!
//! Nothing here touches world state. A message is decoded completely
//! before it is applied, so a truncated message is rejected as a whole.
//!
//! ## Character sync (players and NPCs)
//!
//! ```text
//! [regionX:11][regionY:13][facing:4]          players only
//! [knownCount:8]
//! per known entity:
//!   0                 unchanged
//!   1 0 [dir:3]       moved one tile
//!   1 1 [code:4]      status code, or removal when code & 0b1100 == 0b1100
//! add records until fewer bits remain than one record needs
//! ```
//!
//! ## Tile entity deltas (ground items, scenery, walls)
//!
//! A flat run of byte-aligned records terminated by the end of the message.
//! A leading `0xFF` is a chunk clear.

use crate::bit_reader::BitReader;
use mudsync_core::{Result, ServerIndex};

/// Leading byte of a chunk-clear record
pub const CHUNK_CLEAR: u8 = 0xFF;

/// Object id that removes whatever is on the tile without placing anything
pub const NO_OBJECT_ID: u16 = 60000;

/// High bit of a ground item id marks a single removal
pub const GROUND_ITEM_REMOVE_FLAG: u16 = 0x8000;

/// Compass direction of a one-tile step
///
/// X grows to the west and Y grows to the south.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    North = 0,
    NorthWest = 1,
    West = 2,
    SouthWest = 3,
    South = 4,
    SouthEast = 5,
    East = 6,
    NorthEast = 7,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Self::North,
        Self::NorthWest,
        Self::West,
        Self::SouthWest,
        Self::South,
        Self::SouthEast,
        Self::East,
        Self::NorthEast,
    ];

    /// Direction from the low three bits of `bits`
    #[inline]
    pub fn from_bits(bits: u32) -> Self {
        Self::ALL[(bits & 7) as usize]
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Tile delta of one step in this direction
    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::NorthWest => (1, -1),
            Self::West => (1, 0),
            Self::SouthWest => (1, 1),
            Self::South => (0, 1),
            Self::SouthEast => (-1, 1),
            Self::East => (-1, 0),
            Self::NorthEast => (-1, -1),
        }
    }
}

/// What happened to one entity the client already knew about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownUpdate {
    Unchanged,
    Move(Direction),
    /// New animation or combat stance
    Status(u8),
    Remove,
}

impl KnownUpdate {
    pub fn read(reader: &mut BitReader<'_>) -> Result<Self> {
        if !reader.read_bit()? {
            return Ok(Self::Unchanged);
        }
        if !reader.read_bit()? {
            return Ok(Self::Move(Direction::from_bits(reader.read_bits(3)?)));
        }
        let code = reader.read_bits(4)? as u8;
        if code & 0b1100 == 0b1100 {
            Ok(Self::Remove)
        } else {
            Ok(Self::Status(code))
        }
    }
}

/// Bit layout of an add record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddRecordLayout {
    pub index_bits: u32,
    pub offset_bits: u32,
    pub facing_bits: u32,
    /// Zero when the record carries no type id
    pub type_bits: u32,
}

impl AddRecordLayout {
    #[inline]
    pub const fn total_bits(&self) -> usize {
        (self.index_bits + 2 * self.offset_bits + self.facing_bits + self.type_bits) as usize
    }
}

pub const PLAYER_ADD_RECORD: AddRecordLayout = AddRecordLayout {
    index_bits: 11,
    offset_bits: 5,
    facing_bits: 3,
    type_bits: 0,
};

pub const NPC_ADD_RECORD: AddRecordLayout = AddRecordLayout {
    index_bits: 12,
    offset_bits: 5,
    facing_bits: 4,
    type_bits: 10,
};

/// Player sync header: the local player's absolute tile and facing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncHeader {
    pub tile_x: u16,
    pub tile_y: u16,
    pub facing: u8,
}

/// An entity entering view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddRecord {
    pub server_index: ServerIndex,
    /// Tile offset from the local player
    pub dx: i32,
    pub dy: i32,
    pub facing: u8,
    /// Raw NPC type id
    pub type_id: Option<u16>,
}

impl AddRecord {
    pub fn read(reader: &mut BitReader<'_>, layout: &AddRecordLayout) -> Result<Self> {
        let server_index = ServerIndex(reader.read_bits(layout.index_bits)? as u16);
        let dx = reader.read_signed_bits(layout.offset_bits)?;
        let dy = reader.read_signed_bits(layout.offset_bits)?;
        let facing = reader.read_bits(layout.facing_bits)? as u8;
        let type_id = if layout.type_bits > 0 {
            Some(reader.read_bits(layout.type_bits)? as u16)
        } else {
            None
        };
        Ok(Self { server_index, dx, dy, facing, type_id })
    }
}

/// Decoded player or NPC sync message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharacterSync {
    pub header: Option<SyncHeader>,
    /// One entry per known entity, in the order of the previous tick's list
    pub known: Vec<KnownUpdate>,
    pub added: Vec<AddRecord>,
}

impl CharacterSync {
    /// Decode a player sync message
    pub fn decode_players(payload: &[u8]) -> Result<Self> {
        let mut reader = BitReader::new(payload);
        let header = SyncHeader {
            tile_x: reader.read_bits(11)? as u16,
            tile_y: reader.read_bits(13)? as u16,
            facing: reader.read_bits(4)? as u8,
        };
        let mut message = Self::decode_body(&mut reader, &PLAYER_ADD_RECORD)?;
        message.header = Some(header);
        Ok(message)
    }

    /// Decode an NPC sync message
    pub fn decode_npcs(payload: &[u8]) -> Result<Self> {
        let mut reader = BitReader::new(payload);
        Self::decode_body(&mut reader, &NPC_ADD_RECORD)
    }

    fn decode_body(reader: &mut BitReader<'_>, layout: &AddRecordLayout) -> Result<Self> {
        let known_count = reader.read_bits(8)? as usize;
        let mut known = Vec::with_capacity(known_count);
        for _ in 0..known_count {
            known.push(KnownUpdate::read(reader)?);
        }

        // No record count on the wire; trailing padding is always shorter
        // than a record.
        let mut added = Vec::new();
        while reader.remaining_bits() >= layout.total_bits() {
            added.push(AddRecord::read(reader, layout)?);
        }

        Ok(Self { header: None, known, added })
    }
}

/// Ground item delta record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundItemRecord {
    ChunkClear { dx: i32, dy: i32 },
    /// Remove the first item with this id on the tile
    Remove { dx: i32, dy: i32, item_id: u16 },
    Add { dx: i32, dy: i32, item_id: u16 },
}

/// Scenery delta record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneryRecord {
    ChunkClear { dx: i32, dy: i32 },
    Remove { dx: i32, dy: i32 },
    Place { dx: i32, dy: i32, object_id: u16 },
}

/// Wall object delta record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallRecord {
    ChunkClear { dx: i32, dy: i32 },
    Remove { dx: i32, dy: i32, direction: u8 },
    Place { dx: i32, dy: i32, direction: u8, object_id: u16 },
}

fn read_offsets(reader: &mut BitReader<'_>) -> Result<(i32, i32)> {
    Ok((reader.read_i8()? as i32, reader.read_i8()? as i32))
}

/// Consume a chunk-clear record if one is next
fn read_chunk_clear(reader: &mut BitReader<'_>) -> Result<Option<(i32, i32)>> {
    if reader.peek_u8()? != CHUNK_CLEAR {
        return Ok(None);
    }
    reader.read_u8()?;
    read_offsets(reader).map(Some)
}

fn decode_records<T>(
    payload: &[u8],
    mut read: impl FnMut(&mut BitReader<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    let mut reader = BitReader::new(payload);
    let mut records = Vec::new();
    while !reader.is_empty() {
        records.push(read(&mut reader)?);
    }
    Ok(records)
}

pub fn decode_ground_items(payload: &[u8]) -> Result<Vec<GroundItemRecord>> {
    decode_records(payload, |reader| {
        if let Some((dx, dy)) = read_chunk_clear(reader)? {
            return Ok(GroundItemRecord::ChunkClear { dx, dy });
        }
        let id = reader.read_u16()?;
        let (dx, dy) = read_offsets(reader)?;
        if id & GROUND_ITEM_REMOVE_FLAG != 0 {
            Ok(GroundItemRecord::Remove { dx, dy, item_id: id & !GROUND_ITEM_REMOVE_FLAG })
        } else {
            Ok(GroundItemRecord::Add { dx, dy, item_id: id })
        }
    })
}

pub fn decode_scenery(payload: &[u8]) -> Result<Vec<SceneryRecord>> {
    decode_records(payload, |reader| {
        if let Some((dx, dy)) = read_chunk_clear(reader)? {
            return Ok(SceneryRecord::ChunkClear { dx, dy });
        }
        let object_id = reader.read_u16()?;
        let (dx, dy) = read_offsets(reader)?;
        if object_id == NO_OBJECT_ID {
            Ok(SceneryRecord::Remove { dx, dy })
        } else {
            Ok(SceneryRecord::Place { dx, dy, object_id })
        }
    })
}

pub fn decode_walls(payload: &[u8]) -> Result<Vec<WallRecord>> {
    decode_records(payload, |reader| {
        if let Some((dx, dy)) = read_chunk_clear(reader)? {
            return Ok(WallRecord::ChunkClear { dx, dy });
        }
        let object_id = reader.read_u16()?;
        let (dx, dy) = read_offsets(reader)?;
        let direction = reader.read_u8()?;
        if object_id == NO_OBJECT_ID {
            Ok(WallRecord::Remove { dx, dy, direction })
        } else {
            Ok(WallRecord::Place { dx, dy, direction, object_id })
        }
    })
}
