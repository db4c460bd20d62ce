//! Position types for tracked entities
//!
//! Tiles are stored relative to the origin of the loaded map sector.
//! Characters move in mesh space, where one tile spans [`TILE_SIZE`] units
//! and an entity standing on a tile sits at its centre.

use serde::{Deserialize, Serialize};

/// Mesh units per tile
pub const TILE_SIZE: i32 = 128;

/// Tiles per side of a loaded map sector
pub const SECTOR_SIZE: i32 = 48;

/// Shift from a tile coordinate to its 8x8 chunk coordinate
pub const CHUNK_SHIFT: u32 = 3;

/// Tile position relative to the loaded sector origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TilePosition {
    pub x: i32,
    pub y: i32,
}

impl TilePosition {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Centre of this tile in mesh space
    pub const fn to_mesh(self) -> MeshPosition {
        MeshPosition {
            x: self.x * TILE_SIZE + TILE_SIZE / 2,
            y: self.y * TILE_SIZE + TILE_SIZE / 2,
        }
    }

    /// The 8x8 chunk containing this tile
    pub const fn chunk(self) -> ChunkPosition {
        ChunkPosition {
            x: self.x >> CHUNK_SHIFT,
            y: self.y >> CHUNK_SHIFT,
        }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Position in mesh space (1 tile = 128 units)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MeshPosition {
    pub x: i32,
    pub y: i32,
}

impl MeshPosition {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile containing this mesh position
    pub const fn to_tile(self) -> TilePosition {
        TilePosition {
            x: self.x.div_euclid(TILE_SIZE),
            y: self.y.div_euclid(TILE_SIZE),
        }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// 8x8-tile chunk, the unit of bulk removal for tile entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPosition {
    pub x: i32,
    pub y: i32,
}

impl ChunkPosition {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn contains(self, tile: TilePosition) -> bool {
        tile.chunk() == self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_to_mesh_conversion() {
        let mesh = TilePosition::new(2, 3).to_mesh();
        assert_eq!(mesh.x, 320);
        assert_eq!(mesh.y, 448);
    }

    #[test]
    fn test_mesh_to_tile_conversion() {
        assert_eq!(MeshPosition::new(320, 448).to_tile(), TilePosition::new(2, 3));
        assert_eq!(MeshPosition::new(-1, 0).to_tile(), TilePosition::new(-1, 0));
    }

    #[test]
    fn test_chunk_of_tile() {
        assert_eq!(TilePosition::new(7, 8).chunk(), ChunkPosition::new(0, 1));
        assert_eq!(TilePosition::new(-1, 16).chunk(), ChunkPosition::new(-1, 2));
        assert!(ChunkPosition::new(1, 1).contains(TilePosition::new(15, 8)));
        assert!(!ChunkPosition::new(1, 1).contains(TilePosition::new(16, 8)));
    }
}
