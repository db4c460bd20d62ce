//! Interfaces to the map loader and terrain model
//!
//! The sync engine never builds terrain itself. It asks a [`SectorLoader`]
//! to bring in the sector around the local player and tells a [`WorldMap`]
//! when scenery and walls change so collision and meshes can follow.

use mudsync_core::TilePosition;
use tracing::debug;

/// Loads map sectors on demand
pub trait SectorLoader {
    /// Load the sector containing absolute tile `(x, y)` on `plane`
    ///
    /// # Returns
    /// `true` if a new sector is now loaded and coordinates must be rebased
    fn load(&mut self, x: i32, y: i32, plane: i32) -> bool;
}

/// Terrain queries and object footprint updates
pub trait WorldMap {
    /// Facing direction (0..7) baked into the terrain at a tile
    fn tile_direction(&self, tile: TilePosition) -> u8;

    /// Height items resting on this scenery object are drawn at
    fn elevation_of(&self, object_id: u16) -> i32;

    /// Unrotated `(width, height)` footprint of a scenery object
    fn object_size(&self, _object_id: u16) -> (u8, u8) {
        (1, 1)
    }

    fn scenery_added(&mut self, _tile: TilePosition, _object_id: u16, _direction: u8) {}

    fn scenery_removed(&mut self, _tile: TilePosition, _object_id: u16, _direction: u8) {}

    fn wall_added(&mut self, _tile: TilePosition, _object_id: u16, _direction: u8) {}

    fn wall_removed(&mut self, _tile: TilePosition, _object_id: u16, _direction: u8) {}
}

/// Flat world with no terrain data
///
/// Every sector load succeeds, every tile faces north, nothing is raised.
#[derive(Debug, Default, Clone)]
pub struct HeadlessWorld {
    sectors_loaded: usize,
}

impl HeadlessWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sector loads requested so far
    pub fn sectors_loaded(&self) -> usize {
        self.sectors_loaded
    }
}

impl SectorLoader for HeadlessWorld {
    fn load(&mut self, x: i32, y: i32, plane: i32) -> bool {
        self.sectors_loaded += 1;
        debug!("Headless sector load at ({}, {}) plane {}", x, y, plane);
        true
    }
}

impl WorldMap for HeadlessWorld {
    fn tile_direction(&self, _tile: TilePosition) -> u8 {
        0
    }

    fn elevation_of(&self, _object_id: u16) -> i32 {
        0
    }
}
