//! Loaded sector tracking
//!
//! Every tile coordinate the world mirror stores is relative to `origin`,
//! the absolute tile at local `(0, 0)`. The origin only moves when the local
//! player leaves the ±32 tile window around the centre of the loaded
//! section and the loader reports a new sector. Callers must then rebase
//! everything they hold by the returned delta before the next message is
//! applied.

use mudsync_core::{TilePosition, SECTOR_SIZE};
use mudsync_protocol::WorldInfo;
use serde::Serialize;
use tracing::{debug, info};

use crate::collaborators::SectorLoader;

/// Half-width of the window around a section centre that needs no reload
const RELOAD_MARGIN: i32 = 32;

/// Tile delta to add to every stored coordinate after a sector change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rebase {
    pub dx: i32,
    pub dy: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Region {
    /// Absolute tile at local (0, 0)
    pub origin: TilePosition,
    /// Local player tile relative to `origin`
    pub local_tile: TilePosition,
    pub plane_width: i32,
    pub plane_height: i32,
    pub plane_index: i32,
    pub plane_multiplier: i32,
    loaded_plane: Option<i32>,
    lower: TilePosition,
    upper: TilePosition,
}

impl Region {
    pub fn new() -> Self {
        Self {
            origin: TilePosition::default(),
            local_tile: TilePosition::default(),
            plane_width: 0,
            plane_height: 0,
            plane_index: 0,
            plane_multiplier: 0,
            loaded_plane: None,
            lower: TilePosition::default(),
            upper: TilePosition::default(),
        }
    }

    /// Take the plane geometry from a world info message
    ///
    /// The next call to [`Region::track`] always reloads.
    pub fn apply_world_info(&mut self, world_info: &WorldInfo) {
        self.plane_width = i32::from(world_info.plane_width);
        self.plane_index = i32::from(world_info.plane);
        self.plane_multiplier = i32::from(world_info.plane_multiplier);
        self.plane_height =
            i32::from(world_info.plane_height) - self.plane_index * self.plane_multiplier;
        self.loaded_plane = None;
        debug!(
            "Plane {} geometry {}x{} (multiplier {})",
            self.plane_index, self.plane_width, self.plane_height, self.plane_multiplier
        );
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded_plane.is_some()
    }

    /// Record the local player's absolute tile, loading a new sector when it
    /// leaves the current window
    ///
    /// # Returns
    /// The rebase delta if a new sector was loaded, `None` otherwise.
    /// `local_tile` is updated either way.
    pub fn track(&mut self, tile_x: i32, tile_y: i32, loader: &mut dyn SectorLoader) -> Option<Rebase> {
        let rebase = self.reload_if_needed(tile_x, tile_y, loader);
        self.local_tile = self.to_local(tile_x, tile_y);
        rebase
    }

    fn reload_if_needed(&mut self, tile_x: i32, tile_y: i32, loader: &mut dyn SectorLoader) -> Option<Rebase> {
        let x = tile_x + self.plane_width;
        let y = tile_y + self.plane_height;
        if self.loaded_plane == Some(self.plane_index)
            && x > self.lower.x
            && x < self.upper.x
            && y > self.lower.y
            && y < self.upper.y
        {
            return None;
        }

        if !loader.load(x, y, self.plane_index) {
            debug!("Sector loader declined ({}, {}) plane {}", x, y, self.plane_index);
            return None;
        }

        let section_x = (x + SECTOR_SIZE / 2) / SECTOR_SIZE;
        let section_y = (y + SECTOR_SIZE / 2) / SECTOR_SIZE;
        self.lower = TilePosition::new(section_x * SECTOR_SIZE - RELOAD_MARGIN, section_y * SECTOR_SIZE - RELOAD_MARGIN);
        self.upper = TilePosition::new(section_x * SECTOR_SIZE + RELOAD_MARGIN, section_y * SECTOR_SIZE + RELOAD_MARGIN);
        self.loaded_plane = Some(self.plane_index);

        let old = self.origin;
        self.origin = TilePosition::new(
            section_x * SECTOR_SIZE - SECTOR_SIZE - self.plane_width,
            section_y * SECTOR_SIZE - SECTOR_SIZE - self.plane_height,
        );
        info!(
            "Loaded sector ({}, {}) plane {}, origin now ({}, {})",
            section_x, section_y, self.plane_index, self.origin.x, self.origin.y
        );
        Some(Rebase {
            dx: old.x - self.origin.x,
            dy: old.y - self.origin.y,
        })
    }

    /// Absolute tile to origin-relative
    #[inline]
    pub fn to_local(&self, tile_x: i32, tile_y: i32) -> TilePosition {
        TilePosition::new(tile_x - self.origin.x, tile_y - self.origin.y)
    }

    /// Origin-relative tile to absolute
    #[inline]
    pub fn to_absolute(&self, tile: TilePosition) -> TilePosition {
        tile.offset(self.origin.x, self.origin.y)
    }

    /// Forget the loaded sector; the next position update reloads
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::new()
    }
}
