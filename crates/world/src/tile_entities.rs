//! Ground items, scenery and walls
//!
//! These have no server index. Identity is positional: `(tile, item)` for
//! ground items, the tile for scenery, `(tile, direction)` for walls. Each
//! kind is kept in a dense list that only shrinks by order-preserving
//! removal.

use mudsync_core::{ChunkPosition, EntityKind, TilePosition};
use serde::Serialize;

use crate::error::{Result, WorldError};

/// Entity pinned to one tile
pub trait TileEntity {
    const KIND: EntityKind;

    fn tile(&self) -> TilePosition;

    fn tile_mut(&mut self) -> &mut TilePosition;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroundItem {
    pub tile: TilePosition,
    pub item_id: u16,
    /// Height inherited from scenery on the same tile (tables, counters)
    pub elevation: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SceneryObject {
    pub tile: TilePosition,
    pub object_id: u16,
    pub direction: u8,
    /// Footprint after applying `direction`
    pub width: u8,
    pub height: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WallObject {
    pub tile: TilePosition,
    pub direction: u8,
    pub object_id: u16,
}

macro_rules! impl_tile_entity {
    ($ty:ty, $kind:expr) => {
        impl TileEntity for $ty {
            const KIND: EntityKind = $kind;

            #[inline]
            fn tile(&self) -> TilePosition {
                self.tile
            }

            #[inline]
            fn tile_mut(&mut self) -> &mut TilePosition {
                &mut self.tile
            }
        }
    };
}

impl_tile_entity!(GroundItem, EntityKind::GroundItem);
impl_tile_entity!(SceneryObject, EntityKind::Scenery);
impl_tile_entity!(WallObject, EntityKind::Wall);

/// Dense, bounded list of one kind of tile entity
#[derive(Debug, Clone)]
pub struct TileEntityList<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T: TileEntity> TileEntityList<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, item: T) -> Result<()> {
        if self.items.len() >= self.capacity {
            return Err(WorldError::CapacityExceeded {
                kind: T::KIND,
                capacity: self.capacity,
            });
        }
        self.items.push(item);
        Ok(())
    }

    /// Drop every entity inside `chunk`
    ///
    /// # Returns
    /// The number of entities removed
    pub fn clear_chunk(&mut self, chunk: ChunkPosition) -> usize {
        self.retain_with(|item| !chunk.contains(item.tile()), |_| {})
    }

    /// Remove the first entity matching `pred`, keeping the rest in order
    pub fn remove_first(&mut self, pred: impl FnMut(&T) -> bool) -> Option<T> {
        let position = self.items.iter().position(pred)?;
        Some(self.items.remove(position))
    }

    /// Keep entities for which `keep` holds, reporting each removed one
    ///
    /// # Returns
    /// The number of entities removed
    pub fn retain_with(
        &mut self,
        mut keep: impl FnMut(&T) -> bool,
        mut on_removed: impl FnMut(&T),
    ) -> usize {
        let before = self.items.len();
        self.items.retain(|item| {
            if keep(item) {
                true
            } else {
                on_removed(item);
                false
            }
        });
        before - self.items.len()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Shift every entity by a tile delta
    pub fn rebase(&mut self, dx: i32, dy: i32) {
        for item in self.items.iter_mut() {
            let tile = item.tile_mut();
            *tile = tile.offset(dx, dy);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
