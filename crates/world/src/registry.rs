//! Server-indexed entity registry
//!
//! Entities live in an arena addressed by [`ServerIndex`]. The order the
//! renderer and the next sync message see is a separate dense list of
//! indices. A sync message addresses the previous tick's list by position,
//! so that list is only ever rebuilt by appending in message order: removed
//! entries are simply not carried over and the rest keep their relative
//! order.
//!
//! # Tick protocol
//!
//! ```text
//! begin_tick()            previous live list becomes the known list
//! carry_over(pos)         known[pos] stays live, unchanged or moved
//! create_or_update(..)    add-record or local player header
//! ```

use mudsync_core::{EntityKind, MeshPosition, ServerIndex};
use tracing::trace;

use crate::character::Tracked;
use crate::error::{Result, WorldError};

#[derive(Debug)]
struct Slot<T> {
    entity: Option<T>,
    /// Tick stamp at which this index was in the known list
    known_tick: u32,
    /// Tick stamp at which this index was appended to the live list
    live_tick: u32,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            entity: None,
            known_tick: 0,
            live_tick: 0,
        }
    }
}

/// Fixed-capacity registry of players or NPCs
#[derive(Debug)]
pub struct EntityRegistry<T: Tracked> {
    slots: Vec<Slot<T>>,
    live: Vec<ServerIndex>,
    known: Vec<ServerIndex>,
    max_live: usize,
    tick: u32,
}

impl<T: Tracked> EntityRegistry<T> {
    /// Create a registry addressing `slot_capacity` server indices with at
    /// most `max_live` visible at once
    pub fn with_capacity(slot_capacity: usize, max_live: usize) -> Self {
        let mut slots = Vec::with_capacity(slot_capacity);
        slots.resize_with(slot_capacity, Slot::default);
        tracing::debug!(
            "Created {} registry ({} slots, {} live)",
            T::KIND,
            slot_capacity,
            max_live
        );
        Self {
            slots,
            live: Vec::with_capacity(max_live),
            known: Vec::with_capacity(max_live),
            max_live,
            tick: 0,
        }
    }

    #[inline]
    pub fn kind(&self) -> EntityKind {
        T::KIND
    }

    #[inline]
    pub fn slot_capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn max_live(&self) -> usize {
        self.max_live
    }

    /// Start a new sync: the current live list becomes the known list and
    /// the live list starts empty
    pub fn begin_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        if self.tick == 0 {
            // Stamps from four billion ticks ago could collide
            for slot in self.slots.iter_mut() {
                slot.known_tick = 0;
                slot.live_tick = 0;
            }
            self.tick = 1;
        }

        std::mem::swap(&mut self.known, &mut self.live);
        self.live.clear();
        for index in &self.known {
            if let Some(slot) = self.slots.get_mut(index.slot()) {
                slot.known_tick = self.tick;
            }
        }
    }

    /// Number of entries in the known list
    #[inline]
    pub fn known_len(&self) -> usize {
        self.known.len()
    }

    #[inline]
    pub fn known_at(&self, position: usize) -> Option<ServerIndex> {
        self.known.get(position).copied()
    }

    /// Keep the known entry at `position` live and return it for updates
    pub fn carry_over(&mut self, position: usize) -> Result<&mut T> {
        let index = self.known_at(position).ok_or(WorldError::KnownCountMismatch {
            kind: T::KIND,
            announced: position + 1,
            available: self.known.len(),
        })?;
        self.append_live(index)?;
        let capacity = self.slots.len();
        self.slots[index.slot()]
            .entity
            .as_mut()
            .ok_or(WorldError::IndexOutOfRange {
                kind: T::KIND,
                index,
                capacity,
            })
    }

    /// Make `index` live at `position` this tick
    ///
    /// An entity that was known last tick gets `position` pushed onto its
    /// waypoint ring. One that was not, including a cached entity that was
    /// removed earlier, is placed there with an empty path.
    pub fn create_or_update(
        &mut self,
        index: ServerIndex,
        position: MeshPosition,
        animation: u8,
    ) -> Result<&mut T> {
        self.check_index(index)?;
        self.append_live(index)?;

        let tick = self.tick;
        let slot = &mut self.slots[index.slot()];
        let was_known = slot.known_tick == tick && slot.entity.is_some();
        let entity = slot.entity.get_or_insert_with(|| T::spawn(index));
        let character = entity.character_mut();
        character.animation_next = animation;
        if was_known {
            character.push_waypoint(position);
        } else {
            trace!("{} {} enters view at {:?}", T::KIND, index, position);
            character.reset_path(position);
            character.animation_current = animation;
        }
        Ok(entity)
    }

    fn check_index(&self, index: ServerIndex) -> Result<()> {
        if index.slot() >= self.slots.len() {
            return Err(WorldError::IndexOutOfRange {
                kind: T::KIND,
                index,
                capacity: self.slots.len(),
            });
        }
        Ok(())
    }

    fn append_live(&mut self, index: ServerIndex) -> Result<()> {
        if self.live.len() >= self.max_live {
            return Err(WorldError::CapacityExceeded {
                kind: T::KIND,
                capacity: self.max_live,
            });
        }
        let slot = &mut self.slots[index.slot()];
        if slot.live_tick == self.tick {
            return Err(WorldError::DuplicateIndex { kind: T::KIND, index });
        }
        slot.live_tick = self.tick;
        self.live.push(index);
        Ok(())
    }

    /// Cached entity for `index`, live or not
    #[inline]
    pub fn get(&self, index: ServerIndex) -> Option<&T> {
        self.slots.get(index.slot()).and_then(|slot| slot.entity.as_ref())
    }

    #[inline]
    pub fn get_mut(&mut self, index: ServerIndex) -> Option<&mut T> {
        self.slots
            .get_mut(index.slot())
            .and_then(|slot| slot.entity.as_mut())
    }

    /// Whether `index` is in the current live list
    pub fn is_live(&self, index: ServerIndex) -> bool {
        self.live.contains(&index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Server indices in live order
    #[inline]
    pub fn live_indices(&self) -> &[ServerIndex] {
        &self.live
    }

    pub fn live_at(&self, position: usize) -> Option<&T> {
        self.live.get(position).and_then(|index| self.get(*index))
    }

    /// Live entities in dense order
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.live.iter().filter_map(move |index| self.get(*index))
    }

    /// Run `f` on every live entity in dense order
    pub fn for_each_live_mut(&mut self, mut f: impl FnMut(&mut T)) {
        let Self { slots, live, .. } = self;
        for index in live.iter() {
            if let Some(entity) = slots[index.slot()].entity.as_mut() {
                f(entity);
            }
        }
    }

    /// Shift every cached entity by a tile delta
    pub fn rebase(&mut self, dx_tiles: i32, dy_tiles: i32) {
        let dx = dx_tiles * mudsync_core::TILE_SIZE;
        let dy = dy_tiles * mudsync_core::TILE_SIZE;
        for entity in self.slots.iter_mut().filter_map(|slot| slot.entity.as_mut()) {
            entity.character_mut().rebase(dx, dy);
        }
    }

    /// Forget every entity
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = Slot::default();
        }
        self.live.clear();
        self.known.clear();
        self.tick = 0;
    }
}
