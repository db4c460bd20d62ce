//! # Region Sync Engine
//!
//! Applies decoded region messages to a [`WorldState`].
//!
//! Every message is decoded into tagged records before the world is
//! touched, so a truncated or malformed payload leaves the world exactly as
//! it was. An invariant violation found while applying (an index outside
//! the arena, a live list overflow, an index listed twice) is returned as a
//! handler error; the session ends and the world is reset, so a partially
//! applied tick is never rendered.
//!
//! # Player sync
//! ```text
//! header            local player absolute tile + facing, may load a sector
//! known[0..n]       previous live list positions 1..=n (0 is the local player)
//! added*            new players, tile offsets relative to the local player
//! ```
//!
//! # NPC sync
//! Same body without the header. Known slots address positions from 0.

use std::sync::Arc;

use mudsync_core::{ChunkPosition, Result, SyncError, TilePosition, TILE_SIZE};
use mudsync_protocol::{
    decode_friend_list, decode_ground_items, decode_ignore_list, decode_npc_updates,
    decode_player_updates, decode_scenery, decode_server_message, decode_walls, CharacterSync,
    ChatCodec, FriendMessage, FriendStatus, GroundItemRecord, KnownUpdate, NpcUpdate, PlayerUpdate, SceneryRecord, WallRecord,
    WorldInfo,
};
use tracing::{debug, info, trace};

use crate::character::{ProjectileTarget, Tracked};
use crate::collaborators::{SectorLoader, WorldMap};
use crate::error::WorldError;
use crate::registry::EntityRegistry;
use crate::social::{FriendChange, MAX_IGNORES};
use crate::state::WorldState;
use crate::tile_entities::{GroundItem, SceneryObject, WallObject};

/// Tunables for applying sync messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// NPC type ids at or above this are unknown to the client
    pub npc_type_count: u16,
    /// Type substituted for unknown NPC types
    pub fallback_npc_type: u16,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self {
            npc_type_count: 794,
            fallback_npc_type: 24,
        }
    }

    #[inline]
    pub fn clamp_npc_type(&self, type_id: u16) -> u16 {
        if type_id >= self.npc_type_count {
            self.fallback_npc_type
        } else {
            type_id
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RegionSyncEngine {
    codec: Arc<ChatCodec>,
    loader: Box<dyn SectorLoader + Send>,
    map: Box<dyn WorldMap + Send>,
    config: SyncConfig,
}

impl RegionSyncEngine {
    pub fn new(
        codec: Arc<ChatCodec>,
        loader: Box<dyn SectorLoader + Send>,
        map: Box<dyn WorldMap + Send>,
        config: SyncConfig,
    ) -> Self {
        debug!("Creating region sync engine with {:?}", config);
        Self {
            codec,
            loader,
            map,
            config,
        }
    }

    #[inline]
    pub fn codec(&self) -> &Arc<ChatCodec> {
        &self.codec
    }

    #[inline]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Apply a player sync message
    pub fn sync_players(&mut self, world: &mut WorldState, payload: &[u8]) -> Result<()> {
        let message = CharacterSync::decode_players(payload)?;
        let header = message
            .header
            .ok_or_else(|| SyncError::Handler("Player sync without header".to_string()))?;
        // Position 0 of the previous list is the local player
        check_known_count(&world.players, message.known.len(), 1)?;

        let rebase = world.region.track(
            i32::from(header.tile_x),
            i32::from(header.tile_y),
            self.loader.as_mut(),
        );
        if let Some(rebase) = rebase {
            world.rebase(rebase);
        }

        let local_tile = world.region.local_tile;
        let local_mesh = local_tile.to_mesh();
        world.players.begin_tick();
        let local = world
            .players
            .create_or_update(world.local_player, local_mesh, header.facing)?;
        if rebase.is_some() {
            // New sector: drop in-flight interpolation
            local.character.reset_path(local_mesh);
        }

        apply_known(&mut world.players, &message.known, 1)?;

        for add in &message.added {
            let tile = local_tile.offset(add.dx, add.dy);
            world
                .players
                .create_or_update(add.server_index, tile.to_mesh(), add.facing)?;
        }

        debug!(
            "Player sync: {} known, {} added, {} live",
            message.known.len(),
            message.added.len(),
            world.players.len()
        );
        Ok(())
    }

    /// Apply an NPC sync message
    pub fn sync_npcs(&mut self, world: &mut WorldState, payload: &[u8]) -> Result<()> {
        let message = CharacterSync::decode_npcs(payload)?;
        check_known_count(&world.npcs, message.known.len(), 0)?;

        let local_tile = world.region.local_tile;
        world.npcs.begin_tick();
        apply_known(&mut world.npcs, &message.known, 0)?;

        for add in &message.added {
            let tile = local_tile.offset(add.dx, add.dy);
            let raw_type = add.type_id.unwrap_or_default();
            let type_id = self.config.clamp_npc_type(raw_type);
            if type_id != raw_type {
                debug!("NPC {} has unknown type {}, using {}", add.server_index, raw_type, type_id);
            }
            let npc = world
                .npcs
                .create_or_update(add.server_index, tile.to_mesh(), add.facing)?;
            npc.type_id = type_id;
        }

        debug!(
            "NPC sync: {} known, {} added, {} live",
            message.known.len(),
            message.added.len(),
            world.npcs.len()
        );
        Ok(())
    }

    /// Apply a ground item delta message
    pub fn sync_ground_items(&mut self, world: &mut WorldState, payload: &[u8]) -> Result<()> {
        let records = decode_ground_items(payload)?;
        let local = world.region.local_tile;

        for record in records {
            match record {
                GroundItemRecord::ChunkClear { dx, dy } => {
                    let chunk = chunk_at(local, dx, dy);
                    let removed = world.ground_items.clear_chunk(chunk);
                    trace!("Cleared {} ground items in chunk {:?}", removed, chunk);
                }
                GroundItemRecord::Remove { dx, dy, item_id } => {
                    let tile = local.offset(dx, dy);
                    if world
                        .ground_items
                        .remove_first(|item| item.tile == tile && item.item_id == item_id)
                        .is_none()
                    {
                        trace!("No ground item {} at {:?} to remove", item_id, tile);
                    }
                }
                GroundItemRecord::Add { dx, dy, item_id } => {
                    let tile = local.offset(dx, dy);
                    let elevation = world
                        .scenery
                        .iter()
                        .find(|object| object.tile == tile)
                        .map(|object| self.map.elevation_of(object.object_id))
                        .unwrap_or(0);
                    world.ground_items.push(GroundItem {
                        tile,
                        item_id,
                        elevation,
                    })?;
                }
            }
        }

        debug!("Ground items: {} tracked", world.ground_items.len());
        Ok(())
    }

    /// Apply a scenery delta message
    pub fn sync_scenery(&mut self, world: &mut WorldState, payload: &[u8]) -> Result<()> {
        let records = decode_scenery(payload)?;
        let local = world.region.local_tile;
        let map = self.map.as_mut();

        for record in records {
            match record {
                SceneryRecord::ChunkClear { dx, dy } => {
                    let chunk = chunk_at(local, dx, dy);
                    world.scenery.retain_with(
                        |object| !chunk.contains(object.tile),
                        |object| map.scenery_removed(object.tile, object.object_id, object.direction),
                    );
                }
                SceneryRecord::Remove { dx, dy } => {
                    remove_scenery_at(world, map, local.offset(dx, dy));
                }
                SceneryRecord::Place { dx, dy, object_id } => {
                    let tile = local.offset(dx, dy);
                    remove_scenery_at(world, map, tile);

                    let direction = map.tile_direction(tile);
                    let (width, height) = map.object_size(object_id);
                    let (width, height) = if direction == 0 || direction == 4 {
                        (width, height)
                    } else {
                        (height, width)
                    };
                    world.scenery.push(SceneryObject {
                        tile,
                        object_id,
                        direction,
                        width,
                        height,
                    })?;
                    map.scenery_added(tile, object_id, direction);
                }
            }
        }

        debug!("Scenery: {} tracked", world.scenery.len());
        Ok(())
    }

    /// Apply a wall object delta message
    pub fn sync_walls(&mut self, world: &mut WorldState, payload: &[u8]) -> Result<()> {
        let records = decode_walls(payload)?;
        let local = world.region.local_tile;
        let map = self.map.as_mut();

        for record in records {
            match record {
                WallRecord::ChunkClear { dx, dy } => {
                    let chunk = chunk_at(local, dx, dy);
                    world.walls.retain_with(
                        |wall| !chunk.contains(wall.tile),
                        |wall| map.wall_removed(wall.tile, wall.object_id, wall.direction),
                    );
                }
                WallRecord::Remove { dx, dy, direction } => {
                    remove_wall_at(world, map, local.offset(dx, dy), direction);
                }
                WallRecord::Place {
                    dx,
                    dy,
                    direction,
                    object_id,
                } => {
                    let tile = local.offset(dx, dy);
                    remove_wall_at(world, map, tile, direction);
                    world.walls.push(WallObject {
                        tile,
                        direction,
                        object_id,
                    })?;
                    map.wall_added(tile, object_id, direction);
                }
            }
        }

        debug!("Walls: {} tracked", world.walls.len());
        Ok(())
    }

    /// Apply bubbles, chat, damage, projectiles and appearances to players
    pub fn apply_player_updates(&mut self, world: &mut WorldState, payload: &[u8]) -> Result<()> {
        let records = decode_player_updates(payload, &self.codec)?;
        let count = records.len();

        for record in records {
            let Some(player) = world.players.get_mut(record.server_index) else {
                trace!("Update for unknown player {}", record.server_index);
                continue;
            };
            match record.update {
                PlayerUpdate::Bubble { item_id } => player.character.show_bubble(item_id),
                PlayerUpdate::Chat(text) => {
                    let sender = player.name().unwrap_or_default().to_string();
                    player.character.say(text.clone());
                    world.messages.push_chat(sender, text);
                }
                PlayerUpdate::Damage(damage) => player.character.apply_damage(damage),
                PlayerUpdate::NpcProjectile { sprite, target } => player
                    .character
                    .launch_projectile(sprite, ProjectileTarget::Npc(target)),
                PlayerUpdate::PlayerProjectile { sprite, target } => player
                    .character
                    .launch_projectile(sprite, ProjectileTarget::Player(target)),
                PlayerUpdate::Appearance(appearance) => {
                    trace!("{} appearance ticket {}", record.server_index, appearance.ticket);
                    player.appearance = Some(appearance);
                }
                PlayerUpdate::QuestMessage(text) => player.character.say(text),
            }
        }

        debug!("Applied {} player updates", count);
        Ok(())
    }

    /// Apply chat and damage to NPCs
    pub fn apply_npc_updates(&mut self, world: &mut WorldState, payload: &[u8]) -> Result<()> {
        let records = decode_npc_updates(payload, &self.codec)?;
        let count = records.len();

        for record in records {
            let Some(npc) = world.npcs.get_mut(record.server_index) else {
                trace!("Update for unknown NPC {}", record.server_index);
                continue;
            };
            match record.update {
                NpcUpdate::Chat { target, text } => {
                    if target == world.local_player {
                        trace!("NPC {} speaks to the local player", record.server_index);
                    }
                    npc.character.say(text);
                }
                NpcUpdate::Damage(damage) => npc.character.apply_damage(damage),
            }
        }

        debug!("Applied {} NPC updates", count);
        Ok(())
    }

    /// Take the local player index and plane geometry
    pub fn apply_world_info(&mut self, world: &mut WorldState, payload: &[u8]) -> Result<()> {
        let world_info = WorldInfo::decode(payload)?;
        world.local_player = world_info.local_index;
        world.region.apply_world_info(&world_info);
        info!(
            "Local player is {} on plane {}",
            world_info.local_index, world_info.plane
        );
        Ok(())
    }

    pub fn apply_server_message(&mut self, world: &mut WorldState, payload: &[u8]) -> Result<()> {
        let text = decode_server_message(payload);
        info!("Server message: {}", text);
        world.messages.push_server(text);
        Ok(())
    }

    pub fn apply_friend_message(&mut self, world: &mut WorldState, payload: &[u8]) -> Result<()> {
        let message = FriendMessage::decode(payload, &self.codec)?;
        if !world
            .messages
            .push_friend(message.message_id, message.sender, message.text)
        {
            debug!("Dropped repeated friend message {}", message.message_id);
        }
        Ok(())
    }

    /// Replace the friend list
    pub fn apply_friend_list(&mut self, world: &mut WorldState, payload: &[u8]) -> Result<()> {
        let statuses = decode_friend_list(payload)?;
        world.friends.replace(statuses);
        debug!("Friend list: {} entries", world.friends.len());
        Ok(())
    }

    /// Update one friend and announce logins and logouts
    pub fn apply_friend_status(&mut self, world: &mut WorldState, payload: &[u8]) -> Result<()> {
        let status = FriendStatus::decode(payload)?;
        match world.friends.apply_status(status) {
            FriendChange::LoggedIn(name) => {
                world.messages.push_server(format!("{} has logged in", name));
            }
            FriendChange::LoggedOut(name) => {
                world.messages.push_server(format!("{} has logged out", name));
            }
            FriendChange::Dropped => {
                debug!("Friend list full, dropping {:#x}", status.name_hash);
            }
            FriendChange::Updated | FriendChange::Added => {}
        }
        Ok(())
    }

    /// Replace the ignore list
    pub fn apply_ignore_list(&mut self, world: &mut WorldState, payload: &[u8]) -> Result<()> {
        let mut ignores = decode_ignore_list(payload)?;
        ignores.truncate(MAX_IGNORES);
        debug!("Ignore list: {} entries", ignores.len());
        world.ignores = ignores;
        Ok(())
    }
}

impl std::fmt::Debug for RegionSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionSyncEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn chunk_at(local: TilePosition, dx: i32, dy: i32) -> ChunkPosition {
    local.offset(dx, dy).chunk()
}

/// Refuse a message addressing more entries than were live last tick
fn check_known_count<T: Tracked>(
    registry: &EntityRegistry<T>,
    announced: usize,
    first_position: usize,
) -> std::result::Result<(), WorldError> {
    // The current live list becomes the known list at begin_tick
    let available = registry.len().saturating_sub(first_position);
    if announced > available {
        return Err(WorldError::KnownCountMismatch {
            kind: T::KIND,
            announced,
            available,
        });
    }
    Ok(())
}

/// Carry over or drop each known entity, in previous-tick order
fn apply_known<T: Tracked>(
    registry: &mut EntityRegistry<T>,
    known: &[KnownUpdate],
    first_position: usize,
) -> Result<()> {
    for (i, update) in known.iter().enumerate() {
        let position = first_position + i;
        match *update {
            KnownUpdate::Unchanged => {
                registry.carry_over(position)?;
            }
            KnownUpdate::Move(direction) => {
                let character = registry.carry_over(position)?.character_mut();
                let (dx, dy) = direction.delta();
                let target = character.latest_waypoint().offset(dx * TILE_SIZE, dy * TILE_SIZE);
                character.push_waypoint(target);
                character.animation_next = direction.as_u8();
            }
            KnownUpdate::Status(code) => {
                registry.carry_over(position)?.character_mut().animation_next = code;
            }
            KnownUpdate::Remove => {
                if let Some(index) = registry.known_at(position) {
                    trace!("{} {} leaves view", T::KIND, index);
                }
            }
        }
    }
    Ok(())
}

fn remove_scenery_at(world: &mut WorldState, map: &mut (dyn WorldMap + Send), tile: TilePosition) {
    world.scenery.retain_with(
        |object| object.tile != tile,
        |object| map.scenery_removed(object.tile, object.object_id, object.direction),
    );
}

fn remove_wall_at(
    world: &mut WorldState,
    map: &mut (dyn WorldMap + Send),
    tile: TilePosition,
    direction: u8,
) {
    world.walls.retain_with(
        |wall| !(wall.tile == tile && wall.direction == direction),
        |wall| map.wall_removed(wall.tile, wall.object_id, wall.direction),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::HeadlessWorld;
    use crate::state::LogLine;
    use mudsync_core::{MeshPosition, ServerIndex};
    use mudsync_protocol::{encode_name, init_codec, BitWriter, Direction};
    use std::sync::Mutex;

    fn engine() -> RegionSyncEngine {
        engine_with_map(Box::new(HeadlessWorld::new()))
    }

    fn engine_with_map(map: Box<dyn WorldMap + Send>) -> RegionSyncEngine {
        RegionSyncEngine::new(
            init_codec(),
            Box::new(HeadlessWorld::new()),
            map,
            SyncConfig::default(),
        )
    }

    fn mesh(x: i32, y: i32) -> MeshPosition {
        TilePosition::new(x, y).to_mesh()
    }

    fn put_known(writer: &mut BitWriter, update: KnownUpdate) {
        match update {
            KnownUpdate::Unchanged => writer.put_bit(false),
            KnownUpdate::Move(direction) => {
                writer.put_bits(2, 0b10);
                writer.put_bits(3, direction.as_u8() as u32);
            }
            KnownUpdate::Status(code) => {
                writer.put_bits(2, 0b11);
                writer.put_bits(4, code as u32);
            }
            KnownUpdate::Remove => {
                writer.put_bits(2, 0b11);
                writer.put_bits(4, 0b1100);
            }
        }
    }

    fn npc_sync(known: &[KnownUpdate], added: &[(u32, i32, i32, u32)]) -> Vec<u8> {
        let mut writer = BitWriter::new();
        writer.put_bits(8, known.len() as u32);
        for update in known {
            put_known(&mut writer, *update);
        }
        for (index, dx, dy, type_id) in added {
            writer.put_bits(12, *index);
            writer.put_bits(5, (*dx as u32) & 0x1F);
            writer.put_bits(5, (*dy as u32) & 0x1F);
            writer.put_bits(4, 2);
            writer.put_bits(10, *type_id);
        }
        writer.into_bytes()
    }

    fn player_sync(tile: (u32, u32), known: &[KnownUpdate], added: &[(u32, i32, i32)]) -> Vec<u8> {
        let mut writer = BitWriter::new();
        writer.put_bits(11, tile.0);
        writer.put_bits(13, tile.1);
        writer.put_bits(4, 2);
        writer.put_bits(8, known.len() as u32);
        for update in known {
            put_known(&mut writer, *update);
        }
        for (index, dx, dy) in added {
            writer.put_bits(11, *index);
            writer.put_bits(5, (*dx as u32) & 0x1F);
            writer.put_bits(5, (*dy as u32) & 0x1F);
            writer.put_bits(3, 0);
        }
        writer.into_bytes()
    }

    fn world_at(x: i32, y: i32) -> WorldState {
        let mut world = WorldState::new();
        world.region.local_tile = TilePosition::new(x, y);
        world
    }

    #[test]
    fn test_npc_single_known_removed() {
        let mut engine = engine();
        let mut world = world_at(20, 20);
        engine
            .sync_npcs(&mut world, &npc_sync(&[], &[(3, 1, -1, 5)]))
            .unwrap();
        assert_eq!(world.npcs.len(), 1);
        let npc = world.npcs.live_at(0).unwrap();
        assert_eq!(npc.character.current, mesh(21, 19));
        assert_eq!(npc.type_id, 5);

        engine
            .sync_npcs(&mut world, &npc_sync(&[KnownUpdate::Remove], &[]))
            .unwrap();
        assert_eq!(world.npcs.len(), 0);
    }

    #[test]
    fn test_npc_removal_keeps_order() {
        let mut engine = engine();
        let mut world = world_at(20, 20);
        let added: Vec<_> = (10..15).map(|index| (index, 0, 0, 1)).collect();
        engine.sync_npcs(&mut world, &npc_sync(&[], &added)).unwrap();

        let known = [
            KnownUpdate::Unchanged,
            KnownUpdate::Status(3),
            KnownUpdate::Remove,
            KnownUpdate::Unchanged,
            KnownUpdate::Move(Direction::North),
        ];
        engine.sync_npcs(&mut world, &npc_sync(&known, &[])).unwrap();

        assert_eq!(
            world.npcs.live_indices(),
            &[ServerIndex(10), ServerIndex(11), ServerIndex(13), ServerIndex(14)]
        );
        assert_eq!(world.npcs.get(ServerIndex(11)).unwrap().character.animation_next, 3);
        let walker = &world.npcs.get(ServerIndex(14)).unwrap().character;
        assert_eq!(walker.waypoint_cursor(), 1);
        assert_eq!(walker.latest_waypoint(), mesh(20, 19));
        // 12 is out of view but still cached
        assert!(world.npcs.get(ServerIndex(12)).is_some());
        assert!(!world.npcs.is_live(ServerIndex(12)));
    }

    #[test]
    fn test_npc_type_falls_back() {
        let mut engine = engine();
        let mut world = world_at(20, 20);
        engine
            .sync_npcs(&mut world, &npc_sync(&[], &[(1, 0, 0, 900)]))
            .unwrap();
        assert_eq!(world.npcs.get(ServerIndex(1)).unwrap().type_id, 24);
    }

    #[test]
    fn test_truncated_npc_sync_leaves_world_alone() {
        let mut engine = engine();
        let mut world = world_at(20, 20);
        engine
            .sync_npcs(&mut world, &npc_sync(&[], &[(1, 0, 0, 1)]))
            .unwrap();

        let err = engine.sync_npcs(&mut world, &[5]).unwrap_err();
        assert!(matches!(err, SyncError::TruncatedMessage { .. }));
        assert_eq!(world.npcs.live_indices(), &[ServerIndex(1)]);
    }

    #[test]
    fn test_known_count_beyond_last_tick_fails() {
        let mut engine = engine();
        let mut world = world_at(20, 20);
        engine
            .sync_npcs(&mut world, &npc_sync(&[], &[(1, 0, 0, 1)]))
            .unwrap();

        let payload = npc_sync(&[KnownUpdate::Unchanged, KnownUpdate::Unchanged], &[]);
        let err = engine.sync_npcs(&mut world, &payload).unwrap_err();
        assert!(matches!(err, SyncError::Handler(_)));
        assert!(err.is_session_fatal());
        assert_eq!(world.npcs.len(), 1);
    }

    #[test]
    fn test_player_sync_places_and_moves() {
        let mut engine = engine();
        let mut world = WorldState::new();
        world.local_player = ServerIndex(5);

        engine
            .sync_players(&mut world, &player_sync((100, 100), &[], &[(9, 1, -2)]))
            .unwrap();
        assert_eq!(world.region.local_tile, TilePosition::new(52, 52));
        assert_eq!(world.players.live_indices(), &[ServerIndex(5), ServerIndex(9)]);
        assert_eq!(
            world.players.get(ServerIndex(9)).unwrap().character.current,
            mesh(53, 50)
        );

        let moved = player_sync((100, 101), &[KnownUpdate::Move(Direction::South)], &[]);
        engine.sync_players(&mut world, &moved).unwrap();
        let other = &world.players.get(ServerIndex(9)).unwrap().character;
        assert_eq!(other.latest_waypoint(), mesh(53, 51));
        let local = &world.local_player().unwrap().character;
        assert_eq!(local.waypoint_cursor(), 1);
        assert_eq!(local.latest_waypoint(), mesh(52, 53));
    }

    #[test]
    fn test_player_sync_sector_change_rebases() {
        let mut engine = engine();
        let mut world = WorldState::new();
        world.local_player = ServerIndex(5);
        engine
            .sync_players(&mut world, &player_sync((100, 100), &[], &[(9, 1, -2)]))
            .unwrap();
        engine
            .sync_players(&mut world, &player_sync((99, 100), &[], &[]))
            .unwrap();

        // Walk west out of the window: origin moves 48 tiles west
        let payload = player_sync((60, 100), &[], &[]);
        engine.sync_players(&mut world, &payload).unwrap();

        assert_eq!(world.region.local_tile, TilePosition::new(60, 52));
        let local = &world.local_player().unwrap().character;
        assert_eq!(local.current, mesh(60, 52));
        assert_eq!(local.waypoint_cursor(), 0);
        // Cached but no longer live, still rebased
        let other = &world.players.get(ServerIndex(9)).unwrap().character;
        assert_eq!(other.current, mesh(101, 50));
        assert!(other.waypoints().iter().all(|w| *w == mesh(101, 50)));
    }

    #[test]
    fn test_ground_item_chunk_clear_and_single_remove() {
        let mut engine = engine();
        let mut world = world_at(20, 20);

        let mut writer = BitWriter::new();
        for (item_id, dx) in [(10u16, 0i8), (11, 8), (12, 1), (13, 9)] {
            writer.put_u16(item_id);
            writer.put_u8(dx as u8);
            writer.put_u8(0);
        }
        engine.sync_ground_items(&mut world, writer.as_bytes()).unwrap();
        assert_eq!(world.ground_items.len(), 4);

        engine
            .sync_ground_items(&mut world, &[0xFF, 0, 0])
            .unwrap();
        let left: Vec<_> = world
            .ground_items
            .iter()
            .map(|item| (item.item_id, item.tile))
            .collect();
        assert_eq!(
            left,
            vec![(11, TilePosition::new(28, 20)), (13, TilePosition::new(29, 20))]
        );

        let mut writer = BitWriter::new();
        writer.put_u16(11 | 0x8000);
        writer.put_u8(8);
        writer.put_u8(0);
        engine.sync_ground_items(&mut world, writer.as_bytes()).unwrap();
        assert_eq!(world.ground_items.as_slice()[0].item_id, 13);
        assert_eq!(world.ground_items.len(), 1);
    }

    #[derive(Default)]
    struct RecordingMap {
        events: std::sync::Arc<Mutex<Vec<String>>>,
    }

    impl WorldMap for RecordingMap {
        fn tile_direction(&self, _tile: TilePosition) -> u8 {
            2
        }

        fn elevation_of(&self, object_id: u16) -> i32 {
            if object_id == 7 {
                96
            } else {
                0
            }
        }

        fn object_size(&self, _object_id: u16) -> (u8, u8) {
            (2, 1)
        }

        fn scenery_added(&mut self, tile: TilePosition, object_id: u16, _direction: u8) {
            self.events
                .lock()
                .unwrap()
                .push(format!("+scenery {} {},{}", object_id, tile.x, tile.y));
        }

        fn scenery_removed(&mut self, tile: TilePosition, object_id: u16, _direction: u8) {
            self.events
                .lock()
                .unwrap()
                .push(format!("-scenery {} {},{}", object_id, tile.x, tile.y));
        }

        fn wall_removed(&mut self, _tile: TilePosition, object_id: u16, direction: u8) {
            self.events
                .lock()
                .unwrap()
                .push(format!("-wall {} {}", object_id, direction));
        }
    }

    fn scenery_record(writer: &mut BitWriter, object_id: u16, dx: i8, dy: i8) {
        writer.put_u16(object_id);
        writer.put_u8(dx as u8);
        writer.put_u8(dy as u8);
    }

    #[test]
    fn test_scenery_replaces_and_rotates() {
        let map = RecordingMap::default();
        let events = map.events.clone();
        let mut engine = engine_with_map(Box::new(map));
        let mut world = world_at(20, 20);

        let mut writer = BitWriter::new();
        scenery_record(&mut writer, 7, 1, 1);
        scenery_record(&mut writer, 8, 1, 1);
        scenery_record(&mut writer, 9, 2, 2);
        engine.sync_scenery(&mut world, writer.as_bytes()).unwrap();

        let ids: Vec<_> = world.scenery.iter().map(|o| o.object_id).collect();
        assert_eq!(ids, vec![8, 9]);
        let first = world.scenery.as_slice()[0];
        assert_eq!((first.width, first.height, first.direction), (1, 2, 2));

        let mut writer = BitWriter::new();
        scenery_record(&mut writer, 60000, 2, 2);
        engine.sync_scenery(&mut world, writer.as_bytes()).unwrap();
        assert_eq!(world.scenery.len(), 1);

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "+scenery 7 21,21",
                "-scenery 7 21,21",
                "+scenery 8 21,21",
                "+scenery 9 22,22",
                "-scenery 9 22,22",
            ]
        );
    }

    #[test]
    fn test_ground_item_inherits_scenery_elevation() {
        let mut engine = engine_with_map(Box::new(RecordingMap::default()));
        let mut world = world_at(20, 20);

        let mut writer = BitWriter::new();
        scenery_record(&mut writer, 7, 0, 0);
        engine.sync_scenery(&mut world, writer.as_bytes()).unwrap();

        let mut writer = BitWriter::new();
        scenery_record(&mut writer, 500, 0, 0);
        scenery_record(&mut writer, 501, 1, 0);
        engine.sync_ground_items(&mut world, writer.as_bytes()).unwrap();

        let elevations: Vec<_> = world.ground_items.iter().map(|i| i.elevation).collect();
        assert_eq!(elevations, vec![96, 0]);
    }

    #[test]
    fn test_walls_keyed_by_direction() {
        let map = RecordingMap::default();
        let events = map.events.clone();
        let mut engine = engine_with_map(Box::new(map));
        let mut world = world_at(20, 20);

        let mut writer = BitWriter::new();
        for (object_id, direction) in [(1u16, 0u8), (2, 1), (3, 0)] {
            scenery_record(&mut writer, object_id, 0, 0);
            writer.put_u8(direction);
        }
        engine.sync_walls(&mut world, writer.as_bytes()).unwrap();
        let walls: Vec<_> = world
            .walls
            .iter()
            .map(|w| (w.object_id, w.direction))
            .collect();
        assert_eq!(walls, vec![(2, 1), (3, 0)]);

        let mut writer = BitWriter::new();
        scenery_record(&mut writer, 60000, 0, 0);
        writer.put_u8(1);
        engine.sync_walls(&mut world, writer.as_bytes()).unwrap();
        assert_eq!(world.walls.len(), 1);

        engine.sync_walls(&mut world, &[0xFF, 0, 0]).unwrap();
        assert!(world.walls.is_empty());
        assert_eq!(
            *events.lock().unwrap(),
            vec!["-wall 1 0", "-wall 2 1", "-wall 3 0"]
        );
    }

    #[test]
    fn test_player_updates() {
        let mut engine = engine();
        let mut world = WorldState::new();
        world.local_player = ServerIndex(5);
        engine
            .sync_players(&mut world, &player_sync((100, 100), &[], &[]))
            .unwrap();

        let codec = engine.codec().clone();
        let mut writer = BitWriter::new();
        writer.put_u16(4);
        // appearance
        writer.put_u16(5);
        writer.put_u8(5);
        writer.put_u16(1);
        writer.put_u64(encode_name("zezima"));
        writer.put_u8(2);
        writer.put_bytes(&[1, 2]);
        writer.put_bytes(&[3, 4, 5, 6, 70, 0]);
        // chat
        writer.put_u16(5);
        writer.put_u8(1);
        codec.write_message(&mut writer, "hello world");
        // damage
        writer.put_u16(5);
        writer.put_u8(2);
        writer.put_bytes(&[3, 7, 10]);
        // unknown player, skipped
        writer.put_u16(77);
        writer.put_u8(0);
        writer.put_u16(12);

        engine
            .apply_player_updates(&mut world, writer.as_bytes())
            .unwrap();

        let local = world.local_player().unwrap();
        assert_eq!(local.name(), Some("Zezima"));
        assert_eq!(local.character.message.as_deref(), Some("hello world"));
        assert_eq!(local.character.health_current, 7);
        assert_eq!(world.messages.len(), 1);
    }

    #[test]
    fn test_world_info_sets_local_player() {
        let mut engine = engine();
        let mut world = WorldState::new();
        let mut writer = BitWriter::new();
        for value in [42u16, 2304, 1776, 0, 944] {
            writer.put_u16(value);
        }
        engine.apply_world_info(&mut world, writer.as_bytes()).unwrap();
        assert_eq!(world.local_player, ServerIndex(42));
        assert_eq!(world.region.plane_width, 2304);
    }

    #[test]
    fn test_friend_message_deduplicated() {
        let mut engine = engine();
        let mut world = WorldState::new();
        let codec = engine.codec().clone();
        let mut writer = BitWriter::new();
        writer.put_u64(encode_name("friend"));
        writer.put_u32(99);
        codec.write_message(&mut writer, "hi");

        engine.apply_friend_message(&mut world, writer.as_bytes()).unwrap();
        engine.apply_friend_message(&mut world, writer.as_bytes()).unwrap();
        assert_eq!(world.messages.len(), 1);
    }

    #[test]
    fn test_server_message_logged() {
        let mut engine = engine();
        let mut world = WorldState::new();
        engine
            .apply_server_message(&mut world, b"Welcome to the world")
            .unwrap();
        assert_eq!(world.messages.len(), 1);
    }

    fn friend_status(writer: &mut BitWriter, name: &str, online: u8) {
        writer.put_u64(encode_name(name));
        writer.put_u8(online);
    }

    #[test]
    fn test_friend_list_and_status_changes() {
        let mut engine = engine();
        let mut world = WorldState::new();

        let mut writer = BitWriter::new();
        writer.put_u8(3);
        friend_status(&mut writer, "anna", 0);
        friend_status(&mut writer, "ben", 2);
        friend_status(&mut writer, "cole", 255);
        engine.apply_friend_list(&mut world, writer.as_bytes()).unwrap();
        let names: Vec<_> = world.friends.as_slice().iter().map(|f| f.name.clone()).collect();
        assert_eq!(names, vec!["Cole", "Ben", "Anna"]);

        let mut writer = BitWriter::new();
        friend_status(&mut writer, "anna", 255);
        engine.apply_friend_status(&mut world, writer.as_bytes()).unwrap();
        assert_eq!(world.friends.as_slice()[1].name, "Anna");
        assert_eq!(world.friends.len(), 3);

        let mut writer = BitWriter::new();
        friend_status(&mut writer, "cole", 0);
        engine.apply_friend_status(&mut world, writer.as_bytes()).unwrap();
        assert_eq!(world.friends.as_slice()[2].name, "Cole");

        let mut writer = BitWriter::new();
        friend_status(&mut writer, "dora", 0);
        engine.apply_friend_status(&mut world, writer.as_bytes()).unwrap();
        assert_eq!(world.friends.len(), 4);

        let lines: Vec<_> = world.messages.lines().cloned().collect();
        assert_eq!(
            lines,
            vec![
                LogLine::Server { text: "Anna has logged in".into() },
                LogLine::Server { text: "Cole has logged out".into() },
            ]
        );
    }

    #[test]
    fn test_truncated_friend_list_keeps_old_list() {
        let mut engine = engine();
        let mut world = WorldState::new();
        let mut writer = BitWriter::new();
        writer.put_u8(1);
        friend_status(&mut writer, "anna", 0);
        engine.apply_friend_list(&mut world, writer.as_bytes()).unwrap();

        let mut writer = BitWriter::new();
        writer.put_u8(2);
        friend_status(&mut writer, "ben", 0);
        assert!(engine.apply_friend_list(&mut world, writer.as_bytes()).is_err());
        assert_eq!(world.friends.len(), 1);
        assert!(world.friends.get(encode_name("anna")).is_some());
    }

    #[test]
    fn test_ignore_list_replaced() {
        let mut engine = engine();
        let mut world = WorldState::new();
        world.ignores.push(encode_name("old"));

        let mut writer = BitWriter::new();
        writer.put_u8(2);
        writer.put_u64(encode_name("spam"));
        writer.put_u64(encode_name("troll"));
        engine.apply_ignore_list(&mut world, writer.as_bytes()).unwrap();
        assert_eq!(world.ignores, vec![encode_name("spam"), encode_name("troll")]);
    }
}
