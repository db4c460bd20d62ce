//! Moving entities: players and NPCs
//!
//! Both share [`Character`], which owns the mesh position, the waypoint
//! ring fed by the sync messages and the per-entity timers the renderer
//! reads between ticks.

use mudsync_core::{EntityKind, MeshPosition, ServerIndex, TILE_SIZE};
use mudsync_protocol::{Appearance, Damage};

/// Slots in a waypoint ring
pub const WAYPOINT_RING_SIZE: usize = 10;

/// Mesh units walked per render tick with no backlog
pub const STEP_SIZE: i32 = 4;

/// Ticks an overhead chat line stays up
pub const MESSAGE_TICKS: u32 = 150;

/// Ticks an item bubble stays up
pub const BUBBLE_TICKS: u32 = 150;

/// Ticks a health bar stays up after a hit
pub const COMBAT_TICKS: u32 = 200;

/// Ticks a projectile is in flight
pub const PROJECTILE_TICKS: u32 = 50;

/// Facing codes above the eight compass directions
pub const FIGHTING_RIGHT: u8 = 8;
pub const FIGHTING_LEFT: u8 = 9;

// Facing codes produced by interpolation
const NORTH: u8 = 0;
const NORTH_WEST: u8 = 1;
const WEST: u8 = 2;
const SOUTH_WEST: u8 = 3;
const SOUTH: u8 = 4;
const SOUTH_EAST: u8 = 5;
const EAST: u8 = 6;
const NORTH_EAST: u8 = 7;

/// Who a projectile is flying at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileTarget {
    Player(ServerIndex),
    Npc(ServerIndex),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projectile {
    pub sprite: u16,
    pub target: ProjectileTarget,
    pub ticks_remaining: u32,
}

/// State shared by players and NPCs
///
/// # Waypoints
///
/// `waypoint_cursor` is the write head: the most recent target the server
/// sent. `target_waypoint` is the read head: the slot the interpolator is
/// walking toward. Both wrap at [`WAYPOINT_RING_SIZE`]. The server never has
/// more than ten moves in flight, so the ring never overruns the reader.
#[derive(Debug, Clone)]
pub struct Character {
    pub server_index: ServerIndex,
    pub current: MeshPosition,
    waypoints: [MeshPosition; WAYPOINT_RING_SIZE],
    waypoint_cursor: usize,
    target_waypoint: usize,
    pub animation_current: u8,
    pub animation_next: u8,
    pub step_count: u32,
    pub message: Option<String>,
    pub message_ticks: u32,
    message_arrived: bool,
    pub bubble_item: Option<u16>,
    pub bubble_ticks: u32,
    pub damage_last: u8,
    pub health_current: u8,
    pub health_max: u8,
    pub combat_ticks: u32,
    pub projectile: Option<Projectile>,
}

impl Character {
    pub fn new(server_index: ServerIndex) -> Self {
        Self {
            server_index,
            current: MeshPosition::default(),
            waypoints: [MeshPosition::default(); WAYPOINT_RING_SIZE],
            waypoint_cursor: 0,
            target_waypoint: 0,
            animation_current: 0,
            animation_next: 0,
            step_count: 0,
            message: None,
            message_ticks: 0,
            message_arrived: false,
            bubble_item: None,
            bubble_ticks: 0,
            damage_last: 0,
            health_current: 0,
            health_max: 0,
            combat_ticks: 0,
            projectile: None,
        }
    }

    #[inline]
    pub fn waypoints(&self) -> &[MeshPosition; WAYPOINT_RING_SIZE] {
        &self.waypoints
    }

    #[inline]
    pub fn waypoint_cursor(&self) -> usize {
        self.waypoint_cursor
    }

    #[inline]
    pub fn target_waypoint(&self) -> usize {
        self.target_waypoint
    }

    /// Most recent target written by the server
    #[inline]
    pub fn latest_waypoint(&self) -> MeshPosition {
        self.waypoints[self.waypoint_cursor]
    }

    /// Place the entity at `position` with an empty path
    pub fn reset_path(&mut self, position: MeshPosition) {
        self.current = position;
        self.waypoints = [position; WAYPOINT_RING_SIZE];
        self.waypoint_cursor = 0;
        self.target_waypoint = 0;
    }

    /// Queue `position` as the next target unless it is already the latest
    ///
    /// # Returns
    /// `true` if a waypoint was written
    pub fn push_waypoint(&mut self, position: MeshPosition) -> bool {
        if self.latest_waypoint() == position {
            return false;
        }
        self.waypoint_cursor = (self.waypoint_cursor + 1) % WAYPOINT_RING_SIZE;
        self.waypoints[self.waypoint_cursor] = position;
        true
    }

    /// Shift every stored coordinate by a mesh-space delta
    pub fn rebase(&mut self, dx: i32, dy: i32) {
        self.current = self.current.offset(dx, dy);
        for waypoint in self.waypoints.iter_mut() {
            *waypoint = waypoint.offset(dx, dy);
        }
    }

    /// Show an overhead chat line and flag it for the renderer
    pub fn say(&mut self, text: String) {
        self.message = Some(text);
        self.message_ticks = MESSAGE_TICKS;
        self.message_arrived = true;
    }

    /// The chat line that arrived since the last call, if any
    pub fn take_new_message(&mut self) -> Option<&str> {
        if !std::mem::take(&mut self.message_arrived) {
            return None;
        }
        self.message.as_deref()
    }

    #[inline]
    pub fn has_new_message(&self) -> bool {
        self.message_arrived
    }

    pub fn show_bubble(&mut self, item_id: u16) {
        self.bubble_item = Some(item_id);
        self.bubble_ticks = BUBBLE_TICKS;
    }

    pub fn apply_damage(&mut self, damage: Damage) {
        self.damage_last = damage.damage;
        self.health_current = damage.current;
        self.health_max = damage.max;
        self.combat_ticks = COMBAT_TICKS;
    }

    pub fn launch_projectile(&mut self, sprite: u16, target: ProjectileTarget) {
        self.projectile = Some(Projectile {
            sprite,
            target,
            ticks_remaining: PROJECTILE_TICKS,
        });
    }

    pub fn is_fighting(&self) -> bool {
        matches!(self.animation_current, FIGHTING_RIGHT | FIGHTING_LEFT)
    }

    /// Whether the read head still has targets to walk to
    pub fn is_moving(&self) -> bool {
        (self.waypoint_cursor + 1) % WAYPOINT_RING_SIZE != self.target_waypoint
    }

    /// Walk one render tick toward the read head
    ///
    /// Speed scales with the number of queued targets. A character more than
    /// eight targets behind, or more than three tiles from its target, is
    /// snapped to the target instead.
    pub fn traverse_path(&mut self) {
        let head = (self.waypoint_cursor + 1) % WAYPOINT_RING_SIZE;
        let next = self.target_waypoint;
        if next == head {
            self.animation_current = self.animation_next;
            return;
        }

        let mut backlog = head as i32 - next as i32;
        if backlog < 1 {
            backlog += WAYPOINT_RING_SIZE as i32;
        }
        let step = (backlog - 1).max(1) * STEP_SIZE;
        let target = self.waypoints[next];
        let dx = self.current.x - target.x;
        let dy = self.current.y - target.y;

        if backlog > 8 || dx.abs() > TILE_SIZE * 3 || dy.abs() > TILE_SIZE * 3 {
            self.current = target;
            self.target_waypoint = (next + 1) % WAYPOINT_RING_SIZE;
            return;
        }

        let mut facing = None;
        if dx != 0 {
            self.step_count += 1;
            if dx > 0 {
                self.current.x -= step;
                facing = Some(EAST);
            } else {
                self.current.x += step;
                facing = Some(WEST);
            }
            if (self.current.x - target.x).abs() < step {
                self.current.x = target.x;
            }
        }
        if dy != 0 {
            self.step_count += 1;
            let north = dy > 0;
            if north {
                self.current.y -= step;
            } else {
                self.current.y += step;
            }
            facing = Some(match (facing, north) {
                (None, true) => NORTH,
                (None, false) => SOUTH,
                (Some(WEST), true) => NORTH_WEST,
                (Some(WEST), false) => SOUTH_WEST,
                (Some(_), true) => NORTH_EAST,
                (Some(_), false) => SOUTH_EAST,
            });
            if (self.current.y - target.y).abs() < step {
                self.current.y = target.y;
            }
        }

        if let Some(facing) = facing {
            self.animation_current = facing;
        }
        if self.current == target {
            self.target_waypoint = (next + 1) % WAYPOINT_RING_SIZE;
        }
    }

    /// Advance one render tick: walk and count down timers
    pub fn tick(&mut self) {
        self.traverse_path();
        self.message_ticks = self.message_ticks.saturating_sub(1);
        if self.message_ticks == 0 {
            self.message = None;
        }
        self.bubble_ticks = self.bubble_ticks.saturating_sub(1);
        if self.bubble_ticks == 0 {
            self.bubble_item = None;
        }
        self.combat_ticks = self.combat_ticks.saturating_sub(1);
        if let Some(projectile) = self.projectile.as_mut() {
            projectile.ticks_remaining = projectile.ticks_remaining.saturating_sub(1);
            if projectile.ticks_remaining == 0 {
                self.projectile = None;
            }
        }
    }
}

/// Entity stored in an [`EntityRegistry`](crate::EntityRegistry)
pub trait Tracked {
    const KIND: EntityKind;

    /// Fresh entity for a server index seen for the first time
    fn spawn(index: ServerIndex) -> Self;

    fn character(&self) -> &Character;

    fn character_mut(&mut self) -> &mut Character;
}

/// Another player
#[derive(Debug, Clone)]
pub struct Player {
    pub character: Character,
    /// Latest appearance; kept across removals so the ticket can be reused
    pub appearance: Option<Appearance>,
}

impl Player {
    pub fn name(&self) -> Option<&str> {
        self.appearance.as_ref().map(|a| a.name.as_str())
    }
}

impl Tracked for Player {
    const KIND: EntityKind = EntityKind::Player;

    fn spawn(index: ServerIndex) -> Self {
        Self {
            character: Character::new(index),
            appearance: None,
        }
    }

    #[inline]
    fn character(&self) -> &Character {
        &self.character
    }

    #[inline]
    fn character_mut(&mut self) -> &mut Character {
        &mut self.character
    }
}

/// Non-player character
#[derive(Debug, Clone)]
pub struct Npc {
    pub character: Character,
    pub type_id: u16,
}

impl Tracked for Npc {
    const KIND: EntityKind = EntityKind::Npc;

    fn spawn(index: ServerIndex) -> Self {
        Self {
            character: Character::new(index),
            type_id: 0,
        }
    }

    #[inline]
    fn character(&self) -> &Character {
        &self.character
    }

    #[inline]
    fn character_mut(&mut self) -> &mut Character {
        &mut self.character
    }
}
