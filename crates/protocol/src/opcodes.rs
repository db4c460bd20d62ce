//! # Opcode Definitions
//!
//! Numeric message identifiers for both directions of a world session.
//!
//! The first byte of every frame is the opcode; the rest is the payload.
//! Server opcodes carry a phase: most are only meaningful once the client is
//! in the world, a few (connection teardown, plain messages) can arrive at
//! any time.

/// Protocol phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No world session; waiting for a (re)connect
    Login,
    /// Logged in and receiving world updates
    World,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::World => "world",
        }
    }
}

/// Messages sent by the world server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServerOpcode {
    /// The server is ending the session
    CloseConnection = 4,

    /// Local player index and plane geometry
    ///
    /// # Packet Format
    /// ```text
    /// {u16 server index}{u16 plane width}{u16 plane height}{u16 plane}{u16 plane multiplier}
    /// ```
    WorldInfo = 25,

    /// Scenery objects delta
    ///
    /// # Packet Format
    /// ```text
    /// ({0xFF}{i8 dx}{i8 dy} | {u16 id}{i8 dx}{i8 dy})*
    /// ```
    RegionObjects = 48,

    /// NPC positions delta (bit packed, see [`crate::sync_messages`])
    RegionNpcs = 79,

    /// Wall objects delta
    ///
    /// # Packet Format
    /// ```text
    /// ({0xFF}{i8 dx}{i8 dy} | {u16 id}{i8 dx}{i8 dy}{u8 direction})*
    /// ```
    RegionWallObjects = 91,

    /// Ground items delta
    ///
    /// # Packet Format
    /// ```text
    /// ({0xFF}{i8 dx}{i8 dy} | {u16 id | 0x8000 to remove}{i8 dx}{i8 dy})*
    /// ```
    RegionGroundItems = 99,

    /// NPC chat and damage
    RegionNpcUpdate = 104,

    /// Full friend list, sent after login
    ///
    /// # Packet Format
    /// ```text
    /// {u8 count}({u64 name}{u8 online})*
    /// ```
    FriendList = 71,

    /// Ignore list, sent after login
    ///
    /// # Packet Format
    /// ```text
    /// {u8 count}{u64 name}*
    /// ```
    IgnoreList = 109,

    /// Private message from another player
    ///
    /// # Packet Format
    /// ```text
    /// {u64 sender name}{u32 message id}{smart count}{packed chat}
    /// ```
    FriendMessage = 120,

    /// One friend logged in, out or was added
    ///
    /// # Packet Format
    /// ```text
    /// {u64 name}{u8 online}
    /// ```
    FriendStatusChange = 149,

    /// Plain Latin-1 server message
    Message = 131,

    /// The server refused a logout request
    LogoutDeny = 183,

    /// Player positions delta (bit packed, see [`crate::sync_messages`])
    RegionPlayers = 191,

    /// Player chat, damage, projectiles and appearance
    RegionPlayerUpdate = 234,
}

impl ServerOpcode {
    /// Convert a raw opcode byte
    ///
    /// # Returns
    /// `None` for opcodes this client does not know.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            4 => Some(Self::CloseConnection),
            25 => Some(Self::WorldInfo),
            48 => Some(Self::RegionObjects),
            71 => Some(Self::FriendList),
            79 => Some(Self::RegionNpcs),
            91 => Some(Self::RegionWallObjects),
            99 => Some(Self::RegionGroundItems),
            104 => Some(Self::RegionNpcUpdate),
            109 => Some(Self::IgnoreList),
            120 => Some(Self::FriendMessage),
            131 => Some(Self::Message),
            149 => Some(Self::FriendStatusChange),
            183 => Some(Self::LogoutDeny),
            191 => Some(Self::RegionPlayers),
            234 => Some(Self::RegionPlayerUpdate),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether the opcode may be handled in `phase`
    pub fn valid_in(self, phase: Phase) -> bool {
        match self {
            Self::CloseConnection | Self::Message => true,
            _ => phase == Phase::World,
        }
    }
}

/// Messages sent by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientOpcode {
    /// Diagnostic report after a failed message
    PacketException = 3,
    /// Orderly disconnect
    CloseConnection = 31,
    /// Keep-alive
    Ping = 67,
    /// Public chat line
    Chat = 216,
}

impl ClientOpcode {
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
