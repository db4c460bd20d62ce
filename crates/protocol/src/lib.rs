//! # MudSync Protocol Library
//!
//! Wire-level half of the world sync client: everything needed to turn
//! received bytes into typed messages, and typed requests into bytes.
//!
//! ## Architecture
//!
//! ### 1. Bit cursor ([`bit_reader`])
//! MSB-first field reads across byte boundaries, big-endian integers, smart
//! integers and Latin-1 strings. [`BitWriter`] packs in the same order.
//!
//! ### 2. Chat codec ([`chat_codec`])
//! Canonical prefix code for chat text, built once by [`init_codec`] and
//! passed around as an `Arc<ChatCodec>`.
//!
//! ### 3. Opcodes ([`opcodes`])
//! Server and client opcode enums plus the session [`Phase`].
//!
//! ### 4. Messages ([`sync_messages`], [`update_messages`])
//! Region deltas and entity updates decoded into tagged records. Sentinel
//! values on the wire (removal bits, `0xFF` chunk clears, high-bit item ids)
//! become enum variants here so nothing downstream sees them.
//!
//! ### 5. Framing and outgoing packets ([`frame`], [`packet_builder`])
//!
//! ## Usage Example
//!
//! ```rust
//! use mudsync_protocol::{init_codec, BitReader};
//!
//! let codec = init_codec();
//! let encoded = codec.encode("hello world");
//! assert_eq!(codec.decode(&encoded.bytes, encoded.symbol_count).text, "hello world");
//!
//! let mut reader = BitReader::new(&[0b1010_0000, 0x01]);
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! assert_eq!(reader.read_bits(13).unwrap(), 1);
//! ```

pub mod bit_reader;
pub mod chat_codec;
pub mod frame;
pub mod names;
pub mod opcodes;
pub mod packet_builder;
pub mod sync_messages;
pub mod update_messages;

pub use bit_reader::{BitReader, BitWriter};
pub use chat_codec::{init_codec, normalize, ChatCodec, DecodedChat, EncodedChat, MAX_MESSAGE_LENGTH};
pub use frame::{decode_frame, encode_frame, Frame, DEFAULT_MAX_FRAME_LEN};
pub use names::{decode_name, encode_name};
pub use opcodes::{ClientOpcode, Phase, ServerOpcode};
pub use packet_builder::ExceptionReport;
pub use sync_messages::{
    decode_ground_items, decode_scenery, decode_walls, AddRecord, CharacterSync, Direction,
    GroundItemRecord, KnownUpdate, SceneryRecord, SyncHeader, WallRecord,
};
pub use update_messages::{
    decode_friend_list, decode_ignore_list, decode_npc_updates, decode_player_updates,
    decode_server_message, Appearance, Damage, FriendMessage, FriendStatus, NpcUpdate,
    NpcUpdateRecord, PlayerUpdate, PlayerUpdateRecord, WorldInfo,
};
