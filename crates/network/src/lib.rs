//! # World Sync Networking Layer
//!
//! Tokio-based transport and dispatch for the world sync client.
//!
//! ## Modules
//!
//! - [`codec`] - Length-prefixed frame codec for `tokio_util`
//! - [`config`] - Session tuning options
//! - [`handlers`] - Opcode handler registry
//! - [`dispatcher`] - Phase checks and the error policy
//! - [`session`] - Connect, read, tick and write loop

pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod handlers;
pub mod session;

// Re-export commonly used items
pub use codec::FrameCodec;
pub use config::NetworkConfig;
pub use dispatcher::{DispatchOutcome, OpcodeDispatcher, DEFAULT_MAX_ERROR_REPORTS};
pub use handlers::{Flow, HandlerFunction, HandlerRegistry, SyncContext};
pub use session::{connect, ClientCommand, Session, SessionEnd};
