//! # Network Configuration
//!
//! Connection and tick settings for a world session.
//!
//! # Example
//!
//! ```rust
//! use mudsync_network::NetworkConfig;
//! use std::time::Duration;
//!
//! let config = NetworkConfig {
//!     server_address: "127.0.0.1:43594".to_string(),
//!     tick_interval: Duration::from_millis(20),
//!     max_backlog: 128,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use mudsync_config::ClientConfig;

/// Session options
///
/// # Back-pressure
///
/// Frames travel from the socket reader to the tick loop through a channel
/// of `max_backlog` entries. When it is full the reader stops reading, the
/// kernel buffer fills and TCP flow control slows the server down. Nothing
/// is dropped.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// `host:port` of the world server
    pub server_address: String,

    /// How long to wait for the TCP connect
    ///
    /// # Default
    /// 10 seconds
    pub connect_timeout: Duration,

    /// Interval between ticks; each tick drains frames then advances movement
    ///
    /// # Default
    /// 20 milliseconds
    pub tick_interval: Duration,

    /// Idle time without inbound frames before a keep-alive is sent
    ///
    /// # Default
    /// 5 seconds
    pub ping_interval: Duration,

    /// Frames buffered between the socket reader and the tick loop
    ///
    /// # Default
    /// 256 frames
    pub max_backlog: usize,

    /// Frames dispatched per tick
    ///
    /// # Default
    /// 64 frames
    pub max_messages_per_tick: usize,

    /// Largest accepted frame body
    ///
    /// # Default
    /// 5000 bytes
    pub max_frame_len: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:43594".to_string(),
            connect_timeout: Duration::from_secs(10),
            tick_interval: Duration::from_millis(20),
            ping_interval: Duration::from_secs(5),
            max_backlog: 256,
            max_messages_per_tick: 64,
            max_frame_len: mudsync_protocol::DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl From<&ClientConfig> for NetworkConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            server_address: config.server_address(),
            connect_timeout: config.connect_timeout(),
            tick_interval: config.tick_interval(),
            ping_interval: config.ping_interval(),
            max_backlog: config.max_backlog,
            max_messages_per_tick: config.max_messages_per_tick,
            max_frame_len: config.max_frame_len,
        }
    }
}

impl NetworkConfig {
    /// Validate the configuration
    ///
    /// # Returns
    /// `Ok(())` if configuration is valid, `Err(String)` otherwise
    pub fn validate(&self) -> Result<(), String> {
        if self.server_address.is_empty() {
            return Err("server_address must not be empty".to_string());
        }

        if self.tick_interval.is_zero() {
            return Err("tick_interval must be > 0".to_string());
        }

        if self.max_backlog == 0 {
            return Err("max_backlog must be > 0".to_string());
        }

        if self.max_messages_per_tick == 0 {
            return Err("max_messages_per_tick must be > 0".to_string());
        }

        if self.max_frame_len < 2 {
            return Err("max_frame_len must be >= 2".to_string());
        }

        if self.max_messages_per_tick > self.max_backlog {
            tracing::warn!("max_messages_per_tick above max_backlog has no effect");
        }

        Ok(())
    }
}
