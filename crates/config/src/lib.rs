//! MudSync Configuration Management
//!
//! Loads client options from `config/client.txt`: one `key = value` pair per
//! line, `#` starts a comment, unknown keys are ignored and values that do
//! not parse keep their defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use mudsync_core::{Result, SyncError};

/// Default location of the option file
pub const DEFAULT_CONFIG_PATH: &str = "config/client.txt";

/// Client options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// World server host (from "host" option)
    pub host: String,
    /// World server port (from "port" option, default: 43594)
    pub port: u16,
    /// Seconds to wait for the TCP connect (from "connecttimeout")
    pub connect_timeout_secs: u64,
    /// Milliseconds between ticks (from "tickms")
    pub tick_ms: u64,
    /// Idle seconds before a keep-alive is sent (from "pingsecs")
    pub ping_secs: u64,
    /// Frames buffered between the socket and the dispatcher (from "maxbacklog")
    pub max_backlog: usize,
    /// Frames dispatched per tick (from "maxmessagespertick")
    pub max_messages_per_tick: usize,
    /// Largest accepted frame body (from "maxframelen")
    pub max_frame_len: usize,
    /// Diagnostic reports sent before going quiet (from "maxerrorreports")
    pub max_error_reports: u32,
    /// Reconnect attempts after a lost session (from "reconnectattempts")
    pub reconnect_attempts: u32,
    /// Seconds between reconnect attempts (from "reconnectdelay")
    pub reconnect_delay_secs: u64,
    /// Number of NPC types the client knows (from "npctypecount")
    pub npc_type_count: u16,
    /// Type drawn for unknown NPC types (from "fallbacknpctype")
    pub fallback_npc_type: u16,
    /// Default log filter when RUST_LOG is unset (from "loglevel")
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 43594,
            connect_timeout_secs: 10,
            tick_ms: 20,
            ping_secs: 5,
            max_backlog: 256,
            max_messages_per_tick: 64,
            max_frame_len: 5000,
            max_error_reports: 3,
            reconnect_attempts: 5,
            reconnect_delay_secs: 5,
            npc_type_count: 794,
            fallback_npc_type: 24,
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load options from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Load `config/client.txt`, falling back to defaults when it is absent
    pub fn load_default() -> Result<Self> {
        if !Path::new(DEFAULT_CONFIG_PATH).exists() {
            tracing::warn!("{} not found, using defaults", DEFAULT_CONFIG_PATH);
            return Ok(Self::default());
        }
        Self::load_from_file(DEFAULT_CONFIG_PATH)
    }

    /// Parse option file content
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(eq_pos) = line.find('=') {
                let key = line[..eq_pos].trim();
                let value = line[eq_pos + 1..].trim();

                config.parse_option(key, value);
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn parse_option(&mut self, key: &str, value: &str) {
        match key.to_lowercase().as_str() {
            "host" => self.host = value.into(),
            "port" => self.port = value.parse().unwrap_or(43594),
            "connecttimeout" => self.connect_timeout_secs = value.parse().unwrap_or(10),
            "tickms" => self.tick_ms = value.parse().unwrap_or(20),
            "pingsecs" => self.ping_secs = value.parse().unwrap_or(5),
            "maxbacklog" => self.max_backlog = value.parse().unwrap_or(256),
            "maxmessagespertick" => self.max_messages_per_tick = value.parse().unwrap_or(64),
            "maxframelen" => self.max_frame_len = value.parse().unwrap_or(5000),
            "maxerrorreports" => self.max_error_reports = value.parse().unwrap_or(3),
            "reconnectattempts" => self.reconnect_attempts = value.parse().unwrap_or(5),
            "reconnectdelay" => self.reconnect_delay_secs = value.parse().unwrap_or(5),
            "npctypecount" => self.npc_type_count = value.parse().unwrap_or(794),
            "fallbacknpctype" => self.fallback_npc_type = value.parse().unwrap_or(24),
            "loglevel" => self.log_level = value.to_lowercase(),
            _ => tracing::debug!("Ignoring unknown option '{}'", key),
        }
    }

    /// Reject values the session cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(SyncError::Config("host must not be empty".into()));
        }
        if self.tick_ms == 0 {
            return Err(SyncError::Config("tickms must be > 0".into()));
        }
        if self.max_backlog == 0 {
            return Err(SyncError::Config("maxbacklog must be > 0".into()));
        }
        if self.max_messages_per_tick == 0 {
            return Err(SyncError::Config("maxmessagespertick must be > 0".into()));
        }
        if self.fallback_npc_type >= self.npc_type_count {
            return Err(SyncError::Config(
                "fallbacknpctype must be below npctypecount".into(),
            ));
        }
        Ok(())
    }

    /// `host:port` of the world server
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[inline]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    #[inline]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_secs)
    }

    #[inline]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    /// Display configuration summary
    pub fn display(&self) {
        tracing::info!("Client configuration:");
        tracing::info!("  Server: {}", self.server_address());
        tracing::info!(
            "  Tick: {}ms, ping after {}s idle, connect timeout {}s",
            self.tick_ms,
            self.ping_secs,
            self.connect_timeout_secs
        );
        tracing::info!(
            "  Backlog: {} frames, {} per tick, frames up to {} bytes",
            self.max_backlog,
            self.max_messages_per_tick,
            self.max_frame_len
        );
        tracing::info!(
            "  Reconnect: {} attempts every {}s, {} error reports",
            self.reconnect_attempts,
            self.reconnect_delay_secs,
            self.max_error_reports
        );
        tracing::info!(
            "  NPC types: {} (fallback {})",
            self.npc_type_count,
            self.fallback_npc_type
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.port, 43594);
        assert_eq!(config.max_backlog, 256);
        assert_eq!(config.max_error_reports, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_simple_config() {
        let config_text = r#"
# world server
host = world.example.org
port = 43595
TickMs = 30

maxbacklog = 32
"#;
        let config = ClientConfig::parse(config_text).unwrap();
        assert_eq!(config.host, "world.example.org");
        assert_eq!(config.port, 43595);
        assert_eq!(config.tick_interval(), Duration::from_millis(30));
        assert_eq!(config.max_backlog, 32);
        assert_eq!(config.server_address(), "world.example.org:43595");
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = ClientConfig::parse("port = lots\nfrobnicate = 1\nnpctypecount = -3").unwrap();
        assert_eq!(config.port, 43594);
        assert_eq!(config.npc_type_count, 794);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = ClientConfig::parse("maxbacklog = 0").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
        assert!(ClientConfig::parse("npctypecount = 10\nfallbacknpctype = 10").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = 10.0.0.2").unwrap();
        writeln!(file, "reconnectattempts = 9").unwrap();

        let config = ClientConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.host, "10.0.0.2");
        assert_eq!(config.reconnect_attempts, 9);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load_from_file(dir.path().join("client.txt")).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
