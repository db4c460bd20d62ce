//! MudSync - headless world sync client
//!
//! Connects to a world server, keeps the local world mirror in sync and
//! reconnects when a session is lost.
//!
//! ## Usage
//!
//! ```bash
//! mudsync --config config/client.txt --snapshot world.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use mudsync_config::ClientConfig;
use mudsync_network::{
    connect, ClientCommand, HandlerRegistry, NetworkConfig, OpcodeDispatcher, Session,
};
use mudsync_protocol::init_codec;
use mudsync_world::{HeadlessWorld, RegionSyncEngine, SyncConfig, WorldState};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    config: Option<PathBuf>,
    snapshot: Option<PathBuf>,
    help: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Args> {
    let mut parsed = Args::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = it.next().context("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--snapshot" | "-s" => {
                let path = it.next().context("--snapshot needs a path")?;
                parsed.snapshot = Some(PathBuf::from(path));
            }
            "--help" | "-h" => parsed.help = true,
            other => bail!("Unknown argument: {}", other),
        }
    }
    Ok(parsed)
}

fn print_usage() {
    println!("Usage: mudsync [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>     Option file (default: config/client.txt)");
    println!("  -s, --snapshot <PATH>   Write the world as JSON while running");
    println!("  -h, --help              Show this help");
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ClientConfig> {
    let config = match path {
        Some(path) => ClientConfig::load_from_file(path)?,
        None => ClientConfig::load_default()?,
    };
    config.validate()?;
    Ok(config)
}

async fn write_snapshot(path: &Path, world: &RwLock<WorldState>) -> anyhow::Result<()> {
    let snapshot = world.read().snapshot();
    let json = serde_json::to_vec_pretty(&snapshot)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("writing snapshot to {}", path.display()))?;
    Ok(())
}

fn spawn_snapshot_writer(path: PathBuf, world: Arc<RwLock<WorldState>>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SNAPSHOT_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = write_snapshot(&path, &world).await {
                warn!("Snapshot failed: {:#}", e);
            }
        }
    });
}

/// Ask the session to close
///
/// # Returns
/// `false` when the session side has already gone
async fn request_close(commands: &mpsc::Sender<ClientCommand>) -> bool {
    match commands.send(ClientCommand::Close).await {
        Ok(()) => true,
        Err(e) => {
            debug!("Session already gone, close not delivered: {}", e);
            false
        }
    }
}

fn spawn_shutdown_listener(commands: mpsc::Sender<ClientCommand>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, closing session");
            request_close(&commands).await;
        }
    });
}

/// Write the last snapshot and hand back the session result
///
/// A snapshot failure is logged so it never replaces the session's error.
async fn finish(
    result: anyhow::Result<()>,
    snapshot: Option<&Path>,
    world: &RwLock<WorldState>,
) -> anyhow::Result<()> {
    if let Some(path) = snapshot {
        if let Err(e) = write_snapshot(path, world).await {
            warn!("Final snapshot failed: {:#}", e);
        }
    }

    match &result {
        Ok(()) => info!("MudSync client shutting down"),
        Err(e) => error!("MudSync client stopped: {:#}", e),
    }
    result
}

/// Connect, run sessions and reconnect until told to stop
///
/// Attempts count consecutive failures; a session that gets connected
/// resets the count.
async fn run(
    config: &ClientConfig,
    dispatcher: &mut OpcodeDispatcher,
    commands: &mut mpsc::Receiver<ClientCommand>,
) -> anyhow::Result<()> {
    let network_config = NetworkConfig::from(config);
    let session = Session::new(network_config.clone());
    let mut failures = 0u32;

    loop {
        match connect(&network_config).await {
            Ok(stream) => {
                failures = 0;
                let end = session.run(stream, dispatcher, commands).await;
                if !end.should_reconnect() {
                    return Ok(());
                }
                warn!("Session ended: {}", end);
            }
            Err(e) => {
                failures += 1;
                error!("Connect failed ({}/{}): {}", failures, config.reconnect_attempts, e);
                if failures > config.reconnect_attempts {
                    bail!("Giving up on {} after {} attempts", config.server_address(), failures);
                }
            }
        }

        info!("Reconnecting in {:?}", config.reconnect_delay());
        tokio::time::sleep(config.reconnect_delay()).await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        print_usage();
        return Ok(());
    }

    let config = load_config(args.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("MudSync client starting");
    config.display();

    let engine = RegionSyncEngine::new(
        init_codec(),
        Box::new(HeadlessWorld::new()),
        Box::new(HeadlessWorld::new()),
        SyncConfig {
            npc_type_count: config.npc_type_count,
            fallback_npc_type: config.fallback_npc_type,
        },
    );
    let world = Arc::new(RwLock::new(WorldState::new()));
    let mut dispatcher = OpcodeDispatcher::new(
        HandlerRegistry::with_world_handlers(),
        engine,
        world.clone(),
        config.max_error_reports,
    );

    if let Some(path) = &args.snapshot {
        info!("Writing snapshots to {}", path.display());
        spawn_snapshot_writer(path.clone(), world.clone());
    }

    let (commands_tx, mut commands) = mpsc::channel(16);
    spawn_shutdown_listener(commands_tx.clone());

    let result = run(&config, &mut dispatcher, &mut commands).await;
    drop(commands_tx);

    finish(result, args.snapshot.as_deref(), &world).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let parsed = parse_args(args(&["--config", "a.txt", "-s", "out.json"])).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("a.txt")));
        assert_eq!(parsed.snapshot, Some(PathBuf::from("out.json")));
        assert!(!parsed.help);

        assert!(parse_args(args(&["--help"])).unwrap().help);
        assert_eq!(parse_args(Vec::new()).unwrap(), Args::default());
    }

    #[test]
    fn test_parse_args_rejects_bad_input() {
        assert!(parse_args(args(&["--snapshot"])).is_err());
        assert!(parse_args(args(&["--verbose"])).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.txt");
        std::fs::write(&path, "host = 10.0.0.2\nport = 5000\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.server_address(), "10.0.0.2:5000");

        assert!(load_config(Some(&dir.path().join("missing.txt"))).is_err());
    }

    #[tokio::test]
    async fn test_snapshot_is_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.json");
        let world = RwLock::new(WorldState::new());
        write_snapshot(&path, &world).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["ticks"], 0);
    }

    #[tokio::test]
    async fn test_snapshot_failure_keeps_session_result() {
        let dir = tempfile::tempdir().unwrap();
        let unwritable = dir.path().join("missing").join("world.json");
        let world = RwLock::new(WorldState::new());

        let result = finish(Err(anyhow::anyhow!("server gone")), Some(&unwritable), &world).await;
        assert_eq!(result.unwrap_err().to_string(), "server gone");

        assert!(finish(Ok(()), Some(&unwritable), &world).await.is_ok());
    }

    #[tokio::test]
    async fn test_close_request_after_session_gone() {
        let (tx, mut rx) = mpsc::channel(1);
        assert!(request_close(&tx).await);
        assert_eq!(rx.recv().await, Some(ClientCommand::Close));

        drop(rx);
        assert!(!request_close(&tx).await);
    }

    #[tokio::test]
    async fn test_gives_up_after_reconnect_attempts() {
        // Nothing listens on a port freed right after binding
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = ClientConfig {
            host: "127.0.0.1".into(),
            port,
            reconnect_attempts: 1,
            reconnect_delay_secs: 0,
            ..Default::default()
        };
        let engine = RegionSyncEngine::new(
            init_codec(),
            Box::new(HeadlessWorld::new()),
            Box::new(HeadlessWorld::new()),
            SyncConfig::default(),
        );
        let mut dispatcher = OpcodeDispatcher::new(
            HandlerRegistry::with_world_handlers(),
            engine,
            Arc::new(RwLock::new(WorldState::new())),
            3,
        );
        let (_tx, mut commands) = mpsc::channel(1);
        assert!(run(&config, &mut dispatcher, &mut commands).await.is_err());
    }
}
