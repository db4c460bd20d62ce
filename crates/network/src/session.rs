//! # World Session
//!
//! One connection to the world server, from connect to close.
//!
//! # Architecture
//!
//! ```text
//! socket ──► reader task ──► bounded queue ──► tick loop ──► dispatcher ──► world
//!                                                  │
//!                             ping / chat / report └──► socket
//! ```
//!
//! The reader task only decodes frames. Everything that touches the world
//! happens on the tick loop, one frame at a time, so no frame is applied
//! while another is half done. After draining, each tick advances movement
//! interpolation and timers.

use std::fmt;
use std::time::Duration;

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use mudsync_core::{Result, SyncError};
use mudsync_protocol::packet_builder::{
    build_chat, build_close_connection, build_exception_report, build_ping,
};
use mudsync_protocol::Frame;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, trace};

use crate::codec::FrameCodec;
use crate::config::NetworkConfig;
use crate::dispatcher::{DispatchOutcome, OpcodeDispatcher};

/// Requests from the embedding application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Send a public chat line
    Chat(String),
    /// Log out and end the session
    Close,
}

/// Why a session ended
#[derive(Debug)]
pub enum SessionEnd {
    /// The server sent a close message
    ServerClosed,
    /// The socket was closed
    Disconnected,
    /// A frame could not be read or applied
    Failed(SyncError),
    /// A local close was requested
    Closed,
}

impl SessionEnd {
    /// Whether a reconnect makes sense
    pub fn should_reconnect(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerClosed => write!(f, "closed by server"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Failed(e) => write!(f, "failed: {}", e),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Open a TCP connection to the world server
///
/// # Errors
/// `SyncError::Network` if the connect does not finish within
/// `connect_timeout`, `SyncError::Io` if it fails.
pub async fn connect(config: &NetworkConfig) -> Result<TcpStream> {
    info!("Connecting to {}", config.server_address);
    let stream = tokio::time::timeout(
        config.connect_timeout,
        TcpStream::connect(&config.server_address),
    )
    .await
    .map_err(|_| {
        SyncError::Network(format!(
            "Timed out after {:?} connecting to {}",
            config.connect_timeout, config.server_address
        ))
    })??;
    stream.set_nodelay(true)?;
    info!("Connected to {}", config.server_address);
    Ok(stream)
}

pub struct Session {
    config: NetworkConfig,
}

impl Session {
    pub fn new(config: NetworkConfig) -> Self {
        debug!("Creating session for {}", config.server_address);
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Run a session over an established stream until it ends
    ///
    /// The dispatcher is put in the world phase on entry and back in the
    /// login phase, with the world reset, on exit.
    pub async fn run<S>(
        &self,
        stream: S,
        dispatcher: &mut OpcodeDispatcher,
        commands: &mut mpsc::Receiver<ClientCommand>,
    ) -> SessionEnd
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let frames = FramedRead::new(read_half, FrameCodec::new(self.config.max_frame_len));
        let mut writer = FramedWrite::new(write_half, FrameCodec::new(self.config.max_frame_len));

        let (tx, mut inbound) = mpsc::channel(self.config.max_backlog);
        let reader = tokio::spawn(read_frames(frames, tx));

        dispatcher.enter_world();
        let end = self
            .tick_loop(&mut writer, &mut inbound, dispatcher, commands)
            .await;

        reader.abort();
        if let Err(e) = writer.close().await {
            trace!("Error closing writer: {}", e);
        }
        dispatcher.enter_login();
        info!("Session {}", end);
        end
    }

    async fn tick_loop<W>(
        &self,
        writer: &mut FramedWrite<W, FrameCodec>,
        inbound: &mut mpsc::Receiver<Result<Frame>>,
        dispatcher: &mut OpcodeDispatcher,
        commands: &mut mpsc::Receiver<ClientCommand>,
    ) -> SessionEnd
    where
        W: AsyncWrite + Unpin,
    {
        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let world = dispatcher.world();
        let mut last_inbound = Instant::now();
        let mut last_ping = Instant::now();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(end) = self.drain(writer, inbound, dispatcher, &mut last_inbound).await {
                        return end;
                    }
                    world.write().tick();

                    if idle_for(last_inbound, self.config.ping_interval)
                        && idle_for(last_ping, self.config.ping_interval)
                    {
                        trace!("Sending keep-alive");
                        if let Err(e) = send_body(writer, build_ping).await {
                            return SessionEnd::Failed(e);
                        }
                        last_ping = Instant::now();
                    }
                }

                Some(command) = commands.recv() => {
                    match command {
                        ClientCommand::Chat(text) => {
                            let codec = dispatcher.engine().codec().clone();
                            if let Err(e) = send_body(writer, |buf| build_chat(buf, &codec, &text)).await {
                                return SessionEnd::Failed(e);
                            }
                        }
                        ClientCommand::Close => {
                            if let Err(e) = send_body(writer, build_close_connection).await {
                                debug!("Close message not sent: {}", e);
                            }
                            return SessionEnd::Closed;
                        }
                    }
                }
            }
        }
    }

    /// Dispatch up to `max_messages_per_tick` queued frames
    ///
    /// # Returns
    /// `Some(end)` once the session is over
    async fn drain<W>(
        &self,
        writer: &mut FramedWrite<W, FrameCodec>,
        inbound: &mut mpsc::Receiver<Result<Frame>>,
        dispatcher: &mut OpcodeDispatcher,
        last_inbound: &mut Instant,
    ) -> Option<SessionEnd>
    where
        W: AsyncWrite + Unpin,
    {
        for _ in 0..self.config.max_messages_per_tick {
            let frame = match inbound.try_recv() {
                Ok(Ok(frame)) => frame,
                Ok(Err(e)) => {
                    error!("Transport error: {}", e);
                    return Some(SessionEnd::Failed(e));
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return Some(SessionEnd::Disconnected),
            };
            *last_inbound = Instant::now();

            match dispatcher.dispatch(&frame) {
                DispatchOutcome::Handled | DispatchOutcome::Ignored | DispatchOutcome::Dropped => {}
                DispatchOutcome::Closed => return Some(SessionEnd::ServerClosed),
                DispatchOutcome::Rejected { report, .. } => {
                    if let Some(report) = report {
                        if let Err(e) = send_body(writer, |buf| build_exception_report(buf, &report)).await {
                            return Some(SessionEnd::Failed(e));
                        }
                    }
                }
                DispatchOutcome::Failed { error, report } => {
                    // Best effort: the connection may already be gone
                    if let Some(report) = report {
                        if let Err(e) = send_body(writer, |buf| build_exception_report(buf, &report)).await {
                            debug!("Error report not sent: {}", e);
                        }
                    }
                    if let Err(e) = send_body(writer, build_close_connection).await {
                        debug!("Close message not sent: {}", e);
                    }
                    return Some(SessionEnd::Failed(error));
                }
            }
        }
        None
    }
}

/// Forward decoded frames until the socket closes or a frame is bad
///
/// `send` waits while the queue is full, which stops reads and leaves
/// back-pressure to TCP.
async fn read_frames<R>(mut frames: FramedRead<R, FrameCodec>, tx: mpsc::Sender<Result<Frame>>)
where
    R: AsyncRead + Unpin,
{
    while let Some(item) = frames.next().await {
        let failed = item.is_err();
        if tx.send(item).await.is_err() || failed {
            break;
        }
    }
    trace!("Frame reader finished");
}

async fn send_body<W>(
    writer: &mut FramedWrite<W, FrameCodec>,
    build: impl FnOnce(&mut BytesMut),
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();
    build(&mut buf);
    writer.send(Frame::from_body(buf.freeze())?).await
}

#[inline]
fn idle_for(since: Instant, limit: Duration) -> bool {
    since.elapsed() >= limit
}
