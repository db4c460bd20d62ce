//! # Opcode Dispatcher
//!
//! Routes each inbound frame to its handler and enforces the failure
//! policy.
//!
//! # Policy
//!
//! ```text
//! unknown opcode          warn, drop the frame, keep going
//! opcode outside phase    ignore
//! fatal handler error     back to Login, report while under the cap
//! non-fatal handler error drop the frame, report while under the cap, stay
//! ```
//!
//! [`SyncError::is_session_fatal`] decides which of the two a handler
//! error is.
//!
//! The report cap counts failures over the dispatcher's whole life, not per
//! session, so a server that keeps sending a broken message is not flooded
//! with diagnostics across reconnects.

use std::sync::Arc;

use mudsync_core::SyncError;
use mudsync_protocol::{ExceptionReport, Frame, Phase, ServerOpcode};
use mudsync_world::{RegionSyncEngine, WorldState};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::handlers::{Flow, HandlerRegistry, SyncContext};

/// Default cap on diagnostic reports
pub const DEFAULT_MAX_ERROR_REPORTS: u32 = 3;

/// Result of dispatching one frame
#[derive(Debug)]
pub enum DispatchOutcome {
    Handled,
    /// Known opcode that is not valid in the current phase
    Ignored,
    /// Opcode with no handler; the frame was dropped
    Dropped,
    /// The server ended the session
    Closed,
    /// A handler failed; the session is over
    Failed {
        error: SyncError,
        /// Diagnostic report to send before closing, if under the cap
        report: Option<ExceptionReport>,
    },
    /// A handler refused the frame without harming the world
    Rejected {
        error: SyncError,
        report: Option<ExceptionReport>,
    },
}

impl DispatchOutcome {
    /// Whether the session must end after this frame
    #[inline]
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed { .. })
    }
}

pub struct OpcodeDispatcher {
    phase: Phase,
    handlers: HandlerRegistry,
    engine: RegionSyncEngine,
    world: Arc<RwLock<WorldState>>,
    error_count: u32,
    max_error_reports: u32,
}

impl OpcodeDispatcher {
    pub fn new(
        handlers: HandlerRegistry,
        engine: RegionSyncEngine,
        world: Arc<RwLock<WorldState>>,
        max_error_reports: u32,
    ) -> Self {
        debug!(
            "Creating dispatcher with {} handlers, {} error reports",
            handlers.handler_count(),
            max_error_reports
        );
        Self {
            phase: Phase::Login,
            handlers,
            engine,
            world,
            error_count: 0,
            max_error_reports,
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Handler failures seen so far
    #[inline]
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Shared handle to the world mirror
    pub fn world(&self) -> Arc<RwLock<WorldState>> {
        Arc::clone(&self.world)
    }

    #[inline]
    pub fn engine(&self) -> &RegionSyncEngine {
        &self.engine
    }

    /// A session was established
    pub fn enter_world(&mut self) {
        if self.phase != Phase::World {
            info!("Entering world phase");
        }
        self.phase = Phase::World;
    }

    /// The session ended; forget the world and wait for a reconnect
    pub fn enter_login(&mut self) {
        if self.phase != Phase::Login {
            info!("Returning to login phase");
        }
        self.phase = Phase::Login;
        self.world.write().reset();
    }

    /// Handle one inbound frame
    pub fn dispatch(&mut self, frame: &Frame) -> DispatchOutcome {
        let Some(opcode) = ServerOpcode::from_u8(frame.opcode) else {
            warn!(
                "Dropping unknown opcode {} ({} bytes)",
                frame.opcode,
                frame.payload.len()
            );
            return DispatchOutcome::Dropped;
        };

        if !opcode.valid_in(self.phase) {
            debug!("Ignoring {:?} in {} phase", opcode, self.phase.as_str());
            return DispatchOutcome::Ignored;
        }

        if !self.handlers.has_handler(opcode) {
            warn!("No handler for {:?}, dropping frame", opcode);
            return DispatchOutcome::Dropped;
        }

        let mut world = self.world.write();
        let result = {
            let mut ctx = SyncContext {
                engine: &mut self.engine,
                world: &mut *world,
            };
            self.handlers.dispatch(opcode, &mut ctx, &frame.payload)
        };

        match result {
            Ok(Flow::Continue) => DispatchOutcome::Handled,
            Ok(Flow::Close) => {
                drop(world);
                self.phase = Phase::Login;
                DispatchOutcome::Closed
            }
            Err(error) => {
                let fatal = error.is_session_fatal();
                if fatal {
                    error!(
                        "Handler for {:?} failed on {} bytes: {}",
                        opcode,
                        frame.payload.len(),
                        error
                    );
                } else {
                    warn!("Handler for {:?} rejected frame: {}", opcode, error);
                }
                let region = world.region.to_absolute(world.region.local_tile);
                drop(world);

                let report = if self.error_count < self.max_error_reports {
                    self.error_count += 1;
                    Some(ExceptionReport::new(
                        &error,
                        frame.opcode,
                        &frame.payload,
                        (region.x, region.y),
                    ))
                } else {
                    debug!("Error report cap reached, not reporting");
                    None
                };
                if fatal {
                    self.phase = Phase::Login;
                    DispatchOutcome::Failed { error, report }
                } else {
                    DispatchOutcome::Rejected { error, report }
                }
            }
        }
    }
}

impl std::fmt::Debug for OpcodeDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcodeDispatcher")
            .field("phase", &self.phase)
            .field("handlers", &self.handlers.handler_count())
            .field("error_count", &self.error_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mudsync_protocol::init_codec;
    use mudsync_world::{HeadlessWorld, SyncConfig};

    fn dispatcher() -> OpcodeDispatcher {
        let engine = RegionSyncEngine::new(
            init_codec(),
            Box::new(HeadlessWorld::new()),
            Box::new(HeadlessWorld::new()),
            SyncConfig::default(),
        );
        OpcodeDispatcher::new(
            HandlerRegistry::with_world_handlers(),
            engine,
            Arc::new(RwLock::new(WorldState::new())),
            DEFAULT_MAX_ERROR_REPORTS,
        )
    }

    #[test]
    fn test_unknown_opcode_is_dropped() {
        let mut dispatcher = dispatcher();
        dispatcher.enter_world();
        let outcome = dispatcher.dispatch(&Frame::new(200, &b"??"[..]));
        assert!(matches!(outcome, DispatchOutcome::Dropped));
        assert_eq!(dispatcher.phase(), Phase::World);
    }

    #[test]
    fn test_world_opcode_ignored_in_login() {
        let mut dispatcher = dispatcher();
        let outcome = dispatcher.dispatch(&Frame::new(79, &[0u8][..]));
        assert!(matches!(outcome, DispatchOutcome::Ignored));

        // Messages are fine in any phase
        let outcome = dispatcher.dispatch(&Frame::new(131, &b"hi"[..]));
        assert!(matches!(outcome, DispatchOutcome::Handled));
        assert_eq!(dispatcher.world().read().messages.len(), 1);
    }

    #[test]
    fn test_handler_error_is_fatal_and_reported() {
        let mut dispatcher = dispatcher();
        dispatcher.enter_world();

        // NPC sync announcing three known NPCs with no bits behind it
        let outcome = dispatcher.dispatch(&Frame::new(79, &[3u8][..]));
        match outcome {
            DispatchOutcome::Failed { error, report } => {
                assert!(matches!(error, SyncError::TruncatedMessage { .. }));
                let report = report.unwrap();
                assert_eq!(report.opcode, 79);
                assert_eq!(report.payload_head, vec![3]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(dispatcher.phase(), Phase::Login);
        assert_eq!(dispatcher.error_count(), 1);
    }

    #[test]
    fn test_reports_stop_at_cap() {
        let mut dispatcher = dispatcher();
        let mut reports = 0;
        for _ in 0..5 {
            dispatcher.enter_world();
            if let DispatchOutcome::Failed { report, .. } = dispatcher.dispatch(&Frame::new(79, &[3u8][..])) {
                reports += report.is_some() as usize;
            }
            assert_eq!(dispatcher.phase(), Phase::Login);
        }
        assert_eq!(reports, DEFAULT_MAX_ERROR_REPORTS as usize);
        assert_eq!(dispatcher.error_count(), DEFAULT_MAX_ERROR_REPORTS);
    }

    #[test]
    fn test_non_fatal_handler_error_keeps_session() {
        let engine = RegionSyncEngine::new(
            init_codec(),
            Box::new(HeadlessWorld::new()),
            Box::new(HeadlessWorld::new()),
            SyncConfig::default(),
        );
        let mut handlers = HandlerRegistry::with_world_handlers();
        handlers.register_function(ServerOpcode::LogoutDeny, |_ctx, payload| {
            Err(SyncError::UnknownOpcode(payload[0]))
        });
        let mut dispatcher = OpcodeDispatcher::new(
            handlers,
            engine,
            Arc::new(RwLock::new(WorldState::new())),
            DEFAULT_MAX_ERROR_REPORTS,
        );
        dispatcher.enter_world();

        let outcome = dispatcher.dispatch(&Frame::new(183, &[42u8][..]));
        assert!(!outcome.ends_session());
        match outcome {
            DispatchOutcome::Rejected { error, report } => {
                assert!(matches!(error, SyncError::UnknownOpcode(42)));
                assert_eq!(report.unwrap().opcode, 183);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(dispatcher.phase(), Phase::World);
        assert_eq!(dispatcher.error_count(), 1);

        // the session still applies later frames
        let outcome = dispatcher.dispatch(&Frame::new(131, &b"still here"[..]));
        assert!(matches!(outcome, DispatchOutcome::Handled));
    }

    #[test]
    fn test_close_connection_ends_session() {
        let mut dispatcher = dispatcher();
        dispatcher.enter_world();
        let outcome = dispatcher.dispatch(&Frame::new(4, Vec::<u8>::new()));
        assert!(outcome.ends_session());
        assert_eq!(dispatcher.phase(), Phase::Login);
    }

    #[test]
    fn test_enter_login_resets_world() {
        let mut dispatcher = dispatcher();
        dispatcher.enter_world();
        dispatcher.dispatch(&Frame::new(131, &b"hi"[..]));
        dispatcher.enter_login();
        assert!(dispatcher.world().read().messages.is_empty());
    }
}
