//! Board session lifecycle.
//!
//! ```text
//!            open(id)              LinkUp
//!  CLOSED ───────────▶ OPENING ───────────▶ OPEN
//!    ▲                   │                   │
//!    │   LinkFailed /    │                   │ close() or
//!    │   open timeout    │                   │ too many missed probes
//!    └───────────────────┴───────────────────┘
//! ```
//!
//! The first of {link up, link failed, open timeout} decides an open
//! attempt; the others are ignored once the session has left OPENING.
//! While open, a version query is sent every liveness interval.  A probe
//! still unanswered when the next one is due counts as a miss, and
//! `max_missed_probes` consecutive misses drop the session.

use log::{debug, info, warn};

use crate::app::events::SessionEvent;
use crate::app::ports::BoardPort;
use crate::config::ControllerConfig;
use crate::error::SessionError;
use crate::scheduler::{Scheduler, TimerId, TimerKind};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Open,
}

pub struct Session {
    state: SessionState,
    transport: Option<String>,
    open_timer: Option<TimerId>,
    probe_timer: Option<TimerId>,
    /// A probe was sent and has not been answered yet.
    awaiting_reply: bool,
    missed_probes: u8,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Closed,
            transport: None,
            open_timer: None,
            probe_timer: None,
            awaiting_reply: false,
            missed_probes: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transport(&self) -> Option<&str> {
        self.transport.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn missed_probes(&self) -> u8 {
        self.missed_probes
    }

    // ---------------------------------------------------------------------------
    // Opening
    // ---------------------------------------------------------------------------

    /// Start an open attempt.  Fails without touching any state if a
    /// session is already opening/open or `transport` is empty.
    pub fn open(
        &mut self,
        transport: &str,
        now_ms: u64,
        config: &ControllerConfig,
        scheduler: &mut Scheduler,
        board: &mut impl BoardPort,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Closed {
            return Err(SessionError::AlreadyOpen);
        }
        if transport.is_empty() {
            return Err(SessionError::MissingTransport);
        }

        info!("Session: opening {}", transport);
        self.state = SessionState::Opening;
        self.transport = Some(transport.to_owned());
        self.open_timer = scheduler.arm(now_ms + config.open_timeout_ms, TimerKind::OpenTimeout);
        board.open_link(transport);
        Ok(())
    }

    /// The board reported the link up.  Returns `Opened` the first time.
    pub fn on_link_up(
        &mut self,
        now_ms: u64,
        config: &ControllerConfig,
        scheduler: &mut Scheduler,
    ) -> Option<SessionEvent> {
        if self.state != SessionState::Opening {
            debug!("Session: ignoring link-up in {:?}", self.state);
            return None;
        }
        if let Some(id) = self.open_timer.take() {
            scheduler.cancel(id);
        }
        self.state = SessionState::Open;
        self.awaiting_reply = false;
        self.missed_probes = 0;
        self.probe_timer = scheduler.arm(now_ms + config.liveness_interval_ms, TimerKind::LivenessProbe);

        let transport = self.transport.clone().unwrap_or_default();
        info!("Session: open on {}", transport);
        Some(SessionEvent::Opened { transport })
    }

    /// The board reported the link failed.
    pub fn on_link_failed(&mut self, reason: &str, scheduler: &mut Scheduler) -> Option<SessionEvent> {
        if self.state != SessionState::Opening {
            debug!("Session: ignoring link failure in {:?}: {}", self.state, reason);
            return None;
        }
        warn!("Session: connection failed: {}", reason);
        self.teardown(scheduler);
        Some(SessionEvent::OpenFailed(SessionError::ConnectFailed(reason.to_owned())))
    }

    /// The open timeout fired.
    pub fn on_open_timeout(&mut self, scheduler: &mut Scheduler, board: &mut impl BoardPort) -> Option<SessionEvent> {
        self.open_timer = None;
        if self.state != SessionState::Opening {
            return None;
        }
        warn!("Session: open timed out");
        board.close_link();
        self.teardown(scheduler);
        Some(SessionEvent::OpenFailed(SessionError::Timeout))
    }

    // ---------------------------------------------------------------------------
    // Liveness
    // ---------------------------------------------------------------------------

    /// The probe timer fired.  Sends the next probe, or drops the session
    /// once the miss budget is spent.  The next probe is armed relative to
    /// `now_ms`, so a late poll never fires a burst of overdue probes.
    pub fn on_probe_due(
        &mut self,
        now_ms: u64,
        config: &ControllerConfig,
        scheduler: &mut Scheduler,
        board: &mut impl BoardPort,
    ) -> Option<SessionEvent> {
        self.probe_timer = None;
        if self.state != SessionState::Open {
            return None;
        }

        if self.awaiting_reply {
            self.missed_probes = self.missed_probes.saturating_add(1);
            warn!(
                "Session: liveness probe unanswered ({}/{})",
                self.missed_probes, config.max_missed_probes
            );
            if self.missed_probes >= config.max_missed_probes {
                warn!("Session: board lost, closing");
                board.close_link();
                self.teardown(scheduler);
                return Some(SessionEvent::LivenessLost);
            }
        }

        board.query_version();
        self.awaiting_reply = true;
        self.probe_timer = scheduler.arm(now_ms + config.liveness_interval_ms, TimerKind::LivenessProbe);
        None
    }

    /// The board answered a probe.
    pub fn on_probe_reply(&mut self) {
        if self.state == SessionState::Open {
            self.awaiting_reply = false;
            self.missed_probes = 0;
        }
    }

    // ---------------------------------------------------------------------------
    // Closing
    // ---------------------------------------------------------------------------

    /// Close the session.  Always succeeds; returns `false` when there was
    /// nothing to close.
    pub fn close(&mut self, scheduler: &mut Scheduler, board: &mut impl BoardPort) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        info!("Session: closing {}", self.transport.as_deref().unwrap_or(""));
        board.close_link();
        self.teardown(scheduler);
        true
    }

    fn teardown(&mut self, scheduler: &mut Scheduler) {
        if let Some(id) = self.open_timer.take() {
            scheduler.cancel(id);
        }
        if let Some(id) = self.probe_timer.take() {
            scheduler.cancel(id);
        }
        self.state = SessionState::Closed;
        self.transport = None;
        self.awaiting_reply = false;
        self.missed_probes = 0;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
