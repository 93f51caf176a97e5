//! One-shot timer scheduler.
//!
//! Every delayed step in the core (servo interpolation steps and settling
//! waits, the open timeout, liveness probes) is an entry in this table.
//! Nothing fires on its own: the caller's loop passes the current time to
//! [`Controller::poll`](crate::app::service::Controller::poll), which drains
//! due entries with [`Scheduler::take_due`].
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Timer sources                          │
//! │  ┌─────────────┐   ┌──────────────┐   ┌───────────────────┐  │
//! │  │ Servo motion│   │ Open timeout │   │ Liveness probe    │  │
//! │  └──────┬──────┘   └──────┬───────┘   └─────────┬─────────┘  │
//! │         ▼                 ▼                     ▼            │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │           Scheduler (deadline-ordered table)           │  │
//! │  └───────────────────────────┬────────────────────────────┘  │
//! │                              ▼                               │
//! │                     Controller::poll(now)                    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use heapless::Vec;
use log::{debug, warn};

use crate::app::events::RequestId;

// ═══════════════════════════════════════════════════════════════
//  Timer types
// ═══════════════════════════════════════════════════════════════

/// What a timer resumes when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Next step (or the final wait) of a synchronized servo motion.
    ServoMotion(RequestId),
    /// The session's open attempt ran out of time.
    OpenTimeout,
    /// Time to send the next liveness probe.
    LivenessProbe,
}

/// Handle returned by [`Scheduler::arm`], used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(u32);

#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    id: TimerId,
    due_ms: u64,
    kind: TimerKind,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Maximum number of concurrently armed timers (stack-allocated).
const MAX_TIMERS: usize = 16;

pub struct Scheduler {
    timers: Vec<TimerEntry, MAX_TIMERS>,
    next_id: u32,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            timers: Vec::new(),
            next_id: 1,
        }
    }

    /// Arm a one-shot timer.  Returns `None` if the table is full.
    pub fn arm(&mut self, due_ms: u64, kind: TimerKind) -> Option<TimerId> {
        let id = TimerId(self.next_id);
        if self.timers.push(TimerEntry { id, due_ms, kind }).is_err() {
            warn!("Scheduler: table full, dropping {:?} due at {}ms", kind, due_ms);
            return None;
        }
        self.next_id = self.next_id.wrapping_add(1);
        debug!("Scheduler: armed {:?} due at {}ms", kind, due_ms);
        Some(id)
    }

    /// Cancel a timer.  Returns `false` if it already fired or never existed.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.timers.iter().position(|t| t.id == id) {
            Some(idx) => {
                self.timers.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    /// Cancel every timer of the given kind.
    pub fn cancel_kind(&mut self, kind: TimerKind) {
        self.timers.retain(|t| t.kind != kind);
    }

    /// Remove and return the earliest timer due at or before `now_ms`,
    /// together with its deadline.  Ties fire in arming order.
    pub fn take_due(&mut self, now_ms: u64) -> Option<(u64, TimerKind)> {
        let idx = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_ms <= now_ms)
            .min_by_key(|(_, t)| (t.due_ms, t.id.0))
            .map(|(i, _)| i)?;
        let entry = self.timers.swap_remove(idx);
        Some((entry.due_ms, entry.kind))
    }

    /// Earliest armed deadline.
    pub fn next_due(&self) -> Option<u64> {
        self.timers.iter().map(|t| t.due_ms).min()
    }

    /// Number of armed timers.
    pub fn armed_count(&self) -> usize {
        self.timers.len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
