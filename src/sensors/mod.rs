//! Sensor read registry: turns push-style board reports into one-shot
//! request/response completions.
//!
//! ```text
//!  register(cat, port, id)         on_report(cat, pin, raw)
//!        │                                 │
//!        ▼                                 ▼
//!  slot[(cat, pin)] = id          slot present? ── no ──▶ drop
//!  enable reporting                        │ yes
//!                                  disable reporting
//!                                  take slot  ──▶ (id, scale(raw))
//! ```
//!
//! Each slot holds at most one pending request and is taken, not read,
//! before the completion is produced, so a repeated report can never
//! complete the same request twice.  The accelerometer has a single
//! global slot answered by a command reply instead of a pin report.

use heapless::{FnvIndexMap, Vec};
use log::{debug, warn};

use crate::app::events::RequestId;
use crate::app::ports::{BoardPort, ReportCategory};
use crate::frames::{self, Axis};
use crate::pins;

/// Slot capacity (power of two for `FnvIndexMap`).
const MAX_SLOTS: usize = 32;

/// Full-scale raw analog reading.
pub const ANALOG_FULL_SCALE: f64 = 1023.0;

/// Convert a raw report value for its category: digital values pass
/// through, analog values are remapped from 0–1023 to 0–100.
pub fn scale(category: ReportCategory, raw: u16) -> f64 {
    match category {
        ReportCategory::Digital => f64::from(raw),
        ReportCategory::Analog => f64::from(raw) * 100.0 / ANALOG_FULL_SCALE,
    }
}

/// Outcome of registering a read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Registration {
    /// The port cannot be read; complete now with this value.
    Immediate(f64),
    /// Waiting for the board.  `superseded` is the older request that was
    /// pending on the same slot, if any.
    Pending { superseded: Option<RequestId> },
}

pub struct SensorRegistry {
    slots: FnvIndexMap<(ReportCategory, u8), RequestId, MAX_SLOTS>,
    accelerometer: Option<RequestId>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self {
            slots: FnvIndexMap::new(),
            accelerometer: None,
        }
    }

    /// Install `id` on the slot for `port` and enable reporting.
    pub fn register(
        &mut self,
        board: &mut impl BoardPort,
        category: ReportCategory,
        port: &str,
        id: RequestId,
    ) -> Registration {
        let analog = category == ReportCategory::Analog;
        let Some(pin) = pins::resolve(port).and_then(|spec| spec.read_pin(analog)) else {
            debug!("Sensors: {} is not readable, reporting 0", port);
            return Registration::Immediate(0.0);
        };

        let superseded = match self.slots.insert((category, pin), id) {
            Ok(old) => old,
            Err(_) => {
                warn!("Sensors: slot table full, cannot read {}", port);
                return Registration::Immediate(0.0);
            }
        };
        if let Some(old) = superseded {
            debug!("Sensors: request {} supersedes {} on pin {}", id, old, pin);
        }
        // Slot first, then reporting: a report can only ever find a slot.
        board.set_reporting(category, pin, true);
        Registration::Pending { superseded }
    }

    /// Handle a value report.  Returns the request to complete and its
    /// scaled value, or `None` if nobody was waiting.
    pub fn on_report(
        &mut self,
        board: &mut impl BoardPort,
        category: ReportCategory,
        pin: u8,
        raw: u16,
    ) -> Option<(RequestId, f64)> {
        let key = (category, pin);
        if !self.slots.contains_key(&key) {
            debug!("Sensors: dropping unclaimed {:?} report for pin {}", category, pin);
            return None;
        }
        board.set_reporting(category, pin, false);
        let id = self.slots.remove(&key)?;
        Some((id, scale(category, raw)))
    }

    // ── Accelerometer ─────────────────────────────────────────

    /// Request one axis reading.  Only the reserved accelerometer ports
    /// are readable; anything else reads 0 without touching the board.
    pub fn read_accelerometer(
        &mut self,
        board: &mut impl BoardPort,
        port: &str,
        axis: Axis,
        id: RequestId,
    ) -> Registration {
        if !pins::ACCELEROMETER_PORTS.contains(&port) {
            debug!("Sensors: {} is not an accelerometer port, reporting 0", port);
            return Registration::Immediate(0.0);
        }
        let superseded = self.accelerometer.replace(id);
        board.send_frame(&frames::accelerometer_frame(axis));
        Registration::Pending { superseded }
    }

    /// Handle a command reply.  Only accelerometer replies complete a read.
    pub fn on_command_reply(&mut self, command: u8, value: i32) -> Option<(RequestId, f64)> {
        if command != frames::CMD_ACCELEROMETER {
            debug!("Sensors: ignoring reply for command 0x{:02X}", command);
            return None;
        }
        match self.accelerometer.take() {
            Some(id) => Some((id, f64::from(value))),
            None => {
                debug!("Sensors: dropping unclaimed accelerometer reply");
                None
            }
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Drop every pending read, disabling its reporting, and return the
    /// request ids so the caller can cancel them.
    pub fn cancel_all(&mut self, board: &mut impl BoardPort) -> Vec<RequestId, { MAX_SLOTS + 1 }> {
        let mut ids = Vec::new();
        for (&(category, pin), &id) in &self.slots {
            board.set_reporting(category, pin, false);
            let _ = ids.push(id);
        }
        self.slots.clear();
        if let Some(id) = self.accelerometer.take() {
            let _ = ids.push(id);
        }
        ids
    }

    pub fn is_pending(&self, category: ReportCategory, pin: u8) -> bool {
        self.slots.contains_key(&(category, pin))
    }

    pub fn accelerometer_pending(&self) -> bool {
        self.accelerometer.is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.slots.len() + usize::from(self.accelerometer.is_some())
    }
}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
