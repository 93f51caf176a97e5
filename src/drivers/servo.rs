//! Servo driver with two-phase synchronized motion.
//!
//! Outside synchronized mode a degree request moves the servo directly.
//! Synchronized mode batches targets so several servos arrive together:
//!
//! ```text
//!  begin ──▶ synchronized=true, targets cleared
//!    │
//!    ├─ servo-degree(port, d) ──▶ record target only (no board I/O)
//!    │
//!  execute(speed) ──▶ plan: per-port delta from last written degree
//!    │
//!    ├─ max delta 0      ──▶ complete now
//!    ├─ speed 20 (delay 0) ──▶ write all targets, settle max_delta*factor ms
//!    └─ otherwise        ──▶ ceil(max_delta) interpolation steps, one per
//!                            `delay` ms, then one more `delay`, complete
//! ```
//!
//! Each running motion is an explicit state machine advanced by the
//! controller when its scheduler timer fires.

use heapless::{FnvIndexMap, Vec};
use log::{debug, warn};

use crate::app::events::RequestId;
use crate::app::ports::{BoardPort, PinMode};
use crate::pins;

pub const MAX_DEGREE: f64 = 180.0;
pub const CENTER_DEGREE: f64 = 90.0;
/// Fastest synchronized speed; maps to a zero step delay.
pub const MAX_SPEED: f64 = 20.0;

/// Map capacity (power of two for `FnvIndexMap`).
const MAX_SERVO_PORTS: usize = 16;
const MAX_MOTIONS: usize = 4;

type DegreeMap = FnvIndexMap<&'static str, f64, MAX_SERVO_PORTS>;

pub fn clamp_degree(degree: f64) -> f64 {
    if degree.is_nan() { 0.0 } else { degree.clamp(0.0, MAX_DEGREE) }
}

pub fn clamp_speed(speed: f64) -> f64 {
    if speed.is_nan() { 0.0 } else { speed.clamp(0.0, MAX_SPEED) }
}

/// What the controller must do after starting or advancing a motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionStep {
    /// The motion is finished; complete its request.
    Complete,
    /// Re-arm the motion's timer this many ms after the current deadline.
    WaitMs(u64),
}

#[derive(Debug, Clone, Copy)]
struct Track {
    port: &'static str,
    pin: u8,
    start: f64,
    target: f64,
    /// Degrees moved per unit step (delta / max_delta).
    per_step: f64,
}

impl Track {
    fn position(&self, step: u32, max_delta: f64) -> f64 {
        let k = f64::from(step);
        if k >= max_delta {
            self.target
        } else {
            self.start + self.per_step * k
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    /// Targets already written; waiting out the settle delay.
    Settle,
    /// `done` of `total` steps written so far.
    Stepping { done: u32, total: u32, delay_ms: u64 },
    /// Last step written; waiting one more delay before completing.
    Arriving,
}

#[derive(Debug)]
struct Motion {
    request: RequestId,
    tracks: Vec<Track, MAX_SERVO_PORTS>,
    max_delta: f64,
    plan: Plan,
}

pub struct ServoSync {
    synchronized: bool,
    /// Targets recorded while synchronized.
    expected: DegreeMap,
    /// Start degree of each port in the last executed plan.
    current: DegreeMap,
    /// Normalized per-step delta of each port in the last executed plan.
    delta: DegreeMap,
    /// Last degree written to each servo.
    last_written: DegreeMap,
    motions: Vec<Motion, MAX_MOTIONS>,
}

impl ServoSync {
    pub fn new() -> Self {
        Self {
            synchronized: false,
            expected: DegreeMap::new(),
            current: DegreeMap::new(),
            delta: DegreeMap::new(),
            last_written: DegreeMap::new(),
            motions: Vec::new(),
        }
    }

    /// Forget every recorded degree and leave synchronized mode.
    /// Running motions must be cancelled first with [`cancel_all`](Self::cancel_all).
    pub fn reset(&mut self) {
        self.synchronized = false;
        self.expected.clear();
        self.current.clear();
        self.delta.clear();
        self.last_written.clear();
    }

    /// Configure a servo port and centre it.
    pub fn init_port(&mut self, board: &mut impl BoardPort, port: &'static str, pin: u8) {
        board.set_pin_mode(pin, PinMode::Servo);
        write_servo(board, &mut self.last_written, port, pin, CENTER_DEGREE);
    }

    // ── Synchronized protocol ─────────────────────────────────

    /// Phase one: enter synchronized mode with empty bookkeeping.
    pub fn begin(&mut self) {
        self.synchronized = true;
        self.expected.clear();
        self.current.clear();
        self.delta.clear();
        debug!("Servo: synchronized motion begin");
    }

    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    /// Record a target while synchronized.  No board I/O.
    pub fn record_target(&mut self, port: &'static str, degree: f64) {
        if self.expected.insert(port, clamp_degree(degree)).is_err() {
            warn!("Servo: target map full, dropping target for {}", port);
        }
    }

    /// Move a servo directly (not synchronized).
    pub fn write_degree(&mut self, board: &mut impl BoardPort, port: &'static str, pin: u8, degree: f64) {
        write_servo(board, &mut self.last_written, port, pin, clamp_degree(degree));
    }

    /// Phase two: plan and start the motion for every recorded target.
    pub fn execute(
        &mut self,
        board: &mut impl BoardPort,
        request: RequestId,
        speed: f64,
        settle_factor_ms: u64,
    ) -> MotionStep {
        self.synchronized = false;
        self.current.clear();
        self.delta.clear();

        let mut tracks: Vec<Track, MAX_SERVO_PORTS> = Vec::new();
        let mut max_delta: f64 = 0.0;
        for (&port, &target) in &self.expected {
            let Some(pin) = pins::resolve(port).and_then(pins::PinSpec::single) else {
                continue;
            };
            let start = self.last_written.get(port).copied().unwrap_or(0.0);
            let delta = target - start;
            max_delta = max_delta.max(delta.abs());
            // Both maps share `expected`'s capacity, so these cannot overflow.
            let _ = self.current.insert(port, start);
            let _ = self.delta.insert(port, delta);
            let _ = tracks.push(Track {
                port,
                pin,
                start,
                target,
                per_step: delta,
            });
        }
        self.expected.clear();

        if max_delta == 0.0 {
            debug!("Servo: request {} needs no motion", request);
            return MotionStep::Complete;
        }

        let delay = MAX_SPEED - clamp_speed(speed);
        let (plan, wait_ms) = if delay == 0.0 {
            for t in &tracks {
                write_servo(board, &mut self.last_written, t.port, t.pin, t.target);
            }
            let settle_ms = (max_delta * settle_factor_ms as f64).ceil() as u64;
            (Plan::Settle, settle_ms)
        } else {
            for t in tracks.iter_mut() {
                t.per_step /= max_delta;
            }
            for (_, d) in self.delta.iter_mut() {
                *d /= max_delta;
            }
            let total = max_delta.ceil() as u32;
            let delay_ms = delay.ceil() as u64;
            for t in &tracks {
                let pos = t.position(1, max_delta);
                write_servo(board, &mut self.last_written, t.port, t.pin, pos);
            }
            let plan = if total <= 1 {
                Plan::Arriving
            } else {
                Plan::Stepping { done: 1, total, delay_ms }
            };
            (plan, delay_ms)
        };

        let motion = Motion {
            request,
            tracks,
            max_delta,
            plan,
        };
        if let Err(motion) = self.motions.push(motion) {
            warn!("Servo: motion table full, snapping request {} to targets", request);
            for t in &motion.tracks {
                write_servo(board, &mut self.last_written, t.port, t.pin, t.target);
            }
            return MotionStep::Complete;
        }
        debug!(
            "Servo: request {} started, max_delta={} plan={:?}",
            request, max_delta, plan
        );
        MotionStep::WaitMs(wait_ms)
    }

    /// Advance a running motion after its timer fired.  Returns `None` if
    /// no motion is running for `request`.
    pub fn advance(&mut self, board: &mut impl BoardPort, request: RequestId) -> Option<MotionStep> {
        let idx = self.motions.iter().position(|m| m.request == request)?;
        let motion = &mut self.motions[idx];
        let plan = motion.plan;
        match plan {
            Plan::Settle | Plan::Arriving => {
                self.motions.swap_remove(idx);
                debug!("Servo: request {} complete", request);
                Some(MotionStep::Complete)
            }
            Plan::Stepping { done, total, delay_ms } => {
                let step = done + 1;
                for t in &motion.tracks {
                    let pos = t.position(step, motion.max_delta);
                    write_servo(board, &mut self.last_written, t.port, t.pin, pos);
                }
                motion.plan = if step >= total {
                    Plan::Arriving
                } else {
                    Plan::Stepping { done: step, total, delay_ms }
                };
                Some(MotionStep::WaitMs(delay_ms))
            }
        }
    }

    /// Stop one motion where it is.  Returns `false` if it was not running.
    pub fn abort(&mut self, request: RequestId) -> bool {
        match self.motions.iter().position(|m| m.request == request) {
            Some(idx) => {
                self.motions.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    /// Drop every running motion and return their request ids.
    pub fn cancel_all(&mut self) -> Vec<RequestId, MAX_MOTIONS> {
        let ids = self.motions.iter().map(|m| m.request).collect();
        self.motions.clear();
        ids
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn target(&self, port: &str) -> Option<f64> {
        self.expected.get(port).copied()
    }

    pub fn target_count(&self) -> usize {
        self.expected.len()
    }

    /// Normalized per-step delta planned for `port` by the last execute.
    pub fn planned_delta(&self, port: &str) -> Option<f64> {
        self.delta.get(port).copied()
    }

    /// Start degree planned for `port` by the last execute.
    pub fn planned_start(&self, port: &str) -> Option<f64> {
        self.current.get(port).copied()
    }

    pub fn last_written(&self, port: &str) -> Option<f64> {
        self.last_written.get(port).copied()
    }

    pub fn active_motions(&self) -> usize {
        self.motions.len()
    }
}

impl Default for ServoSync {
    fn default() -> Self {
        Self::new()
    }
}

fn write_servo(board: &mut impl BoardPort, last_written: &mut DegreeMap, port: &'static str, pin: u8, degree: f64) {
    board.servo_write(pin, degree.round().clamp(0.0, MAX_DEGREE) as u8);
    if last_written.insert(port, degree).is_err() {
        warn!("Servo: degree map full, not tracking {}", port);
    }
}
