//! Controller: the hexagonal core.
//!
//! [`Controller`] owns every piece of mutable state (RGB gate coupling,
//! motor table, servo synchronization, sensor slots, timers, session) and
//! exposes a hardware-agnostic API.  The board is injected at every call
//! site, so the whole core runs against a recording mock in tests.
//!
//! ```text
//!  ActionRequest ──▶ ┌───────────────────────────────┐ ──▶ BoardPort
//!                    │          Controller           │
//!  BoardEvent ─────▶ │ RGB · Motors · Servo · Sensor │ ──▶ completion queue
//!  poll(now) ──────▶ │     Scheduler · Session       │        (next_event)
//!                    └───────────────────────────────┘
//! ```
//!
//! Every request either completes synchronously ([`Dispatch::Done`]) or is
//! given a [`RequestId`] ([`Dispatch::Pending`]) and completes later as a
//! [`ControllerEvent::Completed`] on the queue, exactly once.
//!
//! Room on the queue is reserved for every pending request when it is
//! admitted: queued events plus outstanding requests never exceed
//! [`EVENT_QUEUE_DEPTH`].  A request that could go pending is refused with
//! [`ActionError::QueueFull`] while the caller has not drained enough
//! events, and session events are dropped before a completion ever is.

use std::collections::BTreeMap;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use log::{debug, info, warn};
use serde_json::Value;

use crate::config::ControllerConfig;
use crate::drivers::dc_motor::DcMotors;
use crate::drivers::rgb_led::{self, RgbLed};
use crate::drivers::servo::{MotionStep, ServoSync};
use crate::error::{ActionError, SessionError};
use crate::events::BoardEvent;
use crate::frames::{self, Axis};
use crate::pins::{self, PinSpec, PortEntry, PortGroup};
use crate::scheduler::{Scheduler, TimerKind};
use crate::sensors::{Registration, SensorRegistry};
use crate::session::{Session, SessionState};

use super::commands::{Action, ActionRequest, PortCategory, RequestError};
use super::events::{Completion, ControllerEvent, RequestId, SessionEvent};
use super::ports::{BoardPort, EventSink, Level, PinMode, ReportCategory};

/// Depth of the outbound event queue.
pub const EVENT_QUEUE_DEPTH: usize = 64;

/// Queue slots kept free of completions for session events.
pub const SESSION_EVENT_RESERVE: usize = 2;

/// Immediate result of handling a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dispatch {
    /// Completed synchronously; `Some` for reads.
    Done(Option<f64>),
    /// Completes later through the event queue.
    Pending(RequestId),
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

pub struct Controller {
    config: ControllerConfig,
    rgb: RgbLed,
    motors: DcMotors,
    servos: ServoSync,
    sensors: SensorRegistry,
    scheduler: Scheduler,
    session: Session,
    events: Channel<NoopRawMutex, ControllerEvent, EVENT_QUEUE_DEPTH>,
    next_request: RequestId,
    /// Latest time seen from `poll` or a request call.
    now_ms: u64,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            rgb: RgbLed::new(),
            motors: DcMotors::new(),
            servos: ServoSync::new(),
            sensors: SensorRegistry::new(),
            scheduler: Scheduler::new(),
            session: Session::new(),
            events: Channel::new(),
            next_request: 1,
            now_ms: 0,
        }
    }

    // ── Request handling ──────────────────────────────────────

    /// Decode and handle a JSON request at `now_ms`.  Malformed fields are
    /// logged and the request is ignored.
    pub fn submit_json(
        &mut self,
        request: &Value,
        now_ms: u64,
        board: &mut impl BoardPort,
    ) -> Result<Dispatch, ActionError> {
        match ActionRequest::from_json(request) {
            Ok(req) => self.handle(&req, now_ms, board),
            Err(RequestError::UnknownAction(name)) => {
                warn!("Controller: unknown action \"{}\"", name);
                Err(ActionError::UnknownAction(name))
            }
            Err(e @ RequestError::Malformed(_)) => {
                warn!("Controller: ignoring request: {}", e);
                Ok(Dispatch::Done(None))
            }
        }
    }

    /// Handle one decoded request at `now_ms`.  Timers armed by the
    /// request count from that time.
    pub fn handle(
        &mut self,
        request: &ActionRequest,
        now_ms: u64,
        board: &mut impl BoardPort,
    ) -> Result<Dispatch, ActionError> {
        self.advance_clock(now_ms);
        debug!("Controller: {:?}", request.action);

        match &request.action {
            Action::InitBoard => self.init_board(board),
            Action::ConfigurePorts { port_settings } => self.configure_ports(board, port_settings),
            Action::DigitalWrite { port, value } => write_digital(board, port, *value),
            Action::Led { port, on } => match rgb_led::Channel::for_port(port) {
                Some(ch) => {
                    self.rgb.set_channel(board, ch, *on);
                    board.digital_write(ch.pin(), Level::from_bool(*on));
                }
                None => write_digital(board, port, *on),
            },
            Action::MultiLed { r, g, b } => self.rgb.set_mix(board, *r, *g, *b),
            Action::Buzzer { port, on, frequency } => {
                if let Some(pin) = pins::resolve(port).and_then(PinSpec::single) {
                    let hz = frequency.clamp(0.0, f64::from(frames::MAX_FREQUENCY_HZ)) as u16;
                    board.send_frame(&frames::buzzer_frame(pin, *on, hz));
                }
            }
            Action::MotorPower { port, power } => self.motors.set_power(board, port, *power),
            Action::MotorMode { port, mode } => self.motors.set_mode(board, port, *mode),
            Action::MotorDirection { port, direction } => self.motors.set_mode(board, port, (*direction).into()),
            Action::ServoDegree { port, degree } => self.servo_degree(board, port, *degree),
            Action::ServoSync => {
                if let Some(phase) = request.phase {
                    self.admit()?;
                    return Ok(self.execute_servo_sync(board, phase.speed));
                }
                self.servos.begin();
            }
            Action::AccelerometerRead { port, axis } => {
                self.admit()?;
                let id = self.allocate_request();
                let reg = self
                    .sensors
                    .read_accelerometer(board, port, Axis::from_selector(axis), id);
                return Ok(self.registration(id, reg));
            }
            Action::DigitalRead { port }
            | Action::ReadButton { port }
            | Action::ReadTouch { port }
            | Action::ReadIr { port } => {
                self.admit()?;
                return Ok(self.read(board, ReportCategory::Digital, port));
            }
            Action::AnalogRead { port } | Action::ReadLight { port } | Action::ReadSound { port } => {
                self.admit()?;
                return Ok(self.read(board, ReportCategory::Analog, port));
            }
        }
        Ok(Dispatch::Done(None))
    }

    // ── Board initialization ──────────────────────────────────

    /// Reset every actuator model and configure all ports with their
    /// group default.
    pub fn init_board(&mut self, board: &mut impl BoardPort) {
        info!("Controller: initializing board");
        for id in self.servos.cancel_all() {
            self.scheduler.cancel_kind(TimerKind::ServoMotion(id));
            self.complete(id, Err(ActionError::Cancelled));
        }
        self.servos.reset();
        self.motors.reset();
        self.configure_ports(board, &BTreeMap::new());
    }

    /// Apply a port → category map.  Ports missing from the map get their
    /// group default; the RGB group is always initialized.
    pub fn configure_ports(&mut self, board: &mut impl BoardPort, settings: &BTreeMap<String, String>) {
        for name in settings.keys() {
            if pins::entry(name).is_none() {
                warn!("Controller: port-settings names unknown port {}", name);
            }
        }

        for entry in pins::PORT_TABLE {
            let default = match entry.group {
                PortGroup::Actuator => PortCategory::Output,
                PortGroup::Sensor => PortCategory::Input,
                PortGroup::Rgb | PortGroup::Accelerometer => continue,
            };
            let category = match settings.get(entry.name) {
                None => default,
                Some(s) => PortCategory::parse(s).unwrap_or_else(|| {
                    warn!("Controller: unknown category \"{}\" for {}, using {:?}", s, entry.name, default);
                    default
                }),
            };
            self.init_port(board, entry, category);
        }

        self.rgb.init(board);
    }

    fn init_port(&mut self, board: &mut impl BoardPort, entry: &'static PortEntry, category: PortCategory) {
        match category {
            PortCategory::Output => {
                for pin in entry.spec.pins() {
                    board.set_pin_mode(pin, PinMode::Output);
                    board.digital_write(pin, Level::Inactive);
                }
            }
            PortCategory::Input => {
                for pin in entry.spec.pins() {
                    board.set_pin_mode(pin, PinMode::Input);
                }
            }
            PortCategory::Button => {
                for pin in entry.spec.pins() {
                    board.set_pin_mode(pin, PinMode::InputPullup);
                }
            }
            PortCategory::DcMotor => {
                if !self.motors.init_port(board, entry.name) {
                    warn!("Controller: {} cannot drive a DC motor", entry.name);
                }
            }
            PortCategory::Servo => match entry.spec.single() {
                Some(pin) => self.servos.init_port(board, entry.name, pin),
                None => warn!("Controller: {} cannot drive a servo", entry.name),
            },
            PortCategory::Accelerometer => {}
        }
    }

    // ── Servo ─────────────────────────────────────────────────

    fn servo_degree(&mut self, board: &mut impl BoardPort, port: &str, degree: f64) {
        let Some(entry) = pins::entry(port) else {
            return;
        };
        let Some(pin) = entry.spec.single() else {
            return;
        };
        if self.servos.is_synchronized() {
            self.servos.record_target(entry.name, degree);
        } else {
            self.servos.write_degree(board, entry.name, pin, degree);
        }
    }

    fn execute_servo_sync(&mut self, board: &mut impl BoardPort, speed: f64) -> Dispatch {
        let id = self.allocate_request();
        match self
            .servos
            .execute(board, id, speed, self.config.servo_settle_factor_ms)
        {
            MotionStep::Complete => Dispatch::Done(None),
            MotionStep::WaitMs(ms) => {
                if self
                    .scheduler
                    .arm(self.now_ms + ms, TimerKind::ServoMotion(id))
                    .is_none()
                {
                    self.servos.abort(id);
                    return Dispatch::Done(None);
                }
                Dispatch::Pending(id)
            }
        }
    }

    // ── Sensors ───────────────────────────────────────────────

    fn read(&mut self, board: &mut impl BoardPort, category: ReportCategory, port: &str) -> Dispatch {
        let id = self.allocate_request();
        let reg = self.sensors.register(board, category, port, id);
        self.registration(id, reg)
    }

    fn registration(&mut self, id: RequestId, reg: Registration) -> Dispatch {
        match reg {
            Registration::Immediate(value) => Dispatch::Done(Some(value)),
            Registration::Pending { superseded } => {
                if let Some(old) = superseded {
                    self.complete(old, Err(ActionError::Superseded));
                }
                Dispatch::Pending(id)
            }
        }
    }

    // ── Inbound board events ──────────────────────────────────

    pub fn on_board_event(&mut self, event: BoardEvent, board: &mut impl BoardPort) {
        match event {
            BoardEvent::Report { category, pin, value } => {
                if let Some((id, v)) = self.sensors.on_report(board, category, pin, value) {
                    self.complete(id, Ok(Some(v)));
                }
            }
            BoardEvent::CommandReply { command, value } => {
                if let Some((id, v)) = self.sensors.on_command_reply(command, value) {
                    self.complete(id, Ok(Some(v)));
                }
            }
            BoardEvent::LinkUp => {
                if let Some(ev) = self.session.on_link_up(self.now_ms, &self.config, &mut self.scheduler) {
                    self.init_board(board);
                    self.push_session(ev);
                }
            }
            BoardEvent::LinkFailed(reason) => {
                if let Some(ev) = self.session.on_link_failed(&reason, &mut self.scheduler) {
                    self.push_session(ev);
                }
            }
            BoardEvent::VersionReply => self.session.on_probe_reply(),
        }
    }

    // ── Timers ────────────────────────────────────────────────

    /// Advance the clock to `now_ms` and fire every due timer.
    ///
    /// A servo motion advances by one step per firing and its next step is
    /// armed from `now_ms`, so a late poll delays the motion instead of
    /// collapsing its remaining steps into one jump.
    pub fn poll(&mut self, now_ms: u64, board: &mut impl BoardPort) {
        self.advance_clock(now_ms);
        while let Some((_, kind)) = self.scheduler.take_due(self.now_ms) {
            match kind {
                TimerKind::ServoMotion(id) => match self.servos.advance(board, id) {
                    Some(MotionStep::WaitMs(ms)) => {
                        if self.scheduler.arm(self.now_ms + ms, kind).is_none() {
                            self.servos.abort(id);
                            self.complete(id, Ok(None));
                        }
                    }
                    Some(MotionStep::Complete) => self.complete(id, Ok(None)),
                    None => debug!("Controller: stale servo timer for request {}", id),
                },
                TimerKind::OpenTimeout => {
                    if let Some(ev) = self.session.on_open_timeout(&mut self.scheduler, board) {
                        self.push_session(ev);
                    }
                }
                TimerKind::LivenessProbe => {
                    let lost = self
                        .session
                        .on_probe_due(self.now_ms, &self.config, &mut self.scheduler, board);
                    if let Some(ev) = lost {
                        self.cancel_pending(board);
                        self.push_session(ev);
                    }
                }
            }
        }
    }

    // ── Session ───────────────────────────────────────────────

    /// Start opening a session on `transport` at `now_ms`.  The open
    /// timeout counts from that time.
    pub fn open(&mut self, transport: &str, now_ms: u64, board: &mut impl BoardPort) -> Result<(), SessionError> {
        self.advance_clock(now_ms);
        self.session
            .open(transport, self.now_ms, &self.config, &mut self.scheduler, board)
    }

    /// Close the session, cancelling pending reads and servo motions.
    /// Always succeeds.
    pub fn close(&mut self, board: &mut impl BoardPort) {
        self.cancel_pending(board);
        if self.session.close(&mut self.scheduler, board) {
            self.push_session(SessionEvent::Closed);
        }
    }

    fn cancel_pending(&mut self, board: &mut impl BoardPort) {
        for id in self.sensors.cancel_all(board) {
            self.complete(id, Err(ActionError::Cancelled));
        }
        for id in self.servos.cancel_all() {
            self.scheduler.cancel_kind(TimerKind::ServoMotion(id));
            self.complete(id, Err(ActionError::Cancelled));
        }
    }

    // ── Outbound events ───────────────────────────────────────

    /// Next queued completion or session event.
    pub fn next_event(&mut self) -> Option<ControllerEvent> {
        self.events.try_receive().ok()
    }

    /// Hand every queued event to `sink`.
    pub fn drain_events(&mut self, sink: &mut impl EventSink) -> usize {
        let mut n = 0;
        while let Some(ev) = self.next_event() {
            sink.emit(&ev);
            n += 1;
        }
        n
    }

    fn complete(&mut self, id: RequestId, result: Result<Option<f64>, ActionError>) {
        self.push(ControllerEvent::Completed(Completion { id, result }));
    }

    fn push(&mut self, event: ControllerEvent) {
        if let Err(TrySendError::Full(ev)) = self.events.try_send(event) {
            warn!("Controller: event queue full, dropping {:?}", ev);
        }
    }

    /// Queue a session event unless that would eat into the room reserved
    /// for outstanding completions.
    fn push_session(&mut self, event: SessionEvent) {
        if self.events.len() + self.outstanding() >= EVENT_QUEUE_DEPTH {
            warn!("Controller: event queue full, dropping {:?}", event);
            return;
        }
        self.push(ControllerEvent::Session(event));
    }

    /// Refuse a request that may go pending unless its completion is
    /// guaranteed a slot on the queue.
    fn admit(&self) -> Result<(), ActionError> {
        let committed = self.events.len() + self.outstanding();
        if committed + 1 + SESSION_EVENT_RESERVE > EVENT_QUEUE_DEPTH {
            warn!(
                "Controller: refusing request, {} queued and {} pending",
                self.events.len(),
                self.outstanding()
            );
            return Err(ActionError::QueueFull);
        }
        Ok(())
    }

    /// Requests that still owe a completion.
    fn outstanding(&self) -> usize {
        self.sensors.pending_count() + self.servos.active_motions()
    }

    fn advance_clock(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    fn allocate_request(&mut self) -> RequestId {
        let id = self.next_request;
        self.next_request = self.next_request.wrapping_add(1).max(1);
        id
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Latest time the controller has seen.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn transport(&self) -> Option<&str> {
        self.session.transport()
    }

    /// Pending sensor reads or running servo motions exist.
    pub fn has_pending(&self) -> bool {
        self.sensors.pending_count() > 0 || self.servos.active_motions() > 0
    }

    /// Earliest armed timer deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_due()
    }

    pub fn rgb(&self) -> &RgbLed {
        &self.rgb
    }

    pub fn motors(&self) -> &DcMotors {
        &self.motors
    }

    pub fn servos(&self) -> &ServoSync {
        &self.servos
    }

    pub fn sensors(&self) -> &SensorRegistry {
        &self.sensors
    }
}

/// Drive every pin of an ordinary port.  Unresolved ports are no-ops.
fn write_digital(board: &mut impl BoardPort, port: &str, on: bool) {
    let Some(spec) = pins::resolve(port) else {
        debug!("Controller: {} is not drivable", port);
        return;
    };
    for pin in spec.pins() {
        board.digital_write(pin, Level::from_bool(on));
    }
}
