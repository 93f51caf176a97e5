//! In-memory simulated board.
//!
//! Implements [`BoardPort`] by recording every call in [`SimBoard::ops`]
//! and queueing the events a real board would push back:
//!
//! - `open_link` answers `LinkUp` (or `LinkFailed`, or nothing, per
//!   [`LinkBehavior`]);
//! - `query_version` answers `VersionReply` while probes are answered;
//! - enabling reporting answers one `Report` with the simulated input value;
//! - an accelerometer frame answers a `CommandReply` with the axis value.
//!
//! The runner drains the queue with [`SimBoard::pop_event`] and feeds it
//! back into the controller.

use std::collections::{BTreeMap, VecDeque};

use log::debug;

use crate::app::ports::{BoardPort, Level, PinMode, ReportCategory};
use crate::events::BoardEvent;
use crate::frames::{self, Axis};

/// One recorded board call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardOp {
    SetPinMode { pin: u8, mode: PinMode },
    DigitalWrite { pin: u8, level: Level },
    AnalogWrite { pin: u8, value: u16 },
    ServoWrite { pin: u8, degree: u8 },
    SetReporting { category: ReportCategory, pin: u8, enabled: bool },
    SendFrame(Vec<u8>),
    QueryVersion,
    OpenLink(String),
    CloseLink,
}

/// How the simulated link reacts to `open_link`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkBehavior {
    Up,
    Fail(String),
    /// Never answers; the open attempt times out.
    Silent,
}

pub struct SimBoard {
    pub ops: Vec<BoardOp>,
    pending: VecDeque<BoardEvent>,
    inputs: BTreeMap<(ReportCategory, u8), u16>,
    accel: [i32; 3],
    link: LinkBehavior,
    answer_probes: bool,
}

impl SimBoard {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            pending: VecDeque::new(),
            inputs: BTreeMap::new(),
            accel: [0; 3],
            link: LinkBehavior::Up,
            answer_probes: true,
        }
    }

    /// Set the raw value reported for `pin` in `category`.
    pub fn set_input(&mut self, category: ReportCategory, pin: u8, raw: u16) {
        self.inputs.insert((category, pin), raw);
    }

    pub fn set_accelerometer(&mut self, x: i32, y: i32, z: i32) {
        self.accel = [x, y, z];
    }

    pub fn set_link(&mut self, behavior: LinkBehavior) {
        self.link = behavior;
    }

    pub fn set_answer_probes(&mut self, answer: bool) {
        self.answer_probes = answer;
    }

    /// Next event the board pushed back, oldest first.
    pub fn pop_event(&mut self) -> Option<BoardEvent> {
        self.pending.pop_front()
    }

    pub fn has_events(&self) -> bool {
        !self.pending.is_empty()
    }

    fn axis_value(&self, axis: Axis) -> i32 {
        match axis {
            Axis::X => self.accel[0],
            Axis::Y => self.accel[1],
            Axis::Z => self.accel[2],
        }
    }
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardPort for SimBoard {
    fn set_pin_mode(&mut self, pin: u8, mode: PinMode) {
        self.ops.push(BoardOp::SetPinMode { pin, mode });
    }

    fn digital_write(&mut self, pin: u8, level: Level) {
        self.ops.push(BoardOp::DigitalWrite { pin, level });
    }

    fn analog_write(&mut self, pin: u8, value: u16) {
        self.ops.push(BoardOp::AnalogWrite { pin, value });
    }

    fn servo_write(&mut self, pin: u8, degree: u8) {
        self.ops.push(BoardOp::ServoWrite { pin, degree });
    }

    fn set_reporting(&mut self, category: ReportCategory, pin: u8, enabled: bool) {
        self.ops.push(BoardOp::SetReporting { category, pin, enabled });
        if enabled {
            let value = self.inputs.get(&(category, pin)).copied().unwrap_or(0);
            self.pending.push_back(BoardEvent::Report { category, pin, value });
        }
    }

    fn send_frame(&mut self, frame: &[u8]) {
        self.ops.push(BoardOp::SendFrame(frame.to_vec()));
        if let Some(axis) = frames::parse_accelerometer_frame(frame) {
            self.pending.push_back(BoardEvent::CommandReply {
                command: frames::CMD_ACCELEROMETER,
                value: self.axis_value(axis),
            });
        }
    }

    fn query_version(&mut self) {
        self.ops.push(BoardOp::QueryVersion);
        if self.answer_probes {
            self.pending.push_back(BoardEvent::VersionReply);
        }
    }

    fn open_link(&mut self, transport: &str) {
        self.ops.push(BoardOp::OpenLink(transport.to_owned()));
        match &self.link {
            LinkBehavior::Up => self.pending.push_back(BoardEvent::LinkUp),
            LinkBehavior::Fail(reason) => self.pending.push_back(BoardEvent::LinkFailed(reason.clone())),
            LinkBehavior::Silent => debug!("SimBoard: link request for {} left unanswered", transport),
        }
    }

    fn close_link(&mut self) {
        self.ops.push(BoardOp::CloseLink);
    }
}
