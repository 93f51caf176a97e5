//! DC motor driver for dual-pin (drive + direction) motor ports.
//!
//! Each motor port has a variable-output drive pin (pin A) and a digital
//! direction pin (pin B).  The four drive modes map to pin states as:
//!
//! | Mode    | pin B    | pin A         |
//! |---------|----------|---------------|
//! | Normal  | inactive | power         |
//! | Reverse | active   | 1023 − power  |
//! | Coast   | inactive | 0             |
//! | Brake   | active   | 1023          |
//!
//! Power is stored per port and re-applied whenever the mode changes.

use heapless::Vec;
use log::{debug, warn};
use serde::Deserialize;

use crate::app::ports::{BoardPort, Level, PinMode};
use crate::pins::{self, PinSpec, PortGroup};

/// Full-scale drive value.
pub const MAX_POWER: u16 = 1023;

const MAX_MOTORS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorMode {
    Normal,
    Reverse,
    Coast,
    Brake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

impl From<Direction> for MotorMode {
    fn from(dir: Direction) -> Self {
        match dir {
            Direction::Forward => Self::Normal,
            Direction::Backward => Self::Reverse,
        }
    }
}

/// Pin states for a mode at a given stored power: `(pin B level, pin A value)`.
pub fn drive_levels(mode: MotorMode, power: u16) -> (Level, u16) {
    let power = power.min(MAX_POWER);
    match mode {
        MotorMode::Normal => (Level::Inactive, power),
        MotorMode::Reverse => (Level::Active, MAX_POWER - power),
        MotorMode::Coast => (Level::Inactive, 0),
        MotorMode::Brake => (Level::Active, MAX_POWER),
    }
}

/// Scale a 0–100 percentage to the 0–1023 drive range (clamped, floored).
pub fn scale_power(percent: f64) -> u16 {
    let p = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
    (p * f64::from(MAX_POWER) / 100.0).floor() as u16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorState {
    pub power: u16,
    pub mode: MotorMode,
}

impl MotorState {
    const IDLE: Self = Self {
        power: 0,
        mode: MotorMode::Coast,
    };
}

#[derive(Debug)]
struct MotorChannel {
    port: &'static str,
    drive_pin: u8,
    dir_pin: u8,
    state: MotorState,
}

/// Every motor port on the board, created at construction from the port
/// table and never removed.
pub struct DcMotors {
    channels: Vec<MotorChannel, MAX_MOTORS>,
}

impl DcMotors {
    pub fn new() -> Self {
        let mut channels = Vec::new();
        for entry in pins::ports_in(PortGroup::Actuator) {
            if let PinSpec::Pair { analog, digital } = entry.spec {
                let channel = MotorChannel {
                    port: entry.name,
                    drive_pin: analog,
                    dir_pin: digital,
                    state: MotorState::IDLE,
                };
                if channels.push(channel).is_err() {
                    warn!("DcMotors: no room for motor port {}", entry.name);
                }
            }
        }
        Self { channels }
    }

    /// Forget all stored power/mode (re-initialisation).  No board I/O.
    pub fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.state = MotorState::IDLE;
        }
    }

    /// Configure a motor port's pins and force it to coast at power 0.
    /// Returns `false` for ports that are not motor ports.
    pub fn init_port(&mut self, board: &mut impl BoardPort, port: &str) -> bool {
        let Some(ch) = self.channel_mut(port) else {
            return false;
        };
        board.set_pin_mode(ch.dir_pin, PinMode::Output);
        board.set_pin_mode(ch.drive_pin, PinMode::Pwm);
        ch.state = MotorState::IDLE;
        apply(board, ch);
        true
    }

    /// Store a new power (percent) and re-apply the current mode.
    pub fn set_power(&mut self, board: &mut impl BoardPort, port: &str, percent: f64) {
        let Some(ch) = self.channel_mut(port) else {
            debug!("DcMotors: set_power on non-motor port {}", port);
            return;
        };
        ch.state.power = scale_power(percent);
        apply(board, ch);
    }

    /// Store a new mode and re-apply it with the stored power.
    pub fn set_mode(&mut self, board: &mut impl BoardPort, port: &str, mode: MotorMode) {
        let Some(ch) = self.channel_mut(port) else {
            debug!("DcMotors: set_mode on non-motor port {}", port);
            return;
        };
        ch.state.mode = mode;
        apply(board, ch);
    }

    pub fn state(&self, port: &str) -> Option<MotorState> {
        self.channels.iter().find(|c| c.port == port).map(|c| c.state)
    }

    fn channel_mut(&mut self, port: &str) -> Option<&mut MotorChannel> {
        self.channels.iter_mut().find(|c| c.port == port)
    }
}

impl Default for DcMotors {
    fn default() -> Self {
        Self::new()
    }
}

fn apply(board: &mut impl BoardPort, ch: &MotorChannel) {
    let (dir, drive) = drive_levels(ch.state.mode, ch.state.power);
    board.digital_write(ch.dir_pin, dir);
    board.analog_write(ch.drive_pin, drive);
    debug!(
        "Motor {}: {:?} power={} -> dir={:?} drive={}",
        ch.port, ch.state.mode, ch.state.power, dir, drive
    );
}
