//! Three-channel LED driver behind a shared FET gate.
//!
//! The R, G and B channel lines each have their own pin, but power reaches
//! them only while the FET gate is enabled.  The gate is a shared resource:
//!
//! - it is enabled iff at least one channel is marked as driven;
//! - it is written by this driver and nothing else.
//!
//! The channel outputs are active-low, so variable-output duty values are
//! written inverted.

use log::debug;

use crate::app::ports::{BoardPort, Level, PinMode};
use crate::pins;

/// Full-scale duty for the LED channels.
pub const MAX_DUTY: u16 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    /// The channel a port name addresses, if it is one of the RGB ports.
    pub fn for_port(name: &str) -> Option<Self> {
        match name {
            "LED_R" => Some(Self::Red),
            "LED_G" => Some(Self::Green),
            "LED_B" => Some(Self::Blue),
            _ => None,
        }
    }

    pub fn pin(self) -> u8 {
        match self {
            Self::Red => pins::LED_R_PIN,
            Self::Green => pins::LED_G_PIN,
            Self::Blue => pins::LED_B_PIN,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Clamp an intensity to 0–100; NaN counts as off.
pub fn clamp_intensity(intensity: f64) -> f64 {
    if intensity.is_nan() { 0.0 } else { intensity.clamp(0.0, 100.0) }
}

/// Convert a 0–100 intensity to an 8-bit duty value (clamped, floored).
pub fn intensity_to_duty(intensity: f64) -> u16 {
    (clamp_intensity(intensity) * f64::from(MAX_DUTY) / 100.0).floor() as u16
}

pub struct RgbLed {
    driven: [bool; 3],
    gate_enabled: bool,
}

impl RgbLed {
    pub fn new() -> Self {
        Self {
            driven: [false; 3],
            gate_enabled: false,
        }
    }

    /// Put the group in its power-on state: channels and gate configured as
    /// outputs and driven inactive, all flags cleared.
    pub fn init(&mut self, board: &mut impl BoardPort) {
        board.set_pin_mode(pins::LED_FET_PIN, PinMode::Output);
        for ch in Channel::ALL {
            board.set_pin_mode(ch.pin(), PinMode::Output);
            board.digital_write(ch.pin(), Level::Inactive);
        }
        self.driven = [false; 3];
        self.write_gate(board, false);
    }

    /// Mark one channel driven or idle and recompute the gate.
    ///
    /// Writes exactly one pin: the gate.  Driving the channel pin itself is
    /// the caller's job.
    pub fn set_channel(&mut self, board: &mut impl BoardPort, channel: Channel, on: bool) {
        self.driven[channel.index()] = on;
        let any = self.driven.iter().any(|d| *d);
        self.write_gate(board, any);
    }

    /// Set all three channels from 0–100 intensities.
    ///
    /// All-zero is a fast path that switches everything off without going
    /// through the channel flags one by one.  Otherwise a channel counts as
    /// driven only if its duty is non-zero, so an intensity that floors to
    /// duty 0 leaves it idle.
    pub fn set_mix(&mut self, board: &mut impl BoardPort, r: f64, g: f64, b: f64) {
        let levels = [clamp_intensity(r), clamp_intensity(g), clamp_intensity(b)];
        let duties = levels.map(intensity_to_duty);
        let all_zero = levels.iter().all(|x| *x == 0.0);

        if all_zero {
            self.driven = [false; 3];
            self.write_gate(board, false);
            for ch in Channel::ALL {
                board.digital_write(ch.pin(), Level::Inactive);
            }
            return;
        }

        self.driven = duties.map(|d| d > 0);
        let any = self.driven.iter().any(|d| *d);
        self.write_gate(board, any);
        for (ch, duty) in Channel::ALL.into_iter().zip(duties) {
            board.set_pin_mode(ch.pin(), PinMode::Pwm);
            board.analog_write(ch.pin(), MAX_DUTY - duty);
            if duty == 0 {
                board.digital_write(ch.pin(), Level::Inactive);
            }
        }
        debug!("RGB mix r={} g={} b={} -> duty {:?}", r, g, b, duties);
    }

    pub fn gate_enabled(&self) -> bool {
        self.gate_enabled
    }

    pub fn is_driven(&self, channel: Channel) -> bool {
        self.driven[channel.index()]
    }

    fn write_gate(&mut self, board: &mut impl BoardPort, enabled: bool) {
        board.digital_write(pins::LED_FET_PIN, Level::from_bool(enabled));
        self.gate_enabled = enabled;
    }
}

impl Default for RgbLed {
    fn default() -> Self {
        Self::new()
    }
}
