//! Port traits: the hexagonal boundary between the control core and the board.
//!
//! ```text
//!   Controller ──▶ BoardPort ──▶ Adapter (serial board, simulator, mock)
//!   Controller ──▶ EventSink ──▶ Adapter (log, front end)
//! ```
//!
//! The [`Controller`](super::service::Controller) receives a `BoardPort`
//! at every call site, so the core never owns or touches a transport
//! directly and can be driven by a recording mock in tests.

use super::events::ControllerEvent;

// ───────────────────────────────────────────────────────────────
// Board primitives
// ───────────────────────────────────────────────────────────────

/// Pin configuration modes the board supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinMode {
    Output,
    Input,
    /// Input with the internal pull-up enabled (buttons).
    InputPullup,
    /// Variable-output (PWM) mode.
    Pwm,
    Servo,
}

/// Digital output level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Active,
    Inactive,
}

impl Level {
    pub fn from_bool(on: bool) -> Self {
        if on { Self::Active } else { Self::Inactive }
    }
}

/// Category of periodic pin-value reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReportCategory {
    Analog,
    Digital,
}

// ───────────────────────────────────────────────────────────────
// Board port (driven adapter: core → board)
// ───────────────────────────────────────────────────────────────

/// The board capability.  Every call is fire-and-forget; anything the
/// board sends back arrives later as a
/// [`BoardEvent`](crate::events::BoardEvent).
pub trait BoardPort {
    /// Configure the mode of a pin.
    fn set_pin_mode(&mut self, pin: u8, mode: PinMode);

    /// Drive a digital level.
    fn digital_write(&mut self, pin: u8, level: Level);

    /// Write a variable-output duty value (0–1023).
    fn analog_write(&mut self, pin: u8, value: u16);

    /// Move a servo to `degree` (0–180).
    fn servo_write(&mut self, pin: u8, degree: u8);

    /// Enable or disable periodic value reports for a pin.
    fn set_reporting(&mut self, category: ReportCategory, pin: u8, enabled: bool);

    /// Send an opaque vendor command frame.
    fn send_frame(&mut self, frame: &[u8]);

    /// Ask for the firmware version; answered by `BoardEvent::VersionReply`.
    fn query_version(&mut self);

    /// Start connecting to `transport`; answered by `LinkUp` / `LinkFailed`.
    fn open_link(&mut self, transport: &str);

    /// Drop the connection.
    fn close_link(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: core → logging / front end)
// ───────────────────────────────────────────────────────────────

/// Receives completions and session events drained from the controller.
pub trait EventSink {
    fn emit(&mut self, event: &ControllerEvent);
}
