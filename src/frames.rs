//! Vendor command frames.
//!
//! Sent through [`BoardPort::send_frame`](crate::app::ports::BoardPort::send_frame)
//! as opaque byte sequences.  Data bytes are 7-bit clean so the frames can
//! ride a MIDI-style transport unchanged.
//!
//! ```text
//! Buzzer:        ┌──────┬──────┬─────┬────────┬──────────┬──────────┬──────┐
//!                │ 0xF0 │ 0x0B │ pin │ enable │ freq lo7 │ freq hi7 │ 0xF7 │
//!                └──────┴──────┴─────┴────────┴──────────┴──────────┴──────┘
//! Accelerometer: ┌──────┬──────┬──────┬──────┬──────┐
//!                │ 0xF0 │ 0x0C │ 0x01 │ axis │ 0xF7 │
//!                └──────┴──────┴──────┴──────┴──────┘
//! ```

/// First byte of every vendor frame.
pub const FRAME_START: u8 = 0xF0;
/// Last byte of every vendor frame.
pub const FRAME_END: u8 = 0xF7;

/// Buzzer on/off command id.
pub const CMD_BUZZER: u8 = 0x0B;
/// Accelerometer command id; replies carry the same id.
pub const CMD_ACCELEROMETER: u8 = 0x0C;
/// Accelerometer sub-command: read one axis.
pub const ACCEL_READ_AXIS: u8 = 0x01;

/// Largest frequency representable in two 7-bit bytes.
pub const MAX_FREQUENCY_HZ: u16 = 0x3FFF;

pub type BuzzerFrame = [u8; 7];
pub type AccelerometerFrame = [u8; 5];

/// Accelerometer axis selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// `"x"` and `"y"` select their axis; anything else selects Z.
    pub fn from_selector(selector: &str) -> Self {
        match selector {
            "x" | "X" => Self::X,
            "y" | "Y" => Self::Y,
            _ => Self::Z,
        }
    }

    /// Byte sent on the wire.
    pub fn selector(self) -> u8 {
        match self {
            Self::X => 1,
            Self::Y => 2,
            Self::Z => 3,
        }
    }
}

/// Build the buzzer frame.  Frequencies above [`MAX_FREQUENCY_HZ`] are
/// clamped.
pub fn buzzer_frame(pin: u8, on: bool, frequency_hz: u16) -> BuzzerFrame {
    let f = frequency_hz.min(MAX_FREQUENCY_HZ);
    [
        FRAME_START,
        CMD_BUZZER,
        pin & 0x7F,
        u8::from(on),
        (f & 0x7F) as u8,
        ((f >> 7) & 0x7F) as u8,
        FRAME_END,
    ]
}

/// Build the accelerometer axis-read frame.
pub fn accelerometer_frame(axis: Axis) -> AccelerometerFrame {
    [
        FRAME_START,
        CMD_ACCELEROMETER,
        ACCEL_READ_AXIS,
        axis.selector(),
        FRAME_END,
    ]
}

/// Extract the axis from an accelerometer frame, if `frame` is one.
pub fn parse_accelerometer_frame(frame: &[u8]) -> Option<Axis> {
    match frame {
        [FRAME_START, CMD_ACCELEROMETER, ACCEL_READ_AXIS, axis, FRAME_END] => match axis {
            1 => Some(Axis::X),
            2 => Some(Axis::Y),
            3 => Some(Axis::Z),
            _ => None,
        },
        _ => None,
    }
}
