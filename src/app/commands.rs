//! Inbound action requests.
//!
//! A request is a JSON object keyed by `name`, carrying per-action fields
//! and an optional `phase` argument (used only by synchronized servo
//! motion):
//!
//! ```json
//! {"name": "motor-power", "port": "M0", "power": 75}
//! {"name": "servo-sync", "phase": {"speed": 12}}
//! ```
//!
//! Parsing is two-step: the name is checked against [`ACTION_NAMES`] first
//! so an unknown action is reported as such, then the fields are decoded
//! into the closed [`Action`] enum.  Field decoding failures are reported
//! separately as [`RequestError::Malformed`].

use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::drivers::dc_motor::{Direction, MotorMode};

/// Every action name the dispatcher understands.
pub const ACTION_NAMES: &[&str] = &[
    "init-board",
    "configure-ports",
    "digital-write",
    "led",
    "multi-led",
    "buzzer",
    "motor-power",
    "motor-mode",
    "motor-direction",
    "servo-degree",
    "servo-sync",
    "digital-read",
    "analog-read",
    "read-button",
    "read-touch",
    "read-ir",
    "read-light",
    "read-sound",
    "accelerometer-read",
];

/// Commands that the front end can send into the controller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum Action {
    /// Reset actuator state and configure every port with its group default.
    InitBoard,
    /// Bulk port configuration from a port → category map.
    ConfigurePorts {
        #[serde(rename = "port-settings", default)]
        port_settings: BTreeMap<String, String>,
    },
    DigitalWrite {
        port: String,
        #[serde(deserialize_with = "flag")]
        value: bool,
    },
    /// LED on/off; RGB channel ports go through the gate coupling.
    Led {
        port: String,
        #[serde(deserialize_with = "flag")]
        on: bool,
    },
    /// Set all three RGB channels from 0–100 intensities.
    MultiLed { r: f64, g: f64, b: f64 },
    Buzzer {
        port: String,
        #[serde(deserialize_with = "flag")]
        on: bool,
        #[serde(default)]
        frequency: f64,
    },
    MotorPower { port: String, power: f64 },
    MotorMode { port: String, mode: MotorMode },
    MotorDirection { port: String, direction: Direction },
    ServoDegree { port: String, degree: f64 },
    /// Begin (no phase) or execute (phase with speed) synchronized motion.
    ServoSync,
    DigitalRead { port: String },
    AnalogRead { port: String },
    ReadButton { port: String },
    ReadTouch { port: String },
    ReadIr { port: String },
    ReadLight { port: String },
    ReadSound { port: String },
    AccelerometerRead {
        port: String,
        #[serde(default)]
        axis: String,
    },
}

/// Phase argument of a multi-phase action.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PhaseArg {
    pub speed: f64,
}

/// A decoded request.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub action: Action,
    pub phase: Option<PhaseArg>,
}

impl ActionRequest {
    pub fn new(action: Action) -> Self {
        Self { action, phase: None }
    }

    pub fn with_phase(action: Action, speed: f64) -> Self {
        Self {
            action,
            phase: Some(PhaseArg { speed }),
        }
    }

    /// Decode a JSON request object.
    pub fn from_json(value: &Value) -> Result<Self, RequestError> {
        let name = value.get("name").and_then(Value::as_str).unwrap_or("");
        if !ACTION_NAMES.contains(&name) {
            return Err(RequestError::UnknownAction(name.to_owned()));
        }

        let action = Action::deserialize(value).map_err(|e| RequestError::Malformed(e.to_string()))?;
        let phase = match value.get("phase") {
            None | Some(Value::Null) => None,
            Some(p) => Some(PhaseArg::deserialize(p).map_err(|e| RequestError::Malformed(e.to_string()))?),
        };
        Ok(Self { action, phase })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    UnknownAction(String),
    /// Known action with missing or mistyped fields.
    Malformed(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAction(name) => write!(f, "unknown action \"{name}\""),
            Self::Malformed(msg) => write!(f, "malformed request: {msg}"),
        }
    }
}

impl std::error::Error for RequestError {}

// ── Port categories ───────────────────────────────────────────

/// Initialization class named in a `port-settings` map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortCategory {
    /// `output`, `led`, `buzzer`
    Output,
    /// `input`, `light`, `touch`, `sound`, `ir`
    Input,
    Button,
    DcMotor,
    Servo,
    Accelerometer,
}

impl PortCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "output" | "led" | "buzzer" => Some(Self::Output),
            "input" | "light" | "touch" | "sound" | "ir" => Some(Self::Input),
            "button" => Some(Self::Button),
            "dc-motor" => Some(Self::DcMotor),
            "servo" => Some(Self::Servo),
            "accelerometer" => Some(Self::Accelerometer),
            _ => None,
        }
    }
}

/// Accept `true`/`false` or a number (non-zero is on).
fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Num(f64),
    }
    Ok(match Raw::deserialize(d)? {
        Raw::Bool(b) => b,
        Raw::Num(n) => n != 0.0,
    })
}
