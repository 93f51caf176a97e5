//! Logical port → physical pin assignments for the controller board.
//!
//! Single source of truth: every handler resolves ports through this
//! module rather than hard-coding pin numbers.  The table is immutable for
//! the lifetime of the process.
//!
//! ```text
//!  Actuator group   V0–V5 (single pins), M0/M1 (drive + direction pairs)
//!  Sensor group     K0–K3 (single pins)
//!  RGB group        LED_R / LED_G / LED_B  (+ gate pin, not addressable)
//!  Accelerometer    ACC0 / ACC1            (reserved, no physical pin)
//! ```

// ---------------------------------------------------------------------------
// Pin specification
// ---------------------------------------------------------------------------

/// What a logical port maps to on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinSpec {
    /// One physical pin.
    Single(u8),
    /// Dual-pin actuator: `analog` carries the variable-output drive,
    /// `digital` the direction / enable line.
    Pair { analog: u8, digital: u8 },
    /// Port exists on the action surface but is not wired to a pin.
    Reserved,
}

impl PinSpec {
    /// The pin of a single-pin port.
    pub fn single(self) -> Option<u8> {
        match self {
            Self::Single(pin) => Some(pin),
            _ => None,
        }
    }

    /// Every physical pin behind the port (none for reserved ports).
    pub fn pins(self) -> heapless::Vec<u8, 2> {
        let mut out = heapless::Vec::new();
        match self {
            Self::Single(pin) => {
                let _ = out.push(pin);
            }
            Self::Pair { analog, digital } => {
                let _ = out.push(analog);
                let _ = out.push(digital);
            }
            Self::Reserved => {}
        }
        out
    }

    /// Pin to use for a sensor read of the given kind.  Pair ports report
    /// analog values on their analog pin and digital values on the other.
    pub fn read_pin(self, analog: bool) -> Option<u8> {
        match self {
            Self::Single(pin) => Some(pin),
            Self::Pair { analog: a, digital: d } => Some(if analog { a } else { d }),
            Self::Reserved => None,
        }
    }
}

/// Port group: decides the default category used by bulk configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortGroup {
    /// Defaults to `output`.
    Actuator,
    /// Defaults to `input`.
    Sensor,
    /// Three-channel LED behind the shared FET gate.
    Rgb,
    /// Reserved multi-axis accelerometer ports.
    Accelerometer,
}

/// One row of the port table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortEntry {
    pub name: &'static str,
    pub spec: PinSpec,
    pub group: PortGroup,
}

const fn port(name: &'static str, spec: PinSpec, group: PortGroup) -> PortEntry {
    PortEntry { name, spec, group }
}

// ---------------------------------------------------------------------------
// RGB LED group
// ---------------------------------------------------------------------------

pub const LED_R_PIN: u8 = 44;
pub const LED_G_PIN: u8 = 45;
pub const LED_B_PIN: u8 = 46;
/// Shared FET gate for the three LED channels.  Deliberately absent from
/// [`PORT_TABLE`]: only the LED driver may write it.
pub const LED_FET_PIN: u8 = 47;

// ---------------------------------------------------------------------------
// Accelerometer
// ---------------------------------------------------------------------------

/// The only ports an accelerometer read is issued for.
pub const ACCELEROMETER_PORTS: [&str; 2] = ["ACC0", "ACC1"];

// ---------------------------------------------------------------------------
// Port table
// ---------------------------------------------------------------------------

pub const PORT_TABLE: &[PortEntry] = &[
    // ── Actuator group ───────────────────────────────────────
    port("V0", PinSpec::Single(2), PortGroup::Actuator),
    port("V1", PinSpec::Single(3), PortGroup::Actuator),
    port("V2", PinSpec::Single(4), PortGroup::Actuator),
    port("V3", PinSpec::Single(5), PortGroup::Actuator),
    port("V4", PinSpec::Single(6), PortGroup::Actuator),
    port("V5", PinSpec::Single(7), PortGroup::Actuator),
    port("M0", PinSpec::Pair { analog: 10, digital: 12 }, PortGroup::Actuator),
    port("M1", PinSpec::Pair { analog: 11, digital: 13 }, PortGroup::Actuator),
    // ── Sensor group ─────────────────────────────────────────
    port("K0", PinSpec::Single(14), PortGroup::Sensor),
    port("K1", PinSpec::Single(15), PortGroup::Sensor),
    port("K2", PinSpec::Single(16), PortGroup::Sensor),
    port("K3", PinSpec::Single(17), PortGroup::Sensor),
    // ── RGB LED group ────────────────────────────────────────
    port("LED_R", PinSpec::Single(LED_R_PIN), PortGroup::Rgb),
    port("LED_G", PinSpec::Single(LED_G_PIN), PortGroup::Rgb),
    port("LED_B", PinSpec::Single(LED_B_PIN), PortGroup::Rgb),
    // ── Accelerometer (reserved) ─────────────────────────────
    port("ACC0", PinSpec::Reserved, PortGroup::Accelerometer),
    port("ACC1", PinSpec::Reserved, PortGroup::Accelerometer),
];

/// Look up the table row for a port name.
pub fn entry(name: &str) -> Option<&'static PortEntry> {
    PORT_TABLE.iter().find(|e| e.name == name)
}

/// Resolve a port name to its pin specification.
pub fn resolve(name: &str) -> Option<PinSpec> {
    entry(name).map(|e| e.spec)
}

/// All ports belonging to `group`, in table order.
pub fn ports_in(group: PortGroup) -> impl Iterator<Item = &'static PortEntry> {
    PORT_TABLE.iter().filter(move |e| e.group == group)
}
