//! Stateful actuator models.

pub mod dc_motor;
pub mod rgb_led;
pub mod servo;
