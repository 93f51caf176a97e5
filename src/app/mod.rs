//! Application core: action dispatch and session orchestration, zero I/O.
//!
//! All interaction with the board happens through the **port traits**
//! defined in [`ports`], keeping this layer fully testable without real
//! hardware.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
