//! botlink: actuator/sensor control core for a block-programmed robotics
//! controller.
//!
//! Named action requests go in, primitive board operations come out, and
//! board reports come back as one-shot completions.  Everything runs on
//! one logical thread driven by the caller's loop.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod frames;
pub mod pins;
pub mod scheduler;
pub mod sensors;
pub mod session;
