//! # Minidrone subsystems
//!
//! The Minidrone protocol groups commands and notifications by project and class. The lib exposes them as a few
//! independent subsystems, each having one logical role.
//!
//! Modules here implement the Rust API for the different subsystems, they are the main way to communicate and
//! interact with the Minidrone.

pub mod battery;
pub mod commander;
pub mod flight_status;
pub mod piloting;
