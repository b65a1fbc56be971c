//! # Minidrone library
//!
//! This crate allows to control a Parrot Minidrone (Rolling Spider, Airborne, Mambo, Swing) over Bluetooth Low
//! Energy. The BLE stack itself is not part of the crate: the application connects to the drone with the BLE
//! library of its choice and hands the connected device to this crate through the traits of the [transport] module.
//!
//! ## Status
//!
//! The drone functionalities are implemented in subsystems. The current status is:
//!
//! | Subsystem | Support |
//! |-----------|---------|
//! | Piloting (PCMD) | Full |
//! | Take-off/Landing/Emergency/Flat trim | Full |
//! | Animations | Flips only |
//! | Flight status | Flat trim and flying state |
//! | Battery | Level |
//! | USB accessories | Light, claw and gun |
//! | Video | None |
//!
//! ## Protocol
//!
//! The Minidrone only keeps moving while it receives piloting commands. Once connected, a background task sends the
//! current motion vector every 50ms; the movement functions of [subsystems::piloting::Piloting] only change the
//! vector. Discrete commands (take-off, landing, flips) are sent immediately.
//!
//! Frames are numbered per channel, see the [frame] module for the wire format.
//!
//! ## Usage
//!
//! The basic procedure to use the lib is:
//!  - Connect to the drone with a BLE library and wrap the device in a [transport::Peripheral] implementation
//!  - Create a [Minidrone] from it, this runs the protocol handshake and starts the piloting command loop
//!  - Subsystems are available as public fields of the [Minidrone] struct
//!  - Call [Minidrone::halt()] to land and stop the loop, then [Minidrone::disconnect()]
//!  - If the device reports the connection lost the session ends by itself, [Minidrone::wait_disconnect()] waits
//!    for it
//!
//! All subsystems functions are only taking an un-mutable reference to self (`&self`), the intention is for the
//! Minidrone object to be shared between tasks using `Arc<>`.
//!
//! For example:
//! ``` no_run
//! # use std::sync::Arc;
//! # use tokio::time::{sleep, Duration};
//! # async fn fly(device: Arc<dyn minidrone_lib::transport::Peripheral>) -> minidrone_lib::Result<()> {
//! let drone = minidrone_lib::Minidrone::connect(device).await?;
//!
//! drone.commander.take_off().await?;
//! sleep(Duration::from_secs(3)).await;
//!
//! drone.piloting.up(50)?;
//! sleep(Duration::from_secs(1)).await;
//! drone.piloting.hover()?;
//!
//! println!("Flying: {}", drone.is_flying());
//!
//! drone.halt().await?;
//! drone.disconnect().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod minidrone;

pub mod frame;
pub mod subsystems;
pub mod transport;

pub use crate::config::{Config, DEFAULT_DATE};
pub use crate::error::{Error, Result};
pub use crate::minidrone::{Minidrone, SessionState};
pub use crate::subsystems::flight_status::{FlyingState, PilotingEvent};
pub use crate::subsystems::piloting::{validate_pitch, LoopState, MotionVector};
