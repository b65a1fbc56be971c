//! # Piloting subsystem
//!
//! The Minidrone only keeps moving as long as it receives piloting commands (PCMD). Once the session is started a
//! background task sends the current [MotionVector] every [Config::pcmd_interval](crate::Config::pcmd_interval),
//! the movement functions of this subsystem only change the vector that is sent.
//!
//! Timed moves are built on top of that by the caller:
//! ``` no_run
//! # use tokio::time::{sleep, Duration};
//! # async fn square(drone: &minidrone_lib::Minidrone) -> minidrone_lib::Result<()> {
//! for _ in 0..4 {
//!     drone.piloting.forward(30)?;
//!     sleep(Duration::from_secs(1)).await;
//!     drone.piloting.hover()?;
//!     drone.piloting.clockwise(50)?;
//!     sleep(Duration::from_millis(900)).await;
//!     drone.piloting.hover()?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::frame::{encode_pcmd, SequenceCounter};
use crate::transport::Link;
use crate::{Error, Result};
use futures::lock::Mutex as AsyncMutex;
use log::{debug, warn};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::sync::atomic::Ordering::Relaxed;
use std::sync::atomic::{AtomicBool, AtomicU8};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

/// Largest magnitude accepted on an axis
pub const MAX_SPEED: i32 = 100;

/// Desired instantaneous motion of the drone
///
/// Axes are percentages in `-100..=100`. Positive values go right (`roll`), forward (`pitch`), clockwise (`yaw`)
/// and up (`throttle`). `flag` tells the drone to use roll and pitch, when it is false the drone holds its position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionVector {
    /// Roll and pitch are taken into account
    pub flag: bool,
    /// Right/left
    pub roll: i8,
    /// Forward/backward
    pub pitch: i8,
    /// Clockwise/counter-clockwise rotation
    pub yaw: i8,
    /// Up/down, called gaz by Parrot
    pub throttle: i8,
    /// Heading, called psi by Parrot
    pub heading: f32,
}

impl MotionVector {
    /// Check that the vector can be sent to the drone
    pub fn validate(&self) -> Result<()> {
        let axes = [
            ("roll", self.roll),
            ("pitch", self.pitch),
            ("yaw", self.yaw),
            ("throttle", self.throttle),
        ];
        for (name, value) in axes.iter() {
            if i32::from(*value).abs() > MAX_SPEED {
                return Err(Error::InvalidParameter(format!(
                    "{} {} out of -{}..={}",
                    name, value, MAX_SPEED, MAX_SPEED
                )));
            }
        }
        if !self.heading.is_finite() {
            return Err(Error::InvalidParameter(format!("heading {} is not finite", self.heading)));
        }
        Ok(())
    }
}

/// State of the PCMD loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum LoopState {
    /// Not started yet
    Idle,
    /// Sending piloting commands
    Running,
    /// Stop signal observed, finishing the last tick
    Stopping,
    /// Task exited
    Stopped,
}

/// Map a speed to an axis magnitude, out of range speeds are clamped to `0..=100`
fn magnitude(speed: i32) -> i8 {
    speed.clamp(0, MAX_SPEED) as i8
}

fn lock(vector: &Mutex<MotionVector>) -> MutexGuard<'_, MotionVector> {
    vector.lock().unwrap_or_else(PoisonError::into_inner)
}

/// # Access to the piloting subsystem
///
/// See the [piloting module documentation](crate::subsystems::piloting) for more context and information.
pub struct Piloting {
    link: Arc<Link>,
    vector: Arc<Mutex<MotionVector>>,
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    task: AsyncMutex<Option<JoinHandle<()>>>,
    interval: Duration,
    start_delay: Duration,
}

impl Piloting {
    pub(crate) fn new(link: Arc<Link>, interval: Duration, start_delay: Duration) -> Self {
        Self {
            link,
            vector: Default::default(),
            stop: Arc::new(AtomicBool::new(false)),
            state: Arc::new(AtomicU8::new(LoopState::Idle.into())),
            task: AsyncMutex::new(None),
            interval,
            start_delay,
        }
    }

    /// Spawn the PCMD loop. Only the first call has an effect.
    pub(crate) async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() || self.stop.load(Relaxed) {
            return;
        }

        let link = self.link.clone();
        let vector = self.vector.clone();
        let stop = self.stop.clone();
        let state = self.state.clone();
        let period = self.interval;
        let start_delay = self.start_delay;

        *task = Some(tokio::spawn(async move {
            // Leave some time for the drone to start acknowledging frames
            sleep(start_delay).await;

            let mut sequence = SequenceCounter::default();
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            state.store(LoopState::Running.into(), Relaxed);
            debug!("PCMD loop running every {:?}", period);

            loop {
                ticker.tick().await;
                if stop.load(Relaxed) {
                    break;
                }

                // The lock covers the whole encoding, a frame never carries half of an update
                let frame = encode_pcmd(sequence.next(), &lock(&vector));

                match link.send_pcmd(&frame).await {
                    Ok(()) => (),
                    Err(Error::TransportUnavailable) => break,
                    Err(e) => warn!("PCMD write error: {}", e),
                }
            }

            state.store(LoopState::Stopping.into(), Relaxed);
            debug!("PCMD loop stopped after {} frames", sequence.value());
            state.store(LoopState::Stopped.into(), Relaxed);
        }));
    }

    /// Ask the PCMD loop to stop at its next tick. Can be called any number of times.
    pub(crate) fn signal_stop(&self) {
        self.stop.store(true, Relaxed);
    }

    pub(crate) fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Wait for the PCMD loop task to exit
    pub(crate) async fn join(&self) -> Result<()> {
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            task.await?;
        }
        Ok(())
    }

    /// Current state of the PCMD loop
    pub fn loop_state(&self) -> LoopState {
        LoopState::try_from(self.state.load(Relaxed)).unwrap_or(LoopState::Stopped)
    }

    /// Snapshot of the vector currently sent to the drone
    pub fn vector(&self) -> MotionVector {
        *lock(&self.vector)
    }

    /// Replace the whole motion vector
    ///
    /// Returns [Error::InvalidParameter] if an axis is out of `-100..=100` or if the heading is not finite.
    pub fn set_vector(&self, vector: MotionVector) -> Result<()> {
        vector.validate()?;
        self.update(|current| *current = vector)
    }

    fn update(&self, change: impl FnOnce(&mut MotionVector)) -> Result<()> {
        self.link.check_available()?;
        let mut vector = lock(&self.vector);
        change(&mut *vector);
        Ok(())
    }

    /// Stop moving in any direction and hold position
    ///
    /// This is the only function resetting all the axes at once.
    pub fn hover(&self) -> Result<()> {
        self.update(|vector| *vector = MotionVector::default())
    }
}

/// # Directional movements
///
/// Each function sets one axis, keeping the other axes as they were. The speed is a percentage, values out of
/// `0..=100` are clamped.
impl Piloting {
    /// Ascend
    pub fn up(&self, speed: i32) -> Result<()> {
        self.update(|vector| {
            vector.flag = true;
            vector.throttle = magnitude(speed);
        })
    }

    /// Descend
    pub fn down(&self, speed: i32) -> Result<()> {
        self.update(|vector| {
            vector.flag = true;
            vector.throttle = -magnitude(speed);
        })
    }

    /// Move forward
    pub fn forward(&self, speed: i32) -> Result<()> {
        self.update(|vector| {
            vector.flag = true;
            vector.pitch = magnitude(speed);
        })
    }

    /// Move backward
    pub fn backward(&self, speed: i32) -> Result<()> {
        self.update(|vector| {
            vector.flag = true;
            vector.pitch = -magnitude(speed);
        })
    }

    /// Move to the right
    pub fn right(&self, speed: i32) -> Result<()> {
        self.update(|vector| {
            vector.flag = true;
            vector.roll = magnitude(speed);
        })
    }

    /// Move to the left
    pub fn left(&self, speed: i32) -> Result<()> {
        self.update(|vector| {
            vector.flag = true;
            vector.roll = -magnitude(speed);
        })
    }

    /// Rotate clockwise
    pub fn clockwise(&self, speed: i32) -> Result<()> {
        self.update(|vector| {
            vector.flag = true;
            vector.yaw = magnitude(speed);
        })
    }

    /// Rotate counter-clockwise
    pub fn counter_clockwise(&self, speed: i32) -> Result<()> {
        self.update(|vector| {
            vector.flag = true;
            vector.yaw = -magnitude(speed);
        })
    }
}

/// Map a joystick axis to a speed usable with the directional functions
///
/// `value` is the raw axis reading and `offset` its full scale. The result is `|value| / offset` as a whole
/// percentage, with a 10% dead zone and saturated at 100.
pub fn validate_pitch(value: f64, offset: f64) -> i32 {
    let ratio = value.abs() / offset;
    if ratio >= 0.1 {
        if ratio <= 1.0 {
            return (ratio * 100.0) as i32;
        }
        return MAX_SPEED;
    }
    0
}
