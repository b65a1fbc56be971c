//! # Discrete command subsystem
//!
//! One-shot commands sent on the command channel: take-off, landing, emergency, flat trim, flips and the USB
//! accessories (light, claw, gun) that can be plugged under the Mambo.
//!
//! Each function writes a single frame and returns once the transport accepted it. The drone reports the effect of
//! take-off and landing asynchronously, see the [flight_status](crate::subsystems::flight_status) subsystem.
//! ``` no_run
//! # use tokio::time::{sleep, Duration};
//! # async fn hop(drone: &minidrone_lib::Minidrone) -> minidrone_lib::Result<()> {
//! drone.commander.take_off().await?;
//! sleep(Duration::from_secs(3)).await;
//! drone.commander.front_flip().await?;
//! sleep(Duration::from_secs(2)).await;
//! drone.commander.land().await?;
//! # Ok(())
//! # }
//! ```

use crate::frame::{
    encode_animation, encode_claw_control, encode_current_date, encode_gun_control, encode_light_control,
    encode_piloting, Animation, ClawMode, LightMode, PilotingCommand,
};
use crate::transport::Link;
use crate::Result;
use std::sync::Arc;

/// # Access to the discrete command subsystem
///
/// See the [commander module documentation](crate::subsystems::commander) for more context and information.
pub struct Commander {
    link: Arc<Link>,
}

impl Commander {
    pub(crate) fn new(link: Arc<Link>) -> Self {
        Self { link }
    }

    async fn piloting(&self, command: PilotingCommand) -> Result<()> {
        self.link.send_command(|sequence| encode_piloting(sequence, command)).await
    }

    /// Take off. The drone then hovers at about one meter.
    pub async fn take_off(&self) -> Result<()> {
        self.piloting(PilotingCommand::TakeOff).await
    }

    /// Land
    pub async fn land(&self) -> Result<()> {
        self.piloting(PilotingCommand::Landing).await
    }

    /// Cut the motors immediately, the drone falls
    pub async fn emergency(&self) -> Result<()> {
        self.piloting(PilotingCommand::Emergency).await
    }

    /// Use the current orientation as level. The drone must be on a flat surface.
    pub async fn flat_trim(&self) -> Result<()> {
        self.piloting(PilotingCommand::FlatTrim).await
    }

    /// Send the date setting
    pub(crate) async fn current_date(&self, date: &str) -> Result<()> {
        self.link.send_command(|sequence| encode_current_date(sequence, date)).await
    }
}

/// # Animations
impl Commander {
    /// Flip in the given direction
    pub async fn flip(&self, animation: Animation) -> Result<()> {
        self.link.send_command(|sequence| encode_animation(sequence, animation)).await
    }

    /// Flip forward
    pub async fn front_flip(&self) -> Result<()> {
        self.flip(Animation::Front).await
    }

    /// Flip backward
    pub async fn back_flip(&self) -> Result<()> {
        self.flip(Animation::Back).await
    }

    /// Flip to the right
    pub async fn right_flip(&self) -> Result<()> {
        self.flip(Animation::Right).await
    }

    /// Flip to the left
    pub async fn left_flip(&self) -> Result<()> {
        self.flip(Animation::Left).await
    }
}

/// # USB accessories
///
/// `id` is the accessory id reported by the drone, 0 for the first accessory.
impl Commander {
    /// Control the light accessory, `intensity` is in percent
    pub async fn light_control(&self, id: u8, mode: LightMode, intensity: u8) -> Result<()> {
        self.link
            .send_command(|sequence| encode_light_control(sequence, id, mode, intensity))
            .await
    }

    /// Open or close the claw accessory
    pub async fn claw_control(&self, id: u8, mode: ClawMode) -> Result<()> {
        self.link.send_command(|sequence| encode_claw_control(sequence, id, mode)).await
    }

    /// Fire the gun accessory
    pub async fn gun_control(&self, id: u8) -> Result<()> {
        self.link.send_command(|sequence| encode_gun_control(sequence, id)).await
    }
}
