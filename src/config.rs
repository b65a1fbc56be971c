//! Session configuration
//!
//! The defaults match the timings the Minidrone firmware has been flown with. They only need changing for
//! tests or unusual transports.

use crate::{Error, Result};
use std::time::Duration;

/// Date string sent in the settings frame during the handshake
pub const DEFAULT_DATE: &str = "2014-10-28";

/// Timings and handshake parameters of a [Minidrone](crate::Minidrone) session
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Period of the piloting command (PCMD) loop
    pub pcmd_interval: Duration,
    /// Delay between spawning the PCMD loop and its first frame, lets the transport start delivering notifications
    pub pcmd_start_delay: Duration,
    /// Wait after the stop signal in [Minidrone::halt()](crate::Minidrone::halt)
    pub halt_settle_delay: Duration,
    /// Date sent in the settings frame
    pub date: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pcmd_interval: Duration::from_millis(50),
            pcmd_start_delay: Duration::from_millis(500),
            halt_settle_delay: Duration::from_millis(500),
            date: DEFAULT_DATE.to_owned(),
        }
    }
}

impl Config {
    /// Check that a session can run with this configuration
    ///
    /// Returns [Error::InvalidParameter] for a zero PCMD period.
    pub fn validate(&self) -> Result<()> {
        if self.pcmd_interval.is_zero() {
            return Err(Error::InvalidParameter("PCMD interval must be non-zero".to_owned()));
        }
        Ok(())
    }

    /// Set the PCMD loop period
    pub fn with_pcmd_interval(mut self, interval: Duration) -> Self {
        self.pcmd_interval = interval;
        self
    }

    /// Set the delay before the first PCMD frame
    pub fn with_pcmd_start_delay(mut self, delay: Duration) -> Self {
        self.pcmd_start_delay = delay;
        self
    }

    /// Set the settle delay of [Minidrone::halt()](crate::Minidrone::halt)
    pub fn with_halt_settle_delay(mut self, delay: Duration) -> Self {
        self.halt_settle_delay = delay;
        self
    }

    /// Set the date string of the settings frame
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }
}
