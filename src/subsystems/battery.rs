//! # Battery subsystem
//!
//! The drone notifies its battery level, in percent, on the battery characteristic. Not all firmware expose this
//! characteristic, when it is missing [Battery::level()] stays `None`.

use async_broadcast::{broadcast, InactiveReceiver, Sender};
use futures::Stream;
use log::debug;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::atomic::{AtomicBool, AtomicU8};
use std::sync::{Arc, Mutex, PoisonError};

const MIN_NOTIFICATION_LEN: usize = 5;
const EVENT_QUEUE_LEN: usize = 8;

/// Observer called with each battery level notification
pub type BatteryHandler = Arc<dyn Fn(u8) + Send + Sync + 'static>;

/// Decode a battery notification, the level is carried by the last byte
pub fn decode(data: &[u8]) -> Option<u8> {
    if data.len() < MIN_NOTIFICATION_LEN {
        return None;
    }
    data.last().copied()
}

pub(crate) struct BatteryDecoder {
    known: AtomicBool,
    level: AtomicU8,
    handler: Mutex<Option<BatteryHandler>>,
    levels: Sender<u8>,
    levels_receiver: InactiveReceiver<u8>,
}

impl BatteryDecoder {
    fn new() -> Self {
        let (mut levels, levels_receiver) = broadcast(EVENT_QUEUE_LEN);
        levels.set_overflow(true);

        Self {
            known: AtomicBool::new(false),
            level: AtomicU8::new(0),
            handler: Mutex::new(None),
            levels,
            levels_receiver: levels_receiver.deactivate(),
        }
    }

    pub(crate) fn process(&self, data: &[u8]) {
        let level = match decode(data) {
            Some(level) => level,
            None => return,
        };

        self.level.store(level, Relaxed);
        self.known.store(true, Relaxed);
        debug!("Battery {}%", level);

        let handler = self.handler.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(handler) = handler {
            handler(level);
        }

        let _ = self.levels.try_broadcast(level);
    }
}

/// # Access to the battery subsystem
///
/// See the [battery module documentation](crate::subsystems::battery) for more context and information.
pub struct Battery {
    decoder: Arc<BatteryDecoder>,
}

impl Battery {
    pub(crate) fn new() -> Self {
        Self {
            decoder: Arc::new(BatteryDecoder::new()),
        }
    }

    pub(crate) fn decoder(&self) -> Arc<BatteryDecoder> {
        self.decoder.clone()
    }

    /// Last battery level in percent, `None` until the drone reported it
    pub fn level(&self) -> Option<u8> {
        if self.decoder.known.load(Relaxed) {
            Some(self.decoder.level.load(Relaxed))
        } else {
            None
        }
    }

    /// Register the observer called for each battery notification, replacing the previous one
    pub fn on_level(&self, handler: impl Fn(u8) + Send + Sync + 'static) {
        *self.decoder.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    /// Stream of the battery levels received from now on
    pub fn level_stream(&self) -> impl Stream<Item = u8> {
        self.decoder.levels_receiver.activate_cloned()
    }
}
