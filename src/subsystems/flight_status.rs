//! # Flight status subsystem
//!
//! The drone reports its piloting state asynchronously on the flight status characteristic. This subsystem decodes
//! these notifications and keeps the authoritative "is flying" state of the session.
//!
//! The state can be polled or followed either with a synchronous observer, called from the transport notification
//! context, or with an async stream:
//! ``` no_run
//! # use futures::StreamExt;
//! # async fn watch(drone: &minidrone_lib::Minidrone) {
//! let mut events = Box::pin(drone.flight_status.event_stream());
//! while let Some(event) = events.next().await {
//!     println!("{:?}, flying: {}", event, drone.flight_status.is_flying());
//! }
//! # }
//! ```

use crate::{Error, Result};
use async_broadcast::{broadcast, InactiveReceiver, Sender};
use futures::Stream;
use log::{debug, warn};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::atomic::AtomicU8;
use std::sync::{Arc, Mutex, PoisonError};

// Shorter notifications are link synchronisation frames
const MIN_NOTIFICATION_LEN: usize = 5;
const CATEGORY_INDEX: usize = 4;
const FLYING_STATE_INDEX: usize = 6;

const EVENT_QUEUE_LEN: usize = 32;

// The flying flag shares the status byte with the last flying state
const FLYING_BIT: u8 = 0x80;

/// Piloting state notification category, byte 4 of the notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PilotingStateCategory {
    /// Flat trim has been applied
    FlatTrimChanged = 0,
    /// The flying state changed
    FlyingStateChanged = 1,
}

/// Flying state as reported by the drone
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FlyingState {
    /// On the ground
    Landed = 0,
    /// Taking off
    TakingOff = 1,
    /// In the air, not moving
    Hovering = 2,
    /// In the air, moving
    Flying = 3,
    /// Landing
    Landing = 4,
    /// Motors cut
    Emergency = 5,
    /// Rolling on the ground
    Rolling = 6,
}

impl FlyingState {
    /// Name of the state, as used in event names
    pub fn name(&self) -> &'static str {
        match self {
            FlyingState::Landed => "landed",
            FlyingState::TakingOff => "takeoff",
            FlyingState::Hovering => "hovering",
            FlyingState::Flying => "flying",
            FlyingState::Landing => "landing",
            FlyingState::Emergency => "emergency",
            FlyingState::Rolling => "rolling",
        }
    }
}

impl fmt::Display for FlyingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded flight status notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PilotingEvent {
    /// Flat trim has been applied
    FlatTrimChanged,
    /// The drone changed flying state
    FlyingStateChanged(FlyingState),
    /// The drone reported a flying state this lib does not know, the state is left untouched
    UnknownFlyingState(u8),
}

impl PilotingEvent {
    /// Category of the event
    pub fn category(&self) -> PilotingStateCategory {
        match self {
            PilotingEvent::FlatTrimChanged => PilotingStateCategory::FlatTrimChanged,
            PilotingEvent::FlyingStateChanged(_) | PilotingEvent::UnknownFlyingState(_) => {
                PilotingStateCategory::FlyingStateChanged
            }
        }
    }

    /// Raw `(category, sub-state)` pair, the sub-state is 0 for flat trim events
    pub fn codes(&self) -> (u8, u8) {
        match self {
            PilotingEvent::FlatTrimChanged => (self.category().into(), 0),
            PilotingEvent::FlyingStateChanged(state) => (self.category().into(), (*state).into()),
            PilotingEvent::UnknownFlyingState(raw) => (self.category().into(), *raw),
        }
    }
}

/// Decode a flight status notification
///
/// Returns `Ok(None)` for notifications that carry no piloting state: synchronisation frames shorter than 5 bytes
/// and unknown categories. A flying state notification too short to carry the state is an [Error::InvalidFrame].
pub fn decode(data: &[u8]) -> Result<Option<PilotingEvent>> {
    if data.len() < MIN_NOTIFICATION_LEN {
        return Ok(None);
    }

    match PilotingStateCategory::try_from(data[CATEGORY_INDEX]) {
        Ok(PilotingStateCategory::FlatTrimChanged) => Ok(Some(PilotingEvent::FlatTrimChanged)),
        Ok(PilotingStateCategory::FlyingStateChanged) => {
            let raw = *data.get(FLYING_STATE_INDEX).ok_or_else(|| {
                Error::InvalidFrame(format!("flying state notification too short: {:?}", data))
            })?;
            match FlyingState::try_from(raw) {
                Ok(state) => Ok(Some(PilotingEvent::FlyingStateChanged(state))),
                Err(_) => Ok(Some(PilotingEvent::UnknownFlyingState(raw))),
            }
        }
        Err(_) => Ok(None),
    }
}

/// Observer called with each decoded flight status event
pub type PilotingStateHandler = Arc<dyn Fn(PilotingEvent) + Send + Sync + 'static>;

fn next_status(status: u8, state: FlyingState) -> u8 {
    let flying = match state {
        FlyingState::Landed => 0,
        FlyingState::Hovering | FlyingState::Flying => FLYING_BIT,
        _ => status & FLYING_BIT,
    };
    u8::from(state) | flying
}

pub(crate) struct FlightStatusDecoder {
    // Last FlyingState in the low bits, FLYING_BIT set while flying
    status: AtomicU8,
    handler: Mutex<Option<PilotingStateHandler>>,
    events: Sender<PilotingEvent>,
    events_receiver: InactiveReceiver<PilotingEvent>,
}

impl FlightStatusDecoder {
    fn new() -> Self {
        let (mut events, events_receiver) = broadcast(EVENT_QUEUE_LEN);
        events.set_overflow(true);

        Self {
            status: AtomicU8::new(FlyingState::Landed.into()),
            handler: Mutex::new(None),
            events,
            events_receiver: events_receiver.deactivate(),
        }
    }

    /// Entry point for the transport notifications
    pub(crate) fn process(&self, data: &[u8]) {
        let event = match decode(data) {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(e) => {
                warn!("Ignoring flight status notification: {}", e);
                return;
            }
        };

        match event {
            PilotingEvent::FlatTrimChanged => debug!("Flat trim changed"),
            PilotingEvent::FlyingStateChanged(state) => {
                let _ = self
                    .status
                    .fetch_update(Relaxed, Relaxed, |status| Some(next_status(status, state)));
                debug!("Flying state {}", state);
            }
            PilotingEvent::UnknownFlyingState(raw) => warn!("Unknown flying state {}", raw),
        }

        // Called without holding the handler lock so that it can register another handler
        let handler = self.handler.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(handler) = handler {
            handler(event);
        }

        // Nobody listening is not an error
        let _ = self.events.try_broadcast(event);
    }
}

/// # Access to the flight status subsystem
///
/// See the [flight_status module documentation](crate::subsystems::flight_status) for more context and information.
pub struct FlightStatus {
    decoder: Arc<FlightStatusDecoder>,
}

impl FlightStatus {
    pub(crate) fn new() -> Self {
        Self {
            decoder: Arc::new(FlightStatusDecoder::new()),
        }
    }

    pub(crate) fn decoder(&self) -> Arc<FlightStatusDecoder> {
        self.decoder.clone()
    }

    /// True once the drone reported hovering or flying, false again once it reported landed
    pub fn is_flying(&self) -> bool {
        self.status().1
    }

    /// Last flying state reported by the drone, [FlyingState::Landed] until the first report
    pub fn flying_state(&self) -> FlyingState {
        self.status().0
    }

    /// Last flying state and flying flag, read together
    pub fn status(&self) -> (FlyingState, bool) {
        let status = self.decoder.status.load(Relaxed);
        let state = FlyingState::try_from(status & !FLYING_BIT).unwrap_or(FlyingState::Landed);
        (state, status & FLYING_BIT != 0)
    }

    /// Register the observer called for each flight status event, replacing the previous one
    ///
    /// The observer runs in the transport notification context and must return quickly.
    pub fn on_piloting_state(&self, handler: impl Fn(PilotingEvent) + Send + Sync + 'static) {
        *self.decoder.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    /// Remove the registered observer
    pub fn clear_piloting_state_handler(&self) {
        *self.decoder.handler.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Stream of the flight status events received from now on
    ///
    /// Slow readers lose the oldest events.
    pub fn event_stream(&self) -> impl Stream<Item = PilotingEvent> {
        self.decoder.events_receiver.activate_cloned()
    }
}
