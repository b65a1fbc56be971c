use crate::subsystems::battery::Battery;
use crate::subsystems::commander::Commander;
use crate::subsystems::flight_status::FlightStatus;
use crate::subsystems::piloting::Piloting;

use crate::transport::{
    find_characteristic, find_service, Link, Peripheral, BATTERY_CHARACTERISTIC_UUID, COMMAND_CHARACTERISTIC_UUID,
    COMMAND_SERVICE_UUID, FLIGHT_STATUS_CHARACTERISTIC_UUID, NOTIFICATION_SERVICE_UUID, PCMD_CHARACTERISTIC_UUID,
};
use crate::Config;
use crate::{Error, Result};
use log::{debug, info, warn};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::sync::atomic::{AtomicBool, AtomicU8};
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Lifecycle of a [Minidrone] session
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SessionState {
    /// Handshake not started
    Uninitialized,
    /// Services and characteristics found
    ServicesDiscovered,
    /// Notifications enabled and settings sent
    Initialized,
    /// Flat trim done and piloting commands flowing, the drone accepts flight commands
    FlightReady,
    /// [Minidrone::halt()] called
    ShuttingDown,
    /// [Minidrone::disconnect()] called or connection lost, all commands return [Error::TransportUnavailable]
    Disconnected,
}

/// # The Minidrone
///
/// This struct is one-time use: creating it runs the protocol handshake on a connected BLE device, and once
/// disconnected the object cannot be reconnected. A new one needs to be created to connect again.
///
/// See the [minidrone-lib crate root documentation](crate) for more context and information.
pub struct Minidrone {
    /// Discrete commands: take-off, landing, flips, accessories
    pub commander: Commander,
    /// Continuous movements
    pub piloting: Piloting,
    /// Flying state reported by the drone
    pub flight_status: FlightStatus,
    /// Battery level reported by the drone
    pub battery: Battery,
    config: Config,
    state: Arc<AtomicU8>,
    link: Arc<Link>,
    peripheral: Arc<dyn Peripheral>,
    disconnect_watcher: JoinHandle<()>,
}

impl Minidrone {
    /// Start a session on a connected device with the default [Config]
    ///
    /// See [Minidrone::connect_with_config()].
    pub async fn connect(peripheral: Arc<dyn Peripheral>) -> Result<Self> {
        Self::connect_with_config(peripheral, Config::default()).await
    }

    /// Start a session on a connected device
    ///
    /// This discovers the Minidrone services and characteristics, enables the flight status notifications, sends
    /// the date setting, then runs flat trim twice with the piloting command loop started in between.
    ///
    /// Returns [Error::InvalidParameter] if the configuration cannot be used, [Error::ServiceNotFound] or
    /// [Error::CharacteristicNotFound] if the device is not a Minidrone and [Error::SubscriptionFailed] if the flight
    /// status cannot be followed. No retry is attempted.
    ///
    /// If the device reports the connection lost, the session ends as if [Minidrone::disconnect()] had been called.
    pub async fn connect_with_config(peripheral: Arc<dyn Peripheral>, config: Config) -> Result<Self> {
        config.validate()?;

        debug!("Discovering Minidrone services");
        let services = peripheral
            .discover_services(&[COMMAND_SERVICE_UUID, NOTIFICATION_SERVICE_UUID])
            .await?;
        let command_service = find_service(&services, COMMAND_SERVICE_UUID)?;
        let notification_service = find_service(&services, NOTIFICATION_SERVICE_UUID)?;

        let characteristics = command_service
            .discover_characteristics(&[COMMAND_CHARACTERISTIC_UUID, PCMD_CHARACTERISTIC_UUID])
            .await?;
        let command = find_characteristic(&characteristics, COMMAND_CHARACTERISTIC_UUID)
            .ok_or(Error::CharacteristicNotFound(COMMAND_CHARACTERISTIC_UUID))?;
        let pcmd = find_characteristic(&characteristics, PCMD_CHARACTERISTIC_UUID)
            .ok_or(Error::CharacteristicNotFound(PCMD_CHARACTERISTIC_UUID))?;

        let characteristics = notification_service
            .discover_characteristics(&[FLIGHT_STATUS_CHARACTERISTIC_UUID, BATTERY_CHARACTERISTIC_UUID])
            .await?;
        let flight_status = find_characteristic(&characteristics, FLIGHT_STATUS_CHARACTERISTIC_UUID)
            .ok_or(Error::CharacteristicNotFound(FLIGHT_STATUS_CHARACTERISTIC_UUID))?;
        let battery = find_characteristic(&characteristics, BATTERY_CHARACTERISTIC_UUID);

        let link = Arc::new(Link::new(command, pcmd));
        let piloting = Piloting::new(link.clone(), config.pcmd_interval, config.pcmd_start_delay);
        let state = Arc::new(AtomicU8::new(SessionState::Uninitialized.into()));

        let disconnect_watcher = tokio::spawn(watch_disconnect(
            peripheral.clone(),
            link.clone(),
            piloting.stop_flag(),
            state.clone(),
        ));

        let drone = Minidrone {
            commander: Commander::new(link.clone()),
            piloting,
            flight_status: FlightStatus::new(),
            battery: Battery::new(),
            config,
            state,
            link,
            peripheral,
            disconnect_watcher,
        };
        drone.set_state(SessionState::ServicesDiscovered);

        // Without the flight status notifications the drone does not accept commands
        let decoder = drone.flight_status.decoder();
        flight_status
            .subscribe(Box::new(move |data: &[u8]| decoder.process(data)))
            .await
            .map_err(|e| Error::SubscriptionFailed(e.to_string()))?;

        match battery {
            Some(battery) => {
                let decoder = drone.battery.decoder();
                if let Err(e) = battery.subscribe(Box::new(move |data: &[u8]| decoder.process(data))).await {
                    warn!("Battery notifications unavailable: {}", e);
                }
            }
            None => debug!("No battery characteristic"),
        }

        drone.commander.current_date(&drone.config.date).await?;
        drone.set_state(SessionState::Initialized);

        // The drone expects the second flat trim with piloting commands already flowing
        drone.commander.flat_trim().await?;
        drone.piloting.start().await;
        drone.commander.flat_trim().await?;
        drone.set_state(SessionState::FlightReady);

        info!("Minidrone session ready");
        Ok(drone)
    }

    // A disconnected session stays disconnected
    fn set_state(&self, state: SessionState) {
        let disconnected: u8 = SessionState::Disconnected.into();
        let changed = self
            .state
            .fetch_update(Relaxed, Relaxed, |current| (current != disconnected).then(|| state.into()));
        if changed.is_ok() {
            debug!("Session state {:?}", state);
        }
    }

    /// Current state of the session
    pub fn session_state(&self) -> SessionState {
        SessionState::try_from(self.state.load(Relaxed)).unwrap_or(SessionState::Disconnected)
    }

    /// Configuration the session was started with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shorthand for [FlightStatus::is_flying()]
    pub fn is_flying(&self) -> bool {
        self.flight_status.is_flying()
    }

    /// Land and stop the piloting command loop
    ///
    /// Returns after [Config::halt_settle_delay], the transport can then be torn down. The loop is stopped even if
    /// the landing command fails, the landing error is returned afterward. Calling this function again is harmless.
    pub async fn halt(&self) -> Result<()> {
        info!("Halting Minidrone");
        self.set_state(SessionState::ShuttingDown);

        let landing = self.commander.land().await;
        if let Err(e) = &landing {
            warn!("Landing failed during halt: {}", e);
        }

        self.piloting.signal_stop();
        sleep(self.config.halt_settle_delay).await;

        landing
    }

    /// Disconnect the Minidrone
    ///
    /// Stops the piloting command loop, waits for it to exit and disconnects the device. Once disconnected, any
    /// command returns [Error::TransportUnavailable]. This function does not land the drone, see
    /// [Minidrone::halt()].
    pub async fn disconnect(&self) -> Result<()> {
        self.piloting.signal_stop();
        let joined = self.piloting.join().await;

        self.link.close();
        self.set_state(SessionState::Disconnected);
        self.peripheral.disconnect().await?;

        joined
    }

    /// Wait for the connection to be lost
    ///
    /// Returns the reason given by the transport once the session has been torn down with
    /// [Minidrone::disconnect()]. Resolves immediately if the connection is already lost.
    pub async fn wait_disconnect(&self) -> String {
        let reason = self.peripheral.wait_disconnect().await;

        if let Err(e) = self.disconnect().await {
            warn!("Error while disconnecting: {}", e);
        }

        reason
    }
}

// Ends the session when the transport loses the device, commands then fail with TransportUnavailable
async fn watch_disconnect(
    peripheral: Arc<dyn Peripheral>,
    link: Arc<Link>,
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
) {
    let reason = peripheral.wait_disconnect().await;
    stop.store(true, Relaxed);
    link.close();
    state.store(SessionState::Disconnected.into(), Relaxed);
    info!("Minidrone disconnected: {}", reason);
}

impl Drop for Minidrone {
    fn drop(&mut self) {
        self.piloting.signal_stop();
        self.disconnect_watcher.abort();
    }
}
