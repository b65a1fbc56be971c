//! BLE transport seam
//!
//! The lib does not implement Bluetooth itself. A BLE stack is plugged in by implementing the three traits of this
//! module for an already connected device: [Peripheral] for service discovery, [Service] for characteristic
//! discovery and [Characteristic] for writes and notifications.
//!
//! The UUIDs the Minidrone exposes are protocol constants and are listed here.

use crate::frame::SequenceCounter;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::lock::Mutex;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;

/// 128 bits BLE UUID, stored most significant byte first
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uuid([u8; 16]);

impl Uuid {
    /// Build an UUID from its 16 bytes, most significant byte first
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Bytes of the UUID, most significant byte first
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    // All Minidrone UUIDs only differ by their second 16 bits word
    const fn minidrone(service: u8, id: u8) -> Self {
        Self([
            0x9a, 0x66, service, id, 0x08, 0x00, 0x91, 0x91, 0x11, 0xe4, 0x01, 0x2d, 0x15, 0x40, 0xcb, 0x8e,
        ])
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uuid({})", self)
    }
}

/// Service receiving commands from the ground
pub const COMMAND_SERVICE_UUID: Uuid = Uuid::minidrone(0xfa, 0x00);
/// Service sending notifications to the ground
pub const NOTIFICATION_SERVICE_UUID: Uuid = Uuid::minidrone(0xfb, 0x00);

/// Piloting command (PCMD) characteristic, in the command service
pub const PCMD_CHARACTERISTIC_UUID: Uuid = Uuid::minidrone(0xfa, 0x0a);
/// Discrete command characteristic, in the command service
pub const COMMAND_CHARACTERISTIC_UUID: Uuid = Uuid::minidrone(0xfa, 0x0b);
/// Flight status notification characteristic, in the notification service
pub const FLIGHT_STATUS_CHARACTERISTIC_UUID: Uuid = Uuid::minidrone(0xfb, 0x0e);
/// Battery notification characteristic, in the notification service
pub const BATTERY_CHARACTERISTIC_UUID: Uuid = Uuid::minidrone(0xfb, 0x0f);

/// Callback invoked by the transport for each notification received on a characteristic
pub type NotificationHandler = Box<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// A connected BLE device
#[async_trait]
pub trait Peripheral: Send + Sync {
    /// Discover the services matching `uuids`. Services not present on the device are left out of the result.
    async fn discover_services(&self, uuids: &[Uuid]) -> Result<Vec<Arc<dyn Service>>>;

    /// Disconnect the device
    async fn disconnect(&self) -> Result<()>;

    /// Wait for the connection to be lost and return the reason
    ///
    /// Must resolve for every caller, including callers arriving after the disconnection and after
    /// [Peripheral::disconnect()]. The default implementation never resolves, for stacks that do not report link loss.
    async fn wait_disconnect(&self) -> String {
        futures::future::pending().await
    }
}

/// A discovered BLE service
#[async_trait]
pub trait Service: Send + Sync {
    /// UUID of the service
    fn uuid(&self) -> Uuid;

    /// Discover the characteristics matching `uuids`. Characteristics not present are left out of the result.
    async fn discover_characteristics(&self, uuids: &[Uuid]) -> Result<Vec<Arc<dyn Characteristic>>>;
}

/// A discovered BLE characteristic
#[async_trait]
pub trait Characteristic: Send + Sync {
    /// UUID of the characteristic
    fn uuid(&self) -> Uuid;

    /// Write without response, returns the number of bytes accepted by the transport
    async fn write_without_response(&self, data: &[u8]) -> Result<usize>;

    /// Enable notifications, `handler` is then called from the transport context for each notification
    async fn subscribe(&self, handler: NotificationHandler) -> Result<()>;
}

pub(crate) fn find_service(services: &[Arc<dyn Service>], uuid: Uuid) -> Result<Arc<dyn Service>> {
    services
        .iter()
        .find(|service| service.uuid() == uuid)
        .cloned()
        .ok_or(Error::ServiceNotFound(uuid))
}

pub(crate) fn find_characteristic(
    characteristics: &[Arc<dyn Characteristic>],
    uuid: Uuid,
) -> Option<Arc<dyn Characteristic>> {
    characteristics.iter().find(|c| c.uuid() == uuid).cloned()
}

async fn write_frame(characteristic: &dyn Characteristic, frame: &[u8]) -> Result<()> {
    let written = characteristic.write_without_response(frame).await?;
    if written < frame.len() {
        return Err(Error::WriteFailed(format!(
            "short write, {} of {} bytes",
            written,
            frame.len()
        )));
    }
    Ok(())
}

/// Write side of a session: the two outbound characteristics and the command channel sequence counter
pub(crate) struct Link {
    command: Arc<dyn Characteristic>,
    pcmd: Arc<dyn Characteristic>,
    // Held across the write so frames reach the drone in sequence order
    command_sequence: Mutex<SequenceCounter>,
    available: AtomicBool,
}

impl Link {
    pub(crate) fn new(command: Arc<dyn Characteristic>, pcmd: Arc<dyn Characteristic>) -> Self {
        Link {
            command,
            pcmd,
            command_sequence: Mutex::new(SequenceCounter::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Build a frame with the next command sequence number and write it on the command characteristic
    pub(crate) async fn send_command<F>(&self, build: F) -> Result<()>
    where
        F: FnOnce(u8) -> Vec<u8> + Send,
    {
        self.check_available()?;

        let mut sequence = self.command_sequence.lock().await;
        let frame = build(sequence.next());
        write_frame(self.command.as_ref(), &frame).await
    }

    pub(crate) async fn send_pcmd(&self, frame: &[u8]) -> Result<()> {
        self.check_available()?;
        write_frame(self.pcmd.as_ref(), frame).await
    }

    pub(crate) fn check_available(&self) -> Result<()> {
        if self.available.load(Relaxed) {
            Ok(())
        } else {
            Err(Error::TransportUnavailable)
        }
    }

    pub(crate) fn close(&self) {
        self.available.store(false, Relaxed);
    }
}
