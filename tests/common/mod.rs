// In-memory BLE peripheral exposing the Minidrone services

#![allow(dead_code)]

use async_trait::async_trait;
use minidrone_lib::transport::{
    Characteristic, NotificationHandler, Peripheral, Service, Uuid, BATTERY_CHARACTERISTIC_UUID,
    COMMAND_CHARACTERISTIC_UUID, COMMAND_SERVICE_UUID, FLIGHT_STATUS_CHARACTERISTIC_UUID,
    NOTIFICATION_SERVICE_UUID, PCMD_CHARACTERISTIC_UUID,
};
use minidrone_lib::{Config, Error, Minidrone, Result};
use std::collections::HashMap;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn test_config() -> Config {
    Config::default()
        .with_pcmd_interval(Duration::from_millis(5))
        .with_pcmd_start_delay(Duration::from_millis(10))
        .with_halt_settle_delay(Duration::from_millis(30))
}

pub async fn connect(peripheral: &Arc<MockPeripheral>) -> Minidrone {
    init_logger();
    let device: Arc<dyn Peripheral> = peripheral.clone();
    Minidrone::connect_with_config(device, test_config())
        .await
        .expect("handshake with the mock peripheral")
}

/// Poll `condition` every millisecond until it is true, panics after 2 seconds
pub async fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timeout waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// Flight status notification as sent by the drone: common header, category at byte 4, state at byte 6
pub fn flying_state_frame(state: u8) -> Vec<u8> {
    vec![0x04, 0x01, 0x02, 0x03, 0x01, 0x00, state, 0x00, 0x00, 0x00]
}

pub fn flat_trim_changed_frame() -> Vec<u8> {
    vec![0x04, 0x01, 0x02, 0x03, 0x00, 0x00]
}

pub struct MockCharacteristic {
    uuid: Uuid,
    writes: Mutex<Vec<Vec<u8>>>,
    attempts: AtomicUsize,
    fail_writes: AtomicBool,
    refuse_subscription: bool,
    handler: Mutex<Option<NotificationHandler>>,
}

impl MockCharacteristic {
    fn new(uuid: Uuid, refuse_subscription: bool) -> Self {
        Self {
            uuid,
            writes: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            refuse_subscription,
            handler: Mutex::new(None),
        }
    }

    /// Frames successfully written so far
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    /// Write calls, failed ones included
    pub fn attempts(&self) -> usize {
        self.attempts.load(SeqCst)
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, SeqCst);
    }

    pub fn is_subscribed(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }

    /// Deliver a notification as the BLE stack would
    pub fn notify(&self, data: &[u8]) {
        if let Some(handler) = self.handler.lock().unwrap().as_ref() {
            handler(data);
        }
    }
}

#[async_trait]
impl Characteristic for MockCharacteristic {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    async fn write_without_response(&self, data: &[u8]) -> Result<usize> {
        self.attempts.fetch_add(1, SeqCst);
        if self.fail_writes.load(SeqCst) {
            return Err(Error::WriteFailed("mock link lost".to_owned()));
        }
        self.writes.lock().unwrap().push(data.to_vec());
        Ok(data.len())
    }

    async fn subscribe(&self, handler: NotificationHandler) -> Result<()> {
        if self.refuse_subscription {
            return Err(Error::SubscriptionFailed("refused by mock".to_owned()));
        }
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }
}

pub struct MockService {
    uuid: Uuid,
    characteristics: Vec<Arc<MockCharacteristic>>,
}

#[async_trait]
impl Service for MockService {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    async fn discover_characteristics(&self, uuids: &[Uuid]) -> Result<Vec<Arc<dyn Characteristic>>> {
        Ok(self
            .characteristics
            .iter()
            .filter(|c| uuids.contains(&c.uuid))
            .map(|c| c.clone() as Arc<dyn Characteristic>)
            .collect())
    }
}

#[derive(Default)]
pub struct MockOptions {
    pub missing_services: Vec<Uuid>,
    pub missing_characteristics: Vec<Uuid>,
    pub refused_subscriptions: Vec<Uuid>,
}

pub struct MockPeripheral {
    services: Vec<Arc<MockService>>,
    characteristics: HashMap<Uuid, Arc<MockCharacteristic>>,
    disconnected: AtomicBool,
    disconnect_reason: watch::Sender<Option<String>>,
}

impl MockPeripheral {
    pub fn new() -> Arc<Self> {
        Self::with_options(MockOptions::default())
    }

    pub fn with_options(options: MockOptions) -> Arc<Self> {
        let layout = [
            (COMMAND_SERVICE_UUID, vec![COMMAND_CHARACTERISTIC_UUID, PCMD_CHARACTERISTIC_UUID]),
            (
                NOTIFICATION_SERVICE_UUID,
                vec![FLIGHT_STATUS_CHARACTERISTIC_UUID, BATTERY_CHARACTERISTIC_UUID],
            ),
        ];

        let mut services = Vec::new();
        let mut characteristics = HashMap::new();
        for (service_uuid, characteristic_uuids) in layout.iter() {
            let mut service_characteristics = Vec::new();
            for uuid in characteristic_uuids {
                let characteristic = Arc::new(MockCharacteristic::new(
                    *uuid,
                    options.refused_subscriptions.contains(uuid),
                ));
                characteristics.insert(*uuid, characteristic.clone());
                if !options.missing_characteristics.contains(uuid) {
                    service_characteristics.push(characteristic);
                }
            }
            if !options.missing_services.contains(service_uuid) {
                services.push(Arc::new(MockService {
                    uuid: *service_uuid,
                    characteristics: service_characteristics,
                }));
            }
        }

        Arc::new(Self {
            services,
            characteristics,
            disconnected: AtomicBool::new(false),
            disconnect_reason: watch::channel(None).0,
        })
    }

    pub fn characteristic(&self, uuid: Uuid) -> Arc<MockCharacteristic> {
        self.characteristics[&uuid].clone()
    }

    pub fn command(&self) -> Arc<MockCharacteristic> {
        self.characteristic(COMMAND_CHARACTERISTIC_UUID)
    }

    pub fn pcmd(&self) -> Arc<MockCharacteristic> {
        self.characteristic(PCMD_CHARACTERISTIC_UUID)
    }

    pub fn flight_status(&self) -> Arc<MockCharacteristic> {
        self.characteristic(FLIGHT_STATUS_CHARACTERISTIC_UUID)
    }

    pub fn battery(&self) -> Arc<MockCharacteristic> {
        self.characteristic(BATTERY_CHARACTERISTIC_UUID)
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(SeqCst)
    }

    /// Drop the connection from the device side, as when the drone goes out of range
    pub fn lose_connection(&self, reason: &str) {
        self.set_disconnected(reason);
    }

    fn set_disconnected(&self, reason: &str) {
        self.disconnected.store(true, SeqCst);
        // The first reason is kept
        self.disconnect_reason.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason.to_owned());
            true
        });
    }
}

#[async_trait]
impl Peripheral for MockPeripheral {
    async fn discover_services(&self, uuids: &[Uuid]) -> Result<Vec<Arc<dyn Service>>> {
        Ok(self
            .services
            .iter()
            .filter(|s| uuids.contains(&s.uuid))
            .map(|s| s.clone() as Arc<dyn Service>)
            .collect())
    }

    async fn disconnect(&self) -> Result<()> {
        self.set_disconnected("disconnected by host");
        Ok(())
    }

    async fn wait_disconnect(&self) -> String {
        let mut reason = self.disconnect_reason.subscribe();
        let result = reason
            .wait_for(Option::is_some)
            .await
            .map(|reason| (*reason).clone().unwrap_or_default());
        result.unwrap_or_else(|_| "mock dropped".to_owned())
    }
}
