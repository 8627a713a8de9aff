//! Scripted stand-in for the host plugin.

use crate::{
    api::{AttributeHandle, WriteType},
    plugin::{
        BlePlugin, CharacteristicInfo, ConnectionInfo, ConnectionState, ConnectionStream,
        DescriptorInfo, DeviceHandle, NotificationStream, ScanResult, ScanStream, ServiceInfo,
    },
    Error, Result,
};
use async_trait::async_trait;
use futures::channel::mpsc::{self, UnboundedSender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub const HEART_RATE_MEASUREMENT: AttributeHandle = 12;
pub const HEART_RATE_CCCD: AttributeHandle = 13;
pub const BODY_SENSOR_LOCATION: AttributeHandle = 14;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    StartScan,
    StopScan,
    Connect(String),
    Close(DeviceHandle),
    ReadAllServiceData(DeviceHandle),
    ReadCharacteristic(DeviceHandle, AttributeHandle),
    WriteCharacteristic(DeviceHandle, AttributeHandle, Vec<u8>, WriteType),
    EnableNotification(DeviceHandle, AttributeHandle),
    DisableNotification(DeviceHandle, AttributeHandle),
    ReadDescriptor(DeviceHandle, AttributeHandle),
    WriteDescriptor(DeviceHandle, AttributeHandle, Vec<u8>),
}

#[derive(Default)]
pub struct FakePlugin {
    pub calls: Mutex<Vec<Call>>,
    pub services: Mutex<Vec<ServiceInfo>>,
    /// Connections are answered with `Disconnected` instead of `Connected`.
    pub refuse_connections: bool,
    /// `disable_notification` never completes.
    pub hang_on_disable: bool,
    /// `read_all_service_data` fails.
    pub fail_service_read: bool,
    /// `start_scan` is refused by the host.
    pub deny_scan: bool,
    /// `enable_notification` fails once set.
    pub fail_enable: AtomicBool,
    pub scan: Mutex<Option<UnboundedSender<ScanResult>>>,
    pub connections: Mutex<HashMap<DeviceHandle, UnboundedSender<ConnectionInfo>>>,
    pub notifiers: Mutex<HashMap<AttributeHandle, UnboundedSender<Vec<u8>>>>,
}

impl FakePlugin {
    pub fn new() -> Self {
        let plugin = FakePlugin::default();
        *plugin.services.lock().unwrap() = heart_rate_service();
        plugin
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn push_scan_result(&self, result: ScanResult) {
        let scan = self.scan.lock().unwrap();
        scan.as_ref()
            .expect("scan not started")
            .unbounded_send(result)
            .expect("scan stream dropped");
    }

    pub fn push_connection_state(&self, device: DeviceHandle, state: ConnectionState) {
        let connections = self.connections.lock().unwrap();
        connections[&device]
            .unbounded_send(ConnectionInfo {
                state,
                device_handle: device,
            })
            .expect("connection stream dropped");
    }

    pub fn notify(&self, characteristic: AttributeHandle, value: &[u8]) {
        let notifiers = self.notifiers.lock().unwrap();
        notifiers[&characteristic]
            .unbounded_send(value.to_vec())
            .expect("notification stream dropped");
    }
}

pub fn heart_rate_service() -> Vec<ServiceInfo> {
    vec![ServiceInfo {
        uuid: "0000180d-0000-1000-8000-00805f9b34fb".into(),
        handle: 10,
        service_type: 0,
        characteristics: vec![
            CharacteristicInfo {
                uuid: "00002a37-0000-1000-8000-00805f9b34fb".into(),
                handle: HEART_RATE_MEASUREMENT,
                property: 0x10,
                descriptors: vec![DescriptorInfo {
                    uuid: "00002902-0000-1000-8000-00805f9b34fb".into(),
                    handle: HEART_RATE_CCCD,
                }],
            },
            CharacteristicInfo {
                uuid: "2a38".into(),
                handle: BODY_SENSOR_LOCATION,
                property: 0x02,
                descriptors: vec![],
            },
        ],
    }]
}

pub fn scan_result(address: &str, scan_record: &str) -> ScanResult {
    ScanResult {
        address: address.into(),
        rssi: Some(-70),
        name: None,
        advertisement: Some(crate::advertisement::RawAdvertisement::Encoded(
            scan_record.into(),
        )),
    }
}

#[async_trait]
impl BlePlugin for FakePlugin {
    async fn ready(&self) -> Result<()> {
        Ok(())
    }

    async fn start_scan(&self) -> Result<ScanStream> {
        self.record(Call::StartScan);
        if self.deny_scan {
            return Err(Error::PermissionDenied);
        }
        let (sender, receiver) = mpsc::unbounded();
        *self.scan.lock().unwrap() = Some(sender);
        Ok(Box::pin(receiver))
    }

    async fn stop_scan(&self) -> Result<()> {
        self.record(Call::StopScan);
        self.scan.lock().unwrap().take();
        Ok(())
    }

    async fn connect(&self, address: &str) -> Result<ConnectionStream> {
        self.record(Call::Connect(address.to_string()));
        let mut connections = self.connections.lock().unwrap();
        let device = DeviceHandle(connections.len() as u32 + 1);
        let (sender, receiver) = mpsc::unbounded();
        let state = if self.refuse_connections {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Connected
        };
        for state in [ConnectionState::Connecting, state] {
            let _ = sender.unbounded_send(ConnectionInfo {
                state,
                device_handle: device,
            });
        }
        connections.insert(device, sender);
        Ok(Box::pin(receiver))
    }

    async fn close(&self, device: DeviceHandle) -> Result<()> {
        self.record(Call::Close(device));
        Ok(())
    }

    async fn read_all_service_data(&self, device: DeviceHandle) -> Result<Vec<ServiceInfo>> {
        self.record(Call::ReadAllServiceData(device));
        if self.fail_service_read {
            return Err(Error::Plugin("service discovery failed".into()));
        }
        Ok(self.services.lock().unwrap().clone())
    }

    async fn read_characteristic(
        &self,
        device: DeviceHandle,
        characteristic: AttributeHandle,
    ) -> Result<Vec<u8>> {
        self.record(Call::ReadCharacteristic(device, characteristic));
        Ok(vec![characteristic as u8])
    }

    async fn write_characteristic(
        &self,
        device: DeviceHandle,
        characteristic: AttributeHandle,
        data: &[u8],
        write_type: WriteType,
    ) -> Result<()> {
        self.record(Call::WriteCharacteristic(
            device,
            characteristic,
            data.to_vec(),
            write_type,
        ));
        Ok(())
    }

    async fn enable_notification(
        &self,
        device: DeviceHandle,
        characteristic: AttributeHandle,
    ) -> Result<NotificationStream> {
        self.record(Call::EnableNotification(device, characteristic));
        if self.fail_enable.load(Ordering::SeqCst) {
            return Err(Error::Plugin("enable notification failed".into()));
        }
        let (sender, receiver) = mpsc::unbounded();
        self.notifiers
            .lock()
            .unwrap()
            .insert(characteristic, sender);
        Ok(Box::pin(receiver))
    }

    async fn disable_notification(
        &self,
        device: DeviceHandle,
        characteristic: AttributeHandle,
    ) -> Result<()> {
        self.record(Call::DisableNotification(device, characteristic));
        if self.hang_on_disable {
            futures::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn read_descriptor(
        &self,
        device: DeviceHandle,
        descriptor: AttributeHandle,
    ) -> Result<Vec<u8>> {
        self.record(Call::ReadDescriptor(device, descriptor));
        Ok(vec![0x00, 0x00])
    }

    async fn write_descriptor(
        &self,
        device: DeviceHandle,
        descriptor: AttributeHandle,
        data: &[u8],
    ) -> Result<()> {
        self.record(Call::WriteDescriptor(device, descriptor, data.to_vec()));
        Ok(())
    }
}
