// evoplug Source Code File
//
// Copyright 2020 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! The capability surface of the host's native BLE plugin.
//!
//! The plugin itself lives outside this crate: the host (a Cordova webview bridge, a test
//! double, ...) implements [`BlePlugin`] and hands it to
//! [`Manager::new`](crate::platform::Manager::new). Callback-style plugin calls that fire
//! repeatedly (scan results, connection state changes, notifications) are modelled as streams.

use crate::advertisement::{AdvertisementRecord, RawAdvertisement};
use crate::api::{AttributeHandle, CharPropFlags, PeripheralProperties, WriteType};
use crate::Result;
use async_trait::async_trait;
use futures::stream::Stream;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "serde")]
use serde_cr as serde;
use std::fmt::{self, Display, Formatter};
use std::pin::Pin;

pub type ScanStream = Pin<Box<dyn Stream<Item = ScanResult> + Send>>;
pub type ConnectionStream = Pin<Box<dyn Stream<Item = ConnectionInfo> + Send>>;
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// Handle the plugin assigns to an open connection.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DeviceHandle(pub u32);

impl Display for DeviceHandle {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One scan callback from the plugin.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanResult {
    pub address: String,
    pub rssi: Option<i16>,
    /// Name the OS already associates with the device, if any.
    pub name: Option<String>,
    pub advertisement: Option<RawAdvertisement>,
}

impl ScanResult {
    /// Parse the advertisement, falling back to the OS-supplied name when the advertisement
    /// does not carry one.
    pub fn advertisement_record(&self) -> AdvertisementRecord {
        let mut record = self
            .advertisement
            .as_ref()
            .map(RawAdvertisement::parse)
            .unwrap_or_default();
        if record.name.is_none() {
            record.name = self.name.clone();
        }
        record
    }

    pub fn properties(&self) -> PeripheralProperties {
        let record = self.advertisement_record();
        PeripheralProperties {
            address: self.address.clone(),
            local_name: record.name,
            rssi: self.rssi,
            services: record.service_uuids,
        }
    }
}

/// Connection states as numbered by the plugin.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Disconnecting = 3,
}

impl ConnectionState {
    pub fn from_u8(v: u8) -> Option<ConnectionState> {
        match v {
            0 => Some(ConnectionState::Disconnected),
            1 => Some(ConnectionState::Connecting),
            2 => Some(ConnectionState::Connected),
            3 => Some(ConnectionState::Disconnecting),
            _ => None,
        }
    }
}

/// A connection state change reported for a `connect` call.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConnectionInfo {
    pub state: ConnectionState,
    pub device_handle: DeviceHandle,
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DescriptorInfo {
    pub uuid: String,
    pub handle: AttributeHandle,
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CharacteristicInfo {
    pub uuid: String,
    pub handle: AttributeHandle,
    /// GATT characteristic property bits.
    pub property: u8,
    pub descriptors: Vec<DescriptorInfo>,
}

impl CharacteristicInfo {
    pub fn properties(&self) -> CharPropFlags {
        CharPropFlags::from_bits_truncate(self.property)
    }
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceInfo {
    pub uuid: String,
    pub handle: AttributeHandle,
    /// 0 for a primary service.
    pub service_type: u8,
    pub characteristics: Vec<CharacteristicInfo>,
}

impl ServiceInfo {
    pub fn is_primary(&self) -> bool {
        self.service_type == 0
    }
}

/// The calls the host's BLE plugin provides. Errors reported through the plugin's error
/// callbacks should surface as [`Error::Plugin`](crate::Error::Plugin).
#[async_trait]
pub trait BlePlugin: Send + Sync {
    /// Resolves once the plugin is loaded and usable.
    async fn ready(&self) -> Result<()>;

    /// Starts scanning. Every advertisement received is yielded on the returned stream until
    /// `stop_scan` is called.
    async fn start_scan(&self) -> Result<ScanStream>;

    async fn stop_scan(&self) -> Result<()>;

    /// Opens a connection to `address`. The stream yields every state change of that
    /// connection, and ends when the plugin stops reporting on it.
    async fn connect(&self, address: &str) -> Result<ConnectionStream>;

    /// Closes a connection and releases its handle.
    async fn close(&self, device: DeviceHandle) -> Result<()>;

    /// Reads every service with its characteristics and descriptors.
    async fn read_all_service_data(&self, device: DeviceHandle) -> Result<Vec<ServiceInfo>>;

    async fn read_characteristic(
        &self,
        device: DeviceHandle,
        characteristic: AttributeHandle,
    ) -> Result<Vec<u8>>;

    async fn write_characteristic(
        &self,
        device: DeviceHandle,
        characteristic: AttributeHandle,
        data: &[u8],
        write_type: WriteType,
    ) -> Result<()>;

    /// Turns on notifications. The stream yields each notified value.
    async fn enable_notification(
        &self,
        device: DeviceHandle,
        characteristic: AttributeHandle,
    ) -> Result<NotificationStream>;

    async fn disable_notification(
        &self,
        device: DeviceHandle,
        characteristic: AttributeHandle,
    ) -> Result<()>;

    async fn read_descriptor(
        &self,
        device: DeviceHandle,
        descriptor: AttributeHandle,
    ) -> Result<Vec<u8>>;

    async fn write_descriptor(
        &self,
        device: DeviceHandle,
        descriptor: AttributeHandle,
        data: &[u8],
    ) -> Result<()>;
}
