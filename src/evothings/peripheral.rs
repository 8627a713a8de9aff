// evoplug Source Code File
//
// Copyright 2020 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use super::quirks::{NotifyStrategy, CCCD_UUID, ENABLE_NOTIFICATION_VALUE};
use crate::{
    api::{
        self,
        bleuuid::{expand_short_uuid, BleUuid},
        AttributeHandle, CentralEvent, Characteristic, Descriptor, PeripheralProperties, Service,
        ValueNotification, WriteType,
    },
    common::{
        adapter_manager::{AdapterManager, ConnectionContext},
        util::notifications_stream_from_broadcast_receiver,
    },
    plugin::{BlePlugin, ConnectionInfo, ConnectionState, ConnectionStream, DeviceHandle},
    Error, Result,
};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use log::{debug, trace, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "serde")]
use serde_cr as serde;
use std::{
    collections::{BTreeSet, HashMap},
    fmt::{self, Debug, Display, Formatter},
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, Weak,
    },
};
use tokio::{sync::broadcast, task::JoinHandle};
use uuid::Uuid;

/// Identifies a peripheral by the address the plugin reports for it.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PeripheralId(pub(crate) String);

impl Display for PeripheralId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<String> for PeripheralId {
    fn from(address: String) -> Self {
        PeripheralId(address)
    }
}

impl From<&str> for PeripheralId {
    fn from(address: &str) -> Self {
        PeripheralId(address.to_string())
    }
}

struct Shared {
    id: PeripheralId,
    plugin: Arc<dyn BlePlugin>,
    manager: Weak<AdapterManager<Peripheral>>,
    strategy: NotifyStrategy,
    properties: Mutex<PeripheralProperties>,
    services: Mutex<BTreeSet<Service>>,
    connected: AtomicBool,
    notifications_channel: broadcast::Sender<ValueNotification>,
    notify_tasks: Mutex<HashMap<AttributeHandle, JoinHandle<()>>>,
    connection_task: Mutex<Option<JoinHandle<()>>>,
}

/// Implementation of [api::Peripheral](crate::api::Peripheral).
#[derive(Clone)]
pub struct Peripheral {
    shared: Arc<Shared>,
}

impl Peripheral {
    pub(crate) fn new(
        manager: Weak<AdapterManager<Self>>,
        plugin: Arc<dyn BlePlugin>,
        strategy: NotifyStrategy,
        notification_capacity: usize,
        properties: PeripheralProperties,
    ) -> Self {
        let (notifications_channel, _) = broadcast::channel(notification_capacity.max(1));
        Peripheral {
            shared: Arc::new(Shared {
                id: PeripheralId(properties.address.clone()),
                plugin,
                manager,
                strategy,
                properties: Mutex::new(properties),
                services: Mutex::new(BTreeSet::new()),
                connected: AtomicBool::new(false),
                notifications_channel,
                notify_tasks: Mutex::new(HashMap::new()),
                connection_task: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn update_properties(&self, properties: PeripheralProperties) {
        *self.shared.properties.lock().unwrap() = properties;
    }

    fn manager(&self) -> Result<Arc<AdapterManager<Self>>> {
        self.shared
            .manager
            .upgrade()
            .ok_or_else(|| Error::RuntimeError("Adapter has been dropped".to_string()))
    }

    fn device(&self) -> Result<DeviceHandle> {
        self.manager()?
            .connection(&self.shared.id)
            .map(|context| context.device)
            .ok_or(Error::NotConnected)
    }

    fn characteristic_device(&self, characteristic: &Characteristic) -> Result<DeviceHandle> {
        let manager = self.manager()?;
        let context = manager
            .connection(&self.shared.id)
            .ok_or(Error::NotConnected)?;
        if context.characteristics.contains_key(&characteristic.handle) {
            Ok(context.device)
        } else {
            Err(Error::NoSuchCharacteristic)
        }
    }

    fn descriptor_device(&self, descriptor: &Descriptor) -> Result<DeviceHandle> {
        let manager = self.manager()?;
        let context = manager
            .connection(&self.shared.id)
            .ok_or(Error::NotConnected)?;
        if context.descriptors.contains_key(&descriptor.handle) {
            Ok(context.device)
        } else {
            Err(Error::NoSuchDescriptor)
        }
    }

    async fn read_services(&self, device: DeviceHandle) -> Result<BTreeSet<Service>> {
        let infos = self.shared.plugin.read_all_service_data(device).await?;
        let mut services = BTreeSet::new();
        for service in infos {
            let service_uuid = parse_uuid(&service.uuid)?;
            let mut characteristics = BTreeSet::new();
            for characteristic in &service.characteristics {
                let uuid = parse_uuid(&characteristic.uuid)?;
                let descriptors = characteristic
                    .descriptors
                    .iter()
                    .map(|descriptor| {
                        Ok(Descriptor {
                            uuid: parse_uuid(&descriptor.uuid)?,
                            service_uuid,
                            characteristic_uuid: uuid,
                            handle: descriptor.handle,
                        })
                    })
                    .collect::<Result<BTreeSet<_>>>()?;
                trace!(
                    "{}: characteristic {} (handle {}) on service {}",
                    self.shared.id,
                    uuid.to_short_string(),
                    characteristic.handle,
                    service_uuid.to_short_string()
                );
                characteristics.insert(Characteristic {
                    uuid,
                    service_uuid,
                    handle: characteristic.handle,
                    properties: characteristic.properties(),
                    descriptors,
                });
            }
            services.insert(Service {
                uuid: service_uuid,
                handle: service.handle,
                primary: service.is_primary(),
                characteristics,
            });
        }
        Ok(services)
    }

    fn store_services(&self, device: DeviceHandle, services: BTreeSet<Service>) -> Result<()> {
        self.manager()?.set_connection(
            self.shared.id.clone(),
            ConnectionContext::new(device, &services),
        );
        *self.shared.services.lock().unwrap() = services;
        Ok(())
    }

    fn watch_connection(&self, mut states: ConnectionStream) {
        let shared = Arc::downgrade(&self.shared);
        let task = tokio::spawn(async move {
            while let Some(info) = states.next().await {
                trace!("Connection {} now {:?}", info.device_handle, info.state);
                if info.state != ConnectionState::Disconnected {
                    continue;
                }
                if let Some(shared) = shared.upgrade() {
                    let peripheral = Peripheral { shared };
                    debug!("{} disconnected", peripheral.shared.id);
                    if let Err(e) = peripheral.teardown(false).await {
                        warn!("Failed to close {}: {}", peripheral.shared.id, e);
                    }
                }
                break;
            }
        });
        *self.shared.connection_task.lock().unwrap() = Some(task);
    }

    /// Drops all connection state and closes the plugin's handle for it. The connection watcher
    /// is aborted unless the teardown runs on it.
    async fn teardown(&self, abort_watcher: bool) -> Result<()> {
        let watcher = self.shared.connection_task.lock().unwrap().take();
        if let (true, Some(watcher)) = (abort_watcher, watcher) {
            watcher.abort();
        }
        for (_, task) in self.shared.notify_tasks.lock().unwrap().drain() {
            task.abort();
        }
        self.shared.services.lock().unwrap().clear();
        let was_connected = self.shared.connected.swap(false, Ordering::SeqCst);

        let manager = self.manager()?;
        let closed = match manager.remove_connection(&self.shared.id) {
            Some(context) => self.shared.plugin.close(context.device).await,
            None => Ok(()),
        };
        if was_connected {
            manager.emit(CentralEvent::DeviceDisconnected(self.shared.id.clone()));
        }
        closed
    }

    fn is_subscribed(&self, handle: AttributeHandle) -> bool {
        self.shared
            .notify_tasks
            .lock()
            .unwrap()
            .contains_key(&handle)
    }

    async fn start_notifications(
        &self,
        device: DeviceHandle,
        characteristic: &Characteristic,
    ) -> Result<()> {
        let mut values = self
            .shared
            .plugin
            .enable_notification(device, characteristic.handle)
            .await?;
        let sender = self.shared.notifications_channel.clone();
        let uuid = characteristic.uuid;
        let handle = characteristic.handle;
        let task = tokio::spawn(async move {
            while let Some(value) = values.next().await {
                // Note: we ignore send errors here which may happen while there are no
                // receivers...
                let _ = sender.send(ValueNotification {
                    uuid,
                    handle,
                    value,
                });
            }
        });
        let previous = self
            .shared
            .notify_tasks
            .lock()
            .unwrap()
            .insert(handle, task);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }
}

fn parse_uuid(uuid: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(&expand_short_uuid(uuid))?)
}

impl Display for Peripheral {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let connected = if self.shared.connected.load(Ordering::Relaxed) {
            " connected"
        } else {
            ""
        };
        let properties = self.shared.properties.lock().unwrap();
        write!(
            f,
            "{} {}{}",
            self.shared.id,
            properties
                .local_name
                .clone()
                .unwrap_or_else(|| "(unknown)".to_string()),
            connected
        )
    }
}

impl Debug for Peripheral {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Peripheral")
            .field("id", &self.shared.id)
            .field("properties", &self.shared.properties)
            .field("connected", &self.shared.connected)
            .field("strategy", &self.shared.strategy)
            .finish()
    }
}

#[async_trait]
impl api::Peripheral for Peripheral {
    fn id(&self) -> PeripheralId {
        self.shared.id.clone()
    }

    async fn properties(&self) -> Result<Option<PeripheralProperties>> {
        Ok(Some(self.shared.properties.lock().unwrap().clone()))
    }

    fn services(&self) -> BTreeSet<Service> {
        self.shared.services.lock().unwrap().clone()
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(self.shared.connected.load(Ordering::SeqCst))
    }

    async fn connect(&self) -> Result<()> {
        if self.shared.connected.load(Ordering::SeqCst) {
            return Ok(());
        }
        let mut states = self.shared.plugin.connect(&self.shared.id.0).await?;
        let device = loop {
            match states.next().await {
                Some(ConnectionInfo {
                    state: ConnectionState::Connected,
                    device_handle,
                }) => break device_handle,
                Some(ConnectionInfo {
                    state: ConnectionState::Disconnected,
                    ..
                }) => {
                    debug!("{} refused the connection", self.shared.id);
                    return Err(Error::NotConnected);
                }
                Some(info) => trace!("Connection {} now {:?}", info.device_handle, info.state),
                None => return Err(Error::NotConnected),
            }
        };

        self.store_services(device, BTreeSet::new())?;
        self.shared.connected.store(true, Ordering::SeqCst);
        self.watch_connection(states);

        match self.read_services(device).await {
            // The link may have dropped while the services were being read.
            Ok(_) if !self.shared.connected.load(Ordering::SeqCst) => {
                return Err(Error::NotConnected)
            }
            Ok(services) => self.store_services(device, services)?,
            Err(e) => {
                warn!("Reading services of {} failed: {}", self.shared.id, e);
                self.shared.connected.store(false, Ordering::SeqCst);
                if let Err(close_error) = self.teardown(true).await {
                    warn!("Failed to close {}: {}", self.shared.id, close_error);
                }
                return Err(e);
            }
        }

        debug!("Connected to {} as {}", self.shared.id, device);
        self.manager()?
            .emit(CentralEvent::DeviceConnected(self.shared.id.clone()));
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if !self.shared.connected.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.teardown(true).await
    }

    async fn discover_services(&self) -> Result<()> {
        let device = self.device()?;
        let services = self.read_services(device).await?;
        self.store_services(device, services)
    }

    async fn write(
        &self,
        characteristic: &Characteristic,
        data: &[u8],
        write_type: WriteType,
    ) -> Result<()> {
        let device = self.characteristic_device(characteristic)?;
        self.shared
            .plugin
            .write_characteristic(device, characteristic.handle, data, write_type)
            .await
    }

    async fn read(&self, characteristic: &Characteristic) -> Result<Vec<u8>> {
        let device = self.characteristic_device(characteristic)?;
        let value = self
            .shared
            .plugin
            .read_characteristic(device, characteristic.handle)
            .await?;
        if self.shared.strategy.rearms_after_read() && self.is_subscribed(characteristic.handle) {
            trace!("Re-enabling notifications on {}", characteristic.uuid);
            if let Err(e) = self.start_notifications(device, characteristic).await {
                warn!(
                    "Failed to re-enable notifications on {}: {}",
                    characteristic.uuid, e
                );
            }
        }
        Ok(value)
    }

    async fn subscribe(&self, characteristic: &Characteristic) -> Result<()> {
        let device = self.characteristic_device(characteristic)?;
        if self.shared.strategy.writes_cccd() {
            let cccd = characteristic
                .descriptors
                .iter()
                .find(|descriptor| descriptor.uuid == CCCD_UUID)
                .ok_or(Error::NotifyDescriptorMissing)?;
            api::Peripheral::write_descriptor(self, cccd, &ENABLE_NOTIFICATION_VALUE).await?;
        }
        self.start_notifications(device, characteristic).await
    }

    async fn unsubscribe(&self, characteristic: &Characteristic) -> Result<()> {
        let device = self.characteristic_device(characteristic)?;
        let handle = characteristic.handle;
        let task = self.shared.notify_tasks.lock().unwrap().remove(&handle);
        if let Some(task) = task {
            task.abort();
        }
        if self.shared.strategy.awaits_disable() {
            return self.shared.plugin.disable_notification(device, handle).await;
        }

        // No completion is ever reported for this request.
        let plugin = self.shared.plugin.clone();
        tokio::spawn(async move {
            if let Err(e) = plugin.disable_notification(device, handle).await {
                warn!("Disabling notifications on handle {} failed: {}", handle, e);
            }
        });
        Ok(())
    }

    async fn notifications(&self) -> Result<Pin<Box<dyn Stream<Item = ValueNotification> + Send>>> {
        let receiver = self.shared.notifications_channel.subscribe();
        Ok(notifications_stream_from_broadcast_receiver(receiver))
    }

    async fn write_descriptor(&self, descriptor: &Descriptor, data: &[u8]) -> Result<()> {
        let device = self.descriptor_device(descriptor)?;
        self.shared
            .plugin
            .write_descriptor(device, descriptor.handle, data)
            .await
    }

    async fn read_descriptor(&self, descriptor: &Descriptor) -> Result<Vec<u8>> {
        let device = self.descriptor_device(descriptor)?;
        self.shared
            .plugin
            .read_descriptor(device, descriptor.handle)
            .await
    }
}
