// evoplug Source Code File
//
// Copyright 2020 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Implements common functionality for adapters.

use crate::api::{AttributeHandle, CentralEvent, Characteristic, Descriptor, Peripheral, Service};
use crate::platform::PeripheralId;
use crate::plugin::DeviceHandle;
use dashmap::{mapref::one::Ref, DashMap};
use futures::stream::{Stream, StreamExt};
use log::trace;
use std::collections::{BTreeSet, HashMap};
use std::pin::Pin;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// What an open connection needs to address the plugin: the plugin's handle for the
/// connection and the attributes it reported, keyed by their plugin handles.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub device: DeviceHandle,
    pub characteristics: HashMap<AttributeHandle, Characteristic>,
    pub descriptors: HashMap<AttributeHandle, Descriptor>,
}

impl ConnectionContext {
    pub fn new(device: DeviceHandle, services: &BTreeSet<Service>) -> Self {
        let mut characteristics = HashMap::new();
        let mut descriptors = HashMap::new();
        for characteristic in services.iter().flat_map(|s| s.characteristics.iter()) {
            for descriptor in &characteristic.descriptors {
                descriptors.insert(descriptor.handle, descriptor.clone());
            }
            characteristics.insert(characteristic.handle, characteristic.clone());
        }
        ConnectionContext {
            device,
            characteristics,
            descriptors,
        }
    }
}

#[derive(Debug)]
pub struct AdapterManager<PeripheralType>
where
    PeripheralType: Peripheral,
{
    peripherals: DashMap<PeripheralId, PeripheralType>,
    connections: DashMap<PeripheralId, ConnectionContext>,
    events_channel: broadcast::Sender<CentralEvent>,
}

impl<PeripheralType> AdapterManager<PeripheralType>
where
    PeripheralType: Peripheral + 'static,
{
    pub fn new(event_capacity: usize) -> Self {
        let (broadcast_sender, _) = broadcast::channel(event_capacity.max(1));
        AdapterManager {
            peripherals: DashMap::new(),
            connections: DashMap::new(),
            events_channel: broadcast_sender,
        }
    }

    pub fn emit(&self, event: CentralEvent) {
        if let Err(lost) = self.events_channel.send(event) {
            trace!("Lost central event, while nothing subscribed: {:?}", lost);
        }
    }

    pub fn event_stream(&self) -> Pin<Box<dyn Stream<Item = CentralEvent> + Send>> {
        let receiver = self.events_channel.subscribe();
        Box::pin(BroadcastStream::new(receiver).filter_map(|x| async move { x.ok() }))
    }

    /// Inserts the peripheral unless one with the same id is already known. Returns whether
    /// it was added.
    pub fn add_peripheral(&self, peripheral: PeripheralType) -> bool {
        let id = peripheral.id();
        if self.peripherals.contains_key(&id) {
            return false;
        }
        self.peripherals.insert(id, peripheral);
        true
    }

    pub fn peripherals(&self) -> Vec<PeripheralType> {
        self.peripherals
            .iter()
            .map(|val| val.value().clone())
            .collect()
    }

    pub fn peripheral(&self, id: &PeripheralId) -> Option<PeripheralType> {
        self.peripherals.get(id).map(|val| val.value().clone())
    }

    pub fn set_connection(&self, id: PeripheralId, context: ConnectionContext) {
        self.connections.insert(id, context);
    }

    pub fn connection(&self, id: &PeripheralId) -> Option<Ref<PeripheralId, ConnectionContext>> {
        self.connections.get(id)
    }

    pub fn remove_connection(&self, id: &PeripheralId) -> Option<ConnectionContext> {
        self.connections.remove(id).map(|(_, context)| context)
    }
}
