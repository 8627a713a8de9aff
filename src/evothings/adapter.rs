// evoplug Source Code File
//
// Copyright 2020 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use super::{
    config::AdapterConfig,
    peripheral::{Peripheral, PeripheralId},
    quirks::NotifyStrategy,
};
use crate::{
    api::{Central, CentralEvent},
    common::adapter_manager::AdapterManager,
    plugin::{BlePlugin, ScanResult},
    Error, Result,
};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use log::{debug, trace};
use std::{
    fmt::{self, Debug, Formatter},
    pin::Pin,
    sync::{Arc, Mutex},
};
use tokio::task::JoinHandle;

/// Implementation of [api::Central](crate::api::Central).
#[derive(Clone)]
pub struct Adapter {
    manager: Arc<AdapterManager<Peripheral>>,
    plugin: Arc<dyn BlePlugin>,
    config: AdapterConfig,
    strategy: NotifyStrategy,
    scan_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Debug for Adapter {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("manager", &self.manager)
            .field("config", &self.config)
            .finish()
    }
}

impl Adapter {
    pub(crate) fn new(plugin: Arc<dyn BlePlugin>, config: AdapterConfig) -> Self {
        Adapter {
            manager: Arc::new(AdapterManager::new(config.event_capacity)),
            plugin,
            strategy: NotifyStrategy::from(config.platform),
            config,
            scan_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Records one scan callback, announcing the peripheral as discovered the first time its
    /// address is seen and as updated afterwards.
    pub(crate) fn report_scan_result(&self, result: ScanResult) -> Peripheral {
        let id = PeripheralId::from(result.address.clone());
        let properties = result.properties();
        trace!("Scan result for {}: {:?}", id, properties);

        if let Some(peripheral) = self.manager.peripheral(&id) {
            peripheral.update_properties(properties);
            self.manager.emit(CentralEvent::DeviceUpdated(id));
            return peripheral;
        }

        let peripheral = Peripheral::new(
            Arc::downgrade(&self.manager),
            self.plugin.clone(),
            self.strategy,
            self.config.notification_capacity,
            properties,
        );
        if self.manager.add_peripheral(peripheral.clone()) {
            debug!("Discovered {}", peripheral);
            self.manager.emit(CentralEvent::DeviceDiscovered(id));
            peripheral
        } else {
            // Lost a race with another report for the same address.
            self.manager.peripheral(&id).unwrap_or(peripheral)
        }
    }
}

#[async_trait]
impl Central for Adapter {
    type Peripheral = Peripheral;

    async fn events(&self) -> Result<Pin<Box<dyn Stream<Item = CentralEvent> + Send>>> {
        Ok(self.manager.event_stream())
    }

    async fn start_scan(&self) -> Result<()> {
        let mut results = self.plugin.start_scan().await?;
        debug!("Scan started");
        let adapter = self.clone();
        let task = tokio::spawn(async move {
            while let Some(result) = results.next().await {
                adapter.report_scan_result(result);
            }
            trace!("Scan result stream ended");
        });
        let previous = self.scan_task.lock().unwrap().replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        let task = self.scan_task.lock().unwrap().take();
        if let Some(task) = task {
            task.abort();
        }
        self.plugin.stop_scan().await?;
        debug!("Scan stopped");
        Ok(())
    }

    async fn peripherals(&self) -> Result<Vec<Peripheral>> {
        Ok(self.manager.peripherals())
    }

    async fn peripheral(&self, id: &PeripheralId) -> Result<Peripheral> {
        self.manager.peripheral(id).ok_or(Error::DeviceNotFound)
    }

    async fn adapter_info(&self) -> Result<String> {
        Ok(format!("evothings ({:?})", self.config.platform))
    }
}
