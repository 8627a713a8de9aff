// evoplug Source Code File
//
// Copyright 2020 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

use super::{adapter::Adapter, config::AdapterConfig};
use crate::{api, plugin::BlePlugin, Result};
use async_trait::async_trait;
use log::info;
use std::sync::Arc;

/// Implementation of [api::Manager](crate::api::Manager).
#[derive(Clone, Debug)]
pub struct Manager {
    adapter: Adapter,
}

impl Manager {
    /// Waits for the host plugin to become ready and wraps it in a single adapter.
    pub async fn new(plugin: Arc<dyn BlePlugin>, config: AdapterConfig) -> Result<Self> {
        plugin.ready().await?;
        info!("BLE plugin ready, platform {:?}", config.platform);
        Ok(Manager {
            adapter: Adapter::new(plugin, config),
        })
    }
}

#[async_trait]
impl api::Manager for Manager {
    type Adapter = Adapter;

    async fn adapters(&self) -> Result<Vec<Adapter>> {
        Ok(vec![self.adapter.clone()])
    }
}
