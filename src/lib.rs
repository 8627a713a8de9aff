// evoplug Source Code File
//
// Copyright 2020 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! evoplug is a Bluetooth Low Energy (BLE) central module library for Cordova hosts. It drives
//! the host's evothings BLE plugin through an injected [`plugin::BlePlugin`] capability and
//! exposes it through the same kind of `Manager`/`Central`/`Peripheral` traits btleplug does.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use evoplug::api::{Central, CentralEvent, Manager as _, Peripheral as _};
//! use evoplug::platform::{AdapterConfig, Manager, Platform};
//! use evoplug::plugin::BlePlugin;
//! use futures::stream::StreamExt;
//! use std::sync::Arc;
//!
//! async fn run(plugin: Arc<dyn BlePlugin>) -> evoplug::Result<()> {
//!     let config = AdapterConfig {
//!         platform: Platform::Android,
//!         ..AdapterConfig::default()
//!     };
//!     let manager = Manager::new(plugin, config).await?;
//!     let central = manager.adapters().await?.remove(0);
//!     let mut events = central.events().await?;
//!     central.start_scan().await?;
//!
//!     while let Some(event) = events.next().await {
//!         if let CentralEvent::DeviceDiscovered(id) = event {
//!             let peripheral = central.peripheral(&id).await?;
//!             peripheral.connect().await?;
//!             for characteristic in peripheral.characteristics() {
//!                 println!("{}", characteristic);
//!             }
//!             peripheral.disconnect().await?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod advertisement;
pub mod api;
mod common;
mod evothings;
pub mod platform;
pub mod plugin;

use std::result;

/// The main error type returned by most methods in evoplug.
///
/// [`BlePlugin`](plugin::BlePlugin) implementations return it as well. `PermissionDenied`,
/// `NotSupported` and `Other` are never produced by evoplug itself; they exist for host
/// bridges to report missing Bluetooth permissions, calls the host plugin lacks, and
/// bridge-specific failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The host denied Bluetooth access.
    #[error("Permission denied")]
    PermissionDenied,

    #[error("Device not found")]
    DeviceNotFound,

    #[error("Not connected")]
    NotConnected,

    #[error("No such characteristic")]
    NoSuchCharacteristic,

    #[error("No such descriptor")]
    NoSuchDescriptor,

    #[error("Cannot find notify descriptor")]
    NotifyDescriptorMissing,

    /// The host plugin does not offer the requested call.
    #[error("The operation is not supported: {}", _0)]
    NotSupported(String),

    #[error("Plugin error: {}", _0)]
    Plugin(String),

    #[error("Invalid UUID: {0}")]
    Uuid(#[from] uuid::Error),

    #[error("Runtime Error: {}", _0)]
    RuntimeError(String),

    /// Any other failure of the host bridge.
    #[error("{}", _0)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Convenience type for a result using the evoplug [`Error`] type.
pub type Result<T> = result::Result<T, Error>;
