// evoplug Source Code File
//
// Copyright 2020 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "serde")]
use serde_cr as serde;

/// The platform the host plugin runs on. Some plugin builds need platform specific handling
/// around notifications, which is chosen from this once when the adapter is created.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr", rename_all = "lowercase")
)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Platform {
    Android,
    Ios,
    #[default]
    Other,
}

/// Settings for an [`Adapter`](crate::platform::Adapter).
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr", default)
)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AdapterConfig {
    pub platform: Platform,
    /// Capacity of the central event channel. Slow subscribers miss events beyond this.
    pub event_capacity: usize,
    /// Capacity of each peripheral's notification channel.
    pub notification_capacity: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        AdapterConfig {
            platform: Platform::Other,
            event_capacity: 16,
            notification_capacity: 16,
        }
    }
}
