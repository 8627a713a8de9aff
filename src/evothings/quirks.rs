// evoplug Source Code File
//
// Copyright 2020 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Per-platform workarounds for the plugin's notification handling.

use super::config::Platform;
use crate::api::bleuuid::uuid_from_u16;
use uuid::Uuid;

/// Client Characteristic Configuration Descriptor.
pub(crate) const CCCD_UUID: Uuid = uuid_from_u16(0x2902);

/// CCCD value that turns notifications on.
pub(crate) const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum NotifyStrategy {
    /// Calls are forwarded unchanged.
    Plain,
    /// The plugin does not configure the CCCD itself, so it has to be written before
    /// notifications are enabled.
    WriteCccd,
    /// The plugin silently drops a notification registration when the characteristic is read,
    /// and never completes a disable request.
    Rearm,
}

impl From<Platform> for NotifyStrategy {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Android => NotifyStrategy::WriteCccd,
            Platform::Ios => NotifyStrategy::Rearm,
            Platform::Other => NotifyStrategy::Plain,
        }
    }
}

impl NotifyStrategy {
    pub fn writes_cccd(self) -> bool {
        self == NotifyStrategy::WriteCccd
    }

    pub fn rearms_after_read(self) -> bool {
        self == NotifyStrategy::Rearm
    }

    pub fn awaits_disable(self) -> bool {
        self != NotifyStrategy::Rearm
    }
}
