//! The `platform` module contains the plugin-backed implementations of the various [`api`]
//! traits. Refer for the `api` module for how to use them.

pub use crate::evothings::{
    adapter::Adapter,
    config::{AdapterConfig, Platform},
    manager::Manager,
    peripheral::{Peripheral, PeripheralId},
};

use crate::api::{self, Central};
use static_assertions::assert_impl_all;
use std::{
    fmt::{Debug, Display},
    hash::Hash,
};

// Ensure that the exported types implement all the expected traits.
assert_impl_all!(Adapter: Central, Clone, Debug, Send, Sized, Sync);
assert_impl_all!(Manager: api::Manager, Clone, Debug, Send, Sized, Sync);
assert_impl_all!(Peripheral: api::Peripheral, Clone, Debug, Send, Sized, Sync);
assert_impl_all!(
    PeripheralId: Clone,
    Debug,
    Display,
    Hash,
    Eq,
    Ord,
    PartialEq,
    PartialOrd,
    Send,
    Sized,
    Sync
);
