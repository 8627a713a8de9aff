// evoplug Source Code File
//
// Copyright 2020 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

pub mod adapter;
pub mod config;
pub mod manager;
pub mod peripheral;
mod quirks;

#[cfg(test)]
pub(crate) mod mock;
