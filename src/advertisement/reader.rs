// evoplug Source Code File
//
// Copyright 2020 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Bounds-checked little-endian readers over advertisement bytes.

use std::fmt::Write;

fn window<const N: usize>(data: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    data.get(offset..end)?.try_into().ok()
}

/// Read a `u16` stored least-significant byte first. `None` if it would overrun `data`.
pub fn read_u16_le(data: &[u8], offset: usize) -> Option<u16> {
    window(data, offset).map(u16::from_le_bytes)
}

/// Read a `u32` stored least-significant byte first. `None` if it would overrun `data`.
pub fn read_u32_le(data: &[u8], offset: usize) -> Option<u32> {
    window(data, offset).map(u32::from_le_bytes)
}

/// Format the 16 bytes at `offset` as a dash-separated UUID string, in buffer order.
pub fn format_uuid(data: &[u8], offset: usize) -> Option<String> {
    let bytes: [u8; 16] = window(data, offset)?;
    let mut uuid = String::with_capacity(36);
    let mut pos = 0;
    for group in [4, 2, 2, 2, 6] {
        if pos > 0 {
            uuid.push('-');
        }
        for byte in &bytes[pos..pos + group] {
            // Writing to a String cannot fail.
            let _ = write!(uuid, "{:02x}", byte);
        }
        pos += group;
    }
    Some(uuid)
}
