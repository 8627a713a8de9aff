// evoplug Source Code File
//
// Copyright 2020 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Lenient base64 decoding for plugin-supplied scan records.
//!
//! The decoder never fails: characters outside the standard alphabet are stripped before
//! decoding, and a truncated final group is flushed with whatever bits it carries.

use std::num::NonZeroUsize;

/// Map a base64 alphabet character to its 6-bit value. Anything else maps to 0.
fn sextet(c: u8) -> u32 {
    match c {
        b'A'..=b'Z' => (c - b'A') as u32,
        b'a'..=b'z' => (c - b'a') as u32 + 26,
        b'0'..=b'9' => (c - b'0') as u32 + 52,
        b'+' => 62,
        b'/' => 63,
        _ => 0,
    }
}

fn is_alphabet(c: &u8) -> bool {
    c.is_ascii_alphanumeric() || *c == b'+' || *c == b'/'
}

/// Decode `input`, ignoring every character outside `[A-Za-z0-9+/]`.
pub fn decode(input: &str) -> Vec<u8> {
    decode_blocks(input, None)
}

/// Like [`decode`], but rounds the output length up to a multiple of `block_size`. The
/// extra bytes are zero.
pub fn decode_blocks(input: &str, block_size: Option<NonZeroUsize>) -> Vec<u8> {
    let encoded: Vec<u8> = input.bytes().filter(is_alphabet).collect();
    let in_len = encoded.len();
    let decoded_len = (in_len * 3 + 1) >> 2;
    let out_len = match block_size {
        Some(block) => decoded_len.div_ceil(block.get()) * block.get(),
        None => decoded_len,
    };

    let mut out = vec![0u8; out_len];
    let mut out_idx = 0;
    let mut group: u32 = 0;
    for (in_idx, c) in encoded.iter().enumerate() {
        let mod4 = in_idx & 3;
        group |= sextet(*c) << (18 - 6 * mod4);
        if mod4 == 3 || in_len - in_idx == 1 {
            for shift in [16, 8, 0] {
                if out_idx >= out_len {
                    break;
                }
                out[out_idx] = (group >> shift) as u8;
                out_idx += 1;
            }
            group = 0;
        }
    }
    out
}
