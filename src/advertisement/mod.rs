// evoplug Source Code File
//
// Copyright 2020 Nonpolynomial Labs LLC. All rights reserved.
//
// Licensed under the BSD 3-Clause license. See LICENSE file in the project root
// for full license information.

//! Parsing of advertisement payloads as the plugin reports them.
//!
//! iOS hands over CoreBluetooth's already-decoded advertisement dictionary, while Android
//! hands over the raw GAP advertisement as a base64 string. Both are normalised into an
//! [`AdvertisementRecord`] whose service UUIDs are always in full 128-bit form.
//!
//! Advertisements come from untrusted radio input, so parsing never fails: malformed base64
//! decodes leniently and a truncated TLV stream yields whatever was read before the fault.

pub mod base64;
pub mod reader;

use crate::api::bleuuid::{expand_short_uuid, uuid_from_u16, uuid_from_u32};
use log::trace;
use reader::{format_uuid, read_u16_le, read_u32_le};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "serde")]
use serde_cr as serde;

/// GAP advertising data types understood by the parser.
pub mod ad_type {
    pub const INCOMPLETE_LIST_16_BIT_SERVICE_UUIDS: u8 = 0x02;
    pub const COMPLETE_LIST_16_BIT_SERVICE_UUIDS: u8 = 0x03;
    pub const INCOMPLETE_LIST_32_BIT_SERVICE_UUIDS: u8 = 0x04;
    pub const COMPLETE_LIST_32_BIT_SERVICE_UUIDS: u8 = 0x05;
    pub const INCOMPLETE_LIST_128_BIT_SERVICE_UUIDS: u8 = 0x06;
    pub const COMPLETE_LIST_128_BIT_SERVICE_UUIDS: u8 = 0x07;
    pub const SHORTENED_LOCAL_NAME: u8 = 0x08;
    pub const COMPLETE_LOCAL_NAME: u8 = 0x09;
}

// 128-bit UUID lists are walked 4 bytes at a time while each step reads a full 16-byte
// window. Deployed adapters behave this way, so it is kept until checked against captures.
const UUID_128_STRIDE: usize = 4;

/// Advertisement data as delivered by the plugin.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawAdvertisement {
    /// Pre-decoded advertisement fields (iOS `advertisementData`).
    Structured {
        local_name: Option<String>,
        service_uuids: Vec<String>,
    },
    /// Base64 encoded GAP advertisement (Android `scanRecord`).
    Encoded(String),
}

/// The parts of an advertisement used for device discovery.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_cr")
)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AdvertisementRecord {
    pub name: Option<String>,
    /// Canonical lowercase 128-bit UUID strings in the order they were advertised.
    pub service_uuids: Vec<String>,
}

impl RawAdvertisement {
    pub fn parse(&self) -> AdvertisementRecord {
        parse_advertisement(self)
    }
}

/// Normalise a raw advertisement into an [`AdvertisementRecord`].
pub fn parse_advertisement(raw: &RawAdvertisement) -> AdvertisementRecord {
    match raw {
        RawAdvertisement::Structured {
            local_name,
            service_uuids,
        } => AdvertisementRecord {
            name: local_name.clone().filter(|name| !name.is_empty()),
            service_uuids: service_uuids.iter().map(|s| expand_short_uuid(s)).collect(),
        },
        RawAdvertisement::Encoded(scan_record) => parse_scan_record(&base64::decode(scan_record)),
    }
}

/// Walk a decoded GAP advertisement as a sequence of length/type/value records.
pub fn parse_scan_record(data: &[u8]) -> AdvertisementRecord {
    let mut record = AdvertisementRecord::default();
    let mut pos = 0;
    while pos < data.len() {
        let length = data[pos] as usize;
        pos += 1;
        if length == 0 {
            break;
        }
        let length = length - 1;
        let Some(&ad_type) = data.get(pos) else {
            trace!("Advertisement truncated before AD type at offset {}", pos);
            break;
        };
        pos += 1;

        if parse_field(ad_type, data, pos, length, &mut record).is_none() {
            trace!(
                "Advertisement field 0x{:02x} at offset {} overruns {} bytes, stopping",
                ad_type,
                pos,
                data.len()
            );
            break;
        }
        pos += length;
    }
    record
}

// Returns None when the field reads past the end of `data`.
fn parse_field(
    ad_type: u8,
    data: &[u8],
    pos: usize,
    length: usize,
    record: &mut AdvertisementRecord,
) -> Option<()> {
    use ad_type::*;

    match ad_type {
        INCOMPLETE_LIST_16_BIT_SERVICE_UUIDS | COMPLETE_LIST_16_BIT_SERVICE_UUIDS => {
            for i in (0..length).step_by(2) {
                let short = read_u16_le(data, pos + i)?;
                record.service_uuids.push(uuid_from_u16(short).to_string());
            }
        }
        INCOMPLETE_LIST_32_BIT_SERVICE_UUIDS | COMPLETE_LIST_32_BIT_SERVICE_UUIDS => {
            for i in (0..length).step_by(4) {
                let short = read_u32_le(data, pos + i)?;
                record.service_uuids.push(uuid_from_u32(short).to_string());
            }
        }
        INCOMPLETE_LIST_128_BIT_SERVICE_UUIDS | COMPLETE_LIST_128_BIT_SERVICE_UUIDS => {
            for i in (0..length).step_by(UUID_128_STRIDE) {
                record.service_uuids.push(format_uuid(data, pos + i)?);
            }
        }
        SHORTENED_LOCAL_NAME | COMPLETE_LOCAL_NAME => {
            let value = data.get(pos..pos.checked_add(length)?)?;
            // Only the first NUL is dropped, as plugin adapters in the field do.
            record.name = Some(String::from_utf8_lossy(value).replacen('\0', "", 1));
        }
        _ => trace!("Skipping advertisement field 0x{:02x}", ad_type),
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::base64::{engine::general_purpose::STANDARD, Engine as _};

    fn encoded(bytes: &[u8]) -> AdvertisementRecord {
        parse_advertisement(&RawAdvertisement::Encoded(STANDARD.encode(bytes)))
    }

    #[test]
    fn structured_short_uuid_is_expanded() {
        let record = parse_advertisement(&RawAdvertisement::Structured {
            local_name: None,
            service_uuids: vec!["180d".into()],
        });
        assert_eq!(
            record.service_uuids,
            vec!["0000180d-0000-1000-8000-00805f9b34fb".to_string()]
        );
        assert_eq!(record.name, None);
    }

    #[test]
    fn structured_full_uuid_is_only_lowercased() {
        let record = parse_advertisement(&RawAdvertisement::Structured {
            local_name: Some("Heart Rate".into()),
            service_uuids: vec![
                "6E400001-B5A3-F393-E0A9-E50E24DCCA9E".into(),
                "FEE0".into(),
                "1234ABCD".into(),
            ],
        });
        assert_eq!(record.name.as_deref(), Some("Heart Rate"));
        assert_eq!(
            record.service_uuids,
            vec![
                "6e400001-b5a3-f393-e0a9-e50e24dcca9e".to_string(),
                "0000fee0-0000-1000-8000-00805f9b34fb".to_string(),
                "1234abcd-0000-1000-8000-00805f9b34fb".to_string(),
            ]
        );
    }

    #[test]
    fn local_name_field() {
        let record = encoded(&[0x03, 0x09, b'A', b'B', 0x00]);
        assert_eq!(record.name.as_deref(), Some("AB"));
        assert!(record.service_uuids.is_empty());
    }

    #[test]
    fn local_name_strips_first_nul() {
        let record = encoded(&[0x05, 0x08, b'A', 0x00, b'B', 0x00]);
        assert_eq!(record.name.as_deref(), Some("AB\0"));

        let record = parse_scan_record(&[0x05, 0x09, b'A', 0x00, b'B', 0x00]);
        assert_eq!(record.name.as_deref(), Some("AB\0"));
    }

    #[test]
    fn structured_empty_name_is_missing() {
        let record = parse_advertisement(&RawAdvertisement::Structured {
            local_name: Some(String::new()),
            service_uuids: vec![],
        });
        assert_eq!(record.name, None);
    }

    #[test]
    fn last_local_name_wins() {
        let record = encoded(&[0x02, 0x08, b'A', 0x03, 0x09, b'B', b'C']);
        assert_eq!(record.name.as_deref(), Some("BC"));
    }

    #[test]
    fn uuid16_list() {
        let record = encoded(&[0x03, 0x03, 0x0d, 0x18]);
        assert_eq!(
            record.service_uuids,
            vec!["0000180d-0000-1000-8000-00805f9b34fb".to_string()]
        );

        let record = encoded(&[0x05, 0x02, 0x0d, 0x18, 0x0f, 0x18]);
        assert_eq!(
            record.service_uuids,
            vec![
                "0000180d-0000-1000-8000-00805f9b34fb".to_string(),
                "0000180f-0000-1000-8000-00805f9b34fb".to_string(),
            ]
        );
    }

    #[test]
    fn uuid16_small_values_are_padded_to_eight_digits() {
        let record = encoded(&[0x03, 0x03, 0x0d, 0x00]);
        assert_eq!(
            record.service_uuids,
            vec!["0000000d-0000-1000-8000-00805f9b34fb".to_string()]
        );
    }

    #[test]
    fn uuid32_list() {
        let record = encoded(&[0x05, 0x05, 0x44, 0x33, 0x22, 0x11]);
        assert_eq!(
            record.service_uuids,
            vec!["11223344-0000-1000-8000-00805f9b34fb".to_string()]
        );
    }

    #[test]
    fn uuid128_list_uses_four_byte_stride() {
        let mut payload = vec![0x11, 0x07];
        payload.extend(0u8..16);
        payload.extend([0xaa; 12]);
        let record = encoded(&payload);
        assert_eq!(
            record.service_uuids,
            vec![
                "00010203-0405-0607-0809-0a0b0c0d0e0f".to_string(),
                "04050607-0809-0a0b-0c0d-0e0faaaaaaaa".to_string(),
                "08090a0b-0c0d-0e0f-aaaa-aaaaaaaaaaaa".to_string(),
                "0c0d0e0f-aaaa-aaaa-aaaa-aaaaaaaaaaaa".to_string(),
            ]
        );
    }

    #[test]
    fn uuid128_window_past_end_stops_scan() {
        let mut payload = vec![0x11, 0x06];
        payload.extend(0u8..16);
        let record = encoded(&payload);
        assert_eq!(
            record.service_uuids,
            vec!["00010203-0405-0607-0809-0a0b0c0d0e0f".to_string()]
        );
    }

    #[test]
    fn mixed_fields_in_discovery_order() {
        let record = encoded(&[
            0x02, 0x01, 0x06, // flags, ignored
            0x03, 0x03, 0x0d, 0x18, //
            0x05, 0x09, b'H', b'R', b'M', b'1', //
            0x03, 0x02, 0x0d, 0x18, // duplicates are kept
            0x00, 0x00, 0x00,
        ]);
        assert_eq!(record.name.as_deref(), Some("HRM1"));
        assert_eq!(
            record.service_uuids,
            vec![
                "0000180d-0000-1000-8000-00805f9b34fb".to_string(),
                "0000180d-0000-1000-8000-00805f9b34fb".to_string(),
            ]
        );
    }

    #[test]
    fn zero_length_terminates() {
        let record = encoded(&[0x00, 0x03, 0x09, b'A', b'B']);
        assert_eq!(record, AdvertisementRecord::default());
    }

    #[test]
    fn empty_and_garbage_payloads() {
        assert_eq!(encoded(&[]), AdvertisementRecord::default());
        assert_eq!(
            parse_advertisement(&RawAdvertisement::Encoded("!!!".into())),
            AdvertisementRecord::default()
        );
    }

    #[test]
    fn truncated_fields_keep_earlier_results() {
        // Name claims 9 bytes but only 2 remain.
        let record = encoded(&[0x03, 0x03, 0x0d, 0x18, 0x0a, 0x09, b'A', b'B']);
        assert_eq!(record.name, None);
        assert_eq!(record.service_uuids.len(), 1);

        // Length byte with no type byte after it.
        let record = encoded(&[0x03, 0x03, 0x0d, 0x18, 0x05]);
        assert_eq!(record.service_uuids.len(), 1);

        // Odd 16-bit list length reads one byte past the value and then runs out.
        let record = encoded(&[0x04, 0x03, 0x0d, 0x18, 0x0f]);
        assert_eq!(
            record.service_uuids,
            vec!["0000180d-0000-1000-8000-00805f9b34fb".to_string()]
        );
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let record = encoded(&[0x04, 0xff, 0x4c, 0x00, 0x02, 0x03, 0x09, b'X', b'Y']);
        assert_eq!(record.name.as_deref(), Some("XY"));
    }
}
