// Copyright 2024 Kevin Ludwig
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Volume descriptors: the one-sector-each structures starting at sector
//! 16 that describe the volume as a whole.

use std::time::SystemTime;

use super::{push_both_u16, push_both_u32, push_descriptor_timestamp};
use crate::sector::SECTOR_SIZE;

const STANDARD_ID: &[u8; 5] = b"CD001";

/// The Joliet "UCS-2 Level 3" escape sequence that marks a supplementary
/// volume descriptor as the Joliet one rather than a generic ISO 9660
/// supplementary descriptor.
pub const JOLIET_ESCAPE_SEQUENCE: [u8; 3] = [0x25, 0x2F, 0x45];

fn pad_ascii(s: &str, len: usize) -> Vec<u8> {
    let mut bytes: Vec<u8> = s.bytes().take(len).collect();
    bytes.resize(len, b' ');
    bytes
}

fn pad_ucs2(s: &str, units: usize) -> Vec<u8> {
    let mut bytes = super::ucs2be(s);
    bytes.resize(units * 2, 0x00);
    // Joliet pads with spaces (U+0020), not NUL.
    for chunk in bytes.chunks_mut(2).skip(s.chars().count()) {
        chunk[0] = 0x00;
        chunk[1] = b' ';
    }
    bytes
}

pub struct TextFieldsParams<'a> {
    pub system_id: &'a str,
    pub volume_id: &'a str,
    pub volume_set_id: &'a str,
    pub publisher_id: &'a str,
    pub data_preparer_id: &'a str,
    pub application_id: &'a str,
    pub copyright_file_id: &'a str,
    pub abstract_file_id: &'a str,
    pub bibliographic_file_id: &'a str,
}

pub struct DescriptorParams<'a> {
    pub text: TextFieldsParams<'a>,
    pub volume_space_size: u32,
    pub path_table_size: u32,
    pub path_table_lsb: u32,
    pub path_table_msb: u32,
    pub opt_path_table_lsb: u32,
    pub opt_path_table_msb: u32,
    pub root_record: &'a [u8],
    pub creation_time: SystemTime,
}

fn build_common(kind: u8, params: &DescriptorParams, joliet: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SECTOR_SIZE as usize);
    buf.push(kind);
    buf.extend_from_slice(STANDARD_ID);
    buf.push(1); // version

    if joliet {
        buf.push(0); // unused in supplementary descriptor
    } else {
        buf.push(0); // unused
    }

    buf.extend_from_slice(&pad_ascii(params.text.system_id, 32));
    if joliet {
        buf.extend_from_slice(&pad_ucs2(params.text.volume_id, 16));
    } else {
        buf.extend_from_slice(&pad_ascii(params.text.volume_id, 32));
    }
    buf.extend_from_slice(&[0u8; 8]); // unused

    push_both_u32(&mut buf, params.volume_space_size);

    if joliet {
        buf.extend_from_slice(&JOLIET_ESCAPE_SEQUENCE);
        buf.extend_from_slice(&[0u8; 32 - 3]);
    } else {
        buf.extend_from_slice(&[0u8; 32]); // unused
    }

    push_both_u16(&mut buf, 1); // volume set size
    push_both_u16(&mut buf, 1); // volume sequence number
    push_both_u16(&mut buf, SECTOR_SIZE as u16); // logical block size
    push_both_u32(&mut buf, params.path_table_size);

    buf.extend_from_slice(&params.path_table_lsb.to_le_bytes());
    buf.extend_from_slice(&params.opt_path_table_lsb.to_le_bytes());
    buf.extend_from_slice(&params.path_table_msb.to_be_bytes());
    buf.extend_from_slice(&params.opt_path_table_msb.to_be_bytes());

    buf.extend_from_slice(params.root_record);
    buf.resize(buf.len().max(156 + 34), 0);

    if joliet {
        buf.extend_from_slice(&pad_ucs2(params.text.volume_set_id, 64));
        buf.extend_from_slice(&pad_ucs2(params.text.publisher_id, 64));
        buf.extend_from_slice(&pad_ucs2(params.text.data_preparer_id, 64));
        buf.extend_from_slice(&pad_ucs2(params.text.application_id, 64));
        buf.extend_from_slice(&pad_ucs2(params.text.copyright_file_id, 18));
        buf.extend_from_slice(&pad_ucs2(params.text.abstract_file_id, 18));
        buf.extend_from_slice(&pad_ucs2(params.text.bibliographic_file_id, 18));
    } else {
        buf.extend_from_slice(&pad_ascii(params.text.volume_set_id, 128));
        buf.extend_from_slice(&pad_ascii(params.text.publisher_id, 128));
        buf.extend_from_slice(&pad_ascii(params.text.data_preparer_id, 128));
        buf.extend_from_slice(&pad_ascii(params.text.application_id, 128));
        buf.extend_from_slice(&pad_ascii(params.text.copyright_file_id, 37));
        buf.extend_from_slice(&pad_ascii(params.text.abstract_file_id, 37));
        buf.extend_from_slice(&pad_ascii(params.text.bibliographic_file_id, 37));
    }

    push_descriptor_timestamp(&mut buf, Some(params.creation_time));
    push_descriptor_timestamp(&mut buf, Some(params.creation_time)); // modification
    push_descriptor_timestamp(&mut buf, None); // expiration: none
    push_descriptor_timestamp(&mut buf, None); // effective: none

    buf.push(1); // file structure version
    buf.push(0); // reserved

    buf.resize(SECTOR_SIZE as usize, 0);
    buf
}

pub fn build_primary(params: &DescriptorParams) -> Vec<u8> {
    build_common(1, params, false)
}

pub fn build_supplementary_joliet(params: &DescriptorParams) -> Vec<u8> {
    build_common(2, params, true)
}

pub fn build_set_terminator() -> Vec<u8> {
    let mut buf = Vec::with_capacity(SECTOR_SIZE as usize);
    buf.push(255);
    buf.extend_from_slice(STANDARD_ID);
    buf.push(1);
    buf.resize(SECTOR_SIZE as usize, 0);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> DescriptorParams<'static> {
        DescriptorParams {
            text: TextFieldsParams {
                system_id: "",
                volume_id: "MYDISC",
                volume_set_id: "",
                publisher_id: "",
                data_preparer_id: "",
                application_id: "",
                copyright_file_id: "",
                abstract_file_id: "",
                bibliographic_file_id: "",
            },
            volume_space_size: 100,
            path_table_size: 10,
            path_table_lsb: 18,
            path_table_msb: 20,
            opt_path_table_lsb: 0,
            opt_path_table_msb: 0,
            root_record: &[0u8; 34],
            creation_time: SystemTime::now(),
        }
    }

    #[test]
    fn primary_descriptor_is_one_sector() {
        let buf = build_primary(&params());
        assert_eq!(buf.len(), SECTOR_SIZE as usize);
        assert_eq!(buf[0], 1);
        assert_eq!(&buf[1..6], STANDARD_ID);
        assert_eq!(buf[6], 1);
    }

    #[test]
    fn set_terminator_type_is_255() {
        let buf = build_set_terminator();
        assert_eq!(buf[0], 255);
        assert_eq!(buf.len(), SECTOR_SIZE as usize);
    }

    #[test]
    fn joliet_descriptor_carries_escape_sequence() {
        let buf = build_supplementary_joliet(&params());
        assert_eq!(buf[0], 2);
        assert_eq!(&buf[88..91], &JOLIET_ESCAPE_SEQUENCE);
    }
}
