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

//! Directory records: the per-entry structure packed into a directory's
//! extent. Every multi-byte numeric field is "both-endian" (little-endian
//! then big-endian back to back), a layout zerocopy has no single wrapper
//! type for, so records are packed by hand.

use super::{push_both_u16, push_both_u32};

pub mod flags {
    pub const HIDDEN: u8 = 1 << 0;
    pub const DIRECTORY: u8 = 1 << 1;
    pub const ASSOCIATED_FILE: u8 = 1 << 2;
    pub const MULTI_EXTENT: u8 = 1 << 7;
}

/// Fixed bytes preceding the name in every directory record.
pub const FIXED_HEADER_LEN: usize = 33;

pub struct DirRecordFields<'a> {
    pub extent: u32,
    pub data_len: u32,
    pub timestamp: [u8; 7],
    pub file_flags: u8,
    pub file_unit_size: u8,
    pub interleave_gap_size: u8,
    pub volume_sequence_number: u16,
    pub name: &'a [u8],
}

/// Total record length, in bytes, `name` will occupy once built,
/// including the trailing padding byte when the name length is odd.
pub fn calc_len(name_len: usize) -> usize {
    let len = FIXED_HEADER_LEN + name_len;
    len + (len % 2)
}

pub fn build(fields: &DirRecordFields) -> Vec<u8> {
    let len = calc_len(fields.name.len());
    let mut buf = Vec::with_capacity(len);

    buf.push(len as u8);
    buf.push(0); // extended attribute record length; unused.
    push_both_u32(&mut buf, fields.extent);
    push_both_u32(&mut buf, fields.data_len);
    buf.extend_from_slice(&fields.timestamp);
    buf.push(fields.file_flags);
    buf.push(fields.file_unit_size);
    buf.push(fields.interleave_gap_size);
    push_both_u16(&mut buf, fields.volume_sequence_number);
    buf.push(fields.name.len() as u8);
    buf.extend_from_slice(fields.name);
    if fields.name.len() % 2 == 1 {
        buf.push(0);
    }

    debug_assert_eq!(buf.len(), len);
    buf
}

/// Builds the fixed `.`/`..` self/parent records that open every
/// directory's extent: a one-byte name (`0x00` or `0x01`), always 34
/// bytes total.
pub fn build_dot(extent: u32, data_len: u32, timestamp: [u8; 7], parent: bool) -> Vec<u8> {
    build(&DirRecordFields {
        extent,
        data_len,
        timestamp,
        file_flags: flags::DIRECTORY,
        file_unit_size: 0,
        interleave_gap_size: 0,
        volume_sequence_number: 1,
        name: &[if parent { 1 } else { 0 }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_record_is_34_bytes() {
        let rec = build_dot(16, 2048, [0; 7], false);
        assert_eq!(rec.len(), 34);
        assert_eq!(rec[0], 34);
        assert_eq!(rec[33], 0); // name byte, 0x00 for self
    }

    #[test]
    fn odd_name_length_gets_padded() {
        let rec = build(&DirRecordFields {
            extent: 1,
            data_len: 2048,
            timestamp: [0; 7],
            file_flags: 0,
            file_unit_size: 0,
            interleave_gap_size: 0,
            volume_sequence_number: 1,
            name: b"A.TXT;1",
        });
        assert_eq!(rec.len(), FIXED_HEADER_LEN + 7 + 1);
        assert_eq!(rec.len() % 2, 0);
    }
}
