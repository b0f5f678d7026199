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

//! Path table records: a flat listing of every directory with a parent
//! pointer, emitted once in LSB byte order and once in MSB byte order.

use std::collections::HashMap;

use zerocopy::{
    big_endian::{U16 as BeU16, U32 as BeU32},
    little_endian::{U16 as LeU16, U32 as LeU32},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

use super::ucs2be;
use crate::tree::{FileTree, Namespace, NodeId};

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
struct HeaderLsb {
    name_len: u8,
    ext_attr_len: u8,
    extent: LeU32,
    parent_num: LeU16,
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
struct HeaderMsb {
    name_len: u8,
    ext_attr_len: u8,
    extent: BeU32,
    parent_num: BeU16,
}

/// Records, in the order `dirs` lists them, to path-table index (the
/// standard numbers path-table entries starting at 1, root first).
pub fn number_dirs(dirs: &[NodeId]) -> HashMap<NodeId, u16> {
    dirs.iter()
        .enumerate()
        .map(|(i, &id)| (id, (i + 1) as u16))
        .collect()
}

/// Byte length this path table will occupy, both LSB and MSB copies being
/// the same size.
pub fn calc_size(tree: &FileTree, dirs: &[NodeId], namespace: Namespace) -> u64 {
    dirs.iter()
        .map(|&id| {
            let name_len = record_name(tree, id, namespace).len();
            8 + name_len + (name_len % 2)
        })
        .sum::<usize>() as u64
}

fn record_name(tree: &FileTree, id: NodeId, namespace: Namespace) -> Vec<u8> {
    if id == FileTree::ROOT {
        return vec![0u8];
    }
    let node = tree.node(id);
    match namespace {
        Namespace::Iso9660 => node.file_name_iso9660.as_bytes().to_vec(),
        Namespace::Joliet => ucs2be(&node.file_name_joliet),
        Namespace::Raw => unreachable!("path tables are never built in the raw namespace"),
    }
}

pub fn build(tree: &FileTree, dirs: &[NodeId], namespace: Namespace, lsb: bool) -> Vec<u8> {
    let numbering = number_dirs(dirs);
    let mut buf = Vec::new();

    for &id in dirs {
        let node = tree.node(id);
        let name = record_name(tree, id, namespace);
        let parent_num = node
            .parent
            .map(|p| *numbering.get(&p).expect("parent directory not in path table"))
            .unwrap_or(1);
        let extent = match namespace {
            Namespace::Joliet => node.data_pos_joliet,
            Namespace::Iso9660 => node.data_pos_normal,
            Namespace::Raw => unreachable!(),
        };

        if lsb {
            let header = HeaderLsb {
                name_len: name.len() as u8,
                ext_attr_len: 0,
                extent: extent.into(),
                parent_num: parent_num.into(),
            };
            buf.extend_from_slice(header.as_bytes());
        } else {
            let header = HeaderMsb {
                name_len: name.len() as u8,
                ext_attr_len: 0,
                extent: extent.into(),
                parent_num: parent_num.into(),
            };
            buf.extend_from_slice(header.as_bytes());
        }
        buf.extend_from_slice(&name);
        if name.len() % 2 == 1 {
            buf.push(0);
        }
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{FileDescriptor, FileSet};

    #[test]
    fn root_record_has_single_null_byte_name() {
        let tree = FileTree::build(&FileSet::new()).unwrap();
        let dirs = vec![FileTree::ROOT];
        let bytes = build(&tree, &dirs, Namespace::Iso9660, true);
        assert_eq!(bytes.len(), 10); // 8-byte header + 1-byte name + 1 pad
        assert_eq!(bytes[8], 0);
    }

    #[test]
    fn lsb_and_msb_sizes_match() {
        let tree = FileTree::build(&vec![FileDescriptor::directory("/docs")]).unwrap();
        let dirs = tree.depth_ordered_dirs();
        let lsb = build(&tree, &dirs, Namespace::Iso9660, true);
        let msb = build(&tree, &dirs, Namespace::Iso9660, false);
        assert_eq!(lsb.len(), msb.len());
    }
}
