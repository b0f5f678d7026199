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

//! DVD-Video only needs one thing from this crate beyond plain ISO 9660 +
//! UDF: its `.VOB` streams must end on an ECC block boundary (16 sectors,
//! 32 KiB) so a player's block-interleaved reads never straddle two
//! files. This computes that trailing padding; it does not read or
//! validate IFO navigation data.

use crate::{sector::SECTOR_SIZE, tree::FileTree};

const ECC_BLOCK_SECTORS: u64 = 16;

/// Sets `data_pad_len` on every `.VOB` node so its extent, once placed,
/// ends exactly on an ECC block boundary.
pub fn pad_vob_files(tree: &mut FileTree) {
    let ids: Vec<_> = tree
        .preorder()
        .into_iter()
        .map(|(id, _)| id)
        .filter(|&id| !tree.node(id).is_dir())
        .collect();

    for id in ids {
        let node = tree.node(id);
        if !node.file_name.to_ascii_uppercase().ends_with(".VOB") {
            continue;
        }
        let sectors = node.file_size.div_ceil(SECTOR_SIZE);
        let padded = sectors.div_ceil(ECC_BLOCK_SECTORS) * ECC_BLOCK_SECTORS;
        let pad_sectors = padded - sectors;
        tree.node_mut(id).data_pad_len = pad_sectors as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::FileDescriptor;

    #[test]
    fn pads_vob_up_to_ecc_block() {
        let mut tree =
            FileTree::build(&vec![FileDescriptor::file("/video_ts/vts_01_1.vob", "/tmp/v.vob")])
                .unwrap();
        let id = tree.node(FileTree::ROOT).children[0];
        tree.node_mut(id).file_size = SECTOR_SIZE * 3; // 3 sectors, not block-aligned
        pad_vob_files(&mut tree);
        assert_eq!(tree.node(id).data_pad_len, 13); // pad to 16
    }

    #[test]
    fn leaves_non_vob_files_alone() {
        let mut tree =
            FileTree::build(&vec![FileDescriptor::file("/video_ts/video_ts.ifo", "/tmp/v.ifo")])
                .unwrap();
        let id = tree.node(FileTree::ROOT).children[0];
        pad_vob_files(&mut tree);
        assert_eq!(tree.node(id).data_pad_len, 0);
    }
}
