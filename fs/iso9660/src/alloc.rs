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

//! A single-pass, append-only allocator over the logical-sector address
//! space. Every region of the image (volume descriptors, path tables,
//! directory extents, boot data, file data) is handed a sector range by
//! exactly one call into this type, in the fixed order the writer phases
//! run in.

use std::collections::HashMap;

use crate::{
    error::{DataError, Result},
    sector::SECTOR_SIZE,
};

/// Named, singleton regions that a later phase needs to look back up by
/// key (as opposed to per-node directory/file extents, whose start sector
/// is stored directly on the tree node that owns them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Iso9660Header,
    UdfHeader,
    Iso9660PathTableLsb,
    Iso9660PathTableMsb,
    JolietPathTableLsb,
    JolietPathTableMsb,
    BootCatalog,
    BootImageData(usize),
    UdfPartition,
}

pub struct SectorManager {
    next_free: u32,
    regions: HashMap<Region, (u32, u32)>,
    data_start: u32,
    data_length: u32,
}

impl SectorManager {
    pub fn new(start_sector: u32) -> Self {
        Self {
            next_free: start_sector,
            regions: HashMap::new(),
            data_start: 0,
            data_length: 0,
        }
    }

    pub fn next_free(&self) -> u32 {
        self.next_free
    }

    /// Reserves `n_sectors` sectors with no attached lookup key; used for
    /// per-node directory and file extents, whose location the caller
    /// stores directly on the owning [`crate::tree::FileTreeNode`].
    pub fn allocate_sectors_anon(&mut self, n_sectors: u32) -> u32 {
        let start = self.next_free;
        self.next_free += n_sectors;
        start
    }

    pub fn allocate_bytes_anon(&mut self, n_bytes: u64) -> u32 {
        self.allocate_sectors_anon(sectors_for_bytes(n_bytes))
    }

    /// Reserves sectors for a named region, recording the start so it can
    /// be looked up again with [`Self::start`].
    pub fn allocate_sectors(&mut self, region: Region, n_sectors: u32) -> u32 {
        let start = self.allocate_sectors_anon(n_sectors);
        self.regions.insert(region, (start, n_sectors));
        start
    }

    pub fn allocate_bytes(&mut self, region: Region, n_bytes: u64) -> u32 {
        self.allocate_sectors(region, sectors_for_bytes(n_bytes))
    }

    pub fn allocate_data_sectors(&mut self, n_sectors: u32) {
        debug_assert_eq!(self.data_length, 0, "file data region allocated twice");
        self.data_start = self.next_free;
        self.data_length = n_sectors;
        self.next_free += n_sectors;
    }

    /// Records the file-data region's bounds after its sectors were
    /// already reserved one file at a time via
    /// [`Self::allocate_sectors_anon`] (so each file's own padding rules
    /// could be applied individually), rather than in the single
    /// up-front call [`Self::allocate_data_sectors`] makes.
    pub fn mark_data_region(&mut self, start: u32) {
        debug_assert_eq!(self.data_length, 0, "file data region marked twice");
        self.data_start = start;
        self.data_length = self.next_free - start;
    }

    pub fn start(&self, region: Region) -> Result<u32> {
        self.regions
            .get(&region)
            .map(|(start, _)| *start)
            .ok_or(DataError::UnknownRegion.into())
    }

    pub fn len_sectors(&self, region: Region) -> Result<u32> {
        self.regions
            .get(&region)
            .map(|(_, len)| *len)
            .ok_or(DataError::UnknownRegion.into())
    }

    pub fn data_start(&self) -> u32 {
        self.data_start
    }

    pub fn data_length(&self) -> u32 {
        self.data_length
    }
}

pub fn sectors_for_bytes(n_bytes: u64) -> u32 {
    n_bytes.div_ceil(SECTOR_SIZE) as u32
}
