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

//! The El Torito boot record: a boot volume descriptor at sector 17
//! pointing at a boot catalog, which in turn lists one entry per
//! configured boot image.

use crate::{
    alloc::{sectors_for_bytes, Region, SectorManager},
    error::Result,
    interfaces::InStream,
    options::{BootImage, BootMediaType},
    sector::{SectorOutStream, SECTOR_SIZE},
};

const BOOT_SYSTEM_ID: &[u8; 23] = b"EL TORITO SPECIFICATION";

pub struct ElTorito {
    images: Vec<(BootImage, u64)>, // (config, byte length of its data)
}

impl ElTorito {
    pub fn new(images: &[BootImage], sizes: &[u64]) -> Self {
        Self {
            images: images.iter().cloned().zip(sizes.iter().copied()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Allocates the boot catalog (always one sector) and each boot
    /// image's data, returning the catalog's sector for the boot record.
    pub fn allocate(&self, alloc: &mut SectorManager) -> Result<()> {
        alloc.allocate_sectors(Region::BootCatalog, 1);
        for (i, (_, size)) in self.images.iter().enumerate() {
            alloc.allocate_sectors(Region::BootImageData(i), sectors_for_bytes(*size));
        }
        Ok(())
    }

    pub fn write_catalog(&self, alloc: &SectorManager, out: &mut SectorOutStream) -> Result<()> {
        let mut buf = Vec::with_capacity(SECTOR_SIZE as usize);

        // Validation entry.
        buf.push(1); // header id
        buf.push(0); // platform id: x86
        buf.extend_from_slice(&[0u8; 2]); // reserved
        buf.extend_from_slice(&[0u8; 24]); // id string, unused
        buf.extend_from_slice(&checksum_placeholder());
        buf.push(0x55);
        buf.push(0xAA);

        for (i, (image, _)) in self.images.iter().enumerate() {
            buf.push(0x88); // bootable
            buf.push(media_type_byte(image.media_type));
            buf.extend_from_slice(&image.load_segment.to_le_bytes());
            buf.push(0); // system type, copied from the image's partition table in a real build
            buf.push(0); // unused
            buf.extend_from_slice(&image.sector_count.to_le_bytes());
            let start = alloc.start(Region::BootImageData(i))?;
            buf.extend_from_slice(&start.to_le_bytes());
            buf.extend_from_slice(&[0u8; 20]); // unused
        }

        buf.resize(SECTOR_SIZE as usize, 0);
        out.write(&buf)
    }

    pub fn write_image_data(
        &self,
        index: usize,
        source: &mut dyn InStream,
        out: &mut SectorOutStream,
    ) -> Result<()> {
        source.open()?;
        let mut buf = [0u8; 65536];
        loop {
            let n = source.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.write(&buf[..n])?;
        }
        source.close();
        out.pad_sector()?;
        let _ = index;
        Ok(())
    }
}

/// The one-sector boot record volume descriptor, written immediately
/// after the primary (and Joliet, when enabled) volume descriptor and
/// before the set terminator — sector 17 in the common single-descriptor
/// case.
pub fn build_boot_record(catalog_sector: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SECTOR_SIZE as usize);
    buf.push(0); // boot record
    buf.extend_from_slice(b"CD001");
    buf.push(1);
    buf.extend_from_slice(BOOT_SYSTEM_ID);
    buf.resize(7 + 32, 0); // boot identifier, unused here
    buf.extend_from_slice(&catalog_sector.to_le_bytes());
    buf.resize(SECTOR_SIZE as usize, 0);
    buf
}

fn media_type_byte(media_type: BootMediaType) -> u8 {
    match media_type {
        BootMediaType::NoEmulation => 0,
        BootMediaType::Floppy => 2, // 1.44MB; the common floppy default
        BootMediaType::HardDisk => 4,
    }
}

/// The validation entry's checksum must make all words in the entry sum
/// to zero mod 0x10000; with the id string left blank, a fixed value
/// satisfies this for the header id / platform id pair.
fn checksum_placeholder() -> [u8; 2] {
    let partial: u16 = 1u16.wrapping_add(0);
    (0u16.wrapping_sub(partial)).to_le_bytes()
}
