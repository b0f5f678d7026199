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

//! Orchestrates the whole pipeline: build the tree, lay out every region
//! of the image, then emit it.

use std::{collections::BTreeMap, time::SystemTime};

use log::info;

use crate::{
    alloc::{sectors_for_bytes, Region, SectorManager},
    dvdvideo,
    eltorito::ElTorito,
    error::Result,
    interfaces::{FileSource, FileTimes, Log, Progress},
    options::Options,
    sector::{SectorOutStream, SECTOR_SIZE},
    tree::{FileSet, FileTree, Namespace, NodeId},
    udf::UdfBridge,
    volume::VolumeWriter,
    Error,
};

/// Maps each node's internal path to a host-readable external path in the
/// namespace the caller asks for (the namespace most useful to recognize
/// what ended up where on the finished disc).
pub type PathMap = BTreeMap<String, String>;

pub struct ImageDriver {
    options: Options,
}

impl ImageDriver {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    /// Builds the whole image, writing it to `out`. Returns a map from
    /// each file's internal path to its external (ISO 9660 or Joliet)
    /// path on the finished disc.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        file_set: &FileSet,
        file_source: &dyn FileSource,
        log: &dyn Log,
        progress: &dyn Progress,
        file_times: Option<&dyn FileTimes>,
        out: &mut dyn crate::interfaces::OutStream,
        creation_time: SystemTime,
    ) -> Result<PathMap> {
        log.print_line(format_args!("building file tree"));
        let mut tree = FileTree::build(file_set)?;

        if matches!(self.options.file_system, crate::options::FileSystemMode::DvdVideo) {
            dvdvideo::pad_vob_files(&mut tree);
        }

        let mut sector_manager = SectorManager::new(16 + self.options.sector_offset);
        let mut stream = SectorOutStream::new(out);
        stream.pad_sectors(16)?;

        let use_iso = self.options.file_system.use_iso9660();
        let use_udf = self.options.file_system.use_udf();

        let mut volume_writer = VolumeWriter::new(&self.options, creation_time);
        volume_writer.assign_names(&mut tree, &self.options, progress)?;

        let boot_sizes: Vec<u64> = self
            .options
            .boot_images
            .iter()
            .map(|image| std::fs::metadata(&image.source_path).map(|m| m.len()))
            .collect::<std::io::Result<Vec<u64>>>()?;
        let eltorito = ElTorito::new(&self.options.boot_images, &boot_sizes);

        let mut udf = UdfBridge::new(self.options.part_access_type);

        if use_udf {
            udf.allocate_header(&mut sector_manager);
        }
        if use_iso {
            volume_writer.allocate_header(&mut sector_manager, !eltorito.is_empty());
            if !eltorito.is_empty() {
                eltorito.allocate(&mut sector_manager)?;
            }
            volume_writer.allocate_path_tables(&tree, &mut sector_manager)?;
            volume_writer.allocate_dir_entries(&mut tree, &mut sector_manager)?;
        }
        if use_udf {
            udf.allocate_partition(&mut sector_manager, &tree);
        }

        self.allocate_file_data(&mut tree, &mut sector_manager);

        if use_udf {
            udf.write_header(&sector_manager, &mut stream)?;
        }
        if use_iso {
            let boot_catalog_sector = if eltorito.is_empty() {
                None
            } else {
                Some(sector_manager.start(Region::BootCatalog)?)
            };
            volume_writer.write_header(&tree, &self.options, &sector_manager, boot_catalog_sector, &mut stream)?;
            if !eltorito.is_empty() {
                eltorito.write_catalog(&sector_manager, &mut stream)?;
                for (i, image) in self.options.boot_images.iter().enumerate() {
                    let mut source = file_source.open(&image.source_path)?;
                    eltorito.write_image_data(i, source.as_mut(), &mut stream)?;
                }
            }
            volume_writer.write_path_tables(&tree, &mut stream)?;
            volume_writer.write_dir_entries(&tree, progress, file_times, &mut stream)?;
        }

        self.write_file_data(&tree, file_source, progress, &mut stream)?;

        if use_udf {
            udf.write_partition(&tree, creation_time, &mut stream)?;
            udf.write_tail(&mut stream)?;
        }

        stream.flush()?;
        info!("image complete, {} sectors", stream.sector());

        let namespace = if self.options.file_system.use_joliet() {
            Namespace::Joliet
        } else {
            Namespace::Iso9660
        };
        Ok(self.build_path_map(&tree, namespace))
    }

    /// Assigns every non-directory, non-omitted node its sector location
    /// and size in both namespaces, in a fixed pre-order walk so file data
    /// phase 8 below streams bytes in the same order. A node that is
    /// merely `SKIPPED` (oversized under a UDF mode) still gets its data
    /// placed here — only an `OMITTED` node is absent from the image.
    fn allocate_file_data(&self, tree: &mut FileTree, alloc: &mut SectorManager) {
        let ids: Vec<NodeId> = tree
            .preorder()
            .into_iter()
            .map(|(id, _)| id)
            .filter(|&id| !tree.node(id).is_dir() && !tree.node(id).is_omitted())
            .collect();

        let data_region_start = alloc.next_free();

        for id in ids {
            let node = tree.node(id);
            if let crate::tree::NodeData::Imported(imported) = &node.data {
                let (extent, size) = (imported.extent, imported.size);
                let node = tree.node_mut(id);
                node.data_pos_normal = extent;
                node.data_size_normal = size;
                node.data_pos_joliet = extent;
                node.data_size_joliet = size;
                continue;
            }
            let sectors = sectors_for_bytes(node.file_size) + node.data_pad_len;
            let start = alloc.allocate_sectors_anon(sectors);
            let node = tree.node_mut(id);
            node.data_pos_normal = start;
            node.data_size_normal = node.file_size;
            node.data_pos_joliet = start;
            node.data_size_joliet = node.file_size;
        }

        // Imported nodes adopt their own recorded extent rather than
        // drawing from this region, so it may legitimately span zero
        // fresh-allocated sectors (an all-imported file set).
        alloc.mark_data_region(data_region_start);
    }

    fn write_file_data(
        &self,
        tree: &FileTree,
        file_source: &dyn FileSource,
        progress: &dyn Progress,
        out: &mut SectorOutStream,
    ) -> Result<()> {
        let ids: Vec<NodeId> = tree
            .preorder()
            .into_iter()
            .map(|(id, _)| id)
            .filter(|&id| !tree.node(id).is_dir() && !tree.node(id).is_omitted())
            .collect();

        for id in ids {
            if progress.cancelled() {
                return Err(Error::Cancelled);
            }
            let node = tree.node(id);
            if node.is_imported() {
                // Already present at its recorded extent from a previous
                // session; nothing new to copy.
                continue;
            }

            progress.set_status(&node.file_name);
            let mut source = file_source.open(&node.file_path)?;
            source.open()?;
            let mut buf = [0u8; 65536];
            let mut written = 0u64;
            loop {
                if progress.cancelled() {
                    source.close();
                    return Err(Error::Cancelled);
                }
                let n = source.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                out.write(&buf[..n])?;
                written += n as u64;
            }
            source.close();

            if written != node.file_size {
                log::warn!(
                    "{} was {} bytes when sized but {} when copied",
                    node.file_name,
                    node.file_size,
                    written
                );
            }
            out.pad_sector()?;
            out.pad_sectors(node.data_pad_len as u64)?;
        }

        Ok(())
    }

    fn build_path_map(&self, tree: &FileTree, namespace: Namespace) -> PathMap {
        let mut map = PathMap::new();
        for (id, _) in tree.preorder() {
            if id == FileTree::ROOT || tree.node(id).is_dir() || tree.node(id).is_skipped() {
                continue;
            }
            let internal = tree.internal_path(id, Namespace::Raw);
            let external = tree.internal_path(id, namespace);
            map.insert(internal, external);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        interfaces::{InStream, NullLog, NullProgress},
        options::FileSystemMode,
        tree::FileDescriptor,
    };
    use std::path::Path;

    struct MemSource;

    struct MemInStream {
        data: &'static [u8],
        pos: usize,
    }

    impl InStream for MemInStream {
        fn open(&mut self) -> Result<()> {
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let n = (self.data.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }

        fn close(&mut self) {}
    }

    impl FileSource for MemSource {
        fn open(&self, _path: &Path) -> Result<Box<dyn InStream>> {
            Ok(Box::new(MemInStream {
                data: b"hello world",
                pos: 0,
            }))
        }
    }

    struct VecOut(Vec<u8>);

    impl crate::interfaces::OutStream for VecOut {
        fn write(&mut self, buf: &[u8]) -> Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn minimal_image_has_system_area_and_descriptors() {
        let mut fs = FileSet::new();
        fs.push(FileDescriptor::file("/a.txt", "/does/not/matter"));

        let options = Options::new(FileSystemMode::Iso9660);
        let driver = ImageDriver::new(options);
        let mut out = VecOut(Vec::new());
        let map = driver
            .create(
                &fs,
                &MemSource,
                &NullLog,
                &NullProgress,
                None,
                &mut out,
                SystemTime::UNIX_EPOCH,
            )
            .unwrap();

        assert_eq!(map.get("/a.txt").map(String::as_str), Some("/A.TXT"));
        assert!(out.0.len() >= 18 * SECTOR_SIZE as usize);
        assert_eq!(&out.0[16 * SECTOR_SIZE as usize + 1..16 * SECTOR_SIZE as usize + 6], b"CD001");
    }
}
