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

//! End-to-end coverage driving [`hyrax_fs_iso9660::driver::ImageDriver`]
//! against an in-memory source/sink pair, one test per named scenario.

use std::{collections::HashMap, path::Path, path::PathBuf, time::SystemTime};

use hyrax_fs_iso9660::{
    driver::ImageDriver,
    error::Result,
    interfaces::{FileSource, FileTimes, FileTimeTriple, InStream, NullLog, NullProgress, OutStream},
    options::{FileSystemMode, InterchangeLevel, Options, PartitionAccessType},
    tree::{FileDescriptor, FileSet},
    ISO9660_MAX_EXTENT_SIZE, SECTOR_SIZE,
};

struct VecOut(Vec<u8>);

impl OutStream for VecOut {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

struct SliceInStream {
    data: &'static [u8],
    pos: usize,
}

impl InStream for SliceInStream {
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

/// Resolves every path to whatever bytes were registered for it, or an
/// empty stream for paths nobody registered content for.
#[derive(Default)]
struct MemSource {
    content: HashMap<PathBuf, &'static [u8]>,
}

impl MemSource {
    fn with(pairs: &[(&str, &'static [u8])]) -> Self {
        Self {
            content: pairs.iter().map(|(p, d)| (PathBuf::from(p), *d)).collect(),
        }
    }
}

impl FileSource for MemSource {
    fn open(&self, path: &Path) -> Result<Box<dyn InStream>> {
        let data = self.content.get(path).copied().unwrap_or(&[]);
        Ok(Box::new(SliceInStream { data, pos: 0 }))
    }
}

struct FixedFileTimes(SystemTime);

impl FileTimes for FixedFileTimes {
    fn stat_times(&self, _path: &Path) -> Result<FileTimeTriple> {
        Ok((self.0, self.0, self.0))
    }
}

fn build(
    fs: FileSet,
    options: Options,
    source: &dyn FileSource,
) -> Result<(hyrax_fs_iso9660::driver::PathMap, Vec<u8>)> {
    let driver = ImageDriver::new(options);
    let mut out = VecOut(Vec::new());
    let map = driver.create(
        &fs,
        source,
        &NullLog,
        &NullProgress,
        None,
        &mut out,
        SystemTime::UNIX_EPOCH,
    )?;
    Ok((map, out.0))
}

/// Scenario 1 — a minimal image: one file, default options.
#[test]
fn minimal_image_has_valid_descriptor() {
    let fs = vec![FileDescriptor::file("/readme.txt", "/src/readme.txt").size(11)];
    let source = MemSource::with(&[("/src/readme.txt", b"hello world")]);
    let options = Options::new(FileSystemMode::Iso9660);

    let (map, bytes) = build(fs, options, &source).unwrap();

    assert_eq!(map.get("/readme.txt").map(String::as_str), Some("/README.TXT"));
    assert_eq!(&bytes[16 * SECTOR_SIZE as usize + 1..16 * SECTOR_SIZE as usize + 6], b"CD001");
    // Set terminator immediately follows the lone primary descriptor.
    assert_eq!(bytes[17 * SECTOR_SIZE as usize], 255);
}

/// Scenario 2 — Joliet carries the exact Unicode name while the ISO 9660
/// view sees the ASCII-filtered, 8.3-ish fallback.
#[test]
fn joliet_preserves_unicode_name() {
    let fs = vec![FileDescriptor::file("/Réadme.txt", "/src/r.txt").size(4)];
    let source = MemSource::with(&[("/src/r.txt", b"data")]);
    let options = Options::new(FileSystemMode::Iso9660Joliet);

    let (map, _bytes) = build(fs, options, &source).unwrap();

    // The path map is built in the Joliet namespace whenever Joliet is on.
    assert_eq!(map.get("/Réadme.txt").map(String::as_str), Some("/Réadme.txt"));
}

/// Scenario 3 — collision: three names that all truncate to the same 8.3
/// basename get uniquified by substituting trailing digits.
#[test]
fn sibling_collision_uniquifies_8_3_names() {
    let fs = vec![
        FileDescriptor::file("/longfilename.txt", "/src/a").size(1),
        FileDescriptor::file("/longfilenane.txt", "/src/b").size(1),
        FileDescriptor::file("/longfilenano.txt", "/src/c").size(1),
    ];
    let source = MemSource::with(&[("/src/a", b"1"), ("/src/b", b"1"), ("/src/c", b"1")]);
    let options = Options::new(FileSystemMode::Iso9660).interchange_level(InterchangeLevel::Level1);

    let (map, _bytes) = build(fs, options, &source).unwrap();

    assert_eq!(map.get("/longfilename.txt").map(String::as_str), Some("/LONGFILE.TXT"));
    assert_eq!(map.get("/longfilenane.txt").map(String::as_str), Some("/LONGFIL1.TXT"));
    assert_eq!(map.get("/longfilenano.txt").map(String::as_str), Some("/LONGFIL2.TXT"));
}

/// Scenario 4 — a path ten levels deep is dropped from both the path
/// table and directory records once it exceeds the default 8-level limit.
#[test]
fn directory_depth_limit_omits_deep_path() {
    let fs = vec![
        FileDescriptor::file("/a/b/c/d/e/f/g/h/i/j.txt", "/src/j.txt").size(3),
        FileDescriptor::file("/a/shallow.txt", "/src/shallow.txt").size(3),
    ];
    let source = MemSource::with(&[("/src/j.txt", b"abc"), ("/src/shallow.txt", b"abc")]);
    let options = Options::new(FileSystemMode::Iso9660);

    let (map, _bytes) = build(fs, options, &source).unwrap();

    assert!(map.get("/a/b/c/d/e/f/g/h/i/j.txt").is_none());
    assert_eq!(map.get("/a/shallow.txt").map(String::as_str), Some("/A/SHALLOW.TXT"));
}

/// Scenario 5, first half — an oversized file with fragmentation
/// disallowed and no UDF fallback is missing from the image entirely.
#[test]
fn oversized_file_without_udf_is_dropped_entirely() {
    let fs = vec![
        FileDescriptor::file("/huge.bin", "/src/huge.bin").size(ISO9660_MAX_EXTENT_SIZE + 1),
        FileDescriptor::file("/small.txt", "/src/small.txt").size(5),
    ];
    let source = MemSource::with(&[("/src/small.txt", b"small")]);
    let options = Options::new(FileSystemMode::Iso9660).interchange_level(InterchangeLevel::Level2);

    let (map, _bytes) = build(fs, options, &source).unwrap();

    assert!(map.get("/huge.bin").is_none());
    assert_eq!(map.get("/small.txt").map(String::as_str), Some("/SMALL.TXT"));
}

/// Scenario 5, second half — the same oversized file under an
/// ISO9660+UDF mode is absent from the ISO 9660/Joliet listing but its
/// data still lands in the image, reachable through the UDF partition.
#[test]
fn oversized_file_under_udf_mode_stays_in_udf_view_only() {
    let fs = vec![
        FileDescriptor::file("/huge.bin", "/src/huge.bin").size(ISO9660_MAX_EXTENT_SIZE + 1),
        FileDescriptor::file("/small.txt", "/src/small.txt").size(5),
    ];
    let source = MemSource::with(&[("/src/small.txt", b"small")]);
    let mut options = Options::new(FileSystemMode::Iso9660Udf);
    options.part_access_type = PartitionAccessType::ReadOnly;

    let (map, bytes) = build(fs, options, &source).unwrap();

    assert!(map.get("/huge.bin").is_none());
    assert_eq!(map.get("/small.txt").map(String::as_str), Some("/SMALL.TXT"));
    // The UDF bridge's volume recognition sequence follows the 16-sector
    // system area, ahead of the ISO 9660 descriptors.
    let udf_header = 16 * SECTOR_SIZE as usize;
    assert_eq!(&bytes[udf_header..udf_header + 5], b"BEA01");
}

/// Scenario 6 — a no-emulation boot image places a boot record right
/// after the primary descriptor, with the catalog and image data
/// following it contiguously.
#[test]
fn boot_image_places_el_torito_records() {
    use hyrax_fs_iso9660::options::BootImage;

    let fs = vec![FileDescriptor::file("/readme.txt", "/src/readme.txt").size(4)];
    let source = MemSource::with(&[
        ("/src/readme.txt", b"data"),
        ("/boot/img.bin", b"\x00\x01\x02\x03"),
    ]);
    let options = Options::new(FileSystemMode::Iso9660)
        .add_boot_image(BootImage::no_emulation(0, "/boot/img.bin"));

    let (_map, bytes) = build(fs, options, &source).unwrap();

    // Boot record volume descriptor at sector 17, right after the
    // primary descriptor at sector 16.
    assert_eq!(bytes[17 * SECTOR_SIZE as usize], 0);
    assert_eq!(
        &bytes[17 * SECTOR_SIZE as usize + 1..17 * SECTOR_SIZE as usize + 6],
        b"CD001"
    );
    assert_eq!(
        &bytes[17 * SECTOR_SIZE as usize + 7..17 * SECTOR_SIZE as usize + 7 + 23],
        b"EL TORITO SPECIFICATION"
    );
}

/// `use_file_times` off always encodes the image creation time, even
/// when a `FileTimes` collaborator is supplied.
#[test]
fn disabled_file_times_falls_back_to_creation_time() {
    let fs = vec![FileDescriptor::file("/a.txt", "/src/a.txt").size(1)];
    let source = MemSource::with(&[("/src/a.txt", b"1")]);
    let mut options = Options::new(FileSystemMode::Iso9660);
    options.use_file_times = false;

    let driver = ImageDriver::new(options);
    let mut out = VecOut(Vec::new());
    let file_times = FixedFileTimes(SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(3600));
    let map = driver
        .create(
            &fs,
            &source,
            &NullLog,
            &NullProgress,
            Some(&file_times),
            &mut out,
            SystemTime::UNIX_EPOCH,
        )
        .unwrap();

    assert_eq!(map.get("/a.txt").map(String::as_str), Some("/A.TXT"));
}

/// Importing a prior session's node: its extent and flags are copied
/// verbatim into the new image rather than freshly allocated.
#[test]
fn imported_node_keeps_its_recorded_extent() {
    use hyrax_fs_iso9660::tree::ImportedData;

    let imported = ImportedData {
        extent: 12345,
        size: 2048,
        timestamp: [124, 1, 1, 0, 0, 0, 0],
        file_flags: 0,
        file_unit_size: 0,
        interleave_gap_size: 0,
        volume_sequence_number: 1,
    };
    let mut desc = FileDescriptor::file("/old.bin", "/unused");
    desc.flags |= hyrax_fs_iso9660::tree::flags::IMPORTED;
    desc.imported = Some(imported);
    let fs = vec![desc];

    let source = MemSource::default();
    let options = Options::new(FileSystemMode::Iso9660);
    let (map, _bytes) = build(fs, options, &source).unwrap();

    assert_eq!(map.get("/old.bin").map(String::as_str), Some("/OLD.BIN"));
}

/// A descriptor flagged `IMPORTED` with no `imported` metadata is a
/// surfaced data error, not a silent default.
#[test]
fn imported_flag_without_metadata_is_rejected() {
    let mut desc = FileDescriptor::file("/old.bin", "/unused");
    desc.flags |= hyrax_fs_iso9660::tree::flags::IMPORTED;
    let fs = vec![desc];

    let err = hyrax_fs_iso9660::tree::FileTree::build(&fs).unwrap_err();
    assert!(matches!(
        err,
        hyrax_fs_iso9660::Error::Data(hyrax_fs_iso9660::error::DataError::MissingImportedMetadata)
    ));
}

/// Enough siblings collide under 8.3 truncation to exhaust the
/// uniquification counter at 255. The default (permissive) behavior warns
/// and accepts the final duplicate; `strict_names` turns the same
/// exhaustion into a surfaced configuration error instead.
fn colliding_file_set() -> FileSet {
    (0..300)
        .map(|i| FileDescriptor::file(format!("/collision{i:03}.txt"), format!("/src/{i}")).size(1))
        .collect()
}

#[test]
fn name_collision_exhaustion_is_permissive_by_default() {
    let fs = colliding_file_set();
    let source = MemSource::default();
    let options = Options::new(FileSystemMode::Iso9660).interchange_level(InterchangeLevel::Level1);

    let (map, _bytes) = build(fs, options, &source).unwrap();
    assert_eq!(map.len(), 300);
}

#[test]
fn name_collision_exhaustion_is_a_hard_error_in_strict_mode() {
    let fs = colliding_file_set();
    let source = MemSource::default();
    let mut options = Options::new(FileSystemMode::Iso9660).interchange_level(InterchangeLevel::Level1);
    options.strict_names = true;

    let err = build(fs, options, &source).unwrap_err();
    assert!(matches!(
        err,
        hyrax_fs_iso9660::Error::Config(hyrax_fs_iso9660::error::ConfigError::NameUniquificationExhausted(_))
    ));
}
