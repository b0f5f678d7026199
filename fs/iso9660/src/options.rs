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

//! Everything a caller configures before asking the [`crate::driver`] to
//! build an image.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSystemMode {
    Iso9660,
    Iso9660Joliet,
    Iso9660Udf,
    Iso9660UdfJoliet,
    Udf,
    DvdVideo,
}

impl FileSystemMode {
    pub fn use_iso9660(self) -> bool {
        !matches!(self, FileSystemMode::Udf)
    }

    pub fn use_udf(self) -> bool {
        matches!(
            self,
            FileSystemMode::Iso9660Udf
                | FileSystemMode::Iso9660UdfJoliet
                | FileSystemMode::Udf
                | FileSystemMode::DvdVideo
        )
    }

    pub fn use_joliet(self) -> bool {
        matches!(
            self,
            FileSystemMode::Iso9660Joliet | FileSystemMode::Iso9660UdfJoliet
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterchangeLevel {
    /// 8.3 uppercase names.
    Level1,
    /// Up to 31 characters, single extent per file.
    Level2,
    /// Up to 31 characters, file fragmentation across multiple extents
    /// permitted.
    Level3,
}

impl InterchangeLevel {
    pub fn allows_fragmentation(self) -> bool {
        matches!(self, InterchangeLevel::Level3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionAccessType {
    Unspecified,
    ReadOnly,
    WriteOnce,
    Rewritable,
    Overwritable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMediaType {
    NoEmulation,
    Floppy,
    HardDisk,
}

#[derive(Debug, Clone)]
pub struct BootImage {
    pub media_type: BootMediaType,
    pub platform_id: u8,
    pub load_segment: u16,
    /// Number of 512-byte virtual sectors to load; 0 lets the BIOS decide.
    pub sector_count: u16,
    /// Host filesystem path the boot image's raw bytes are read from.
    pub source_path: std::path::PathBuf,
}

impl BootImage {
    pub fn no_emulation(platform_id: u8, source_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            media_type: BootMediaType::NoEmulation,
            platform_id,
            load_segment: 0,
            sector_count: 0,
            source_path: source_path.into(),
        }
    }

    pub fn floppy(platform_id: u8, source_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            media_type: BootMediaType::Floppy,
            platform_id,
            load_segment: 0,
            sector_count: 0,
            source_path: source_path.into(),
        }
    }

    pub fn hard_disk(platform_id: u8, source_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            media_type: BootMediaType::HardDisk,
            platform_id,
            load_segment: 0,
            sector_count: 0,
            source_path: source_path.into(),
        }
    }
}

/// The handful of free-text identification fields ISO 9660 carries in the
/// primary (and, mirrored, supplementary) volume descriptor. All default to
/// empty, which the writer pads with spaces per the standard.
#[derive(Debug, Clone, Default)]
pub struct TextFields {
    pub system_id: String,
    pub volume_set_id: String,
    pub publisher_id: String,
    pub data_preparer_id: String,
    pub application_id: String,
    pub copyright_file_id: String,
    pub abstract_file_id: String,
    pub bibliographic_file_id: String,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub file_system: FileSystemMode,
    pub interchange_level: InterchangeLevel,
    pub include_file_ver_info: bool,
    pub long_joliet_names: bool,
    pub relax_max_dir_level: bool,
    /// When the sibling-uniquification counter is exhausted (see
    /// [`crate::name`]), fail the build instead of warning and accepting
    /// the collision.
    pub strict_names: bool,
    pub part_access_type: PartitionAccessType,
    pub use_file_times: bool,
    /// Start-sector bias applied after the 16-sector system area, for
    /// multi-session media.
    pub sector_offset: u32,
    pub volume_label: String,
    pub text_fields: TextFields,
    pub boot_images: Vec<BootImage>,
}

impl Options {
    pub fn new(file_system: FileSystemMode) -> Self {
        Self {
            file_system,
            interchange_level: InterchangeLevel::Level2,
            include_file_ver_info: true,
            long_joliet_names: false,
            relax_max_dir_level: false,
            strict_names: false,
            part_access_type: PartitionAccessType::Unspecified,
            use_file_times: true,
            sector_offset: 0,
            volume_label: String::new(),
            text_fields: TextFields::default(),
            boot_images: Vec::new(),
        }
    }

    pub fn max_dir_level(&self) -> u32 {
        if self.relax_max_dir_level {
            16
        } else {
            8
        }
    }

    pub fn volume_label(mut self, label: impl Into<String>) -> Self {
        self.volume_label = label.into();
        self
    }

    pub fn interchange_level(mut self, level: InterchangeLevel) -> Self {
        self.interchange_level = level;
        self
    }

    pub fn text_fields(mut self, fields: TextFields) -> Self {
        self.text_fields = fields;
        self
    }

    pub fn add_boot_image(mut self, image: BootImage) -> Self {
        self.boot_images.push(image);
        self
    }
}
