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

//! Disc image authoring: ISO 9660, the Joliet supplementary extension, a
//! UDF bridge surface, El Torito boot records and DVD-Video layout.
//!
//! [`driver::ImageDriver`] is the entry point; everything else is exposed
//! for callers that need to drive the pipeline a stage at a time.

pub mod alloc;
pub mod dvdvideo;
pub mod driver;
pub mod eltorito;
pub mod error;
pub mod interfaces;
pub mod name;
pub mod options;
pub mod sector;
#[cfg(feature = "std")]
pub mod std_support;
pub mod tree;
pub mod udf;
pub mod volume;

pub use error::{Error, Result};
pub use options::{FileSystemMode, Options};
pub use tree::{FileDescriptor, FileSet};

/// Logical sector size used throughout the image, in bytes.
pub const SECTOR_SIZE: u64 = sector::SECTOR_SIZE;

/// Largest byte length a single ISO 9660 extent can describe (2^32 - 1,
/// rounded down to the sector boundary below it).
pub const ISO9660_MAX_EXTENT_SIZE: u64 = (u32::MAX as u64) & !(SECTOR_SIZE - 1);
