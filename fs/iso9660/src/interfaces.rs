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

//! Collaborator traits the image driver is handed by its caller. None of
//! these are implemented here beyond the trivial no-op defaults and the
//! `std`-backed adapters in [`crate::std_support`] — the driver only
//! depends on the interface.

use std::{fmt, path::Path, time::SystemTime};

use crate::error::Result;

pub trait Log {
    fn print_line(&self, args: fmt::Arguments);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

pub trait Progress {
    fn set_status(&self, text: &str);

    fn set_marquee(&self, marquee: bool);

    /// `percent` is clamped to [0, 100] by callers before use.
    fn set_progress(&self, percent: u8);

    fn notify(&self, level: NotifyLevel, text: &str);

    /// Polled at each file-data copy iteration and each directory-record
    /// write. Once this returns `true` the driver unwinds and returns
    /// [`crate::Error::Cancelled`].
    fn cancelled(&self) -> bool;
}

/// The output byte sink the whole image is serialized to.
pub trait OutStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    fn flush(&mut self) -> Result<()>;
}

/// A single file's content, read sequentially.
pub trait InStream {
    fn open(&mut self) -> Result<()>;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn close(&mut self);
}

/// Resolves a [`crate::tree::FileTreeNode::file_path`] to the byte stream
/// the driver copies into the image. Kept distinct from `InStream` itself
/// so the driver can open each file lazily, right before it is copied.
pub trait FileSource {
    fn open(&self, path: &Path) -> Result<Box<dyn InStream>>;
}

/// (accessed, modified, created)
pub type FileTimeTriple = (SystemTime, SystemTime, SystemTime);

pub trait FileTimes {
    fn stat_times(&self, path: &Path) -> Result<FileTimeTriple>;
}

/// Localized diagnostic message lookup; keys are the `WARNING_*` /
/// `ERROR_*` identifiers raised by [`crate::driver`] and [`crate::volume`].
pub trait StringTable {
    fn get(&self, key: &str) -> &str;
}

pub struct NullLog;

impl Log for NullLog {
    fn print_line(&self, _args: fmt::Arguments) {}
}

pub struct NullProgress;

impl Progress for NullProgress {
    fn set_status(&self, _text: &str) {}

    fn set_marquee(&self, _marquee: bool) {}

    fn set_progress(&self, _percent: u8) {}

    fn notify(&self, _level: NotifyLevel, _text: &str) {}

    fn cancelled(&self) -> bool {
        false
    }
}

pub struct DefaultStringTable;

impl StringTable for DefaultStringTable {
    fn get(&self, key: &str) -> &str {
        key
    }
}
