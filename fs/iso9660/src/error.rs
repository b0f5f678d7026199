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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("data: {0}")]
    Data(#[from] DataError),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("data storage: {0}")]
    DataStorage(#[from] hyrax_ds::Error),
    #[error("cancelled")]
    Cancelled,
}

/// Errors that indicate the requested image cannot be produced at all,
/// independent of any particular file's content.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("path table too large ({0} bytes, limit is 2^32 - 1)")]
    PathTableTooLarge(u64),
    #[error("root directory extent too large")]
    RootExtentTooLarge,
    #[error("boot image sector range is invalid")]
    InvalidBootImage,
    #[error("file tree construction failed: {0}")]
    TreeConstruction(String),
    #[error("no boot catalog configured but a boot image was requested")]
    MissingBootCatalog,
    #[error("sibling name collision could not be resolved: \"{0}\"")]
    NameUniquificationExhausted(String),
}

/// Errors rooted in the content of a specific file or node.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("imported node is missing its session metadata")]
    MissingImportedMetadata,
    #[error("file size mismatch: file set said {expected}, source reported {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("unknown region requested from the sector manager")]
    UnknownRegion,
}

pub type Result<T> = core::result::Result<T, Error>;
