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

//! `std`-backed adapters for the collaborator traits in [`crate::interfaces`],
//! so a caller can drive [`crate::driver::ImageDriver`] against real files
//! without writing its own glue. None of this is required by the core —
//! every trait here has a hand-written implementation possible elsewhere —
//! it just saves the common case.

use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
    time::SystemTime,
};

use hyrax_ds_std::DataStorageServer;

use crate::{
    error::Result,
    interfaces::{FileSource, FileTimes, FileTimeTriple, InStream, Log, OutStream},
};

/// [`Log`] that forwards to the `log` crate at info level, the same sink
/// every other module in this crate already writes diagnostics to.
pub struct TracingLog;

impl Log for TracingLog {
    fn print_line(&self, args: std::fmt::Arguments) {
        log::info!("{args}");
    }
}

/// [`InStream`] over a plain [`File`], opened lazily by [`StdFileSource`].
pub struct StdInStream {
    file: Option<File>,
    path: std::path::PathBuf,
}

impl InStream for StdInStream {
    fn open(&mut self) -> Result<()> {
        self.file = Some(File::open(&self.path)?);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let file = self
            .file
            .as_mut()
            .expect("InStream::read called before InStream::open");
        Ok(file.read(buf)?)
    }

    fn close(&mut self) {
        self.file = None;
    }
}

/// [`FileSource`] that resolves every [`crate::tree::FileTreeNode::file_path`]
/// straight to a host filesystem path.
pub struct StdFileSource;

impl FileSource for StdFileSource {
    fn open(&self, path: &Path) -> Result<Box<dyn InStream>> {
        Ok(Box::new(StdInStream {
            file: None,
            path: path.to_path_buf(),
        }))
    }
}

/// [`FileTimes`] backed by [`std::fs::metadata`]. Platforms that don't
/// report a creation time (most Unixes) fall back to the modified time,
/// which is the field the directory-record timestamp policy actually
/// consumes.
pub struct StdFileTimes;

impl FileTimes for StdFileTimes {
    fn stat_times(&self, path: &Path) -> Result<FileTimeTriple> {
        let meta = std::fs::metadata(path)?;
        let modified = meta.modified()?;
        let accessed = meta.accessed().unwrap_or(modified);
        let created = meta.created().unwrap_or(modified);
        Ok((accessed, modified, created))
    }
}

/// [`OutStream`] over any [`Write`] implementation, the usual case being a
/// plain [`File`] opened for the output image.
pub struct WriteOutStream<W: Write>(pub W);

impl<W: Write> OutStream for WriteOutStream<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.0.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.0.flush()?)
    }
}

/// [`OutStream`] over the workspace's own [`hyrax_ds::DataStorage`]
/// abstraction, tracking a monotonically advancing write cursor since
/// `DataStorage` is addressed by absolute offset rather than sequentially.
pub struct DataStorageOutStream {
    storage: DataStorageServer,
    offset: u64,
}

impl DataStorageOutStream {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            storage: DataStorageServer::create(path)?,
            offset: 0,
        })
    }
}

impl OutStream for DataStorageOutStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        hyrax_ds::DataStorage::write(&self.storage, self.offset, buf)?;
        self.offset += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Convenience: reads a [`crate::tree::FileTreeNode::file_size`] directly
/// off the host filesystem, so callers building a [`crate::tree::FileSet`]
/// from a directory walk don't need their own `stat` call.
pub fn file_size(path: impl AsRef<Path>) -> Result<u64> {
    Ok(std::fs::metadata(path)?.len())
}

/// Opens (creating/truncating) `path` and wraps it for
/// [`crate::driver::ImageDriver::create`]'s `out` parameter.
pub fn create_image_file(path: impl AsRef<Path>) -> Result<WriteOutStream<File>> {
    Ok(WriteOutStream(File::create(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn write_out_stream_forwards_bytes() {
        let tmp = tempfile_for_test("write_out_stream");
        {
            let mut out = WriteOutStream(File::create(&tmp).unwrap());
            out.write(b"hello").unwrap();
            out.flush().unwrap();
        }
        let contents = std::fs::read(&tmp).unwrap();
        assert_eq!(contents, b"hello");
        let _ = std::fs::remove_file(&tmp);
    }

    #[test]
    fn std_file_source_reads_back_written_bytes() {
        let tmp = tempfile_for_test("file_source");
        std::fs::File::create(&tmp).unwrap().write_all(b"disc image bytes").unwrap();

        let mut stream = StdFileSource.open(&tmp).unwrap();
        stream.open().unwrap();
        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).unwrap();
        stream.close();
        assert_eq!(&buf[..n], b"disc image bytes");
        let _ = std::fs::remove_file(&tmp);
    }

    #[test]
    fn std_file_times_reports_modified() {
        let tmp = tempfile_for_test("file_times");
        std::fs::File::create(&tmp).unwrap();
        let (_, modified, _) = StdFileTimes.stat_times(&tmp).unwrap();
        assert!(modified <= SystemTime::now());
        let _ = std::fs::remove_file(&tmp);
    }

    fn tempfile_for_test(label: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("hyrax_fs_iso9660_test_{label}_{:?}", std::process::id()));
        path
    }
}
