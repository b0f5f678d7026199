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

//! Sector-granular accounting on top of a caller-provided [`OutStream`].

use crate::{error::Result, interfaces::OutStream};

pub const SECTOR_SIZE: u64 = 2048;

const ZERO: [u8; SECTOR_SIZE as usize] = [0; SECTOR_SIZE as usize];

/// Wraps an [`OutStream`], tracking how many bytes have landed in the
/// current sector so padding can be inserted on demand. Carries no buffer
/// of its own; every `write` is forwarded immediately.
pub struct SectorOutStream<'a> {
    out: &'a mut dyn OutStream,
    sector: u64,
    allocated: u64,
}

impl<'a> SectorOutStream<'a> {
    pub fn new(out: &'a mut dyn OutStream) -> Self {
        Self {
            out,
            sector: 0,
            allocated: 0,
        }
    }

    /// Sector index the next byte written will land in, or is currently
    /// landing in if `allocated() > 0`.
    pub fn sector(&self) -> u64 {
        self.sector
    }

    /// Bytes already written into the current sector.
    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    /// Bytes needed to reach the next sector boundary; 0 if already
    /// aligned.
    pub fn remaining(&self) -> u64 {
        (SECTOR_SIZE - self.allocated) % SECTOR_SIZE
    }

    pub fn write(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.out.write(buf)?;
            if n == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
            }
            buf = &buf[n..];
            self.allocated += n as u64;
            while self.allocated >= SECTOR_SIZE {
                self.allocated -= SECTOR_SIZE;
                self.sector += 1;
            }
        }
        Ok(())
    }

    /// Zero-pads up to the next sector boundary. A no-op when already
    /// aligned.
    pub fn pad_sector(&mut self) -> Result<()> {
        let remaining = self.remaining() as usize;
        if remaining == 0 {
            return Ok(());
        }
        self.write(&ZERO[..remaining])
    }

    /// Zero-fills `n` whole sectors, e.g. the reserved system area.
    pub fn pad_sectors(&mut self, n: u64) -> Result<()> {
        debug_assert_eq!(self.allocated, 0, "pad_sectors called off a sector boundary");
        for _ in 0..n {
            self.write(&ZERO)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn tracks_sector_boundaries() {
        let mut out = VecOut(Vec::new());
        let mut s = SectorOutStream::new(&mut out);
        s.write(&[1; 100]).unwrap();
        assert_eq!(s.sector(), 0);
        assert_eq!(s.allocated(), 100);
        assert_eq!(s.remaining(), 1948);

        s.pad_sector().unwrap();
        assert_eq!(s.sector(), 1);
        assert_eq!(s.allocated(), 0);
        assert_eq!(out.0.len(), 2048);
    }

    #[test]
    fn write_spanning_multiple_sectors() {
        let mut out = VecOut(Vec::new());
        let mut s = SectorOutStream::new(&mut out);
        s.write(&vec![7; 2048 * 3 + 10]).unwrap();
        assert_eq!(s.sector(), 3);
        assert_eq!(s.allocated(), 10);
    }
}
