// src/common/mock.rs

// Scripted transport shared by the unit tests.

use super::hal_traits::{CmdSerial, CmdTimer};
use arrayvec::ArrayVec;

// --- Mock Comm Error ---
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MockCommError;

// --- Mock Interface ---
// Reads are served from a script of chunks, one chunk (or what fits of it) per
// read call. An empty chunk answers `WouldBlock`, as does an exhausted script.
#[derive(Clone)]
pub struct MockInterface {
    data: ArrayVec<u8, 1024>,
    chunks: ArrayVec<(usize, usize), 256>, // (start, len) into `data`
    chunk_pos: usize,
    pub read_calls: u32,
    pub fail_reads: bool,
    write_log: ArrayVec<u8, 1024>,
    pub write_calls: u32,
    pub flush_calls: u32,
    /// Number of `WouldBlock` answers before writes are accepted.
    pub write_blocks: u32,
    /// Upper bound on bytes accepted per write call.
    pub write_accept_max: usize,
    pub fail_writes: bool,
    pub delay_calls: u32,
    pub elapsed_us: u64,
}

impl MockInterface {
    pub fn new() -> Self {
        MockInterface {
            data: ArrayVec::new(),
            chunks: ArrayVec::new(),
            chunk_pos: 0,
            read_calls: 0,
            fail_reads: false,
            write_log: ArrayVec::new(),
            write_calls: 0,
            flush_calls: 0,
            write_blocks: 0,
            write_accept_max: usize::MAX,
            fail_writes: false,
            delay_calls: 0,
            elapsed_us: 0,
        }
    }

    pub fn stage_chunk(&mut self, bytes: &[u8]) {
        let start = self.data.len();
        self.data
            .try_extend_from_slice(bytes)
            .expect("mock data store full");
        self.chunks.push((start, bytes.len()));
    }

    pub fn stage_empty(&mut self, count: usize) {
        for _ in 0..count {
            self.chunks.push((self.data.len(), 0));
        }
    }

    pub fn written(&self) -> &[u8] {
        &self.write_log
    }

    pub fn pending_chunks(&self) -> usize {
        self.chunks.len() - self.chunk_pos
    }
}

impl CmdTimer for MockInterface {
    fn delay_us(&mut self, us: u32) {
        self.delay_calls += 1;
        self.elapsed_us += us as u64;
    }
    fn delay_ms(&mut self, ms: u32) {
        self.delay_calls += 1;
        self.elapsed_us += (ms as u64) * 1000;
    }
}

impl CmdSerial for MockInterface {
    type Error = MockCommError;

    fn read(&mut self, buf: &mut [u8]) -> nb::Result<usize, Self::Error> {
        self.read_calls += 1;
        if self.fail_reads {
            return Err(nb::Error::Other(MockCommError));
        }
        let Some(&(start, len)) = self.chunks.get(self.chunk_pos) else {
            return Err(nb::Error::WouldBlock);
        };
        if len == 0 {
            self.chunk_pos += 1;
            return Err(nb::Error::WouldBlock);
        }
        let n = len.min(buf.len());
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        if n == len {
            self.chunk_pos += 1;
        } else {
            // Leave the remainder for the next call.
            self.chunks[self.chunk_pos] = (start + n, len - n);
        }
        Ok(n)
    }

    fn write(&mut self, bytes: &[u8]) -> nb::Result<usize, Self::Error> {
        self.write_calls += 1;
        if self.fail_writes {
            return Err(nb::Error::Other(MockCommError));
        }
        if self.write_blocks > 0 {
            self.write_blocks -= 1;
            return Err(nb::Error::WouldBlock);
        }
        let n = bytes.len().min(self.write_accept_max);
        self.write_log
            .try_extend_from_slice(&bytes[..n])
            .expect("mock write log full");
        Ok(n)
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.flush_calls += 1;
        Ok(())
    }
}
