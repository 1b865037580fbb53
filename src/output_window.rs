#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::io::{self, Write};

use anyhow::{ensure, Result};
use crc::{Crc, Digest};

use crate::error::DecodeError;

////////////////////////////////////////////////////////////////////////////////

pub const WINDOW_SIZE: usize = 32768;

/// Decoded bytes that have not reached the sink yet.
///
/// `flush_excess` moves all but the trailing `WINDOW_SIZE` bytes to the sink,
/// so back-references can always reach the last `WINDOW_SIZE` bytes. It runs
/// on its own whenever the buffer reaches `2 * WINDOW_SIZE`. `finish` drains
/// the rest.
pub struct OutputWindow<W> {
    inner: W,
    buffer: VecDeque<u8>,
    byte_count: usize,
    digest: Digest<'static, u32>,
}

impl<W: Write> Write for OutputWindow<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend(buf);
        self.byte_count += buf.len();
        self.trim()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> OutputWindow<W> {
    pub fn new(inner: W) -> Self {
        static CRC: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
        Self {
            inner,
            buffer: VecDeque::<u8>::with_capacity(2 * WINDOW_SIZE),
            byte_count: 0,
            digest: CRC.digest(),
        }
    }

    /// Append `len` bytes starting `dist` bytes before the current end.
    ///
    /// Bytes are re-read one at a time, so with `dist < len` the copy repeats
    /// the bytes it has just produced.
    pub fn write_previous(&mut self, dist: usize, len: usize) -> Result<()> {
        ensure!(
            dist != 0 && dist <= self.history_len(),
            DecodeError::corrupt(format!(
                "distance {} is outside the {} byte window",
                dist,
                self.history_len()
            ))
        );

        for _ in 0..len {
            let byte = self.buffer[self.buffer.len() - dist];
            self.buffer.push_back(byte);
        }
        self.byte_count += len;
        self.trim()?;
        Ok(())
    }

    /// How far back a reference may currently reach.
    pub fn history_len(&self) -> usize {
        self.buffer.len().min(WINDOW_SIZE)
    }

    /// Send everything but the trailing window to the sink.
    pub fn flush_excess(&mut self) -> io::Result<()> {
        let excess = self.buffer.len().saturating_sub(WINDOW_SIZE);
        if excess == 0 {
            return Ok(());
        }

        let (front, back) = self.buffer.as_slices();
        let head = &front[..excess.min(front.len())];
        let tail = &back[..excess - head.len()];
        Self::emit(&mut self.inner, &mut self.digest, head)?;
        Self::emit(&mut self.inner, &mut self.digest, tail)?;
        self.buffer.drain(..excess);
        Ok(())
    }

    fn trim(&mut self) -> io::Result<()> {
        if self.buffer.len() >= 2 * WINDOW_SIZE {
            self.flush_excess()?;
        }
        Ok(())
    }

    fn emit(inner: &mut W, digest: &mut Digest<'static, u32>, bytes: &[u8]) -> io::Result<()> {
        inner.write_all(bytes)?;
        digest.update(bytes);
        Ok(())
    }

    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    /// Flush all buffered bytes and return the CRC-32 of everything written.
    pub fn finish(mut self) -> io::Result<(u32, W)> {
        let (front, back) = self.buffer.as_slices();
        Self::emit(&mut self.inner, &mut self.digest, front)?;
        Self::emit(&mut self.inner, &mut self.digest, back)?;
        self.buffer.clear();
        self.inner.flush()?;
        Ok((self.digest.finalize(), self.inner))
    }
}

////////////////////////////////////////////////////////////////////////////////
