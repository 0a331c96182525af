//! Fixed-capacity receive buffer with an incremental line scanner.
//!
//! The buffer never grows: a request that does not fit is rejected by
//! [`ReadBuffer::fill_from`] once the buffer is full. Line scanning hands out
//! borrowed slices and leaves the received bytes untouched.

use std::io::{self, Read};

/// Result of scanning for the next line.
#[derive(Debug, PartialEq, Eq)]
pub enum Line<'a> {
    /// A full line, terminator excluded.
    Complete(&'a [u8]),
    /// A `\r` not followed by `\n`, or a bare `\n`.
    Malformed,
    /// No terminator yet.
    Incomplete,
}

/// Owned, bounded byte buffer holding one request.
///
/// Cursors always satisfy `start_line <= checked_index <= read_index <= capacity`.
#[derive(Debug)]
pub struct ReadBuffer {
    data: Box<[u8]>,
    /// Bytes received so far.
    read_index: usize,
    /// Bytes already examined by the line scanner.
    checked_index: usize,
    /// Offset of the line currently being assembled.
    start_line: usize,
}

impl ReadBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            read_index: 0,
            checked_index: 0,
            start_line: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn read_index(&self) -> usize {
        self.read_index
    }

    pub fn checked_index(&self) -> usize {
        self.checked_index
    }

    pub fn start_line(&self) -> usize {
        self.start_line
    }

    pub fn is_full(&self) -> bool {
        self.read_index >= self.data.len()
    }

    /// Received bytes that no complete line has consumed yet.
    pub fn unconsumed(&self) -> &[u8] {
        &self.data[self.start_line..self.read_index]
    }

    /// Copies as much of `bytes` as fits and returns how many were taken.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.data.len() - self.read_index);
        self.data[self.read_index..self.read_index + n].copy_from_slice(&bytes[..n]);
        self.read_index += n;
        n
    }

    /// Drains a non-blocking source into the buffer.
    ///
    /// Reads until the source would block or the buffer fills up, and returns
    /// the number of bytes appended (possibly zero). Fails if the buffer was
    /// already full on entry, if the peer closed the stream, or on any error
    /// other than `WouldBlock`.
    pub fn fill_from<R: Read>(&mut self, src: &mut R) -> io::Result<usize> {
        if self.is_full() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "request exceeds read buffer",
            ));
        }

        let mut total = 0;
        while !self.is_full() {
            match src.read(&mut self.data[self.read_index..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "peer closed connection",
                    ));
                }
                Ok(n) => {
                    self.read_index += n;
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    /// Scans forward from `checked_index` for the next `\r\n`.
    ///
    /// On success the cursors move past the terminator and the next line
    /// starts there. A trailing `\r` leaves `checked_index` on the `\r` so the
    /// pair is re-examined once more bytes arrive.
    pub fn next_line(&mut self) -> Line<'_> {
        let mut i = self.checked_index;
        while i < self.read_index {
            match self.data[i] {
                b'\r' if i + 1 == self.read_index => {
                    self.checked_index = i;
                    return Line::Incomplete;
                }
                b'\r' if self.data[i + 1] == b'\n' => {
                    let start = self.start_line;
                    self.checked_index = i + 2;
                    self.start_line = self.checked_index;
                    return Line::Complete(&self.data[start..i]);
                }
                b'\r' | b'\n' => {
                    self.checked_index = i;
                    return Line::Malformed;
                }
                _ => i += 1,
            }
        }
        self.checked_index = i;
        Line::Incomplete
    }

    /// Whether at least `len` body bytes follow the current line start.
    pub fn has_body(&self, len: usize) -> bool {
        self.read_index - self.start_line >= len
    }

    pub fn clear(&mut self) {
        self.read_index = 0;
        self.checked_index = 0;
        self.start_line = 0;
    }
}
