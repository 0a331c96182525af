use std::io::{self, IoSlice, Write};

use crate::content::MappedFile;
use crate::http::response::{BuildError, Outcome, WriteBuffer};

/// How far a flush got before the socket stopped accepting bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    /// The socket would block; call again once it is writable.
    Pending,
    /// Every byte of the response has been sent.
    Complete,
}

/// Holds one serialized response as up to two send segments: the head
/// buffer and, for files, the mapped body.
#[derive(Debug)]
pub struct ResponseWriter {
    head: WriteBuffer,
    body: Option<MappedFile>,
    head_sent: usize,
    body_sent: usize,
    bytes_to_send: usize,
    bytes_sent: usize,
}

impl ResponseWriter {
    pub fn new(capacity: usize) -> Self {
        Self {
            head: WriteBuffer::with_capacity(capacity),
            body: None,
            head_sent: 0,
            body_sent: 0,
            bytes_to_send: 0,
            bytes_sent: 0,
        }
    }

    pub fn head(&self) -> &WriteBuffer {
        &self.head
    }

    pub fn body(&self) -> Option<&MappedFile> {
        self.body.as_ref()
    }

    pub fn bytes_to_send(&self) -> usize {
        self.bytes_to_send
    }

    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    /// Serializes the response for `outcome`.
    ///
    /// A file body is referenced, not copied. Error pages are appended to the
    /// head buffer. On overflow the writer is left empty.
    pub fn build(&mut self, outcome: Outcome, keep_alive: bool) -> Result<(), BuildError> {
        self.clear();
        let status = outcome.status();

        let built = self.head.status_line(status).and_then(|()| match outcome {
            Outcome::File(file) => {
                self.head.headers(file.len(), keep_alive)?;
                self.body = Some(file);
                Ok(())
            }
            _ => {
                let page = status.canned_body();
                self.head.headers(page.len(), keep_alive)?;
                self.head.content(page)
            }
        });
        if let Err(e) = built {
            self.clear();
            return Err(e);
        }

        self.bytes_to_send = self.head.len() + self.body.as_ref().map_or(0, MappedFile::len);
        Ok(())
    }

    /// Sends pending segments with vectored writes until done or blocked.
    ///
    /// Progress survives a `Pending` return: the head is drained first, then
    /// the body resumes from the exact byte where the socket stopped.
    pub fn write_to<W: Write>(&mut self, out: &mut W) -> io::Result<WriteProgress> {
        while self.bytes_sent < self.bytes_to_send {
            let head = &self.head.as_bytes()[self.head_sent..];
            let body = self
                .body
                .as_ref()
                .map_or(&[][..], |f| &f.as_bytes()[self.body_sent..]);

            let written = out.write_vectored(&[IoSlice::new(head), IoSlice::new(body)]);
            match written {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "socket accepted no bytes",
                    ));
                }
                Ok(n) => self.advance(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(WriteProgress::Pending);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(WriteProgress::Complete)
    }

    fn advance(&mut self, n: usize) {
        let from_head = n.min(self.head.len() - self.head_sent);
        self.head_sent += from_head;
        self.body_sent += n - from_head;
        self.bytes_sent += n;
    }

    /// Drops the file mapping, if any.
    pub fn release(&mut self) {
        self.body = None;
    }

    pub fn clear(&mut self) {
        self.head.clear();
        self.release();
        self.head_sent = 0;
        self.body_sent = 0;
        self.bytes_to_send = 0;
        self.bytes_sent = 0;
    }
}
