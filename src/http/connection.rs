use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mio::Interest;
use mio::net::TcpStream;
use tracing::{debug, trace, warn};

use crate::http::buffer::ReadBuffer;
use crate::http::parser::{ParseError, RequestParser};
use crate::http::response::Outcome;
use crate::http::writer::{ResponseWriter, WriteProgress};
use crate::server::context::ServerContext;
use crate::server::slab::ConnId;

/// What the connection wants from the reactor next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Rearm for readable.
    Read,
    /// Rearm for writable.
    Write,
    /// Tear the connection down.
    Close,
}

/// One accepted socket and everything needed to serve it.
///
/// A connection is owned by exactly one thread at a time: the reactor while
/// it waits for readiness, a worker while it is being processed.
#[derive(Debug)]
pub struct Connection {
    id: ConnId,
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<ServerContext>,
    read_buf: ReadBuffer,
    parser: RequestParser,
    writer: ResponseWriter,
    last_active: Instant,
}

impl Connection {
    /// Registers the socket for readable events under `id`.
    pub fn new(
        id: ConnId,
        mut stream: TcpStream,
        peer: SocketAddr,
        ctx: Arc<ServerContext>,
    ) -> io::Result<Self> {
        ctx.registry()
            .register(&mut stream, id.token(), Interest::READABLE)?;

        let limits = ctx.limits();
        Ok(Self {
            id,
            stream,
            peer,
            read_buf: ReadBuffer::with_capacity(limits.read_buffer_size),
            parser: RequestParser::new(),
            writer: ResponseWriter::new(limits.write_buffer_size),
            ctx,
            last_active: Instant::now(),
        })
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Reads everything the socket has for us.
    ///
    /// An error means the connection should be closed.
    pub fn drain(&mut self) -> io::Result<usize> {
        let n = self.read_buf.fill_from(&mut self.stream)?;
        trace!(conn = %self.id, bytes = n, buffered = self.read_buf.read_index(), "drained socket");
        Ok(n)
    }

    /// Parses what has been received and, once the request is whole,
    /// prepares the response. Runs on a worker thread.
    pub fn process(&mut self) -> Next {
        let outcome = match self.parser.parse(&mut self.read_buf) {
            Ok(()) => {
                let request = self.parser.request();
                match self.ctx.root().open(&request.url) {
                    Ok(file) => {
                        trace!(
                            conn = %self.id,
                            file = %file.path().display(),
                            bytes = file.len(),
                            "mapped file"
                        );
                        Outcome::File(file)
                    }
                    Err(e) => {
                        debug!(conn = %self.id, path = %request.url, error = %e, "cannot serve");
                        Outcome::from(e)
                    }
                }
            }
            Err(ParseError::Incomplete) => return Next::Read,
            Err(e) => {
                debug!(conn = %self.id, peer = %self.peer, error = %e, "malformed request");
                Outcome::BadRequest
            }
        };

        let status = outcome.status();
        let keep_alive = self.parser.request().keep_alive;
        match self.writer.build(outcome, keep_alive) {
            Ok(()) => {
                debug!(
                    conn = %self.id,
                    status = status.as_u16(),
                    path = %self.parser.request().url,
                    keep_alive,
                    "response ready"
                );
                Next::Write
            }
            Err(e) => {
                warn!(conn = %self.id, error = %e, "failed to build response");
                Next::Close
            }
        }
    }

    /// Sends as much of the prepared response as the socket takes.
    ///
    /// An error means the connection should be closed.
    pub fn flush(&mut self) -> io::Result<Next> {
        if self.writer.bytes_to_send() == 0 {
            self.reset();
            return Ok(Next::Read);
        }

        match self.writer.write_to(&mut self.stream) {
            Ok(WriteProgress::Pending) => {
                trace!(
                    conn = %self.id,
                    sent = self.writer.bytes_sent(),
                    total = self.writer.bytes_to_send(),
                    "socket full, waiting for writable"
                );
                Ok(Next::Write)
            }
            Ok(WriteProgress::Complete) => {
                self.writer.release();
                self.ctx.stats().response_sent();
                if self.parser.request().keep_alive {
                    self.reset();
                    Ok(Next::Read)
                } else {
                    Ok(Next::Close)
                }
            }
            Err(e) => {
                self.writer.release();
                Err(e)
            }
        }
    }

    /// Re-registers interest. Events for this socket are not handled until
    /// this is called.
    pub fn rearm(&mut self, next: Next) -> io::Result<()> {
        let interest = match next {
            Next::Read => Interest::READABLE,
            Next::Write => Interest::WRITABLE,
            Next::Close => return Ok(()),
        };
        self.ctx
            .registry()
            .reregister(&mut self.stream, self.id.token(), interest)
    }

    /// Clears all per-request state for the next request on this socket.
    pub fn reset(&mut self) {
        self.read_buf.clear();
        self.parser.reset();
        self.writer.clear();
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_active)
    }

    /// Removes the socket from the readiness registry. The socket itself
    /// closes when the connection is dropped.
    pub fn deregister(&mut self) -> io::Result<()> {
        self.ctx.registry().deregister(&mut self.stream)
    }
}
