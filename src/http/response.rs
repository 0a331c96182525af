use std::fmt::{self, Write as _};

use bytes::BytesMut;
use thiserror::Error;

use crate::content::{MappedFile, ResolveError};
use crate::http::request::HTTP_1_1;

/// HTTP status codes the server produces.
///
/// - `Ok` (200): the requested file follows
/// - `BadRequest` (400): malformed request or directory target
/// - `Forbidden` (403): file is not world-readable
/// - `NotFound` (404): no such file
/// - `InternalServerError` (500): the file could not be served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 500 Internal Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use lantern::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::Forbidden.as_u16(), 403);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the reason phrase sent on the status line.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Error",
        }
    }

    /// Fixed page sent with every error status. Empty for `Ok`.
    pub fn canned_body(&self) -> &'static str {
        match self {
            StatusCode::Ok => "",
            StatusCode::BadRequest => {
                "Your request has bad syntax or is inherently impossible to satisfy.\n"
            }
            StatusCode::Forbidden => "You do not have permission to get file from this server.\n",
            StatusCode::NotFound => "The requested file was not found on this server.\n",
            StatusCode::InternalServerError => {
                "There was an unusual problem serving the requested file.\n"
            }
        }
    }
}

/// What a worker decided to answer for one request.
#[derive(Debug)]
pub enum Outcome {
    /// Serve the mapped file without copying it.
    File(MappedFile),
    BadRequest,
    Forbidden,
    NotFound,
    InternalError,
}

impl Outcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::File(_) => StatusCode::Ok,
            Outcome::BadRequest => StatusCode::BadRequest,
            Outcome::Forbidden => StatusCode::Forbidden,
            Outcome::NotFound => StatusCode::NotFound,
            Outcome::InternalError => StatusCode::InternalServerError,
        }
    }
}

impl From<ResolveError> for Outcome {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(_) => Outcome::NotFound,
            ResolveError::Traversal(_) | ResolveError::Forbidden(_) => Outcome::Forbidden,
            ResolveError::Directory(_) => Outcome::BadRequest,
            ResolveError::Io { .. } => Outcome::InternalError,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("response head exceeds write buffer of {capacity} bytes")]
    Overflow { capacity: usize },
}

/// Fixed-capacity buffer for the status line, headers and canned bodies.
///
/// Appends that would not fit fail as a whole and leave the buffer unchanged.
#[derive(Debug)]
pub struct WriteBuffer {
    buf: BytesMut,
    capacity: usize,
}

impl WriteBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    fn append(&mut self, args: fmt::Arguments<'_>) -> Result<(), BuildError> {
        let mark = self.buf.len();
        self.write_fmt(args).map_err(|_| {
            self.buf.truncate(mark);
            BuildError::Overflow {
                capacity: self.capacity,
            }
        })
    }

    pub fn status_line(&mut self, status: StatusCode) -> Result<(), BuildError> {
        self.append(format_args!(
            "{} {} {}\r\n",
            HTTP_1_1,
            status.as_u16(),
            status.reason_phrase()
        ))
    }

    /// Writes the fixed header set and the blank line that ends it.
    pub fn headers(&mut self, content_length: usize, keep_alive: bool) -> Result<(), BuildError> {
        self.append(format_args!("Content-Length: {content_length}\r\n"))?;
        self.append(format_args!("Content-Type: text/html\r\n"))?;
        self.append(format_args!(
            "Connection: {}\r\n",
            if keep_alive { "keep-alive" } else { "close" }
        ))?;
        self.append(format_args!("\r\n"))
    }

    pub fn content(&mut self, body: &str) -> Result<(), BuildError> {
        self.append(format_args!("{body}"))
    }
}

impl fmt::Write for WriteBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.buf.len() + s.len() > self.capacity {
            return Err(fmt::Error);
        }
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }
}
