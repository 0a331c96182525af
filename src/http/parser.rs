use crate::http::buffer::{Line, ReadBuffer};
use crate::http::request::{HTTP_1_1, Method, Request, origin_form};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("need more data")]
    Incomplete,
    #[error("malformed line terminator")]
    MalformedLine,
    #[error("malformed request line")]
    InvalidRequest,
    #[error("unsupported method")]
    InvalidMethod,
    #[error("unsupported http version")]
    InvalidVersion,
    #[error("invalid request target")]
    InvalidTarget,
    #[error("invalid header")]
    InvalidHeader,
    #[error("invalid content-length")]
    InvalidContentLength,
}

/// Which part of the request the parser expects next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CheckState {
    #[default]
    RequestLine,
    Headers,
    Content,
}

/// Incremental request parser.
///
/// Feed it the same [`ReadBuffer`] after every drain; it resumes where it
/// stopped and reports [`ParseError::Incomplete`] until a whole request has
/// been received.
#[derive(Debug, Default)]
pub struct RequestParser {
    state: CheckState,
    request: Request,
}

impl RequestParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CheckState {
        self.state
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn reset(&mut self) {
        self.state = CheckState::RequestLine;
        self.request.clear();
    }

    /// Advances over everything buffered so far.
    ///
    /// Each iteration performs at most one state transition and re-reads the
    /// state before touching the next line.
    pub fn parse(&mut self, buf: &mut ReadBuffer) -> Result<(), ParseError> {
        loop {
            if self.state == CheckState::Content {
                return if buf.has_body(self.request.content_length) {
                    Ok(())
                } else {
                    Err(ParseError::Incomplete)
                };
            }

            let line = match buf.next_line() {
                Line::Complete(line) => line,
                Line::Incomplete => return Err(ParseError::Incomplete),
                Line::Malformed => return Err(ParseError::MalformedLine),
            };
            trace!(line = %String::from_utf8_lossy(line), "http line");

            if self.state == CheckState::RequestLine {
                self.parse_request_line(line)?;
            } else if self.parse_header(line)? {
                return Ok(());
            }
        }
    }

    fn parse_request_line(&mut self, line: &[u8]) -> Result<(), ParseError> {
        let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidRequest)?;
        let mut parts = line.split_ascii_whitespace();

        let method = parts.next().ok_or(ParseError::InvalidRequest)?;
        let target = parts.next().ok_or(ParseError::InvalidRequest)?;
        let version = parts.next().ok_or(ParseError::InvalidRequest)?;
        if parts.next().is_some() {
            return Err(ParseError::InvalidRequest);
        }

        self.request.method = Method::parse(method).ok_or(ParseError::InvalidMethod)?;
        if !version.eq_ignore_ascii_case(HTTP_1_1) {
            return Err(ParseError::InvalidVersion);
        }
        self.request.url = origin_form(target).ok_or(ParseError::InvalidTarget)?;
        self.request.version = version.to_string();

        self.state = CheckState::Headers;
        Ok(())
    }

    /// Returns `true` once the blank line ends a request without a body.
    fn parse_header(&mut self, line: &[u8]) -> Result<bool, ParseError> {
        if line.is_empty() {
            if self.request.content_length > 0 {
                self.state = CheckState::Content;
                return Ok(false);
            }
            return Ok(true);
        }

        let Some(colon) = line.iter().position(|&b| b == b':') else {
            trace!(header = %String::from_utf8_lossy(line), "ignoring unknown header");
            return Ok(false);
        };
        let name = line[..colon].trim_ascii();
        let value = line[colon + 1..].trim_ascii();

        if name.eq_ignore_ascii_case(b"Connection") {
            self.request.keep_alive = value.eq_ignore_ascii_case(b"keep-alive");
        } else if name.eq_ignore_ascii_case(b"Content-Length") {
            self.request.content_length = std::str::from_utf8(value)
                .ok()
                .and_then(|v| v.parse().ok())
                .ok_or(ParseError::InvalidContentLength)?;
        } else if name.eq_ignore_ascii_case(b"Host") {
            let host = std::str::from_utf8(value).map_err(|_| ParseError::InvalidHeader)?;
            self.request.host = Some(host.to_string());
        } else {
            trace!(header = %String::from_utf8_lossy(name), "ignoring unknown header");
        }
        Ok(false)
    }
}
