//! HTTP protocol implementation.
//!
//! This module implements the HTTP/1.1 side of the server: GET requests for
//! static files, with keep-alive.
//!
//! # Architecture
//!
//! - **`buffer`**: Fixed-capacity receive buffer and line scanner
//! - **`parser`**: Incremental request parser driven line by line
//! - **`request`**: Parsed request fields
//! - **`response`**: Status codes, canned error pages and the bounded head buffer
//! - **`writer`**: Two-segment scatter-gather response writer
//! - **`connection`**: The per-socket state machine tying the above together
//!
//! # Connection State Machine
//!
//! A connection alternates between the reactor thread and a worker:
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← reactor drains the socket
//!        └──────┬──────┘
//!               │ bytes buffered
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← worker parses; incomplete → Reading
//!        └──────┬───────────┘
//!               │ response built
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← reactor flushes head + mapped file
//!        └──────┬───────────┘
//!               │ response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```
//!
//! Inside Processing the parser walks `RequestLine → Headers → Content`,
//! one transition per step.

pub mod buffer;
pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
