//! Lantern - static file server
//!
//! A readiness-driven HTTP/1.1 server: one reactor thread owns every socket,
//! a bounded pool of workers parses requests and builds responses, and files
//! are sent straight from memory mappings.

pub mod config;
pub mod content;
pub mod http;
pub mod server;
