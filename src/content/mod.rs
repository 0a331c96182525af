//! Static content lookup.
//!
//! Request paths are resolved against a single document root and served
//! straight out of a read-only memory mapping.

pub mod resolver;

pub use resolver::{DocumentRoot, MappedFile, ResolveError};
