//! Connection admission and scheduling.
//!
//! - **`listener`**: binds the socket and exposes the [`Server`] facade
//! - **`reactor`**: the single-threaded readiness loop
//! - **`pool`**: the bounded worker pool that runs request processing
//! - **`slab`**: generation-checked connection table
//! - **`context`**: state shared between the reactor and connections

pub mod context;
pub mod listener;
pub mod pool;
pub mod reactor;
pub mod slab;

pub use listener::Server;
pub use reactor::ShutdownHandle;
