use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use mio::Registry;

use crate::config::Config;
use crate::content::DocumentRoot;

/// Buffer sizes every connection is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
}

/// State shared by the reactor and every connection: the readiness
/// registry, the document root, buffer limits and counters.
#[derive(Debug)]
pub struct ServerContext {
    registry: Registry,
    root: DocumentRoot,
    limits: Limits,
    stats: ServerStats,
}

impl ServerContext {
    pub fn new(registry: Registry, cfg: &Config) -> Self {
        Self {
            registry,
            root: DocumentRoot::new(&cfg.static_files.root),
            limits: Limits {
                read_buffer_size: cfg.limits.read_buffer_size,
                write_buffer_size: cfg.limits.write_buffer_size,
            },
            stats: ServerStats::default(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn root(&self) -> &DocumentRoot {
        &self.root
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}

/// Server-wide counters.
#[derive(Debug, Default)]
pub struct ServerStats {
    active: AtomicUsize,
    accepted: AtomicU64,
    responses: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`ServerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub active_connections: usize,
    pub accepted: u64,
    pub responses: u64,
    pub dropped: u64,
}

impl ServerStats {
    pub fn connection_opened(&self) {
        self.active.fetch_add(1, Ordering::Relaxed);
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn response_sent(&self) {
        self.responses.fetch_add(1, Ordering::Relaxed);
    }

    /// Work turned away because the queue was full.
    pub fn work_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            active_connections: self.active.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
