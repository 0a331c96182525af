use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use mio::Poll;
use mio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::server::context::ServerContext;
use crate::server::reactor::{Reactor, ShutdownHandle};

/// A bound listener plus the reactor and workers that will serve it.
pub struct Server {
    reactor: Reactor,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the listening socket and starts the worker pool.
    ///
    /// Fails if the address is taken or any worker cannot be spawned.
    pub fn bind(cfg: &Config) -> anyhow::Result<Self> {
        cfg.validate()?;
        let addr = cfg.listen_addr()?;

        let listener =
            TcpListener::bind(addr).with_context(|| format!("failed to bind {addr}"))?;
        let poll = Poll::new().context("failed to create poller")?;
        let reactor = Reactor::new(poll, listener, cfg)?;
        let local_addr = reactor.local_addr()?;

        info!(
            addr = %local_addr,
            root = %cfg.static_files.root.display(),
            "Listening on {}",
            local_addr
        );
        Ok(Self {
            reactor,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.reactor.shutdown_handle()
    }

    pub fn context(&self) -> Arc<ServerContext> {
        self.reactor.context()
    }

    /// Serves until shut down. Blocks the calling thread.
    pub fn run(self) -> anyhow::Result<()> {
        self.reactor.run().context("event loop failed")
    }
}
