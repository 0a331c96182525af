//! The readiness event loop.
//!
//! One thread owns the poller, the listener and the connection table. A
//! connection leaves the table while a worker processes it and comes back
//! through the completion channel; only then is its socket rearmed. Events
//! for a connection that is out of the table are ignored, and rearming
//! re-reports any readiness that arrived in the meantime.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use mio::event::Event;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::http::connection::{Connection, Next};
use crate::server::context::ServerContext;
use crate::server::pool::{PoolError, SubmitError, WorkerPool};
use crate::server::slab::{ConnId, ConnectionSlab, MAX_SLOTS};

const LISTENER: Token = Token(MAX_SLOTS);
const WAKER: Token = Token(MAX_SLOTS + 1);

const MAX_EVENTS: usize = 1024;
/// How often idle connections are looked for.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// A connection on its way to a worker.
struct Job {
    id: ConnId,
    conn: Box<Connection>,
}

/// A connection on its way back from a worker.
struct Completion {
    id: ConnId,
    conn: Box<Connection>,
    next: Next,
}

/// Stops a running reactor from another thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.requested.store(true, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            error!(error = %e, "failed to wake reactor for shutdown");
        }
    }
}

pub struct Reactor {
    poll: Poll,
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    conns: ConnectionSlab<Box<Connection>>,
    pool: WorkerPool<Job>,
    completions: Receiver<Completion>,
    shutdown: ShutdownHandle,
    idle_timeout: Option<Duration>,
}

impl Reactor {
    /// Registers the listener and starts the worker pool.
    pub fn new(poll: Poll, listener: TcpListener, cfg: &Config) -> anyhow::Result<Self> {
        Self::with_processor(poll, listener, cfg, Connection::process)
    }

    /// Like [`Reactor::new`], with `process` run by the workers for every
    /// connection handed to them.
    fn with_processor<P>(
        poll: Poll,
        mut listener: TcpListener,
        cfg: &Config,
        process: P,
    ) -> anyhow::Result<Self>
    where
        P: Fn(&mut Connection) -> Next + Send + Sync + 'static,
    {
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);
        let ctx = Arc::new(ServerContext::new(poll.registry().try_clone()?, cfg));

        let (tx, completions) = mpsc::channel();
        let pool = start_pool(cfg, tx, Arc::clone(&waker), process)?;

        Ok(Self {
            poll,
            listener,
            ctx,
            conns: ConnectionSlab::with_capacity(cfg.server.max_connections),
            pool,
            completions,
            shutdown: ShutdownHandle {
                requested: Arc::new(AtomicBool::new(false)),
                waker,
            },
            idle_timeout: cfg.server.idle_timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(&self.ctx)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs until a [`ShutdownHandle`] fires or polling fails.
    pub fn run(mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(MAX_EVENTS);
        let timeout = self.idle_timeout.map(|_| SWEEP_INTERVAL);

        while !self.shutdown.requested.load(Ordering::Acquire) {
            if let Err(e) = self.poll.poll(&mut events, timeout) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e);
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept(),
                    WAKER => self.collect_completions(),
                    token => self.dispatch(ConnId::from_token(token), event),
                }
            }

            if let Some(limit) = self.idle_timeout {
                self.close_idle(limit);
            }
        }

        self.stop();
        Ok(())
    }

    fn accept(&mut self) {
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    return;
                }
            };

            let Some(id) = self.conns.reserve() else {
                warn!(%peer, limit = self.conns.capacity(), "connection limit reached, refusing");
                drop(stream);
                continue;
            };

            match Connection::new(id, stream, peer, Arc::clone(&self.ctx)) {
                Ok(conn) => {
                    let stats = self.ctx.stats();
                    stats.connection_opened();
                    info!(
                        conn = %id,
                        %peer,
                        active = stats.active_connections(),
                        "accepted connection"
                    );
                    self.park(id, Box::new(conn), Next::Read);
                }
                Err(e) => {
                    self.conns.release(id);
                    error!(%peer, error = %e, "failed to register connection");
                }
            }
        }
    }

    fn dispatch(&mut self, id: ConnId, event: &Event) {
        let Some(mut conn) = self.conns.take(id) else {
            trace!(conn = %id, "event for connection not in the table");
            return;
        };

        if event.is_error() || event.is_read_closed() || event.is_write_closed() {
            debug!(conn = %id, "peer hung up");
            self.close(id, conn);
            return;
        }

        if event.is_readable() {
            match conn.drain() {
                Ok(_) => self.submit(id, conn),
                Err(e) => {
                    debug!(conn = %id, error = %e, "read failed");
                    self.close(id, conn);
                }
            }
        } else if event.is_writable() {
            match conn.flush() {
                Ok(next) => self.park(id, conn, next),
                Err(e) => {
                    debug!(conn = %id, error = %e, "write failed");
                    self.close(id, conn);
                }
            }
        } else {
            self.park(id, conn, Next::Read);
        }
    }

    fn submit(&mut self, id: ConnId, conn: Box<Connection>) {
        match self.pool.submit(Job { id, conn }) {
            Ok(()) => {}
            Err(SubmitError::Full(job)) => {
                // parked until the client sends more
                warn!(conn = %id, "work queue full, dropping request");
                self.ctx.stats().work_dropped();
                self.park(id, job.conn, Next::Read);
            }
            Err(SubmitError::Closed(job)) => self.close(id, job.conn),
        }
    }

    fn collect_completions(&mut self) {
        while let Ok(Completion { id, conn, next }) = self.completions.try_recv() {
            self.park(id, conn, next);
        }
    }

    /// Returns a connection to the table and rearms it.
    fn park(&mut self, id: ConnId, mut conn: Box<Connection>, next: Next) {
        if next == Next::Close {
            self.close(id, conn);
            return;
        }
        if let Err(e) = conn.rearm(next) {
            error!(conn = %id, error = %e, "failed to rearm socket");
            self.close(id, conn);
            return;
        }
        conn.touch();
        if let Err(conn) = self.conns.restore(id, conn) {
            warn!(conn = %id, "slot reused while connection was out");
            self.close(id, conn);
        }
    }

    fn close(&mut self, id: ConnId, mut conn: Box<Connection>) {
        if let Err(e) = conn.deregister() {
            trace!(conn = %id, error = %e, "deregister failed");
        }
        self.conns.release(id);
        self.ctx.stats().connection_closed();
        info!(conn = %id, peer = %conn.peer(), "closed connection");
    }

    fn close_idle(&mut self, limit: Duration) {
        let now = Instant::now();
        let idle: Vec<ConnId> = self
            .conns
            .occupied()
            .filter(|(_, conn)| conn.idle_for(now) >= limit)
            .map(|(id, _)| id)
            .collect();

        for id in idle {
            if let Some(conn) = self.conns.take(id) {
                debug!(conn = %id, "idle timeout");
                self.close(id, conn);
            }
        }
    }

    fn stop(&mut self) {
        info!("shutting down");
        self.pool.shutdown();
        while let Ok(Completion { id, conn, .. }) = self.completions.try_recv() {
            self.close(id, conn);
        }

        for id in self.conns.ids() {
            match self.conns.take(id) {
                Some(conn) => self.close(id, conn),
                None => {
                    self.conns.release(id);
                }
            }
        }
    }
}

/// Workers run `process` and send the connection back, then wake the
/// reactor so it can rearm the socket.
fn start_pool<P>(
    cfg: &Config,
    tx: Sender<Completion>,
    waker: Arc<Waker>,
    process: P,
) -> Result<WorkerPool<Job>, PoolError>
where
    P: Fn(&mut Connection) -> Next + Send + Sync + 'static,
{
    WorkerPool::new(
        cfg.pool.threads,
        cfg.pool.queue_capacity,
        move |Job { id, mut conn }| {
            let next = process(&mut *conn);
            if tx.send(Completion { id, conn, next }).is_err() {
                return;
            }
            if let Err(e) = waker.wake() {
                error!(conn = %id, error = %e, "failed to wake reactor");
            }
        },
    )
}
