//! Bounded worker pool.
//!
//! A fixed set of threads pops work from one FIFO queue. Submission never
//! blocks: a full queue hands the item straight back to the caller.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool needs at least one thread")]
    NoThreads,
    #[error("worker pool needs a queue capacity of at least one")]
    NoCapacity,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Rejected submission; carries the item back.
pub enum SubmitError<T> {
    /// The queue already holds `capacity` items.
    Full(T),
    /// The pool is shutting down.
    Closed(T),
}

impl<T> SubmitError<T> {
    pub fn into_inner(self) -> T {
        match self {
            SubmitError::Full(item) | SubmitError::Closed(item) => item,
        }
    }
}

impl<T> fmt::Debug for SubmitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Full(_) => f.write_str("Full(..)"),
            SubmitError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<T> fmt::Display for SubmitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Full(_) => f.write_str("work queue is full"),
            SubmitError::Closed(_) => f.write_str("worker pool is shut down"),
        }
    }
}

struct Queue<T> {
    items: VecDeque<T>,
    closed: bool,
}

struct Shared<T> {
    queue: Mutex<Queue<T>>,
    /// Signalled once per queued item, and for everyone on shutdown.
    available: Condvar,
    capacity: usize,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Queue<T>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct WorkerPool<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> fmt::Debug for WorkerPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.workers.len())
            .field("capacity", &self.shared.capacity)
            .finish()
    }
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawns `threads` workers that run `handler` on every submitted item.
    ///
    /// Either every worker starts or none stays running.
    pub fn new<F>(threads: usize, capacity: usize, handler: F) -> Result<Self, PoolError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        if threads == 0 {
            return Err(PoolError::NoThreads);
        }
        if capacity == 0 {
            return Err(PoolError::NoCapacity);
        }

        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                items: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
        });
        let handler = Arc::new(handler);

        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(threads),
        };
        for i in 0..threads {
            let shared = Arc::clone(&pool.shared);
            let handler = Arc::clone(&handler);
            let spawned = thread::Builder::new()
                .name(format!("worker-{i}"))
                .spawn(move || work(&shared, &*handler));

            match spawned {
                Ok(handle) => pool.workers.push(handle),
                // dropping `pool` stops and joins the workers spawned so far
                Err(e) => return Err(PoolError::Spawn(e)),
            }
        }

        info!(threads, capacity, "worker pool started");
        Ok(pool)
    }

    /// Queues an item at the tail without blocking.
    pub fn submit(&self, item: T) -> Result<(), SubmitError<T>> {
        {
            let mut queue = self.shared.lock();
            if queue.closed {
                return Err(SubmitError::Closed(item));
            }
            if queue.items.len() >= self.shared.capacity {
                return Err(SubmitError::Full(item));
            }
            queue.items.push_back(item);
        }
        self.shared.available.notify_one();
        Ok(())
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Items waiting for a worker.
    pub fn queued(&self) -> usize {
        self.shared.lock().items.len()
    }

    /// Refuses new work, lets the workers drain what is queued and joins them.
    pub fn shutdown(&mut self) {
        self.shared.lock().closed = true;
        self.shared.available.notify_all();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                debug!("worker thread panicked");
            }
        }
    }
}

impl<T: Send + 'static> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn work<T, F: Fn(T)>(shared: &Shared<T>, handler: &F) {
    loop {
        let item = {
            let mut queue = shared.lock();
            loop {
                if let Some(item) = queue.items.pop_front() {
                    break item;
                }
                if queue.closed {
                    return;
                }
                // spurious wakeups land back here
                queue = shared
                    .available
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };
        handler(item);
    }
}
