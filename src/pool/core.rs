//! Bounded connection pool
//!
//! Connections are pre-created at construction, handed out exclusively through
//! [`PooledConnection`] guards and returned when the guard drops. Idle
//! connections are re-validated lazily on borrow rather than on return.

use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use crate::error::PoolError;
use crate::pool::factory::ConnectionFactory;

/// Pool sizing and borrow behaviour
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Upper bound on live connections (idle + borrowed). Also the number of
    /// connections created up front.
    pub max_size: usize,
    /// `None` blocks until a connection frees up.
    pub borrow_timeout: Option<Duration>,
    pub test_on_borrow: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            borrow_timeout: Some(Duration::from_secs(30)),
            test_on_borrow: true,
        }
    }
}

/// Snapshot of pool accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub idle: usize,
    pub active: usize,
    pub max: usize,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "idle={} active={} max={}",
            self.idle, self.active, self.max
        )
    }
}

struct Slots<C> {
    idle: VecDeque<C>,
    /// Idle plus borrowed.
    live: usize,
    closed: bool,
}

/// Generic bounded pool over a connection factory.
pub struct Pool<F: ConnectionFactory> {
    factory: F,
    config: PoolConfig,
    slots: Mutex<Slots<F::Connection>>,
    available: Condvar,
}

impl<F: ConnectionFactory> Pool<F> {
    /// Build the pool and pre-populate `max_size` connections.
    ///
    /// Fails fast on the first connection that cannot be created; the ones
    /// already opened are closed again.
    pub fn new(factory: F, config: PoolConfig) -> Result<Self, PoolError> {
        if config.max_size == 0 {
            return Err(PoolError::InvalidSize);
        }

        let mut idle = VecDeque::with_capacity(config.max_size);
        for created in 0..config.max_size {
            match factory.create() {
                Ok(conn) => idle.push_back(conn),
                Err(e) => {
                    warn!(
                        "Pre-populating {} pool failed after {}/{} connections: {}",
                        factory.describe(),
                        created,
                        config.max_size,
                        e
                    );
                    for conn in idle.drain(..) {
                        if let Err(err) = factory.destroy(conn) {
                            warn!("Failed to close {} connection: {}", factory.describe(), err);
                        }
                    }
                    return Err(PoolError::Create(e));
                }
            }
        }

        info!(
            "Initialized {} connection pool with {} connections",
            factory.describe(),
            config.max_size
        );

        let live = idle.len();
        Ok(Self {
            factory,
            config,
            slots: Mutex::new(Slots {
                idle,
                live,
                closed: false,
            }),
            available: Condvar::new(),
        })
    }

    /// Borrow a connection, waiting up to `borrow_timeout` when all are busy.
    pub fn borrow(&self) -> Result<PooledConnection<'_, F>, PoolError> {
        let started = Instant::now();
        let deadline = self.config.borrow_timeout.map(|t| started + t);
        let mut slots = self.slots.lock();

        loop {
            if slots.closed {
                return Err(PoolError::Closed);
            }

            if let Some(mut conn) = slots.idle.pop_front() {
                if !self.config.test_on_borrow {
                    drop(slots);
                    return Ok(self.guard(conn));
                }

                // Probe outside the lock; the slot stays counted as live.
                drop(slots);
                if self.factory.validate(&mut conn) {
                    return Ok(self.guard(conn));
                }
                warn!(
                    "Evicting stale {} connection from pool",
                    self.factory.describe()
                );
                self.destroy_quietly(conn);
                slots = self.slots.lock();
                slots.live -= 1;
                continue;
            }

            if slots.live < self.config.max_size {
                slots.live += 1;
                drop(slots);
                return match self.factory.create() {
                    Ok(conn) => {
                        debug!("Created replacement {} connection", self.factory.describe());
                        Ok(self.guard(conn))
                    }
                    Err(e) => {
                        self.slots.lock().live -= 1;
                        self.available.notify_all();
                        Err(PoolError::Create(e))
                    }
                };
            }

            match deadline {
                None => self.available.wait(&mut slots),
                Some(deadline) => {
                    let timed_out = self.available.wait_until(&mut slots, deadline).timed_out();
                    if timed_out
                        && !slots.closed
                        && slots.idle.is_empty()
                        && slots.live >= self.config.max_size
                    {
                        return Err(PoolError::Exhausted {
                            max: self.config.max_size,
                            waited: started.elapsed(),
                        });
                    }
                }
            }
        }
    }

    /// Borrow two distinct connections at once.
    ///
    /// Both slots are reserved under one lock, so callers that need a pair
    /// never hold one connection while waiting for the other.
    pub fn borrow_pair(
        &self,
    ) -> Result<(PooledConnection<'_, F>, PooledConnection<'_, F>), PoolError> {
        if self.config.max_size < 2 {
            return Err(PoolError::TooSmall {
                needed: 2,
                max: self.config.max_size,
            });
        }

        let started = Instant::now();
        let deadline = self.config.borrow_timeout.map(|t| started + t);
        let mut slots = self.slots.lock();

        let (first, second) = loop {
            if slots.closed {
                return Err(PoolError::Closed);
            }

            let free = slots.idle.len() + (self.config.max_size - slots.live);
            if free >= 2 {
                let first = slots.idle.pop_front();
                let second = slots.idle.pop_front();
                slots.live += usize::from(first.is_none()) + usize::from(second.is_none());
                break (first, second);
            }

            match deadline {
                None => self.available.wait(&mut slots),
                Some(deadline) => {
                    if self.available.wait_until(&mut slots, deadline).timed_out() && !slots.closed {
                        let free = slots.idle.len() + (self.config.max_size - slots.live);
                        if free < 2 {
                            return Err(PoolError::Exhausted {
                                max: self.config.max_size,
                                waited: started.elapsed(),
                            });
                        }
                    }
                }
            }
        };
        drop(slots);

        // A failure on the second slot returns the first through its guard.
        let first = self.guard(self.ready(first)?);
        let second = match self.ready(second) {
            Ok(conn) => self.guard(conn),
            Err(e) => {
                drop(first);
                return Err(e);
            }
        };
        Ok((first, second))
    }

    /// Turn a reserved slot into a usable connection: validate the idle one
    /// it came with, or open a new one. The slot is freed on failure.
    fn ready(&self, conn: Option<F::Connection>) -> Result<F::Connection, PoolError> {
        if let Some(mut conn) = conn {
            if !self.config.test_on_borrow || self.factory.validate(&mut conn) {
                return Ok(conn);
            }
            warn!(
                "Evicting stale {} connection from pool",
                self.factory.describe()
            );
            self.destroy_quietly(conn);
        }

        match self.factory.create() {
            Ok(conn) => {
                debug!("Created replacement {} connection", self.factory.describe());
                Ok(conn)
            }
            Err(e) => {
                self.slots.lock().live -= 1;
                self.available.notify_all();
                Err(PoolError::Create(e))
            }
        }
    }

    /// Current accounting snapshot
    pub fn status(&self) -> PoolStatus {
        let slots = self.slots.lock();
        PoolStatus {
            idle: slots.idle.len(),
            active: slots.live - slots.idle.len(),
            max: self.config.max_size,
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn is_closed(&self) -> bool {
        self.slots.lock().closed
    }

    /// Shut the pool down: idle connections are closed now, borrowed ones
    /// when their guards drop.
    pub fn close(&self) {
        let drained: Vec<F::Connection> = {
            let mut slots = self.slots.lock();
            if slots.closed {
                return;
            }
            slots.closed = true;
            let drained: Vec<_> = slots.idle.drain(..).collect();
            slots.live -= drained.len();
            drained
        };
        self.available.notify_all();

        let count = drained.len();
        for conn in drained {
            self.destroy_quietly(conn);
        }
        info!(
            "Closed {} connection pool ({} idle connections released)",
            self.factory.describe(),
            count
        );
    }

    fn guard(&self, conn: F::Connection) -> PooledConnection<'_, F> {
        debug!("Borrowed {} connection ({})", self.factory.describe(), self.status());
        PooledConnection {
            pool: self,
            conn: Some(conn),
        }
    }

    fn release(&self, conn: F::Connection) {
        let mut slots = self.slots.lock();
        if slots.closed {
            slots.live -= 1;
            drop(slots);
            self.destroy_quietly(conn);
            return;
        }
        slots.idle.push_back(conn);
        drop(slots);
        // Pair borrowers may be waiting alongside single ones.
        self.available.notify_all();
        debug!("Returned {} connection ({})", self.factory.describe(), self.status());
    }

    fn discard(&self, conn: F::Connection) {
        self.destroy_quietly(conn);
        self.slots.lock().live -= 1;
        self.available.notify_all();
    }

    fn destroy_quietly(&self, conn: F::Connection) {
        if let Err(e) = self.factory.destroy(conn) {
            warn!("Failed to close {} connection: {}", self.factory.describe(), e);
        }
    }
}

impl<F: ConnectionFactory> Drop for Pool<F> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Exclusive handle to a pooled connection; returns it to the pool on drop.
pub struct PooledConnection<'a, F: ConnectionFactory> {
    pool: &'a Pool<F>,
    conn: Option<F::Connection>,
}

impl<F: ConnectionFactory> PooledConnection<'_, F> {
    /// Close the connection instead of returning it, freeing its slot.
    pub fn discard(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.discard(conn);
        }
    }
}

impl<F: ConnectionFactory> Deref for PooledConnection<'_, F> {
    type Target = F::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("pooled connection used after release")
    }
}

impl<F: ConnectionFactory> DerefMut for PooledConnection<'_, F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("pooled connection used after release")
    }
}

impl<F: ConnectionFactory> Drop for PooledConnection<'_, F> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
