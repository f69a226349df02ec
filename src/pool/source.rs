//! Connection acquisition for the protocol clients
//!
//! A client either borrows from a [`Pool`] or, in non-pooled mode, opens one
//! connection per operation and closes it when the [`Lease`] drops.

use log::{debug, warn};
use std::ops::{Deref, DerefMut};

use crate::error::Error;
use crate::pool::core::{Pool, PoolConfig, PoolStatus, PooledConnection};
use crate::pool::factory::ConnectionFactory;

/// Where a client gets its connections from.
pub enum ConnectionSource<F: ConnectionFactory> {
    Pooled(Pool<F>),
    /// Fresh connection per operation, closed afterwards.
    Single(F),
}

impl<F: ConnectionFactory> ConnectionSource<F> {
    /// Pooled source; pre-populates the pool.
    pub fn pooled(factory: F, config: PoolConfig) -> Result<Self, Error> {
        Ok(ConnectionSource::Pooled(Pool::new(factory, config)?))
    }

    pub fn single(factory: F) -> Self {
        ConnectionSource::Single(factory)
    }

    /// Get exclusive use of one connection until the lease drops.
    pub fn acquire(&self) -> Result<Lease<'_, F>, Error> {
        let inner = match self {
            ConnectionSource::Pooled(pool) => LeaseInner::Pooled(pool.borrow()?),
            ConnectionSource::Single(factory) => {
                let conn = factory.create()?;
                debug!("Opened single-use {} connection", factory.describe());
                LeaseInner::Single {
                    factory,
                    conn: Some(conn),
                }
            }
        };
        Ok(Lease { inner })
    }

    /// Get two distinct connections, e.g. one to read from and one to write
    /// to. Pooled sources reserve both at once; a pool smaller than two
    /// fails with [`PoolError::TooSmall`](crate::error::PoolError::TooSmall).
    pub fn acquire_pair(&self) -> Result<(Lease<'_, F>, Lease<'_, F>), Error> {
        match self {
            ConnectionSource::Pooled(pool) => {
                let (first, second) = pool.borrow_pair()?;
                Ok((
                    Lease {
                        inner: LeaseInner::Pooled(first),
                    },
                    Lease {
                        inner: LeaseInner::Pooled(second),
                    },
                ))
            }
            ConnectionSource::Single(_) => {
                let first = self.acquire()?;
                let second = self.acquire()?;
                Ok((first, second))
            }
        }
    }

    pub fn factory(&self) -> &F {
        match self {
            ConnectionSource::Pooled(pool) => pool.factory(),
            ConnectionSource::Single(factory) => factory,
        }
    }

    /// Pool accounting, `None` in non-pooled mode.
    pub fn status(&self) -> Option<PoolStatus> {
        match self {
            ConnectionSource::Pooled(pool) => Some(pool.status()),
            ConnectionSource::Single(_) => None,
        }
    }

    /// Close the underlying pool, if any.
    pub fn close(&self) {
        if let ConnectionSource::Pooled(pool) = self {
            pool.close();
        }
    }
}

enum LeaseInner<'a, F: ConnectionFactory> {
    Pooled(PooledConnection<'a, F>),
    Single {
        factory: &'a F,
        conn: Option<F::Connection>,
    },
}

/// A connection held for the duration of one operation.
pub struct Lease<'a, F: ConnectionFactory> {
    inner: LeaseInner<'a, F>,
}

impl<F: ConnectionFactory> Deref for Lease<'_, F> {
    type Target = F::Connection;

    fn deref(&self) -> &Self::Target {
        match &self.inner {
            LeaseInner::Pooled(conn) => &**conn,
            LeaseInner::Single { conn, .. } => {
                conn.as_ref().expect("single-use connection used after release")
            }
        }
    }
}

impl<F: ConnectionFactory> DerefMut for Lease<'_, F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.inner {
            LeaseInner::Pooled(conn) => &mut **conn,
            LeaseInner::Single { conn, .. } => {
                conn.as_mut().expect("single-use connection used after release")
            }
        }
    }
}

impl<F: ConnectionFactory> Drop for Lease<'_, F> {
    fn drop(&mut self) {
        if let LeaseInner::Single { factory, conn } = &mut self.inner {
            if let Some(conn) = conn.take() {
                match factory.destroy(conn) {
                    Ok(()) => debug!("Closed single-use {} connection", factory.describe()),
                    Err(e) => warn!("Failed to close {} connection: {}", factory.describe(), e),
                }
            }
        }
    }
}
