//! Connection pooling
//!
//! A generic bounded pool composed over a [`ConnectionFactory`], plus the
//! [`ConnectionSource`] that hides whether a client runs pooled or opens one
//! connection per operation.

pub mod core;
pub mod factory;
pub mod source;

pub use self::core::{Pool, PoolConfig, PoolStatus, PooledConnection};
pub use factory::ConnectionFactory;
pub use source::{ConnectionSource, Lease};
