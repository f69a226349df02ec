//! Error handlers
//!
//! Reporting helpers used by the command-line front end.

use std::error::Error as StdError;

use log::error;

use crate::error::types::{ConnectError, Error, PoolError};

/// Log an operation failure together with its full cause chain.
pub fn report(err: &Error) {
    error!("{}", err);
    let mut cause = err.source();
    while let Some(inner) = cause {
        error!("  caused by: {}", inner);
        cause = inner.source();
    }
}

/// Map an error to a process exit code.
pub fn exit_code(err: &Error) -> i32 {
    match err {
        Error::Config(_) | Error::UnsupportedProtocol(_) => 78,
        Error::InvalidPath(_) => 64,
        Error::Connect(ConnectError::Auth { .. }) => 77,
        Error::Connect(_) | Error::Pool(PoolError::Create(_)) => 69,
        Error::Pool(_) => 75,
        Error::Io { .. } => 74,
        e if e.is_not_found() => 66,
        Error::Transfer { .. } | Error::Move { .. } | Error::Copy { .. } | Error::Remote { .. } => 1,
    }
}
