//! Error types
//!
//! Defines the error taxonomy of the client: connection setup, transport
//! primitives, the connection pool, and the operation-level `Error` that
//! callers of the facade see.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// SFTP status code for "no such file" (`SSH_FX_NO_SUCH_FILE`).
pub const SFTP_NO_SUCH_FILE: i32 = 2;

/// Failures while opening and authenticating a transport session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Unable to resolve host [{host}]: {source}")]
    UnknownHost {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid port [{port}] for host {host}: {message}")]
    BadPort {
        host: String,
        port: u16,
        message: String,
    },

    #[error("Connection refused by {host}:{port}, check the port")]
    Refused { host: String, port: u16 },

    #[error("Timed out connecting to {host}:{port} after {timeout:?}")]
    Timeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    #[error("Authentication failed for {username}@{host}:{port}: {message}")]
    Auth {
        host: String,
        port: u16,
        username: String,
        message: String,
    },

    #[error("Server {host}:{port} rejected the session (reply {code}): {message}")]
    NegativeReply {
        host: String,
        port: u16,
        code: u32,
        message: String,
    },

    #[error("Failed to connect to {host}:{port} as {username}: {message}")]
    Failed {
        host: String,
        port: u16,
        username: String,
        message: String,
    },
}

impl ConnectError {
    /// Classify a failed address lookup. The resolver reports an unusable
    /// host/port pair as `InvalidInput`; anything else is a lookup failure.
    pub fn unresolved(host: &str, port: u16, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::InvalidInput {
            ConnectError::BadPort {
                host: host.to_string(),
                port,
                message: source.to_string(),
            }
        } else {
            ConnectError::UnknownHost {
                host: host.to_string(),
                source,
            }
        }
    }
}

/// Failures reported by a single transport primitive.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Negative FTP completion reply.
    #[error("Server replied {code}: {message}")]
    Reply { code: u32, message: String },

    #[error("SFTP status {code}: {message}")]
    Sftp { code: i32, message: String },

    #[error("No such file: {path}")]
    NotFound { path: String },

    /// The server answered but refused the action (e.g. rename returned false).
    #[error("Server refused to {operation} {path}")]
    Rejected {
        operation: &'static str,
        path: String,
    },

    #[error("Unparseable listing line: {line}")]
    Listing { line: String },
}

impl TransportError {
    /// True when the failure means the path does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            TransportError::NotFound { .. } => true,
            TransportError::Sftp { code, .. } => *code == SFTP_NO_SUCH_FILE,
            _ => false,
        }
    }

    /// Lifts the error into an `io::Error` so it can cross a `Read`/`Write`
    /// callback boundary and be recovered with [`TransportError::from_io`].
    pub fn into_io(self) -> io::Error {
        match self {
            TransportError::Io(e) => e,
            other => io::Error::other(other),
        }
    }

    /// Inverse of [`TransportError::into_io`].
    pub fn from_io(error: io::Error) -> Self {
        if error
            .get_ref()
            .is_some_and(|inner| inner.is::<TransportError>())
        {
            if let Some(inner) = error.into_inner() {
                if let Ok(transport) = inner.downcast::<TransportError>() {
                    return *transport;
                }
            }
            return TransportError::Io(io::Error::other("transport error lost in transit"));
        }
        TransportError::Io(error)
    }
}

/// Connection pool errors
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Connection pool exhausted: all {max} connections busy after waiting {waited:?}")]
    Exhausted { max: usize, waited: Duration },

    #[error("Connection pool is closed")]
    Closed,

    #[error("Failed to create pooled connection: {0}")]
    Create(#[from] ConnectError),

    #[error("Pool size must be greater than 0")]
    InvalidSize,

    #[error("Operation needs {needed} connections but the pool holds at most {max}")]
    TooSmall { needed: usize, max: usize },
}

/// Operation-level error returned by the remote client facade.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("Failed to {operation} {path}: {source}")]
    Transfer {
        operation: &'static str,
        path: String,
        #[source]
        source: TransportError,
    },

    #[error("{message}")]
    Move {
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    #[error("{message}")]
    Copy {
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    #[error("Failed to {operation} {path}: {source}")]
    Remote {
        operation: &'static str,
        path: String,
        #[source]
        source: TransportError,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Local file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// True when the root cause is a missing remote path.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Transfer { source, .. } | Error::Remote { source, .. } => {
                source.is_not_found()
            }
            Error::Move {
                source: Some(source),
                ..
            }
            | Error::Copy {
                source: Some(source),
                ..
            } => source.is_not_found(),
            _ => false,
        }
    }

    pub(crate) fn remote(operation: &'static str, path: &str, source: TransportError) -> Self {
        Error::Remote {
            operation,
            path: path.to_string(),
            source,
        }
    }

    pub(crate) fn transfer(operation: &'static str, path: &str, source: TransportError) -> Self {
        Error::Transfer {
            operation,
            path: path.to_string(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
