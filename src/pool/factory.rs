//! Connection factory capability
//!
//! The pool only knows how to create, probe and destroy connections through
//! this trait; the FTP and SFTP transports each provide one implementation.

use crate::error::{ConnectError, TransportError};

/// Creates, validates and destroys connections for one protocol.
pub trait ConnectionFactory: Send + Sync {
    type Connection: Send;

    /// Open and authenticate a new session.
    fn create(&self) -> Result<Self::Connection, ConnectError>;

    /// Close a session. The connection is gone whatever the outcome; an error
    /// only reports that the server did not acknowledge the close.
    fn destroy(&self, conn: Self::Connection) -> Result<(), TransportError>;

    /// Cheap liveness probe. Never errors: any failure means "not alive".
    fn validate(&self, conn: &mut Self::Connection) -> bool;

    /// Short description used in log lines.
    fn describe(&self) -> String {
        String::from("remote")
    }
}
