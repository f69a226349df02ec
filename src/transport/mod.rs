//! Transport layer
//!
//! The primitive operations this client needs from an FTP or SFTP library,
//! expressed as two traits, plus the concrete `suppaftp` and `ssh2` backed
//! connections and factories.

pub mod ftp;
pub mod sftp;
pub mod types;

use std::io::Read;

use crate::error::TransportError;

pub use ftp::{FtpConnection, FtpConnectionFactory};
pub use sftp::{SftpConnection, SftpConnectionFactory};
pub use types::{FileAttributes, FileKind, RemoteFile};

/// Receives the remote byte stream of a download.
pub type ReadSink<'a> = dyn FnMut(&mut dyn Read) -> Result<u64, TransportError> + 'a;

/// Primitive operations of an FTP session.
///
/// Boolean results follow FTP semantics: `Ok(false)` is a negative completion
/// reply from the server, `Err` is a failure to talk to it.
pub trait FtpTransport: Send {
    /// STOR `reader` to `path`; returns the number of bytes sent.
    fn store(&mut self, path: &str, reader: &mut dyn Read) -> Result<u64, TransportError>;

    /// RETR `path`, handing the data stream to `sink`.
    fn retrieve(&mut self, path: &str, sink: &mut ReadSink<'_>) -> Result<u64, TransportError>;

    fn rename(&mut self, from: &str, to: &str) -> Result<bool, TransportError>;

    fn delete(&mut self, path: &str) -> Result<bool, TransportError>;

    /// MKD for a single level.
    fn make_directory(&mut self, path: &str) -> Result<(), TransportError>;

    fn remove_directory(&mut self, path: &str) -> Result<bool, TransportError>;

    /// Whether `path` can be entered as a directory. Leaves the working
    /// directory unchanged.
    fn is_directory(&mut self, path: &str) -> Result<bool, TransportError>;

    /// NLST; a "file unavailable" reply yields an empty list.
    fn list_names(&mut self, path: &str) -> Result<Vec<String>, TransportError>;

    /// LIST parsed into descriptors whose `parent` is `path`; a "file
    /// unavailable" reply yields an empty list.
    fn list_files(&mut self, path: &str) -> Result<Vec<RemoteFile>, TransportError>;

    fn noop(&mut self) -> Result<(), TransportError>;

    fn quit(&mut self) -> Result<(), TransportError>;
}

/// Primitive operations of an SFTP session.
pub trait SftpTransport: Send {
    /// Create or truncate `path` and write `reader` into it.
    fn upload(&mut self, path: &str, reader: &mut dyn Read) -> Result<u64, TransportError>;

    fn download(&mut self, path: &str, sink: &mut ReadSink<'_>) -> Result<u64, TransportError>;

    fn rename(&mut self, from: &str, to: &str) -> Result<(), TransportError>;

    fn remove_file(&mut self, path: &str) -> Result<(), TransportError>;

    fn make_directory(&mut self, path: &str) -> Result<(), TransportError>;

    fn remove_directory(&mut self, path: &str) -> Result<(), TransportError>;

    /// Entries of `path` with their attributes, without `.` and `..`.
    fn read_dir(&mut self, path: &str) -> Result<Vec<(String, FileAttributes)>, TransportError>;

    /// Attributes of `path` itself (symlinks are not followed). A missing
    /// path must surface as an error for which `is_not_found()` holds.
    fn lstat(&mut self, path: &str) -> Result<FileAttributes, TransportError>;

    fn keepalive(&mut self) -> Result<(), TransportError>;

    fn disconnect(&mut self) -> Result<(), TransportError>;
}
