//! RAX remote file client
//!
//! One set of file operations (put, get, move, copy, delete, list,
//! existence checks, recursive mkdir) over FTP or SFTP, with connections
//! managed by a bounded pool.

pub mod client;
pub mod config;
pub mod error;
pub mod navigate;
pub mod pool;
pub mod transport;
pub mod utils;

pub use client::{FtpClient, RemoteClient, SftpClient, connect};
pub use config::{ClientConfig, Protocol};
pub use error::{Error, Result};
