//! Remote file clients
//!
//! [`RemoteClient`] is the one operation set callers program against;
//! [`FtpClient`] and [`SftpClient`] implement it over their transport and a
//! [`ConnectionSource`](crate::pool::ConnectionSource). Use [`connect`] to
//! build the right one from a [`ClientConfig`](crate::config::ClientConfig).

pub mod facade;
pub mod ftp;
pub mod sftp;

use log::{info, warn};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use crate::config::Protocol;
use crate::error::{Error, Result, TransportError};
use crate::navigate::paths::{join, split_file_path};
use crate::pool::PoolStatus;
use crate::transport::RemoteFile;
use crate::utils::validation::{validate_file_name, validate_remote_path};

pub use facade::connect;
pub use ftp::FtpClient;
pub use sftp::SftpClient;

/// Unified remote file operations.
///
/// Remote paths are `/`-separated. Every operation holds its connection only
/// for its own duration and releases it on every exit path.
pub trait RemoteClient: Send + Sync {
    fn protocol(&self) -> Protocol;

    /// Upload `source` to `remote_dir/remote_filename`, creating `remote_dir`
    /// as needed.
    ///
    /// The data is first written to `remote_filename + suffix` and renamed
    /// into place once complete; an empty suffix writes the final name
    /// directly. A failed upload removes whatever it staged.
    fn put(
        &self,
        source: &mut dyn Read,
        remote_dir: &str,
        remote_filename: &str,
        suffix: &str,
    ) -> Result<()>;

    /// Stream `remote_dir/remote_filename` into `sink`. The sink is flushed
    /// whether or not the download succeeds.
    fn get(&self, sink: &mut dyn Write, remote_dir: &str, remote_filename: &str) -> Result<()>;

    /// Rename `src_dir/filename` to `dest_dir/filename`, creating `dest_dir`.
    fn move_file(&self, src_dir: &str, dest_dir: &str, filename: &str) -> Result<()>;

    /// Copy `src_dir/src_filename` to `dest_dir/new_filename` through a
    /// staged upload on a second connection. An empty `new_filename` keeps
    /// the source name.
    fn copy(
        &self,
        src_dir: &str,
        dest_dir: &str,
        src_filename: &str,
        suffix: &str,
        new_filename: &str,
    ) -> Result<()>;

    /// `Ok(false)` when the server refused.
    fn delete_file(&self, path: &str) -> Result<bool>;

    /// Remove an empty directory. `Ok(false)` when the server refused.
    fn remove_directory(&self, path: &str) -> Result<bool>;

    /// Full paths of the entries directly under `dir`.
    fn list_names(&self, dir: &str) -> Result<Vec<String>>;

    /// Descriptors of the entries directly under `dir`.
    fn list_files(&self, dir: &str) -> Result<Vec<RemoteFile>>;

    /// Plain files under `dir`, depth-first, descending into subdirectories
    /// when `recursive` is set.
    fn list_recursive(&self, dir: &str, recursive: bool) -> Result<Vec<RemoteFile>>;

    /// Whether anything exists at `path`. A missing path is `Ok(false)`.
    fn path_exists(&self, path: &str) -> Result<bool>;

    /// Whether `path` is a plain file.
    fn file_exists(&self, path: &str) -> Result<bool>;

    /// `mkdir -p` on the remote side.
    fn make_directories(&self, path: &str) -> Result<()>;

    /// Pool accounting, `None` when connections are not pooled.
    fn status(&self) -> Option<PoolStatus>;

    /// Close pooled connections. Operations after `close` fail.
    fn close(&self);

    /// Upload a local file.
    fn put_file(
        &self,
        local: &Path,
        remote_dir: &str,
        remote_filename: &str,
        suffix: &str,
    ) -> Result<()> {
        let mut file = File::open(local).map_err(|source| Error::Io {
            path: local.to_path_buf(),
            source,
        })?;
        self.put(&mut file, remote_dir, remote_filename, suffix)
    }

    /// Download into a local file, creating or truncating it.
    fn get_to_file(&self, local: &Path, remote_dir: &str, remote_filename: &str) -> Result<()> {
        let mut file = File::create(local).map_err(|source| Error::Io {
            path: local.to_path_buf(),
            source,
        })?;
        self.get(&mut file, remote_dir, remote_filename)
    }

    /// Download into `local_dir/remote_filename`, creating `local_dir`.
    fn get_to_dir(&self, local_dir: &Path, remote_dir: &str, remote_filename: &str) -> Result<()> {
        validate_file_name(remote_filename)?;
        fs::create_dir_all(local_dir).map_err(|source| Error::Io {
            path: local_dir.to_path_buf(),
            source,
        })?;
        self.get_to_file(&local_dir.join(remote_filename), remote_dir, remote_filename)
    }

    /// Download a remote file given by its full path into `local_dir`.
    fn get_by_path(&self, local_dir: &Path, remote_file_path: &str) -> Result<()> {
        if local_dir.as_os_str().is_empty() {
            return Err(Error::InvalidPath("local directory is empty".into()));
        }
        let (remote_dir, remote_filename) = split_file_path(remote_file_path)
            .ok_or_else(|| Error::InvalidPath(remote_file_path.to_string()))?;
        self.get_to_dir(local_dir, &remote_dir, &remote_filename)
    }

    /// Plain files directly under `dir`.
    fn list_files_recursive(&self, dir: &str) -> Result<Vec<RemoteFile>> {
        self.list_recursive(dir, false)
    }
}

/// Validated final and staged paths of an upload.
pub(crate) struct StagedTarget {
    pub target: String,
    pub staged: String,
}

impl StagedTarget {
    pub fn new(remote_dir: &str, remote_filename: &str, suffix: &str) -> Result<Self> {
        validate_remote_path(remote_dir)?;
        validate_file_name(remote_filename)?;
        if !suffix.is_empty() {
            validate_file_name(suffix)?;
        }
        let target = join(remote_dir, remote_filename);
        let staged = format!("{target}{suffix}");
        Ok(Self { target, staged })
    }

    pub fn is_staged(&self) -> bool {
        self.staged != self.target
    }
}

/// Join after validating both parts.
pub(crate) fn file_path(dir: &str, filename: &str) -> Result<String> {
    validate_remote_path(dir)?;
    validate_file_name(filename)?;
    Ok(join(dir, filename))
}

/// Copy a remote read stream into `sink` through a buffer of `buffer_size`.
pub(crate) fn drain_into(
    data: &mut dyn Read,
    sink: &mut dyn Write,
    buffer_size: usize,
) -> std::result::Result<u64, TransportError> {
    let mut reader = BufReader::with_capacity(buffer_size, data);
    io::copy(&mut reader, sink).map_err(TransportError::from_io)
}

/// Combine a download result with the flush that must follow it.
pub(crate) fn finish_download(
    path: &str,
    result: std::result::Result<u64, TransportError>,
    flushed: io::Result<()>,
) -> Result<()> {
    let bytes = result.map_err(|e| Error::transfer("download", path, e))?;
    flushed.map_err(|e| Error::transfer("download", path, TransportError::Io(e)))?;
    info!("Downloaded {} bytes from {}", bytes, path);
    Ok(())
}

pub(crate) fn copy_error(src: &str, dest: &str, source: Option<TransportError>) -> Error {
    let message = match &source {
        Some(cause) => format!("Failed to copy {src} to {dest}: {cause}"),
        None => format!("Failed to copy {src} to {dest}: source does not exist"),
    };
    Error::Copy { message, source }
}

pub(crate) fn move_error(src: &str, dest: &str, source: Option<TransportError>) -> Error {
    let message = match &source {
        Some(cause) => format!("Failed to move {src} to {dest}: {cause}"),
        None => format!("Failed to move {src} to {dest}: source does not exist"),
    };
    Error::Move { message, source }
}

/// Log the outcome of a best-effort staged-file removal.
pub(crate) fn log_cleanup(path: &str, result: std::result::Result<(), TransportError>) {
    if let Err(e) = result {
        warn!("Failed to remove staged file {}: {}", path, e);
    }
}
