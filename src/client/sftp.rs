//! SFTP implementation of [`RemoteClient`]
//!
//! Existence checks are `lstat` calls: "no such file" (status 2) means the
//! path is absent, every other failure is reported to the caller.

use log::{debug, info};
use std::io::{BufReader, Read, Write};

use crate::client::{
    RemoteClient, StagedTarget, copy_error, drain_into, file_path, finish_download, log_cleanup,
    move_error,
};
use crate::config::Protocol;
use crate::error::{Error, Result, TransportError};
use crate::navigate::paths::{is_dot_entry, join, trim_separator};
use crate::navigate::{RemoteOps, mkdir_recursive, walk_files};
use crate::pool::{ConnectionFactory, ConnectionSource, PoolStatus};
use crate::transport::{FileAttributes, RemoteFile, SftpTransport};
use crate::utils::validation::validate_remote_path;

/// `lstat` the path and test the attributes; absent paths are `Ok(false)`.
fn stat_matches<T: SftpTransport + ?Sized>(
    conn: &mut T,
    path: &str,
    predicate: fn(&FileAttributes) -> bool,
) -> std::result::Result<bool, TransportError> {
    match conn.lstat(path) {
        Ok(attrs) => Ok(predicate(&attrs)),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

fn any_kind(_: &FileAttributes) -> bool {
    true
}

/// Directory entries of `dir` as descriptors, without `.` and `..`.
fn entries<T: SftpTransport + ?Sized>(
    conn: &mut T,
    dir: &str,
) -> std::result::Result<Vec<RemoteFile>, TransportError> {
    let parent = trim_separator(dir);
    Ok(conn
        .read_dir(dir)?
        .iter()
        .filter(|(name, _)| !is_dot_entry(name))
        .map(|(name, attrs)| RemoteFile::from_attributes(name, &parent, attrs))
        .collect())
}

/// Tree primitives over one SFTP session.
struct SftpOps<'a, T: ?Sized>(&'a mut T);

impl<T: SftpTransport + ?Sized> RemoteOps for SftpOps<'_, T> {
    fn is_directory(&mut self, path: &str) -> std::result::Result<bool, TransportError> {
        stat_matches(&mut *self.0, path, FileAttributes::is_dir)
    }

    fn make_directory(&mut self, path: &str) -> std::result::Result<(), TransportError> {
        self.0.make_directory(path)
    }

    fn read_dir(&mut self, path: &str) -> std::result::Result<Vec<RemoteFile>, TransportError> {
        entries(&mut *self.0, path)
    }
}

fn remove_staged<T: SftpTransport + ?Sized>(conn: &mut T, staged: &str) {
    let result = match conn.remove_file(staged) {
        Ok(()) => {
            debug!("Removed staged file {}", staged);
            Ok(())
        }
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    };
    log_cleanup(staged, result);
}

/// Remote file client speaking SFTP.
pub struct SftpClient<F>
where
    F: ConnectionFactory,
    F::Connection: SftpTransport,
{
    source: ConnectionSource<F>,
    buffer_size: usize,
}

impl<F> SftpClient<F>
where
    F: ConnectionFactory,
    F::Connection: SftpTransport,
{
    pub fn new(source: ConnectionSource<F>, buffer_size: usize) -> Self {
        Self {
            source,
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn source(&self) -> &ConnectionSource<F> {
        &self.source
    }

    /// Whether `path` is a directory.
    pub fn directory_exists(&self, path: &str) -> Result<bool> {
        validate_remote_path(path)?;
        let mut conn = self.source.acquire()?;
        stat_matches(&mut *conn, path, FileAttributes::is_dir)
            .map_err(|e| Error::remote("check", path, e))
    }
}

impl<F> RemoteClient for SftpClient<F>
where
    F: ConnectionFactory,
    F::Connection: SftpTransport,
{
    fn protocol(&self) -> Protocol {
        Protocol::Sftp
    }

    fn put(
        &self,
        source: &mut dyn Read,
        remote_dir: &str,
        remote_filename: &str,
        suffix: &str,
    ) -> Result<()> {
        let paths = StagedTarget::new(remote_dir, remote_filename, suffix)?;
        let mut conn = self.source.acquire()?;

        mkdir_recursive(&mut SftpOps(&mut *conn), remote_dir)
            .map_err(|e| Error::transfer("create directory", remote_dir, e))?;

        let mut reader = BufReader::with_capacity(self.buffer_size, source);
        let bytes = match conn.upload(&paths.staged, &mut reader) {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_staged(&mut *conn, &paths.staged);
                return Err(Error::transfer("upload", &paths.staged, e));
            }
        };

        if paths.is_staged() {
            if let Err(e) = conn.rename(&paths.staged, &paths.target) {
                remove_staged(&mut *conn, &paths.staged);
                return Err(Error::transfer("rename", &paths.target, e));
            }
        }

        info!("Uploaded {} bytes to {}", bytes, paths.target);
        Ok(())
    }

    fn get(&self, sink: &mut dyn Write, remote_dir: &str, remote_filename: &str) -> Result<()> {
        let path = file_path(remote_dir, remote_filename)?;
        let mut conn = self.source.acquire()?;

        let buffer_size = self.buffer_size;
        let result = conn.download(&path, &mut |data: &mut dyn Read| {
            drain_into(data, &mut *sink, buffer_size)
        });
        let flushed = sink.flush();
        finish_download(&path, result, flushed)
    }

    fn move_file(&self, src_dir: &str, dest_dir: &str, filename: &str) -> Result<()> {
        let src = file_path(src_dir, filename)?;
        let dest = file_path(dest_dir, filename)?;
        let mut conn = self.source.acquire()?;

        let is_file = stat_matches(&mut *conn, &src, FileAttributes::is_file)
            .map_err(|e| move_error(&src, &dest, Some(e)))?;
        if !is_file {
            return Err(move_error(&src, &dest, None));
        }

        mkdir_recursive(&mut SftpOps(&mut *conn), dest_dir)
            .map_err(|e| move_error(&src, &dest, Some(e)))?;
        conn.rename(&src, &dest)
            .map_err(|e| move_error(&src, &dest, Some(e)))?;

        info!("Moved {} to {}", src, dest);
        Ok(())
    }

    fn copy(
        &self,
        src_dir: &str,
        dest_dir: &str,
        src_filename: &str,
        suffix: &str,
        new_filename: &str,
    ) -> Result<()> {
        let new_filename = if new_filename.is_empty() {
            src_filename
        } else {
            new_filename
        };
        let src = file_path(src_dir, src_filename)?;
        let paths = StagedTarget::new(dest_dir, new_filename, suffix)?;
        let dest = paths.target.as_str();

        let (mut src_conn, mut dest_conn) = self.source.acquire_pair()?;
        let is_file = stat_matches(&mut *src_conn, &src, FileAttributes::is_file)
            .map_err(|e| copy_error(&src, dest, Some(e)))?;
        if !is_file {
            return Err(copy_error(&src, dest, None));
        }

        mkdir_recursive(&mut SftpOps(&mut *dest_conn), dest_dir)
            .map_err(|e| copy_error(&src, dest, Some(e)))?;

        let buffer_size = self.buffer_size;
        let staged = paths.staged.as_str();
        let streamed = src_conn.download(&src, &mut |data: &mut dyn Read| {
            let mut reader = BufReader::with_capacity(buffer_size, data);
            dest_conn.upload(staged, &mut reader)
        });
        let bytes = match streamed {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_staged(&mut *dest_conn, staged);
                return Err(copy_error(&src, dest, Some(e)));
            }
        };

        if paths.is_staged() {
            if let Err(e) = dest_conn.rename(staged, dest) {
                remove_staged(&mut *dest_conn, staged);
                return Err(copy_error(&src, dest, Some(e)));
            }
        }

        info!("Copied {} bytes from {} to {}", bytes, src, dest);
        Ok(())
    }

    fn delete_file(&self, path: &str) -> Result<bool> {
        validate_remote_path(path)?;
        let mut conn = self.source.acquire()?;
        conn.remove_file(path)
            .map_err(|e| Error::remote("delete", path, e))?;
        debug!("Removed {}", path);
        Ok(true)
    }

    fn remove_directory(&self, path: &str) -> Result<bool> {
        validate_remote_path(path)?;
        let mut conn = self.source.acquire()?;
        conn.remove_directory(path)
            .map_err(|e| Error::remote("remove directory", path, e))?;
        debug!("Removed directory {}", path);
        Ok(true)
    }

    fn list_names(&self, dir: &str) -> Result<Vec<String>> {
        validate_remote_path(dir)?;
        let mut conn = self.source.acquire()?;
        let files = entries(&mut *conn, dir).map_err(|e| Error::remote("list", dir, e))?;
        Ok(files.iter().map(|file| join(dir, &file.name)).collect())
    }

    fn list_files(&self, dir: &str) -> Result<Vec<RemoteFile>> {
        validate_remote_path(dir)?;
        let mut conn = self.source.acquire()?;
        entries(&mut *conn, dir).map_err(|e| Error::remote("list", dir, e))
    }

    fn list_recursive(&self, dir: &str, recursive: bool) -> Result<Vec<RemoteFile>> {
        validate_remote_path(dir)?;
        let mut conn = self.source.acquire()?;
        walk_files(&mut SftpOps(&mut *conn), dir, recursive)
            .map_err(|e| Error::remote("list", dir, e))
    }

    fn path_exists(&self, path: &str) -> Result<bool> {
        validate_remote_path(path)?;
        let mut conn = self.source.acquire()?;
        stat_matches(&mut *conn, path, any_kind).map_err(|e| Error::remote("check", path, e))
    }

    fn file_exists(&self, path: &str) -> Result<bool> {
        validate_remote_path(path)?;
        let mut conn = self.source.acquire()?;
        stat_matches(&mut *conn, path, FileAttributes::is_file)
            .map_err(|e| Error::remote("check", path, e))
    }

    fn make_directories(&self, path: &str) -> Result<()> {
        validate_remote_path(path)?;
        let mut conn = self.source.acquire()?;
        mkdir_recursive(&mut SftpOps(&mut *conn), path)
            .map_err(|e| Error::remote("create directory", path, e))
    }

    fn status(&self) -> Option<PoolStatus> {
        self.source.status()
    }

    fn close(&self) {
        self.source.close();
    }
}
