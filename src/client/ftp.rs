//! FTP implementation of [`RemoteClient`]

use log::{debug, info, warn};
use std::io::{BufReader, Read, Write};

use crate::client::{
    RemoteClient, StagedTarget, copy_error, drain_into, file_path, finish_download, log_cleanup,
    move_error,
};
use crate::config::Protocol;
use crate::error::{Error, Result, TransportError};
use crate::navigate::paths::{base_name, is_dot_entry, qualify, trim_separator};
use crate::navigate::{RemoteOps, mkdir_recursive, walk_files};
use crate::pool::{ConnectionFactory, ConnectionSource, PoolStatus};
use crate::transport::{FtpTransport, RemoteFile};
use crate::utils::validation::validate_remote_path;

/// Tree primitives over one FTP session.
struct FtpOps<'a, T: ?Sized>(&'a mut T);

impl<T: FtpTransport + ?Sized> RemoteOps for FtpOps<'_, T> {
    fn is_directory(&mut self, path: &str) -> std::result::Result<bool, TransportError> {
        self.0.is_directory(path)
    }

    fn make_directory(&mut self, path: &str) -> std::result::Result<(), TransportError> {
        self.0.make_directory(path)
    }

    fn read_dir(&mut self, path: &str) -> std::result::Result<Vec<RemoteFile>, TransportError> {
        self.0.list_files(path)
    }
}

/// Delete a staged upload, best effort.
fn remove_staged<T: FtpTransport + ?Sized>(conn: &mut T, staged: &str) {
    let result = match conn.delete(staged) {
        Ok(true) => {
            debug!("Removed staged file {}", staged);
            Ok(())
        }
        // Nothing was written or the server refused; either way nothing to log.
        Ok(false) => Ok(()),
        Err(e) => Err(e),
    };
    log_cleanup(staged, result);
}

/// Rename, turning a refusal into [`TransportError::Rejected`].
fn rename_or_reject<T: FtpTransport + ?Sized>(
    conn: &mut T,
    from: &str,
    to: &str,
) -> std::result::Result<(), TransportError> {
    if conn.rename(from, to)? {
        Ok(())
    } else {
        Err(TransportError::Rejected {
            operation: "rename",
            path: from.to_string(),
        })
    }
}

/// Remote file client speaking FTP.
pub struct FtpClient<F>
where
    F: ConnectionFactory,
    F::Connection: FtpTransport,
{
    source: ConnectionSource<F>,
    buffer_size: usize,
}

impl<F> FtpClient<F>
where
    F: ConnectionFactory,
    F::Connection: FtpTransport,
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
}

impl<F> RemoteClient for FtpClient<F>
where
    F: ConnectionFactory,
    F::Connection: FtpTransport,
{
    fn protocol(&self) -> Protocol {
        Protocol::Ftp
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

        mkdir_recursive(&mut FtpOps(&mut *conn), remote_dir)
            .map_err(|e| Error::transfer("create directory", remote_dir, e))?;

        let mut reader = BufReader::with_capacity(self.buffer_size, source);
        let bytes = match conn.store(&paths.staged, &mut reader) {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_staged(&mut *conn, &paths.staged);
                return Err(Error::transfer("upload", &paths.staged, e));
            }
        };

        if paths.is_staged() {
            if let Err(e) = rename_or_reject(&mut *conn, &paths.staged, &paths.target) {
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

        let dir = trim_separator(remote_dir);
        let dir_exists = conn
            .is_directory(&dir)
            .map_err(|e| Error::transfer("download", &path, e))?;
        if !dir_exists {
            if let Err(e) = sink.flush() {
                warn!("Failed to flush download sink for {}: {}", path, e);
            }
            return Err(Error::transfer(
                "download",
                &path,
                TransportError::NotFound { path: dir },
            ));
        }

        let buffer_size = self.buffer_size;
        let result = conn.retrieve(&path, &mut |data: &mut dyn Read| {
            drain_into(data, &mut *sink, buffer_size)
        });
        let flushed = sink.flush();
        finish_download(&path, result, flushed)
    }

    fn move_file(&self, src_dir: &str, dest_dir: &str, filename: &str) -> Result<()> {
        let src = file_path(src_dir, filename)?;
        let dest = file_path(dest_dir, filename)?;
        let mut conn = self.source.acquire()?;

        let found = conn
            .list_names(&src)
            .map_err(|e| move_error(&src, &dest, Some(e)))?;
        if found.is_empty() {
            return Err(move_error(&src, &dest, None));
        }

        mkdir_recursive(&mut FtpOps(&mut *conn), dest_dir)
            .map_err(|e| move_error(&src, &dest, Some(e)))?;
        rename_or_reject(&mut *conn, &src, &dest).map_err(|e| move_error(&src, &dest, Some(e)))?;

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
        let found = src_conn
            .list_names(&src)
            .map_err(|e| copy_error(&src, dest, Some(e)))?;
        if found.is_empty() {
            return Err(copy_error(&src, dest, None));
        }

        mkdir_recursive(&mut FtpOps(&mut *dest_conn), dest_dir)
            .map_err(|e| copy_error(&src, dest, Some(e)))?;

        let buffer_size = self.buffer_size;
        let staged = paths.staged.as_str();
        let streamed = src_conn.retrieve(&src, &mut |data: &mut dyn Read| {
            let mut reader = BufReader::with_capacity(buffer_size, data);
            dest_conn.store(staged, &mut reader)
        });
        let bytes = match streamed {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_staged(&mut *dest_conn, staged);
                return Err(copy_error(&src, dest, Some(e)));
            }
        };

        if paths.is_staged() {
            if let Err(e) = rename_or_reject(&mut *dest_conn, staged, dest) {
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
        let deleted = conn
            .delete(path)
            .map_err(|e| Error::remote("delete", path, e))?;
        debug!("DELE {} -> {}", path, deleted);
        Ok(deleted)
    }

    fn remove_directory(&self, path: &str) -> Result<bool> {
        validate_remote_path(path)?;
        let mut conn = self.source.acquire()?;
        let removed = conn
            .remove_directory(path)
            .map_err(|e| Error::remote("remove directory", path, e))?;
        debug!("RMD {} -> {}", path, removed);
        Ok(removed)
    }

    fn list_names(&self, dir: &str) -> Result<Vec<String>> {
        validate_remote_path(dir)?;
        let mut conn = self.source.acquire()?;
        let names = conn
            .list_names(dir)
            .map_err(|e| Error::remote("list", dir, e))?;
        Ok(names
            .iter()
            .filter(|name| !is_dot_entry(name))
            .map(|name| qualify(dir, name))
            .collect())
    }

    fn list_files(&self, dir: &str) -> Result<Vec<RemoteFile>> {
        validate_remote_path(dir)?;
        let mut conn = self.source.acquire()?;
        let files = conn
            .list_files(dir)
            .map_err(|e| Error::remote("list", dir, e))?;
        Ok(files
            .into_iter()
            .filter(|file| !is_dot_entry(&file.name))
            .collect())
    }

    fn list_recursive(&self, dir: &str, recursive: bool) -> Result<Vec<RemoteFile>> {
        validate_remote_path(dir)?;
        let mut conn = self.source.acquire()?;
        walk_files(&mut FtpOps(&mut *conn), dir, recursive)
            .map_err(|e| Error::remote("list", dir, e))
    }

    fn path_exists(&self, path: &str) -> Result<bool> {
        validate_remote_path(path)?;
        let mut conn = self.source.acquire()?;
        let names = conn
            .list_names(path)
            .map_err(|e| Error::remote("check", path, e))?;
        Ok(!names.is_empty())
    }

    fn file_exists(&self, path: &str) -> Result<bool> {
        validate_remote_path(path)?;
        let mut conn = self.source.acquire()?;
        let files = conn
            .list_files(path)
            .map_err(|e| Error::remote("check", path, e))?;
        // LIST of a directory holding a single file looks the same as LIST of
        // that file, so the entry name must match too.
        Ok(matches!(files.as_slice(), [file] if file.is_file() && file.name == base_name(path)))
    }

    fn make_directories(&self, path: &str) -> Result<()> {
        validate_remote_path(path)?;
        let mut conn = self.source.acquire()?;
        mkdir_recursive(&mut FtpOps(&mut *conn), path)
            .map_err(|e| Error::remote("create directory", path, e))
    }

    fn status(&self) -> Option<PoolStatus> {
        self.source.status()
    }

    fn close(&self) {
        self.source.close();
    }
}
