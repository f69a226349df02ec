//! Tree operations shared by both backends
//!
//! Neither FTP nor SFTP can create a multi-level directory or list a tree in
//! one call, so both are built here on top of three single-level primitives.

use log::{debug, info};

use crate::error::TransportError;
use crate::navigate::paths::{is_dot_entry, segments, trim_separator};
use crate::transport::RemoteFile;

/// Single-level primitives the tree algorithms are written against.
pub trait RemoteOps {
    /// `Ok(false)` when the path is missing or not a directory.
    fn is_directory(&mut self, path: &str) -> Result<bool, TransportError>;

    fn make_directory(&mut self, path: &str) -> Result<(), TransportError>;

    /// One level of entries of `path`.
    fn read_dir(&mut self, path: &str) -> Result<Vec<RemoteFile>, TransportError>;
}

/// `mkdir -p`: create every missing prefix of `path`, starting at `/`.
///
/// A prefix that appears between the existence check and the create (another
/// client creating the same tree) is not an error.
pub fn mkdir_recursive<O: RemoteOps + ?Sized>(ops: &mut O, path: &str) -> Result<(), TransportError> {
    if segments(path).next().is_none() || ops.is_directory(path)? {
        return Ok(());
    }

    let mut prefix = String::with_capacity(path.len() + 1);
    for segment in segments(path) {
        prefix.push('/');
        prefix.push_str(segment);

        if ops.is_directory(&prefix)? {
            continue;
        }

        info!("Creating remote directory {}", prefix);
        if let Err(e) = ops.make_directory(&prefix) {
            if ops.is_directory(&prefix)? {
                debug!("Directory {} appeared concurrently", prefix);
                continue;
            }
            return Err(e);
        }
    }
    Ok(())
}

/// Depth-first list of the plain files under `dir`.
///
/// Directories are descended into when `recursive` is set and never emitted.
/// Symlinks are neither followed nor emitted.
pub fn walk_files<O: RemoteOps + ?Sized>(
    ops: &mut O,
    dir: &str,
    recursive: bool,
) -> Result<Vec<RemoteFile>, TransportError> {
    let mut files = Vec::new();
    walk_into(ops, &trim_separator(dir), recursive, &mut files)?;
    Ok(files)
}

fn walk_into<O: RemoteOps + ?Sized>(
    ops: &mut O,
    dir: &str,
    recursive: bool,
    files: &mut Vec<RemoteFile>,
) -> Result<(), TransportError> {
    for entry in ops.read_dir(dir)? {
        if is_dot_entry(&entry.name) {
            continue;
        }
        if entry.is_file() {
            files.push(entry);
        } else if recursive && entry.is_directory() {
            let child = format!("{}{}/", dir, entry.name);
            walk_into(ops, &child, true, files)?;
        }
    }
    Ok(())
}
