//! Remote file descriptors
//!
//! Value types produced by listing and stat calls.

use std::time::SystemTime;

/// Kind of a remote directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
}

/// Attributes returned by an SFTP stat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttributes {
    pub kind: FileKind,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl FileAttributes {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }
}

/// One remote directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub name: String,
    /// Containing directory, always ending with `/`.
    pub parent: String,
    pub size: u64,
    pub kind: FileKind,
    pub modified: Option<SystemTime>,
}

impl RemoteFile {
    pub fn from_attributes(name: &str, parent: &str, attrs: &FileAttributes) -> Self {
        Self {
            name: name.to_string(),
            parent: parent.to_string(),
            size: attrs.size,
            kind: attrs.kind,
            modified: attrs.modified,
        }
    }

    /// Full remote path of the entry
    pub fn path(&self) -> String {
        format!("{}{}", self.parent, self.name)
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }
}
