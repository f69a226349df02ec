// In-memory remote server shared by the integration tests.
//
// One `MemFs` plays the server's filesystem; `MockFtp` and `MockSftp` are
// transport connections onto it with each protocol's reply conventions, and
// the factories count every connection they open and close.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use rax_ftp_client::error::{ConnectError, TransportError};
use rax_ftp_client::pool::{ConnectionFactory, ConnectionSource, PoolConfig};
use rax_ftp_client::transport::{
    FileAttributes, FileKind, FtpTransport, ReadSink, RemoteFile, SftpTransport,
};
use rax_ftp_client::{FtpClient, SftpClient};

pub type SharedFs = Arc<Mutex<MemFs>>;

/// Server-side tree: directories by path, files by path with contents.
pub struct MemFs {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

fn name_of(path: &str) -> String {
    path.rsplit('/').next().unwrap_or_default().to_string()
}

impl MemFs {
    pub fn shared() -> SharedFs {
        let mut dirs = BTreeSet::new();
        dirs.insert("/".to_string());
        Arc::new(Mutex::new(MemFs {
            dirs,
            files: BTreeMap::new(),
        }))
    }

    /// Create a directory and all its parents.
    pub fn add_dir(&mut self, path: &str) {
        let mut prefix = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            prefix.push('/');
            prefix.push_str(segment);
            self.dirs.insert(prefix.clone());
        }
    }

    /// Create a file, creating its parents.
    pub fn add_file(&mut self, path: &str, data: &[u8]) {
        let path = normalize(path);
        self.add_dir(&parent_of(&path));
        self.files.insert(path, data.to_vec());
    }

    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.files.get(&normalize(path)).cloned()
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.files.contains_key(&normalize(path))
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.dirs.contains(&normalize(path))
    }

    /// Every file path, sorted.
    pub fn file_paths(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn dir_paths(&self) -> Vec<String> {
        self.dirs.iter().cloned().collect()
    }

    /// Direct children of `dir` as (name, attributes), directories first.
    fn children(&self, dir: &str) -> Vec<(String, FileAttributes)> {
        let dir = normalize(dir);
        let is_child = |path: &String| path != "/" && parent_of(path) == dir;
        let dirs = self.dirs.iter().filter(|p| is_child(p)).map(|p| {
            (
                name_of(p),
                FileAttributes {
                    kind: FileKind::Directory,
                    size: 0,
                    modified: None,
                },
            )
        });
        let files = self.files.iter().filter(|(p, _)| is_child(p)).map(|(p, data)| {
            (
                name_of(p),
                FileAttributes {
                    kind: FileKind::File,
                    size: data.len() as u64,
                    modified: None,
                },
            )
        });
        dirs.chain(files).collect()
    }

    fn attributes(&self, path: &str) -> Option<FileAttributes> {
        let path = normalize(path);
        if self.dirs.contains(&path) {
            Some(FileAttributes {
                kind: FileKind::Directory,
                size: 0,
                modified: None,
            })
        } else {
            self.files.get(&path).map(|data| FileAttributes {
                kind: FileKind::File,
                size: data.len() as u64,
                modified: None,
            })
        }
    }

    /// Store whatever `reader` yields; a read failure keeps the partial
    /// data, as a server does when the client drops mid-transfer.
    fn write_from(&mut self, path: &str, reader: &mut dyn Read) -> io::Result<u64> {
        let mut data = Vec::new();
        let result = reader.read_to_end(&mut data);
        let len = data.len() as u64;
        self.files.insert(normalize(path), data);
        result.map(|_| len)
    }

    fn rename(&mut self, from: &str, to: &str) -> bool {
        let (from, to) = (normalize(from), normalize(to));
        if !self.dirs.contains(&parent_of(&to)) {
            return false;
        }
        match self.files.remove(&from) {
            Some(data) => {
                self.files.insert(to, data);
                true
            }
            None => false,
        }
    }

    fn make_dir(&mut self, path: &str) -> bool {
        let path = normalize(path);
        if self.dirs.contains(&path)
            || self.files.contains_key(&path)
            || !self.dirs.contains(&parent_of(&path))
        {
            return false;
        }
        self.dirs.insert(path);
        true
    }

    fn remove_dir(&mut self, path: &str) -> bool {
        let path = normalize(path);
        if path == "/" || !self.dirs.contains(&path) || !self.children(&path).is_empty() {
            return false;
        }
        self.dirs.remove(&path)
    }
}

/// Connection accounting shared by a factory and its connections.
#[derive(Default)]
pub struct Stats {
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
    busy: AtomicUsize,
    max_busy: AtomicUsize,
}

impl Stats {
    fn opened(&self) {
        self.created.fetch_add(1, Ordering::SeqCst);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);
    }

    fn closed(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_sub(1, Ordering::SeqCst);
    }

    fn enter(&self) {
        let busy = self.busy.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_busy.fetch_max(busy, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.busy.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Most connections open at the same time.
    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    /// Most downloads in flight at the same time.
    pub fn max_busy(&self) -> usize {
        self.max_busy.load(Ordering::SeqCst)
    }
}

/// Server behaviour knobs.
#[derive(Clone, Default)]
pub struct Behaviour {
    /// Delay applied to every download.
    pub latency: Duration,
    /// Refuse every rename.
    pub reject_rename: bool,
}

/// Reader that yields `data` and then fails once `fail_after` bytes are out.
pub struct FailingReader {
    inner: Cursor<Vec<u8>>,
    fail_after: usize,
}

impl FailingReader {
    pub fn new(data: &[u8], fail_after: usize) -> Self {
        Self {
            inner: Cursor::new(data.to_vec()),
            fail_after,
        }
    }
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let position = self.inner.position() as usize;
        if position >= self.fail_after {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away"));
        }
        let limit = buf.len().min(self.fail_after - position);
        self.inner.read(&mut buf[..limit])
    }
}

fn reply(code: u32, message: &str) -> TransportError {
    TransportError::Reply {
        code,
        message: message.to_string(),
    }
}

fn no_such_file(path: &str) -> TransportError {
    TransportError::Sftp {
        code: 2,
        message: format!("no such file: {path}"),
    }
}

/// FTP session onto a [`MemFs`].
pub struct MockFtp {
    fs: SharedFs,
    stats: Arc<Stats>,
    behaviour: Behaviour,
}

impl FtpTransport for MockFtp {
    fn store(&mut self, path: &str, reader: &mut dyn Read) -> Result<u64, TransportError> {
        let mut fs = self.fs.lock();
        if !fs.is_dir(&parent_of(&normalize(path))) {
            return Err(reply(553, "Could not create file"));
        }
        fs.write_from(path, reader).map_err(TransportError::from_io)
    }

    fn retrieve(&mut self, path: &str, sink: &mut ReadSink<'_>) -> Result<u64, TransportError> {
        let data = self.fs.lock().read(path).ok_or_else(|| reply(550, "No such file"))?;
        self.stats.enter();
        thread::sleep(self.behaviour.latency);
        let result = sink(&mut Cursor::new(data));
        self.stats.leave();
        result
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<bool, TransportError> {
        if self.behaviour.reject_rename {
            return Ok(false);
        }
        Ok(self.fs.lock().rename(from, to))
    }

    fn delete(&mut self, path: &str) -> Result<bool, TransportError> {
        Ok(self.fs.lock().files.remove(&normalize(path)).is_some())
    }

    fn make_directory(&mut self, path: &str) -> Result<(), TransportError> {
        if self.fs.lock().make_dir(path) {
            Ok(())
        } else {
            Err(reply(550, "Create directory operation failed"))
        }
    }

    fn remove_directory(&mut self, path: &str) -> Result<bool, TransportError> {
        Ok(self.fs.lock().remove_dir(path))
    }

    fn is_directory(&mut self, path: &str) -> Result<bool, TransportError> {
        Ok(self.fs.lock().is_dir(path))
    }

    fn list_names(&mut self, path: &str) -> Result<Vec<String>, TransportError> {
        let fs = self.fs.lock();
        if fs.is_file(path) {
            return Ok(vec![normalize(path)]);
        }
        let mut names = vec![".".to_string(), "..".to_string()];
        if fs.is_dir(path) {
            names.extend(fs.children(path).into_iter().map(|(name, _)| name));
            Ok(names)
        } else {
            Ok(Vec::new())
        }
    }

    fn list_files(&mut self, path: &str) -> Result<Vec<RemoteFile>, TransportError> {
        let fs = self.fs.lock();
        let path = normalize(path);
        if let Some(attrs) = fs.attributes(&path).filter(FileAttributes::is_file) {
            let parent = format!("{}/", parent_of(&path).trim_end_matches('/'));
            return Ok(vec![RemoteFile::from_attributes(&name_of(&path), &parent, &attrs)]);
        }
        let parent = format!("{}/", path.trim_end_matches('/'));
        Ok(fs
            .children(&path)
            .iter()
            .map(|(name, attrs)| RemoteFile::from_attributes(name, &parent, attrs))
            .collect())
    }

    fn noop(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn quit(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// SFTP session onto a [`MemFs`].
pub struct MockSftp {
    fs: SharedFs,
    stats: Arc<Stats>,
    behaviour: Behaviour,
}

impl SftpTransport for MockSftp {
    fn upload(&mut self, path: &str, reader: &mut dyn Read) -> Result<u64, TransportError> {
        let mut fs = self.fs.lock();
        if !fs.is_dir(&parent_of(&normalize(path))) {
            return Err(no_such_file(path));
        }
        fs.write_from(path, reader).map_err(TransportError::from_io)
    }

    fn download(&mut self, path: &str, sink: &mut ReadSink<'_>) -> Result<u64, TransportError> {
        let data = self.fs.lock().read(path).ok_or_else(|| no_such_file(path))?;
        self.stats.enter();
        thread::sleep(self.behaviour.latency);
        let result = sink(&mut Cursor::new(data));
        self.stats.leave();
        result
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), TransportError> {
        if self.behaviour.reject_rename {
            return Err(TransportError::Sftp {
                code: 4,
                message: "failure".into(),
            });
        }
        if self.fs.lock().rename(from, to) {
            Ok(())
        } else {
            Err(no_such_file(from))
        }
    }

    fn remove_file(&mut self, path: &str) -> Result<(), TransportError> {
        match self.fs.lock().files.remove(&normalize(path)) {
            Some(_) => Ok(()),
            None => Err(no_such_file(path)),
        }
    }

    fn make_directory(&mut self, path: &str) -> Result<(), TransportError> {
        let mut fs = self.fs.lock();
        if !fs.is_dir(&parent_of(&normalize(path))) {
            return Err(no_such_file(path));
        }
        if fs.make_dir(path) {
            Ok(())
        } else {
            Err(TransportError::Sftp {
                code: 4,
                message: "failure".into(),
            })
        }
    }

    fn remove_directory(&mut self, path: &str) -> Result<(), TransportError> {
        if self.fs.lock().remove_dir(path) {
            Ok(())
        } else {
            Err(TransportError::Sftp {
                code: 4,
                message: "failure".into(),
            })
        }
    }

    fn read_dir(&mut self, path: &str) -> Result<Vec<(String, FileAttributes)>, TransportError> {
        let fs = self.fs.lock();
        if !fs.is_dir(path) {
            return Err(no_such_file(path));
        }
        Ok(fs.children(path))
    }

    fn lstat(&mut self, path: &str) -> Result<FileAttributes, TransportError> {
        self.fs
            .lock()
            .attributes(path)
            .ok_or_else(|| TransportError::NotFound {
                path: path.to_string(),
            })
    }

    fn keepalive(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Opens [`MockFtp`] sessions.
pub struct MockFtpFactory {
    pub fs: SharedFs,
    pub stats: Arc<Stats>,
    pub behaviour: Behaviour,
}

impl ConnectionFactory for MockFtpFactory {
    type Connection = MockFtp;

    fn create(&self) -> Result<MockFtp, ConnectError> {
        self.stats.opened();
        Ok(MockFtp {
            fs: Arc::clone(&self.fs),
            stats: Arc::clone(&self.stats),
            behaviour: self.behaviour.clone(),
        })
    }

    fn destroy(&self, mut conn: MockFtp) -> Result<(), TransportError> {
        self.stats.closed();
        conn.quit()
    }

    fn validate(&self, conn: &mut MockFtp) -> bool {
        conn.noop().is_ok()
    }

    fn describe(&self) -> String {
        "ftp://mock".to_string()
    }
}

/// Opens [`MockSftp`] sessions.
pub struct MockSftpFactory {
    pub fs: SharedFs,
    pub stats: Arc<Stats>,
    pub behaviour: Behaviour,
}

impl ConnectionFactory for MockSftpFactory {
    type Connection = MockSftp;

    fn create(&self) -> Result<MockSftp, ConnectError> {
        self.stats.opened();
        Ok(MockSftp {
            fs: Arc::clone(&self.fs),
            stats: Arc::clone(&self.stats),
            behaviour: self.behaviour.clone(),
        })
    }

    fn destroy(&self, mut conn: MockSftp) -> Result<(), TransportError> {
        self.stats.closed();
        conn.disconnect()
    }

    fn validate(&self, conn: &mut MockSftp) -> bool {
        conn.keepalive().is_ok()
    }

    fn describe(&self) -> String {
        "sftp://mock".to_string()
    }
}

/// How the client under test gets its connections.
#[derive(Clone, Copy)]
pub enum Mode {
    Pooled { max_size: usize },
    Single,
}

fn pool_config(max_size: usize) -> PoolConfig {
    PoolConfig {
        max_size,
        borrow_timeout: Some(Duration::from_secs(5)),
        test_on_borrow: true,
    }
}

fn source<F: ConnectionFactory>(factory: F, mode: Mode) -> ConnectionSource<F> {
    match mode {
        Mode::Pooled { max_size } => {
            ConnectionSource::pooled(factory, pool_config(max_size)).unwrap()
        }
        Mode::Single => ConnectionSource::single(factory),
    }
}

pub fn ftp_client(
    fs: &SharedFs,
    mode: Mode,
    behaviour: Behaviour,
) -> (FtpClient<MockFtpFactory>, Arc<Stats>) {
    let stats = Arc::new(Stats::default());
    let factory = MockFtpFactory {
        fs: Arc::clone(fs),
        stats: Arc::clone(&stats),
        behaviour,
    };
    (FtpClient::new(source(factory, mode), 4096), stats)
}

pub fn sftp_client(
    fs: &SharedFs,
    mode: Mode,
    behaviour: Behaviour,
) -> (SftpClient<MockSftpFactory>, Arc<Stats>) {
    let stats = Arc::new(Stats::default());
    let factory = MockSftpFactory {
        fs: Arc::clone(fs),
        stats: Arc::clone(&stats),
        behaviour,
    };
    (SftpClient::new(source(factory, mode), 4096), stats)
}
