//! FTP transport backed by `suppaftp`
//!
//! Wraps a blocking [`FtpStream`] as an [`FtpTransport`] and provides the
//! [`ConnectionFactory`] that opens, probes and closes those sessions.

use log::{error, info, warn};
use std::io::{self, Read};
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use suppaftp::list::File as ListEntry;
use suppaftp::types::{FileType as FtpFileType, FormatControl};
use suppaftp::{FtpError, FtpStream, Mode};

use crate::config::{ClientConfig, DataConnectionMode, FileType};
use crate::error::{ConnectError, TransportError};
use crate::navigate::paths::{base_name, trim_separator};
use crate::pool::ConnectionFactory;
use crate::transport::types::{FileKind, RemoteFile};
use crate::transport::{FtpTransport, ReadSink};

/// FTP reply for "not logged in".
const REPLY_NOT_LOGGED_IN: u32 = 530;

/// One authenticated FTP control connection.
pub struct FtpConnection {
    stream: FtpStream,
}

impl FtpConnection {
    pub fn new(stream: FtpStream) -> Self {
        Self { stream }
    }
}

/// Converts a `suppaftp` error into the transport taxonomy, unwrapping any
/// transport error that travelled through a retrieve callback.
fn ftp_error(err: FtpError) -> TransportError {
    match err {
        FtpError::ConnectionError(e) => TransportError::from_io(e),
        FtpError::UnexpectedResponse(response) => TransportError::Reply {
            code: response.status.code(),
            message: String::from_utf8_lossy(&response.body).trim().to_string(),
        },
        other => TransportError::Io(io::Error::other(other.to_string())),
    }
}

/// Negative completion replies (4xx/5xx) become `Ok(false)`.
fn reply_to_bool(result: Result<(), FtpError>) -> Result<bool, TransportError> {
    match result {
        Ok(()) => Ok(true),
        Err(FtpError::UnexpectedResponse(response)) if response.status.code() >= 400 => {
            Ok(false)
        }
        Err(e) => Err(ftp_error(e)),
    }
}

fn entry_kind(entry: &ListEntry) -> FileKind {
    if entry.is_directory() {
        FileKind::Directory
    } else if entry.is_symlink() {
        FileKind::Symlink
    } else {
        FileKind::File
    }
}

impl FtpTransport for FtpConnection {
    fn store(&mut self, path: &str, reader: &mut dyn Read) -> Result<u64, TransportError> {
        let mut reader = reader;
        self.stream.put_file(path, &mut reader).map_err(ftp_error)
    }

    fn retrieve(&mut self, path: &str, sink: &mut ReadSink<'_>) -> Result<u64, TransportError> {
        self.stream
            .retr(path, |data| {
                sink(data).map_err(|e| FtpError::ConnectionError(e.into_io()))
            })
            .map_err(ftp_error)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<bool, TransportError> {
        reply_to_bool(self.stream.rename(from, to))
    }

    fn delete(&mut self, path: &str) -> Result<bool, TransportError> {
        reply_to_bool(self.stream.rm(path))
    }

    fn make_directory(&mut self, path: &str) -> Result<(), TransportError> {
        self.stream.mkdir(path).map_err(ftp_error)
    }

    fn remove_directory(&mut self, path: &str) -> Result<bool, TransportError> {
        reply_to_bool(self.stream.rmdir(path))
    }

    fn is_directory(&mut self, path: &str) -> Result<bool, TransportError> {
        let previous = self.stream.pwd().map_err(ftp_error)?;
        match self.stream.cwd(path) {
            Ok(()) => {
                self.stream.cwd(&previous).map_err(ftp_error)?;
                Ok(true)
            }
            Err(FtpError::UnexpectedResponse(_)) => Ok(false),
            Err(e) => Err(ftp_error(e)),
        }
    }

    fn list_names(&mut self, path: &str) -> Result<Vec<String>, TransportError> {
        match self.stream.nlst(Some(path)) {
            Ok(names) => Ok(names),
            // 450/550: file unavailable
            Err(FtpError::UnexpectedResponse(response))
                if matches!(response.status.code(), 450 | 550) =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(ftp_error(e)),
        }
    }

    fn list_files(&mut self, path: &str) -> Result<Vec<RemoteFile>, TransportError> {
        let lines = match self.stream.list(Some(path)) {
            Ok(lines) => lines,
            Err(FtpError::UnexpectedResponse(response))
                if matches!(response.status.code(), 450 | 550) =>
            {
                return Ok(Vec::new());
            }
            Err(e) => return Err(ftp_error(e)),
        };
        let parent = trim_separator(path);

        let mut files = Vec::with_capacity(lines.len());
        for line in lines {
            if line.trim().is_empty() || line.starts_with("total ") {
                continue;
            }
            let entry = ListEntry::from_str(&line)
                .map_err(|_| TransportError::Listing { line: line.clone() })?;
            let name = base_name(entry.name()).to_string();
            files.push(RemoteFile {
                name,
                parent: parent.clone(),
                size: entry.size() as u64,
                kind: entry_kind(&entry),
                modified: Some(entry.modified()).filter(|t| *t != SystemTime::UNIX_EPOCH),
            });
        }
        Ok(files)
    }

    fn noop(&mut self) -> Result<(), TransportError> {
        self.stream.noop().map_err(ftp_error)
    }

    fn quit(&mut self) -> Result<(), TransportError> {
        self.stream.quit().map_err(ftp_error)
    }
}

/// Opens authenticated FTP sessions from a [`ClientConfig`].
pub struct FtpConnectionFactory {
    config: ClientConfig,
}

impl FtpConnectionFactory {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>, ConnectError> {
        let host = self.config.hostname.as_str();
        let port = self.config.effective_port();
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| ConnectError::unresolved(host, port, source))?
            .collect();

        if addrs.is_empty() {
            return Err(ConnectError::UnknownHost {
                host: host.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
            });
        }
        Ok(addrs)
    }

    fn connect_error(&self, err: FtpError, timeout: Duration) -> ConnectError {
        let host = self.config.hostname.clone();
        let port = self.config.effective_port();
        match err {
            FtpError::ConnectionError(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                ConnectError::Refused { host, port }
            }
            FtpError::ConnectionError(e)
                if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) =>
            {
                ConnectError::Timeout {
                    host,
                    port,
                    timeout,
                }
            }
            FtpError::UnexpectedResponse(response)
                if response.status.code() == REPLY_NOT_LOGGED_IN =>
            {
                ConnectError::Auth {
                    host,
                    port,
                    username: self.config.username.clone(),
                    message: String::from_utf8_lossy(&response.body).trim().to_string(),
                }
            }
            FtpError::UnexpectedResponse(response) => ConnectError::NegativeReply {
                host,
                port,
                code: response.status.code(),
                message: String::from_utf8_lossy(&response.body).trim().to_string(),
            },
            other => ConnectError::Failed {
                host,
                port,
                username: self.config.username.clone(),
                message: other.to_string(),
            },
        }
    }

    fn open(&self) -> Result<FtpStream, ConnectError> {
        let timeouts = &self.config.timeouts;
        let mut last_error = None;

        for addr in self.resolve()? {
            match FtpStream::connect_timeout(addr, timeouts.connect()) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }

        Err(match last_error {
            Some(e) => self.connect_error(e, timeouts.connect()),
            None => ConnectError::Failed {
                host: self.config.hostname.clone(),
                port: self.config.effective_port(),
                username: self.config.username.clone(),
                message: "no address could be reached".into(),
            },
        })
    }

    fn establish(&self) -> Result<FtpConnection, ConnectError> {
        let config = &self.config;
        let timeouts = &config.timeouts;
        let mut stream = self.open()?;

        let control = stream.get_ref();
        if let Err(e) = control
            .set_read_timeout(Some(timeouts.read()))
            .and_then(|_| control.set_write_timeout(Some(timeouts.read())))
        {
            warn!("Failed to apply control timeouts on {}: {}", config.endpoint(), e);
        }

        let password = config.password.as_deref().unwrap_or_default();
        stream
            .login(config.username.as_str(), password)
            .map_err(|e| self.connect_error(e, timeouts.connect()))?;

        let file_type = match config.file_type {
            FileType::Binary => FtpFileType::Binary,
            FileType::Ascii => FtpFileType::Ascii(FormatControl::Default),
        };
        stream
            .transfer_type(file_type)
            .map_err(|e| self.connect_error(e, timeouts.connect()))?;

        let stream = match config.data_connection_mode {
            DataConnectionMode::Passive => {
                stream.set_mode(Mode::Passive);
                stream
            }
            DataConnectionMode::Active => stream.active_mode(timeouts.data()),
        };

        Ok(FtpConnection::new(stream))
    }
}

impl ConnectionFactory for FtpConnectionFactory {
    type Connection = FtpConnection;

    fn create(&self) -> Result<FtpConnection, ConnectError> {
        match self.establish() {
            Ok(conn) => {
                info!(
                    "Connected to ftp://{}@{}",
                    self.config.username,
                    self.config.endpoint()
                );
                Ok(conn)
            }
            Err(e) => {
                error!("{}", e);
                Err(e)
            }
        }
    }

    fn destroy(&self, mut conn: FtpConnection) -> Result<(), TransportError> {
        // The stream is dropped (and the socket closed) whatever QUIT returns.
        conn.quit()
    }

    fn validate(&self, conn: &mut FtpConnection) -> bool {
        match conn.noop() {
            Ok(()) => true,
            Err(e) => {
                warn!("NOOP to {} failed: {}", self.config.endpoint(), e);
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("ftp://{}", self.config.endpoint())
    }
}
