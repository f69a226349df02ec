//! SFTP transport backed by `ssh2`
//!
//! One [`SftpConnection`] owns an SSH session and the SFTP channel opened on
//! it. The factory authenticates with a private key (optionally protected by
//! a passphrase) or a password.

use log::{error, info, warn};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use ssh2::{ErrorCode, FileStat, Session, Sftp};

use crate::config::ClientConfig;
use crate::error::{ConnectError, SFTP_NO_SUCH_FILE, TransportError};
use crate::pool::ConnectionFactory;
use crate::transport::types::{FileAttributes, FileKind};
use crate::transport::{ReadSink, SftpTransport};

/// One SSH session with an open SFTP channel.
pub struct SftpConnection {
    session: Session,
    sftp: Sftp,
}

impl SftpConnection {
    pub fn new(session: Session, sftp: Sftp) -> Self {
        Self { session, sftp }
    }
}

fn sftp_error(err: ssh2::Error) -> TransportError {
    match err.code() {
        ErrorCode::SFTP(code) => TransportError::Sftp {
            code,
            message: err.message().to_string(),
        },
        ErrorCode::Session(_) => TransportError::Io(err.into()),
    }
}

fn to_attributes(stat: &FileStat) -> FileAttributes {
    let kind = if stat.file_type().is_symlink() {
        FileKind::Symlink
    } else if stat.is_dir() {
        FileKind::Directory
    } else {
        FileKind::File
    };
    FileAttributes {
        kind,
        size: stat.size.unwrap_or(0),
        modified: stat
            .mtime
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
    }
}

impl SftpTransport for SftpConnection {
    fn upload(&mut self, path: &str, reader: &mut dyn Read) -> Result<u64, TransportError> {
        let mut remote = self.sftp.create(Path::new(path)).map_err(sftp_error)?;
        let written = io::copy(reader, &mut remote).map_err(TransportError::from_io)?;
        remote.flush()?;
        Ok(written)
    }

    fn download(&mut self, path: &str, sink: &mut ReadSink<'_>) -> Result<u64, TransportError> {
        let mut remote = self.sftp.open(Path::new(path)).map_err(sftp_error)?;
        sink(&mut remote)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), TransportError> {
        self.sftp
            .rename(Path::new(from), Path::new(to), None)
            .map_err(sftp_error)
    }

    fn remove_file(&mut self, path: &str) -> Result<(), TransportError> {
        self.sftp.unlink(Path::new(path)).map_err(sftp_error)
    }

    fn make_directory(&mut self, path: &str) -> Result<(), TransportError> {
        self.sftp.mkdir(Path::new(path), 0o755).map_err(sftp_error)
    }

    fn remove_directory(&mut self, path: &str) -> Result<(), TransportError> {
        self.sftp.rmdir(Path::new(path)).map_err(sftp_error)
    }

    fn read_dir(&mut self, path: &str) -> Result<Vec<(String, FileAttributes)>, TransportError> {
        let entries = self.sftp.readdir(Path::new(path)).map_err(sftp_error)?;
        Ok(entries
            .into_iter()
            .filter_map(|(entry, stat)| {
                let name = entry.file_name()?.to_string_lossy().into_owned();
                if name == "." || name == ".." {
                    return None;
                }
                Some((name, to_attributes(&stat)))
            })
            .collect())
    }

    fn lstat(&mut self, path: &str) -> Result<FileAttributes, TransportError> {
        match self.sftp.lstat(Path::new(path)) {
            Ok(stat) => Ok(to_attributes(&stat)),
            Err(e) if e.code() == ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => {
                Err(TransportError::NotFound {
                    path: path.to_string(),
                })
            }
            Err(e) => Err(sftp_error(e)),
        }
    }

    fn keepalive(&mut self) -> Result<(), TransportError> {
        // A round trip on the SFTP channel proves both the session and the
        // subsystem are alive.
        self.sftp
            .realpath(Path::new("."))
            .map(|_| ())
            .map_err(sftp_error)
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.session
            .disconnect(None, "closing sftp connection", None)
            .map_err(sftp_error)
    }
}

/// Opens authenticated SFTP sessions from a [`ClientConfig`].
pub struct SftpConnectionFactory {
    config: ClientConfig,
}

impl SftpConnectionFactory {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn host(&self) -> String {
        self.config.hostname.clone()
    }

    fn port(&self) -> u16 {
        self.config.effective_port()
    }

    fn tcp_connect(&self) -> Result<TcpStream, ConnectError> {
        let timeout = self.config.timeouts.connect();
        let addrs: Vec<SocketAddr> = (self.config.hostname.as_str(), self.port())
            .to_socket_addrs()
            .map_err(|source| ConnectError::unresolved(&self.host(), self.port(), source))?
            .collect();

        let mut last_error = None;
        for addr in &addrs {
            match TcpStream::connect_timeout(addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }

        Err(match last_error {
            None => ConnectError::UnknownHost {
                host: self.host(),
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
            },
            Some(e) if e.kind() == io::ErrorKind::ConnectionRefused => ConnectError::Refused {
                host: self.host(),
                port: self.port(),
            },
            Some(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                ConnectError::Timeout {
                    host: self.host(),
                    port: self.port(),
                    timeout,
                }
            }
            Some(e) => self.failed(e.to_string()),
        })
    }

    fn failed(&self, message: String) -> ConnectError {
        ConnectError::Failed {
            host: self.host(),
            port: self.port(),
            username: self.config.username.clone(),
            message,
        }
    }

    fn auth_failed(&self, message: String) -> ConnectError {
        ConnectError::Auth {
            host: self.host(),
            port: self.port(),
            username: self.config.username.clone(),
            message,
        }
    }

    fn authenticate(&self, session: &Session) -> Result<(), ConnectError> {
        let config = &self.config;
        let username = config.username.as_str();

        if let Some(key) = &config.private_key {
            if let Err(e) = session.userauth_pubkey_file(
                username,
                None,
                key,
                config.passphrase.as_deref(),
            ) {
                warn!(
                    "Key authentication with {} failed for {}: {}",
                    key.display(),
                    username,
                    e
                );
            }
        }

        if !session.authenticated() {
            if let Some(password) = &config.password {
                session
                    .userauth_password(username, password)
                    .map_err(|e| self.auth_failed(e.message().to_string()))?;
            }
        }

        if session.authenticated() {
            Ok(())
        } else {
            Err(self.auth_failed("no accepted credentials".into()))
        }
    }

    fn establish(&self) -> Result<SftpConnection, ConnectError> {
        let tcp = self.tcp_connect()?;
        let mut session = Session::new().map_err(|e| self.failed(e.to_string()))?;

        let read_ms = u32::try_from(self.config.timeouts.read_ms).unwrap_or(u32::MAX);
        session.set_timeout(read_ms);
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| match e.code() {
            // LIBSSH2_ERROR_TIMEOUT
            ErrorCode::Session(-9) => ConnectError::Timeout {
                host: self.host(),
                port: self.port(),
                timeout: self.config.timeouts.read(),
            },
            _ => self.failed(format!("SSH handshake failed: {}", e.message())),
        })?;

        self.authenticate(&session)?;

        let sftp = session
            .sftp()
            .map_err(|e| self.failed(format!("unable to open sftp channel: {}", e.message())))?;
        Ok(SftpConnection::new(session, sftp))
    }
}

impl ConnectionFactory for SftpConnectionFactory {
    type Connection = SftpConnection;

    fn create(&self) -> Result<SftpConnection, ConnectError> {
        match self.establish() {
            Ok(conn) => {
                info!(
                    "Connected to sftp://{}@{}",
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

    fn destroy(&self, mut conn: SftpConnection) -> Result<(), TransportError> {
        conn.disconnect()
    }

    fn validate(&self, conn: &mut SftpConnection) -> bool {
        match conn.keepalive() {
            Ok(()) => true,
            Err(e) => {
                warn!("Keep-alive to {} failed: {}", self.config.endpoint(), e);
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("sftp://{}", self.config.endpoint())
    }
}
