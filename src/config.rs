//! Configuration management for the RAX remote file client
//!
//! Settings come from an optional `config.toml` layered under environment
//! variables prefixed with `RAX_FTP_CLIENT` (e.g. `RAX_FTP_CLIENT_HOSTNAME`,
//! `RAX_FTP_CLIENT_POOL__MAX_SIZE`).

use config::{Config, Environment, File, FileFormat, FileSourceFile};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;
use crate::pool::PoolConfig;

/// Transport protocol backing a client instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Ftp,
    Sftp,
}

impl Protocol {
    /// Well-known port used when the configuration leaves `port` at 0.
    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Ftp => 21,
            Protocol::Sftp => 22,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ftp => write!(f, "ftp"),
            Protocol::Sftp => write!(f, "sftp"),
        }
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ftp" => Ok(Protocol::Ftp),
            "sftp" => Ok(Protocol::Sftp),
            other => Err(Error::UnsupportedProtocol(other.to_string())),
        }
    }
}

/// FTP representation type for transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Binary,
    Ascii,
}

/// FTP data connection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataConnectionMode {
    Passive,
    Active,
}

/// Connection pool settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PoolSettings {
    /// Keep connections in a pool; when false every operation opens and
    /// closes its own connection.
    pub enabled: bool,
    pub max_size: usize,
    /// How long a borrow waits for a free connection; 0 waits forever.
    pub borrow_timeout_ms: u64,
    /// Probe idle connections before handing them out.
    pub test_on_borrow: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 8,
            borrow_timeout_ms: 30_000,
            test_on_borrow: true,
        }
    }
}

/// Network timeouts, in milliseconds
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TimeoutSettings {
    pub connect_ms: u64,
    pub read_ms: u64,
    pub data_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            connect_ms: 60_000,
            read_ms: 60_000,
            data_ms: 60_000,
        }
    }
}

impl TimeoutSettings {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    pub fn data(&self) -> Duration {
        Duration::from_millis(self.data_ms)
    }
}

/// Complete client configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    pub protocol: Protocol,
    pub hostname: String,
    /// 0 selects the protocol's well-known port.
    #[serde(default)]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    /// SFTP only: private key used instead of the password.
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    #[serde(default)]
    pub passphrase: Option<String>,

    #[serde(default)]
    pub pool: PoolSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,

    /// Buffer size for transfers, in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_file_type")]
    pub file_type: FileType,
    #[serde(default = "default_data_mode")]
    pub data_connection_mode: DataConnectionMode,
}

fn default_buffer_size() -> usize {
    10240
}

fn default_encoding() -> String {
    "UTF-8".to_string()
}

fn default_file_type() -> FileType {
    FileType::Binary
}

fn default_data_mode() -> DataConnectionMode {
    DataConnectionMode::Passive
}

impl ClientConfig {
    /// Minimal configuration with defaults for everything but the endpoint.
    pub fn new(protocol: Protocol, hostname: &str, username: &str) -> Self {
        Self {
            protocol,
            hostname: hostname.to_string(),
            port: 0,
            username: username.to_string(),
            password: None,
            private_key: None,
            passphrase: None,
            pool: PoolSettings::default(),
            timeouts: TimeoutSettings::default(),
            buffer_size: default_buffer_size(),
            encoding: default_encoding(),
            file_type: default_file_type(),
            data_connection_mode: default_data_mode(),
        }
    }

    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, Error> {
        // Try packaged path first, then the working directory
        let config_paths = ["rax-ftp-client/config", "config"];

        for config_path in &config_paths {
            let found = ["toml", "yaml", "json"]
                .iter()
                .any(|ext| Path::new(&format!("{config_path}.{ext}")).exists());
            if found {
                return Self::from_sources(Some(File::with_name(config_path)));
            }
        }

        // No file at all: environment only
        Self::from_sources(None)
    }

    /// Load configuration from an explicit file with environment overrides
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        Self::from_sources(Some(File::from(path)))
    }

    fn from_sources(file: Option<File<FileSourceFile, FileFormat>>) -> Result<Self, Error> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(file);
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("RAX_FTP_CLIENT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: ClientConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.hostname.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "hostname cannot be empty".into(),
            ));
        }

        if self.username.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "username cannot be empty".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(config::ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        if self.pool.max_size == 0 {
            return Err(config::ConfigError::Message(
                "pool.max_size must be greater than 0".into(),
            ));
        }

        let encoding = self.encoding.to_ascii_lowercase().replace('-', "");
        if encoding != "utf8" {
            return Err(config::ConfigError::Message(format!(
                "Unsupported encoding {}: only UTF-8 is supported",
                self.encoding
            )));
        }

        if self.protocol == Protocol::Ftp && self.private_key.is_some() {
            return Err(config::ConfigError::Message(
                "private_key is only supported with the sftp protocol".into(),
            ));
        }

        Ok(())
    }

    /// Port to connect to, falling back to the protocol default
    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            self.protocol.default_port()
        } else {
            self.port
        }
    }

    /// Host and port as `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.hostname, self.effective_port())
    }

    /// Pool settings as consumed by [`crate::pool::Pool`]
    pub fn pool_config(&self) -> PoolConfig {
        let borrow_timeout = match self.pool.borrow_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        PoolConfig {
            max_size: self.pool.max_size,
            borrow_timeout,
            test_on_borrow: self.pool.test_on_borrow,
        }
    }
}
