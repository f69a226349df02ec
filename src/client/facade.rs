//! Building a client from configuration

use log::info;

use crate::client::{FtpClient, RemoteClient, SftpClient};
use crate::config::{ClientConfig, Protocol};
use crate::error::Error;
use crate::pool::{ConnectionFactory, ConnectionSource};
use crate::transport::{FtpConnectionFactory, SftpConnectionFactory};

/// Validate `config` and build the client for its protocol.
///
/// With pooling enabled the pool is filled before this returns, so an
/// unreachable server or bad credentials fail here.
pub fn connect(config: &ClientConfig) -> Result<Box<dyn RemoteClient>, Error> {
    config.validate()?;

    let client: Box<dyn RemoteClient> = match config.protocol {
        Protocol::Ftp => {
            let source = connection_source(FtpConnectionFactory::new(config), config)?;
            Box::new(FtpClient::new(source, config.buffer_size))
        }
        Protocol::Sftp => {
            let source = connection_source(SftpConnectionFactory::new(config), config)?;
            Box::new(SftpClient::new(source, config.buffer_size))
        }
    };
    Ok(client)
}

fn connection_source<F: ConnectionFactory>(
    factory: F,
    config: &ClientConfig,
) -> Result<ConnectionSource<F>, Error> {
    if config.pool.enabled {
        info!(
            "Opening {} pool of {} connections",
            factory.describe(),
            config.pool.max_size
        );
        ConnectionSource::pooled(factory, config.pool_config())
    } else {
        info!("Using single-use {} connections", factory.describe());
        Ok(ConnectionSource::single(factory))
    }
}
