//! Connection establishment with timeout and bounded retry

mod backoff;

pub use backoff::ExponentialBackoff;

use std::time::Duration;

use tokio::net::TcpStream;

use rsh_core::config::{InitiatorConfig, RetryConfig};
use rsh_core::error::ConnectionError;
use rsh_core::with_default_port;

/// Opens the TCP connection to a responder
#[derive(Debug, Clone)]
pub struct Connector {
    address: String,
    connect_timeout: Duration,
    retry: RetryConfig,
}

impl Connector {
    /// Connector for `target` (`host` or `host:port`) using the initiator config
    pub fn new(target: &str, config: &InitiatorConfig) -> Self {
        Self {
            address: with_default_port(target),
            connect_timeout: config.connect_timeout,
            retry: config.retry.clone(),
        }
    }

    /// Address in `host:port` form
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Connect, retrying failed attempts with exponential backoff.
    ///
    /// Only connection establishment is retried; once connected the caller
    /// owns the stream and any later failure is final.
    pub async fn connect(&self) -> Result<TcpStream, ConnectionError> {
        let attempts = self.retry.attempts.max(1);
        let mut backoff = ExponentialBackoff::from_config(&self.retry);

        let mut attempt = 1;
        loop {
            match self.try_connect().await {
                Ok(stream) => {
                    tracing::info!("Connected to {}", self.address);
                    return Ok(stream);
                }
                Err(e) if attempt >= attempts => {
                    tracing::debug!("Giving up on {} after {} attempt(s)", self.address, attempt);
                    return Err(e);
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        "Connection attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn try_connect(&self) -> Result<TcpStream, ConnectionError> {
        let connect = TcpStream::connect(self.address.as_str());
        let stream = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ConnectionError::Unreachable {
                    address: self.address.clone(),
                    source,
                })
            }
            Err(_) => return Err(ConnectionError::Timeout(self.address.clone())),
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY: {}", e);
        }
        Ok(stream)
    }
}
