//! Connectivity check used to tell "offline" apart from "server unreachable".
//!
//! Only consulted after a request has already failed to produce a response.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

/// Boxed future resolving to the online verdict.
pub type OnlineFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> OnlineFuture<'_>;
}

/// Online if a TCP connection to `address` opens within `timeout`.
#[derive(Debug, Clone)]
pub struct TcpConnectivity {
    address: String,
    timeout: Duration,
}

impl TcpConnectivity {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    async fn probe(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.address.as_str())).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(address = %self.address, error = %e, "connectivity probe refused");
                false
            }
            Err(_) => {
                debug!(
                    address = %self.address,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "connectivity probe timed out"
                );
                false
            }
        }
    }
}

impl Connectivity for TcpConnectivity {
    fn is_online(&self) -> OnlineFuture<'_> {
        Box::pin(self.probe())
    }
}

/// Fixed verdict (for testing).
#[derive(Debug, Clone, Copy)]
pub struct StaticConnectivity(pub bool);

impl Connectivity for StaticConnectivity {
    fn is_online(&self) -> OnlineFuture<'_> {
        let online = self.0;
        Box::pin(async move { online })
    }
}
