use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod http;

pub use self::http::{HttpTransport, HttpTransportBuilder};

/// Well-known port the viewer listens on
pub const DEFAULT_PORT: u16 = 5255;

pub const DEFAULT_HOST: &str = "localhost";

/// Address of a viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Viewer on this machine
    pub fn local(port: u16) -> Self {
        Self::new(DEFAULT_HOST, port)
    }

    /// Where dump payloads are posted
    pub fn payload_url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }

    /// Where clear requests are sent
    pub fn clear_url(&self) -> String {
        format!("http://{}:{}/clear", self.host, self.port)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::local(DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Transport trait for delivering requests to a viewer
///
/// Each call is one request/response exchange; the queue awaits every call
/// exactly once per item.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a serialized payload
    async fn deliver_payload(&self, payload: &[u8], endpoint: &Endpoint) -> Result<()>;

    /// Ask the viewer to clear everything shown so far
    async fn deliver_clear(&self, endpoint: &Endpoint) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoint_is_local_well_known_port() {
        let endpoint = Endpoint::default();
        assert_eq!(endpoint.payload_url(), "http://localhost:5255/");
        assert_eq!(endpoint.clear_url(), "http://localhost:5255/clear");
    }
}
