use std::future::Future;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};

use crate::error::{Error, Result};
use crate::transport::{Endpoint, Transport};

/// HTTP transport talking to a viewer
///
/// Payloads are POSTed to `/`, clears are a GET of `/clear`. Any 2xx
/// response counts as delivered.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Create a transport with no request timeout
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create with a per-request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Self::builder().timeout(timeout).build()
    }

    /// Create a builder for configuring the transport
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::new()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn exchange(&self, request: impl Future<Output = reqwest::Result<Response>>) -> Result<()> {
        let response = if let Some(timeout) = self.timeout {
            tokio::time::timeout(timeout, request)
                .await
                .map_err(|_| Error::Timeout)??
        } else {
            request.await?
        };

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Status(status.as_u16()))
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn deliver_payload(&self, payload: &[u8], endpoint: &Endpoint) -> Result<()> {
        let request = self
            .client
            .post(endpoint.payload_url())
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send();

        self.exchange(request).await
    }

    async fn deliver_clear(&self, endpoint: &Endpoint) -> Result<()> {
        let request = self.client.get(endpoint.clear_url()).send();
        self.exchange(request).await
    }
}

/// Builder for configuring HTTP transport
#[derive(Default)]
pub struct HttpTransportBuilder {
    timeout: Option<Duration>,
    client: Option<Client>,
}

impl HttpTransportBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set or clear the per-request timeout
    pub fn maybe_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use an existing client instead of building one
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> Result<HttpTransport> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder().build()?,
        };

        Ok(HttpTransport {
            client,
            timeout: self.timeout,
        })
    }
}
