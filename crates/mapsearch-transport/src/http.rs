use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::{QueryRequest, QueryResponse, QueryTransport, Result, TransportError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Sends queries as `GET endpoint?params` and decodes the JSON reply.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Reuse an existing client (connection pool, proxy settings, ...).
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    #[instrument(name = "HTTP query", level = "debug", skip_all, fields(endpoint = %request.endpoint))]
    async fn send(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let response = self
            .client
            .get(&request.endpoint)
            .query(&request.params)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?
            .error_for_status()?;

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        debug!(bytes = body.len(), "Query reply received");

        Ok(serde_json::from_slice(&body)?)
    }
}

impl HttpTransport {
    fn classify(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Http(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout() {
        assert_eq!(HttpTransport::new().timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_custom_timeout() {
        let transport = HttpTransport::new().with_timeout(Duration::from_millis(250));
        assert_eq!(transport.timeout(), Duration::from_millis(250));
    }
}
