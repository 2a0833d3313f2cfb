//! HTTP seam for the token endpoint.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Status and raw body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Issues HTTP calls on behalf of the OAuth flows.
///
/// Returning `Ok` means the exchange completed, whatever the status.
/// Transport faults (timeouts, DNS, refused connections) are `Err`.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn post(&self, url: &str, headers: &[(String, String)], body: String)
        -> Result<HttpResponse>;
}

/// [`RequestExecutor`] over `reqwest`.
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("meli-etl/0.1")
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: String,
    ) -> Result<HttpResponse> {
        let mut request = self.client.post(url).body(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Authentication(format!("Token endpoint unreachable: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Authentication(format!("Failed to read token response: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}
