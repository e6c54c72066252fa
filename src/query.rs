//! Query submission over the request/response channel.
//!
//! Queries are independent of the streaming link: a failed submission is
//! reported to the caller and never touches the snapshot or the connection
//! state. There is no retry and no queueing.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pipewatch::query::QueryGateway;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = QueryGateway::builder()
//!         .endpoint("http://localhost:8000")
//!         .build()?;
//!
//!     let answer = gateway.submit("rows processed by ingest").await?;
//!     println!("{}", answer);
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::QueryError;

/// Default base address of the request/response channel.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";

/// Path appended to the endpoint for query submission.
pub const QUERY_PATH: &str = "/api/query";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Stateless client for the query endpoint.
#[derive(Debug, Clone)]
pub struct QueryGateway {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

impl QueryGateway {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> QueryGatewayBuilder {
        QueryGatewayBuilder::default()
    }

    /// Full URL queries are posted to.
    pub fn url(&self) -> String {
        format!("{}{}", self.endpoint, QUERY_PATH)
    }

    /// Submit one query and return the JSON response.
    pub async fn submit(&self, query: &str) -> Result<Value, QueryError> {
        let url = self.url();
        debug!(%url, "Submitting query");

        let response = self
            .client
            .post(&url)
            .json(&QueryRequest { query })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Query rejected");
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| QueryError::Parse(e.to_string()))
    }
}

/// Builder for QueryGateway.
#[derive(Debug, Default)]
pub struct QueryGatewayBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl QueryGatewayBuilder {
    /// Set the base address (e.g., "http://localhost:8000").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the gateway.
    pub fn build(self) -> Result<QueryGateway, QueryError> {
        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| QueryError::Client(e.to_string()))?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(QueryGateway {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}
