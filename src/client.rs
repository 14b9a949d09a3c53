//! AbuseIPDB HTTP client.

use crate::config::AbuseIpDbConfig;
use crate::error::ClientError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Parameters for a `/check` lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub ip_address: String,
    pub max_age_in_days: u32,
    pub verbose: bool,
}

/// Parameters for a `/report` submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    pub ip: String,
    /// Comma-joined category ids, e.g. `18,22`.
    pub categories: String,
    pub comment: String,
    /// ISO-8601 time of the attack.
    pub timestamp: Option<String>,
}

/// Raw outcome of an API call: status, headers and parsed JSON body.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Remote reputation API.
#[async_trait]
pub trait ReputationApi: Send + Sync {
    /// Whether an API key is configured. Calls must not be made otherwise.
    fn has_credential(&self) -> bool;

    /// Look up an IP address.
    async fn lookup(&self, request: &LookupRequest) -> Result<ApiResponse, ClientError>;

    /// Report an abusive IP address.
    async fn report(&self, request: &ReportRequest) -> Result<ApiResponse, ClientError>;
}

/// AbuseIPDB v2 API client.
pub struct AbuseIpDbClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl AbuseIpDbClient {
    /// Create a new client.
    pub fn new(config: &AbuseIpDbConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.credential().map(str::to_string),
        })
    }

    fn key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }

    /// Build the GET `/check` request.
    fn build_lookup(&self, request: &LookupRequest) -> Result<reqwest::Request, ClientError> {
        let mut query = vec![
            ("ipAddress", request.ip_address.clone()),
            ("maxAgeInDays", request.max_age_in_days.to_string()),
        ];
        // The server toggles verbose mode on the key's presence alone.
        if request.verbose {
            query.push(("verbose", String::new()));
        }

        Ok(self
            .client
            .get(format!("{}/check", self.base_url))
            .query(&query)
            .header("Key", self.key())
            .header(ACCEPT, "application/json")
            .build()?)
    }

    /// Build the form-encoded POST `/report` request.
    fn build_report(&self, request: &ReportRequest) -> Result<reqwest::Request, ClientError> {
        let mut form = vec![
            ("ip", request.ip.as_str()),
            ("categories", request.categories.as_str()),
            ("comment", request.comment.as_str()),
        ];
        if let Some(ref timestamp) = request.timestamp {
            form.push(("timestamp", timestamp.as_str()));
        }

        Ok(self
            .client
            .post(format!("{}/report", self.base_url))
            .header("Key", self.key())
            .header(ACCEPT, "application/json")
            .form(&form)
            .build()?)
    }

    async fn execute(&self, request: reqwest::Request) -> Result<ApiResponse, ClientError> {
        let response = self.client.execute(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            warn!(status = status.as_u16(), error = %e, "AbuseIPDB returned a non-JSON body");
            ClientError::InvalidBody(format!("HTTP {}: {}", status, e))
        })?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl ReputationApi for AbuseIpDbClient {
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn lookup(&self, request: &LookupRequest) -> Result<ApiResponse, ClientError> {
        debug!(
            ip = %request.ip_address,
            max_age_in_days = request.max_age_in_days,
            verbose = request.verbose,
            "Querying AbuseIPDB"
        );
        let http_request = self.build_lookup(request)?;
        let response = self.execute(http_request).await?;
        debug!(
            ip = %request.ip_address,
            status = response.status.as_u16(),
            "AbuseIPDB lookup complete"
        );
        Ok(response)
    }

    async fn report(&self, request: &ReportRequest) -> Result<ApiResponse, ClientError> {
        debug!(
            ip = %request.ip,
            categories = %request.categories,
            has_timestamp = request.timestamp.is_some(),
            "Reporting IP to AbuseIPDB"
        );
        let http_request = self.build_report(request)?;
        let response = self.execute(http_request).await?;
        debug!(
            ip = %request.ip,
            status = response.status.as_u16(),
            "AbuseIPDB report complete"
        );
        Ok(response)
    }
}
