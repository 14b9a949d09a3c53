//! Error kinds surfaced by the tools, and translation of failed API responses.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;

/// Error from the outbound HTTP call.
#[derive(Debug)]
pub enum ClientError {
    /// HTTP request failed.
    Http(reqwest::Error),
    /// Request timed out.
    Timeout,
    /// Response body was not JSON.
    InvalidBody(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Http(e) => write!(f, "HTTP error: {}", e),
            ClientError::Timeout => write!(f, "Request timed out"),
            ClientError::InvalidBody(msg) => write!(f, "Invalid response body: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Http(e)
        }
    }
}

/// Terminal failure of a tool invocation. Every variant renders to the text
/// returned to the caller with the error flag set.
#[derive(Debug)]
pub enum ToolError {
    /// No API key configured.
    Configuration,
    /// Malformed argument.
    Validation(String),
    /// HTTP 429 from the API.
    RateLimited {
        retry_after: Option<String>,
        remaining: Option<String>,
        limit: Option<String>,
        body: Value,
    },
    /// Any other non-2xx status.
    RemoteApi {
        status: u16,
        detail: String,
        body: Value,
    },
    /// Transport failure, timeout or unparseable body.
    Network(ClientError),
    /// A successful payload lacked a required field.
    Formatting { field: String, raw: Value },
    /// Tool name not recognised.
    UnknownTool(String),
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolError::Configuration => {
                write!(f, "❌ ABUSEIPDB_API_KEY environment variable is required")
            }
            ToolError::Validation(msg) => write!(f, "❌ {}", msg),
            ToolError::RateLimited {
                retry_after,
                remaining,
                limit,
                body,
            } => {
                write!(f, "❌ Rate limit exceeded (429)")?;
                if let Some(retry_after) = retry_after {
                    write!(f, ". Retry after {} seconds", retry_after)?;
                }
                if let (Some(remaining), Some(limit)) = (remaining, limit) {
                    write!(f, ". {}/{} requests remaining", remaining, limit)?;
                }
                write!(f, "\n\nError details: {}", body)
            }
            ToolError::RemoteApi {
                status,
                detail,
                body,
            } => write!(f, "❌ API Error ({}): {}\n\nFull response: {}", status, detail, body),
            ToolError::Network(e) => write!(f, "❌ API request failed: {}", e),
            ToolError::Formatting { field, raw } => {
                let pretty = serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_string());
                write!(
                    f,
                    "❌ Error formatting response - missing field '{}'. Raw data: {}",
                    field, pretty
                )
            }
            ToolError::UnknownTool(name) => write!(f, "Unknown tool: {}", name),
        }
    }
}

impl std::error::Error for ToolError {}

impl From<ClientError> for ToolError {
    fn from(e: ClientError) -> Self {
        ToolError::Network(e)
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Classify a non-success API response.
pub fn classify(status: StatusCode, headers: &HeaderMap, body: &Value) -> ToolError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ToolError::RateLimited {
            retry_after: header_value(headers, "retry-after"),
            remaining: header_value(headers, "x-ratelimit-remaining"),
            limit: header_value(headers, "x-ratelimit-limit"),
            body: body.clone(),
        };
    }

    let detail = body
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(|first| first.get("detail"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown API error")
        .to_string();

    ToolError::RemoteApi {
        status: status.as_u16(),
        detail,
        body: body.clone(),
    }
}

/// Render a human-readable diagnostic for a non-success API response.
pub fn translate(status: StatusCode, headers: &HeaderMap, body: &Value) -> String {
    classify(status, headers, body).to_string()
}
