//! AbuseIPDB MCP server.
//!
//! Exposes two AbuseIPDB operations as MCP tools over newline-delimited
//! JSON-RPC on stdio.
//!
//! # Tools
//!
//! - **check_ip** - Look up an IP's abuse confidence score, metadata and recent reports
//! - **report_ip** - Submit an abuse report with category ids and an optional comment
//!
//! Arguments are validated before any network access, and every failure
//! (missing API key, malformed input, rate limiting, API or transport errors)
//! is returned to the client as an error-flagged text result.
//!
//! IPv6 addresses are only accepted in full eight-group form or as the
//! literals `::1` and `::`; compressed forms like `2001:db8::1` are rejected.
//!
//! # Example Configuration
//!
//! ```yaml
//! abuseipdb:
//!   api_key: "${ABUSEIPDB_API_KEY}"
//!   timeout_seconds: 30
//!
//! server:
//!   name: "abuseipdb-mcp-server"
//! ```

pub mod categories;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod protocol;
pub mod server;
pub mod service;
pub mod tools;
pub mod validate;

pub use client::{AbuseIpDbClient, ReputationApi};
pub use config::Config;
pub use server::McpServer;
pub use service::{ToolOutput, ToolService};
