//! Tool definitions advertised over `tools/list`, and argument parsing for `tools/call`.

use crate::client::{LookupRequest, ReportRequest};
use crate::error::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Number, Value};

pub const CHECK_IP: &str = "check_ip";
pub const REPORT_IP: &str = "report_ip";

const DEFAULT_MAX_AGE_IN_DAYS: i64 = 30;
const MAX_AGE_RANGE: std::ops::RangeInclusive<i64> = 1..=365;

/// Tool definition as listed to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the tool's arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// All tools exposed by the server.
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            CHECK_IP,
            "Check an IP address for abuse reports using AbuseIPDB",
            json!({
                "type": "object",
                "properties": {
                    "ipAddress": {
                        "type": "string",
                        "description": "A valid IPv4 or IPv6 address to check"
                    },
                    "maxAgeInDays": {
                        "type": "integer",
                        "description": "Only return reports within the last x days (1-365)",
                        "minimum": 1,
                        "maximum": 365,
                        "default": 30
                    },
                    "verbose": {
                        "type": "boolean",
                        "description": "Include detailed reports in the response",
                        "default": false
                    }
                },
                "required": ["ipAddress"]
            }),
        ),
        ToolDefinition::new(
            REPORT_IP,
            "Report an abusive IP address to AbuseIPDB",
            json!({
                "type": "object",
                "properties": {
                    "ip": {
                        "type": "string",
                        "description": "A valid IPv4 or IPv6 address to report"
                    },
                    "categories": {
                        "type": "string",
                        "description": "Comma separated category IDs (e.g., '18,22')"
                    },
                    "comment": {
                        "type": "string",
                        "description": "Descriptive text of the attack (no PII)"
                    },
                    "timestamp": {
                        "type": "string",
                        "description": "ISO 8601 datetime of the attack (optional)"
                    }
                },
                "required": ["ip", "categories"]
            }),
        ),
    ]
}

/// Type-checked `check_ip` arguments. Ranges are checked by [`CheckIpArgs::into_request`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIpArgs {
    ip_address: Option<String>,
    max_age_in_days: Option<Number>,
    verbose: Option<bool>,
}

impl CheckIpArgs {
    pub fn ip_address(&self) -> &str {
        self.ip_address.as_deref().unwrap_or_default()
    }

    /// Apply defaults and the `maxAgeInDays` range check.
    pub fn into_request(self) -> Result<LookupRequest, ToolError> {
        let max_age = match self.max_age_in_days {
            Some(ref n) => whole_number(n).ok_or_else(|| {
                ToolError::Validation("maxAgeInDays must be a whole number".to_string())
            })?,
            None => DEFAULT_MAX_AGE_IN_DAYS,
        };
        if !MAX_AGE_RANGE.contains(&max_age) {
            return Err(ToolError::Validation(
                "maxAgeInDays must be between 1 and 365".to_string(),
            ));
        }

        Ok(LookupRequest {
            ip_address: self.ip_address.unwrap_or_default(),
            max_age_in_days: max_age as u32,
            verbose: self.verbose.unwrap_or(false),
        })
    }
}

/// Integer value of `n`, accepting floats with no fractional part (`30.0`).
fn whole_number(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

#[derive(Debug, Default, Deserialize)]
struct ReportIpArgs {
    ip: Option<String>,
    categories: Option<String>,
    comment: Option<String>,
    timestamp: Option<String>,
}

fn parse_args<T>(tool: &str, arguments: &Value) -> Result<T, ToolError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if arguments.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(arguments.clone())
        .map_err(|e| ToolError::Validation(format!("Invalid arguments for {}: {}", tool, e)))
}

/// Type-check `check_ip` arguments. IP syntax and ranges are checked afterwards.
pub fn parse_check_ip(arguments: &Value) -> Result<CheckIpArgs, ToolError> {
    parse_args(CHECK_IP, arguments)
}

/// Build a report request from `report_ip` arguments. IP and category syntax are checked separately.
pub fn parse_report_ip(arguments: &Value) -> Result<ReportRequest, ToolError> {
    let args: ReportIpArgs = parse_args(REPORT_IP, arguments)?;

    Ok(ReportRequest {
        ip: args.ip.unwrap_or_default(),
        categories: args.categories.unwrap_or_default(),
        comment: args.comment.unwrap_or_default(),
        timestamp: args.timestamp.filter(|t| !t.is_empty()),
    })
}
