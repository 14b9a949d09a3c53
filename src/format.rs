//! Plain-text rendering of successful API payloads.

use crate::categories;
use crate::error::ToolError;
use serde_json::Value;

/// Maximum number of individual reports rendered for a lookup.
pub const MAX_RENDERED_REPORTS: usize = 5;

const NOT_AVAILABLE: &str = "N/A";

/// Non-null field access.
fn field<'a>(obj: &'a Value, name: &str) -> Option<&'a Value> {
    obj.get(name).filter(|v| !v.is_null())
}

fn require<'a>(obj: &'a Value, name: &str, raw: &Value) -> Result<&'a Value, ToolError> {
    field(obj, name).ok_or_else(|| ToolError::Formatting {
        field: name.to_string(),
        raw: raw.clone(),
    })
}

/// Scalar to display text, without JSON quoting for strings.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn text_or(obj: &Value, name: &str, default: &str) -> String {
    field(obj, name)
        .map(text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn yes_no(value: &Value) -> &'static str {
    if value.as_bool().unwrap_or(false) {
        "Yes"
    } else {
        "No"
    }
}

/// Describe each distinct category of a report, in first-seen order.
fn report_categories(report: &Value, seen: &mut Vec<String>) -> Vec<String> {
    let mut described = Vec::new();
    let ids = field(report, "categories")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for id in ids {
        let label = match id.as_u64().and_then(|n| u32::try_from(n).ok()) {
            Some(n) => categories::describe(n),
            None => text(id),
        };
        if !described.contains(&label) {
            described.push(label.clone());
        }
        if !seen.contains(&label) {
            seen.push(label);
        }
    }
    described
}

fn join_or_na(items: &[String]) -> String {
    if items.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        items.join(", ")
    }
}

/// Render a `/check` payload, or the formatting error when a required field is absent.
pub fn render_lookup(payload: &Value) -> Result<String, ToolError> {
    let data = require(payload, "data", payload)?;
    let ip_address = require(data, "ipAddress", payload)?;
    let score = require(data, "abuseConfidenceScore", payload)?;
    let is_public = require(data, "isPublic", payload)?;
    let is_whitelisted = require(data, "isWhitelisted", payload)?;

    let mut out = String::from("AbuseIPDB Check Results\n\n");
    out.push_str(&format!("IP Address: {}\n", text(ip_address)));
    out.push_str(&format!("Abuse Confidence Score: {}%\n", text(score)));
    out.push_str(&format!("Is Public: {}\n", yes_no(is_public)));
    out.push_str(&format!("Is Whitelisted: {}\n", yes_no(is_whitelisted)));
    out.push_str(&format!(
        "Country: {} ({})\n",
        text_or(data, "countryName", "Unknown"),
        text_or(data, "countryCode", NOT_AVAILABLE)
    ));
    out.push_str(&format!("ISP: {}\n", text_or(data, "isp", NOT_AVAILABLE)));
    out.push_str(&format!(
        "Usage Type: {}\n",
        text_or(data, "usageType", NOT_AVAILABLE)
    ));
    out.push_str(&format!("Domain: {}\n", text_or(data, "domain", NOT_AVAILABLE)));

    let hostnames: Vec<String> = field(data, "hostnames")
        .and_then(Value::as_array)
        .map(|names| names.iter().map(text).collect())
        .unwrap_or_default();
    if !hostnames.is_empty() {
        out.push_str(&format!("Hostnames: {}\n", hostnames.join(", ")));
    }

    out.push_str(&format!("Total Reports: {}\n", text_or(data, "totalReports", "0")));
    out.push_str(&format!(
        "Distinct Reporters: {}\n",
        text_or(data, "numDistinctUsers", "0")
    ));

    if let Some(last) = field(data, "lastReportedAt") {
        out.push_str(&format!("Last Reported: {}\n", text(last)));
    }
    if let Some(is_tor) = field(data, "isTor") {
        out.push_str(&format!("Is Tor: {}\n", yes_no(is_tor)));
    }

    let reports = field(data, "reports")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut all_categories = Vec::new();
    let mut rendered = String::new();
    for (idx, report) in reports.iter().enumerate() {
        let described = report_categories(report, &mut all_categories);
        if idx >= MAX_RENDERED_REPORTS {
            continue;
        }
        rendered.push_str(&format!(
            "  {}. Reported At: {}\n",
            idx + 1,
            text_or(report, "reportedAt", NOT_AVAILABLE)
        ));
        rendered.push_str(&format!("     Categories: {}\n", join_or_na(&described)));
        rendered.push_str(&format!(
            "     Comment: {}\n",
            text_or(report, "comment", NOT_AVAILABLE)
        ));
        rendered.push_str(&format!(
            "     Reporter Country: {}\n",
            text_or(report, "reporterCountryName", NOT_AVAILABLE)
        ));
    }

    out.push_str(&format!("Categories: {}\n", join_or_na(&all_categories)));

    if !reports.is_empty() {
        out.push_str("\nRecent Reports:\n");
        out.push_str(&rendered);
        if reports.len() > MAX_RENDERED_REPORTS {
            let remaining = reports.len() - MAX_RENDERED_REPORTS;
            out.push_str(&format!(
                "  ... and {} more report{}\n",
                remaining,
                if remaining == 1 { "" } else { "s" }
            ));
        }
    }

    Ok(out)
}

/// Render a `/check` payload. Missing required fields degrade to a diagnostic message.
pub fn format_lookup(payload: &Value) -> String {
    render_lookup(payload).unwrap_or_else(|e| e.to_string())
}

/// Render a `/report` payload. Missing fields render as `N/A`.
pub fn format_report(payload: &Value) -> String {
    static MISSING: Value = Value::Null;
    let data = field(payload, "data").unwrap_or(&MISSING);
    let score = field(data, "abuseConfidenceScore")
        .map(|s| format!("{}%", text(s)))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    format!(
        "IP Address Reported Successfully\n\nIP Address: {}\nUpdated Abuse Confidence Score: {}\n",
        text_or(data, "ipAddress", NOT_AVAILABLE),
        score
    )
}
