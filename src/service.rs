//! Tool invocation: credential gate, validation, API call, and rendering.

use crate::client::ReputationApi;
use crate::error::{classify, ToolError};
use crate::format;
use crate::tools::{self, CHECK_IP, REPORT_IP};
use crate::validate::{validate_categories, validate_ip};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Text result of a tool call plus its error flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    /// Wire form of a `tools/call` result.
    pub fn to_call_result(&self) -> Value {
        json!({
            "content": [{"type": "text", "text": self.text}],
            "isError": self.is_error
        })
    }
}

impl From<Result<String, ToolError>> for ToolOutput {
    fn from(result: Result<String, ToolError>) -> Self {
        match result {
            Ok(text) => ToolOutput::success(text),
            Err(e) => ToolOutput::error(e.to_string()),
        }
    }
}

/// Dispatches tool calls to the reputation API.
#[derive(Clone)]
pub struct ToolService {
    api: Arc<dyn ReputationApi>,
}

impl ToolService {
    pub fn new(api: Arc<dyn ReputationApi>) -> Self {
        Self { api }
    }

    /// Run a named tool. Never fails: every error becomes an error-flagged output.
    pub async fn call_tool(&self, name: &str, arguments: &Value) -> ToolOutput {
        let result = match name {
            CHECK_IP => self.check_ip(arguments).await,
            REPORT_IP => self.report_ip(arguments).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        };

        if let Err(ref e) = result {
            warn!(tool = name, error = %e, "Tool call failed");
        }
        result.into()
    }

    async fn check_ip(&self, arguments: &Value) -> Result<String, ToolError> {
        if !self.api.has_credential() {
            return Err(ToolError::Configuration);
        }

        let args = tools::parse_check_ip(arguments)?;
        if !validate_ip(args.ip_address()) {
            return Err(ToolError::Validation("Invalid IP address format".to_string()));
        }
        let request = args.into_request()?;

        let response = self.api.lookup(&request).await?;
        if !response.is_success() {
            return Err(classify(response.status, &response.headers, &response.body));
        }

        debug!(ip = %request.ip_address, "Formatting lookup result");
        format::render_lookup(&response.body)
    }

    async fn report_ip(&self, arguments: &Value) -> Result<String, ToolError> {
        if !self.api.has_credential() {
            return Err(ToolError::Configuration);
        }

        let request = tools::parse_report_ip(arguments)?;
        if !validate_ip(&request.ip) {
            return Err(ToolError::Validation("Invalid IP address format".to_string()));
        }
        if !validate_categories(&request.categories) {
            return Err(ToolError::Validation(
                "Categories must be comma-separated integers".to_string(),
            ));
        }

        let response = self.api.report(&request).await?;
        if !response.is_success() {
            return Err(classify(response.status, &response.headers, &response.body));
        }

        Ok(format::format_report(&response.body))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::{ApiResponse, LookupRequest, ReportRequest};
    use crate::error::ClientError;
    use async_trait::async_trait;
    use reqwest::header::{HeaderMap, HeaderValue};
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory API that counts calls and replays one canned response.
    pub(crate) struct FakeApi {
        pub credential: bool,
        pub status: StatusCode,
        pub headers: HeaderMap,
        pub body: Value,
        pub fail: bool,
        pub calls: AtomicUsize,
        pub last_lookup: Mutex<Option<LookupRequest>>,
        pub last_report: Mutex<Option<ReportRequest>>,
    }

    impl FakeApi {
        pub(crate) fn new(status: StatusCode, body: Value) -> Self {
            Self {
                credential: true,
                status,
                headers: HeaderMap::new(),
                body,
                fail: false,
                calls: AtomicUsize::new(0),
                last_lookup: Mutex::new(None),
                last_report: Mutex::new(None),
            }
        }

        fn respond(&self) -> Result<ApiResponse, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ClientError::Timeout);
            }
            Ok(ApiResponse {
                status: self.status,
                headers: self.headers.clone(),
                body: self.body.clone(),
            })
        }
    }

    #[async_trait]
    impl ReputationApi for FakeApi {
        fn has_credential(&self) -> bool {
            self.credential
        }

        async fn lookup(&self, request: &LookupRequest) -> Result<ApiResponse, ClientError> {
            *self.last_lookup.lock().unwrap() = Some(request.clone());
            self.respond()
        }

        async fn report(&self, request: &ReportRequest) -> Result<ApiResponse, ClientError> {
            *self.last_report.lock().unwrap() = Some(request.clone());
            self.respond()
        }
    }

    fn check_payload() -> Value {
        json!({
            "data": {
                "ipAddress": "1.2.3.4",
                "isPublic": true,
                "isWhitelisted": false,
                "abuseConfidenceScore": 100,
                "countryCode": "CN",
                "totalReports": 2,
                "numDistinctUsers": 2,
                "reports": [
                    {"reportedAt": "2023-10-18T11:25:11+00:00", "categories": [18, 22], "comment": "ssh", "reporterCountryName": "Canada"}
                ]
            }
        })
    }

    fn service(api: FakeApi) -> (ToolService, Arc<FakeApi>) {
        let api = Arc::new(api);
        (ToolService::new(api.clone()), api)
    }

    #[tokio::test]
    async fn test_missing_credential_short_circuits() {
        let mut fake = FakeApi::new(StatusCode::OK, check_payload());
        fake.credential = false;
        let (service, api) = service(fake);

        let output = service
            .call_tool(CHECK_IP, &json!({"ipAddress": "1.2.3.4"}))
            .await;
        assert!(output.is_error);
        assert_eq!(output.text, "❌ ABUSEIPDB_API_KEY environment variable is required");

        let output = service
            .call_tool(REPORT_IP, &json!({"ip": "1.2.3.4", "categories": "18"}))
            .await;
        assert!(output.is_error);

        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_check_ip_success() {
        let (service, api) = service(FakeApi::new(StatusCode::OK, check_payload()));

        let output = service
            .call_tool(CHECK_IP, &json!({"ipAddress": "1.2.3.4", "verbose": true}))
            .await;
        assert!(!output.is_error);
        assert!(output.text.contains("Abuse Confidence Score: 100%"));
        assert!(output.text.contains("18 (Brute-Force)"));

        let sent = api.last_lookup.lock().unwrap().clone().unwrap();
        assert_eq!(sent.max_age_in_days, 30);
        assert!(sent.verbose);
    }

    #[tokio::test]
    async fn test_check_ip_invalid_address() {
        let (service, api) = service(FakeApi::new(StatusCode::OK, check_payload()));

        for ip in ["999.999.999.999", "2001:db8::1", ""] {
            let output = service.call_tool(CHECK_IP, &json!({"ipAddress": ip})).await;
            assert!(output.is_error);
            assert_eq!(output.text, "❌ Invalid IP address format");
        }
        let output = service.call_tool(CHECK_IP, &json!({})).await;
        assert!(output.is_error);

        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_check_ip_max_age_out_of_range() {
        let (service, api) = service(FakeApi::new(StatusCode::OK, check_payload()));
        let output = service
            .call_tool(CHECK_IP, &json!({"ipAddress": "1.2.3.4", "maxAgeInDays": 400}))
            .await;
        assert!(output.is_error);
        assert!(output.text.contains("maxAgeInDays"));
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_check_ip_address_checked_before_max_age() {
        let (service, api) = service(FakeApi::new(StatusCode::OK, check_payload()));
        let output = service
            .call_tool(CHECK_IP, &json!({"ipAddress": "bad", "maxAgeInDays": 400}))
            .await;
        assert!(output.is_error);
        assert_eq!(output.text, "❌ Invalid IP address format");
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_check_ip_rate_limited() {
        let mut fake = FakeApi::new(StatusCode::TOO_MANY_REQUESTS, json!({"errors": []}));
        fake.headers.insert("retry-after", HeaderValue::from_static("60"));
        fake.headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        fake.headers.insert("x-ratelimit-limit", HeaderValue::from_static("1000"));
        let (service, _) = service(fake);

        let output = service.call_tool(CHECK_IP, &json!({"ipAddress": "1.2.3.4"})).await;
        assert!(output.is_error);
        assert!(output.text.contains("Rate limit exceeded (429)"));
        assert!(output.text.contains("Retry after 60 seconds"));
        assert!(output.text.contains("0/1000 requests remaining"));
    }

    #[tokio::test]
    async fn test_check_ip_api_error() {
        let fake = FakeApi::new(
            StatusCode::UNAUTHORIZED,
            json!({"errors": [{"detail": "Authentication failed. Your API key is either missing, incorrect, or revoked.", "status": 401}]}),
        );
        let (service, _) = service(fake);

        let output = service.call_tool(CHECK_IP, &json!({"ipAddress": "1.2.3.4"})).await;
        assert!(output.is_error);
        assert!(output.text.starts_with("❌ API Error (401): Authentication failed."));
    }

    #[tokio::test]
    async fn test_check_ip_network_failure() {
        let mut fake = FakeApi::new(StatusCode::OK, check_payload());
        fake.fail = true;
        let (service, api) = service(fake);

        let output = service.call_tool(CHECK_IP, &json!({"ipAddress": "1.2.3.4"})).await;
        assert!(output.is_error);
        assert_eq!(output.text, "❌ API request failed: Request timed out");
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_check_ip_formatting_error() {
        let (service, _) = service(FakeApi::new(StatusCode::OK, json!({"data": {}})));
        let output = service.call_tool(CHECK_IP, &json!({"ipAddress": "1.2.3.4"})).await;
        assert!(output.is_error);
        assert!(output.text.contains("missing field 'ipAddress'"));
    }

    #[tokio::test]
    async fn test_report_ip_success() {
        let fake = FakeApi::new(
            StatusCode::OK,
            json!({"data": {"ipAddress": "1.2.3.4", "abuseConfidenceScore": 52}}),
        );
        let (service, api) = service(fake);

        let output = service
            .call_tool(
                REPORT_IP,
                &json!({"ip": "1.2.3.4", "categories": "18,22", "comment": "brute force"}),
            )
            .await;
        assert!(!output.is_error);
        assert!(output.text.starts_with("IP Address Reported Successfully"));
        assert!(output.text.contains("Updated Abuse Confidence Score: 52%"));

        let sent = api.last_report.lock().unwrap().clone().unwrap();
        assert_eq!(sent.categories, "18,22");
        assert_eq!(sent.comment, "brute force");
        assert!(sent.timestamp.is_none());
    }

    #[tokio::test]
    async fn test_report_ip_validation() {
        let (service, api) = service(FakeApi::new(StatusCode::OK, json!({})));

        let output = service
            .call_tool(REPORT_IP, &json!({"ip": "not-an-ip", "categories": "18"}))
            .await;
        assert_eq!(output.text, "❌ Invalid IP address format");

        for categories in ["18,", ",18", "abc", ""] {
            let output = service
                .call_tool(REPORT_IP, &json!({"ip": "1.2.3.4", "categories": categories}))
                .await;
            assert!(output.is_error);
            assert_eq!(output.text, "❌ Categories must be comma-separated integers");
        }

        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (service, api) = service(FakeApi::new(StatusCode::OK, json!({})));
        let output = service.call_tool("delete_ip", &json!({})).await;
        assert!(output.is_error);
        assert_eq!(output.text, "Unknown tool: delete_ip");
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_call_result_shape() {
        let value = ToolOutput::error("boom").to_call_result();
        assert_eq!(
            value,
            json!({"content": [{"type": "text", "text": "boom"}], "isError": true})
        );
    }
}
