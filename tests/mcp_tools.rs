//! End-to-end tool calls through the JSON-RPC server against a mock AbuseIPDB API.

use abuseipdb_mcp_server::config::{AbuseIpDbConfig, Config, ServerSettings};
use abuseipdb_mcp_server::McpServer;
use mockito::Matcher;
use serde_json::{json, Value};

fn config_for(base_url: String, api_key: Option<&str>) -> Config {
    Config {
        abuseipdb: AbuseIpDbConfig {
            api_key: api_key.map(str::to_string),
            base_url,
            timeout_seconds: 5,
        },
        server: ServerSettings::default(),
    }
}

async fn call_tool(server: &McpServer, name: &str, arguments: Value) -> Value {
    let request = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    });
    let response = server
        .handle_request(&request.to_string())
        .await
        .expect("tools/call always gets a response");
    assert!(response.error.is_none());
    response.result.unwrap()
}

fn result_text(result: &Value) -> &str {
    result["content"][0]["text"].as_str().unwrap()
}

#[tokio::test]
async fn check_ip_renders_verbose_lookup() {
    let mut api = mockito::Server::new_async().await;
    let mock = api
        .mock("GET", "/api/v2/check")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("ipAddress".into(), "118.25.6.39".into()),
            Matcher::UrlEncoded("maxAgeInDays".into(), "90".into()),
            Matcher::UrlEncoded("verbose".into(), "".into()),
        ]))
        .match_header("key", "integration-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "data": {
                    "ipAddress": "118.25.6.39",
                    "isPublic": true,
                    "ipVersion": 4,
                    "isWhitelisted": false,
                    "abuseConfidenceScore": 100,
                    "countryCode": "CN",
                    "countryName": "China",
                    "usageType": "Data Center/Web Hosting/Transit",
                    "isp": "Tencent Cloud Computing (Beijing) Co. Ltd",
                    "domain": "tencent.com",
                    "hostnames": [],
                    "isTor": false,
                    "totalReports": 7,
                    "numDistinctUsers": 4,
                    "lastReportedAt": "2018-12-20T20:55:14+00:00",
                    "reports": (0..7).map(|i| json!({
                        "reportedAt": format!("2018-12-2{}T20:55:14+00:00", i),
                        "comment": format!("attempt {}", i),
                        "categories": [18, 22],
                        "reporterId": 1,
                        "reporterCountryCode": "US",
                        "reporterCountryName": "United States"
                    })).collect::<Vec<_>>()
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let server = McpServer::new(&config_for(
        format!("{}/api/v2", api.url()),
        Some("integration-key"),
    ))
    .unwrap();

    let result = call_tool(
        &server,
        "check_ip",
        json!({"ipAddress": "118.25.6.39", "maxAgeInDays": 90, "verbose": true}),
    )
    .await;

    assert_eq!(result["isError"], false);
    let text = result_text(&result);
    assert!(text.contains("Abuse Confidence Score: 100%"));
    assert!(text.contains("Country: China (CN)"));
    assert!(text.contains("18 (Brute-Force), 22 (SSH)"));
    assert!(text.contains("  5. Reported At: "));
    assert!(!text.contains("  6. Reported At: "));
    assert!(text.contains("... and 2 more reports"));
    mock.assert_async().await;
}

#[tokio::test]
async fn report_ip_surfaces_rate_limit() {
    let mut api = mockito::Server::new_async().await;
    let _mock = api
        .mock("POST", "/api/v2/report")
        .with_status(429)
        .with_header("content-type", "application/json")
        .with_header("retry-after", "120")
        .with_header("x-ratelimit-limit", "1000")
        .with_header("x-ratelimit-remaining", "0")
        .with_body(r#"{"errors":[{"detail":"Daily rate limit of 1000 requests exceeded for this endpoint.","status":429}]}"#)
        .create_async()
        .await;

    let server = McpServer::new(&config_for(
        format!("{}/api/v2", api.url()),
        Some("integration-key"),
    ))
    .unwrap();

    let result = call_tool(
        &server,
        "report_ip",
        json!({"ip": "127.0.0.1", "categories": "18,22", "comment": "SSH login attempts"}),
    )
    .await;

    assert_eq!(result["isError"], true);
    let text = result_text(&result);
    assert!(text.starts_with("❌ Rate limit exceeded (429)"));
    assert!(text.contains("Retry after 120 seconds"));
    assert!(text.contains("0/1000 requests remaining"));
    assert!(text.contains("Daily rate limit"));
}

#[tokio::test]
async fn missing_key_never_reaches_the_api() {
    let mut api = mockito::Server::new_async().await;
    let mock = api
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let server = McpServer::new(&config_for(format!("{}/api/v2", api.url()), None)).unwrap();

    let result = call_tool(&server, "check_ip", json!({"ipAddress": "1.2.3.4"})).await;
    assert_eq!(result["isError"], true);
    assert_eq!(
        result_text(&result),
        "❌ ABUSEIPDB_API_KEY environment variable is required"
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_api_is_reported_as_request_failure() {
    let server = McpServer::new(&config_for(
        "http://127.0.0.1:1/api/v2".to_string(),
        Some("integration-key"),
    ))
    .unwrap();

    let result = call_tool(&server, "check_ip", json!({"ipAddress": "1.2.3.4"})).await;
    assert_eq!(result["isError"], true);
    assert!(result_text(&result).starts_with("❌ API request failed: "));
}
