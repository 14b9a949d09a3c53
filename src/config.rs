//! Configuration types for the AbuseIPDB MCP server.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable holding the AbuseIPDB API key.
pub const API_KEY_ENV: &str = "ABUSEIPDB_API_KEY";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// AbuseIPDB API settings.
    #[serde(default)]
    pub abuseipdb: AbuseIpDbConfig,

    /// Protocol server settings.
    #[serde(default)]
    pub server: ServerSettings,
}

/// AbuseIPDB API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AbuseIpDbConfig {
    /// API key (supports ${ENV_VAR} syntax). Empty counts as unset.
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for AbuseIpDbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl AbuseIpDbConfig {
    /// The configured key, if it is non-empty.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Protocol server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    /// Name reported in the initialize handshake.
    #[serde(default = "default_server_name")]
    pub name: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: default_server_name(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.abuseipdb.com/api/v2".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_server_name() -> String {
    "abuseipdb-mcp-server".to_string()
}

impl Config {
    /// Default configuration with the API key taken from the environment.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.fill_credential_from_env();
        config
    }

    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        config.fill_credential_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML content after expanding ${VAR} references.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let expanded = expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        Ok(config)
    }

    fn fill_credential_from_env(&mut self) {
        if self.abuseipdb.credential().is_none() {
            self.abuseipdb.api_key = std::env::var(API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = reqwest::Url::parse(&self.abuseipdb.base_url).map_err(|e| {
            anyhow::anyhow!("Invalid base_url '{}': {}", self.abuseipdb.base_url, e)
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!(
                "base_url must use http or https, got '{}'",
                url.scheme()
            );
        }

        if self.abuseipdb.timeout_seconds == 0 {
            anyhow::bail!("timeout_seconds must be greater than 0");
        }

        if self.server.name.trim().is_empty() {
            anyhow::bail!("server name must not be empty");
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# AbuseIPDB MCP Server Configuration

abuseipdb:
  api_key: "${ABUSEIPDB_API_KEY}"    # Falls back to the environment when empty
  base_url: "https://api.abuseipdb.com/api/v2"
  timeout_seconds: 30                # Per-request ceiling

server:
  name: "abuseipdb-mcp-server"      # Reported during initialize
"#
        .to_string()
    }
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid");
    re.replace_all(content, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_default()
    })
    .into_owned()
}
