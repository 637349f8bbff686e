//! Insight Agent configuration loader.
//!
//! A TOML file is optional: every field has a default, and the usual
//! deployment sets only `CEREBRAS_API_KEY` in the environment or `.env`.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_FILE: &str = "insight-agent.toml";
pub const MIN_API_KEY_LEN: usize = 20;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a data analytics assistant. \
You must NOT access database directly. \
You must use provided tools to answer questions. \
Always provide clear and helpful responses based on the data you receive.";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InsightConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_model() -> String {
    "llama-3.3-70b".to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeysConfig {
    /// Cerebras (or other OpenAI-compatible) API key.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            timeout_seconds: default_llm_timeout_seconds(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.cerebras.ai/v1".to_string()
}

fn default_llm_timeout_seconds() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
    #[serde(default = "default_http_max_in_flight")]
    pub http_max_in_flight: usize,
    #[serde(default = "default_cors_allow_any_origin")]
    pub cors_allow_any_origin: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            http_timeout_seconds: default_http_timeout_seconds(),
            http_max_in_flight: default_http_max_in_flight(),
            cors_allow_any_origin: default_cors_allow_any_origin(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_http_timeout_seconds() -> u64 {
    90
}

fn default_http_max_in_flight() -> usize {
    64
}

fn default_cors_allow_any_origin() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "sales.db".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntegrationsConfig {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub trello: TrelloConfig,
    #[serde(default)]
    pub jira: JiraConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GithubConfig {
    #[serde(default)]
    pub token: String,
    /// `owner/name`.
    #[serde(default)]
    pub repo: String,
}

impl GithubConfig {
    pub fn is_configured(&self) -> bool {
        !self.token.trim().is_empty() && !self.repo.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrelloConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub list_id: String,
}

impl TrelloConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
            && !self.token.trim().is_empty()
            && !self.list_id.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JiraConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub project: String,
}

impl JiraConfig {
    pub fn is_configured(&self) -> bool {
        [&self.url, &self.email, &self.token, &self.project]
            .iter()
            .all(|v| !v.trim().is_empty())
    }
}

/// Presence and length of the model credential. Nothing is sent upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyStatus {
    pub configured: bool,
    pub length: usize,
    pub error: Option<String>,
}

impl ApiKeyStatus {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

impl InsightConfig {
    /// An explicit path must exist. The default path may be absent, in which
    /// case defaults plus environment overrides are used.
    pub async fn load_with_path(path: Option<PathBuf>) -> anyhow::Result<(Self, PathBuf)> {
        let explicit = path.is_some();
        let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut cfg = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Self::parse(&contents)
                .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?,
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    config_path = %path.display(),
                    "config file not found; using defaults"
                );
                Self::default()
            }
            Err(e) => return Err(anyhow::anyhow!("read config {}: {e}", path.display())),
        };

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok((cfg, path))
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CEREBRAS_API_KEY") {
            self.keys.api_key = Some(v.trim().to_string());
        }
        if let Some(v) = get("INSIGHT_AGENT_MODEL") {
            self.general.model = v;
        }
        if let Some(v) = get("INSIGHT_AGENT_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = get("INSIGHT_AGENT_DB_PATH") {
            self.database.path = v;
        }
        if let Some(v) = get("INSIGHT_AGENT_BIND_ADDR") {
            self.server.bind_addr = v;
        }

        let github = &mut self.integrations.github;
        if let Some(v) = get("GITHUB_TOKEN") {
            github.token = v;
        }
        if let Some(v) = get("GITHUB_REPO") {
            github.repo = v;
        }
        let trello = &mut self.integrations.trello;
        if let Some(v) = get("TRELLO_API_KEY") {
            trello.api_key = v;
        }
        if let Some(v) = get("TRELLO_TOKEN") {
            trello.token = v;
        }
        if let Some(v) = get("TRELLO_LIST_ID") {
            trello.list_id = v;
        }
        let jira = &mut self.integrations.jira;
        if let Some(v) = get("JIRA_URL") {
            jira.url = v;
        }
        if let Some(v) = get("JIRA_EMAIL") {
            jira.email = v;
        }
        if let Some(v) = get("JIRA_TOKEN") {
            jira.token = v;
        }
        if let Some(v) = get("JIRA_PROJECT") {
            jira.project = v;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.general.model.trim().is_empty() {
            return Err(anyhow::anyhow!("general.model is required"));
        }
        let base_url = self.llm.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "llm.base_url must start with http:// or https://"
            ));
        }
        if self.llm.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("llm.timeout_seconds must be > 0"));
        }
        if self.server.http_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("server.http_timeout_seconds must be > 0"));
        }
        if self.server.http_max_in_flight == 0 {
            return Err(anyhow::anyhow!("server.http_max_in_flight must be > 0"));
        }
        if self.database.path.trim().is_empty() {
            return Err(anyhow::anyhow!("database.path is required"));
        }
        self.bind_addr()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server.bind_addr.trim().parse().map_err(|e| {
            anyhow::anyhow!("invalid server.bind_addr {:?}: {e}", self.server.bind_addr)
        })
    }

    pub fn api_key(&self) -> Option<&str> {
        self.keys
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn api_key_status(&self) -> ApiKeyStatus {
        let Some(key) = self.api_key() else {
            return ApiKeyStatus {
                configured: false,
                length: 0,
                error: Some("CEREBRAS_API_KEY is not set".to_string()),
            };
        };
        let length = key.chars().count();
        let error = (length < MIN_API_KEY_LEN).then(|| {
            format!(
                "CEREBRAS_API_KEY looks too short ({length} characters, expected at least {MIN_API_KEY_LEN})"
            )
        });
        ApiKeyStatus {
            configured: true,
            length,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overridden(cfg: &mut InsightConfig, vars: &[(&str, &str)]) {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        cfg.apply_overrides(|name| vars.get(name).cloned());
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = InsightConfig::parse("").expect("parse empty config");
        assert_eq!(cfg.general.model, "llama-3.3-70b");
        assert!(cfg.general.system_prompt.contains("must NOT access database directly"));
        assert_eq!(cfg.llm.base_url, "https://api.cerebras.ai/v1");
        assert_eq!(cfg.database.path, "sales.db");
        assert!(cfg.server.cors_allow_any_origin);
        cfg.validate().expect("defaults validate");
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = InsightConfig::parse(
            r#"
[general]
model = "llama-3.1-8b"

[server]
bind_addr = "0.0.0.0:9000"
http_max_in_flight = 8

[integrations.github]
token = "ghp_x"
repo = "acme/support"
"#,
        )
        .expect("parse config");
        assert_eq!(cfg.general.model, "llama-3.1-8b");
        assert_eq!(cfg.bind_addr().expect("bind addr").port(), 9000);
        assert_eq!(cfg.server.http_timeout_seconds, 90);
        assert!(cfg.integrations.github.is_configured());
        assert!(!cfg.integrations.jira.is_configured());
    }

    #[test]
    fn env_overrides_win_and_blank_values_are_ignored() {
        let mut cfg = InsightConfig::default();
        overridden(
            &mut cfg,
            &[
                ("CEREBRAS_API_KEY", "  csk-0123456789abcdefghij  "),
                ("INSIGHT_AGENT_MODEL", " "),
                ("INSIGHT_AGENT_DB_PATH", "/var/lib/insight/sales.db"),
                ("TRELLO_API_KEY", "k"),
                ("TRELLO_TOKEN", "t"),
                ("TRELLO_LIST_ID", "l"),
            ],
        );
        assert_eq!(cfg.api_key(), Some("csk-0123456789abcdefghij"));
        assert_eq!(cfg.general.model, "llama-3.3-70b");
        assert_eq!(cfg.database.path, "/var/lib/insight/sales.db");
        assert!(cfg.integrations.trello.is_configured());
    }

    #[test]
    fn api_key_status_checks_presence_and_length() {
        let mut cfg = InsightConfig::default();
        let missing = cfg.api_key_status();
        assert!(!missing.configured);
        assert_eq!(missing.length, 0);
        assert!(!missing.is_valid());

        cfg.keys.api_key = Some("short".to_string());
        let short = cfg.api_key_status();
        assert!(short.configured);
        assert_eq!(short.length, 5);
        assert!(short.error.as_deref().is_some_and(|e| e.contains("too short")));

        cfg.keys.api_key = Some("x".repeat(MIN_API_KEY_LEN));
        assert!(cfg.api_key_status().is_valid());
    }

    #[test]
    fn validate_rejects_zero_timeouts_and_bad_bind_addr() {
        let mut cfg = InsightConfig::default();
        cfg.llm.timeout_seconds = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = InsightConfig::default();
        cfg.server.bind_addr = "localhost".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = InsightConfig::default();
        cfg.general.model = " ".to_string();
        assert!(cfg.validate().is_err());
    }

    #[tokio::test]
    async fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = InsightConfig::load_with_path(Some(dir.path().join("nope.toml")))
            .await
            .expect_err("explicit path must exist");
        assert!(err.to_string().contains("read config"));
    }
}
