use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::core::error::VerifyError;

pub const DEFAULT_CONFIG_PATH: &str = "config/falcon-verify.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_brand_timeout")]
    pub brand_timeout_ms: u64,
    #[serde(default = "default_domain_timeout")]
    pub domain_timeout_ms: u64,
    #[serde(default = "default_evidence_timeout")]
    pub evidence_timeout_ms: u64,
    #[serde(default = "default_confidence_timeout")]
    pub confidence_timeout_ms: u64,
    #[serde(default = "default_evidence_tokens")]
    pub evidence_max_tokens: u32,
}

impl OracleConfig {
    pub fn brand_timeout(&self) -> Duration {
        Duration::from_millis(self.brand_timeout_ms)
    }

    pub fn domain_timeout(&self) -> Duration {
        Duration::from_millis(self.domain_timeout_ms)
    }

    pub fn evidence_timeout(&self) -> Duration {
        Duration::from_millis(self.evidence_timeout_ms)
    }

    pub fn confidence_timeout(&self) -> Duration {
        Duration::from_millis(self.confidence_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_lookup_timeout")]
    pub whois_timeout_ms: u64,
    #[serde(default = "default_lookup_timeout")]
    pub dns_timeout_ms: u64,
    #[serde(default = "default_lookup_timeout")]
    pub tls_timeout_ms: u64,
    #[serde(default = "default_tls_port")]
    pub tls_port: u16,
    #[serde(default = "default_deadline")]
    pub verify_deadline_ms: u64,
    #[serde(default = "default_concurrency")]
    pub max_concurrent_verifications: usize,
    #[serde(default = "default_whois_interval")]
    pub whois_min_interval_ms: u64,
    #[serde(default = "default_allowlist_path")]
    pub allowlist_path: String,
    #[serde(default = "default_html_limit")]
    pub max_html_chars: usize,
    #[serde(default = "default_screenshot_limit")]
    pub max_screenshot_bytes: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_oracle")]
    pub oracle: OracleConfig,
}

impl AppConfig {
    pub fn whois_timeout(&self) -> Duration {
        Duration::from_millis(self.whois_timeout_ms)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    pub fn tls_timeout(&self) -> Duration {
        Duration::from_millis(self.tls_timeout_ms)
    }

    pub fn verify_deadline(&self) -> Duration {
        Duration::from_millis(self.verify_deadline_ms)
    }
}

pub fn load_config(path: Option<&str>) -> Result<AppConfig, VerifyError> {
    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    let path = path.map(Path::new).unwrap_or(default_path);

    if !path.exists() {
        return Ok(default_config());
    }

    let content = fs::read_to_string(path).map_err(|e| VerifyError::Config(e.to_string()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<AppConfig, VerifyError> {
    let cfg: AppConfig =
        toml::from_str(content).map_err(|e| VerifyError::Config(e.to_string()))?;
    validate(cfg)
}

fn validate(cfg: AppConfig) -> Result<AppConfig, VerifyError> {
    if cfg.max_concurrent_verifications == 0 {
        return Err(VerifyError::Config(
            "max_concurrent_verifications must be at least 1".into(),
        ));
    }
    if cfg.whois_timeout_ms == 0 || cfg.dns_timeout_ms == 0 || cfg.tls_timeout_ms == 0 {
        return Err(VerifyError::Config("lookup timeouts must be non-zero".into()));
    }
    Ok(cfg)
}

pub fn default_config() -> AppConfig {
    AppConfig {
        whois_timeout_ms: default_lookup_timeout(),
        dns_timeout_ms: default_lookup_timeout(),
        tls_timeout_ms: default_lookup_timeout(),
        tls_port: default_tls_port(),
        verify_deadline_ms: default_deadline(),
        max_concurrent_verifications: default_concurrency(),
        whois_min_interval_ms: default_whois_interval(),
        allowlist_path: default_allowlist_path(),
        max_html_chars: default_html_limit(),
        max_screenshot_bytes: default_screenshot_limit(),
        user_agent: default_user_agent(),
        oracle: default_oracle(),
    }
}

fn default_oracle() -> OracleConfig {
    OracleConfig {
        base_url: default_base_url(),
        model: default_model(),
        api_key_env: default_api_key_env(),
        brand_timeout_ms: default_brand_timeout(),
        domain_timeout_ms: default_domain_timeout(),
        evidence_timeout_ms: default_evidence_timeout(),
        confidence_timeout_ms: default_confidence_timeout(),
        evidence_max_tokens: default_evidence_tokens(),
    }
}

fn default_lookup_timeout() -> u64 {
    5_000
}

fn default_tls_port() -> u16 {
    443
}

fn default_deadline() -> u64 {
    30_000
}

fn default_concurrency() -> usize {
    4
}

fn default_whois_interval() -> u64 {
    500
}

fn default_allowlist_path() -> String {
    "data/top-1m.csv".to_string()
}

fn default_html_limit() -> usize {
    15_000
}

fn default_screenshot_limit() -> usize {
    5 * 1024 * 1024
}

fn default_user_agent() -> String {
    "falcon-verify/1.0".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_brand_timeout() -> u64 {
    30_000
}

fn default_domain_timeout() -> u64 {
    10_000
}

fn default_evidence_timeout() -> u64 {
    15_000
}

fn default_confidence_timeout() -> u64 {
    10_000
}

fn default_evidence_tokens() -> u32 {
    130
}
