use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::OracleConfig;
use crate::core::error::VerifyError;
use crate::oracle::Oracle;

const BRAND_SYSTEM_PROMPT: &str = "You are a phishing analyst. Identify the brand the web page presents itself as, using the screenshot and/or HTML provided. Answer using exactly these lines:\nBrand: <brand name>\nHas_Credentials: <Yes|No>\nHas_Call_To_Action: <Yes|No>\nList_of_credentials: <comma separated fields>\nList_of_call_to_action: <comma separated actions>\nConfidence_Score: <0.00-10.00>\nSupporting_Evidence: <one sentence>";

const BRAND_MAX_TOKENS: u32 = 400;
const DOMAIN_MAX_TOKENS: u32 = 20;
const CONFIDENCE_MAX_TOKENS: u32 = 10;
const EVIDENCE_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client. One retry when the connection fails; timeouts are final.
pub struct OpenAiOracle {
    client: Client,
    config: OracleConfig,
    api_key: Option<String>,
}

impl OpenAiOracle {
    /// The key is read from the environment variable named in the config;
    /// without one every call fails fast with an oracle error.
    pub fn new(config: &OracleConfig, user_agent: &str) -> Result<Self, VerifyError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(VerifyError::from)?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!("{} is not set; oracle calls will fail", config.api_key_env);
        }
        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    async fn chat(
        &self,
        messages: Value,
        max_tokens: u32,
        temperature: f32,
        timeout_ms: u64,
    ) -> Result<String, VerifyError> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            VerifyError::Oracle(format!("missing API key ({})", self.config.api_key_env))
        })?;
        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature,
        });
        let timeout = Duration::from_millis(timeout_ms);

        let mut attempt = 0u8;
        loop {
            attempt += 1;
            match self.send(key, &body, timeout).await {
                Err(err) if err.is_transient() && attempt < 2 => {
                    warn!("oracle call failed ({}), retrying once", err);
                }
                other => return other,
            }
        }
    }

    async fn send(&self, key: &str, body: &Value, timeout: Duration) -> Result<String, VerifyError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(url)
            .bearer_auth(key)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            return Err(VerifyError::Http(format!(
                "{status}: payload size exceeds the limit"
            )));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            return Err(VerifyError::Http(format!("{status}: {snippet}")));
        }

        let parsed: ChatResponse = resp.json().await?;
        let Some(choice) = parsed.choices.into_iter().next() else {
            return Ok(String::new());
        };
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(VerifyError::Blocked("content_filter".into()));
        }
        let content = choice.message.content.unwrap_or_default();
        debug!("oracle reply: {} chars", content.len());
        Ok(content.trim().to_string())
    }
}

fn user_text(text: &str) -> Value {
    json!([{ "role": "user", "content": text }])
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn identify_brand(
        &self,
        screenshot: Option<&[u8]>,
        html: &str,
    ) -> Result<String, VerifyError> {
        let mut content = Vec::new();
        if let Some(bytes) = screenshot {
            content.push(json!({
                "type": "image_url",
                "image_url": { "url": format!("data:image/png;base64,{}", STANDARD.encode(bytes)) }
            }));
        }
        if !html.is_empty() {
            content.push(json!({
                "type": "text",
                "text": format!("Here is the html information: {html}")
            }));
        }
        if content.is_empty() {
            return Ok(String::new());
        }
        let messages = json!([
            { "role": "system", "content": BRAND_SYSTEM_PROMPT },
            { "role": "user", "content": content }
        ]);
        self.chat(messages, BRAND_MAX_TOKENS, 0.0, self.config.brand_timeout_ms)
            .await
    }

    async fn legit_domain(&self, brand: &str) -> Result<String, VerifyError> {
        let prompt = format!(
            "What is the official website domain of the brand '{brand}'? Reply with only the domain name (e.g. example.com)."
        );
        self.chat(
            user_text(&prompt),
            DOMAIN_MAX_TOKENS,
            0.0,
            self.config.domain_timeout_ms,
        )
        .await
        .map(|reply| reply.to_lowercase())
    }

    async fn explain(&self, prompt: &str) -> Result<String, VerifyError> {
        self.chat(
            user_text(prompt),
            self.config.evidence_max_tokens,
            EVIDENCE_TEMPERATURE,
            self.config.evidence_timeout_ms,
        )
        .await
    }

    async fn rate_confidence(&self, prompt: &str) -> Result<String, VerifyError> {
        self.chat(
            user_text(prompt),
            CONFIDENCE_MAX_TOKENS,
            0.0,
            self.config.confidence_timeout_ms,
        )
        .await
    }
}
