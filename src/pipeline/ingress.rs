use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AppConfig;
use crate::core::types::Capture;

pub const TRIM_MARKER: &str = "...[TRIMMED]";

/// Capture payload as posted by the browser agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub url: String,
    #[serde(default)]
    pub html: String,
    /// Base64 or `data:` URL.
    #[serde(default)]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StagedCapture {
    pub capture: Capture,
    pub screenshot_oversized: bool,
    pub screenshot_error: Option<String>,
}

impl StagedCapture {
    pub fn from_claim(brand: &str, url: &str, html: &str) -> Self {
        Self {
            capture: Capture {
                brand_claim: brand.to_string(),
                url: url.to_string(),
                html_snippet: html.to_string(),
                screenshot: None,
            },
            ..Self::default()
        }
    }
}

pub fn stage(request: CaptureRequest, config: &AppConfig) -> StagedCapture {
    let html = truncate_html(&request.html, config.max_html_chars);

    let mut staged = StagedCapture {
        capture: Capture {
            brand_claim: request.brand.unwrap_or_default().trim().to_string(),
            url: request.url.trim().to_string(),
            html_snippet: html,
            screenshot: None,
        },
        ..StagedCapture::default()
    };

    if let Some(encoded) = request.screenshot.as_deref().filter(|s| !s.trim().is_empty()) {
        match decode_screenshot(encoded) {
            Ok(bytes) if bytes.len() > config.max_screenshot_bytes => {
                warn!(
                    "screenshot of {} bytes exceeds limit of {}",
                    bytes.len(),
                    config.max_screenshot_bytes
                );
                staged.screenshot_oversized = true;
            }
            Ok(bytes) => staged.capture.screenshot = Some(bytes),
            Err(err) => {
                warn!("screenshot not decodable: {}", err);
                staged.screenshot_error = Some(err);
            }
        }
    }
    staged
}

/// Cut to `max_chars` characters and append the marker when anything was cut.
pub fn truncate_html(html: &str, max_chars: usize) -> String {
    match html.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &html[..cut], TRIM_MARKER),
        None => html.to_string(),
    }
}

pub fn decode_screenshot(encoded: &str) -> Result<Vec<u8>, String> {
    let payload = match encoded.split_once(',') {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| format!("invalid base64 screenshot: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;

    #[test]
    fn long_html_is_truncated_with_marker() {
        let html = "é".repeat(20);
        let out = truncate_html(&html, 15);
        assert_eq!(out, format!("{}{}", "é".repeat(15), TRIM_MARKER));
        assert_eq!(truncate_html("short", 15), "short");
        assert_eq!(truncate_html(&"a".repeat(15), 15), "a".repeat(15));
    }

    #[test]
    fn data_url_and_plain_base64_decode() {
        assert_eq!(decode_screenshot("data:image/png;base64,aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_screenshot("aGVs\nbG8=").unwrap(), b"hello");
        assert!(decode_screenshot("***").is_err());
    }

    #[test]
    fn oversized_screenshot_is_flagged_not_kept() {
        let mut cfg = default_config();
        cfg.max_screenshot_bytes = 3;
        let staged = stage(
            CaptureRequest {
                url: " http://example.com ".into(),
                html: "<html></html>".into(),
                screenshot: Some("aGVsbG8=".into()),
                brand: None,
            },
            &cfg,
        );
        assert!(staged.screenshot_oversized);
        assert!(staged.capture.screenshot.is_none());
        assert_eq!(staged.capture.url, "http://example.com");
        assert_eq!(staged.capture.brand_claim, "");
    }
}
