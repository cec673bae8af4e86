use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::core::error::VerifyError;

const PAYLOAD_LIMIT_MARKER: &str = "payload size exceeds the limit";

/// Why brand identification produced no usable brand. The display strings
/// are the sentinels recorded in place of a brand.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrandIdError {
    #[error("Error Occurred")]
    CallFailed(String),
    #[error("Safety Reasons")]
    SafetyBlocked,
    #[error("Payload exceeds limit")]
    PayloadTooLarge,
    #[error("Indeterminate")]
    Indeterminate,
}

impl BrandIdError {
    pub fn detail(&self) -> Option<&str> {
        match self {
            BrandIdError::CallFailed(detail) => Some(detail),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BrandIdentification {
    pub brand: String,
    pub has_credentials: Option<String>,
    pub has_call_to_action: Option<String>,
    pub credential_fields: Option<String>,
    pub call_to_actions: Option<String>,
    pub confidence: Option<String>,
    pub supporting_evidence: Option<String>,
}

static BRAND_RE: Lazy<Regex> = Lazy::new(|| field("Brand"));
static CREDENTIALS_RE: Lazy<Regex> = Lazy::new(|| field("Has_Credentials"));
static CTA_RE: Lazy<Regex> = Lazy::new(|| field("Has_Call_To_Action"));
static CREDENTIAL_LIST_RE: Lazy<Regex> = Lazy::new(|| field("List_of_credentials"));
static CTA_LIST_RE: Lazy<Regex> = Lazy::new(|| field("List_of_call_to_action"));
static CONFIDENCE_RE: Lazy<Regex> = Lazy::new(|| field("Confidence_Score"));
static EVIDENCE_RE: Lazy<Regex> = Lazy::new(|| field("Supporting_Evidence"));

fn field(name: &str) -> Regex {
    Regex::new(&format!(r"(?m){name}:[ \t]*(.+)")).expect("static field pattern")
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Map the outcome of an identification call onto a brand or a sentinel.
pub fn interpret(reply: Result<String, VerifyError>) -> Result<BrandIdentification, BrandIdError> {
    let text = match reply {
        Ok(text) => text,
        Err(VerifyError::Blocked(_)) => return Err(BrandIdError::SafetyBlocked),
        Err(err) => {
            let detail = err.to_string();
            if detail.to_lowercase().contains(PAYLOAD_LIMIT_MARKER) {
                return Err(BrandIdError::PayloadTooLarge);
            }
            return Err(BrandIdError::CallFailed(detail));
        }
    };

    if text.to_lowercase().contains(PAYLOAD_LIMIT_MARKER) {
        return Err(BrandIdError::PayloadTooLarge);
    }
    if text.trim().is_empty() {
        return Err(BrandIdError::Indeterminate);
    }

    let brand = capture(&BRAND_RE, &text).ok_or(BrandIdError::Indeterminate)?;
    Ok(BrandIdentification {
        brand,
        has_credentials: capture(&CREDENTIALS_RE, &text),
        has_call_to_action: capture(&CTA_RE, &text),
        credential_fields: capture(&CREDENTIAL_LIST_RE, &text),
        call_to_actions: capture(&CTA_LIST_RE, &text),
        confidence: capture(&CONFIDENCE_RE, &text),
        supporting_evidence: capture(&EVIDENCE_RE, &text),
    })
}
