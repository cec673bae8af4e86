use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registrar and nameserver evidence gathered for one domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DomainSignals {
    pub registrar: Option<String>,
    pub nameservers: BTreeSet<String>,
    /// Lookup failures behind any absent field.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl DomainSignals {
    pub fn has_registrar(&self) -> bool {
        self.registrar.as_deref().is_some_and(|r| !r.is_empty())
    }

    pub fn summary(&self) -> String {
        let registrar = self.registrar.as_deref().unwrap_or("unknown");
        let ns = if self.nameservers.is_empty() {
            "none".to_string()
        } else {
            self.nameservers.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        let mut out = format!("registrar={registrar}; nameservers={ns}");
        if !self.errors.is_empty() {
            out.push_str(&format!("; lookup errors: {}", self.errors.join(" | ")));
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegitimacyVerdict {
    pub matched: bool,
    pub rationale: String,
    pub suspect_domain: String,
    pub legit_domain: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CertificateReport {
    pub valid: bool,
    pub issuer: Option<String>,
    pub common_name: Option<String>,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub age_days: Option<i64>,
    pub valid_now: Option<bool>,
    pub error: Option<String>,
}

impl CertificateReport {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// One-line certificate comment carried into explanations.
    pub fn comment(&self) -> String {
        if !self.valid {
            return format!(
                "TLS certificate unavailable: {}",
                self.error.as_deref().unwrap_or("unknown error")
            );
        }
        let mut parts = vec![format!(
            "TLS certificate issued by {}",
            self.issuer.as_deref().unwrap_or("unknown issuer")
        )];
        if let Some(cn) = &self.common_name {
            parts.push(format!("for {cn}"));
        }
        if let Some(age) = self.age_days {
            parts.push(format!("age {age} days"));
        }
        if let Some(not_after) = &self.not_after {
            parts.push(format!("expires {}", not_after.format("%Y-%m-%d")));
        }
        match self.valid_now {
            Some(true) => parts.push("currently valid".to_string()),
            Some(false) => parts.push("outside its validity window".to_string()),
            None => {}
        }
        parts.join(", ")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Completed,
    InsufficientInput,
    NoReferenceDomain,
    BrandUnidentified,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSource {
    AllowList,
    Oracle,
}

/// Outcome of one capture; built once and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationResult {
    pub capture_id: String,
    pub status: VerificationStatus,
    pub brand: String,
    pub suspect_domain: String,
    pub legit_domain: String,
    pub reference_source: Option<ReferenceSource>,
    pub suspect_in_allowlist: bool,
    pub verdict: LegitimacyVerdict,
    pub suspect_signals: Option<DomainSignals>,
    pub legit_signals: Option<DomainSignals>,
    pub certificate: CertificateReport,
    /// 0.00-10.00, or -1.0 when undetermined.
    pub confidence: f64,
    pub explanation: String,
}

impl VerificationResult {
    pub fn is_phishing(&self) -> bool {
        !self.verdict.matched
    }

    pub fn to_record(&self) -> VerdictRecord {
        VerdictRecord {
            is_phishing: self.is_phishing(),
            confidence_score: self.confidence,
            explanation: self.explanation.clone(),
            ssl_details: self.certificate.clone(),
        }
    }
}

/// Caller-facing result; field names are a stable contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerdictRecord {
    pub is_phishing: bool,
    pub confidence_score: f64,
    pub explanation: String,
    pub ssl_details: CertificateReport,
}

/// A staged page capture. Owned by the caller; the pipeline only reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capture {
    #[serde(default)]
    pub brand_claim: String,
    pub url: String,
    #[serde(default)]
    pub html_snippet: String,
    #[serde(skip)]
    pub screenshot: Option<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_certificate_keeps_only_error() {
        let report = CertificateReport::failed("handshake failed");
        assert!(!report.valid);
        assert_eq!(report.error.as_deref(), Some("handshake failed"));
        assert!(report.issuer.is_none());
        assert!(report.age_days.is_none());
        assert!(report.comment().contains("handshake failed"));
    }

    #[test]
    fn egress_record_uses_stable_field_names() {
        let record = VerdictRecord {
            is_phishing: true,
            confidence_score: 7.5,
            explanation: "x".into(),
            ssl_details: CertificateReport::failed("e"),
        };
        let json = serde_json::to_value(&record).unwrap();
        for key in ["is_phishing", "confidence_score", "explanation", "ssl_details"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
