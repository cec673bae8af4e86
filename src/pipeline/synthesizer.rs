use std::time::Duration;

use tracing::{debug, warn};

use crate::core::{
    time::{within, Deadline},
    types::{CertificateReport, LegitimacyVerdict},
};
use crate::oracle::Oracle;

/// Confidence recorded when the oracle gives no usable number.
pub const UNDETERMINED: f64 = -1.0;

pub const EVIDENCE_FALLBACK: &str =
    "Supporting evidence could not be generated due to an API error.";

pub struct SynthesisInput<'a> {
    pub brand: &'a str,
    pub verdict: &'a LegitimacyVerdict,
    pub signal_summary: &'a str,
    pub certificate: &'a CertificateReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub explanation: String,
    pub confidence: f64,
}

pub fn evidence_prompt(input: &SynthesisInput<'_>) -> String {
    let v = input.verdict;
    format!(
        "You are a phishing analyst. Write about 100 words of supporting evidence for the following domain verification.\n\
         Brand: {}\n\
         Visited domain: {}\n\
         Official domain: {}\n\
         Domains affiliated: {}\n\
         Comparison: {}\n\
         Signals: {}\n\
         Certificate: {}",
        input.brand,
        v.suspect_domain,
        v.legit_domain,
        v.matched,
        v.rationale,
        input.signal_summary,
        input.certificate.comment(),
    )
}

pub fn confidence_prompt(evidence: &str) -> String {
    format!(
        "Here is your answer:\n\n{evidence}\n\nQuestion: How confident are you in this answer on a scale of 0.00 to 10.00 (in 2 decimal places)? Reply with only a number (0.00-10.00)."
    )
}

/// First token as a finite number, clamped to [0, 10] and rounded to two
/// decimals. Anything else is [`UNDETERMINED`].
pub fn parse_confidence(reply: &str) -> f64 {
    let Some(token) = reply.split_whitespace().next() else {
        return UNDETERMINED;
    };
    let token = token.trim_end_matches(|c: char| !c.is_ascii_digit());
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => (value.clamp(0.0, 10.0) * 100.0).round() / 100.0,
        _ => UNDETERMINED,
    }
}

/// Oracle prose followed by lines the pipeline always appends itself.
pub fn compose_explanation(oracle_text: Option<&str>, input: &SynthesisInput<'_>) -> String {
    let v = input.verdict;
    let prose = oracle_text
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(EVIDENCE_FALLBACK);
    format!(
        "{prose}\n\nVerification: {} vs {}: {} (affiliated: {})\nCertificate: {}",
        v.suspect_domain,
        v.legit_domain,
        v.rationale,
        v.matched,
        input.certificate.comment(),
    )
}

pub async fn synthesize(
    oracle: &dyn Oracle,
    input: &SynthesisInput<'_>,
    deadline: Deadline,
    evidence_timeout: Duration,
    confidence_timeout: Duration,
) -> Synthesis {
    let prompt = evidence_prompt(input);
    let prose = match within(deadline, evidence_timeout, oracle.explain(&prompt)).await {
        Ok(text) => Some(text),
        Err(err) => {
            warn!("evidence oracle failed: {}", err);
            None
        }
    };
    let explanation = compose_explanation(prose.as_deref(), input);

    let confidence = match within(
        deadline,
        confidence_timeout,
        oracle.rate_confidence(&confidence_prompt(&explanation)),
    )
    .await
    {
        Ok(reply) => parse_confidence(&reply),
        Err(err) => {
            warn!("confidence oracle failed: {}", err);
            UNDETERMINED
        }
    };
    debug!("synthesized confidence {}", confidence);

    Synthesis {
        explanation,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict() -> LegitimacyVerdict {
        LegitimacyVerdict {
            matched: false,
            rationale: "registrar mismatch: regru-ru vs markmonitor inc.".into(),
            suspect_domain: "examplebank-login.secure-verify.ru".into(),
            legit_domain: "examplebank.com".into(),
        }
    }

    #[test]
    fn confidence_is_clamped_or_sentinel() {
        assert_eq!(parse_confidence("15.50"), 10.0);
        assert_eq!(parse_confidence("abc"), UNDETERMINED);
        assert_eq!(parse_confidence(""), UNDETERMINED);
        assert_eq!(parse_confidence("-3"), 0.0);
        assert_eq!(parse_confidence("8.756 out of 10"), 8.76);
        assert_eq!(parse_confidence("7.5."), 7.5);
        assert_eq!(parse_confidence("NaN"), UNDETERMINED);
        assert_eq!(parse_confidence("inf"), UNDETERMINED);
    }

    #[test]
    fn explanation_always_carries_domains_and_certificate() {
        let v = verdict();
        let cert = CertificateReport::failed("handshake failed");
        let input = SynthesisInput {
            brand: "examplebank",
            verdict: &v,
            signal_summary: "",
            certificate: &cert,
        };
        let text = compose_explanation(Some("The page imitates ExampleBank."), &input);
        assert!(text.starts_with("The page imitates ExampleBank."));
        assert!(text.contains("examplebank-login.secure-verify.ru"));
        assert!(text.contains("examplebank.com"));
        assert!(text.contains("registrar mismatch"));
        assert!(text.contains("handshake failed"));

        let fallback = compose_explanation(Some("   "), &input);
        assert!(fallback.starts_with(EVIDENCE_FALLBACK));
    }

    #[test]
    fn evidence_prompt_is_deterministic() {
        let v = verdict();
        let cert = CertificateReport::failed("x");
        let input = SynthesisInput {
            brand: "examplebank",
            verdict: &v,
            signal_summary: "suspect: registrar=regru-ru",
            certificate: &cert,
        };
        assert_eq!(evidence_prompt(&input), evidence_prompt(&input));
        assert!(evidence_prompt(&input).contains("Domains affiliated: false"));
    }
}
