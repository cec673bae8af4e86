use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    core::{
        error::VerifyError,
        hash::capture_id,
        time::{within, Deadline},
        types::{
            CertificateReport, LegitimacyVerdict, ReferenceSource, VerificationResult,
            VerificationStatus,
        },
    },
    oracle::{brand, openai::OpenAiOracle, parse_domain_reply, Oracle},
    pipeline::{
        allowlist::{fold_brand, AllowList},
        certificate::{CertificateInspector, TlsCertificateInspector},
        comparator::{compare, precheck, Comparison},
        ingress::StagedCapture,
        normalizer::{normalize, registrable_domain},
        resolver::{NetworkSignalSource, SignalSource},
        synthesizer::{synthesize, SynthesisInput, UNDETERMINED},
    },
};

/// The verification orchestrator. Shared read-only between concurrent
/// captures; each call owns its own intermediate state.
pub struct Engine {
    pub config: AppConfig,
    allowlist: Arc<AllowList>,
    signals: Arc<dyn SignalSource>,
    certificates: Arc<dyn CertificateInspector>,
    oracle: Arc<dyn Oracle>,
    semaphore: Arc<Semaphore>,
}

impl Engine {
    pub fn new(config: AppConfig, allowlist: AllowList) -> Result<Self, VerifyError> {
        let oracle = OpenAiOracle::new(&config.oracle, &config.user_agent)?;
        let signals = NetworkSignalSource::new(&config);
        let certificates = TlsCertificateInspector::new(config.tls_port, config.tls_timeout());
        Ok(Self::from_parts(
            config,
            Arc::new(allowlist),
            Arc::new(signals),
            Arc::new(certificates),
            Arc::new(oracle),
        ))
    }

    pub fn from_parts(
        config: AppConfig,
        allowlist: Arc<AllowList>,
        signals: Arc<dyn SignalSource>,
        certificates: Arc<dyn CertificateInspector>,
        oracle: Arc<dyn Oracle>,
    ) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_verifications.max(1))),
            config,
            allowlist,
            signals,
            certificates,
            oracle,
        }
    }

    pub async fn verify(&self, brand_claim: &str, url: &str, html: &str) -> VerificationResult {
        let deadline = Deadline::after(self.config.verify_deadline());
        self.verify_with_deadline(brand_claim, url, html, deadline)
            .await
    }

    pub async fn verify_with_deadline(
        &self,
        brand_claim: &str,
        url: &str,
        html: &str,
        deadline: Deadline,
    ) -> VerificationResult {
        let id = capture_id(url, html);
        let brand = brand_claim.trim();

        let suspect = normalize(url);
        if suspect.is_empty() {
            debug!("{}: no domain in url '{}'", id, url);
            return short_circuit(
                id,
                VerificationStatus::InsufficientInput,
                brand,
                "",
                false,
                format!("The capture URL '{}' yields no domain, so no verification was attempted.", url.trim()),
            );
        }
        let in_allowlist = self.allowlist.contains(&suspect)
            || self.allowlist.contains(&registrable_domain(&suspect));

        let Some((legit, source)) = self.reference_domain(brand, deadline).await else {
            debug!("{}: no reference domain for brand '{}'", id, brand);
            return short_circuit(
                id,
                VerificationStatus::NoReferenceDomain,
                brand,
                &suspect,
                in_allowlist,
                format!(
                    "No official domain could be determined for brand '{}', so {} was not compared against one.",
                    brand, suspect
                ),
            );
        };
        debug!("{}: reference domain {} via {:?}", id, legit, source);

        let (comparison, certificate) = tokio::join!(
            compare(&suspect, &legit, self.signals.as_ref(), deadline),
            self.certificates.inspect(&suspect, deadline)
        );

        let summary = signal_summary(&comparison);
        let synthesis = synthesize(
            self.oracle.as_ref(),
            &SynthesisInput {
                brand,
                verdict: &comparison.verdict,
                signal_summary: &summary,
                certificate: &certificate,
            },
            deadline,
            self.config.oracle.evidence_timeout(),
            self.config.oracle.confidence_timeout(),
        )
        .await;

        let result = VerificationResult {
            capture_id: id,
            status: VerificationStatus::Completed,
            brand: brand.to_string(),
            suspect_domain: suspect,
            legit_domain: legit,
            reference_source: Some(source),
            suspect_in_allowlist: in_allowlist,
            verdict: comparison.verdict,
            suspect_signals: comparison.suspect_signals,
            legit_signals: comparison.legit_signals,
            certificate,
            confidence: synthesis.confidence,
            explanation: synthesis.explanation,
        };
        info!(
            "{} {} vs {}: phishing={} ({})",
            result.capture_id,
            result.suspect_domain,
            result.legit_domain,
            result.is_phishing(),
            result.verdict.rationale
        );
        result
    }

    /// Allow-list first, then the brand-to-domain oracle.
    async fn reference_domain(
        &self,
        brand: &str,
        deadline: Deadline,
    ) -> Option<(String, ReferenceSource)> {
        if let Some(domain) = self.allowlist.lookup_by_brand(brand) {
            let domain = normalize(&domain);
            if !domain.is_empty() {
                return Some((domain, ReferenceSource::AllowList));
            }
        }
        if fold_brand(brand).is_empty() {
            return None;
        }
        match within(
            deadline,
            self.config.oracle.domain_timeout(),
            self.oracle.legit_domain(brand),
        )
        .await
        {
            Ok(reply) => parse_domain_reply(&reply).map(|d| (d, ReferenceSource::Oracle)),
            Err(err) => {
                warn!("domain oracle failed for '{}': {}", brand, err);
                None
            }
        }
    }

    /// Verify a staged capture, asking the oracle for the brand when the
    /// capture carries no claim.
    pub async fn analyze(&self, staged: &StagedCapture) -> VerificationResult {
        let deadline = Deadline::after(self.config.verify_deadline());
        let capture = &staged.capture;

        if !capture.brand_claim.trim().is_empty() || normalize(&capture.url).is_empty() {
            return self
                .verify_with_deadline(&capture.brand_claim, &capture.url, &capture.html_snippet, deadline)
                .await;
        }

        let reply = if staged.screenshot_oversized {
            Err(VerifyError::Http("payload size exceeds the limit".into()))
        } else {
            within(
                deadline,
                self.config.oracle.brand_timeout(),
                self.oracle
                    .identify_brand(capture.screenshot.as_deref(), &capture.html_snippet),
            )
            .await
        };

        match brand::interpret(reply) {
            Ok(identified) => {
                debug!("identified brand '{}' for {}", identified.brand, capture.url);
                self.verify_with_deadline(&identified.brand, &capture.url, &capture.html_snippet, deadline)
                    .await
            }
            Err(sentinel) => {
                let suspect = normalize(&capture.url);
                warn!("brand identification failed for {}: {}", suspect, sentinel);
                let mut explanation = format!(
                    "The brand shown on the page could not be identified ({}), so {} was not verified.",
                    sentinel, suspect
                );
                if let Some(detail) = sentinel.detail() {
                    explanation.push_str(&format!(" Cause: {detail}."));
                }
                if let Some(err) = &staged.screenshot_error {
                    explanation.push_str(&format!(" Screenshot: {err}."));
                }
                let in_allowlist = self.allowlist.contains(&suspect);
                short_circuit(
                    capture_id(&capture.url, &capture.html_snippet),
                    VerificationStatus::BrandUnidentified,
                    &sentinel.to_string(),
                    &suspect,
                    in_allowlist,
                    explanation,
                )
            }
        }
    }

    /// Verify many captures on the worker pool; results keep input order.
    pub async fn verify_batch(self: &Arc<Self>, captures: Vec<StagedCapture>) -> Vec<VerificationResult> {
        let mut handles = Vec::with_capacity(captures.len());
        for staged in captures {
            let fallback = (
                capture_id(&staged.capture.url, &staged.capture.html_snippet),
                staged.capture.brand_claim.clone(),
                normalize(&staged.capture.url),
            );
            let engine = Arc::clone(self);
            let semaphore = Arc::clone(&self.semaphore);
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                engine.analyze(&staged).await
            });
            handles.push((fallback, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for ((id, brand, suspect), handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(err) => {
                    warn!("verification task for {} failed: {}", id, err);
                    let in_allowlist = self.allowlist.contains(&suspect);
                    results.push(short_circuit(
                        id,
                        VerificationStatus::InsufficientInput,
                        &brand,
                        &suspect,
                        in_allowlist,
                        format!("Verification of {suspect} aborted: {err}"),
                    ));
                }
            }
        }
        info!(
            "batch finished: {} captures, {} flagged",
            results.len(),
            results.iter().filter(|r| r.is_phishing()).count()
        );
        results
    }
}

fn short_circuit(
    capture_id: String,
    status: VerificationStatus,
    brand: &str,
    suspect: &str,
    suspect_in_allowlist: bool,
    explanation: String,
) -> VerificationResult {
    let verdict = precheck(suspect, "").unwrap_or_else(|| LegitimacyVerdict {
        matched: false,
        rationale: "missing domain(s)".into(),
        suspect_domain: suspect.to_string(),
        legit_domain: String::new(),
    });
    VerificationResult {
        capture_id,
        status,
        brand: brand.to_string(),
        suspect_domain: suspect.to_string(),
        legit_domain: String::new(),
        reference_source: None,
        suspect_in_allowlist,
        verdict,
        suspect_signals: None,
        legit_signals: None,
        certificate: CertificateReport::failed("not inspected: verification ended early"),
        confidence: UNDETERMINED,
        explanation,
    }
}

fn signal_summary(comparison: &Comparison) -> String {
    let v = &comparison.verdict;
    match (&comparison.suspect_signals, &comparison.legit_signals) {
        (Some(s), Some(l)) => format!(
            "suspect {}: {}; reference {}: {}",
            v.suspect_domain,
            s.summary(),
            v.legit_domain,
            l.summary()
        ),
        _ => "registrar and nameserver lookups not needed".to_string(),
    }
}
