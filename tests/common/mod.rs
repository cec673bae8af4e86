#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use falcon_verify::config::default_config;
use falcon_verify::core::engine::Engine;
use falcon_verify::core::error::VerifyError;
use falcon_verify::core::time::{within, Deadline};
use falcon_verify::core::types::{CertificateReport, DomainSignals};
use falcon_verify::oracle::Oracle;
use falcon_verify::pipeline::allowlist::AllowList;
use falcon_verify::pipeline::certificate::CertificateInspector;
use falcon_verify::pipeline::resolver::SignalSource;

pub fn signals(registrar: Option<&str>, ns: &[&str]) -> DomainSignals {
    DomainSignals {
        registrar: registrar.map(str::to_string),
        nameservers: ns.iter().map(|s| s.to_string()).collect(),
        errors: Vec::new(),
    }
}

/// Canned signals per domain; unknown domains resolve to nothing.
#[derive(Default)]
pub struct FixedSignals {
    by_domain: HashMap<String, DomainSignals>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl FixedSignals {
    pub fn with(mut self, domain: &str, signals: DomainSignals) -> Self {
        self.by_domain.insert(domain.to_string(), signals);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalSource for FixedSignals {
    async fn resolve(&self, domain: &str, deadline: Deadline) -> DomainSignals {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let canned = self.by_domain.get(domain).cloned().unwrap_or_default();
        let delay = self.delay.unwrap_or_default();
        let lookup = async {
            tokio::time::sleep(delay).await;
            Ok::<_, VerifyError>(canned)
        };
        match within(deadline, Duration::from_secs(5), lookup).await {
            Ok(found) => found,
            Err(err) => DomainSignals {
                errors: vec![format!("whois: {err}")],
                ..DomainSignals::default()
            },
        }
    }
}

pub struct StubCertificates(pub CertificateReport);

#[async_trait]
impl CertificateInspector for StubCertificates {
    async fn inspect(&self, _domain: &str, _deadline: Deadline) -> CertificateReport {
        self.0.clone()
    }
}

/// Replies are fixed; `None` means the call fails with a transport error.
#[derive(Default)]
pub struct StubOracle {
    pub brand: Option<String>,
    pub domain: Option<String>,
    pub explanation: Option<String>,
    pub confidence: Option<String>,
    pub brand_calls: AtomicUsize,
    pub domain_calls: AtomicUsize,
}

fn reply(value: &Option<String>) -> Result<String, VerifyError> {
    value
        .clone()
        .ok_or_else(|| VerifyError::Network("connection refused".into()))
}

#[async_trait]
impl Oracle for StubOracle {
    async fn identify_brand(
        &self,
        _screenshot: Option<&[u8]>,
        _html: &str,
    ) -> Result<String, VerifyError> {
        self.brand_calls.fetch_add(1, Ordering::SeqCst);
        reply(&self.brand)
    }

    async fn legit_domain(&self, _brand: &str) -> Result<String, VerifyError> {
        self.domain_calls.fetch_add(1, Ordering::SeqCst);
        reply(&self.domain)
    }

    async fn explain(&self, _prompt: &str) -> Result<String, VerifyError> {
        reply(&self.explanation)
    }

    async fn rate_confidence(&self, _prompt: &str) -> Result<String, VerifyError> {
        reply(&self.confidence)
    }
}

pub fn engine(
    allowlist: &[&str],
    signals: Arc<FixedSignals>,
    certificate: CertificateReport,
    oracle: Arc<StubOracle>,
) -> Engine {
    Engine::from_parts(
        default_config(),
        Arc::new(AllowList::from_domains(allowlist.iter().copied())),
        signals,
        Arc::new(StubCertificates(certificate)),
        oracle,
    )
}
