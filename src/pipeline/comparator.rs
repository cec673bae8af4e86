//! Legitimacy comparison between a suspect domain and the brand's reference
//! domain. The rules are evaluated in a fixed order and the first that
//! applies decides:
//!
//! 1. either domain empty: not matched
//! 2. equal, or suspect is a subdomain of the reference: matched
//! 3. both registrars known: matched iff equal (case-insensitive)
//! 4. both nameserver sets non-empty: matched iff they intersect
//! 5. otherwise: not matched

use std::collections::BTreeSet;

use tracing::debug;

use crate::core::{
    time::Deadline,
    types::{DomainSignals, LegitimacyVerdict},
};
use crate::pipeline::resolver::SignalSource;

#[derive(Debug, Clone)]
pub struct Comparison {
    pub verdict: LegitimacyVerdict,
    pub suspect_signals: Option<DomainSignals>,
    pub legit_signals: Option<DomainSignals>,
}

/// Rules 1 and 2, which need no network evidence.
pub fn precheck(suspect: &str, legit: &str) -> Option<LegitimacyVerdict> {
    if suspect.is_empty() || legit.is_empty() {
        return Some(verdict(suspect, legit, false, "missing domain(s)".into()));
    }
    if is_same_or_subdomain(suspect, legit) {
        return Some(verdict(suspect, legit, true, "same domain or subdomain".into()));
    }
    None
}

pub fn is_same_or_subdomain(suspect: &str, legit: &str) -> bool {
    suspect == legit
        || suspect
            .strip_suffix(legit)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Rules 3 to 5.
pub fn decide(
    suspect: &str,
    legit: &str,
    suspect_signals: &DomainSignals,
    legit_signals: &DomainSignals,
) -> LegitimacyVerdict {
    if let (Some(s), Some(l)) = (
        known_registrar(suspect_signals),
        known_registrar(legit_signals),
    ) {
        return if s.eq_ignore_ascii_case(l) {
            verdict(suspect, legit, true, format!("registrar match: {s}"))
        } else {
            verdict(suspect, legit, false, format!("registrar mismatch: {s} vs {l}"))
        };
    }

    if !suspect_signals.nameservers.is_empty() && !legit_signals.nameservers.is_empty() {
        let overlap: BTreeSet<&String> = suspect_signals
            .nameservers
            .intersection(&legit_signals.nameservers)
            .collect();
        return if overlap.is_empty() {
            verdict(suspect, legit, false, "nameserver mismatch".into())
        } else {
            let shared: Vec<&str> = overlap.into_iter().map(String::as_str).collect();
            verdict(
                suspect,
                legit,
                true,
                format!("nameserver overlap: [{}]", shared.join(", ")),
            )
        };
    }

    verdict(suspect, legit, false, "insufficient DNS/WHOIS signals".into())
}

/// Full comparison. Signals are only gathered when rules 1 and 2 do not
/// already decide, and both domains are resolved concurrently.
pub async fn compare(
    suspect: &str,
    legit: &str,
    source: &dyn SignalSource,
    deadline: Deadline,
) -> Comparison {
    if let Some(verdict) = precheck(suspect, legit) {
        debug!("{} vs {}: {}", suspect, legit, verdict.rationale);
        return Comparison {
            verdict,
            suspect_signals: None,
            legit_signals: None,
        };
    }

    let (suspect_signals, legit_signals) = tokio::join!(
        source.resolve(suspect, deadline),
        source.resolve(legit, deadline)
    );
    let verdict = decide(suspect, legit, &suspect_signals, &legit_signals);
    debug!("{} vs {}: {}", suspect, legit, verdict.rationale);
    Comparison {
        verdict,
        suspect_signals: Some(suspect_signals),
        legit_signals: Some(legit_signals),
    }
}

fn known_registrar(signals: &DomainSignals) -> Option<&str> {
    signals
        .registrar
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
}

fn verdict(suspect: &str, legit: &str, matched: bool, rationale: String) -> LegitimacyVerdict {
    LegitimacyVerdict {
        matched,
        rationale,
        suspect_domain: suspect.to_string(),
        legit_domain: legit.to_string(),
    }
}
