use std::net::IpAddr;

use once_cell::sync::Lazy;
use publicsuffix::{List, Psl};
use url::Url;

const DEFAULT_SCHEME: &str = "http://";

/// Public Suffix List snapshot, ICANN and private sections.
static SUFFIXES: Lazy<List> = Lazy::new(|| {
    include_str!("../../data/public_suffix_list.dat")
        .parse()
        .expect("bundled public suffix list")
});

/// Canonical hostname for a URL or bare domain. Pure; empty in, empty out.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("{DEFAULT_SCHEME}{trimmed}")
    };

    let host = match Url::parse(&with_scheme) {
        Ok(parsed) => match parsed.host_str() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => authority_of(&with_scheme),
        },
        Err(_) => authority_of(&with_scheme),
    };

    clean_host(&host)
}

/// Fallback when the URL parser rejects the input: take the text between
/// the scheme separator and the first path/query delimiter.
fn authority_of(with_scheme: &str) -> String {
    let rest = with_scheme
        .split_once("://")
        .map(|(_, r)| r)
        .unwrap_or(with_scheme);
    rest.split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .to_string()
}

fn clean_host(host: &str) -> String {
    let without_user = host.rsplit('@').next().unwrap_or(host);
    let without_port = if without_user.starts_with('[') {
        without_user
    } else {
        without_user.split(':').next().unwrap_or(without_user)
    };
    let mut host = without_port.trim().trim_end_matches('.').to_lowercase();
    // repeated so that normalize(normalize(x)) == normalize(x)
    while let Some(stripped) = host.strip_prefix("www.") {
        host = stripped.to_string();
    }
    host
}

/// Domain with subdomain labels removed, used as the WHOIS query unit.
/// A host that is itself a public suffix (`github.io`), or an IP literal, is
/// returned unchanged.
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_lowercase();
    if host.is_empty() || host.starts_with('[') || host.parse::<IpAddr>().is_ok() {
        return host;
    }
    match SUFFIXES.domain(host.as_bytes()) {
        Some(domain) => String::from_utf8_lossy(domain.as_bytes()).into_owned(),
        None => host,
    }
}

/// First label of the registrable domain (`paypal` for `www.paypal.co.uk`).
pub fn brand_label(domain: &str) -> String {
    registrable_domain(domain)
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}
