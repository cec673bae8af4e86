use std::{collections::BTreeSet, time::Duration};

use hickory_resolver::{
    config::{ResolverConfig, ResolverOpts},
    system_conf::read_system_conf,
    TokioAsyncResolver,
};
use tracing::{debug, warn};

use crate::core::error::VerifyError;

/// NS-record lookups through the system resolver.
pub struct NsResolver {
    resolver: TokioAsyncResolver,
}

impl NsResolver {
    pub fn new(timeout: Duration) -> Self {
        let (config, mut opts) = read_system_conf().unwrap_or_else(|e| {
            warn!("system resolver config unavailable ({}), using defaults", e);
            (ResolverConfig::default(), ResolverOpts::default())
        });
        opts.timeout = timeout;
        opts.attempts = 1;
        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }

    pub async fn nameservers(&self, domain: &str) -> Result<BTreeSet<String>, VerifyError> {
        debug!("NS lookup {}", domain);
        let lookup = self
            .resolver
            .ns_lookup(domain)
            .await
            .map_err(|e| VerifyError::Dns(format!("{domain}: {e}")))?;
        Ok(lookup
            .iter()
            .map(|ns| canonical_ns(&ns.to_string()))
            .filter(|ns| !ns.is_empty())
            .collect())
    }
}

pub fn canonical_ns(raw: &str) -> String {
    raw.trim().trim_end_matches('.').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_ns_drops_root_dot_and_case() {
        assert_eq!(canonical_ns("NS1.Example.COM."), "ns1.example.com");
        assert_eq!(canonical_ns(" ns2.example.com "), "ns2.example.com");
    }
}
