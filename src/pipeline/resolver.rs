use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::core::{
    time::{within, Deadline},
    types::DomainSignals,
};
use crate::pipeline::normalizer::registrable_domain;
use crate::sources::{dns::NsResolver, whois::WhoisClient};

/// Source of registrar/nameserver evidence. Lookup failures never surface as
/// errors: they leave the field absent and are noted in `errors`.
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn resolve(&self, domain: &str, deadline: Deadline) -> DomainSignals;
}

pub struct NetworkSignalSource {
    whois: WhoisClient,
    dns: NsResolver,
    whois_timeout: Duration,
    dns_timeout: Duration,
}

impl NetworkSignalSource {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_whois(
            WhoisClient::new(
                Duration::from_millis(config.whois_min_interval_ms),
                config.whois_timeout(),
            ),
            config,
        )
    }

    pub fn with_whois(whois: WhoisClient, config: &AppConfig) -> Self {
        Self {
            whois,
            dns: NsResolver::new(config.dns_timeout()),
            whois_timeout: config.whois_timeout(),
            dns_timeout: config.dns_timeout(),
        }
    }
}

#[async_trait]
impl SignalSource for NetworkSignalSource {
    async fn resolve(&self, domain: &str, deadline: Deadline) -> DomainSignals {
        let mut signals = DomainSignals::default();
        if domain.is_empty() {
            return signals;
        }
        let apex = registrable_domain(domain);

        match within(deadline, self.whois_timeout, self.whois.lookup(&apex)).await {
            Ok(record) => {
                signals.registrar = record.registrar;
                signals.nameservers.extend(record.name_servers);
            }
            Err(err) => {
                warn!("whois lookup failed for {}: {}", apex, err);
                signals.errors.push(format!("whois: {err}"));
            }
        }

        if signals.nameservers.is_empty() {
            let lookup = async {
                match self.dns.nameservers(domain).await {
                    Ok(ns) if !ns.is_empty() => Ok(ns),
                    first if apex == domain => first,
                    _ => self.dns.nameservers(&apex).await,
                }
            };
            match within(deadline, self.dns_timeout, lookup).await {
                Ok(ns) => signals.nameservers = ns,
                Err(err) => {
                    warn!("NS lookup failed for {}: {}", domain, err);
                    signals.errors.push(format!("dns: {err}"));
                }
            }
        }

        debug!("signals for {}: {}", domain, signals.summary());
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use tokio::{net::TcpListener, time::Instant};

    #[tokio::test]
    async fn hung_whois_server_is_cut_off() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });

        let mut config = default_config();
        config.whois_timeout_ms = 300;
        config.dns_timeout_ms = 300;
        let whois = WhoisClient::new(Duration::ZERO, config.whois_timeout())
            .with_fixed_server("127.0.0.1", port);
        let source = NetworkSignalSource::with_whois(whois, &config);

        let start = Instant::now();
        let signals = source
            .resolve("examplebank.invalid", Deadline::none())
            .await;
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(signals.registrar.is_none());
        assert!(
            signals.errors.iter().any(|e| e == "whois: timeout"),
            "errors: {:?}",
            signals.errors
        );
    }
}
