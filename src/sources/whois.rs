//! Minimal port-43 WHOIS client.
//!
//! The TLD registry server comes from a small built-in table or an IANA
//! referral. Thin registries (.com/.net) only point at the sponsoring
//! registrar, so one `Registrar WHOIS Server` hop is followed and its fields
//! take precedence.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tracing::debug;

use crate::core::error::VerifyError;
use crate::sources::rate_limiter::RateLimiter;

const WHOIS_PORT: u16 = 43;
const IANA_SERVER: &str = "whois.iana.org";
const MAX_RESPONSE_BYTES: u64 = 256 * 1024;

static REGISTRAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:registrar|sponsoring registrar|registrar name|registrar organization)[ \t]*:[ \t]*(\S.*?)\s*$")
        .expect("registrar pattern")
});

static NAMESERVER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:name ?servers?|nserver)[ \t]*:[ \t]*(\S+)")
        .expect("nameserver pattern")
});

static REFERRAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*registrar whois server[ \t]*:[ \t]*(\S+)").expect("referral pattern")
});

static IANA_REFER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:refer|whois)[ \t]*:[ \t]*(\S+)").expect("iana pattern")
});

static NO_MATCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(no match for|not found|no entries found|no data found|status:\s*free)")
        .expect("no-match pattern")
});

/// Registry servers for common TLDs; anything else is asked of IANA.
const TLD_SERVERS: &[(&str, &str)] = &[
    ("com", "whois.verisign-grs.com"),
    ("net", "whois.verisign-grs.com"),
    ("org", "whois.pir.org"),
    ("info", "whois.nic.info"),
    ("io", "whois.nic.io"),
    ("co", "whois.nic.co"),
    ("me", "whois.nic.me"),
    ("xyz", "whois.nic.xyz"),
    ("top", "whois.nic.top"),
    ("app", "whois.nic.google"),
    ("dev", "whois.nic.google"),
    ("ru", "whois.tcinet.ru"),
    ("uk", "whois.nic.uk"),
    ("us", "whois.nic.us"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhoisRecord {
    pub registrar: Option<String>,
    pub name_servers: Vec<String>,
    pub referral: Option<String>,
}

impl WhoisRecord {
    pub fn is_empty(&self) -> bool {
        self.registrar.is_none() && self.name_servers.is_empty()
    }

    /// Fields from `detail` win; gaps are filled from `self`.
    fn merged_with(self, detail: WhoisRecord) -> WhoisRecord {
        WhoisRecord {
            registrar: detail.registrar.or(self.registrar),
            name_servers: if detail.name_servers.is_empty() {
                self.name_servers
            } else {
                detail.name_servers
            },
            referral: None,
        }
    }
}

pub struct WhoisClient {
    port: u16,
    fixed_server: Option<String>,
    io_timeout: Duration,
    limiter: RateLimiter,
}

impl WhoisClient {
    pub fn new(min_interval: Duration, io_timeout: Duration) -> Self {
        Self {
            port: WHOIS_PORT,
            fixed_server: None,
            io_timeout,
            limiter: RateLimiter::new(min_interval),
        }
    }

    /// Send every query to one server (private WHOIS mirrors, tests).
    pub fn with_fixed_server(mut self, server: impl Into<String>, port: u16) -> Self {
        self.fixed_server = Some(server.into());
        self.port = port;
        self
    }

    pub async fn lookup(&self, domain: &str) -> Result<WhoisRecord, VerifyError> {
        let server = self.registry_server(domain).await?;
        let raw = self.query(&server, domain).await?;
        let mut record = parse_record(&raw);

        if let Some(referral) = record.referral.take() {
            if self.fixed_server.is_none() && !referral.eq_ignore_ascii_case(&server) {
                match self.query(&referral, domain).await {
                    Ok(detail) => record = record.merged_with(parse_record(&detail)),
                    Err(err) => debug!("registrar whois {} failed for {}: {}", referral, domain, err),
                }
            }
        }

        if record.is_empty() {
            let reason = if NO_MATCH_RE.is_match(&raw) {
                "no record found"
            } else {
                "no registrar or nameserver fields"
            };
            return Err(VerifyError::Whois(format!("{domain}: {reason}")));
        }
        Ok(record)
    }

    async fn registry_server(&self, domain: &str) -> Result<String, VerifyError> {
        if let Some(fixed) = &self.fixed_server {
            return Ok(fixed.clone());
        }
        let tld = domain
            .rsplit('.')
            .next()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| VerifyError::Whois(format!("no tld in '{domain}'")))?;
        if let Some((_, server)) = TLD_SERVERS.iter().find(|(t, _)| *t == tld) {
            return Ok((*server).to_string());
        }
        let raw = self.query(IANA_SERVER, tld).await?;
        IANA_REFER_RE
            .captures(&raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_lowercase())
            .ok_or_else(|| VerifyError::Whois(format!("iana has no whois server for .{tld}")))
    }

    async fn query(&self, server: &str, query: &str) -> Result<String, VerifyError> {
        self.limiter.wait(server).await;
        debug!("whois query {} @ {}", query, server);
        let exchange = async {
            let mut stream = TcpStream::connect((server, self.port))
                .await
                .map_err(|e| VerifyError::Whois(format!("connect {server}: {e}")))?;
            stream
                .write_all(format!("{query}\r\n").as_bytes())
                .await
                .map_err(|e| VerifyError::Whois(format!("write {server}: {e}")))?;
            let mut buf = Vec::new();
            stream
                .take(MAX_RESPONSE_BYTES)
                .read_to_end(&mut buf)
                .await
                .map_err(|e| VerifyError::Whois(format!("read {server}: {e}")))?;
            Ok::<_, VerifyError>(String::from_utf8_lossy(&buf).into_owned())
        };
        tokio::time::timeout(self.io_timeout, exchange).await?
    }
}

pub fn parse_record(raw: &str) -> WhoisRecord {
    let registrar = REGISTRAR_RE
        .captures_iter(raw)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_lowercase())
        .find(|r| !r.is_empty());

    let mut name_servers: Vec<String> = NAMESERVER_RE
        .captures_iter(raw)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().trim_end_matches('.').to_lowercase())
        .filter(|ns| !ns.is_empty())
        .collect();
    name_servers.sort();
    name_servers.dedup();

    let referral = REFERRAL_RE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_lowercase())
        .filter(|r| !r.is_empty() && !r.contains('/'));

    WhoisRecord {
        registrar,
        name_servers,
        referral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERISIGN_THIN: &str = "   Domain Name: EXAMPLEBANK.COM\r\n   Registry Domain ID: 1_DOMAIN_COM-VRSN\r\n   Registrar WHOIS Server: whois.markmonitor.com\r\n   Registrar URL: http://www.markmonitor.com\r\n   Registrar: MarkMonitor Inc.\r\n   Name Server: NS1.EXAMPLEBANK.COM\r\n   Name Server: NS2.EXAMPLEBANK.COM\r\n";

    const TCINET_RU: &str = "domain:        SECURE-VERIFY.RU\nnserver:       ns1.hosting.example.\nnserver:       ns2.hosting.example. 192.0.2.1\nstate:         REGISTERED, DELEGATED\nregistrar:     REGRU-RU\n";

    #[test]
    fn parses_thin_registry_record() {
        let record = parse_record(VERISIGN_THIN);
        assert_eq!(record.registrar.as_deref(), Some("markmonitor inc."));
        assert_eq!(
            record.name_servers,
            vec!["ns1.examplebank.com", "ns2.examplebank.com"]
        );
        assert_eq!(record.referral.as_deref(), Some("whois.markmonitor.com"));
    }

    #[test]
    fn parses_ru_style_record() {
        let record = parse_record(TCINET_RU);
        assert_eq!(record.registrar.as_deref(), Some("regru-ru"));
        assert_eq!(
            record.name_servers,
            vec!["ns1.hosting.example", "ns2.hosting.example"]
        );
        assert!(record.referral.is_none());
    }

    #[test]
    fn first_non_empty_registrar_wins() {
        let raw = "Registrar:\nRegistrar: NameCheap, Inc.\nSponsoring Registrar: Other LLC\n";
        assert_eq!(
            parse_record(raw).registrar.as_deref(),
            Some("namecheap, inc.")
        );
    }

    #[test]
    fn url_fields_are_not_registrars() {
        let raw = "Registrar URL: http://www.namecheap.com\nRegistrar IANA ID: 1068\n";
        assert!(parse_record(raw).registrar.is_none());
    }

    #[test]
    fn detail_record_overrides_registry_fields() {
        let registry = parse_record(VERISIGN_THIN);
        let detail = parse_record("Registrar: MarkMonitor, Inc.\n");
        let merged = registry.merged_with(detail);
        assert_eq!(merged.registrar.as_deref(), Some("markmonitor, inc."));
        assert_eq!(merged.name_servers.len(), 2);
    }

    #[tokio::test]
    async fn lookup_against_local_server() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = [0u8; 256];
                let _ = sock.read(&mut buf).await;
                let _ = sock.write_all(VERISIGN_THIN.as_bytes()).await;
            }
        });

        let client = WhoisClient::new(Duration::ZERO, Duration::from_secs(2))
            .with_fixed_server("127.0.0.1", port);
        let record = client.lookup("examplebank.com").await.unwrap();
        assert_eq!(record.registrar.as_deref(), Some("markmonitor inc."));
    }

    #[tokio::test]
    async fn empty_answer_is_an_error() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = [0u8; 256];
                let _ = sock.read(&mut buf).await;
                let _ = sock.write_all(b"No match for \"NOPE.COM\".\r\n").await;
            }
        });

        let client = WhoisClient::new(Duration::ZERO, Duration::from_secs(2))
            .with_fixed_server("127.0.0.1", port);
        let err = client.lookup("nope.com").await.unwrap_err();
        assert!(err.to_string().contains("no record found"));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((sock, _)) = listener.accept().await {
                tokio::time::sleep(Duration::from_secs(10)).await;
                drop(sock);
            }
        });

        let client = WhoisClient::new(Duration::ZERO, Duration::from_millis(200))
            .with_fixed_server("127.0.0.1", port);
        let start = tokio::time::Instant::now();
        let err = client.lookup("examplebank.com").await.unwrap_err();
        assert!(matches!(err, VerifyError::Timeout));
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
