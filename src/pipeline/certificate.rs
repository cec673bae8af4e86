use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use openssl::{nid::Nid, x509::X509, x509::X509NameRef};
use tracing::{debug, warn};

use crate::core::{
    error::VerifyError,
    time::{now_utc, Deadline},
    types::CertificateReport,
};
use crate::sources::tls::fetch_peer_certificate;

/// Never fails: every problem is folded into a `valid = false` report.
#[async_trait]
pub trait CertificateInspector: Send + Sync {
    async fn inspect(&self, domain: &str, deadline: Deadline) -> CertificateReport;
}

pub struct TlsCertificateInspector {
    port: u16,
    timeout: Duration,
}

impl TlsCertificateInspector {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

#[async_trait]
impl CertificateInspector for TlsCertificateInspector {
    async fn inspect(&self, domain: &str, deadline: Deadline) -> CertificateReport {
        if domain.is_empty() {
            return CertificateReport::failed("no domain to inspect");
        }
        if deadline.expired() {
            return CertificateReport::failed(VerifyError::Timeout.to_string());
        }
        let report = match fetch_peer_certificate(domain, self.port, deadline.bound(self.timeout))
            .await
        {
            Ok(der) => report_from_der(&der, now_utc()),
            Err(err) => CertificateReport::failed(err.to_string()),
        };
        match &report.error {
            Some(err) => warn!("certificate inspection failed for {}: {}", domain, err),
            None => debug!("certificate for {}: {}", domain, report.comment()),
        }
        report
    }
}

pub fn report_from_der(der: &[u8], now: DateTime<Utc>) -> CertificateReport {
    match extract(der, now) {
        Ok(report) => report,
        Err(err) => CertificateReport::failed(err.to_string()),
    }
}

fn extract(der: &[u8], now: DateTime<Utc>) -> Result<CertificateReport, VerifyError> {
    let cert = X509::from_der(der).map_err(|e| VerifyError::Tls(format!("decode: {e}")))?;

    let common_name = name_entry(cert.subject_name(), Nid::COMMONNAME);
    let issuer = name_entry(cert.issuer_name(), Nid::ORGANIZATIONNAME)
        .or_else(|| name_entry(cert.issuer_name(), Nid::COMMONNAME));

    let not_before = parse_cert_time(&cert.not_before().to_string())?;
    let not_after = parse_cert_time(&cert.not_after().to_string())?;

    Ok(CertificateReport {
        valid: true,
        issuer,
        common_name,
        not_before: Some(not_before),
        not_after: Some(not_after),
        age_days: Some((now - not_before).num_days()),
        valid_now: Some(not_before <= now && now <= not_after),
        error: None,
    })
}

fn name_entry(name: &X509NameRef, nid: Nid) -> Option<String> {
    name.entries_by_nid(nid)
        .next()
        .and_then(|entry| entry.data().to_string().ok())
        .filter(|s| !s.trim().is_empty())
}

/// Parses the `Mon DD HH:MM:SS YYYY GMT` form used when printing X.509 times.
pub fn parse_cert_time(raw: &str) -> Result<DateTime<Utc>, VerifyError> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&collapsed, "%b %d %H:%M:%S %Y GMT")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| VerifyError::Parse(format!("certificate time '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::{
        asn1::Asn1Time,
        ec::{EcGroup, EcKey},
        hash::MessageDigest,
        pkey::PKey,
        x509::{X509Builder, X509NameBuilder},
    };

    fn self_signed(issuer_org: Option<&str>) -> Vec<u8> {
        self_signed_for("examplebank.com", issuer_org)
    }

    fn self_signed_for(common_name: &str, issuer_org: Option<&str>) -> Vec<u8> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let pkey = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_nid(Nid::COMMONNAME, common_name).unwrap();
        if let Some(org) = issuer_org {
            name.append_entry_by_nid(Nid::ORGANIZATIONNAME, org).unwrap();
        }
        let name = name.build();

        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&pkey).unwrap();
        // 2023-11-14T22:13:20Z .. 2027-01-15T08:00:00Z
        builder
            .set_not_before(&Asn1Time::from_unix(1_700_000_000).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::from_unix(1_800_000_000).unwrap())
            .unwrap();
        builder.sign(&pkey, MessageDigest::sha256()).unwrap();
        builder.build().to_der().unwrap()
    }

    #[test]
    fn extracts_fields_and_age() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let report = report_from_der(&self_signed(Some("Example Trust Services")), now);
        assert!(report.valid);
        assert_eq!(report.issuer.as_deref(), Some("Example Trust Services"));
        assert_eq!(report.common_name.as_deref(), Some("examplebank.com"));
        assert_eq!(report.age_days, Some(47));
        assert_eq!(report.valid_now, Some(true));
        assert!(report.error.is_none());
    }

    #[test]
    fn issuer_falls_back_to_common_name() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let report = report_from_der(&self_signed(None), now);
        assert_eq!(report.issuer.as_deref(), Some("examplebank.com"));
    }

    #[test]
    fn common_name_keeps_bytes_after_interior_nul() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let cn = "examplebank.com\0.attacker.example";
        let report = report_from_der(&self_signed_for(cn, Some("CA")), now);
        assert_eq!(report.common_name.as_deref(), Some(cn));
    }

    #[test]
    fn expired_certificate_is_not_valid_now() {
        let now = Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap();
        let report = report_from_der(&self_signed(Some("CA")), now);
        assert!(report.valid);
        assert_eq!(report.valid_now, Some(false));
    }

    #[test]
    fn garbage_der_yields_failed_report() {
        let report = report_from_der(b"not a certificate", Utc::now());
        assert!(!report.valid);
        assert!(report.error.is_some());
        assert!(report.not_before.is_none());
    }

    #[test]
    fn parses_padded_day() {
        let t = parse_cert_time("Jan  5 12:00:00 2024 GMT").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap());
        assert!(parse_cert_time("yesterday").is_err());
    }

    #[tokio::test]
    async fn failed_handshake_keeps_only_error() {
        use tokio::{io::AsyncWriteExt, net::TcpListener};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut sock, _)) = listener.accept().await {
                let _ = sock.write_all(b"HTTP/1.0 400 Bad Request\r\n\r\n").await;
            }
        });

        let inspector = TlsCertificateInspector::new(port, Duration::from_secs(2));
        let report = inspector.inspect("localhost", Deadline::none()).await;
        assert!(!report.valid);
        assert!(!report.error.as_deref().unwrap_or_default().is_empty());
        assert!(report.issuer.is_none());
        assert!(report.common_name.is_none());
        assert!(report.not_after.is_none());
        assert!(report.age_days.is_none());
    }
}
