use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use crate::core::error::VerifyError;

/// Complete a verified TLS handshake with `host:port` and return the leaf
/// certificate in DER form. Trust comes from the platform store.
pub async fn fetch_peer_certificate(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<Vec<u8>, VerifyError> {
    let handshake = async {
        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(|e| VerifyError::Tls(format!("connect {host}:{port}: {e}")))?;
        let connector = native_tls::TlsConnector::new()
            .map_err(|e| VerifyError::Tls(format!("TLS connector error: {e}")))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);
        let stream = connector
            .connect(host, tcp)
            .await
            .map_err(|e| VerifyError::Tls(format!("handshake with {host}: {e}")))?;
        let cert = stream
            .get_ref()
            .peer_certificate()
            .map_err(|e| VerifyError::Tls(format!("peer certificate: {e}")))?
            .ok_or_else(|| VerifyError::Tls(format!("{host} presented no certificate")))?;
        cert.to_der()
            .map_err(|e| VerifyError::Tls(format!("certificate encoding: {e}")))
    };
    let der = tokio::time::timeout(timeout, handshake).await??;
    debug!("fetched {} byte certificate from {}", der.len(), host);
    Ok(der)
}
