use crate::findings::{FindingStore, Severity};
use crate::state::ScanState;
use anyhow::{anyhow, Result};
use openssl::asn1::Asn1Time;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use openssl::x509::X509VerifyResult;
use std::net::TcpStream;
use std::time::Duration;

const WEAK_PROTOCOLS: &[&str] = &["TLSv1", "TLSv1.1", "SSLv3", "SSLv2"];

struct TlsInfo {
    protocol: String,
    verify_ok: bool,
    verify_error: String,
    days_until_expiry: Option<i32>,
}

/// Certificate and protocol inspection. Verification is captured without
/// aborting the handshake so broken certs can still be examined.
pub async fn run(state: &ScanState, findings: &FindingStore) {
    if state.scheme != "https" {
        findings.add(
            Severity::High,
            "SSL/TLS",
            "No HTTPS",
            format!("The site uses HTTP instead of HTTPS: {}", state.target),
            "Enable HTTPS with a valid TLS certificate.",
        );
        return;
    }

    let host = state.host.clone();
    let port = state.port;
    let info = match tokio::task::spawn_blocking(move || inspect_tls(&host, port)).await {
        Ok(Ok(info)) => info,
        Ok(Err(e)) => {
            tracing::warn!("SSL scan error: {}", e);
            return;
        }
        Err(e) => {
            tracing::warn!("SSL scan task failed: {}", e);
            return;
        }
    };

    tracing::info!("TLS protocol: {}", info.protocol);

    if !info.verify_ok {
        findings.add(
            Severity::High,
            "SSL/TLS",
            "Certificate verification failed",
            info.verify_error.clone(),
            "Fix the SSL certificate configuration.",
        );
    }

    if let Some(days) = info.days_until_expiry {
        if days < 0 {
            findings.add(
                Severity::Critical,
                "SSL/TLS",
                "Certificate expired",
                format!("Certificate expired {} days ago.", -days),
                "Renew the SSL certificate immediately.",
            );
        } else if days < 30 {
            findings.add(
                Severity::Medium,
                "SSL/TLS",
                "Certificate expiring soon",
                format!("Certificate expires in {} days.", days),
                "Renew the SSL certificate soon.",
            );
        }
    }

    if WEAK_PROTOCOLS.contains(&info.protocol.as_str()) {
        findings.add(
            Severity::High,
            "SSL/TLS",
            format!("Weak protocol: {}", info.protocol),
            format!("Server negotiated {} which is deprecated.", info.protocol),
            "Disable TLS 1.0, TLS 1.1, and all SSL versions.",
        );
    }
}

fn inspect_tls(host: &str, port: u16) -> Result<TlsInfo> {
    let mut builder = SslConnector::builder(SslMethod::tls())?;
    builder.set_verify(SslVerifyMode::NONE);
    let connector = builder.build();

    let stream = TcpStream::connect((host, port))?;
    stream.set_read_timeout(Some(Duration::from_secs(15)))?;
    stream.set_write_timeout(Some(Duration::from_secs(15)))?;

    let ssl_stream = connector
        .configure()?
        .verify_hostname(false)
        .connect(host, stream)
        .map_err(|e| anyhow!("TLS handshake failed: {}", e))?;

    let ssl = ssl_stream.ssl();
    let verify = ssl.verify_result();
    let days_until_expiry = ssl.peer_certificate().and_then(|cert| {
        let now = Asn1Time::days_from_now(0).ok()?;
        now.diff(cert.not_after()).ok().map(|d| d.days)
    });

    Ok(TlsInfo {
        protocol: ssl.version_str().to_string(),
        verify_ok: verify == X509VerifyResult::OK,
        verify_error: verify.error_string().to_string(),
        days_until_expiry,
    })
}
