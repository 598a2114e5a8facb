use crate::findings::{FindingStore, Severity};
use crate::state::ScanState;
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(7);

#[derive(Debug, PartialEq, Eq)]
enum ProbeOutcome {
    /// Server answered (or closed) - parsers agree on framing.
    Responded,
    /// Server sat on the request waiting for more body: the desync symptom.
    TimedOut,
}

/// HTTP/1.1 request smuggling probes. These bypass the pooled client
/// entirely: a fresh raw socket per probe, a handcrafted request, and a
/// single bounded read.
pub async fn run(state: &ScanState, findings: &FindingStore) {
    let path = if state.target_url.path().is_empty() {
        "/"
    } else {
        state.target_url.path()
    };

    let probes = [
        ("CL.TE", clte_request(&state.host, path)),
        ("TE.CL", tecl_request(&state.host, path)),
    ];

    for (variant, request) in probes {
        match raw_probe(state, request.as_bytes()).await {
            Ok(ProbeOutcome::TimedOut) => {
                findings.add(
                    Severity::High,
                    "HTTP Request Smuggling",
                    format!("Possible HTTP request smuggling ({})", variant),
                    format!(
                        "Host: {}:{}\nThe server hung for {}s on a {} desync probe, suggesting \
                         front-end and back-end disagree on request framing.",
                        state.host,
                        state.port,
                        RECV_TIMEOUT.as_secs(),
                        variant
                    ),
                    "Normalize Content-Length/Transfer-Encoding handling across all HTTP hops.",
                );
            }
            Ok(ProbeOutcome::Responded) => {
                tracing::debug!("{} probe answered normally", variant);
            }
            Err(e) => {
                // Transport failures are noise, not findings.
                tracing::debug!("{} probe transport error: {}", variant, e);
            }
        }
    }
}

/// Ambiguous framing: Content-Length says 6 bytes, chunked encoding says the
/// body ends immediately. A CL-parsing backend keeps waiting.
fn clte_request(host: &str, path: &str) -> String {
    format!(
        "POST {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Content-Type: application/x-www-form-urlencoded\r\n\
         Content-Length: 6\r\n\
         Transfer-Encoding: chunked\r\n\
         \r\n\
         0\r\n\
         \r\n"
    )
}

/// The inverse: chunked encoding promises a chunk of data that never arrives,
/// so a TE-parsing backend hangs while a CL backend answers.
fn tecl_request(host: &str, path: &str) -> String {
    format!(
        "POST {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Content-Type: application/x-www-form-urlencoded\r\n\
         Content-Length: 4\r\n\
         Transfer-Encoding: chunked\r\n\
         \r\n\
         a\r\n"
    )
}

async fn raw_probe(state: &ScanState, request: &[u8]) -> Result<ProbeOutcome> {
    let stream = timeout(
        RECV_TIMEOUT,
        TcpStream::connect((state.host.as_str(), state.port)),
    )
    .await
    .context("connect timed out")?
    .context("connect failed")?;

    if state.scheme == "https" {
        let connector = tokio_native_tls::TlsConnector::from(
            native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .context("failed to build TLS connector")?,
        );
        let mut tls_stream = timeout(RECV_TIMEOUT, connector.connect(&state.host, stream))
            .await
            .context("TLS handshake timed out")?
            .context("TLS handshake failed")?;
        send_and_read(&mut tls_stream, request).await
    } else {
        let mut stream = stream;
        send_and_read(&mut stream, request).await
    }
}

async fn send_and_read<S>(stream: &mut S, request: &[u8]) -> Result<ProbeOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(request).await.context("send failed")?;
    stream.flush().await.context("flush failed")?;

    let mut buf = [0u8; 4096];
    match timeout(RECV_TIMEOUT, stream.read(&mut buf)).await {
        // Deadline elapsed with no bytes: the oracle fires.
        Err(_) => Ok(ProbeOutcome::TimedOut),
        Ok(Ok(_)) => Ok(ProbeOutcome::Responded),
        Ok(Err(e)) => Err(e).context("read failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clte_carries_both_framing_headers() {
        let req = clte_request("example.com", "/");
        assert!(req.starts_with("POST / HTTP/1.1\r\n"));
        assert!(req.contains("Content-Length: 6\r\n"));
        assert!(req.contains("Transfer-Encoding: chunked\r\n"));
        assert!(req.ends_with("\r\n\r\n0\r\n\r\n"));
    }

    #[test]
    fn tecl_omits_the_chunk_terminator() {
        let req = tecl_request("example.com", "/app");
        assert!(req.starts_with("POST /app HTTP/1.1\r\n"));
        assert!(req.contains("Content-Length: 4\r\n"));
        assert!(req.ends_with("\r\na\r\n"));
        assert!(!req.ends_with("0\r\n\r\n"));
    }
}
