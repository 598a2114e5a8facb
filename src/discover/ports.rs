use crate::external::nmap;
use crate::findings::{FindingStore, Severity};
use crate::payloads::COMMON_PORTS;
use crate::state::ScanState;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Port discovery: nmap when the binary is on PATH, TCP connect scan
/// otherwise. Anything open besides 80/443 is worth a note.
pub async fn run(state: &ScanState, findings: &FindingStore) {
    if which::which("nmap").is_ok() {
        match nmap::scan(&state.host).await {
            Ok(open) => {
                for (port, service) in open {
                    report_open_port(findings, &state.host, port, Some(&service));
                }
                return;
            }
            Err(e) => {
                tracing::warn!("nmap scan failed, falling back to socket scan: {}", e);
            }
        }
    } else {
        tracing::info!("nmap not available, using socket scan");
    }

    connect_scan(state, findings).await;
}

async fn connect_scan(state: &ScanState, findings: &FindingStore) {
    for &port in COMMON_PORTS {
        match timeout(CONNECT_TIMEOUT, TcpStream::connect((state.host.as_str(), port))).await {
            Ok(Ok(_stream)) => {
                tracing::info!("port {} open on {}", port, state.host);
                report_open_port(findings, &state.host, port, None);
            }
            _ => {}
        }
    }
}

fn report_open_port(findings: &FindingStore, host: &str, port: u16, service: Option<&str>) {
    if port == 80 || port == 443 {
        return;
    }
    let detail = match service {
        Some(service) => format!("Host: {}:{} ({})", host, port, service),
        None => format!("Host: {}:{}", host, port),
    };
    findings.add(
        Severity::Info,
        "Open Port",
        format!("Port {} is open", port),
        detail,
        "Ensure only necessary ports are exposed.",
    );
}
