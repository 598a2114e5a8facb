use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::{COMMON_PATHS, NEWSYS_PATHS};
use crate::state::ScanState;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(8);

const CRITICAL_FRAGMENTS: &[&str] = &[".env", ".git/config", "dump.sql", "phpinfo"];
const HIGH_FRAGMENTS: &[&str] = &["config", "backup", ".bak", "sql"];

/// Sensitive file and directory enumeration against the base URL, redirects
/// disabled so the raw status is observable. A 403 still proves existence.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    for path in COMMON_PATHS {
        let url = format!("{}/{}", state.base_url, path);
        let Ok(resp) = http.bare().get(&url).timeout(PROBE_TIMEOUT).send().await else {
            continue;
        };
        let status = resp.status().as_u16();
        let length = resp.bytes().await.map(|b| b.len()).unwrap_or(0);

        match status {
            200 => {
                let severity = classify_path(path);
                findings.add(
                    severity,
                    "Sensitive File/Directory",
                    format!("Accessible: {}", path),
                    format!("URL: {} (Status: {}, Size: {} bytes)", url, status, length),
                    "Restrict access to sensitive files and directories.",
                );
            }
            403 => {
                findings.add(
                    Severity::Info,
                    "Directory Enumeration",
                    format!("Forbidden but exists: {}", path),
                    format!("URL: {} returned 403 Forbidden.", url),
                    "Ensure 403 responses don't leak information.",
                );
            }
            _ => {}
        }
    }

    tracing::info!("enumerating /newsys/ subdirectory");
    for path in NEWSYS_PATHS {
        let url = format!("{}/newsys/{}", state.base_url, path);
        let Ok(resp) = http.bare().get(&url).timeout(PROBE_TIMEOUT).send().await else {
            continue;
        };
        let status = resp.status().as_u16();
        let length = resp.bytes().await.map(|b| b.len()).unwrap_or(0);

        match status {
            200 if length > 0 => {
                let sensitive = ["config", "db", "conn", "conexion", "admin", "phpinfo"]
                    .iter()
                    .any(|s| path.contains(s));
                let severity = if sensitive { Severity::High } else { Severity::Medium };
                findings.add(
                    severity,
                    "Sensitive File/Directory",
                    format!("Accessible in /newsys/: {}", path),
                    format!("URL: {} (Status: {}, Size: {} bytes)", url, status, length),
                    "Restrict access to non-public files.",
                );
            }
            403 => {
                findings.add(
                    Severity::Info,
                    "Directory Enumeration",
                    format!("Exists in /newsys/: {}", path),
                    format!("URL: {} returned 403 Forbidden.", url),
                    "",
                );
            }
            _ => {}
        }
    }
}

fn classify_path(path: &str) -> Severity {
    if CRITICAL_FRAGMENTS.iter().any(|s| path.contains(s)) {
        Severity::Critical
    } else if HIGH_FRAGMENTS.iter().any(|s| path.contains(s)) {
        Severity::High
    } else {
        Severity::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_severity_classes() {
        assert_eq!(classify_path(".env"), Severity::Critical);
        assert_eq!(classify_path(".git/config"), Severity::Critical);
        assert_eq!(classify_path("dump.sql"), Severity::Critical);
        assert_eq!(classify_path("phpinfo.php"), Severity::Critical);
        assert_eq!(classify_path("backup/"), Severity::High);
        assert_eq!(classify_path("wp-config.php.bak"), Severity::High);
        assert_eq!(classify_path("robots.txt"), Severity::Medium);
    }
}
