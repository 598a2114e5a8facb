use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::state::ScanState;
use reqwest::Method;

const DANGEROUS_METHODS: &[&str] = &["PUT", "DELETE", "TRACE", "CONNECT", "PATCH"];

/// HTTP method exposure: what OPTIONS advertises, and whether TRACE actually
/// echoes (Cross-Site Tracing).
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    match http
        .client()
        .request(Method::OPTIONS, &state.target)
        .send()
        .await
    {
        Ok(resp) => {
            if let Some(allow) = resp.headers().get("allow").and_then(|v| v.to_str().ok()) {
                tracing::info!("allowed methods: {}", allow);
                let allow_upper = allow.to_uppercase();
                for method in DANGEROUS_METHODS {
                    if allow_upper.contains(method) {
                        findings.add(
                            Severity::Medium,
                            "HTTP Methods",
                            format!("Dangerous method enabled: {}", method),
                            format!("The server allows {} requests.", method),
                            &format!("Disable {} unless explicitly needed.", method),
                        );
                    }
                }
            }
        }
        Err(e) => {
            tracing::warn!("methods scan failed: {}", e);
            return;
        }
    }

    if let Ok(resp) = http
        .client()
        .request(Method::TRACE, &state.target)
        .send()
        .await
    {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        if status == 200 && body.contains("TRACE") {
            findings.add(
                Severity::Medium,
                "HTTP Methods",
                "TRACE method enabled",
                "TRACE can be used for Cross-Site Tracing (XST) attacks.",
                "Disable the TRACE HTTP method.",
            );
        }
    }
}
