use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::SECURITY_HEADERS;
use crate::state::ScanState;

/// First contact with the target: header disclosure, missing security
/// headers, cookie attributes, wildcard CORS. Returns the response body so
/// the form phase can reuse it without a second request.
pub async fn run(
    state: &mut ScanState,
    http: &HttpClient,
    findings: &FindingStore,
) -> Option<String> {
    let resp = match http.get(&state.target).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!("header scan failed: {}", e);
            return None;
        }
    };

    let headers = resp.headers().clone();

    if let Some(server) = header_str(&headers, "server") {
        findings.add(
            Severity::Low,
            "Information Disclosure",
            "Server header exposed",
            format!("Server: {}", server),
            "Remove or obfuscate the Server header.",
        );
        state.tech_stack.insert("server".into(), server.to_string());
    }

    if let Some(powered) = header_str(&headers, "x-powered-by") {
        findings.add(
            Severity::Low,
            "Information Disclosure",
            "X-Powered-By header exposed",
            format!("X-Powered-By: {}", powered),
            "Remove the X-Powered-By header in production.",
        );
        state
            .tech_stack
            .insert("powered_by".into(), powered.to_string());
    }

    for header in SECURITY_HEADERS {
        if !headers.contains_key(*header) {
            let severity = if matches!(
                *header,
                "Content-Security-Policy" | "Strict-Transport-Security"
            ) {
                Severity::High
            } else {
                Severity::Medium
            };
            findings.add(
                severity,
                "Missing Security Header",
                format!("Missing: {}", header),
                format!("The response does not include the {} header.", header),
                &format!("Add the {} header to all responses.", header),
            );
        }
    }

    for cookie in resp.cookies() {
        let mut issues = Vec::new();
        if !cookie.secure() {
            issues.push("Missing Secure flag");
        }
        if !cookie.http_only() {
            issues.push("Missing HttpOnly flag");
        }
        if !cookie.same_site_lax() && !cookie.same_site_strict() {
            issues.push("Missing SameSite attribute");
        }
        if !issues.is_empty() {
            findings.add(
                Severity::Medium,
                "Cookie Security",
                format!("Insecure cookie: {}", cookie.name()),
                format!("Issues: {}", issues.join(", ")),
                "Set Secure, HttpOnly, and SameSite attributes on all cookies.",
            );
        }
    }

    if header_str(&headers, "access-control-allow-origin") == Some("*") {
        findings.add(
            Severity::High,
            "CORS Misconfiguration",
            "Wildcard CORS origin",
            "Access-Control-Allow-Origin is set to *",
            "Restrict CORS to specific trusted origins.",
        );
    }

    match resp.text().await {
        Ok(body) => Some(body),
        Err(e) => {
            tracing::warn!("failed to read target body: {}", e);
            None
        }
    }
}

fn header_str<'a>(headers: &'a reqwest::header::HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
