use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::state::ScanState;

const EVIL_ORIGIN: &str = "https://evil.tupisec-test.io";
const URL_BUDGET: usize = 5;

/// Origin-reflection CORS testing. Reflection with credentials is the
/// worst case and ends the probe early.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    let mut targets = vec![state.target.clone()];
    targets.extend(state.discovered_urls.iter().take(URL_BUDGET).cloned());
    targets.dedup();

    for url in targets {
        let Ok(resp) = http
            .client()
            .get(&url)
            .header("Origin", EVIL_ORIGIN)
            .send()
            .await
        else {
            continue;
        };

        let acao = resp
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let acac = resp
            .headers()
            .get("access-control-allow-credentials")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .trim()
            .to_lowercase();

        if acao == EVIL_ORIGIN && acac == "true" {
            findings.add(
                Severity::Critical,
                "CORS Misconfiguration",
                "CORS: Arbitrary Origin Reflected with Credentials",
                format!(
                    "URL: {}\nAccess-Control-Allow-Origin: {}\nAccess-Control-Allow-Credentials: {}\n\
                     Attackers can make authenticated cross-origin requests.",
                    url, acao, acac
                ),
                "Validate Origin against a strict allowlist. Never combine reflected origins with credentials.",
            );
            return;
        } else if acao == EVIL_ORIGIN {
            findings.add(
                Severity::High,
                "CORS Misconfiguration",
                "CORS: Arbitrary Origin Reflected",
                format!(
                    "URL: {}\nAccess-Control-Allow-Origin: {}\n\
                     Server reflects any Origin header, enabling cross-origin data access.",
                    url, acao
                ),
                "Validate Origin against a strict allowlist.",
            );
        } else if acao.eq_ignore_ascii_case("null") && acac == "true" {
            findings.add(
                Severity::High,
                "CORS Misconfiguration",
                "CORS: Null Origin Accepted with Credentials",
                format!(
                    "URL: {}\nAccess-Control-Allow-Origin: null\nAccess-Control-Allow-Credentials: {}\n\
                     Null origin can be sent from sandboxed iframes.",
                    url, acac
                ),
                "Do not trust the null origin. Validate Origin strictly.",
            );
        }
    }
}
