use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::{PROTO_POLLUTION_ERRORS, PROTO_POLLUTION_MARKER, PROTO_POLLUTION_PAYLOADS};
use crate::state::ScanState;
use ahash::AHashSet;

const URL_BUDGET: usize = 20;

/// Client-observable prototype pollution: inject `__proto__`/`constructor`
/// keys through the query string and watch for the marker value or a
/// pollution-shaped server error.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    let mut seen: AHashSet<String> = AHashSet::new();

    let mut pages = vec![state.target.clone()];
    pages.extend(state.discovered_urls.iter().take(URL_BUDGET).cloned());
    pages.dedup();

    for page in pages {
        for payload in PROTO_POLLUTION_PAYLOADS {
            let sep = if page.contains('?') { '&' } else { '?' };
            let test_url = format!("{}{}{}", page, sep, payload);
            let Ok(resp) = http.get_with_timeout(&test_url, 8).await else { continue };
            let status = resp.status().as_u16();
            let Ok(body) = resp.text().await else { continue };

            if body.contains(PROTO_POLLUTION_MARKER) {
                if seen.insert(page.clone()) {
                    findings.add(
                        Severity::High,
                        "Prototype Pollution",
                        "Prototype pollution marker reflected",
                        format!("URL: {}\nPayload: {}", page, payload),
                        "Filter __proto__ and constructor keys when merging user-supplied objects.",
                    );
                }
                break;
            }

            if status == 500 {
                let lower = body.to_lowercase();
                if PROTO_POLLUTION_ERRORS.iter().any(|e| lower.contains(e)) {
                    if seen.insert(page.clone()) {
                        findings.add(
                            Severity::Medium,
                            "Prototype Pollution",
                            "Server error on prototype-polluting input",
                            format!(
                                "URL: {}\nPayload: {}\n500 response mentions prototype internals.",
                                page, payload
                            ),
                            "Filter __proto__ and constructor keys when merging user-supplied objects.",
                        );
                    }
                    break;
                }
            }
        }
    }
}
