use crate::findings::FindingStore;
use crate::http_client::HttpClient;
use crate::payloads::SENSITIVE_PATTERNS;
use crate::state::{ScanState, SensitiveHit};
use crate::utils;
use ahash::AHashSet;

const PAGE_BUDGET: usize = 15;

/// Regex sweep for exposed credentials, keys and identifiers over the target
/// and the first crawled pages. Credential matches are masked in reports.
pub async fn run(state: &mut ScanState, http: &HttpClient, findings: &FindingStore) {
    let mut pages = vec![state.target.clone()];
    pages.extend(state.discovered_urls.iter().take(PAGE_BUDGET).cloned());
    pages.dedup();

    let mut seen: AHashSet<(String, &'static str)> = AHashSet::new();
    for page in pages {
        let Ok(resp) = http.get(&page).await else { continue };
        let Ok(body) = resp.text().await else { continue };

        for pattern in SENSITIVE_PATTERNS.iter() {
            let Some(m) = pattern.regex.find(&body) else { continue };
            if !seen.insert((page.clone(), pattern.name)) {
                continue;
            }
            let sample = if pattern.mask {
                utils::mask_secret(m.as_str())
            } else {
                m.as_str().to_string()
            };
            findings.add(
                pattern.severity,
                "Sensitive Data Exposure",
                format!("{} exposed", pattern.name),
                format!("URL: {}\nMatch: {}", page, sample),
                "Remove sensitive values from client-reachable responses and rotate exposed credentials.",
            );
            state.sensitive_findings.push(SensitiveHit {
                url: page.clone(),
                kind: pattern.name.to_string(),
                sample,
            });
        }
    }
}
