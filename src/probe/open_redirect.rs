use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::REDIRECT_PARAMS;
use crate::state::{OpenRedirectHit, ScanState};
use crate::utils;
use ahash::AHashSet;
use reqwest::header::LOCATION;
use std::time::Duration;
use url::Url;

pub const EVIL_URL: &str = "https://evil.tupisec-test.io";
const SENTINEL_HOST: &str = "tupisec-test.io";

/// Open redirect testing over redirect-looking query parameters. Requests go
/// out with redirects disabled so the Location header is observable.
pub async fn run(state: &mut ScanState, http: &HttpClient, findings: &FindingStore) {
    let mut tested: AHashSet<(String, String)> = AHashSet::new();
    let mut hits = Vec::new();

    let mut pages = state.urls_with_query();
    if let Ok(target) = Url::parse(&state.target) {
        pages.push(target);
    }

    for page in pages {
        if page.query().map(str::is_empty).unwrap_or(true) {
            continue;
        }
        let params: Vec<String> = page.query_pairs().map(|(k, _)| k.into_owned()).collect();
        for param in params {
            if !REDIRECT_PARAMS.contains(&param.to_lowercase().as_str()) {
                continue;
            }
            let mut endpoint = page.clone();
            endpoint.set_query(None);
            if !tested.insert((endpoint.to_string(), param.clone())) {
                continue;
            }

            let test_url = utils::with_query_param(&page, &param, EVIL_URL);
            let Ok(resp) = http
                .bare()
                .get(test_url.as_str())
                .timeout(Duration::from_secs(8))
                .send()
                .await
            else {
                continue;
            };
            let Some(location) = resp.headers().get(LOCATION).and_then(|v| v.to_str().ok())
            else {
                continue;
            };

            if location.contains(SENTINEL_HOST) {
                findings.add(
                    Severity::High,
                    "Open Redirect",
                    format!("Open Redirect via parameter '{}'", param),
                    format!(
                        "URL: {}\nPayload: {}={}\nRedirects to: {}",
                        page, param, EVIL_URL, location
                    ),
                    "Validate redirect URLs against a whitelist. Never allow arbitrary external redirects.",
                );
                hits.push(OpenRedirectHit {
                    url: page.to_string(),
                    param,
                    redirect_to: location.to_string(),
                });
            }
        }
    }

    if hits.is_empty() {
        tracing::info!("no open redirects detected");
    }
    state.open_redirects.extend(hits);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_host_is_part_of_marker_url() {
        assert!(EVIL_URL.contains(SENTINEL_HOST));
    }
}
