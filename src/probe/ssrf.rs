use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::{SSRF_INDICATORS, SSRF_PAYLOADS};
use crate::state::ScanState;
use crate::utils;

const URL_BUDGET: usize = 15;
const URL_PAYLOAD_BUDGET: usize = 2;

/// SSRF via form fields and query parameters. The oracle is a cloud-metadata
/// token leaking into the response after pointing the input at an internal
/// address.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    for form in &state.forms {
        for field in &form.fields {
            if field.kind.is_inert() {
                continue;
            }
            for payload in SSRF_PAYLOADS {
                let data = form.test_values(&field.name, payload);
                let Ok(resp) = super::submit_form(http, form, &data, None).await else {
                    continue;
                };
                let Ok(body) = resp.text().await else { continue };

                if check_response(
                    findings,
                    &body,
                    payload,
                    &format!("Form field '{}' at {}", field.name, form.action),
                ) {
                    break;
                }
            }
        }
    }

    for page in state.urls_with_query().into_iter().take(URL_BUDGET) {
        let params: Vec<String> = page.query_pairs().map(|(k, _)| k.into_owned()).collect();
        for param in params {
            for payload in &SSRF_PAYLOADS[..URL_PAYLOAD_BUDGET] {
                let test_url = utils::with_query_param(&page, &param, payload);
                let Ok(resp) = http.get_with_timeout(test_url.as_str(), 8).await else {
                    continue;
                };
                let Ok(body) = resp.text().await else { continue };

                if check_response(
                    findings,
                    &body,
                    payload,
                    &format!("URL param '{}' at {}", param, page),
                ) {
                    break;
                }
            }
        }
    }
}

fn check_response(findings: &FindingStore, body: &str, payload: &str, context: &str) -> bool {
    let Some(indicator) = matches_metadata_indicator(body) else {
        return false;
    };
    findings.add(
        Severity::Critical,
        "SSRF",
        "Cloud Metadata Endpoint Accessible via SSRF",
        format!(
            "Context: {}\nPayload: {}\nCloud metadata indicator: '{}'",
            context, payload, indicator
        ),
        "Block outbound requests to internal/cloud metadata addresses. Use outbound allowlists.",
    );
    true
}

pub fn matches_metadata_indicator(body: &str) -> Option<&'static str> {
    let lower = body.to_lowercase();
    SSRF_INDICATORS.iter().find(|i| lower.contains(*i)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_listing_triggers_oracle() {
        let body = "ami-id\nami-launch-index\ninstance-id\n";
        assert_eq!(matches_metadata_indicator(body), Some("ami-id"));
    }

    #[test]
    fn plain_page_is_clean() {
        assert_eq!(matches_metadata_indicator("<html>hello</html>"), None);
    }
}
