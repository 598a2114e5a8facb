use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::CRLF_PAYLOADS;
use crate::state::ScanState;
use ahash::AHashSet;
use url::Url;

const PARAM_BUDGET: usize = 3;

/// CRLF header injection through query parameters. Payloads are already
/// percent-encoded and are spliced into the query by hand so nothing
/// re-encodes them on the way out.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    let mut seen: AHashSet<(String, String)> = AHashSet::new();

    for page in state.urls_with_query() {
        let params: Vec<(String, String)> = page
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        for (param, _) in params.iter().take(PARAM_BUDGET) {
            if !seen.insert((page.to_string(), param.clone())) {
                continue;
            }
            for payload in CRLF_PAYLOADS {
                let test_url = build_raw_url(&page, &params, param, payload);
                let Ok(resp) = http
                    .bare()
                    .get(&test_url)
                    .timeout(std::time::Duration::from_secs(8))
                    .send()
                    .await
                else {
                    continue;
                };

                if header_injected(&resp) {
                    findings.add(
                        Severity::High,
                        "CRLF Injection",
                        format!("CRLF header injection via parameter '{}'", param),
                        format!(
                            "URL: {}\nPayload: {}\nInjected header present in the response.",
                            page, payload
                        ),
                        "Strip CR/LF from user input before writing it into response headers.",
                    );
                    break;
                }
            }
        }
    }
}

fn header_injected(resp: &reqwest::Response) -> bool {
    if resp.headers().get("x-injected").is_some() {
        return true;
    }
    resp.headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .any(|v| v.to_str().map(|s| s.contains("tupisec=crlf")).unwrap_or(false))
}

/// Rebuild the query string with `payload` as the raw value of `param`.
fn build_raw_url(
    page: &Url,
    params: &[(String, String)],
    param: &str,
    payload: &str,
) -> String {
    let mut base = page.clone();
    base.set_query(None);
    let query: Vec<String> = params
        .iter()
        .map(|(k, v)| {
            if k == param {
                format!("{}={}", urlencoding::encode(k), payload)
            } else {
                format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))
            }
        })
        .collect();
    format!("{}?{}", base, query.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_spliced_without_reencoding() {
        let page = Url::parse("https://example.com/p?next=/home&x=a b").unwrap();
        let raw = build_raw_url(
            &page,
            &[("next".into(), "/home".into()), ("x".into(), "a b".into())],
            "next",
            CRLF_PAYLOADS[0],
        );
        assert!(raw.contains("next=%0d%0aX-Injected:%20tupisec-crlf"));
        assert!(raw.contains("x=a%20b"));
        // The escape sequences themselves must not be double-encoded.
        assert!(!raw.contains("%250d"));
    }
}
