use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::state::{CveEntry, ScanState};
use crate::utils;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

const NVD_URL: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";
const PRODUCT_BUDGET: usize = 5;
/// NVD unauthenticated courtesy contract: pause between queries, back off
/// hard on 429.
const COURTESY_SLEEP: Duration = Duration::from_secs(2);
const BACKOFF_SLEEP: Duration = Duration::from_secs(10);

static PRODUCT_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([a-zA-Z][a-zA-Z0-9\-_.]+)[/\s]+(\d+\.\d+(?:\.\d+)?)")
        .expect("invalid product/version pattern")
});

/// NVD keyword lookup for the fingerprinted stack. Only CVSS >= 7.0 makes it
/// into the report.
pub async fn run(state: &mut ScanState, http: &HttpClient, findings: &FindingStore) {
    if state.tech_stack.is_empty() {
        tracing::info!("no tech stack detected, skipping CVE lookup");
        return;
    }

    let products = extract_products(state);
    if products.is_empty() {
        tracing::info!("no versioned products found in tech stack");
        return;
    }

    let total = products.len().min(PRODUCT_BUDGET);
    for (idx, (product, version)) in products.into_iter().take(PRODUCT_BUDGET).enumerate() {
        let keyword = format!("{} {}", product, version).trim().to_string();
        tracing::info!("querying NVD for: {}", keyword);

        let result = http
            .client()
            .get(NVD_URL)
            .query(&[("keywordSearch", keyword.as_str()), ("resultsPerPage", "5")])
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().as_u16() == 429 => {
                tracing::warn!("NVD rate limit hit, backing off");
                sleep(BACKOFF_SLEEP).await;
            }
            Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
                Ok(data) => record_cves(state, findings, &data, &product, &version),
                Err(e) => tracing::warn!("NVD response parse error for {}: {}", keyword, e),
            },
            Ok(resp) => {
                tracing::warn!("NVD returned {} for {}", resp.status(), keyword);
            }
            Err(e) => {
                tracing::warn!("CVE lookup error for {}: {}", keyword, e);
            }
        }

        if idx + 1 < total {
            sleep(COURTESY_SLEEP).await;
        }
    }

    tracing::info!("found {} high/critical CVEs", state.cve_data.len());
}

/// `(product, version)` pairs from free-form tech-stack values like
/// "nginx/1.18.0" or "PHP/5.6.24"; short unversioned values become bare
/// keywords.
fn extract_products(state: &ScanState) -> Vec<(String, String)> {
    let mut products = Vec::new();
    for value in state.tech_stack.values() {
        if let Some(c) = PRODUCT_VERSION.captures(value) {
            products.push((c[1].to_string(), c[2].to_string()));
        } else if value.len() < 50 {
            products.push((value.clone(), String::new()));
        }
    }
    products.dedup();
    products
}

fn record_cves(
    state: &mut ScanState,
    findings: &FindingStore,
    data: &Value,
    product: &str,
    version: &str,
) {
    let Some(items) = data.get("vulnerabilities").and_then(|v| v.as_array()) else {
        return;
    };
    for item in items {
        let cve = item.get("cve").cloned().unwrap_or(Value::Null);
        let Some(cve_id) = cve.get("id").and_then(|v| v.as_str()) else { continue };

        let Some(score) = base_score(&cve) else { continue };
        if score < 7.0 {
            continue;
        }
        let severity = if score >= 9.0 { Severity::Critical } else { Severity::High };

        let description = cve
            .get("descriptions")
            .and_then(|d| d.as_array())
            .and_then(|descs| {
                descs.iter().find_map(|d| {
                    (d.get("lang").and_then(|l| l.as_str()) == Some("en"))
                        .then(|| d.get("value").and_then(|v| v.as_str()))
                        .flatten()
                })
            })
            .unwrap_or("");

        findings.add(
            severity,
            "CVE",
            format!("{} affects {} {}", cve_id, product, version),
            format!("CVSS {}: {}", score, utils::truncate_chars(description, 200)),
            &format!("Update {} to a patched version.", product),
        );
        state.cve_data.push(CveEntry {
            cve_id: cve_id.to_string(),
            product: product.to_string(),
            version: version.to_string(),
            cvss_score: score.to_string(),
            severity: severity.to_string(),
            description: utils::truncate_chars(description, 300),
        });
    }
}

/// CVSS v3.1, then v3.0, then v2: first metric list that exists wins.
fn base_score(cve: &Value) -> Option<f64> {
    let metrics = cve.get("metrics")?;
    for key in ["cvssMetricV31", "cvssMetricV30", "cvssMetricV2"] {
        if let Some(list) = metrics.get(key).and_then(|v| v.as_array()) {
            if let Some(score) = list
                .first()
                .and_then(|m| m.get("cvssData"))
                .and_then(|d| d.get("baseScore"))
                .and_then(|s| s.as_f64())
            {
                return Some(score);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_version_extraction() {
        let mut state = ScanState::new("https://example.com").unwrap();
        state.tech_stack.insert("web_server".into(), "nginx/1.18.0".into());
        state.tech_stack.insert("language".into(), "PHP (PHP/5.6.24)".into());
        let products = extract_products(&state);
        assert!(products.contains(&("PHP".to_string(), "5.6.24".to_string())));
        assert!(products.contains(&("nginx".to_string(), "1.18.0".to_string())));
    }

    #[test]
    fn cvss_fallback_chain_prefers_v31() {
        let cve: Value = serde_json::from_str(
            r#"{"metrics":{
                "cvssMetricV2":[{"cvssData":{"baseScore":5.0}}],
                "cvssMetricV31":[{"cvssData":{"baseScore":9.8}}]
            }}"#,
        )
        .unwrap();
        assert_eq!(base_score(&cve), Some(9.8));
    }

    #[test]
    fn missing_metrics_yield_no_score() {
        let cve: Value = serde_json::from_str(r#"{"metrics":{}}"#).unwrap();
        assert_eq!(base_score(&cve), None);
    }
}
