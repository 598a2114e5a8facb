use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::{CDN_LABEL_TOKENS, S3_SUFFIXES};
use crate::state::ScanState;
use crate::utils;
use ahash::AHashSet;

/// Bucket-name candidates derived from the apex domain and CDN-ish subdomain
/// labels, probed in both S3 URL styles. A 403 means the bucket exists but is
/// closed; an open listing is the real problem.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    let apex = utils::apex_domain(&state.host);
    let candidates = derive_candidates(&apex, state);
    tracing::info!("testing {} bucket candidates", candidates.len());

    for bucket in candidates {
        for url in [
            format!("https://{}.s3.amazonaws.com/", bucket),
            format!("https://s3.amazonaws.com/{}/", bucket),
        ] {
            let Ok(resp) = http.get_with_timeout(&url, 8).await else { continue };
            let status = resp.status().as_u16();
            match status {
                200 => {
                    let body = resp.text().await.unwrap_or_default();
                    if body.contains("ListBucketResult") {
                        findings.add(
                            Severity::Critical,
                            "S3 Bucket Exposure",
                            format!("Publicly listable S3 bucket: {}", bucket),
                            format!("URL: {} returns a bucket listing.", url),
                            "Disable public bucket listing and audit the bucket policy.",
                        );
                        break;
                    }
                }
                403 => {
                    findings.add(
                        Severity::Info,
                        "S3 Bucket Exposure",
                        format!("S3 bucket exists: {}", bucket),
                        format!("URL: {} returned 403 (bucket exists, access denied).", url),
                        "Confirm the bucket is intentionally private and owned by you.",
                    );
                    break;
                }
                _ => {}
            }
        }
    }
}

fn derive_candidates(apex: &str, state: &ScanState) -> Vec<String> {
    let base_label = apex.split('.').next().unwrap_or(apex).to_string();
    let mut candidates = vec![base_label.clone(), apex.replace('.', "-")];
    for suffix in S3_SUFFIXES {
        candidates.push(format!("{}{}", base_label, suffix));
    }
    for entry in &state.subdomains {
        let Some(label) = entry.subdomain.split('.').next() else { continue };
        if CDN_LABEL_TOKENS.iter().any(|t| label.contains(t)) {
            candidates.push(format!("{}-{}", base_label, label));
            candidates.push(label.to_string());
        }
    }

    let mut seen = AHashSet::new();
    candidates.retain(|c| !c.is_empty() && seen.insert(c.clone()));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SubdomainEntry;

    #[test]
    fn candidates_cover_label_dashes_and_suffixes() {
        let state = ScanState::new("https://www.tupisa.com.py").unwrap();
        let candidates = derive_candidates("tupisa.com.py", &state);
        assert!(candidates.contains(&"tupisa".to_string()));
        assert!(candidates.contains(&"tupisa-com-py".to_string()));
        assert!(candidates.contains(&"tupisa-static".to_string()));
        assert!(candidates.contains(&"tupisa-backup".to_string()));
    }

    #[test]
    fn cdn_like_subdomain_labels_become_candidates() {
        let mut state = ScanState::new("https://example.com").unwrap();
        state.subdomains.push(SubdomainEntry {
            subdomain: "cdn.example.com".into(),
            ip: "1.2.3.4".into(),
            status: 200,
            takeover_risk: false,
        });
        state.subdomains.push(SubdomainEntry {
            subdomain: "mail.example.com".into(),
            ip: "1.2.3.4".into(),
            status: 0,
            takeover_risk: false,
        });
        let candidates = derive_candidates("example.com", &state);
        assert!(candidates.contains(&"cdn".to_string()));
        assert!(candidates.contains(&"example-cdn".to_string()));
        assert!(!candidates.contains(&"mail".to_string()));
    }

    #[test]
    fn candidates_are_deduplicated() {
        let state = ScanState::new("https://example.com").unwrap();
        let candidates = derive_candidates("example.com", &state);
        let unique: AHashSet<&String> = candidates.iter().collect();
        assert_eq!(unique.len(), candidates.len());
    }
}
