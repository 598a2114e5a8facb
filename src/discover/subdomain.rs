use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::{SUBDOMAIN_WORDLIST, TAKEOVER_SIGNATURES};
use crate::state::{ScanState, SubdomainEntry};
use crate::utils;
use ahash::AHashSet;
use futures::stream::{self, StreamExt};
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;
use rand::distributions::Alphanumeric;
use rand::Rng;
use smallvec::SmallVec;

/// DNS lookups run in parallel; finding emission stays in wordlist order.
const RESOLVE_CONCURRENCY: usize = 16;

type IpSet = SmallVec<[String; 4]>;

/// Wordlist enumeration under the ccSLD-aware apex with wildcard-DNS
/// filtering and CNAME-based takeover detection.
pub async fn run(state: &mut ScanState, http: &HttpClient, findings: &FindingStore) {
    let apex = utils::apex_domain(&state.host);
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

    let wildcard_ips = detect_wildcard(&resolver, &apex).await;
    if !wildcard_ips.is_empty() {
        tracing::info!(
            "wildcard DNS detected for *.{} ({} IPs), filtering candidates",
            apex,
            wildcard_ips.len()
        );
    }

    tracing::info!("testing {} candidates for {}", SUBDOMAIN_WORDLIST.len(), apex);

    let resolved: Vec<(String, IpSet)> = stream::iter(SUBDOMAIN_WORDLIST)
        .map(|sub| {
            let fqdn = format!("{}.{}", sub, apex);
            let resolver = resolver.clone();
            async move {
                let ips = resolve_a(&resolver, &fqdn).await;
                (fqdn, ips)
            }
        })
        .buffered(RESOLVE_CONCURRENCY)
        .collect()
        .await;

    for (fqdn, ips) in resolved {
        if ips.is_empty() {
            continue;
        }
        if is_wildcard_artifact(&ips, &wildcard_ips) {
            tracing::debug!("{} matches the wildcard answer, skipped", fqdn);
            continue;
        }

        let (status, body) = fetch_over_either_scheme(http, &fqdn).await;
        let cname = resolve_cname(&resolver, &fqdn).await;

        let takeover = match_takeover(cname.as_deref(), &body);
        if let Some((service, pattern)) = takeover {
            let detail = match &cname {
                Some(cname) => format!(
                    "CNAME -> {}\nUnclaimed service pattern: '{}'",
                    cname, pattern
                ),
                None => format!("Pattern '{}' found in HTTP response.", pattern),
            };
            findings.add(
                Severity::Critical,
                "Subdomain Takeover",
                format!("Subdomain takeover risk: {}", fqdn),
                detail,
                &format!("Claim the {} resource or remove the DNS record.", service),
            );
        }

        let ip = ips.first().cloned().unwrap_or_default();
        findings.add(
            Severity::Info,
            "Subdomain Discovery",
            format!("Subdomain found: {}", fqdn),
            format!("IP: {}, HTTP Status: {}", ip, status),
            "Review all discovered subdomains for unnecessary exposure.",
        );
        state.subdomains.push(SubdomainEntry {
            subdomain: fqdn,
            ip,
            status,
            takeover_risk: takeover.is_some(),
        });
    }

    tracing::info!("discovered {} subdomains", state.subdomains.len());
}

/// Resolve two random labels under the apex; any answer means a wildcard
/// record. Candidates whose A-set falls inside the wildcard set are artifacts.
async fn detect_wildcard(resolver: &TokioAsyncResolver, apex: &str) -> AHashSet<String> {
    let mut ips = AHashSet::new();
    for _ in 0..2 {
        let label: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect::<String>()
            .to_lowercase();
        for ip in resolve_a(resolver, &format!("{}.{}", label, apex)).await {
            ips.insert(ip);
        }
    }
    ips
}

fn is_wildcard_artifact(candidate_ips: &IpSet, wildcard_ips: &AHashSet<String>) -> bool {
    !wildcard_ips.is_empty() && candidate_ips.iter().all(|ip| wildcard_ips.contains(ip))
}

async fn resolve_a(resolver: &TokioAsyncResolver, fqdn: &str) -> IpSet {
    match resolver.ipv4_lookup(format!("{}.", fqdn)).await {
        Ok(lookup) => lookup.iter().map(|a| a.0.to_string()).collect(),
        Err(_) => IpSet::new(),
    }
}

async fn resolve_cname(resolver: &TokioAsyncResolver, fqdn: &str) -> Option<String> {
    let lookup = resolver
        .lookup(format!("{}.", fqdn), RecordType::CNAME)
        .await
        .ok()?;
    lookup.iter().find_map(|r| match r {
        RData::CNAME(cname) => Some(cname.0.to_string().to_lowercase()),
        _ => None,
    })
}

/// HTTPS first, HTTP as fallback. Returns (status, lowercased body); 0 when
/// neither scheme answered.
async fn fetch_over_either_scheme(http: &HttpClient, fqdn: &str) -> (u16, String) {
    for scheme in ["https", "http"] {
        let url = format!("{}://{}", scheme, fqdn);
        match http.get_with_timeout(&url, 5).await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default().to_lowercase();
                return (status, body);
            }
            Err(e) => {
                tracing::debug!("{} unreachable over {}: {}", fqdn, scheme, e);
            }
        }
    }
    (0, String::new())
}

/// Takeover when a CNAME points at a known service and the body carries its
/// unclaimed-resource banner; without a CNAME the body alone decides.
fn match_takeover(cname: Option<&str>, body: &str) -> Option<(&'static str, &'static str)> {
    match cname {
        Some(cname) => TAKEOVER_SIGNATURES
            .iter()
            .find(|(service, pattern)| cname.contains(service) && body.contains(pattern))
            .copied(),
        None => TAKEOVER_SIGNATURES
            .iter()
            .find(|(_, pattern)| !body.is_empty() && body.contains(pattern))
            .copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipset(ips: &[&str]) -> IpSet {
        ips.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn wildcard_subset_is_filtered() {
        let wildcard: AHashSet<String> = ["1.2.3.4".to_string()].into_iter().collect();
        assert!(is_wildcard_artifact(&ipset(&["1.2.3.4"]), &wildcard));
        assert!(!is_wildcard_artifact(&ipset(&["5.6.7.8"]), &wildcard));
        // Mixed answers are real records.
        assert!(!is_wildcard_artifact(&ipset(&["1.2.3.4", "5.6.7.8"]), &wildcard));
    }

    #[test]
    fn no_wildcard_means_no_filtering() {
        let empty = AHashSet::new();
        assert!(!is_wildcard_artifact(&ipset(&["1.2.3.4"]), &empty));
    }

    #[test]
    fn takeover_requires_both_cname_and_pattern() {
        let body = "404: there isn't a github pages site here";
        assert_eq!(
            match_takeover(Some("pages.github.io."), body),
            Some(("github.io", "there isn't a github pages site here"))
        );
        assert_eq!(match_takeover(Some("pages.github.io."), "welcome"), None);
        assert_eq!(match_takeover(Some("other.example.net."), body), None);
    }

    #[test]
    fn takeover_without_cname_matches_body_directly() {
        assert!(match_takeover(None, "error: no such app").is_some());
        assert!(match_takeover(None, "").is_none());
    }
}
