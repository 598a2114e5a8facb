use crate::discover::crawler;
use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::state::{BrokenLink, ScanState};
use ahash::AHashSet;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use url::Url;

const PAGE_BUDGET: usize = 10;
const DOMAIN_BUDGET: usize = 30;

/// Broken-link hijacking: external references that 404 are link rot; external
/// references whose domain no longer resolves can be registered by anyone.
pub async fn run(state: &mut ScanState, http: &HttpClient, findings: &FindingStore) {
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

    let mut pages = vec![state.target.clone()];
    pages.extend(state.discovered_urls.iter().take(PAGE_BUDGET).cloned());
    pages.dedup();

    // One representative link per external domain.
    let mut by_domain: Vec<(String, Url)> = Vec::new();
    let mut seen_domains: AHashSet<String> = AHashSet::new();
    for page in pages {
        let Ok(page_url) = Url::parse(&page) else { continue };
        let Ok(resp) = http.get(&page).await else { continue };
        let Ok(body) = resp.text().await else { continue };
        for link in crawler::extract_links(&body, &page_url) {
            let Some(host) = link.host_str() else { continue };
            if host == state.host {
                continue;
            }
            if seen_domains.insert(host.to_string()) {
                by_domain.push((host.to_string(), link));
            }
            if by_domain.len() >= DOMAIN_BUDGET {
                break;
            }
        }
        if by_domain.len() >= DOMAIN_BUDGET {
            break;
        }
    }

    let mut hits = Vec::new();
    for (domain, link) in by_domain {
        match http.get_with_timeout(link.as_str(), 8).await {
            Ok(resp) if matches!(resp.status().as_u16(), 404 | 410) => {
                if resolves(&resolver, &domain).await {
                    findings.add(
                        Severity::Low,
                        "Broken Link",
                        format!("Dead external link: {}", domain),
                        format!("Link: {} returned {}.", link, resp.status().as_u16()),
                        "Remove or update dead external references.",
                    );
                    hits.push(BrokenLink {
                        url: link.to_string(),
                        domain,
                        reason: "dead link".into(),
                    });
                } else {
                    emit_registerable(findings, &mut hits, &link, domain);
                }
            }
            Ok(_) => {}
            Err(_) => {
                if !resolves(&resolver, &domain).await {
                    emit_registerable(findings, &mut hits, &link, domain);
                }
            }
        }
    }

    state.broken_links.extend(hits);
}

fn emit_registerable(
    findings: &FindingStore,
    hits: &mut Vec<BrokenLink>,
    link: &Url,
    domain: String,
) {
    findings.add(
        Severity::Medium,
        "Broken Link Hijacking",
        format!("Unresolvable external domain: {}", domain),
        format!(
            "Link: {} points at a domain that no longer resolves and may be registerable.",
            link
        ),
        "Remove the reference or register the domain before someone else does.",
    );
    hits.push(BrokenLink {
        url: link.to_string(),
        domain,
        reason: "domain does not resolve".into(),
    });
}

async fn resolves(resolver: &TokioAsyncResolver, domain: &str) -> bool {
    resolver
        .lookup_ip(format!("{}.", domain))
        .await
        .map(|l| l.iter().next().is_some())
        .unwrap_or(false)
}
