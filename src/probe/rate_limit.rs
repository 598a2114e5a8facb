use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::AUTH_PATH_HINTS;
use crate::state::ScanState;
use ahash::AHashSet;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};

const ENDPOINT_BUDGET: usize = 3;
const BURST_SIZE: usize = 15;
const BURST_CONCURRENCY: usize = 10;

/// Rate-limit testing on authentication-adjacent endpoints: a deliberate
/// burst of 15 requests; zero 429s means the endpoint can be hammered.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    let endpoints = auth_endpoints(state);
    if endpoints.is_empty() {
        tracing::info!("no auth-like endpoints to test");
        return;
    }

    for endpoint in endpoints {
        let status_counts: DashMap<u16, u32> = DashMap::new();

        stream::iter(0..BURST_SIZE)
            .map(|_| {
                let client = http.client().clone();
                let url = endpoint.clone();
                let counts = &status_counts;
                async move {
                    if let Ok(resp) = client.get(&url).send().await {
                        *counts.entry(resp.status().as_u16()).or_insert(0) += 1;
                    }
                }
            })
            .buffer_unordered(BURST_CONCURRENCY)
            .collect::<Vec<()>>()
            .await;

        let throttled = status_counts.get(&429).map(|c| *c).unwrap_or(0);
        let denied: u32 = status_counts
            .iter()
            .filter(|e| matches!(*e.key(), 401 | 403))
            .map(|e| *e.value())
            .sum();
        if denied > 0 {
            // 401/403 escalation is noted but does not stand in for a 429.
            tracing::debug!("{} auth denials during burst against {}", denied, endpoint);
        }

        if throttled == 0 {
            findings.add(
                Severity::Medium,
                "Rate Limiting",
                "No rate limiting detected",
                format!(
                    "Sent {} rapid requests to {} without a single HTTP 429.",
                    BURST_SIZE, endpoint
                ),
                "Apply rate limiting to authentication and API endpoints.",
            );
        } else {
            tracing::info!("rate limit hit on {} ({} x 429)", endpoint, throttled);
        }
    }
}

/// Login forms and URLs whose path smells like authentication, first 3.
fn auth_endpoints(state: &ScanState) -> Vec<String> {
    let mut seen = AHashSet::new();
    let mut endpoints = Vec::new();

    for form in &state.forms {
        if form.has_password_field() {
            let url = form.action.to_string();
            if seen.insert(url.clone()) {
                endpoints.push(url);
            }
        }
    }
    for url in &state.discovered_urls {
        if AUTH_PATH_HINTS.iter().any(|hint| url.contains(hint)) && seen.insert(url.clone()) {
            endpoints.push(url.clone());
        }
    }

    endpoints.truncate(ENDPOINT_BUDGET);
    endpoints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FieldKind, Form, FormField, FormMethod};
    use url::Url;

    #[test]
    fn endpoint_budget_is_enforced() {
        let mut state = ScanState::new("https://example.com").unwrap();
        for path in ["/login", "/auth", "/api/users", "/signin", "/token/refresh"] {
            state
                .discovered_urls
                .insert(format!("https://example.com{}", path));
        }
        let endpoints = auth_endpoints(&state);
        assert_eq!(endpoints.len(), ENDPOINT_BUDGET);
    }

    #[test]
    fn password_forms_come_first() {
        let mut state = ScanState::new("https://example.com").unwrap();
        state.discovered_urls.insert("https://example.com/login".into());
        state.forms.push(Form {
            action: Url::parse("https://example.com/session").unwrap(),
            method: FormMethod::Post,
            fields: vec![FormField {
                name: "pass".into(),
                kind: FieldKind::Password,
                value: String::new(),
            }],
            page_url: "https://example.com/".into(),
        });
        let endpoints = auth_endpoints(&state);
        assert_eq!(endpoints[0], "https://example.com/session");
    }
}
