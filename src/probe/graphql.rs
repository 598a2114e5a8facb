use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::GRAPHQL_PATHS;
use crate::state::ScanState;
use serde_json::{json, Value};

/// GraphQL exposure across common endpoint paths: introspection, batch
/// acceptance, and field-suggestion leakage. The first live endpoint is
/// examined and the probe stops.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    for path in GRAPHQL_PATHS {
        let url = format!("{}/{}", state.base_url.trim_end_matches('/'), path);
        let introspection = json!({"query": "{ __schema { types { name } } }"});

        let Ok(resp) = http.post_json(&url, &introspection).await else { continue };
        let Ok(body) = resp.json::<Value>().await else { continue };

        let is_graphql = body.get("data").is_some() || body.get("errors").is_some();
        if !is_graphql {
            continue;
        }
        tracing::info!("GraphQL endpoint found: {}", url);

        if has_introspection(&body) {
            findings.add(
                Severity::Medium,
                "GraphQL",
                "GraphQL introspection enabled",
                format!("Endpoint {} exposes the full schema via introspection.", url),
                "Disable introspection in production.",
            );
        }

        let batch = json!([
            {"query": "{ __typename }"},
            {"query": "{ __typename }"},
            {"query": "{ __typename }"},
        ]);
        if let Ok(resp) = http.post_json(&url, &batch).await {
            if resp.status().is_success() {
                if let Ok(v) = resp.json::<Value>().await {
                    if v.is_array() {
                        findings.add(
                            Severity::Low,
                            "GraphQL",
                            "Batch queries accepted",
                            format!("Endpoint {} processes arrays of queries in one request.", url),
                            "Limit or disable query batching to reduce brute-force amplification.",
                        );
                    }
                }
            }
        }

        let typo = json!({"query": "{ __schem { types { name } } }"});
        if let Ok(resp) = http.post_json(&url, &typo).await {
            if let Ok(text) = resp.text().await {
                if text.to_lowercase().contains("did you mean") {
                    findings.add(
                        Severity::Low,
                        "GraphQL",
                        "Field suggestions enabled",
                        format!("Endpoint {} suggests schema fields in error messages.", url),
                        "Disable field suggestions so the schema cannot be reconstructed from errors.",
                    );
                }
            }
        }

        break;
    }
}

pub fn has_introspection(body: &Value) -> bool {
    body.pointer("/data/__schema/types").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn introspection_oracle_needs_schema_types() {
        let positive: Value =
            serde_json::from_str(r#"{"data":{"__schema":{"types":[{"name":"User"}]}}}"#).unwrap();
        assert!(has_introspection(&positive));

        let negative: Value =
            serde_json::from_str(r#"{"errors":[{"message":"introspection disabled"}]}"#).unwrap();
        assert!(!has_introspection(&negative));
    }
}
