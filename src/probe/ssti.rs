use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::SSTI_PAYLOADS;
use crate::state::{FieldKind, ScanState};
use crate::utils;

const URL_BUDGET: usize = 15;

/// Server-side template injection: each payload evaluates to a known value
/// under some template engine; seeing the value means the input was rendered.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    for form in &state.forms {
        for field in &form.fields {
            if field.kind.is_inert() || field.kind == FieldKind::Password {
                continue;
            }
            for (payload, expected) in SSTI_PAYLOADS {
                let data = form.test_values(&field.name, payload);
                let Ok(resp) = super::submit_form(http, form, &data, None).await else {
                    continue;
                };
                let Ok(body) = resp.text().await else { continue };

                if body.contains(expected) {
                    emit(
                        findings,
                        payload,
                        expected,
                        &format!("field '{}' at {}", field.name, form.action),
                    );
                    break;
                }
            }
        }
    }

    for page in state.urls_with_query().into_iter().take(URL_BUDGET) {
        let params: Vec<String> = page.query_pairs().map(|(k, _)| k.into_owned()).collect();
        for param in params {
            for (payload, expected) in SSTI_PAYLOADS {
                let test_url = utils::with_query_param(&page, &param, payload);
                let Ok(resp) = http.get(test_url.as_str()).await else { continue };
                let Ok(body) = resp.text().await else { continue };

                if body.contains(expected) {
                    emit(
                        findings,
                        payload,
                        expected,
                        &format!("param '{}' at {}", param, page),
                    );
                    break;
                }
            }
        }
    }
}

fn emit(findings: &FindingStore, payload: &str, expected: &str, context: &str) {
    findings.add(
        Severity::Critical,
        "SSTI",
        format!("Server-Side Template Injection - {}", context),
        format!(
            "Payload: {}\nResult '{}' found in response. RCE may be possible.",
            payload, expected
        ),
        "Never render user input through template engines. Use safe rendering or sandboxing.",
    );
}
