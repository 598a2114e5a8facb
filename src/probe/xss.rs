use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::XSS_PAYLOADS;
use crate::state::ScanState;

const PAYLOAD_BUDGET: usize = 3;

/// Reflected XSS against form fields. A field is vulnerable when the literal
/// payload comes back unencoded; an HTML-escaped echo is only noted in logs.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    if state.forms.is_empty() {
        tracing::info!("no forms to test");
        return;
    }

    for form in &state.forms {
        for field in &form.fields {
            if field.kind.is_inert() {
                continue;
            }
            for payload in &XSS_PAYLOADS[..PAYLOAD_BUDGET] {
                let data = form.test_values(&field.name, payload);
                let Ok(resp) = super::submit_form(http, form, &data, None).await else {
                    continue;
                };
                let Ok(body) = resp.text().await else { continue };

                if body.contains(payload) {
                    findings.add(
                        Severity::High,
                        "XSS",
                        format!("Reflected XSS in field '{}'", field.name),
                        format!("Payload reflected without encoding: {}", payload),
                        "Sanitize and encode all user inputs before rendering.",
                    );
                    break;
                }
                if body.contains(html_escape::encode_text(payload).as_ref()) {
                    tracing::debug!(
                        "payload reflected HTML-encoded in '{}', output encoding in place",
                        field.name
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_budget_is_three() {
        assert_eq!(PAYLOAD_BUDGET, 3);
        assert!(PAYLOAD_BUDGET <= XSS_PAYLOADS.len());
    }

    #[test]
    fn encoded_reflection_differs_from_raw() {
        let payload = XSS_PAYLOADS[0];
        let encoded = html_escape::encode_text(payload);
        assert_ne!(payload, encoded.as_ref());
        assert!(encoded.contains("&lt;script&gt;"));
    }
}
