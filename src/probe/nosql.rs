use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::{NOSQL_ERRORS, NOSQL_QS_PAYLOADS};
use crate::state::{Form, ScanState};
use ahash::AHashSet;
use serde_json::{json, Map, Value};

const URL_BUDGET: usize = 10;

/// NoSQL operator injection. Login forms get JSON bodies with Mongo operators
/// in place of credentials; crawled URLs get bracket-notation parameters.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    let operator_payloads: [Value; 3] = [
        json!({"$gt": ""}),
        json!({"$ne": "invalid_xyz"}),
        json!({"$regex": ".*"}),
    ];

    'forms: for form in state.forms.iter().filter(|f| f.has_password_field()) {
        // The baseline decides what a failed login looks like.
        let baseline = json_body(form, None, None);
        let Ok(resp) = http.bare().post(form.action.clone()).json(&baseline).send().await
        else {
            continue;
        };
        let baseline_redirects = resp.status().is_redirection();

        let mut error_reported = false;
        for field in &form.fields {
            if field.kind.is_inert() {
                continue;
            }
            for payload in &operator_payloads {
                let body = json_body(form, Some(&field.name), Some(payload.clone()));
                let Ok(resp) = http.bare().post(form.action.clone()).json(&body).send().await
                else {
                    continue;
                };
                let status = resp.status().as_u16();

                if matches!(status, 302 | 303) && !baseline_redirects {
                    findings.add(
                        Severity::Critical,
                        "NoSQL Injection",
                        format!("Authentication bypass via operator in '{}'", field.name),
                        format!(
                            "URL: {}\nPayload: {}\nLogin redirected ({}) where the baseline did not.",
                            form.action, payload, status
                        ),
                        "Reject operator objects in user input. Validate types before querying.",
                    );
                    continue 'forms;
                }

                let Ok(text) = resp.text().await else { continue };
                if !error_reported {
                    if let Some(pattern) = matches_nosql_error(&text) {
                        findings.add(
                            Severity::High,
                            "NoSQL Injection",
                            format!("NoSQL error disclosure via '{}'", field.name),
                            format!(
                                "URL: {}\nPayload: {}\nDriver error pattern: '{}'",
                                form.action, payload, pattern
                            ),
                            "Do not expose database driver errors. Validate input types.",
                        );
                        error_reported = true;
                    }
                }
            }
        }
    }

    // Query-string leg: bracket-notation operators on crawled URLs.
    let mut seen: AHashSet<String> = AHashSet::new();
    for page in state.urls_with_query().into_iter().take(URL_BUDGET) {
        let Some(param) = page.query_pairs().next().map(|(k, _)| k.into_owned()) else {
            continue;
        };
        for (operator, value) in NOSQL_QS_PAYLOADS {
            let test_url = format!("{}&{}{}={}", page, param, operator, value);
            let Ok(resp) = http.get_with_timeout(&test_url, 8).await else { continue };
            let Ok(body) = resp.text().await else { continue };

            if let Some(pattern) = matches_nosql_error(&body) {
                if seen.insert(page.to_string()) {
                    findings.add(
                        Severity::High,
                        "NoSQL Injection",
                        format!("NoSQL error via query operator '{}{}'", param, operator),
                        format!("URL: {}\nDriver error pattern: '{}'", page, pattern),
                        "Reject operator keys in query parameters.",
                    );
                }
                break;
            }
        }
    }
}

/// JSON login body; `inject` replaces one field with an operator object.
fn json_body(form: &Form, inject: Option<&str>, payload: Option<Value>) -> Value {
    let mut map = Map::new();
    for field in &form.fields {
        let value = match (inject, &payload) {
            (Some(name), Some(payload)) if field.name == name => payload.clone(),
            _ if field.value.is_empty() => Value::String("invalid_xyz".into()),
            _ => Value::String(field.value.clone()),
        };
        map.insert(field.name.clone(), value);
    }
    Value::Object(map)
}

pub fn matches_nosql_error(body: &str) -> Option<&'static str> {
    let lower = body.to_lowercase();
    NOSQL_ERRORS.iter().find(|e| lower.contains(*e)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FieldKind, FormField, FormMethod};
    use url::Url;

    fn login_form() -> Form {
        Form {
            action: Url::parse("https://example.com/login").unwrap(),
            method: FormMethod::Post,
            fields: vec![
                FormField { name: "user".into(), kind: FieldKind::Text, value: String::new() },
                FormField { name: "pass".into(), kind: FieldKind::Password, value: String::new() },
            ],
            page_url: "https://example.com/".into(),
        }
    }

    #[test]
    fn operator_lands_in_the_injected_field_only() {
        let form = login_form();
        let body = json_body(&form, Some("pass"), Some(json!({"$ne": "invalid_xyz"})));
        assert_eq!(body["user"], "invalid_xyz");
        assert_eq!(body["pass"]["$ne"], "invalid_xyz");
    }

    #[test]
    fn driver_errors_are_recognized() {
        assert_eq!(
            matches_nosql_error("CastError: Cast to ObjectId failed"),
            Some("objectid")
        );
        assert_eq!(matches_nosql_error("MongoDB server error"), Some("mongodb"));
        assert_eq!(matches_nosql_error("all good"), None);
    }
}
