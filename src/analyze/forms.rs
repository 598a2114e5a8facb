use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::state::{FieldKind, Form, FormField, FormMethod, ScanState};
use scraper::{ElementRef, Html, Selector};
use url::Url;

const CSRF_NAME_HINTS: &[&str] = &["csrf", "token", "_token", "nonce", "authenticity"];

struct RawField {
    name: String,
    kind: String,
    value: String,
    autocomplete: String,
}

struct RawForm {
    action: String,
    method: String,
    autocomplete: String,
    fields: Vec<RawField>,
}

/// Form discovery and audit. Consumes the header phase's body when available.
pub async fn run(
    state: &mut ScanState,
    http: &HttpClient,
    findings: &FindingStore,
    page_body: Option<String>,
) {
    let body = match page_body {
        Some(body) => body,
        None => match http.get(&state.target).await {
            Ok(resp) => match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!("form scan failed reading body: {}", e);
                    return;
                }
            },
            Err(e) => {
                tracing::warn!("form scan failed: {}", e);
                return;
            }
        },
    };

    let raw_forms = extract_forms(&body);
    if raw_forms.is_empty() {
        tracing::info!("no forms found on this page");
        return;
    }

    let page_url = state.target.clone();
    for (i, raw) in raw_forms.iter().enumerate() {
        audit_form(findings, i, raw);

        // Resolve the action against the page before storing; every stored
        // form has an absolute action.
        let action = if raw.action.is_empty() {
            state.target_url.clone()
        } else {
            match state.target_url.join(&raw.action) {
                Ok(url) => url,
                Err(_) => continue,
            }
        };

        let fields = raw
            .fields
            .iter()
            .map(|f| FormField {
                name: f.name.clone(),
                kind: FieldKind::from_attr(&f.kind),
                value: f.value.clone(),
            })
            .collect();

        state.forms.push(Form {
            action,
            method: FormMethod::from_attr(&raw.method),
            fields,
            page_url: page_url.clone(),
        });
    }
    tracing::info!("discovered {} forms", state.forms.len());
}

fn audit_form(findings: &FindingStore, index: usize, raw: &RawForm) {
    let has_csrf = raw.fields.iter().any(|f| {
        f.kind.eq_ignore_ascii_case("hidden")
            && CSRF_NAME_HINTS
                .iter()
                .any(|hint| f.name.to_lowercase().contains(hint))
    });
    if !has_csrf {
        findings.add(
            Severity::High,
            "CSRF",
            "No CSRF token detected",
            format!(
                "Form #{} (action='{}') has no CSRF protection.",
                index + 1,
                raw.action
            ),
            "Implement CSRF tokens in all forms.",
        );
    }

    let password_fields: Vec<&RawField> = raw
        .fields
        .iter()
        .filter(|f| f.kind.eq_ignore_ascii_case("password"))
        .collect();

    for field in &password_fields {
        if field.autocomplete != "off" && raw.autocomplete != "off" {
            findings.add(
                Severity::Low,
                "Form Security",
                "Password autocomplete enabled",
                format!(
                    "Form #{} has password field without autocomplete='off'.",
                    index + 1
                ),
                "Set autocomplete='off' on password fields.",
            );
        }
    }

    if raw.method.eq_ignore_ascii_case("get") && !password_fields.is_empty() {
        findings.add(
            Severity::High,
            "Form Security",
            "Login form uses GET method",
            "Credentials may appear in URL, browser history, and server logs.",
            "Change the form method to POST.",
        );
    }

    if raw.action.starts_with("http:") {
        findings.add(
            Severity::High,
            "Form Security",
            "Form submits over HTTP",
            format!("Form action '{}' uses unencrypted HTTP.", raw.action),
            "Change form action to HTTPS.",
        );
    }
}

fn extract_forms(html: &str) -> Vec<RawForm> {
    let doc = Html::parse_document(html);
    let form_sel = Selector::parse("form").unwrap();
    let field_sel = Selector::parse("input, textarea, select").unwrap();

    doc.select(&form_sel)
        .map(|form| {
            let fields = form.select(&field_sel).filter_map(raw_field).collect();
            RawForm {
                action: form.value().attr("action").unwrap_or("").to_string(),
                method: form.value().attr("method").unwrap_or("GET").to_string(),
                autocomplete: form.value().attr("autocomplete").unwrap_or("").to_string(),
                fields,
            }
        })
        .collect()
}

fn raw_field(el: ElementRef) -> Option<RawField> {
    let tag = el.value().name();
    let name = el
        .value()
        .attr("name")
        .or_else(|| el.value().attr("id"))?
        .to_string();
    if name.is_empty() {
        return None;
    }
    let kind = match tag {
        "textarea" => "textarea".to_string(),
        "select" => "select".to_string(),
        _ => el.value().attr("type").unwrap_or("text").to_string(),
    };
    Some(RawField {
        name,
        kind,
        value: el.value().attr("value").unwrap_or("").to_string(),
        autocomplete: el.value().attr("autocomplete").unwrap_or("").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"<html><body>
        <form action="/login" method="POST">
            <input type="text" name="user">
            <input type="password" name="pass">
            <input type="submit" name="go" value="Login">
        </form>
    </body></html>"#;

    #[test]
    fn extracts_fields_in_document_order() {
        let forms = extract_forms(LOGIN_PAGE);
        assert_eq!(forms.len(), 1);
        let names: Vec<&str> = forms[0].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["user", "pass", "go"]);
        assert_eq!(forms[0].method, "POST");
    }

    #[test]
    fn csrf_hidden_field_is_recognized() {
        let html = r#"<form action="/x" method="post">
            <input type="hidden" name="csrf_token" value="abc">
            <input type="text" name="q">
        </form>"#;
        let forms = extract_forms(html);
        let findings = FindingStore::new();
        audit_form(&findings, 0, &forms[0]);
        assert!(findings.all().iter().all(|f| f.category != "CSRF"));
    }

    #[test]
    fn missing_csrf_token_is_flagged_high() {
        let forms = extract_forms(LOGIN_PAGE);
        let findings = FindingStore::new();
        audit_form(&findings, 0, &forms[0]);
        let all = findings.all();
        let csrf = all.iter().find(|f| f.category == "CSRF").unwrap();
        assert_eq!(csrf.severity, Severity::High);
        assert_eq!(csrf.title, "No CSRF token detected");
    }

    #[test]
    fn get_login_form_is_flagged() {
        let html = r#"<form action="/login" method="GET">
            <input type="password" name="p">
        </form>"#;
        let forms = extract_forms(html);
        let findings = FindingStore::new();
        audit_form(&findings, 0, &forms[0]);
        assert!(findings
            .all()
            .iter()
            .any(|f| f.title == "Login form uses GET method"));
    }
}
