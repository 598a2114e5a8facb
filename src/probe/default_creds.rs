use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::{ADMIN_PANEL_PATHS, DEFAULT_CREDENTIALS};
use crate::state::{FieldKind, FormMethod, ScanState};
use reqwest::StatusCode;
use scraper::{Html, Selector};
use url::Url;

const BASELINE_USER: &str = "invalid_user_xyz";
const BASELINE_PASS: &str = "invalid_pass_xyz";

struct LoginPanel {
    action: Url,
    method: FormMethod,
    user_field: Option<String>,
    pass_field: String,
    hidden: Vec<(String, String)>,
}

struct LoginOutcome {
    status: StatusCode,
    body_len: usize,
}

/// Default-credential testing against discovered admin panels. A deliberately
/// invalid login sets the baseline; acceptance shows up as a fresh redirect
/// or a materially different page.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    for path in ADMIN_PANEL_PATHS {
        let url = format!("{}/{}", state.base_url, path);
        let Ok(resp) = http.get_with_timeout(&url, 8).await else { continue };
        if !resp.status().is_success() {
            continue;
        }
        let page_url = resp.url().clone();
        let Ok(body) = resp.text().await else { continue };

        let Some(panel) = parse_login_panel(&body, &page_url) else { continue };
        tracing::info!("admin panel found at {}", url);

        let Ok(baseline) = attempt_login(http, &panel, BASELINE_USER, BASELINE_PASS).await
        else {
            continue;
        };

        for (user, pass) in DEFAULT_CREDENTIALS {
            let Ok(outcome) = attempt_login(http, &panel, user, pass).await else { continue };

            let fresh_redirect =
                outcome.status.is_redirection() && !baseline.status.is_redirection();
            let changed_page = outcome.status.as_u16() == 200
                && outcome.body_len.abs_diff(baseline.body_len) > 500;

            if fresh_redirect || changed_page {
                findings.add(
                    Severity::Critical,
                    "Default Credentials",
                    format!("Default credentials accepted: {}/{}", user, pass),
                    format!(
                        "Panel: {}\nLogin with {}/{} behaves differently from an invalid login \
                         (status {} vs baseline {}).",
                        url,
                        user,
                        pass,
                        outcome.status.as_u16(),
                        baseline.status.as_u16()
                    ),
                    "Change default credentials and enforce a strong password policy.",
                );
                break;
            }
        }
    }
}

async fn attempt_login(
    http: &HttpClient,
    panel: &LoginPanel,
    user: &str,
    pass: &str,
) -> anyhow::Result<LoginOutcome> {
    let mut data: Vec<(String, String)> = panel.hidden.clone();
    if let Some(user_field) = &panel.user_field {
        data.push((user_field.clone(), user.to_string()));
    }
    data.push((panel.pass_field.clone(), pass.to_string()));

    // Redirects stay unfollowed: a 3xx is the acceptance signal.
    let builder = match panel.method {
        FormMethod::Post => http.bare().post(panel.action.clone()).form(&data),
        FormMethod::Get => http.bare().get(panel.action.clone()).query(&data),
    };
    let resp = builder.send().await?;
    let status = resp.status();
    let body_len = resp.bytes().await.map(|b| b.len()).unwrap_or(0);
    Ok(LoginOutcome { status, body_len })
}

/// A login panel is a form with a password input. The first text/email input
/// is the user field; hidden fields are carried verbatim.
fn parse_login_panel(html: &str, page_url: &Url) -> Option<LoginPanel> {
    let doc = Html::parse_document(html);
    let form_sel = Selector::parse("form").unwrap();
    let input_sel = Selector::parse("input").unwrap();

    for form in doc.select(&form_sel) {
        let mut user_field = None;
        let mut pass_field = None;
        let mut hidden = Vec::new();

        for input in form.select(&input_sel) {
            let Some(name) = input.value().attr("name") else { continue };
            let kind = FieldKind::from_attr(input.value().attr("type").unwrap_or("text"));
            match kind {
                FieldKind::Password if pass_field.is_none() => {
                    pass_field = Some(name.to_string());
                }
                FieldKind::Text | FieldKind::Email if user_field.is_none() => {
                    user_field = Some(name.to_string());
                }
                FieldKind::Hidden => {
                    hidden.push((
                        name.to_string(),
                        input.value().attr("value").unwrap_or("").to_string(),
                    ));
                }
                _ => {}
            }
        }

        let Some(pass_field) = pass_field else { continue };
        let action_raw = form.value().attr("action").unwrap_or("");
        let action = if action_raw.is_empty() {
            page_url.clone()
        } else {
            page_url.join(action_raw).ok()?
        };
        return Some(LoginPanel {
            action,
            method: FormMethod::from_attr(form.value().attr("method").unwrap_or("GET")),
            user_field,
            pass_field,
            hidden,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panel_parsing_identifies_fields() {
        let html = r#"<form action="/auth" method="post">
            <input type="hidden" name="csrf" value="tok123">
            <input type="text" name="username">
            <input type="password" name="password">
        </form>"#;
        let page = Url::parse("https://example.com/admin/").unwrap();
        let panel = parse_login_panel(html, &page).unwrap();
        assert_eq!(panel.action.as_str(), "https://example.com/auth");
        assert_eq!(panel.user_field.as_deref(), Some("username"));
        assert_eq!(panel.pass_field, "password");
        assert_eq!(panel.hidden, vec![("csrf".to_string(), "tok123".to_string())]);
        assert_eq!(panel.method, FormMethod::Post);
    }

    #[test]
    fn pages_without_password_inputs_are_not_panels() {
        let html = r#"<form action="/search"><input type="text" name="q"></form>"#;
        let page = Url::parse("https://example.com/").unwrap();
        assert!(parse_login_panel(html, &page).is_none());
    }
}
