use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::{SQL_ERRORS, SQL_PAYLOADS};
use crate::state::ScanState;

/// How many payloads from the catalog each field receives.
const PAYLOAD_BUDGET: usize = 5;

/// Error-based SQL injection against every discovered form. The first hit
/// settles the form; databases rarely get less broken with more payloads.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    if state.forms.is_empty() {
        tracing::info!("no forms to test");
        return;
    }

    'forms: for form in &state.forms {
        for field in &form.fields {
            if field.kind.is_inert() {
                continue;
            }
            for payload in &SQL_PAYLOADS[..PAYLOAD_BUDGET] {
                let data = form.test_values(&field.name, payload);
                let Ok(resp) = super::submit_form(http, form, &data, None).await else {
                    continue;
                };
                let Ok(body) = resp.text().await else { continue };

                if let Some(pattern) = matches_sql_error(&body) {
                    findings.add(
                        Severity::Critical,
                        "SQL Injection",
                        format!("Possible SQLi in field '{}'", field.name),
                        format!("Payload: {}\nSQL error pattern found: '{}'", payload, pattern),
                        "Use parameterized queries / prepared statements.",
                    );
                    continue 'forms;
                }
            }
        }
    }
}

/// First database error fingerprint present in the (lowercased) body.
pub fn matches_sql_error(body: &str) -> Option<&'static str> {
    let lower = body.to_lowercase();
    SQL_ERRORS.iter().find(|e| lower.contains(*e)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_classic_mysql_error() {
        let body = "You have an error in your SQL syntax; check the manual";
        assert_eq!(matches_sql_error(body), Some("sql syntax"));
    }

    #[test]
    fn detects_oracle_error_codes() {
        assert_eq!(matches_sql_error("ORA-01756: quoted string not properly terminated"),
                   Some("ora-"));
    }

    #[test]
    fn clean_body_produces_no_match() {
        assert_eq!(matches_sql_error("<html><body>Welcome back!</body></html>"), None);
    }

    #[test]
    fn payload_budget_is_within_catalog() {
        assert!(PAYLOAD_BUDGET <= SQL_PAYLOADS.len());
        assert_eq!(PAYLOAD_BUDGET, 5);
    }
}
