use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::{CMD_INDICATORS, CMD_PAYLOADS, CMD_TIME_PAYLOADS};
use crate::state::ScanState;
use std::time::{Duration, Instant};

const TIME_BASED_TIMEOUT: Duration = Duration::from_secs(12);
const TIME_BASED_THRESHOLD: Duration = Duration::from_millis(4500);

/// OS command injection: output-based payloads first (`id` output in the
/// body), then time-based `sleep` payloads when nothing echoed.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    'forms: for form in &state.forms {
        for field in &form.fields {
            if field.kind.is_inert() {
                continue;
            }
            for payload in CMD_PAYLOADS {
                let data = form.test_values(&field.name, payload);
                let Ok(resp) = super::submit_form(http, form, &data, None).await else {
                    continue;
                };
                let Ok(body) = resp.text().await else { continue };

                if let Some(indicator) = matches_command_output(&body) {
                    findings.add(
                        Severity::Critical,
                        "Command Injection",
                        format!("OS command injection in field '{}'", field.name),
                        format!(
                            "URL: {}\nPayload: {}\nCommand output in response: '{}'",
                            form.action, payload, indicator
                        ),
                        "Never pass user input to a shell. Use safe process APIs with argument arrays.",
                    );
                    continue 'forms;
                }
            }
        }

        // Nothing echoed; try the blind variant.
        for field in &form.fields {
            if field.kind.is_inert() {
                continue;
            }
            for payload in CMD_TIME_PAYLOADS {
                let data = form.test_values(&field.name, payload);
                let start = Instant::now();
                let result =
                    super::submit_form(http, form, &data, Some(TIME_BASED_TIMEOUT)).await;
                let elapsed = start.elapsed();

                if result.is_ok() && elapsed >= TIME_BASED_THRESHOLD {
                    findings.add(
                        Severity::Critical,
                        "Command Injection",
                        format!("Blind OS command injection in field '{}'", field.name),
                        format!(
                            "URL: {}\nPayload: {}\nResponse delayed {:.1}s (sleep executed).",
                            form.action,
                            payload,
                            elapsed.as_secs_f64()
                        ),
                        "Never pass user input to a shell. Use safe process APIs with argument arrays.",
                    );
                    continue 'forms;
                }
            }
        }
    }
}

pub fn matches_command_output(body: &str) -> Option<&'static str> {
    let lower = body.to_lowercase();
    CMD_INDICATORS.iter().find(|i| lower.contains(*i)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_output_triggers_oracle() {
        let body = "uid=33(www-data) gid=33(www-data) groups=33(www-data)";
        assert_eq!(matches_command_output(body), Some("uid="));
    }

    #[test]
    fn threshold_sits_below_sleep_duration() {
        assert!(TIME_BASED_THRESHOLD < Duration::from_secs(5));
        assert!(TIME_BASED_TIMEOUT > Duration::from_secs(5));
    }
}
