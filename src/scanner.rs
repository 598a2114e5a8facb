use crate::config::Config;
use crate::findings::FindingStore;
use crate::http_client::HttpClient;
use crate::state::ScanState;
use crate::{analyze, discover, enrich, fuzz, probe, security};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Fixed phase registry. Order encodes the data dependencies: early phases
/// populate ScanState, later probes consume it.
pub const PHASES: &[(&str, &str)] = &[
    ("headers", "Analyzing HTTP headers"),
    ("ssl", "Analyzing SSL/TLS"),
    ("tech", "Fingerprinting technology"),
    ("dns_whois", "Collecting DNS & WHOIS"),
    ("cves", "Looking up CVEs"),
    ("methods", "Testing HTTP methods"),
    ("forms", "Analyzing forms"),
    ("crawl", "Crawling site"),
    ("sqli", "Testing SQL injection"),
    ("xss", "Testing XSS"),
    ("directories", "Enumerating directories"),
    ("ports", "Scanning ports"),
    ("open_redirect", "Testing for open redirects"),
    ("ssrf", "Testing for SSRF"),
    ("ssti", "Testing for template injection"),
    ("cors", "Advanced CORS testing"),
    ("subdomains", "Enumerating subdomains"),
    ("param_fuzz", "Fuzzing hidden parameters"),
    ("sensitive_data", "Scanning for sensitive data"),
    ("jwt", "Analyzing JWT tokens"),
    ("rate_limit", "Testing rate limiting"),
    ("mixed_content", "Checking mixed content"),
    ("graphql", "Probing GraphQL endpoints"),
    ("xxe", "Testing XML external entities"),
    ("broken_links", "Checking external links"),
    ("nosql", "Testing NoSQL injection"),
    ("cmd_injection", "Testing command injection"),
    ("default_creds", "Testing default credentials"),
    ("crlf", "Testing CRLF injection"),
    ("prototype_pollution", "Testing prototype pollution"),
    ("s3_buckets", "Enumerating S3 buckets"),
    ("smuggling", "Probing request smuggling"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Silent,
    /// Interactive terminal bar.
    Bar,
    /// `PROGRESS:{...}` lines for driving programs.
    JsonLines,
}

#[derive(Serialize)]
struct ProgressRecord<'a> {
    phase: &'a str,
    step: usize,
    total: usize,
    message: &'a str,
}

pub struct Scanner {
    pub state: ScanState,
    pub http: HttpClient,
    pub findings: Arc<FindingStore>,
    pub config: Config,
    cancel: CancellationToken,
}

impl Scanner {
    pub fn new(
        target: &str,
        cookie_header: Option<&str>,
        config: Config,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let state = ScanState::new(target)?;
        let http = HttpClient::new(&config, &state.target_url, cookie_header)?;
        Ok(Self {
            state,
            http,
            findings: Arc::new(FindingStore::new()),
            config,
            cancel,
        })
    }

    /// Run every phase in order. Phase failures are logged and never abort
    /// the pipeline; cancellation is honored between phases.
    pub async fn run_full_scan(&mut self, progress: ProgressMode) {
        let total = PHASES.len();
        let bar = match progress {
            ProgressMode::Bar => {
                let bar = ProgressBar::new(total as u64);
                bar.set_style(
                    ProgressStyle::with_template("[{bar:30}] {pos}/{len} {msg}")
                        .expect("valid progress template")
                        .progress_chars("=> "),
                );
                Some(bar)
            }
            _ => None,
        };

        // The header phase's body feeds form analysis.
        let mut first_body: Option<String> = None;

        for (i, (phase_id, message)) in PHASES.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!("scan cancelled, stopping before phase '{}'", phase_id);
                break;
            }
            emit_progress(progress, bar.as_ref(), phase_id, i + 1, total, message);
            tracing::info!("[*] {}", message);

            match *phase_id {
                "headers" => {
                    first_body =
                        analyze::security_headers::run(&mut self.state, &self.http, &self.findings)
                            .await;
                }
                "ssl" => probe::tls::run(&self.state, &self.findings).await,
                "tech" => analyze::fingerprint::run(&mut self.state, &self.http).await,
                "dns_whois" => discover::dns_whois::run(&mut self.state, &self.http).await,
                "cves" => enrich::cves::run(&mut self.state, &self.http, &self.findings).await,
                "methods" => probe::methods::run(&self.state, &self.http, &self.findings).await,
                "forms" => {
                    analyze::forms::run(
                        &mut self.state,
                        &self.http,
                        &self.findings,
                        first_body.take(),
                    )
                    .await;
                }
                "crawl" => {
                    discover::crawler::run(&mut self.state, &self.http, self.config.crawl_depth)
                        .await;
                }
                "sqli" => probe::sqli::run(&self.state, &self.http, &self.findings).await,
                "xss" => probe::xss::run(&self.state, &self.http, &self.findings).await,
                "directories" => {
                    discover::directories::run(&self.state, &self.http, &self.findings).await;
                }
                "ports" => discover::ports::run(&self.state, &self.findings).await,
                "open_redirect" => {
                    probe::open_redirect::run(&mut self.state, &self.http, &self.findings).await;
                }
                "ssrf" => probe::ssrf::run(&self.state, &self.http, &self.findings).await,
                "ssti" => probe::ssti::run(&self.state, &self.http, &self.findings).await,
                "cors" => probe::cors::run(&self.state, &self.http, &self.findings).await,
                "subdomains" => {
                    discover::subdomain::run(&mut self.state, &self.http, &self.findings).await;
                }
                "param_fuzz" => {
                    fuzz::param_fuzzer::run(&mut self.state, &self.http, &self.findings).await;
                }
                "sensitive_data" => {
                    analyze::sensitive_data::run(&mut self.state, &self.http, &self.findings)
                        .await;
                }
                "jwt" => security::jwt_analyzer::run(&self.state, &self.http, &self.findings).await,
                "rate_limit" => {
                    probe::rate_limit::run(&self.state, &self.http, &self.findings).await;
                }
                "mixed_content" => {
                    analyze::mixed_content::run(&self.state, &self.http, &self.findings).await;
                }
                "graphql" => probe::graphql::run(&self.state, &self.http, &self.findings).await,
                "xxe" => probe::xxe::run(&self.state, &self.http, &self.findings).await,
                "broken_links" => {
                    probe::broken_links::run(&mut self.state, &self.http, &self.findings).await;
                }
                "nosql" => probe::nosql::run(&self.state, &self.http, &self.findings).await,
                "cmd_injection" => {
                    probe::cmd_injection::run(&self.state, &self.http, &self.findings).await;
                }
                "default_creds" => {
                    probe::default_creds::run(&self.state, &self.http, &self.findings).await;
                }
                "crlf" => probe::crlf::run(&self.state, &self.http, &self.findings).await,
                "prototype_pollution" => {
                    probe::prototype_pollution::run(&self.state, &self.http, &self.findings).await;
                }
                "s3_buckets" => {
                    discover::s3_buckets::run(&self.state, &self.http, &self.findings).await;
                }
                "smuggling" => probe::smuggling::run(&self.state, &self.findings).await,
                other => tracing::warn!("unknown phase id '{}', skipping", other),
            }
        }

        if progress == ProgressMode::JsonLines {
            print_progress_line(&ProgressRecord {
                phase: "done",
                step: total,
                total,
                message: "Scan complete",
            });
        }
        if let Some(bar) = bar {
            bar.finish_with_message("scan complete");
        }
    }
}

fn emit_progress(
    mode: ProgressMode,
    bar: Option<&ProgressBar>,
    phase: &str,
    step: usize,
    total: usize,
    message: &str,
) {
    match mode {
        ProgressMode::JsonLines => {
            print_progress_line(&ProgressRecord { phase, step, total, message });
        }
        ProgressMode::Bar => {
            if let Some(bar) = bar {
                bar.set_position(step as u64 - 1);
                bar.set_message(message.to_string());
            }
        }
        ProgressMode::Silent => {}
    }
}

fn print_progress_line(record: &ProgressRecord<'_>) {
    if let Ok(json) = serde_json::to_string(record) {
        println!("PROGRESS:{}", json);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_ids_are_unique() {
        let mut ids: Vec<&str> = PHASES.iter().map(|(id, _)| *id).collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn dependency_order_holds() {
        let position = |id: &str| PHASES.iter().position(|(p, _)| *p == id).unwrap();
        // Consumers come after their producers.
        assert!(position("headers") < position("forms"));
        assert!(position("forms") < position("sqli"));
        assert!(position("forms") < position("xss"));
        assert!(position("crawl") < position("open_redirect"));
        assert!(position("crawl") < position("sensitive_data"));
        assert!(position("tech") < position("cves"));
        assert!(position("subdomains") < position("s3_buckets"));
        assert!(position("forms") < position("rate_limit"));
    }

    #[test]
    fn progress_record_key_order_is_stable() {
        let record = ProgressRecord { phase: "headers", step: 1, total: 32, message: "x" };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"phase":"headers","step":1,"total":32,"message":"x"}"#);
    }
}
