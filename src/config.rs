use serde::Deserialize;

/// Scan tuning knobs. Budgets that are part of probe contracts live with the
/// probes; these are the transport-level defaults shared across phases.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Default per-request timeout for the shared session.
    pub timeout_secs: u64,
    /// Shorter timeout for bulk probes (directory and payload sweeps).
    pub quick_timeout_secs: u64,
    /// Per-scheme timeout when poking enumerated subdomains.
    pub subdomain_http_timeout_secs: u64,
    /// Same-origin crawl depth.
    pub crawl_depth: usize,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            quick_timeout_secs: 8,
            subdomain_http_timeout_secs: 5,
            crawl_depth: 2,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}
