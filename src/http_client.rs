use crate::config::Config;
use crate::utils;
use anyhow::Result;
use reqwest::cookie::Jar;
use reqwest::{Client, ClientBuilder, Response};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Long-lived scan session: shared cookie jar, browser User-Agent, invalid
/// certificates accepted (targets often present broken TLS). Two clients share
/// the jar so redirect policy stays per-probe.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    bare: Client,
}

impl HttpClient {
    pub fn new(config: &Config, target: &Url, cookie_header: Option<&str>) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        if let Some(header) = cookie_header {
            for (name, value) in utils::parse_cookie_pairs(header) {
                jar.add_cookie_str(&format!("{}={}", name, value), target);
            }
        }
        let client = base_builder(config, jar.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        let bare = base_builder(config, jar)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client, bare })
    }

    /// Redirect-following client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Client that never follows redirects, for probes that inspect `Location`.
    pub fn bare(&self) -> &Client {
        &self.bare
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        Ok(self.client.get(url).send().await?)
    }

    pub async fn get_no_redirect(&self, url: &str) -> Result<Response> {
        Ok(self.bare.get(url).send().await?)
    }

    pub async fn get_with_timeout(&self, url: &str, timeout_secs: u64) -> Result<Response> {
        Ok(self
            .client
            .get(url)
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await?)
    }

    pub async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<Response> {
        Ok(self.client.post(url).form(form).send().await?)
    }

    pub async fn post_json<T: Serialize>(&self, url: &str, json: &T) -> Result<Response> {
        Ok(self.client.post(url).json(json).send().await?)
    }
}

fn base_builder(config: &Config, jar: Arc<Jar>) -> ClientBuilder {
    ClientBuilder::new()
        // Connection pooling - reuse connections aggressively
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .tcp_nodelay(true)
        // Timeouts
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(5))
        // Compression
        .gzip(true)
        .brotli(true)
        // TLS
        .use_rustls_tls()
        .danger_accept_invalid_certs(true)
        // Session
        .cookie_provider(jar)
        .user_agent(config.user_agent.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_defaults() {
        let config = Config::default();
        let target = Url::parse("https://example.com/").unwrap();
        let client = HttpClient::new(&config, &target, Some("a=1; b=2"));
        assert!(client.is_ok());
    }
}
