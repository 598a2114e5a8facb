use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

/// HTML input classification. Inert kinds never receive payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Hidden,
    Submit,
    Button,
    Image,
    Password,
    Text,
    Email,
    Checkbox,
    Radio,
    Textarea,
    Select,
}

impl FieldKind {
    pub fn from_attr(kind: &str) -> Self {
        match kind.to_ascii_lowercase().as_str() {
            "hidden" => FieldKind::Hidden,
            "submit" => FieldKind::Submit,
            "button" => FieldKind::Button,
            "image" => FieldKind::Image,
            "password" => FieldKind::Password,
            "email" => FieldKind::Email,
            "checkbox" => FieldKind::Checkbox,
            "radio" => FieldKind::Radio,
            "textarea" => FieldKind::Textarea,
            "select" => FieldKind::Select,
            _ => FieldKind::Text,
        }
    }

    /// Fields that carry no user-controlled free text.
    pub fn is_inert(self) -> bool {
        matches!(
            self,
            FieldKind::Hidden | FieldKind::Submit | FieldKind::Button | FieldKind::Image
        )
    }
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub name: String,
    pub kind: FieldKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

impl FormMethod {
    pub fn from_attr(method: &str) -> Self {
        if method.eq_ignore_ascii_case("post") {
            FormMethod::Post
        } else {
            FormMethod::Get
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FormMethod::Get => "GET",
            FormMethod::Post => "POST",
        }
    }
}

/// A discovered HTML form. `action` is always absolute; field order follows
/// document order.
#[derive(Debug, Clone)]
pub struct Form {
    pub action: Url,
    pub method: FormMethod,
    pub fields: Vec<FormField>,
    pub page_url: String,
}

impl Form {
    pub fn has_password_field(&self) -> bool {
        self.fields.iter().any(|f| f.kind == FieldKind::Password)
    }

    /// Submission data with `payload` in `inject_field` and defaults elsewhere.
    pub fn test_values(&self, inject_field: &str, payload: &str) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|f| {
                let value = if f.name == inject_field {
                    payload.to_string()
                } else if f.value.is_empty() {
                    "test".to_string()
                } else {
                    f.value.clone()
                };
                (f.name.clone(), value)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CveEntry {
    pub cve_id: String,
    pub product: String,
    pub version: String,
    pub cvss_score: String,
    pub severity: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubdomainEntry {
    pub subdomain: String,
    pub ip: String,
    pub status: u16,
    pub takeover_risk: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRedirectHit {
    pub url: String,
    pub param: String,
    pub redirect_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzHit {
    pub url: String,
    pub param: String,
    pub value: String,
    pub baseline_status: u16,
    pub status: u16,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitiveHit {
    pub url: String,
    pub kind: String,
    pub sample: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokenLink {
    pub url: String,
    pub domain: String,
    pub reason: String,
}

/// Shared scan state. Written only by the currently executing phase, read by
/// later phases, consumed by the reporter.
pub struct ScanState {
    pub target: String,
    pub target_url: Url,
    pub base_url: String,
    pub host: String,
    pub port: u16,
    pub scheme: String,
    pub discovered_urls: BTreeSet<String>,
    pub forms: Vec<Form>,
    pub tech_stack: BTreeMap<String, String>,
    pub dns_records: Vec<DnsRecord>,
    pub whois_info: BTreeMap<String, String>,
    pub cve_data: Vec<CveEntry>,
    pub subdomains: Vec<SubdomainEntry>,
    pub open_redirects: Vec<OpenRedirectHit>,
    pub fuzz_results: Vec<FuzzHit>,
    pub sensitive_findings: Vec<SensitiveHit>,
    pub broken_links: Vec<BrokenLink>,
}

impl ScanState {
    pub fn new(target: &str) -> Result<Self> {
        let trimmed = target.trim().trim_end_matches('/');
        // Accept bare hostnames the way users type them; "host:port" parses
        // as a scheme, so anything without an http(s) scheme gets one.
        let target_url = match Url::parse(trimmed) {
            Ok(url) if url.host_str().is_some() && matches!(url.scheme(), "http" | "https") => url,
            _ => Url::parse(&format!("http://{}", trimmed))
                .with_context(|| format!("invalid target URL: {}", target))?,
        };
        let host = target_url
            .host_str()
            .ok_or_else(|| anyhow!("target URL has no host: {}", target))?
            .to_string();
        let scheme = target_url.scheme().to_string();
        let port = target_url
            .port_or_known_default()
            .unwrap_or(if scheme == "https" { 443 } else { 80 });
        let base_url = if target_url.port().is_some() {
            format!("{}://{}:{}", scheme, host, port)
        } else {
            format!("{}://{}", scheme, host)
        };
        Ok(Self {
            target: target_url.to_string().trim_end_matches('/').to_string(),
            target_url,
            base_url,
            host,
            port,
            scheme,
            discovered_urls: BTreeSet::new(),
            forms: Vec::new(),
            tech_stack: BTreeMap::new(),
            dns_records: Vec::new(),
            whois_info: BTreeMap::new(),
            cve_data: Vec::new(),
            subdomains: Vec::new(),
            open_redirects: Vec::new(),
            fuzz_results: Vec::new(),
            sensitive_findings: Vec::new(),
            broken_links: Vec::new(),
        })
    }

    pub fn is_same_host(&self, url: &Url) -> bool {
        url.host_str() == Some(self.host.as_str())
    }

    /// Record a discovered URL. Enforces the same-origin invariant and strips
    /// fragments; returns true when the URL was new.
    pub fn add_discovered(&mut self, url: &Url) -> bool {
        if !self.is_same_host(url) {
            return false;
        }
        let mut clean = url.clone();
        clean.set_fragment(None);
        self.discovered_urls.insert(clean.to_string())
    }

    /// Discovered URLs that carry a query string, for probes that mutate
    /// parameters.
    pub fn urls_with_query(&self) -> Vec<Url> {
        self.discovered_urls
            .iter()
            .filter_map(|u| Url::parse(u).ok())
            .filter(|u| u.query().map(|q| !q.is_empty()).unwrap_or(false))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_parses_bare_hostnames() {
        let state = ScanState::new("example.com").unwrap();
        assert_eq!(state.host, "example.com");
        assert_eq!(state.scheme, "http");
        assert_eq!(state.base_url, "http://example.com");
    }

    #[test]
    fn state_accepts_host_port_targets() {
        let state = ScanState::new("localhost:8080").unwrap();
        assert_eq!(state.host, "localhost");
        assert_eq!(state.port, 8080);
        assert_eq!(state.base_url, "http://localhost:8080");
    }

    #[test]
    fn state_rejects_hostless_targets() {
        assert!(ScanState::new("http://").is_err());
    }

    #[test]
    fn discovered_urls_stay_same_origin() {
        let mut state = ScanState::new("https://example.com/app").unwrap();
        let same = Url::parse("https://example.com/page#frag").unwrap();
        let other = Url::parse("https://other.example.net/page").unwrap();
        assert!(state.add_discovered(&same));
        assert!(!state.add_discovered(&other));
        assert_eq!(state.discovered_urls.len(), 1);
        assert!(state.discovered_urls.contains("https://example.com/page"));
    }

    #[test]
    fn test_values_fill_defaults() {
        let form = Form {
            action: Url::parse("https://example.com/search").unwrap(),
            method: FormMethod::Get,
            fields: vec![
                FormField { name: "q".into(), kind: FieldKind::Text, value: String::new() },
                FormField { name: "lang".into(), kind: FieldKind::Hidden, value: "en".into() },
            ],
            page_url: "https://example.com/".into(),
        };
        let data = form.test_values("q", "' OR '1'='1");
        assert_eq!(data[0], ("q".to_string(), "' OR '1'='1".to_string()));
        assert_eq!(data[1], ("lang".to_string(), "en".to_string()));
    }

    #[test]
    fn inert_kinds_are_skipped_targets() {
        assert!(FieldKind::Hidden.is_inert());
        assert!(FieldKind::Submit.is_inert());
        assert!(!FieldKind::Password.is_inert());
        assert!(!FieldKind::Textarea.is_inert());
    }
}
