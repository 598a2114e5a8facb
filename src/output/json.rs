use crate::findings::{Finding, FindingStore, SeverityCounts};
use crate::state::{
    BrokenLink, CveEntry, DnsRecord, FuzzHit, ScanState, SensitiveHit, SubdomainEntry,
};
use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Machine-readable report. Field order here fixes the JSON key order, and no
/// value is a float, so serializing a parsed report is byte-stable.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub target: String,
    pub base_url: String,
    pub scan_date: String,
    pub summary: SeverityCounts,
    pub tech_stack: BTreeMap<String, String>,
    pub discovered_urls: Vec<String>,
    pub findings: Vec<Finding>,
    pub dns_records: Vec<DnsRecord>,
    pub whois_info: BTreeMap<String, String>,
    pub cve_data: Vec<CveEntry>,
    pub subdomains: Vec<SubdomainEntry>,
    pub fuzz_results: Vec<FuzzHit>,
    pub sensitive_findings: Vec<SensitiveHit>,
    pub broken_links: Vec<BrokenLink>,
}

pub fn build_report(state: &ScanState, findings: &FindingStore) -> JsonReport {
    JsonReport {
        target: state.target.clone(),
        base_url: state.base_url.clone(),
        scan_date: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        summary: findings.counts(),
        tech_stack: state.tech_stack.clone(),
        discovered_urls: state.discovered_urls.iter().cloned().collect(),
        findings: findings.sorted(),
        dns_records: state.dns_records.clone(),
        whois_info: state.whois_info.clone(),
        cve_data: state.cve_data.clone(),
        subdomains: state.subdomains.clone(),
        fuzz_results: state.fuzz_results.clone(),
        sensitive_findings: state.sensitive_findings.clone(),
        broken_links: state.broken_links.clone(),
    }
}
