use tupisec::findings::{FindingStore, Severity};
use tupisec::output::{build_report, JsonReport};
use tupisec::state::{DnsRecord, ScanState};
use url::Url;

fn sample_state() -> ScanState {
    let mut state = ScanState::new("https://example.com").unwrap();
    state
        .tech_stack
        .insert("web_server".into(), "nginx/1.18.0".into());
    state.add_discovered(&Url::parse("https://example.com/about").unwrap());
    state.add_discovered(&Url::parse("https://example.com/login").unwrap());
    state.dns_records.push(DnsRecord {
        record_type: "A".into(),
        value: "93.184.216.34".into(),
    });
    state
}

fn sample_findings() -> FindingStore {
    let findings = FindingStore::new();
    findings.add(Severity::Info, "Open Port", "Port 8080 is open", "Host: example.com:8080", "");
    findings.add(
        Severity::Critical,
        "SQL Injection",
        "Possible SQLi in field 'q'",
        "Payload: ' OR '1'='1",
        "Use parameterized queries.",
    );
    findings.add(
        Severity::High,
        "XSS",
        "Reflected XSS in field 'q'",
        "Payload reflected",
        "Encode output.",
    );
    findings
}

#[test]
fn json_report_round_trips_byte_equivalent() {
    let report = build_report(&sample_state(), &sample_findings());
    let first = serde_json::to_string(&report).unwrap();
    let parsed: JsonReport = serde_json::from_str(&first).unwrap();
    let second = serde_json::to_string(&parsed).unwrap();
    assert_eq!(first, second);
}

#[test]
fn json_report_keys_are_stable() {
    let report = build_report(&sample_state(), &sample_findings());
    let json = serde_json::to_string(&report).unwrap();
    let expected_order = [
        "\"target\"",
        "\"base_url\"",
        "\"scan_date\"",
        "\"summary\"",
        "\"tech_stack\"",
        "\"discovered_urls\"",
        "\"findings\"",
        "\"dns_records\"",
        "\"whois_info\"",
        "\"cve_data\"",
        "\"subdomains\"",
        "\"fuzz_results\"",
        "\"sensitive_findings\"",
        "\"broken_links\"",
    ];
    let mut last = 0;
    for key in expected_order {
        let pos = json.find(key).unwrap_or_else(|| panic!("missing key {}", key));
        assert!(pos >= last, "key {} out of order", key);
        last = pos;
    }
}

#[test]
fn summary_always_has_all_five_buckets() {
    let report = build_report(&sample_state(), &FindingStore::new());
    let json = serde_json::to_value(&report).unwrap();
    let summary = json.get("summary").unwrap();
    for key in ["CRITICAL", "HIGH", "MEDIUM", "LOW", "INFO"] {
        assert_eq!(summary.get(key).and_then(|v| v.as_u64()), Some(0));
    }
}

#[test]
fn findings_are_non_decreasing_in_severity() {
    let report = build_report(&sample_state(), &sample_findings());
    let ranks: Vec<Severity> = report.findings.iter().map(|f| f.severity).collect();
    assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(ranks.first(), Some(&Severity::Critical));
}

#[test]
fn discovered_urls_share_the_target_host() {
    let state = sample_state();
    let report = build_report(&state, &FindingStore::new());
    for url in &report.discovered_urls {
        let parsed = Url::parse(url).unwrap();
        assert_eq!(parsed.host_str(), Some("example.com"));
    }
}

#[test]
fn report_contains_no_floats() {
    let mut state = sample_state();
    state.cve_data.push(tupisec::state::CveEntry {
        cve_id: "CVE-2021-23017".into(),
        product: "nginx".into(),
        version: "1.18.0".into(),
        cvss_score: "9.8".into(),
        severity: "CRITICAL".into(),
        description: "Off-by-one in resolver.".into(),
    });
    let report = build_report(&state, &sample_findings());
    let value = serde_json::to_value(&report).unwrap();
    assert!(no_floats(&value));
}

fn no_floats(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Number(n) => n.is_u64() || n.is_i64(),
        serde_json::Value::Array(items) => items.iter().all(no_floats),
        serde_json::Value::Object(map) => map.values().all(no_floats),
        _ => true,
    }
}
