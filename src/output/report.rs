use crate::findings::FindingStore;
use crate::state::ScanState;
use chrono::Local;
use std::fmt::Write as _;

const BANNER: &str = "======================================================================";

/// Human-readable report: banner, summary, tech stack, discovered URLs, then
/// findings sorted by severity (insertion order within a severity).
pub fn render_text(state: &ScanState, findings: &FindingStore) -> String {
    let counts = findings.counts();
    let sorted = findings.sorted();
    let mut out = String::new();

    let _ = writeln!(out, "{}", BANNER);
    let _ = writeln!(out, "  TUPISEC - Web Security Analysis Report");
    let _ = writeln!(out, "{}", BANNER);
    let _ = writeln!(out, "  Target:    {}", state.target);
    let _ = writeln!(out, "  Base URL:  {}", state.base_url);
    let _ = writeln!(out, "  Date:      {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "  Scanner:   TupiSec v{}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(out, "{}", BANNER);
    let _ = writeln!(out);
    let _ = writeln!(out, "  SUMMARY");
    let _ = writeln!(out, "  ----------------------------------------");
    let _ = writeln!(out, "  CRITICAL:  {}", counts.critical);
    let _ = writeln!(out, "  HIGH:      {}", counts.high);
    let _ = writeln!(out, "  MEDIUM:    {}", counts.medium);
    let _ = writeln!(out, "  LOW:       {}", counts.low);
    let _ = writeln!(out, "  INFO:      {}", counts.info);
    let _ = writeln!(out, "  TOTAL:     {}", sorted.len());
    let _ = writeln!(out);

    if !state.tech_stack.is_empty() {
        let _ = writeln!(out, "  TECHNOLOGY STACK");
        let _ = writeln!(out, "  ----------------------------------------");
        for (key, value) in &state.tech_stack {
            let _ = writeln!(out, "  {}: {}", key, value);
        }
        let _ = writeln!(out);
    }

    if !state.discovered_urls.is_empty() {
        let _ = writeln!(out, "  DISCOVERED URLs");
        let _ = writeln!(out, "  ----------------------------------------");
        for url in &state.discovered_urls {
            let _ = writeln!(out, "  {}", url);
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "  DETAILED FINDINGS");
    let _ = writeln!(out, "  ----------------------------------------");
    for (i, finding) in sorted.iter().enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  [{}] #{}: {}", finding.severity, i + 1, finding.title);
        let _ = writeln!(out, "  Category: {}", finding.category);
        let _ = writeln!(out, "  Detail:   {}", finding.detail);
        if !finding.recommendation.is_empty() {
            let _ = writeln!(out, "  Fix:      {}", finding.recommendation);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", BANNER);
    let _ = writeln!(out, "  END OF REPORT");
    let _ = writeln!(out, "{}", BANNER);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::Severity;

    #[test]
    fn findings_render_in_severity_order() {
        let state = ScanState::new("https://example.com").unwrap();
        let findings = FindingStore::new();
        findings.add(Severity::Info, "Open Port", "Port 22 is open", "ssh", "");
        findings.add(Severity::Critical, "SQL Injection", "SQLi in 'q'", "payload", "fix");
        let text = render_text(&state, &findings);
        let critical_pos = text.find("[CRITICAL] #1").unwrap();
        let info_pos = text.find("[INFO] #2").unwrap();
        assert!(critical_pos < info_pos);
        assert!(text.contains("TOTAL:     2"));
        assert!(text.contains("END OF REPORT"));
    }
}
