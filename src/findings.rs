use chrono::{Local, SecondsFormat};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity taxonomy. Declaration order doubles as the display sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        };
        f.write_str(s)
    }
}

/// One security observation. Never mutated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub category: String,
    pub title: String,
    pub detail: String,
    pub recommendation: String,
    pub timestamp: String,
}

/// Per-severity counts for the report summary. All five keys are always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    #[serde(rename = "CRITICAL")]
    pub critical: usize,
    #[serde(rename = "HIGH")]
    pub high: usize,
    #[serde(rename = "MEDIUM")]
    pub medium: usize,
    #[serde(rename = "LOW")]
    pub low: usize,
    #[serde(rename = "INFO")]
    pub info: usize,
}

/// Append-only finding store. Deduplication is the caller's responsibility;
/// probes keep their own `seen` sets keyed by (url, finding type).
#[derive(Default)]
pub struct FindingStore {
    inner: Mutex<Vec<Finding>>,
}

impl FindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &self,
        severity: Severity,
        category: &str,
        title: impl Into<String>,
        detail: impl Into<String>,
        recommendation: &str,
    ) {
        let finding = Finding {
            severity,
            category: category.to_string(),
            title: title.into(),
            detail: detail.into(),
            recommendation: recommendation.to_string(),
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        };
        tracing::info!("[{}] {}: {}", finding.severity, finding.category, finding.title);
        self.inner.lock().push(finding);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn all(&self) -> Vec<Finding> {
        self.inner.lock().clone()
    }

    /// Findings ordered by severity, insertion order preserved within a severity.
    pub fn sorted(&self) -> Vec<Finding> {
        let mut findings = self.all();
        findings.sort_by_key(|f| f.severity);
        findings
    }

    pub fn counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for f in self.inner.lock().iter() {
            match f.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_sorts_critical_first() {
        assert!(Severity::Critical < Severity::High);
        assert!(Severity::High < Severity::Medium);
        assert!(Severity::Medium < Severity::Low);
        assert!(Severity::Low < Severity::Info);
    }

    #[test]
    fn severity_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"CRITICAL\"");
        let parsed: Severity = serde_json::from_str("\"MEDIUM\"").unwrap();
        assert_eq!(parsed, Severity::Medium);
    }

    #[test]
    fn sorted_is_stable_within_severity() {
        let store = FindingStore::new();
        store.add(Severity::Info, "A", "first info", "", "");
        store.add(Severity::Critical, "B", "crit", "", "");
        store.add(Severity::Info, "C", "second info", "", "");
        let sorted = store.sorted();
        assert_eq!(sorted[0].title, "crit");
        assert_eq!(sorted[1].title, "first info");
        assert_eq!(sorted[2].title, "second info");
    }

    #[test]
    fn counts_cover_all_severities() {
        let store = FindingStore::new();
        store.add(Severity::High, "X", "a", "", "");
        store.add(Severity::High, "X", "b", "", "");
        store.add(Severity::Low, "Y", "c", "", "");
        let counts = store.counts();
        assert_eq!(counts.high, 2);
        assert_eq!(counts.low, 1);
        assert_eq!(counts.critical, 0);
    }
}
