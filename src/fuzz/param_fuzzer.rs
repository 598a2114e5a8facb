use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::{
    DB_ERROR_PATTERNS, FUZZ_PARAM_NAMES, FUZZ_VALUES, GENERIC_ERROR_PATTERNS,
    PATH_DISCLOSURE_PATTERNS,
};
use crate::state::{FuzzHit, ScanState};
use ahash::AHashSet;
use url::Url;

const URL_BUDGET: usize = 10;
const SIZE_DELTA_BYTES: usize = 300;
const SIZE_DELTA_RATIO: f64 = 0.2;

/// Response snapshot taken before injecting a candidate parameter.
pub struct Baseline {
    pub status: u16,
    pub size: usize,
    pub body_lower: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuzzSignal {
    PathDisclosure(&'static str),
    DbError(&'static str),
    GenericError(&'static str),
    StatusChange,
    SizeChange,
}

/// Hidden-parameter discovery: add well-known parameter names to each
/// candidate URL and diff the response against the baseline.
pub async fn run(state: &mut ScanState, http: &HttpClient, findings: &FindingStore) {
    let mut candidates = vec![state.target.clone()];
    candidates.extend(state.discovered_urls.iter().take(URL_BUDGET).cloned());
    candidates.dedup();

    let mut seen: AHashSet<(String, &'static str)> = AHashSet::new();
    let mut hits = Vec::new();

    for candidate in candidates {
        let Ok(url) = Url::parse(&candidate) else { continue };
        let existing: AHashSet<String> =
            url.query_pairs().map(|(k, _)| k.into_owned()).collect();

        let Ok(resp) = http.get_with_timeout(url.as_str(), 8).await else { continue };
        let status = resp.status().as_u16();
        let Ok(body) = resp.text().await else { continue };
        let baseline = Baseline {
            status,
            size: body.len(),
            body_lower: body.to_lowercase(),
        };

        let mut endpoint = url.clone();
        endpoint.set_query(None);

        for name in FUZZ_PARAM_NAMES {
            if existing.contains(*name) || !seen.insert((endpoint.to_string(), *name)) {
                continue;
            }
            for value in FUZZ_VALUES {
                let mut test_url = url.clone();
                test_url.query_pairs_mut().append_pair(name, value);

                let Ok(resp) = http.get_with_timeout(test_url.as_str(), 8).await else {
                    continue;
                };
                let status = resp.status().as_u16();
                let Ok(body) = resp.text().await else { continue };

                let Some(signal) =
                    classify(&baseline, status, body.len(), &body.to_lowercase())
                else {
                    continue;
                };

                let (severity, title, note) = describe(signal, name, &baseline, status);
                findings.add(
                    severity,
                    "Hidden Parameter",
                    title,
                    format!("URL: {}\nInjected: {}={}\n{}", url, name, value, note),
                    "Remove or gate debug and internal parameters in production.",
                );
                hits.push(FuzzHit {
                    url: url.to_string(),
                    param: name.to_string(),
                    value: value.to_string(),
                    baseline_status: baseline.status,
                    status,
                    note,
                });
                break;
            }
        }
    }

    state.fuzz_results.extend(hits);
}

/// Signal priority: error patterns beat status changes beat size drift.
/// 429/503 status flips are throttling noise, not behavior changes.
pub fn classify(
    baseline: &Baseline,
    status: u16,
    size: usize,
    body_lower: &str,
) -> Option<FuzzSignal> {
    for pattern in PATH_DISCLOSURE_PATTERNS.iter().copied() {
        if body_lower.contains(pattern) && !baseline.body_lower.contains(pattern) {
            return Some(FuzzSignal::PathDisclosure(pattern));
        }
    }
    for pattern in DB_ERROR_PATTERNS.iter().copied() {
        if body_lower.contains(pattern) && !baseline.body_lower.contains(pattern) {
            return Some(FuzzSignal::DbError(pattern));
        }
    }
    for pattern in GENERIC_ERROR_PATTERNS.iter().copied() {
        if body_lower.contains(pattern) && !baseline.body_lower.contains(pattern) {
            return Some(FuzzSignal::GenericError(pattern));
        }
    }
    if status != baseline.status && status != 429 && status != 503 {
        return Some(FuzzSignal::StatusChange);
    }
    let delta = size.abs_diff(baseline.size);
    if delta > SIZE_DELTA_BYTES && delta as f64 > baseline.size as f64 * SIZE_DELTA_RATIO {
        return Some(FuzzSignal::SizeChange);
    }
    None
}

fn describe(
    signal: FuzzSignal,
    param: &str,
    baseline: &Baseline,
    status: u16,
) -> (Severity, String, String) {
    match signal {
        FuzzSignal::PathDisclosure(pattern) => (
            Severity::High,
            format!("Path disclosure via hidden parameter '{}'", param),
            format!("Filesystem path pattern '{}' appeared in the response.", pattern),
        ),
        FuzzSignal::DbError(pattern) => (
            Severity::High,
            format!("Database error via hidden parameter '{}'", param),
            format!("Database error pattern '{}' appeared in the response.", pattern),
        ),
        FuzzSignal::GenericError(pattern) => (
            Severity::Medium,
            format!("Error triggered by hidden parameter '{}'", param),
            format!("Error pattern '{}' appeared in the response.", pattern),
        ),
        FuzzSignal::StatusChange => (
            Severity::Medium,
            format!("Status change via hidden parameter '{}'", param),
            format!("Status changed {} -> {}.", baseline.status, status),
        ),
        FuzzSignal::SizeChange => (
            Severity::Low,
            format!("Response change via hidden parameter '{}'", param),
            format!("Response size drifted from {} bytes.", baseline.size),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> Baseline {
        Baseline {
            status: 200,
            size: 500,
            body_lower: "<html>search results</html>".to_string(),
        }
    }

    #[test]
    fn path_disclosure_outranks_status_change() {
        let signal = classify(&baseline(), 500, 5000, "error in /var/www/html/index.php");
        assert_eq!(signal, Some(FuzzSignal::PathDisclosure("/var/www")));
    }

    #[test]
    fn preexisting_patterns_do_not_fire() {
        let base = Baseline {
            status: 200,
            size: 500,
            body_lower: "warning: deprecated call".to_string(),
        };
        assert_eq!(classify(&base, 200, 510, "warning: deprecated call"), None);
    }

    #[test]
    fn throttling_statuses_are_ignored() {
        assert_eq!(classify(&baseline(), 429, 500, "rate limited"), None);
        assert_eq!(classify(&baseline(), 503, 500, "unavailable"), None);
        assert_eq!(
            classify(&baseline(), 404, 500, "missing"),
            Some(FuzzSignal::StatusChange)
        );
    }

    #[test]
    fn size_drift_needs_both_thresholds() {
        // 350 bytes over a 500-byte baseline: > 300 bytes and > 20%.
        assert_eq!(
            classify(&baseline(), 200, 850, "bigger page"),
            Some(FuzzSignal::SizeChange)
        );
        // 310 bytes over a 10 KB baseline: > 300 bytes but only ~3%.
        let big = Baseline { status: 200, size: 10_000, body_lower: String::new() };
        assert_eq!(classify(&big, 200, 10_310, "page"), None);
    }
}
