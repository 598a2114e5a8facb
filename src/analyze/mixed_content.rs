use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::state::ScanState;
use ahash::AHashSet;
use scraper::{Html, Selector};

const PAGE_BUDGET: usize = 10;

#[derive(Debug, PartialEq, Eq)]
enum ResourceClass {
    Active,
    Passive,
    InlineStyle,
}

/// Plain-HTTP resources referenced from HTTPS pages. Active content (scripts,
/// frames) rates higher than passive media.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    if state.scheme != "https" {
        tracing::debug!("target is not HTTPS, skipping mixed-content check");
        return;
    }

    let mut pages = vec![state.target.clone()];
    pages.extend(state.discovered_urls.iter().take(PAGE_BUDGET).cloned());
    pages.dedup();

    let mut seen: AHashSet<(String, String)> = AHashSet::new();
    for page in pages {
        let Ok(resp) = http.get(&page).await else { continue };
        let Ok(body) = resp.text().await else { continue };

        for (class, tag, resource) in scan_page(&body) {
            if !seen.insert((page.clone(), resource.clone())) {
                continue;
            }
            let (severity, label) = match class {
                ResourceClass::Active => (Severity::High, "Active mixed content"),
                ResourceClass::Passive => (Severity::Medium, "Passive mixed content"),
                ResourceClass::InlineStyle => (Severity::Medium, "Mixed content in stylesheet"),
            };
            findings.add(
                severity,
                "Mixed Content",
                format!("{}: <{}>", label, tag),
                format!("Page: {}\nResource: {}", page, resource),
                "Serve all subresources over HTTPS.",
            );
        }
    }
}

fn scan_page(html: &str) -> Vec<(ResourceClass, &'static str, String)> {
    let doc = Html::parse_document(html);
    let mut hits = Vec::new();

    let active: &[(&'static str, &str, &str)] = &[
        ("script", "script[src]", "src"),
        ("iframe", "iframe[src]", "src"),
        ("object", "object[data]", "data"),
        ("embed", "embed[src]", "src"),
    ];
    let passive: &[(&'static str, &str, &str)] = &[
        ("img", "img[src]", "src"),
        ("audio", "audio[src]", "src"),
        ("video", "video[src]", "src"),
        ("source", "source[src]", "src"),
        ("link", "link[href]", "href"),
    ];

    for (tag, selector, attr) in active {
        let sel = Selector::parse(selector).unwrap();
        for el in doc.select(&sel) {
            if let Some(value) = el.value().attr(attr) {
                if value.starts_with("http://") {
                    hits.push((ResourceClass::Active, *tag, value.to_string()));
                }
            }
        }
    }
    for (tag, selector, attr) in passive {
        let sel = Selector::parse(selector).unwrap();
        for el in doc.select(&sel) {
            if let Some(value) = el.value().attr(attr) {
                if value.starts_with("http://") {
                    hits.push((ResourceClass::Passive, *tag, value.to_string()));
                }
            }
        }
    }

    let style_sel = Selector::parse("style").unwrap();
    for el in doc.select(&style_sel) {
        let css: String = el.text().collect();
        if css.contains("http://") {
            hits.push((ResourceClass::InlineStyle, "style", "inline stylesheet".into()));
        }
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_active_and_passive_resources() {
        let html = r#"<html><head>
            <script src="http://cdn.example.com/a.js"></script>
            <style>body { background: url(http://cdn.example.com/bg.png); }</style>
        </head><body>
            <img src="http://cdn.example.com/pic.jpg">
            <img src="https://cdn.example.com/safe.jpg">
        </body></html>"#;
        let hits = scan_page(html);
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().any(|(c, t, _)| *c == ResourceClass::Active && *t == "script"));
        assert!(hits.iter().any(|(c, t, _)| *c == ResourceClass::Passive && *t == "img"));
        assert!(hits.iter().any(|(c, _, _)| *c == ResourceClass::InlineStyle));
    }
}
