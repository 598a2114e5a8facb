use crate::http_client::HttpClient;
use crate::state::ScanState;
use ahash::AHashSet;
use scraper::{Html, Selector};
use url::Url;

const SKIP_PREFIXES: &[&str] = &["#", "javascript:", "mailto:", "tel:"];

/// Bounded-depth, same-origin BFS starting at the target. Fills
/// `state.discovered_urls`.
pub async fn run(state: &mut ScanState, http: &HttpClient, depth: usize) {
    let mut visited: AHashSet<String> = AHashSet::new();
    let mut frontier = vec![state.target_url.clone()];

    for _ in 0..depth {
        let mut next = Vec::new();
        for url in frontier.drain(..) {
            if !visited.insert(url.to_string()) {
                continue;
            }
            let Ok(resp) = http.get(url.as_str()).await else { continue };
            let Ok(body) = resp.text().await else { continue };

            for link in extract_links(&body, &url) {
                if state.add_discovered(&link) && !visited.contains(link.as_str()) {
                    next.push(link);
                }
            }
        }
        frontier = next;
    }

    tracing::info!("crawl discovered {} URLs", state.discovered_urls.len());
}

/// All href/src/action references on a page, resolved against the page URL.
/// Fragment-only and non-HTTP scheme links are rejected.
pub fn extract_links(html: &str, base: &Url) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("a, form, script, link, img, iframe").unwrap();

    let mut links = Vec::new();
    for el in doc.select(&sel) {
        let attrs = el.value();
        let href = attrs
            .attr("href")
            .or_else(|| attrs.attr("src"))
            .or_else(|| attrs.attr("action"))
            .unwrap_or("");
        if href.is_empty() || SKIP_PREFIXES.iter().any(|p| href.starts_with(p)) {
            continue;
        }
        let Ok(mut resolved) = base.join(href) else { continue };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }
        resolved.set_fragment(None);
        links.push(resolved);
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_and_resolves_links() {
        let base = Url::parse("https://example.com/dir/page.html").unwrap();
        let html = r##"<html><body>
            <a href="/about">About</a>
            <a href="next.html">Next</a>
            <a href="#section">Frag</a>
            <a href="javascript:void(0)">JS</a>
            <a href="mailto:a@example.com">Mail</a>
            <img src="/logo.png">
            <form action="/submit"></form>
        </body></html>"##;
        let links = extract_links(html, &base);
        let strings: Vec<String> = links.iter().map(|u| u.to_string()).collect();
        assert!(strings.contains(&"https://example.com/about".to_string()));
        assert!(strings.contains(&"https://example.com/dir/next.html".to_string()));
        assert!(strings.contains(&"https://example.com/logo.png".to_string()));
        assert!(strings.contains(&"https://example.com/submit".to_string()));
        assert_eq!(links.len(), 4);
    }

    #[test]
    fn fragments_are_stripped_from_links() {
        let base = Url::parse("https://example.com/").unwrap();
        let links = extract_links(r##"<a href="/page#top">x</a>"##, &base);
        assert_eq!(links[0].to_string(), "https://example.com/page");
    }
}
