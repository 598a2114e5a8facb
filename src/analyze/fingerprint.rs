use crate::http_client::HttpClient;
use crate::state::ScanState;
use scraper::{Html, Selector};

/// Technology fingerprinting: headers, asset URLs, generator meta tag.
/// Results feed the CVE lookup phase.
pub async fn run(state: &mut ScanState, http: &HttpClient) {
    let resp = match http.get(&state.target).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!("tech fingerprint failed: {}", e);
            return;
        }
    };

    let powered = resp
        .headers()
        .get("x-powered-by")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let server = resp
        .headers()
        .get("server")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if state.target.contains(".php") || powered.is_some() {
        let version = powered.clone().unwrap_or_else(|| "unknown version".into());
        state
            .tech_stack
            .insert("language".into(), format!("PHP ({})", version));
    }
    if let Some(server) = server {
        state.tech_stack.insert("web_server".into(), server);
    }

    let body = match resp.text().await {
        Ok(body) => body,
        Err(_) => return,
    };

    let (assets, generator) = extract_assets(&body);
    for asset in assets {
        let lower = asset.to_lowercase();
        for lib in ["jquery", "bootstrap", "angular", "react", "vue"] {
            if lower.contains(lib) {
                state.tech_stack.entry(lib.to_string()).or_insert(asset.clone());
            }
        }
    }
    if let Some(generator) = generator {
        state.tech_stack.insert("generator".into(), generator);
    }

    if !state.tech_stack.is_empty() {
        tracing::info!("detected technologies: {:?}", state.tech_stack);
    }
}

/// Script/stylesheet URLs and the generator meta tag, if any.
fn extract_assets(html: &str) -> (Vec<String>, Option<String>) {
    let doc = Html::parse_document(html);
    let script_sel = Selector::parse("script[src]").unwrap();
    let link_sel = Selector::parse("link[href]").unwrap();
    let meta_sel = Selector::parse("meta[name=generator]").unwrap();

    let mut assets = Vec::new();
    for el in doc.select(&script_sel) {
        if let Some(src) = el.value().attr("src") {
            assets.push(src.to_string());
        }
    }
    for el in doc.select(&link_sel) {
        if let Some(href) = el.value().attr("href") {
            assets.push(href.to_string());
        }
    }
    let generator = doc
        .select(&meta_sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string);
    (assets, generator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_assets_and_generator() {
        let html = r#"<html><head>
            <meta name="generator" content="WordPress 6.2">
            <script src="/js/jquery-3.6.0.min.js"></script>
            <link rel="stylesheet" href="/css/bootstrap.min.css">
        </head><body></body></html>"#;
        let (assets, generator) = extract_assets(html);
        assert_eq!(assets.len(), 2);
        assert!(assets.iter().any(|a| a.contains("jquery")));
        assert_eq!(generator.as_deref(), Some("WordPress 6.2"));
    }
}
