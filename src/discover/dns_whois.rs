use crate::http_client::HttpClient;
use crate::state::{DnsRecord, ScanState};
use crate::utils;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const WHOIS_TIMEOUT: Duration = Duration::from_secs(10);

/// DNS record collection plus a best-effort WHOIS query. Both legs swallow
/// failures; later phases never depend on their presence.
pub async fn run(state: &mut ScanState, _http: &HttpClient) {
    collect_dns(state).await;
    collect_whois(state).await;
}

async fn collect_dns(state: &mut ScanState) {
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    let name = format!("{}.", state.host);

    if let Ok(lookup) = resolver.ipv4_lookup(name.clone()).await {
        for r in lookup.iter() {
            state.dns_records.push(DnsRecord { record_type: "A".into(), value: r.0.to_string() });
        }
    }
    if let Ok(lookup) = resolver.ipv6_lookup(name.clone()).await {
        for r in lookup.iter() {
            state
                .dns_records
                .push(DnsRecord { record_type: "AAAA".into(), value: r.0.to_string() });
        }
    }
    if let Ok(lookup) = resolver.mx_lookup(name.clone()).await {
        for r in lookup.iter() {
            state.dns_records.push(DnsRecord {
                record_type: "MX".into(),
                value: format!("{} {}", r.preference(), r.exchange()),
            });
        }
    }
    if let Ok(lookup) = resolver.ns_lookup(name.clone()).await {
        for r in lookup.iter() {
            state.dns_records.push(DnsRecord { record_type: "NS".into(), value: r.0.to_string() });
        }
    }
    if let Ok(lookup) = resolver.txt_lookup(name).await {
        for r in lookup.iter() {
            state.dns_records.push(DnsRecord { record_type: "TXT".into(), value: r.to_string() });
        }
    }

    tracing::info!("found {} DNS records", state.dns_records.len());
}

async fn collect_whois(state: &mut ScanState) {
    let apex = utils::apex_domain(&state.host);
    let iana = match whois_query("whois.iana.org", &apex).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!("WHOIS referral lookup failed: {}", e);
            return;
        }
    };

    let referral = iana
        .lines()
        .find_map(|line| line.strip_prefix("refer:"))
        .map(|s| s.trim().to_string());

    let raw = match referral {
        Some(server) => match whois_query(&server, &apex).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!("WHOIS query against {} failed: {}", server, e);
                iana
            }
        },
        None => iana,
    };

    state.whois_info = parse_whois(&raw);
    if let Some(registrar) = state.whois_info.get("registrar") {
        tracing::info!("WHOIS registrar: {}", registrar);
    }
}

async fn whois_query(server: &str, query: &str) -> anyhow::Result<String> {
    let mut stream = timeout(WHOIS_TIMEOUT, TcpStream::connect((server, 43))).await??;
    stream.write_all(format!("{}\r\n", query).as_bytes()).await?;
    let mut raw = Vec::new();
    timeout(WHOIS_TIMEOUT, stream.read_to_end(&mut raw)).await??;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Registry responses are `key: value` lines with wildly varying key names;
/// the first occurrence of each normalized key wins.
fn parse_whois(raw: &str) -> BTreeMap<String, String> {
    let mut info = BTreeMap::new();
    let mut name_servers = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.starts_with('%') || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else { continue };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.as_str() {
            "registrar" => {
                info.entry("registrar".to_string())
                    .or_insert_with(|| value.to_string());
            }
            "creation date" | "created" | "registered on" => {
                info.entry("creation_date".to_string())
                    .or_insert_with(|| value.to_string());
            }
            "registry expiry date" | "expiration date" | "expiry date" | "expires" => {
                info.entry("expiration_date".to_string())
                    .or_insert_with(|| value.to_string());
            }
            "name server" | "nserver" => {
                if name_servers.len() < 4 {
                    name_servers.push(value.to_lowercase());
                }
            }
            "country" | "registrant country" => {
                info.entry("country".to_string())
                    .or_insert_with(|| value.to_string());
            }
            _ => {}
        }
    }

    if !name_servers.is_empty() {
        info.insert("name_servers".to_string(), name_servers.join(", "));
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_registry_style_whois() {
        let raw = "\
% Terms of use apply\n\
Domain Name: EXAMPLE.COM\n\
Registrar: Example Registrar, Inc.\n\
Creation Date: 1995-08-14T04:00:00Z\n\
Registry Expiry Date: 2026-08-13T04:00:00Z\n\
Name Server: A.IANA-SERVERS.NET\n\
Name Server: B.IANA-SERVERS.NET\n\
Country: US\n";
        let info = parse_whois(raw);
        assert_eq!(info["registrar"], "Example Registrar, Inc.");
        assert_eq!(info["creation_date"], "1995-08-14T04:00:00Z");
        assert_eq!(info["expiration_date"], "2026-08-13T04:00:00Z");
        assert_eq!(info["name_servers"], "a.iana-servers.net, b.iana-servers.net");
        assert_eq!(info["country"], "US");
    }

    #[test]
    fn first_value_wins_for_duplicate_keys() {
        let raw = "Registrar: First\nRegistrar: Second\n";
        let info = parse_whois(raw);
        assert_eq!(info["registrar"], "First");
    }
}
