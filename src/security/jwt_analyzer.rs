use crate::findings::{FindingStore, Severity};
use crate::http_client::HttpClient;
use crate::payloads::{JWT_REGEX, JWT_SENSITIVE_KEYS, JWT_WEAK_SECRETS};
use crate::state::ScanState;
use crate::utils;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

const TOKEN_BUDGET: usize = 3;

type HmacSha256 = Hmac<Sha256>;

/// JWT surface analysis: tokens harvested from the response are decoded and
/// checked for alg:none, missing expiry, sensitive claims, weak HMAC secrets,
/// and live alg:none acceptance.
pub async fn run(state: &ScanState, http: &HttpClient, findings: &FindingStore) {
    let Ok(resp) = http.get(&state.target).await else {
        tracing::warn!("JWT scan could not reach the target");
        return;
    };
    let unauth_status = resp.status().as_u16();

    let mut haystack = String::new();
    for value in resp.headers().values() {
        if let Ok(v) = value.to_str() {
            haystack.push_str(v);
            haystack.push('\n');
        }
    }
    if let Ok(body) = resp.text().await {
        haystack.push_str(&body);
    }

    let tokens = extract_tokens(&haystack);
    if tokens.is_empty() {
        tracing::info!("no JWTs observed");
        return;
    }

    for token in tokens.iter().take(TOKEN_BUDGET) {
        analyze_token(state, http, findings, token, unauth_status).await;
    }
}

/// Unique JWT-shaped strings in order of appearance.
pub fn extract_tokens(haystack: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for m in JWT_REGEX.find_iter(haystack) {
        let token = m.as_str().to_string();
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

async fn analyze_token(
    state: &ScanState,
    http: &HttpClient,
    findings: &FindingStore,
    token: &str,
    unauth_status: u16,
) {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return;
    }
    let (Some(header), Some(payload)) = (decode_segment(parts[0]), decode_segment(parts[1]))
    else {
        return;
    };

    let alg = header
        .get("alg")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    let masked = utils::mask_secret(token);

    if alg.eq_ignore_ascii_case("none") {
        findings.add(
            Severity::Critical,
            "JWT",
            "JWT uses alg:none",
            format!("Token {} declares no signature algorithm at all.", masked),
            "Reject unsigned tokens. Pin the expected algorithm server-side.",
        );
    }

    if payload.get("exp").is_none() {
        findings.add(
            Severity::Medium,
            "JWT",
            "JWT without expiration claim",
            format!("Token {} carries no exp claim and never expires.", masked),
            "Always set a short exp claim on issued tokens.",
        );
    }

    let sensitive: Vec<&str> = payload
        .as_object()
        .map(|obj| {
            JWT_SENSITIVE_KEYS
                .iter()
                .filter(|k| obj.contains_key(**k))
                .copied()
                .collect()
        })
        .unwrap_or_default();
    if !sensitive.is_empty() {
        findings.add(
            Severity::High,
            "JWT",
            "Sensitive data in JWT payload",
            format!(
                "Token {} exposes claims: {}. JWT payloads are only encoded, not encrypted.",
                masked,
                sensitive.join(", ")
            ),
            "Keep secrets and PII out of JWT payloads.",
        );
    }

    // Active check: does the server honor a forged unsigned token?
    if let Some(forged) = forge_none_token(token) {
        if let Ok(resp) = http
            .client()
            .get(&state.target)
            .header("Authorization", format!("Bearer {}", forged))
            .send()
            .await
        {
            if resp.status().as_u16() == 200 && unauth_status != 200 {
                findings.add(
                    Severity::Critical,
                    "JWT",
                    "Server accepts alg:none JWTs",
                    format!(
                        "A forged unsigned token derived from {} was accepted (200) where the \
                         unauthenticated request was not ({}).",
                        masked, unauth_status
                    ),
                    "Verify signatures with a pinned algorithm; never trust the token header.",
                );
            }
        }
    }

    if alg.to_uppercase().starts_with("HS") {
        if let Some(secret) = brute_force_weak_secret(token) {
            let shown = if secret.is_empty() { "<empty string>" } else { secret };
            findings.add(
                Severity::Critical,
                "JWT",
                "JWT signed with weak secret",
                format!("Token {} verifies against the secret '{}'.", masked, shown),
                "Use a long random signing secret or an asymmetric algorithm.",
            );
        }
    }
}

pub fn decode_segment(segment: &str) -> Option<Value> {
    let raw = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&raw).ok()
}

/// `{alg:none}` header, original payload, empty signature.
pub fn forge_none_token(token: &str) -> Option<String> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    Some(format!("{}.{}.", header, parts[1]))
}

/// HMAC-SHA256 the signing input with each catalog secret and compare against
/// the token's third segment.
pub fn brute_force_weak_secret(token: &str) -> Option<&'static str> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts[2].is_empty() {
        return None;
    }
    let message = format!("{}.{}", parts[0], parts[1]);
    JWT_WEAK_SECRETS
        .iter()
        .find(|secret| sign_hs256(&message, secret).as_deref() == Some(parts[2]))
        .copied()
}

pub fn sign_hs256(message: &str, secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(message.as_bytes());
    Some(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hs256_token(secret: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"1234","name":"John Doe"}"#);
        let message = format!("{}.{}", header, payload);
        let signature = sign_hs256(&message, secret).unwrap();
        format!("{}.{}", message, signature)
    }

    #[test]
    fn alg_none_token_decodes() {
        let token = "eyJhbGciOiJub25lIn0.eyJ1c2VyIjoiYSJ9.";
        let parts: Vec<&str> = token.split('.').collect();
        let header = decode_segment(parts[0]).unwrap();
        assert_eq!(header["alg"], "none");
        let payload = decode_segment(parts[1]).unwrap();
        assert_eq!(payload["user"], "a");
    }

    #[test]
    fn weak_secret_is_recovered() {
        let token = hs256_token("secret");
        assert_eq!(brute_force_weak_secret(&token), Some("secret"));
    }

    #[test]
    fn strong_secret_survives_the_wordlist() {
        let token = hs256_token("zK8!rT4#vQ9$wL2&xM6*yN1@pB5^cD7%");
        assert_eq!(brute_force_weak_secret(&token), None);
    }

    #[test]
    fn forged_token_has_none_header_and_empty_signature() {
        let token = hs256_token("secret");
        let forged = forge_none_token(&token).unwrap();
        assert!(forged.ends_with('.'));
        let header = decode_segment(forged.split('.').next().unwrap()).unwrap();
        assert_eq!(header["alg"], "none");
        // Original payload is preserved.
        let payload = decode_segment(forged.split('.').nth(1).unwrap()).unwrap();
        assert_eq!(payload["sub"], "1234");
    }

    #[test]
    fn extraction_finds_tokens_in_json_bodies() {
        let body = format!(r#"{{"access_token":"{}"}}"#, hs256_token("x"));
        let tokens = extract_tokens(&body);
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].starts_with("eyJ"));
    }
}
