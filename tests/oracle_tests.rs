use tupisec::payloads::{SSTI_PAYLOADS, XSS_PAYLOADS};
use tupisec::probe::sqli::matches_sql_error;
use tupisec::probe::ssrf::matches_metadata_indicator;
use tupisec::probe::xxe::matches_file_disclosure;
use tupisec::security::jwt_analyzer::{brute_force_weak_secret, decode_segment, sign_hs256};

#[test]
fn sql_error_page_is_a_critical_signal() {
    let body = "Error: You have an error in your SQL syntax near ''1'='1' at line 1";
    assert_eq!(matches_sql_error(body), Some("sql syntax"));
}

#[test]
fn xss_payload_literal_reflection() {
    let payload = XSS_PAYLOADS[0];
    assert_eq!(payload, "<script>alert('XSS')</script>");
    let body = format!("<html>search for {}</html>", payload);
    assert!(body.contains(payload));
}

#[test]
fn ssti_first_pair_evaluates_to_49() {
    let (payload, expected) = SSTI_PAYLOADS[0];
    assert_eq!((payload, expected), ("{{7*7}}", "49"));
    let rendered_body = "<p>Hello 49</p>";
    assert!(rendered_body.contains(expected));
}

#[test]
fn jwt_alg_none_is_detected() {
    let token = "eyJhbGciOiJub25lIn0.eyJ1c2VyIjoiYSJ9.";
    let header = decode_segment(token.split('.').next().unwrap()).unwrap();
    assert_eq!(header["alg"], "none");
}

#[test]
fn jwt_signed_with_secret_is_cracked() {
    // Well-known header/payload segments, signed with the literal secret "secret".
    let message = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.\
                   eyJzdWIiOiIxMjM0NTY3ODkwIiwibmFtZSI6IkpvaG4gRG9lIiwiaWF0IjoxNTE2MjM5MDIyfQ";
    let message: String = message.split_whitespace().collect();
    let token = format!("{}.{}", message, sign_hs256(&message, "secret").unwrap());
    assert_eq!(brute_force_weak_secret(&token), Some("secret"));
}

#[test]
fn ssrf_metadata_and_xxe_passwd_oracles() {
    assert!(matches_metadata_indicator("instance-id: i-0abc").is_some());
    assert!(matches_metadata_indicator("<html>ok</html>").is_none());
    assert!(matches_file_disclosure("root:x:0:0:root:/root:/bin/bash").is_some());
}
