use trillium::KnownHeaderName;
use trillium_stateless_auth::HttpsOnly;
use trillium_testing::prelude::*;

#[test]
fn forwarded_http_is_redirected_to_https() {
    let handler = (HttpsOnly::new(), "ok");
    let mut conn = get("/somewhere?q=1")
        .with_request_header("x-forwarded-proto", "http")
        .with_request_header("host", "example.com")
        .on(&handler);

    assert_status!(&mut conn, 302);
    assert_eq!(
        conn.headers_mut().get_str(KnownHeaderName::Location),
        Some("https://example.com/somewhere?q=1")
    );
}

#[test]
fn forwarded_https_passes_through() {
    let handler = (HttpsOnly::new(), "ok");
    assert_ok!(
        get("/")
            .with_request_header("x-forwarded-proto", "https")
            .with_request_header("host", "example.com")
            .on(&handler),
        "ok"
    );
}

#[test]
fn unproxied_requests_pass_through() {
    let handler = (HttpsOnly::new(), "ok");
    assert_ok!(get("/").on(&handler), "ok");
}

#[test]
fn a_hostless_request_cannot_be_redirected() {
    let handler = (HttpsOnly::new(), "ok");
    assert_ok!(
        get("/")
            .with_request_header("x-forwarded-proto", "http")
            .on(&handler),
        "ok"
    );
}
