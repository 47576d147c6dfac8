use serde::{Deserialize, Serialize};
use trillium::KnownHeaderName;
use trillium_cookies::{
    cookie::{time::Duration, Cookie, CookieJar},
    CookiesConnExt, CookiesHandler,
};
use trillium_stateless_auth::{
    CsrfConnExt, CsrfHandler, CsrfStore, JsonPrincipalSerializer, SecurityContextConnExt,
    SecurityContextHandler, SecurityContextStore, TokenCodec,
};
use trillium_testing::{prelude::*, TestConn};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct User {
    name: String,
}

const SECRET: [u8; 32] = *b"01234567890123456789012345678901";

fn app() -> impl trillium::Handler {
    (
        CookiesHandler::new(),
        CsrfHandler::new(CsrfStore::new()),
        SecurityContextHandler::new(SecurityContextStore::new(
            TokenCodec::new(SECRET),
            JsonPrincipalSerializer::<User>::new(),
        )),
        |conn: trillium::Conn| async move {
            if conn.path() == "/login" {
                let name = String::from(conn.querystring().trim_start_matches("name="));
                return conn.with_principal(User { name }).ok("logged in");
            }

            let token = String::from(conn.csrf_token().token());
            conn.ok(token)
        },
    )
}

fn set_cookie(conn: &mut TestConn, name: &str) -> Option<Cookie<'static>> {
    let values = conn.headers_mut().get_values(KnownHeaderName::SetCookie)?;
    values
        .iter()
        .filter_map(|value| value.as_str())
        .filter_map(|value| Cookie::parse_encoded(String::from(value)).ok())
        .find(|cookie| cookie.name() == name)
}

#[test]
fn a_fresh_browser_is_issued_a_token() {
    let app = app();
    let mut conn = get("/").on(&app);

    let cookie = set_cookie(&mut conn, "_csrf").unwrap();
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.secure(), Some(false));
    assert_eq!(cookie.max_age(), Some(Duration::seconds(3600)));

    // the body echoes the conn's csrf token; it is the same value the
    // cookie carries
    assert_ok!(&mut conn, &*cookie.value().to_string());
}

#[test]
fn tokens_hold_steady_across_ordinary_requests() {
    let app = app();

    let mut conn = get("/").on(&app);
    let token = set_cookie(&mut conn, "_csrf").unwrap().value().to_string();

    let mut conn = get("/")
        .with_request_header("cookie", format!("_csrf={token}"))
        .on(&app);
    assert_ok!(&mut conn, &*token);
    assert!(set_cookie(&mut conn, "_csrf").is_none());
}

#[test]
fn logging_in_rotates_the_token() {
    let app = app();

    let mut conn = get("/").on(&app);
    let before_login = set_cookie(&mut conn, "_csrf").unwrap().value().to_string();

    let mut conn = get("/login?name=kay")
        .with_request_header("cookie", format!("_csrf={before_login}"))
        .on(&app);
    assert_ok!(&mut conn, "logged in");

    let after_login = set_cookie(&mut conn, "_csrf").unwrap().value().to_string();
    assert_ne!(before_login, after_login);

    // the login also issued the authentication cookie alongside
    assert!(set_cookie(&mut conn, "authentication").is_some());
}

#[test]
fn each_login_gets_its_own_token() {
    let app = app();

    let mut conn = get("/").on(&app);
    let initial = set_cookie(&mut conn, "_csrf").unwrap().value().to_string();

    let mut conn = get("/login?name=kay")
        .with_request_header("cookie", format!("_csrf={initial}"))
        .on(&app);
    let first_login = set_cookie(&mut conn, "_csrf").unwrap().value().to_string();

    let mut conn = get("/login?name=kay")
        .with_request_header("cookie", format!("_csrf={first_login}"))
        .on(&app);
    let second_login = set_cookie(&mut conn, "_csrf").unwrap().value().to_string();

    assert_ne!(first_login, second_login);
}

#[test]
fn generated_tokens_are_distinct_and_long() {
    let store = CsrfStore::new();
    let one = store.generate();
    let two = store.generate();

    assert_ne!(one, two);
    // 128 bits, base64: 22 characters
    assert!(one.token().len() >= 22);
}

#[test]
fn saving_none_expires_the_cookie() {
    let store = CsrfStore::new();
    let mut conn = get("/").on(&());
    conn.set_state(CookieJar::new());

    store.save(&mut conn, None);

    let cookie = conn.cookies().get("_csrf").unwrap();
    assert_eq!(cookie.value(), "");
    assert_eq!(cookie.max_age(), Some(Duration::ZERO));
}

#[test]
fn load_reads_whatever_is_presented() {
    let store = CsrfStore::new();
    let mut conn = get("/").on(&());
    conn.set_state(CookieJar::new());

    assert!(store.load(&conn).is_none());

    conn.cookies_mut()
        .add_original(Cookie::new("_csrf", "anything at all"));
    assert_eq!(store.load(&conn).unwrap().token(), "anything at all");
}
