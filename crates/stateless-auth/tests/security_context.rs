use serde::{Deserialize, Serialize};
use trillium::KnownHeaderName;
use trillium_cookies::{
    cookie::{time::Duration, Cookie, CookieJar},
    CookiesConnExt, CookiesHandler,
};
use trillium_stateless_auth::{
    JsonPrincipalSerializer, SecurityContextConnExt, SecurityContextHandler,
    SecurityContextStore, TokenCodec,
};
use trillium_testing::{prelude::*, TestConn};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct User {
    name: String,
}

const SECRET: [u8; 32] = *b"01234567890123456789012345678901";

fn store() -> SecurityContextStore<JsonPrincipalSerializer<User>> {
    SecurityContextStore::new(TokenCodec::new(SECRET), JsonPrincipalSerializer::new())
}

fn app() -> impl trillium::Handler {
    (
        CookiesHandler::new(),
        SecurityContextHandler::new(store()),
        |mut conn: trillium::Conn| async move {
            if conn.path() == "/login" {
                let name = String::from(conn.querystring().trim_start_matches("name="));
                return conn.with_principal(User { name }).ok("logged in");
            }

            if conn.path() == "/logout" {
                conn.security_context_mut::<User>().clear();
                return conn.ok("logged out");
            }

            let name = conn.principal::<User>().map(|user| user.name.clone());
            match name {
                Some(name) => conn.ok(format!("hello, {name}")),
                None => conn.ok("anonymous"),
            }
        },
    )
}

fn set_cookies(conn: &mut TestConn) -> Vec<Cookie<'static>> {
    let mut cookies = vec![];
    if let Some(values) = conn.headers_mut().get_values(KnownHeaderName::SetCookie) {
        for value in values.iter() {
            if let Some(value) = value.as_str() {
                cookies.push(Cookie::parse_encoded(String::from(value)).unwrap());
            }
        }
    }
    cookies
}

/// a conn that has been through the cookies handler only, for driving
/// the store directly
fn bare_conn() -> TestConn {
    let mut conn = get("/").on(&());
    conn.set_state(CookieJar::new());
    conn
}

#[test]
fn anonymous_requests_are_left_without_a_cookie() {
    let app = app();
    let mut conn = get("/").on(&app);
    assert_ok!(&mut conn, "anonymous");
    assert!(set_cookies(&mut conn).is_empty());
}

#[test]
fn logging_in_issues_a_sealed_cookie_that_logs_back_in() {
    let app = app();

    let mut conn = get("/login?name=kay").on(&app);
    assert_ok!(&mut conn, "logged in");

    let cookies = set_cookies(&mut conn);
    assert_eq!(cookies.len(), 1);
    let cookie = &cookies[0];

    assert_eq!(cookie.name(), "authentication");
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.secure(), Some(false));
    assert_eq!(cookie.max_age(), Some(Duration::seconds(3600)));
    assert!(!cookie.value().contains("kay"));

    assert_ok!(
        get("/")
            .with_request_header(
                "cookie",
                format!("authentication={}", cookie.value())
            )
            .on(&app),
        "hello, kay"
    );
}

#[test]
fn a_tampered_cookie_is_unauthenticated_and_cleared() {
    let app = app();

    let mut conn = get("/login?name=kay").on(&app);
    let token = set_cookies(&mut conn)[0].value().to_string();
    let tampered: String = token.chars().rev().collect();

    let mut conn = get("/")
        .with_request_header("cookie", format!("authentication={tampered}"))
        .on(&app);
    assert_ok!(&mut conn, "anonymous");

    let cookies = set_cookies(&mut conn);
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].name(), "authentication");
    assert_eq!(cookies[0].value(), "");
    assert_eq!(cookies[0].max_age(), Some(Duration::ZERO));
}

#[test]
fn logging_out_expires_the_cookie() {
    let app = app();

    let mut conn = get("/login?name=kay").on(&app);
    let token = set_cookies(&mut conn)[0].value().to_string();

    let mut conn = get("/logout")
        .with_request_header("cookie", format!("authentication={token}"))
        .on(&app);
    assert_ok!(&mut conn, "logged out");

    let cookies = set_cookies(&mut conn);
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].value(), "");
    assert_eq!(cookies[0].max_age(), Some(Duration::ZERO));
}

#[test]
fn a_handle_saves_at_most_once() {
    let store = store();
    let mut conn = bare_conn();

    let (mut context, mut handle) = store.load(&mut conn);
    context.set_authentication(User {
        name: String::from("first"),
    });
    store.save(&mut handle, &mut conn, &context);
    assert!(handle.is_saved());

    let first_write = conn
        .cookies()
        .get("authentication")
        .unwrap()
        .value()
        .to_string();

    context.set_authentication(User {
        name: String::from("second"),
    });
    store.save(&mut handle, &mut conn, &context);

    let after_second_save = conn
        .cookies()
        .get("authentication")
        .unwrap()
        .value()
        .to_string();

    assert_eq!(first_write, after_second_save);
    assert_eq!(conn.cookies().delta().count(), 1);
}

#[test]
fn an_unchanged_empty_context_writes_nothing() {
    let store = store();
    let mut conn = bare_conn();

    let (context, mut handle) = store.load(&mut conn);
    assert!(!context.is_authenticated());
    store.save(&mut handle, &mut conn, &context);

    assert_eq!(conn.cookies().delta().count(), 0);
}

#[test]
fn secure_transports_get_secure_cookies() {
    let store = store();
    let mut conn = bare_conn();
    conn.inner_mut().set_secure(true);

    let (mut context, mut handle) = store.load(&mut conn);
    context.set_authentication(User {
        name: String::from("kay"),
    });
    store.save(&mut handle, &mut conn, &context);

    let cookie = conn.cookies().get("authentication").unwrap();
    assert_eq!(cookie.secure(), Some(true));
    assert_eq!(cookie.http_only(), Some(true));
}

#[test]
fn loading_an_invalid_cookie_schedules_removal() {
    let store = store();
    let mut conn = bare_conn();
    conn.cookies_mut()
        .add_original(Cookie::new("authentication", "never a valid token"));

    let (context, handle) = store.load(&mut conn);
    assert!(!context.is_authenticated());
    assert!(handle.had_cookie());
    assert!(!handle.was_authenticated());

    let scheduled = conn.cookies().get("authentication").unwrap();
    assert_eq!(scheduled.value(), "");
    assert_eq!(scheduled.max_age(), Some(Duration::ZERO));
}

#[test]
fn contains_reports_presence_not_validity() {
    let store = store();

    let mut conn = bare_conn();
    assert!(!store.contains(&conn));

    conn.cookies_mut()
        .add_original(Cookie::new("authentication", "garbage"));
    assert!(store.contains(&conn));
}

#[test]
fn cookie_name_is_configurable() {
    let store = store().with_cookie_name("session");
    let mut conn = bare_conn();

    let (mut context, mut handle) = store.load(&mut conn);
    context.set_authentication(User {
        name: String::from("kay"),
    });
    store.save(&mut handle, &mut conn, &context);

    assert!(conn.cookies().get("session").is_some());
    assert!(conn.cookies().get("authentication").is_none());
}
