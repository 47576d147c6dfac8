use crate::cookie_settings::CookieSettings;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt::{self, Debug, Formatter};
use trillium::{Conn, Handler};
use trillium_cookies::CookiesConnExt;

/**
A high-entropy random value held in its own cookie, used for
cross-site request forgery protection with the double-submit pattern:
a request mutating state must carry the same value both in the cookie
and in a header or form field, which a cross-origin attacker cannot
arrange.

The token is deliberately not bound to the authenticated identity:
its validity is "the submitted value equals the cookie value", checked
by request-guard middleware, not by anything in this crate.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrfToken {
    token: String,
}

impl CsrfToken {
    /// The random value, as it should appear in the submitted header
    /// or form field.
    pub fn token(&self) -> &str {
        &self.token
    }
}

/**
Manages the cookie side of the double-submit csrf pattern.

[`generate`][CsrfStore::generate] mints fresh tokens,
[`load`][CsrfStore::load] reads whatever the request presented
(checking nothing beyond presence), and [`save`][CsrfStore::save]
writes or expires the cookie. Validating a submitted request against
the cookie belongs to the request-guard middleware consuming this
store.

Requires [`CookiesHandler`][trillium_cookies::CookiesHandler] to have
run on the conn.
*/
pub struct CsrfStore {
    cookie: CookieSettings,
    rng: SystemRandom,
}

impl Debug for CsrfStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfStore")
            .field("cookie", &self.cookie)
            .finish()
    }
}

impl CsrfStore {
    /**
    Constructs a csrf store.

    # Defaults

    * cookie name: `"_csrf"`
    * cookie path: unset, the cookie's natural path
    * cookie max-age: one hour
    */
    pub fn new() -> Self {
        Self {
            cookie: CookieSettings::new("_csrf", Some(3600)),
            rng: SystemRandom::new(),
        }
    }

    /// Sets the name of the csrf cookie.
    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie.name = cookie_name.into();
        self
    }

    /// Sets the path of the csrf cookie.
    pub fn with_cookie_path(mut self, cookie_path: impl Into<String>) -> Self {
        self.cookie.path = Some(cookie_path.into());
        self
    }

    /// Sets the max-age of the csrf cookie, in seconds.
    pub fn with_cookie_max_age_seconds(mut self, seconds: u32) -> Self {
        self.cookie.max_age_seconds = Some(seconds);
        self
    }

    /// A fresh token: 128 bits from the system's secure randomness.
    pub fn generate(&self) -> CsrfToken {
        let mut bytes = [0u8; 16];
        self.rng.fill(&mut bytes).expect("secure randomness");

        CsrfToken {
            token: URL_SAFE_NO_PAD.encode(bytes),
        }
    }

    /// The token presented on the request, if any.
    pub fn load(&self, conn: &Conn) -> Option<CsrfToken> {
        conn.cookies()
            .get(self.cookie.name())
            .map(|cookie| CsrfToken {
                token: String::from(cookie.value()),
            })
    }

    /// Writes the csrf cookie, or expires it when `token` is `None`.
    pub fn save(&self, conn: &mut Conn, token: Option<&CsrfToken>) {
        let secure = conn.is_secure();
        let cookie = match token {
            Some(token) => self.cookie.build(secure, token.token.clone()),
            None => self.cookie.removal(secure),
        };
        conn.cookies_mut().add(cookie);
    }
}

impl Default for CsrfStore {
    fn default() -> Self {
        Self::new()
    }
}

/**
State marker instructing the [`CsrfHandler`] to reissue the csrf
cookie when this response is sent.

[`SecurityContextHandler`][crate::SecurityContextHandler] sets this
when a request transitions from unauthenticated to authenticated, so a
token handed out before login cannot be replayed against the logged-in
session. Set it yourself if your glue detects logins some other way.
*/
#[derive(Clone, Copy, Debug)]
pub struct RotateCsrf;

/**
Ensures every browser holds a csrf token cookie, and rotates it on
login.

On `run`, the inbound token (or a freshly generated one, when the
request carried none) is stashed in the conn's state for application
handlers to embed in forms via [`CsrfConnExt::csrf_token`]. On
`before_send`, a [`RotateCsrf`] marker causes a replacement token to
be issued. Tokens are otherwise left untouched across requests, so
forms open in other tabs keep working.

Compose after [`CookiesHandler`][trillium_cookies::CookiesHandler] and
before [`SecurityContextHandler`][crate::SecurityContextHandler]: the
`before_send` chain runs in reverse, and rotation has to happen after
the login has been observed.
*/
#[derive(Debug)]
pub struct CsrfHandler {
    store: CsrfStore,
}

impl CsrfHandler {
    /// Constructs a handler around the given store.
    pub fn new(store: CsrfStore) -> Self {
        Self { store }
    }
}

#[trillium::async_trait]
impl Handler for CsrfHandler {
    async fn run(&self, mut conn: Conn) -> Conn {
        let token = match self.store.load(&conn) {
            Some(token) => token,
            None => {
                let token = self.store.generate();
                self.store.save(&mut conn, Some(&token));
                token
            }
        };

        conn.with_state(token)
    }

    async fn before_send(&self, mut conn: Conn) -> Conn {
        if conn.take_state::<RotateCsrf>().is_some() {
            let token = self.store.generate();
            self.store.save(&mut conn, Some(&token));
            conn.set_state(token);
        }

        conn
    }
}

/**
Extension trait exposing the csrf token a [`CsrfHandler`] stashed on
the [`Conn`].
*/
pub trait CsrfConnExt {
    /// The csrf token for the current browser, to be embedded in
    /// forms or response headers for the client to submit back.
    fn csrf_token(&self) -> &CsrfToken;
}

impl CsrfConnExt for Conn {
    fn csrf_token(&self) -> &CsrfToken {
        self.state()
            .expect("CsrfHandler must be executed before calling CsrfConnExt::csrf_token")
    }
}
