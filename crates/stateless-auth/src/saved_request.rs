use crate::cookie_settings::CookieSettings;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use trillium::{Conn, KnownHeaderName};
use trillium_cookies::CookiesConnExt;

/**
The "resume after login" target: the absolute url of a request that
was turned away for lacking authentication, captured so the browser
can be sent back there once login succeeds.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedRequest {
    redirect_url: String,
}

impl SavedRequest {
    /// The absolute url to redirect the browser to after login.
    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }
}

/**
Stores the pre-authentication request url in a cookie.

[`save`][SavedRequestCache::save] is called when an unauthenticated
request is redirected to login; [`consume`][SavedRequestCache::consume]
is called by the post-login redirect step and is the only operation
that both returns the saved request and deletes it, so each saved url
is used at most once.

The url is reconstructed from the transport scheme the request
actually arrived on, never from a forwarded-protocol header (that is
the https-enforcement layer's concern), plus the `Host` header, path,
and query, omitting the port when it is the scheme's default. The
value is base64 encoded in the cookie, since urls contain characters
that are not cookie-safe.

Requires [`CookiesHandler`][trillium_cookies::CookiesHandler] to have
run on the conn.
*/
#[derive(Clone, Debug)]
pub struct SavedRequestCache {
    cookie: CookieSettings,
}

impl SavedRequestCache {
    /**
    Constructs a saved-request cache.

    # Defaults

    * cookie name: `"_savedrequest"`
    * cookie path: unset, the cookie's natural path
    * cookie max-age: unset, so the cookie only lasts the browser
      session
    */
    pub fn new() -> Self {
        Self {
            cookie: CookieSettings::new("_savedrequest", None),
        }
    }

    /// Sets the name of the saved-request cookie.
    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie.name = cookie_name.into();
        self
    }

    /// Sets the path of the saved-request cookie.
    pub fn with_cookie_path(mut self, cookie_path: impl Into<String>) -> Self {
        self.cookie.path = Some(cookie_path.into());
        self
    }

    /// Sets a max-age for the saved-request cookie, in seconds,
    /// instead of the default browser-session lifetime.
    pub fn with_cookie_max_age_seconds(mut self, seconds: u32) -> Self {
        self.cookie.max_age_seconds = Some(seconds);
        self
    }

    /// Captures the current request's url in the cookie. A request
    /// with no `Host` header cannot be meaningfully revisited, so
    /// nothing is saved for one.
    pub fn save(&self, conn: &mut Conn) {
        let Some(url) = reconstruct_url(conn) else {
            log::warn!("not saving a request that carries no host header");
            return;
        };

        let value = URL_SAFE_NO_PAD.encode(url.as_bytes());
        let cookie = self.cookie.build(conn.is_secure(), value);
        conn.cookies_mut().add(cookie);
    }

    /// The saved request, without deleting it. An absent or
    /// undecodable cookie is `None`.
    pub fn peek(&self, conn: &Conn) -> Option<SavedRequest> {
        let cookie = conn.cookies().get(self.cookie.name())?;
        if cookie.value().is_empty() {
            // an empty value is this cache's own removal cookie
            return None;
        }
        let bytes = URL_SAFE_NO_PAD.decode(cookie.value()).ok()?;
        let redirect_url = String::from_utf8(bytes).ok()?;

        Some(SavedRequest { redirect_url })
    }

    /// The saved request, deleting it in the same step. This is the
    /// operation the post-login redirect wants; an absent cookie
    /// returns `None` and has no side effect.
    pub fn consume(&self, conn: &mut Conn) -> Option<SavedRequest> {
        let saved = self.peek(conn)?;
        self.remove(conn);
        Some(saved)
    }

    /// Expires the saved-request cookie.
    pub fn remove(&self, conn: &mut Conn) {
        let removal = self.cookie.removal(conn.is_secure());
        conn.cookies_mut().add(removal);
    }
}

impl Default for SavedRequestCache {
    fn default() -> Self {
        Self::new()
    }
}

fn reconstruct_url(conn: &Conn) -> Option<String> {
    let (scheme, default_port) = if conn.is_secure() {
        ("https", "443")
    } else {
        ("http", "80")
    };

    let host = conn.headers().get_str(KnownHeaderName::Host)?;
    let host = match host.rsplit_once(':') {
        Some((bare, port)) if port == default_port => bare,
        _ => host,
    };

    let path = conn.path();
    let querystring = conn.querystring();

    if querystring.is_empty() {
        Some(format!("{scheme}://{host}{path}"))
    } else {
        Some(format!("{scheme}://{host}{path}?{querystring}"))
    }
}
