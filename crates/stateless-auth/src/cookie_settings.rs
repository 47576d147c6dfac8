use trillium_cookies::cookie::{time::Duration, Cookie};

/// How one of this crate's cookies is written: a name, an optional
/// path, and an optional max-age. `HttpOnly` is always set, and
/// `Secure` always mirrors the transport of the request being
/// answered, so cookies set over https are never downgraded while
/// plaintext dev environments still work.
#[derive(Clone, Debug)]
pub(crate) struct CookieSettings {
    pub(crate) name: String,
    pub(crate) path: Option<String>,
    pub(crate) max_age_seconds: Option<u32>,
}

impl CookieSettings {
    pub(crate) fn new(name: &str, max_age_seconds: Option<u32>) -> Self {
        Self {
            name: String::from(name),
            path: None,
            max_age_seconds,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn build(&self, secure: bool, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.name.clone(), value);
        cookie.set_http_only(true);
        cookie.set_secure(secure);
        if let Some(seconds) = self.max_age_seconds {
            cookie.set_max_age(Duration::seconds(seconds.into()));
        }
        if let Some(path) = self.path.clone() {
            cookie.set_path(path);
        }
        cookie
    }

    /// An expired empty-value cookie, the shape browsers treat as an
    /// instruction to delete whatever they were holding.
    pub(crate) fn removal(&self, secure: bool) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.name.clone(), "");
        cookie.set_http_only(true);
        cookie.set_secure(secure);
        cookie.set_max_age(Duration::ZERO);
        if let Some(path) = self.path.clone() {
            cookie.set_path(path);
        }
        cookie
    }
}
