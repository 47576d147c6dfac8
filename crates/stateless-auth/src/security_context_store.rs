use crate::cookie_settings::CookieSettings;
use crate::{PrincipalSerializer, SecurityContext};
use stateless_token::TokenCodec;
use std::fmt::{self, Debug, Formatter};
use std::mem;
use trillium::Conn;
use trillium_cookies::CookiesConnExt;

/**
Maps the authenticated principal to and from a named, encrypted,
signed cookie.

The store owns the full cookie protocol: reading and verifying on the
way in, proactively clearing cookies that fail verification, and
writing at most one outcome cookie on the way out. It is driven by
[`SecurityContextHandler`][crate::SecurityContextHandler] in ordinary
applications, but the [`load`][SecurityContextStore::load] /
[`save`][SecurityContextStore::save] /
[`contains`][SecurityContextStore::contains] operations are public for
framework glue that needs to manage the lifecycle itself.

Requires [`CookiesHandler`][trillium_cookies::CookiesHandler] to have
run on the conn.
*/
pub struct SecurityContextStore<S> {
    codec: TokenCodec,
    serializer: S,
    cookie: CookieSettings,
}

impl<S> Debug for SecurityContextStore<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContextStore")
            .field("codec", &self.codec)
            .field("cookie", &self.cookie)
            .finish()
    }
}

impl<S: PrincipalSerializer> SecurityContextStore<S> {
    /**
    Constructs a store from a [`TokenCodec`] and a
    [`PrincipalSerializer`].

    # Defaults

    * cookie name: `"authentication"`
    * cookie path: unset, the cookie's natural path
    * cookie max-age: one hour
    */
    pub fn new(codec: TokenCodec, serializer: S) -> Self {
        Self {
            codec,
            serializer,
            cookie: CookieSettings::new("authentication", Some(3600)),
        }
    }

    /// Sets the name of the authentication cookie.
    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie.name = cookie_name.into();
        self
    }

    /// Sets the path of the authentication cookie.
    pub fn with_cookie_path(mut self, cookie_path: impl Into<String>) -> Self {
        self.cookie.path = Some(cookie_path.into());
        self
    }

    /// Sets the max-age of the authentication cookie, in seconds. Note
    /// that this is distinct from the token's own expiry, which is
    /// configured on the [`TokenCodec`] and enforced server side.
    pub fn with_cookie_max_age_seconds(mut self, seconds: u32) -> Self {
        self.cookie.max_age_seconds = Some(seconds);
        self
    }

    /**
    Derives the security context for this request from the
    authentication cookie.

    An absent cookie yields an empty context. A cookie that fails
    decryption, verification, or principal deserialization also yields
    an empty context, so the request proceeds as unauthenticated with
    no error surfacing to the client; it additionally schedules a
    removal cookie so the stale or forged value is cleared by the very
    next response.

    The returned [`SaveHandle`] must be passed back to
    [`save`][SecurityContextStore::save] exactly once when the
    response is finalized.
    */
    pub fn load(&self, conn: &mut Conn) -> (SecurityContext<S::Principal>, SaveHandle) {
        let token = conn
            .cookies()
            .get(self.cookie.name())
            .map(|cookie| String::from(cookie.value()));

        let context = match &token {
            None => SecurityContext::empty(),
            Some(token) => match self.decode(token) {
                Some(principal) => {
                    let mut context = SecurityContext::empty();
                    context.set_authentication(principal);
                    context
                }
                None => {
                    let removal = self.cookie.removal(conn.is_secure());
                    conn.cookies_mut().add(removal);
                    SecurityContext::empty()
                }
            },
        };

        let handle = SaveHandle::new(token.is_some(), context.is_authenticated());
        (context, handle)
    }

    /**
    Writes the context back to the response, at most once per
    [`SaveHandle`].

    A populated context is serialized, sealed through the codec, and
    set as the authentication cookie. An empty context expires the
    cookie when the request carried one, and writes nothing when there
    is nothing to clear. A second call against the same handle is a
    no-op, so an error-handling path and the normal completion path
    can both attempt to persist without a double `Set-Cookie`.
    */
    pub fn save(
        &self,
        handle: &mut SaveHandle,
        conn: &mut Conn,
        context: &SecurityContext<S::Principal>,
    ) {
        if !handle.mark_saved() {
            return;
        }

        match context.authentication() {
            None => {
                if handle.had_cookie() {
                    let removal = self.cookie.removal(conn.is_secure());
                    conn.cookies_mut().add(removal);
                }
            }

            Some(principal) => match self.serializer.serialize(principal) {
                Ok(subject) => {
                    let token = self.codec.encrypt_and_sign(&subject);
                    let cookie = self.cookie.build(conn.is_secure(), token);
                    conn.cookies_mut().add(cookie);
                }

                Err(e) => {
                    log::error!(
                        "could not serialize principal, leaving the authentication cookie unwritten: {e}"
                    );
                }
            },
        }
    }

    /// True if the request carries the authentication cookie at all,
    /// whether or not it would verify. Useful for glue deciding
    /// whether to attempt session continuation in the first place.
    pub fn contains(&self, conn: &Conn) -> bool {
        conn.cookies().get(self.cookie.name()).is_some()
    }

    fn decode(&self, token: &str) -> Option<S::Principal> {
        let subject = self.codec.decrypt_and_verify(token)?;

        match self.serializer.deserialize(&subject) {
            Ok(principal) => Some(principal),
            Err(e) => {
                log::warn!("could not deserialize the principal from a verified token: {e}");
                None
            }
        }
    }
}

/**
Enforces the at-most-once write of the authentication cookie within a
single request.

Frameworks tend to have more than one exit path per request, such
as normal completion and error unwinding, and more than one of them may
try to persist the security context. Whichever
[`save`][SecurityContextStore::save] reaches the handle first wins;
later calls are no-ops. This is a per-request flag rather than a lock,
because nothing inside one request's lifecycle runs in parallel with
it.
*/
#[derive(Debug)]
pub struct SaveHandle {
    saved: bool,
    had_cookie: bool,
    was_authenticated: bool,
}

impl SaveHandle {
    fn new(had_cookie: bool, was_authenticated: bool) -> Self {
        Self {
            saved: false,
            had_cookie,
            was_authenticated,
        }
    }

    /// True once a save has been performed against this handle.
    pub fn is_saved(&self) -> bool {
        self.saved
    }

    /// True if the request carried the authentication cookie,
    /// whether or not it verified.
    pub fn had_cookie(&self) -> bool {
        self.had_cookie
    }

    /// True if the request presented a valid authentication cookie,
    /// i.e. the context started out authenticated. Comparing this
    /// with the context's state at save time is how a login is
    /// detected.
    pub fn was_authenticated(&self) -> bool {
        self.was_authenticated
    }

    fn mark_saved(&mut self) -> bool {
        !mem::replace(&mut self.saved, true)
    }
}
