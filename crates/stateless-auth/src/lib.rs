#![forbid(unsafe_code)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    unused_qualifications
)]
/*!
Stateless, server-memory-free authentication state for trillium.

Instead of a server-side session store, the authenticated identity
rides in a signed and encrypted cookie on the client, alongside a
csrf guard cookie and a "resume after login" cookie. The server keeps
no per-user state at all: every instance holding the shared 32-byte
secret can verify and reissue tokens, which makes horizontal scaling
and restarts free.

Three pieces cooperate, all composed as ordinary trillium handlers on
top of [`trillium_cookies::CookiesHandler`]:

* [`SecurityContextHandler`] loads a [`SecurityContext`] out of the
  authentication cookie on the way in and writes it back at most once
  on the way out. Stale or forged cookies are treated as "not logged
  in" and proactively cleared, never surfaced as errors.
* [`CsrfHandler`] keeps a high-entropy random token in a second
  cookie for double-submit csrf protection, rotating it whenever a
  login happens.
* [`SavedRequestCache`] remembers where an unauthenticated browser
  was headed so it can be sent back there after login, each saved url
  consumed exactly once.

The handler order matters: cookies, then csrf, then security context,
then your application.

```
use serde::{Deserialize, Serialize};
use stateless_token::TokenCodec;
use trillium_cookies::CookiesHandler;
use trillium_stateless_auth::{
    CsrfHandler, CsrfStore, JsonPrincipalSerializer, SecurityContextConnExt,
    SecurityContextHandler, SecurityContextStore,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct User {
    name: String,
}

let secret = *b"01234567890123456789012345678901"; // use an env var instead

let handler = (
    CookiesHandler::new(),
    CsrfHandler::new(CsrfStore::new()),
    SecurityContextHandler::new(SecurityContextStore::new(
        TokenCodec::new(secret),
        JsonPrincipalSerializer::<User>::new(),
    )),
    |conn: trillium::Conn| async move {
        let name = conn.principal::<User>().map(|user| user.name.clone());
        match name {
            Some(name) => conn.ok(format!("hello, {name}")),
            None => conn
                .with_principal(User {
                    name: String::from("grace"),
                })
                .ok("signed in"),
        }
    },
);

use trillium_testing::prelude::*;
assert_ok!(get("/").on(&handler), "signed in");
```
*/

mod cookie_settings;

mod security_context;
pub use security_context::{JsonPrincipalSerializer, PrincipalSerializer, SecurityContext};

mod security_context_store;
pub use security_context_store::{SaveHandle, SecurityContextStore};

mod security_context_handler;
pub use security_context_handler::SecurityContextHandler;

mod security_context_conn_ext;
pub use security_context_conn_ext::SecurityContextConnExt;

mod csrf;
pub use csrf::{CsrfConnExt, CsrfHandler, CsrfStore, CsrfToken, RotateCsrf};

mod saved_request;
pub use saved_request::{SavedRequest, SavedRequestCache};

mod https_only;
pub use https_only::HttpsOnly;

pub use stateless_token::{Claims, ClaimsVerifier, ExpiryVerifier, TokenCodec};
