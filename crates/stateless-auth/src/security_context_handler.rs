use crate::{PrincipalSerializer, RotateCsrf, SaveHandle, SecurityContext, SecurityContextStore};
use std::fmt::{self, Debug, Formatter};
use trillium::{Conn, Handler};

/**
Drives a [`SecurityContextStore`] through the trillium request
lifecycle.

On `run`, the security context is loaded from the authentication
cookie and placed in the conn's state, where application handlers read
and mutate it (most conveniently through
[`SecurityContextConnExt`][crate::SecurityContextConnExt]). On
`before_send`, the last point before the response is finalized, the
context is written back out, guarded by the one-shot [`SaveHandle`] so
that application code that already saved explicitly does not cause a
second write.

When a request goes from unauthenticated to authenticated, the handler
also flags the conn with [`RotateCsrf`] so that a
[`CsrfHandler`][crate::CsrfHandler] later in the
`before_send` chain reissues the csrf cookie.

Compose after the cookies handler and csrf handler:

```rust,no_run
use serde::{Deserialize, Serialize};
use stateless_token::TokenCodec;
use trillium_cookies::CookiesHandler;
use trillium_stateless_auth::{
    CsrfHandler, CsrfStore, JsonPrincipalSerializer, SecurityContextHandler,
    SecurityContextStore,
};

#[derive(Serialize, Deserialize)]
struct User {
    name: String,
}

let secret = std::env::var("AUTH_COOKIE_SECRET").unwrap();
let handler = (
    CookiesHandler::new(),
    CsrfHandler::new(CsrfStore::new()),
    SecurityContextHandler::new(SecurityContextStore::new(
        TokenCodec::new(secret.as_bytes()),
        JsonPrincipalSerializer::<User>::new(),
    )),
    // ...application handlers...
);
trillium_smol::run(handler);
```
*/
pub struct SecurityContextHandler<S> {
    store: SecurityContextStore<S>,
}

impl<S> Debug for SecurityContextHandler<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContextHandler")
            .field("store", &"..")
            .finish()
    }
}

impl<S: PrincipalSerializer> SecurityContextHandler<S> {
    /// Constructs a handler around the given store.
    pub fn new(store: SecurityContextStore<S>) -> Self {
        Self { store }
    }
}

#[trillium::async_trait]
impl<S: PrincipalSerializer> Handler for SecurityContextHandler<S> {
    async fn run(&self, mut conn: Conn) -> Conn {
        let (context, handle) = self.store.load(&mut conn);
        conn.with_state(context).with_state(handle)
    }

    async fn before_send(&self, mut conn: Conn) -> Conn {
        let Some(mut handle) = conn.take_state::<SaveHandle>() else {
            return conn;
        };

        let Some(context) = conn.take_state::<SecurityContext<S::Principal>>() else {
            return conn;
        };

        if !handle.was_authenticated() && context.is_authenticated() {
            conn.set_state(RotateCsrf);
        }

        self.store.save(&mut handle, &mut conn, &context);
        conn
    }
}
