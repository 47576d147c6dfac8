use trillium::{Conn, Handler, KnownHeaderName, Status};

/**
Redirects plain-http requests to their https equivalent, for
deployments where a load balancer terminates tls and tells the
application about the client's actual protocol through the
`x-forwarded-proto` header.

This is the one place a forwarded header is consulted. Everything
else in this crate keys off the transport the request arrived on,
which behind such a load balancer is the proxied plaintext hop, so
https enforcement has to happen out here rather than inside the
cookie stores.

Compose in front of everything else. Requests without the header, or
with any value other than `http`, pass through untouched.
*/
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpsOnly {
    // constructed through new/default so that settings can be added
    // later without breaking existing usage
    _priv: (),
}

impl HttpsOnly {
    /// Constructs a new HttpsOnly handler.
    pub fn new() -> Self {
        Self::default()
    }
}

#[trillium::async_trait]
impl Handler for HttpsOnly {
    async fn run(&self, mut conn: Conn) -> Conn {
        let forwarded_http = conn
            .headers()
            .get_str(KnownHeaderName::XforwardedProto)
            .is_some_and(|proto| proto.eq_ignore_ascii_case("http"));

        if !forwarded_http {
            return conn;
        }

        let host = conn
            .headers()
            .get_str(KnownHeaderName::Host)
            .map(String::from);
        let Some(host) = host else { return conn };

        let querystring = conn.querystring();
        let url = if querystring.is_empty() {
            format!("https://{}{}", host, conn.path())
        } else {
            format!("https://{}{}?{}", host, conn.path(), querystring)
        };

        conn.headers_mut().insert(KnownHeaderName::Location, url);
        conn.with_status(Status::Found).halt()
    }
}
