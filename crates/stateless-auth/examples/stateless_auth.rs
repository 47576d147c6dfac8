use serde::{Deserialize, Serialize};
use trillium::{Conn, Handler, KnownHeaderName, Status};
use trillium_cookies::CookiesHandler;
use trillium_stateless_auth::{
    CsrfConnExt, CsrfHandler, CsrfStore, JsonPrincipalSerializer, SavedRequestCache,
    SecurityContextConnExt, SecurityContextHandler, SecurityContextStore, TokenCodec,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct User {
    name: String,
}

struct App {
    saved_requests: SavedRequestCache,
}

impl App {
    fn redirect(&self, mut conn: Conn, location: &str) -> Conn {
        conn.headers_mut()
            .insert(KnownHeaderName::Location, String::from(location));
        conn.with_status(Status::Found).halt()
    }
}

#[trillium::async_trait]
impl Handler for App {
    async fn run(&self, mut conn: Conn) -> Conn {
        match conn.path() {
            "/" => {
                let token = String::from(conn.csrf_token().token());
                conn.ok(format!("welcome. csrf token: {token}\n"))
            }

            "/login" => {
                // a real application would check credentials from a
                // posted form here
                let name = String::from(conn.querystring().trim_start_matches("name="));
                if name.is_empty() {
                    return conn
                        .with_status(Status::BadRequest)
                        .with_body("expected /login?name=you\n")
                        .halt();
                }

                conn = conn.with_principal(User { name });
                match self.saved_requests.consume(&mut conn) {
                    Some(saved) => {
                        let url = String::from(saved.redirect_url());
                        self.redirect(conn, &url)
                    }
                    None => self.redirect(conn, "/"),
                }
            }

            "/secret" => {
                let name = conn.principal::<User>().map(|user| user.name.clone());
                match name {
                    Some(name) => conn.ok(format!("the secret, for {name}'s eyes only\n")),
                    None => {
                        self.saved_requests.save(&mut conn);
                        self.redirect(conn, "/login")
                    }
                }
            }

            _ => conn,
        }
    }
}

pub fn main() {
    env_logger::init();

    let secret = *b"01234567890123456789012345678901"; // use an env var instead

    trillium_smol::run((
        CookiesHandler::new(),
        CsrfHandler::new(CsrfStore::new()),
        SecurityContextHandler::new(SecurityContextStore::new(
            TokenCodec::new(secret),
            JsonPrincipalSerializer::<User>::new(),
        )),
        App {
            saved_requests: SavedRequestCache::new(),
        },
    ));
}
