use serde::{de::DeserializeOwned, Serialize};
use std::fmt::{self, Debug, Display, Formatter};
use std::marker::PhantomData;

/**
The authentication state of the request currently being processed.

A context is created empty by
[`SecurityContextStore::load`][crate::SecurityContextStore::load],
populated from the authentication cookie when one decodes, mutated by
login and logout logic while the request is handled, and written back
out at most once when the response is sent. It belongs to exactly one
request and never outlives it.
*/
#[derive(Clone, Debug)]
pub struct SecurityContext<P> {
    authentication: Option<P>,
}

impl<P> SecurityContext<P> {
    /// An unauthenticated context.
    pub fn empty() -> Self {
        Self {
            authentication: None,
        }
    }

    /// The authenticated principal, if any.
    pub fn authentication(&self) -> Option<&P> {
        self.authentication.as_ref()
    }

    /// Marks this request's browser as authenticated. Saving the
    /// context will reissue the authentication cookie.
    pub fn set_authentication(&mut self, principal: P) {
        self.authentication = Some(principal);
    }

    /// Logs out. Saving an empty context expires the authentication
    /// cookie.
    pub fn clear(&mut self) {
        self.authentication = None;
    }

    /// True if a principal is present.
    pub fn is_authenticated(&self) -> bool {
        self.authentication.is_some()
    }
}

impl<P> Default for SecurityContext<P> {
    fn default() -> Self {
        Self::empty()
    }
}

/**
Converts the authenticated principal to and from the opaque subject
string embedded in the token.

Pick one concrete principal type for your application and serialize
exactly that. The token layer treats the subject as opaque, so the
serializer is the single place that decides what identity data rides
in the cookie.
*/
pub trait PrincipalSerializer: Send + Sync + 'static {
    /// The principal type this serializer handles.
    type Principal: Send + Sync + 'static;

    /// Error surfaced when (de)serialization fails.
    type Error: Display;

    /// Renders the principal as a subject string.
    fn serialize(&self, principal: &Self::Principal) -> Result<String, Self::Error>;

    /// Reconstructs a principal from a subject previously produced by
    /// [`serialize`][PrincipalSerializer::serialize].
    fn deserialize(&self, subject: &str) -> Result<Self::Principal, Self::Error>;
}

/// A [`PrincipalSerializer`] that stores the principal as json with a
/// fixed schema: whatever `P`'s serde implementation produces, and
/// nothing else. There is deliberately no support for deserializing
/// arbitrary types out of the cookie.
pub struct JsonPrincipalSerializer<P>(PhantomData<fn() -> P>);

impl<P> JsonPrincipalSerializer<P> {
    /// Constructs a json serializer for `P`.
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<P> Debug for JsonPrincipalSerializer<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("JsonPrincipalSerializer")
    }
}

impl<P> Default for JsonPrincipalSerializer<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for JsonPrincipalSerializer<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for JsonPrincipalSerializer<P> {}

impl<P> PrincipalSerializer for JsonPrincipalSerializer<P>
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Principal = P;
    type Error = serde_json::Error;

    fn serialize(&self, principal: &P) -> Result<String, Self::Error> {
        serde_json::to_string(principal)
    }

    fn deserialize(&self, subject: &str) -> Result<P, Self::Error> {
        serde_json::from_str(subject)
    }
}
