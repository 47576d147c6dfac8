use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// The signed payload carried inside a token: an opaque subject plus an
/// expiry instant.
///
/// Serialized with the registered JOSE claim names (`sub`, `exp`) so
/// tokens remain legible to standard tooling. Unknown claims on inbound
/// tokens are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The embedder-supplied serialization of whatever the token
    /// authenticates. The codec never interprets its content.
    pub sub: String,

    /// Expiry, in seconds since the unix epoch. A token without an
    /// expiry is never valid; see [`ExpiryVerifier`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// A predicate over decoded [`Claims`].
///
/// Verifiers run in order after decryption and signature verification
/// have already succeeded; the first one to return `false` rejects the
/// token. Implemented for plain closures, so
/// `codec.with_verifier(|claims: &Claims| ...)` works.
pub trait ClaimsVerifier: Send + Sync + 'static {
    /// Returns `true` if these claims are acceptable.
    fn verify(&self, claims: &Claims) -> bool;
}

impl<F> ClaimsVerifier for F
where
    F: Fn(&Claims) -> bool + Send + Sync + 'static,
{
    fn verify(&self, claims: &Claims) -> bool {
        self(claims)
    }
}

/// The built-in expiry check.
///
/// Accepts claims whose `exp` is no further in the past than the clock
/// skew allowance (one minute unless overridden). Claims with no `exp`
/// always fail; there is no way to mint a token that never expires.
#[derive(Clone, Copy, Debug)]
pub struct ExpiryVerifier {
    max_clock_skew: Duration,
}

impl ExpiryVerifier {
    /// Constructs an expiry verifier with the default one minute of
    /// clock skew allowance.
    pub fn new() -> Self {
        Self {
            max_clock_skew: Duration::from_secs(60),
        }
    }

    /// Overrides how far out of sync the issuing and verifying clocks
    /// are allowed to be.
    pub fn with_max_clock_skew(mut self, max_clock_skew: Duration) -> Self {
        self.max_clock_skew = max_clock_skew;
        self
    }
}

impl Default for ExpiryVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimsVerifier for ExpiryVerifier {
    fn verify(&self, claims: &Claims) -> bool {
        let Some(exp) = claims.exp else {
            log::warn!("rejecting token claims with no expiry");
            return false;
        };

        exp.saturating_add(self.max_clock_skew.as_secs()) > unix_seconds(SystemTime::now())
    }
}

pub(crate) fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
