use crate::claims::{unix_seconds, Claims, ClaimsVerifier, ExpiryVerifier};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;
use sha2::Sha256;
use std::fmt::{self, Debug, Formatter};
use std::time::{Duration, SystemTime};

type HmacSha256 = Hmac<Sha256>;

// compact JOSE headers for the two layers. The envelope header doubles
// as the aead associated data, so it cannot be swapped without breaking
// the tag.
const ENVELOPE_HEADER: &[u8] = br#"{"alg":"dir","enc":"A256GCM","cty":"JWT"}"#;
const SIGNATURE_HEADER: &[u8] = br#"{"alg":"HS256","typ":"JWT"}"#;

const KEY_LEN: usize = 32;
const TAG_LEN: usize = 16;

#[derive(Deserialize)]
struct EnvelopeHeader {
    alg: String,
    enc: String,
}

#[derive(Deserialize)]
struct SignatureHeader {
    alg: String,
}

/**
Seals subjects into signed, encrypted, expiring tokens and opens them
back up.

Tokens are a nested JOSE construction: the subject and expiry become a
compact HMAC-SHA256 signed claims structure, which in turn becomes the
plaintext of a compact AES-256-GCM envelope under a directly-shared
key. A fresh random nonce is drawn from the system's secure randomness
for every token issued, and the serialized envelope header is bound
into the authentication tag as associated data.

The same 32 bytes of key material key both layers. Every party holding
the key can mint tokens, so the key must never leave the server side.

Decoding never panics on inbound data. A token that is malformed,
undecryptable, forged, expired, or rejected by a configured
[`ClaimsVerifier`] produces `None`, with nothing to distinguish which
of those it was.
*/
pub struct TokenCodec {
    mac_key: Vec<u8>,
    aead_key: LessSafeKey,
    rng: SystemRandom,
    ttl: Duration,
    verifiers: Vec<Box<dyn ClaimsVerifier>>,
}

impl Debug for TokenCodec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("key", &"<<secret>>")
            .field("ttl", &self.ttl)
            .field("verifiers", &self.verifiers.len())
            .finish()
    }
}

impl TokenCodec {
    /**
    Constructs a codec from 32 bytes of key material. The key MUST be
    cryptographically random; it is recommended to retrieve it at
    runtime from the environment rather than compiling it into your
    application.

    Issued tokens expire one hour after issuance unless overridden
    with [`with_ttl`][TokenCodec::with_ttl]. The expiry check tolerates
    one minute of clock skew; append an [`ExpiryVerifier`] replacement
    through your own chain position if you need different tolerances.

    # Panics

    Panics if the key is not exactly 32 bytes long. Serving requests
    with truncated key material is not a per-request condition, it is a
    deployment mistake.
    */
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        let key = key.as_ref();
        assert_eq!(
            key.len(),
            KEY_LEN,
            "TokenCodec requires exactly {KEY_LEN} bytes of key material, got {}",
            key.len()
        );

        let aead_key = LessSafeKey::new(UnboundKey::new(&AES_256_GCM, key).expect("good key"));

        Self {
            mac_key: key.to_vec(),
            aead_key,
            rng: SystemRandom::new(),
            ttl: Duration::from_secs(3600),
            verifiers: vec![Box::new(ExpiryVerifier::new())],
        }
    }

    /// Sets how long after issuance a token remains valid.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Appends a [`ClaimsVerifier`] to the chain. Verifiers run in the
    /// order they were appended, after the built-in expiry check, and
    /// all of them must pass for a token to decode.
    pub fn with_verifier(mut self, verifier: impl ClaimsVerifier) -> Self {
        self.verifiers.push(Box::new(verifier));
        self
    }

    /// Issues a new token for `subject`, expiring `ttl` from now. Each
    /// call produces a distinct token, even for an identical subject.
    pub fn encrypt_and_sign(&self, subject: &str) -> String {
        let claims = Claims {
            sub: String::from(subject),
            exp: Some(unix_seconds(SystemTime::now() + self.ttl)),
        };

        self.seal(&claims)
    }

    /// Returns the subject of a valid token, or `None` for anything
    /// else. All failures look alike by design: structure, decryption,
    /// signature, and claims problems are logged but not distinguished
    /// to the caller.
    pub fn decrypt_and_verify(&self, token: &str) -> Option<String> {
        let claims = self.open(token)?;

        for verifier in &self.verifiers {
            if !verifier.verify(&claims) {
                log::warn!("token claims verification failed");
                return None;
            }
        }

        Some(claims.sub)
    }

    fn seal(&self, claims: &Claims) -> String {
        let header = URL_SAFE_NO_PAD.encode(SIGNATURE_HEADER);
        let payload =
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).expect("claims serialize to json"));
        let signing_input = format!("{header}.{payload}");

        let mut mac = HmacSha256::new_from_slice(&self.mac_key).expect("good key");
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        self.encrypt(format!("{signing_input}.{signature}").into_bytes())
    }

    fn encrypt(&self, mut plaintext: Vec<u8>) -> String {
        let header = URL_SAFE_NO_PAD.encode(ENVELOPE_HEADER);

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes).expect("secure randomness");

        self.aead_key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(header.as_bytes()),
                &mut plaintext,
            )
            .expect("aead seal");

        let (ciphertext, tag) = plaintext.split_at(plaintext.len() - TAG_LEN);

        // compact serialization with an empty encrypted-key part, since
        // the key is shared directly rather than wrapped
        format!(
            "{header}..{}.{}.{}",
            URL_SAFE_NO_PAD.encode(nonce_bytes),
            URL_SAFE_NO_PAD.encode(ciphertext),
            URL_SAFE_NO_PAD.encode(tag)
        )
    }

    fn open(&self, token: &str) -> Option<Claims> {
        let parts: Vec<&str> = token.split('.').collect();
        let &[header, encrypted_key, nonce, ciphertext, tag] = parts.as_slice() else {
            log::trace!("token is not a five part envelope");
            return None;
        };

        if !encrypted_key.is_empty() {
            log::trace!("token envelope carries an encrypted key");
            return None;
        }

        let parsed: EnvelopeHeader =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header).ok()?).ok()?;
        if parsed.alg != "dir" || parsed.enc != "A256GCM" {
            log::warn!(
                "refusing token envelope with alg={} enc={}",
                parsed.alg,
                parsed.enc
            );
            return None;
        }

        let nonce_bytes: [u8; NONCE_LEN] =
            URL_SAFE_NO_PAD.decode(nonce).ok()?.try_into().ok()?;
        let mut data = URL_SAFE_NO_PAD.decode(ciphertext).ok()?;
        data.append(&mut URL_SAFE_NO_PAD.decode(tag).ok()?);

        let plaintext = match self.aead_key.open_in_place(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::from(header.as_bytes()),
            &mut data,
        ) {
            Ok(plaintext) => plaintext,
            Err(_) => {
                log::warn!("token decryption failed");
                return None;
            }
        };

        let signed = std::str::from_utf8(plaintext).ok()?;
        self.verify_signature(signed)
    }

    fn verify_signature(&self, signed: &str) -> Option<Claims> {
        let parts: Vec<&str> = signed.split('.').collect();
        let &[header, payload, signature] = parts.as_slice() else {
            log::trace!("token payload is not a three part signed structure");
            return None;
        };

        let parsed: SignatureHeader =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header).ok()?).ok()?;
        if parsed.alg != "HS256" {
            log::warn!("refusing token signature with alg={}", parsed.alg);
            return None;
        }

        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = HmacSha256::new_from_slice(&self.mac_key).expect("good key");
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        if mac.verify_slice(&signature).is_err() {
            log::warn!("token signature verification failed");
            return None;
        }

        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).ok()?).ok()
    }
}
