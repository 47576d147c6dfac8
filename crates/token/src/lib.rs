#![forbid(unsafe_code)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    unused_qualifications
)]
/*!
Tamper-proof, confidentiality-protected, expiring string tokens.

A [`TokenCodec`] wraps an opaque subject string in a signed claims
structure with an embedded expiry, then seals the whole thing inside an
authenticated-encryption envelope keyed with a single shared 32-byte
secret. The resulting token is safe to hand to an untrusted party (such
as a browser, in a cookie) and later accept back: any tampering,
truncation, or expiry makes [`TokenCodec::decrypt_and_verify`] return
`None`, and every failure mode is indistinguishable from every other.

```
use stateless_token::TokenCodec;

let codec = TokenCodec::new(*b"01234567890123456789012345678901");

let token = codec.encrypt_and_sign("grace");
assert_eq!(codec.decrypt_and_verify(&token), Some(String::from("grace")));

assert_eq!(codec.decrypt_and_verify("not a token"), None);
```

This crate knows nothing about http. See `trillium-stateless-auth` for
the cookie lifecycle built on top of it.
*/

mod claims;
pub use claims::{Claims, ClaimsVerifier, ExpiryVerifier};

mod codec;
pub use codec::TokenCodec;
