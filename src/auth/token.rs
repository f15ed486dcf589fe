use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use data_encoding::BASE32_NOPAD;
use rand::{rngs::OsRng, RngCore};

/// 256 bits of session token entropy.
pub const SESSION_TOKEN_BYTES: usize = 32;

/// 160 bits, the RFC 4226 recommended HMAC-SHA1 key length.
pub const TWO_FACTOR_SECRET_BYTES: usize = 20;

/// Opaque URL-safe bearer token.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Base32 secret suitable for authenticator apps.
pub fn generate_two_factor_secret() -> String {
    let mut bytes = [0u8; TWO_FACTOR_SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    BASE32_NOPAD.encode(&bytes)
}
