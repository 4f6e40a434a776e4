//! Opaque refresh tokens.
//!
//! The client holds `lf_rt_<64 hex chars>`; the database only stores the
//! SHA-256 of that string, so a leaked table cannot be replayed.

use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use leadforge_core::defaults::REFRESH_TOKEN_PREFIX;

use crate::error::{AuthError, AuthResult};

const TOKEN_BYTES: usize = 32;

/// A freshly generated refresh token and its storage hash.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    /// Returned to the client once; never stored.
    pub plaintext: String,
    /// SHA-256 hex of `plaintext`, stored on the session row.
    pub hash: String,
}

/// Generate a new random refresh token.
pub fn generate_refresh_token() -> RefreshToken {
    let mut bytes = Zeroizing::new([0u8; TOKEN_BYTES]);
    rand::thread_rng().fill_bytes(bytes.as_mut());
    let plaintext = format!("{}{}", REFRESH_TOKEN_PREFIX, hex::encode(bytes.as_ref()));
    let hash = hash_token(&plaintext);
    RefreshToken { plaintext, hash }
}

/// SHA-256 hex digest of a token string.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Check the shape of a presented refresh token and return its hash.
pub fn hash_presented_token(token: &str) -> AuthResult<String> {
    let token = token.trim();
    let body = token
        .strip_prefix(REFRESH_TOKEN_PREFIX)
        .ok_or(AuthError::MalformedRefreshToken)?;
    if body.len() != TOKEN_BYTES * 2 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AuthError::MalformedRefreshToken);
    }
    Ok(hash_token(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_token_shape() {
        let t = generate_refresh_token();
        assert!(t.plaintext.starts_with("lf_rt_"));
        assert_eq!(t.plaintext.len(), 6 + 64);
        assert_eq!(t.hash.len(), 64);
        assert_ne!(t.hash, t.plaintext);
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = generate_refresh_token();
        let b = generate_refresh_token();
        assert_ne!(a.plaintext, b.plaintext);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_presented_token_hash_matches_stored() {
        let t = generate_refresh_token();
        assert_eq!(hash_presented_token(&t.plaintext).unwrap(), t.hash);
        assert_eq!(hash_presented_token(&format!(" {} ", t.plaintext)).unwrap(), t.hash);
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        for bad in ["", "lf_rt_", "lf_rt_zz", "rt_0123", "Bearer abc"] {
            assert!(matches!(
                hash_presented_token(bad),
                Err(AuthError::MalformedRefreshToken)
            ));
        }
        let wrong_prefix = format!("xx_rt_{}", "a".repeat(64));
        assert!(hash_presented_token(&wrong_prefix).is_err());
    }

    #[test]
    fn test_hash_is_known_sha256() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
