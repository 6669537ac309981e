//! # App JWT
//!
//! Short-lived RS256 assertions identifying the GitHub App itself.
//!
//! GitHub only accepts installation token requests authenticated with a JWT
//! signed by the app's private key, with the app ID as issuer and a lifetime
//! of at most ten minutes.

use crate::constants::DEFAULT_JWT_LIFETIME_SECS;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::RsaPrivateKey;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Parsed GitHub App private key, ready for signing
#[derive(Clone)]
pub struct AppPrivateKey {
    encoding_key: EncodingKey,
    size_bits: usize,
}

impl AppPrivateKey {
    /// Build a signing key from a PKCS#1 DER encoded RSA private key
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self, rsa::pkcs1::Error> {
        let key = RsaPrivateKey::from_pkcs1_der(der)?;
        Ok(Self {
            encoding_key: EncodingKey::from_rsa_der(der),
            size_bits: rsa::traits::PublicKeyParts::size(&key) * 8,
        })
    }

    /// Modulus size of the key in bits
    #[must_use]
    pub fn size_bits(&self) -> usize {
        self.size_bits
    }
}

impl fmt::Debug for AppPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppPrivateKey")
            .field("size_bits", &self.size_bits)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("failed to sign app JWT: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iat: i64,
    exp: i64,
    iss: &'a str,
}

/// Issue a fresh app JWT
///
/// `lifetime` defaults to ten minutes. Never cached: every call signs anew.
pub fn issue_app_jwt(
    app_id: &str,
    key: &AppPrivateKey,
    lifetime: Option<Duration>,
) -> Result<String, SigningError> {
    let lifetime = lifetime.unwrap_or(Duration::from_secs(DEFAULT_JWT_LIFETIME_SECS));
    let now = chrono::Utc::now().timestamp();
    let lifetime_secs = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);
    let claims = Claims {
        iat: now,
        exp: now.saturating_add(lifetime_secs),
        iss: app_id,
    };

    Ok(jsonwebtoken::encode(
        &Header::new(Algorithm::RS256),
        &claims,
        &key.encoding_key,
    )?)
}
