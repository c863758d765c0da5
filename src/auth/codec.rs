//! Bearer token codec.
//!
//! A token is an HS256 JWT whose only custom claim, `token`, carries the
//! AES-256-GCM sealed JSON payload `{"id": <user id>, "type": <purpose>}`.
//! The server can recover the user id without a lookup table while the id
//! itself stays opaque to the client.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::config::TokenConfig;

/// Purpose tag of tokens handed out at login.
pub const AUTHENTICATION: &str = "authentication";

const NONCE_LEN: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token ciphertext could not be decrypted")]
    DecryptionError,
    #[error("token payload is malformed")]
    MalformedPayload,
    #[error("token could not be issued: {0}")]
    Issue(String),
}

/// Decrypted token contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub id: i64,
    #[serde(rename = "type")]
    pub purpose: String,
}

/// Signed envelope claims.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    token: String,
    iat: i64,
}

#[derive(Clone)]
pub struct TokenCodec {
    cipher: Aes256Gcm,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenCodec {
    pub fn new(config: &TokenConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !config.encryption_secret.is_empty() && !config.signing_secret.is_empty(),
            "token secrets must not be empty"
        );
        let key = Sha256::digest(config.encryption_secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| anyhow::anyhow!("AES cipher init failed: {e}"))?;
        Ok(Self {
            cipher,
            encoding: EncodingKey::from_secret(config.signing_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.signing_secret.as_bytes()),
        })
    }

    pub fn issue(&self, user_id: i64, purpose: &str) -> Result<String, TokenError> {
        let payload = TokenPayload {
            id: user_id,
            purpose: purpose.to_string(),
        };
        let plaintext =
            serde_json::to_vec(&payload).map_err(|e| TokenError::Issue(e.to_string()))?;
        let token = self.seal(&plaintext)?;
        debug!(user_id, purpose, "token issued");
        Ok(token)
    }

    pub fn decode(&self, bearer: &str) -> Result<TokenPayload, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        let envelope = decode::<Envelope>(bearer, &self.decoding, &validation)
            .map_err(|_| TokenError::InvalidSignature)?
            .claims;

        let sealed = STANDARD
            .decode(envelope.token.as_bytes())
            .map_err(|_| TokenError::DecryptionError)?;
        if sealed.len() <= NONCE_LEN {
            return Err(TokenError::DecryptionError);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| TokenError::DecryptionError)?;

        serde_json::from_slice::<TokenPayload>(&plaintext).map_err(|_| TokenError::MalformedPayload)
    }

    /// Encrypts `plaintext` and signs the result into a compact JWT.
    fn seal(&self, plaintext: &[u8]) -> Result<String, TokenError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| TokenError::Issue(format!("AES encryption failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        let envelope = Envelope {
            token: STANDARD.encode(&sealed),
            iat: OffsetDateTime::now_utc().unix_timestamp(),
        };
        encode(&Header::default(), &envelope, &self.encoding)
            .map_err(|e| TokenError::Issue(e.to_string()))
    }
}
