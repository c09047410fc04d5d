use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::storage::types::pii_vault::PiiType;

const NONCE_LEN: usize = 12;

/// AES-256-GCM sealer for vaulted PII originals. The key is derived from
/// the configured secret; sealed blobs are `base64(nonce ‖ ciphertext‖tag)`.
pub struct PiiVaultCrypto {
    cipher: Aes256Gcm,
    token_prefix: String,
}

impl PiiVaultCrypto {
    pub fn new(secret: &str, token_prefix: impl Into<String>) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
            token_prefix: token_prefix.into(),
        }
    }

    /// Mint a redaction token: `{prefix}:{type}:{hex(random 6 bytes)}`.
    /// The token appears literally in redacted text as `{{token}}`.
    pub fn mint_token(&self, pii_type: PiiType) -> String {
        let mut random = [0u8; 6];
        rand::thread_rng().fill_bytes(&mut random);
        format!(
            "{}:{}:{}",
            self.token_prefix,
            pii_type.token_label(),
            hex::encode(random)
        )
    }

    pub fn seal(&self, plaintext: &str) -> Result<String, AppError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| AppError::InternalError("PII vault encryption failed".into()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    pub fn open(&self, sealed: &str) -> Result<String, AppError> {
        let blob = BASE64
            .decode(sealed)
            .map_err(|_| AppError::Validation("malformed vault blob".into()))?;
        if blob.len() <= NONCE_LEN {
            return Err(AppError::Validation("vault blob too short".into()));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AppError::Integrity("PII vault decryption failed".into()))?;
        String::from_utf8(plaintext)
            .map_err(|_| AppError::Integrity("vaulted value is not valid UTF-8".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let crypto = PiiVaultCrypto::new("test-secret", "pii");
        let sealed = crypto.seal("jane.doe@acme.io").expect("seal");
        assert_ne!(sealed, "jane.doe@acme.io");
        let opened = crypto.open(&sealed).expect("open");
        assert_eq!(opened, "jane.doe@acme.io");
    }

    #[test]
    fn wrong_key_fails_integrity() {
        let crypto = PiiVaultCrypto::new("secret-a", "pii");
        let sealed = crypto.seal("415-555-0134").expect("seal");

        let other = PiiVaultCrypto::new("secret-b", "pii");
        let err = other.open(&sealed).expect_err("wrong key must fail");
        assert!(matches!(err, AppError::Integrity(_)));
    }

    #[test]
    fn tokens_carry_prefix_and_type() {
        let crypto = PiiVaultCrypto::new("s", "pii");
        let token = crypto.mint_token(PiiType::Email);
        let parts: Vec<&str> = token.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "pii");
        assert_eq!(parts[1], "email");
        assert_eq!(parts[2].len(), 12);

        // Random component: two tokens differ.
        assert_ne!(token, crypto.mint_token(PiiType::Email));
    }
}
