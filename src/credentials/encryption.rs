//! AES-256-GCM encryption for credential tokens.
//!
//! Each token is encrypted separately with a random nonce. The stored form is
//! `base64(nonce || ciphertext)` so one text column holds everything needed
//! to decrypt. The key is 32 bytes, base64-encoded in configuration under
//! `SECRET_KEY`, and generated on first use when absent.

use super::{SealedTokens, TokenPair};
use crate::config::{ConfigSource, SECRET_KEY_VAR};
use crate::error::{Error, Result};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Size of the encryption key in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits, standard for GCM)
const NONCE_SIZE: usize = 12;

/// Validates that the key is exactly 32 bytes when base64 decoded.
///
/// # Returns
/// * `Ok(Vec<u8>)` - Decoded key bytes (32 bytes)
/// * `Err(Error::Config)` - If key is invalid length or invalid base64
pub fn validate_key(key_base64: &str) -> Result<Vec<u8>> {
    let key_bytes = BASE64
        .decode(key_base64.trim())
        .map_err(|e| Error::Config(format!("SECRET_KEY is not valid base64: {}", e)))?;

    if key_bytes.len() != KEY_SIZE {
        return Err(Error::Config(format!(
            "SECRET_KEY must be {} bytes (256 bits), got {} bytes",
            KEY_SIZE,
            key_bytes.len()
        )));
    }

    Ok(key_bytes)
}

/// Generates a fresh random key, base64-encoded.
pub fn generate_key() -> String {
    BASE64.encode(Aes256Gcm::generate_key(&mut OsRng))
}

/// Encrypts plaintext with a random nonce.
///
/// Returns `base64(nonce || ciphertext)`.
pub fn encrypt(plaintext: &str, key: &[u8]) -> Result<String> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::Config(format!("Failed to create cipher: {}", e)))?;

    // Never reuse a nonce
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| Error::Config(format!("Encryption failed: {}", e)))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(sealed))
}

/// Decrypts a value produced by [`encrypt`].
///
/// Fails on a wrong key, corrupted data, or tampering.
pub fn decrypt(sealed: &str, key: &[u8]) -> Result<String> {
    let bytes = BASE64
        .decode(sealed)
        .map_err(|e| Error::Config(format!("Failed to decode ciphertext: {}", e)))?;

    if bytes.len() <= NONCE_SIZE {
        return Err(Error::Config(format!(
            "Ciphertext too short: {} bytes",
            bytes.len()
        )));
    }
    let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_SIZE);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::Config(format!("Failed to create cipher: {}", e)))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| {
            Error::Config(format!(
                "Decryption failed (wrong key or corrupted data): {}",
                e
            ))
        })?;

    String::from_utf8(plaintext)
        .map_err(|_| Error::Config("Decrypted data is not valid UTF-8".to_string()))
}

/// Token encryptor bound to the run's secret key.
///
/// The key is resolved once by [`Encryptor::ready`]: read from configuration,
/// or generated and appended to it. Every later call in the same process uses
/// that key.
pub struct Encryptor {
    config: Arc<dyn ConfigSource>,
    key: OnceLock<Vec<u8>>,
}

impl Encryptor {
    pub fn new(config: Arc<dyn ConfigSource>) -> Self {
        Self {
            config,
            key: OnceLock::new(),
        }
    }

    /// Loads or generates the secret key. Idempotent.
    pub fn ready(&self) -> Result<()> {
        if self.key.get().is_some() {
            return Ok(());
        }

        let key = match self.config.get(SECRET_KEY_VAR)? {
            Some(encoded) => {
                debug!("Using configured secret key");
                validate_key(&encoded)?
            }
            None => {
                let encoded = generate_key();
                self.config.append(SECRET_KEY_VAR, &encoded)?;
                info!("Generated new secret key and saved it to configuration");
                validate_key(&encoded)?
            }
        };

        // Single-threaded setup; a lost race would only discard an identical load
        let _ = self.key.set(key);
        Ok(())
    }

    fn key(&self) -> Result<&[u8]> {
        self.key
            .get()
            .map(Vec::as_slice)
            .ok_or_else(|| Error::Config("Encryptor used before ready()".to_string()))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        encrypt(plaintext, self.key()?)
    }

    pub fn decrypt(&self, sealed: &str) -> Result<String> {
        decrypt(sealed, self.key()?)
    }

    /// Encrypts both tokens of a freshly issued pair for storage.
    pub fn seal(&self, tokens: &TokenPair) -> Result<SealedTokens> {
        Ok(SealedTokens {
            access_token: self.encrypt(&tokens.access_token)?,
            refresh_token: self.encrypt(&tokens.refresh_token)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;

    #[test]
    fn test_key_validation() {
        let valid_key = BASE64.encode([0u8; 32]);
        assert!(validate_key(&valid_key).is_ok());

        let short_key = BASE64.encode([0u8; 16]);
        assert!(matches!(validate_key(&short_key), Err(Error::Config(_))));

        let long_key = BASE64.encode([0u8; 64]);
        assert!(validate_key(&long_key).is_err());

        assert!(validate_key("not-valid-base64!@#$").is_err());
    }

    #[test]
    fn test_generated_key_is_valid() {
        let key = generate_key();
        assert_eq!(validate_key(&key).unwrap().len(), KEY_SIZE);
        assert_ne!(generate_key(), key);
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [0u8; 32];
        let plaintext = "APP_USR-1234567890-access";

        let sealed = encrypt(plaintext, &key).expect("Encryption failed");
        assert_ne!(sealed, plaintext);
        assert!(!sealed.contains(plaintext));

        assert_eq!(decrypt(&sealed, &key).expect("Decryption failed"), plaintext);
    }

    #[test]
    fn test_roundtrip_edge_inputs() {
        let key = [7u8; 32];
        for plaintext in ["", "ñandú €", "a\nb\tc"] {
            let sealed = encrypt(plaintext, &key).unwrap();
            assert_eq!(decrypt(&sealed, &key).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_randomized_per_call() {
        let key = [0u8; 32];
        let first = encrypt("same-plaintext", &key).unwrap();
        let second = encrypt("same-plaintext", &key).unwrap();

        assert_ne!(first, second);
        assert_eq!(decrypt(&first, &key).unwrap(), "same-plaintext");
        assert_eq!(decrypt(&second, &key).unwrap(), "same-plaintext");
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = encrypt("secret", &[0u8; 32]).unwrap();
        assert!(matches!(decrypt(&sealed, &[1u8; 32]), Err(Error::Config(_))));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let sealed = encrypt("secret", &[0u8; 32]).unwrap();
        let mut bytes = BASE64.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        assert!(decrypt(&BASE64.encode(bytes), &[0u8; 32]).is_err());
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let short = BASE64.encode([0u8; NONCE_SIZE]);
        assert!(decrypt(&short, &[0u8; 32]).is_err());
        assert!(decrypt("%%%", &[0u8; 32]).is_err());
    }

    #[test]
    fn test_ready_uses_configured_key() {
        let key = BASE64.encode([3u8; 32]);
        let config = Arc::new(MemoryConfig::new().with(SECRET_KEY_VAR, &key));
        let encryptor = Encryptor::new(config.clone());

        encryptor.ready().unwrap();
        let sealed = encryptor.encrypt("token").unwrap();

        assert_eq!(decrypt(&sealed, &[3u8; 32]).unwrap(), "token");
        assert!(config.appended().is_empty());
    }

    #[test]
    fn test_ready_generates_and_persists_once() {
        let config = Arc::new(MemoryConfig::new());
        let encryptor = Encryptor::new(config.clone());

        encryptor.ready().unwrap();
        encryptor.ready().unwrap();
        assert_eq!(config.appended(), vec![SECRET_KEY_VAR.to_string()]);

        // The persisted key is the one used by this run
        let sealed = encryptor.encrypt("token").unwrap();
        let stored = config.get(SECRET_KEY_VAR).unwrap().unwrap();
        let key = validate_key(&stored).unwrap();
        assert_eq!(decrypt(&sealed, &key).unwrap(), "token");
    }

    #[test]
    fn test_ready_rejects_invalid_configured_key() {
        let config = Arc::new(MemoryConfig::new().with(SECRET_KEY_VAR, "too-short"));
        let encryptor = Encryptor::new(config.clone());

        assert!(matches!(encryptor.ready(), Err(Error::Config(_))));
        assert!(config.appended().is_empty());
    }

    #[test]
    fn test_use_before_ready_fails() {
        let encryptor = Encryptor::new(Arc::new(MemoryConfig::new()));
        assert!(matches!(encryptor.encrypt("x"), Err(Error::Config(_))));
    }

    #[test]
    fn test_seal_encrypts_both_tokens() {
        let encryptor = Encryptor::new(Arc::new(MemoryConfig::new()));
        encryptor.ready().unwrap();

        let tokens = TokenPair::new("T1", "abc2");
        let sealed = encryptor.seal(&tokens).unwrap();

        assert_ne!(sealed.access_token(), "T1");
        assert_ne!(sealed.refresh_token(), "abc2");
        assert_eq!(encryptor.decrypt(sealed.access_token()).unwrap(), "T1");
        assert_eq!(encryptor.decrypt(sealed.refresh_token()).unwrap(), "abc2");
    }
}
