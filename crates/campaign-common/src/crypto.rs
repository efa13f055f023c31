//! Secretbox encryption of embedded payloads
//!
//! Encrypted payloads use XSalsa20-Poly1305 with a fresh random nonce per
//! call and are stored as `nonce || tag || ciphertext`, the layout NaCl
//! `SecretBox` produces. Only the key id is ever written to a catalog.

use crate::error::{CommonError, Result};
use crypto_secretbox::aead::generic_array::GenericArray;
use crypto_secretbox::aead::{Aead, AeadCore, KeyInit, OsRng};
use crypto_secretbox::XSalsa20Poly1305;
use serde::Deserialize;
use std::path::Path;

/// Secretbox key length in bytes
pub const KEY_SIZE: usize = 32;

/// Secretbox nonce length in bytes
pub const NONCE_SIZE: usize = 24;

/// Symmetric key held for the duration of a session
#[derive(Clone)]
pub struct EncryptionKey {
    id: String,
    bytes: [u8; KEY_SIZE],
}

#[derive(Deserialize)]
struct KeyFile {
    id: String,
    key: String,
}

impl EncryptionKey {
    pub fn new(id: impl Into<String>, bytes: [u8; KEY_SIZE]) -> Self {
        Self {
            id: id.into(),
            bytes,
        }
    }

    /// Build a key from its hex encoding
    pub fn from_hex(id: impl Into<String>, key_hex: &str) -> Result<Self> {
        let raw = hex::decode(key_hex.trim())
            .map_err(|e| CommonError::InvalidKey(format!("key is not hex: {}", e)))?;
        let bytes: [u8; KEY_SIZE] = raw.as_slice().try_into().map_err(|_| {
            CommonError::InvalidKey(format!("expected {} bytes, got {}", KEY_SIZE, raw.len()))
        })?;
        Ok(Self::new(id, bytes))
    }

    /// Load a JSON key file of the form `{"id": "...", "key": "<hex>"}`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CommonError::KeyFile(format!("{}: {}", path.display(), e)))?;
        let file: KeyFile = serde_json::from_str(&text)
            .map_err(|e| CommonError::KeyFile(format!("{}: {}", path.display(), e)))?;
        if file.id.is_empty() {
            return Err(CommonError::KeyFile(format!(
                "{}: key id must not be empty",
                path.display()
            )));
        }
        Self::from_hex(file.id, &file.key)
    }

    /// Identifier recorded in the `key` table
    pub fn id(&self) -> &str {
        &self.id
    }

    fn cipher(&self) -> XSalsa20Poly1305 {
        XSalsa20Poly1305::new(GenericArray::from_slice(&self.bytes))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Encrypt a payload when a key is configured, otherwise return it unchanged
pub fn encrypt(data: Vec<u8>, key: Option<&EncryptionKey>) -> Result<Vec<u8>> {
    let Some(key) = key else {
        return Ok(data);
    };
    let nonce = XSalsa20Poly1305::generate_nonce(&mut OsRng);
    let sealed = key
        .cipher()
        .encrypt(&nonce, data.as_slice())
        .map_err(|e| CommonError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Reverse [`encrypt`]
pub fn decrypt(data: &[u8], key: Option<&EncryptionKey>) -> Result<Vec<u8>> {
    let Some(key) = key else {
        return Ok(data.to_vec());
    };
    if data.len() < NONCE_SIZE {
        return Err(CommonError::Decryption(format!(
            "payload of {} bytes is shorter than the nonce",
            data.len()
        )));
    }
    let (nonce, sealed) = data.split_at(NONCE_SIZE);
    key.cipher()
        .decrypt(GenericArray::from_slice(nonce), sealed)
        .map_err(|e| CommonError::Decryption(e.to_string()))
}
