//! Typed key handles constructed from store entries.
//!
//! Opening a key yields one of these wrappers; closing it drops the wrapper
//! and zeroizes its copy of the bytes. The store's cached entry is not
//! affected by either.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::keystore::KeyCategory;

type HmacSha256 = Hmac<Sha256>;

/// Caller-supplied authentication key. Signs requests with HMAC-SHA256.
pub struct SasKey {
    bytes: Vec<u8>,
}

impl SasKey {
    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// HMAC-SHA256 signature of `data` under this key.
    pub fn sign(&self, data: &[u8]) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(&self.bytes)
            .expect("HMAC accepts keys of any length");
        mac.update(data);
        mac.finalize().into_bytes().into()
    }
}

impl Drop for SasKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SasKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SasKey").field("bytes", &"[REDACTED]").finish()
    }
}

/// System-generated data-encryption key.
pub struct EncryptionKey {
    bytes: Vec<u8>,
}

impl EncryptionKey {
    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// An open key handle, typed by category.
#[derive(Debug)]
pub enum KeyHandle {
    Sas(SasKey),
    Encryption(EncryptionKey),
}

impl KeyHandle {
    pub fn category(&self) -> KeyCategory {
        match self {
            KeyHandle::Sas(_) => KeyCategory::Auth,
            KeyHandle::Encryption(_) => KeyCategory::Encryption,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            KeyHandle::Sas(key) => key.as_bytes(),
            KeyHandle::Encryption(key) => key.as_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_is_deterministic() {
        let key = SasKey::from_bytes(b"shared-access-key");
        assert_eq!(key.sign(b"payload"), key.sign(b"payload"));
    }

    #[test]
    fn test_sign_differs_across_keys_and_data() {
        let a = SasKey::from_bytes(b"key-a");
        let b = SasKey::from_bytes(b"key-b");
        assert_ne!(a.sign(b"payload"), b.sign(b"payload"));
        assert_ne!(a.sign(b"payload"), a.sign(b"other payload"));
    }

    #[test]
    fn test_handle_exposes_category_and_bytes() {
        let handle = KeyHandle::Encryption(EncryptionKey::from_bytes(b"\xAA\xBB"));
        assert_eq!(handle.category(), KeyCategory::Encryption);
        assert_eq!(handle.as_bytes(), b"\xAA\xBB");
    }

    #[test]
    fn test_debug_redacts_key_material() {
        let handle = KeyHandle::Sas(SasKey::from_bytes(b"top-secret"));
        assert!(!format!("{handle:?}").contains("top-secret"));
    }
}
