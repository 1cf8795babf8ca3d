//! Software enclave: an in-process stand-in for the trusted program.
//!
//! The master encryption key lives in the runtime, shared by every session
//! the runtime creates, and never crosses the session trait. Data keys are
//! derived per identity with HKDF-SHA256, the caller IV is stretched to the
//! 192-bit nonce XChaCha20-Poly1305 requires, and the identity doubles as
//! AAD so an envelope opens only for the identity it was sealed for.

use std::sync::Arc;

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use parking_lot::Mutex;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::protocol::{CIPHER_HEADER_SIZE, CIPHER_OVERHEAD};
use crate::session::{BoundaryError, EnclaveRuntime, EnclaveSession, ProgramImage};
use crate::KEY_SIZE;

const HEADER_MAGIC: [u8; 4] = *b"KWEV";
const HEADER_VERSION: u8 = 1;

const NONCE_SIZE: usize = 24;

// Operation status codes mirrored from the trusted program.
const ERR_NO_MASTER_KEY: i32 = 0x101;
const ERR_BAD_ENVELOPE: i32 = 0x102;
const ERR_AUTH_FAILED: i32 = 0x103;
const ERR_BAD_OUTPUT_SIZE: i32 = 0x104;
const ERR_KDF_FAILED: i32 = 0x105;

struct MasterKeyCell {
    key: Option<[u8; KEY_SIZE]>,
}

impl Drop for MasterKeyCell {
    fn drop(&mut self) {
        if let Some(mut key) = self.key.take() {
            key.zeroize();
        }
    }
}

/// In-process [`EnclaveRuntime`]. All sessions share one master-key cell,
/// mirroring a trusted program whose sealed state outlives any session.
pub struct SoftEnclaveRuntime {
    state: Arc<Mutex<MasterKeyCell>>,
}

impl SoftEnclaveRuntime {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MasterKeyCell { key: None })),
        }
    }
}

impl Default for SoftEnclaveRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl EnclaveRuntime for SoftEnclaveRuntime {
    fn create_session(
        &self,
        image: &ProgramImage,
    ) -> Result<Box<dyn EnclaveSession>, BoundaryError> {
        tracing::debug!(program = %image.name, "opening software enclave session");
        Ok(Box::new(SoftSession {
            state: self.state.clone(),
        }))
    }
}

struct SoftSession {
    state: Arc<Mutex<MasterKeyCell>>,
}

impl EnclaveSession for SoftSession {
    fn get_random_bytes(&mut self, out: &mut [u8]) -> Result<(), BoundaryError> {
        rand::thread_rng().fill_bytes(out);
        Ok(())
    }

    fn create_master_key(&mut self) -> Result<(), BoundaryError> {
        let mut cell = self.state.lock();
        if cell.key.is_none() {
            let mut key = [0u8; KEY_SIZE];
            rand::thread_rng().fill_bytes(&mut key);
            cell.key = Some(key);
            tracing::debug!("master encryption key created");
        }
        Ok(())
    }

    fn destroy_master_key(&mut self) -> Result<(), BoundaryError> {
        let mut cell = self.state.lock();
        if let Some(mut key) = cell.key.take() {
            key.zeroize();
            tracing::debug!("master encryption key destroyed");
        }
        Ok(())
    }

    fn encrypt(
        &mut self,
        plaintext: &[u8],
        identity: &[u8],
        iv: &[u8],
        out: &mut [u8],
    ) -> Result<(), BoundaryError> {
        if out.len() != plaintext.len() + CIPHER_OVERHEAD {
            return Err(BoundaryError::Operation(ERR_BAD_OUTPUT_SIZE));
        }
        let key = self.identity_key(identity)?;
        let nonce = stretch_nonce(iv)?;

        let cipher = XChaCha20Poly1305::new((&*key).into());
        let sealed = cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: identity,
                },
            )
            .map_err(|_| BoundaryError::Operation(ERR_AUTH_FAILED))?;

        out[..4].copy_from_slice(&HEADER_MAGIC);
        out[4] = HEADER_VERSION;
        out[5..CIPHER_HEADER_SIZE].fill(0);
        out[CIPHER_HEADER_SIZE..].copy_from_slice(&sealed);
        Ok(())
    }

    fn decrypt(
        &mut self,
        ciphertext: &[u8],
        identity: &[u8],
        iv: &[u8],
        out: &mut [u8],
    ) -> Result<(), BoundaryError> {
        if ciphertext.len() <= CIPHER_OVERHEAD
            || out.len() != ciphertext.len() - CIPHER_OVERHEAD
        {
            return Err(BoundaryError::Operation(ERR_BAD_OUTPUT_SIZE));
        }
        let (header, body) = ciphertext.split_at(CIPHER_HEADER_SIZE);
        if header[..4] != HEADER_MAGIC || header[4] != HEADER_VERSION {
            return Err(BoundaryError::Operation(ERR_BAD_ENVELOPE));
        }

        let key = self.identity_key(identity)?;
        let nonce = stretch_nonce(iv)?;

        let cipher = XChaCha20Poly1305::new((&*key).into());
        let mut opened = cipher
            .decrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: body,
                    aad: identity,
                },
            )
            .map_err(|_| BoundaryError::Operation(ERR_AUTH_FAILED))?;

        out.copy_from_slice(&opened);
        opened.zeroize();
        Ok(())
    }

    fn terminate(self: Box<Self>) -> Result<(), BoundaryError> {
        tracing::debug!("software enclave session terminated");
        Ok(())
    }
}

impl SoftSession {
    /// Derive the data key for `identity` from the master key.
    fn identity_key(&self, identity: &[u8]) -> Result<Zeroizing<[u8; KEY_SIZE]>, BoundaryError> {
        let cell = self.state.lock();
        let master = cell
            .key
            .as_ref()
            .ok_or(BoundaryError::Operation(ERR_NO_MASTER_KEY))?;

        let hkdf = Hkdf::<Sha256>::new(Some(b"keywarden-data-key"), master);
        let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
        hkdf.expand(identity, okm.as_mut())
            .map_err(|_| BoundaryError::Operation(ERR_KDF_FAILED))?;
        Ok(okm)
    }
}

/// Stretch the caller-supplied IV (any non-zero length) to the nonce size.
fn stretch_nonce(iv: &[u8]) -> Result<[u8; NONCE_SIZE], BoundaryError> {
    let hkdf = Hkdf::<Sha256>::new(Some(b"keywarden-iv"), iv);
    let mut nonce = [0u8; NONCE_SIZE];
    hkdf.expand(b"nonce", &mut nonce)
        .map_err(|_| BoundaryError::Operation(ERR_KDF_FAILED))?;
    Ok(nonce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decrypt_data, encrypt_data, CIPHER_OVERHEAD};
    use keywarden_core::KwError;
    use proptest::prelude::*;

    fn session_with_master_key() -> Box<dyn EnclaveSession> {
        let runtime = SoftEnclaveRuntime::new();
        let mut session = runtime
            .create_session(&ProgramImage::named("test-ta"))
            .unwrap();
        session.create_master_key().unwrap();
        session
    }

    #[test]
    fn test_random_bytes_differ() {
        let mut session = session_with_master_key();
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        session.get_random_bytes(&mut a).unwrap();
        session.get_random_bytes(&mut b).unwrap();
        assert_ne!(a, b, "two random draws must differ");
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let mut session = session_with_master_key();
        let ct = encrypt_data(session.as_mut(), b"module-a", b"hello enclave", b"iv-1").unwrap();
        assert_eq!(ct.len(), b"hello enclave".len() + CIPHER_OVERHEAD);

        let pt = decrypt_data(session.as_mut(), b"module-a", ct.as_slice(), b"iv-1").unwrap();
        assert_eq!(pt.as_slice(), b"hello enclave");
    }

    #[test]
    fn test_encrypt_without_master_key_fails() {
        let runtime = SoftEnclaveRuntime::new();
        let mut session = runtime
            .create_session(&ProgramImage::named("test-ta"))
            .unwrap();
        assert!(matches!(
            encrypt_data(session.as_mut(), b"id", b"data", b"iv"),
            Err(KwError::SecureOperationFailed("encrypt"))
        ));
    }

    #[test]
    fn test_decrypt_wrong_identity_fails() {
        let mut session = session_with_master_key();
        let ct = encrypt_data(session.as_mut(), b"module-a", b"secret", b"iv").unwrap();
        assert!(
            decrypt_data(session.as_mut(), b"module-b", ct.as_slice(), b"iv").is_err(),
            "an envelope must only open for the identity it was sealed for"
        );
    }

    #[test]
    fn test_decrypt_wrong_iv_fails() {
        let mut session = session_with_master_key();
        let ct = encrypt_data(session.as_mut(), b"module-a", b"secret", b"iv-1").unwrap();
        assert!(decrypt_data(session.as_mut(), b"module-a", ct.as_slice(), b"iv-2").is_err());
    }

    #[test]
    fn test_tampered_envelope_fails() {
        let mut session = session_with_master_key();
        let mut ct = encrypt_data(session.as_mut(), b"module-a", b"secret", b"iv")
            .unwrap()
            .into_vec();

        // Flip a ciphertext byte past the header.
        ct[CIPHER_HEADER_SIZE + 1] ^= 0xFF;
        assert!(decrypt_data(session.as_mut(), b"module-a", &ct, b"iv").is_err());
    }

    #[test]
    fn test_bad_header_magic_fails() {
        let mut session = session_with_master_key();
        let mut ct = encrypt_data(session.as_mut(), b"module-a", b"secret", b"iv")
            .unwrap()
            .into_vec();

        ct[0] ^= 0xFF;
        assert!(decrypt_data(session.as_mut(), b"module-a", &ct, b"iv").is_err());
    }

    #[test]
    fn test_master_key_lifecycle_idempotent() {
        let mut session = session_with_master_key();
        // Re-creating an existing key is a no-op success and must not rotate
        // the key out from under sealed data.
        let ct = encrypt_data(session.as_mut(), b"id", b"payload", b"iv").unwrap();
        session.create_master_key().unwrap();
        let pt = decrypt_data(session.as_mut(), b"id", ct.as_slice(), b"iv").unwrap();
        assert_eq!(pt.as_slice(), b"payload");

        session.destroy_master_key().unwrap();
        session.destroy_master_key().unwrap();
        assert!(decrypt_data(session.as_mut(), b"id", ct.as_slice(), b"iv").is_err());
    }

    #[test]
    fn test_sessions_share_master_key() {
        let runtime = SoftEnclaveRuntime::new();
        let image = ProgramImage::named("test-ta");
        let mut a = runtime.create_session(&image).unwrap();
        let mut b = runtime.create_session(&image).unwrap();

        a.create_master_key().unwrap();
        let ct = encrypt_data(a.as_mut(), b"id", b"shared", b"iv").unwrap();
        let pt = decrypt_data(b.as_mut(), b"id", ct.as_slice(), b"iv").unwrap();
        assert_eq!(pt.as_slice(), b"shared");
    }

    proptest! {
        #[test]
        fn prop_roundtrip_recovers_plaintext(
            plaintext in proptest::collection::vec(any::<u8>(), 1..512),
            identity in proptest::collection::vec(any::<u8>(), 1..64),
            iv in proptest::collection::vec(any::<u8>(), 1..64),
        ) {
            let mut session = session_with_master_key();
            let ct = encrypt_data(session.as_mut(), &identity, &plaintext, &iv).unwrap();
            prop_assert_eq!(ct.len(), plaintext.len() + CIPHER_OVERHEAD);
            let pt = decrypt_data(session.as_mut(), &identity, ct.as_slice(), &iv).unwrap();
            prop_assert_eq!(pt.as_slice(), plaintext.as_slice());
        }
    }
}
