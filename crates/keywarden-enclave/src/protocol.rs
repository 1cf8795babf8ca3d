//! Buffer-sizing call protocol over an enclave session.
//!
//! The crypto client calls through here rather than driving a session
//! directly: this layer validates the input buffers, derives the output
//! size from the input size, allocates, and interprets boundary failures.
//! Output buffers are allocated before the boundary call is attempted and
//! are released exactly once on every exit path (dropped on failure, moved
//! to the caller on success).

use keywarden_core::{KwError, KwResult, SizedBuffer};

use crate::session::EnclaveSession;

/// Envelope header: magic, format version, reserved padding.
pub const CIPHER_HEADER_SIZE: usize = 8;

/// Poly1305 authentication tag appended by the trusted program.
pub const TAG_SIZE: usize = 16;

/// Fixed number of bytes `encrypt` adds to a plaintext.
pub const CIPHER_OVERHEAD: usize = CIPHER_HEADER_SIZE + TAG_SIZE;

fn require_filled(buf: &[u8], what: &'static str) -> KwResult<()> {
    if buf.is_empty() {
        tracing::error!("invalid {what} buffer provided");
        return Err(KwError::InvalidArgument(what));
    }
    Ok(())
}

/// Seal `plaintext` for `identity` and return the cipher envelope.
///
/// The envelope is exactly `plaintext.len() + CIPHER_OVERHEAD` bytes.
pub fn encrypt_data(
    session: &mut dyn EnclaveSession,
    identity: &[u8],
    plaintext: &[u8],
    iv: &[u8],
) -> KwResult<SizedBuffer> {
    require_filled(identity, "identity")?;
    require_filled(plaintext, "plaintext")?;
    require_filled(iv, "initialization vector")?;

    let mut ciphertext = SizedBuffer::alloc(plaintext.len() + CIPHER_OVERHEAD)?;
    session
        .encrypt(plaintext, identity, iv, ciphertext.as_mut_slice())
        .map_err(|e| {
            tracing::error!(error = %e, "enclave encrypt call failed");
            KwError::SecureOperationFailed("encrypt")
        })?;
    Ok(ciphertext)
}

/// Open a cipher envelope for `identity` and return the plaintext.
///
/// An envelope no longer than `CIPHER_OVERHEAD` cannot have been produced by
/// [`encrypt_data`] and is rejected before anything is allocated.
pub fn decrypt_data(
    session: &mut dyn EnclaveSession,
    identity: &[u8],
    ciphertext: &[u8],
    iv: &[u8],
) -> KwResult<SizedBuffer> {
    require_filled(identity, "identity")?;
    require_filled(ciphertext, "ciphertext")?;
    require_filled(iv, "initialization vector")?;

    if ciphertext.len() <= CIPHER_OVERHEAD {
        tracing::error!(
            len = ciphertext.len(),
            overhead = CIPHER_OVERHEAD,
            "ciphertext shorter than the cipher envelope overhead"
        );
        return Err(KwError::InvalidCiphertext(ciphertext.len()));
    }

    let mut plaintext = SizedBuffer::alloc(ciphertext.len() - CIPHER_OVERHEAD)?;
    session
        .decrypt(ciphertext, identity, iv, plaintext.as_mut_slice())
        .map_err(|e| {
            tracing::error!(error = %e, "enclave decrypt call failed");
            KwError::SecureOperationFailed("decrypt")
        })?;
    Ok(plaintext)
}
