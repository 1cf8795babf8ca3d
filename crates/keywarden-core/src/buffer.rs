//! Owned byte buffers for data crossing the trusted boundary.

use zeroize::Zeroize;

use crate::{KwError, KwResult};

/// An owned, non-empty byte buffer.
///
/// Inputs and outputs of the trusted-boundary operations travel as
/// `SizedBuffer`s. A buffer is valid by construction: both constructors
/// reject zero length, and allocation failure surfaces as
/// [`KwError::AllocationFailed`] instead of aborting. Contents are zeroized
/// on drop, so every exit path releases the bytes exactly once.
pub struct SizedBuffer {
    data: Vec<u8>,
}

impl SizedBuffer {
    /// Allocate a zero-filled buffer of exactly `len` bytes.
    pub fn alloc(len: usize) -> KwResult<Self> {
        if len == 0 {
            return Err(KwError::InvalidArgument("zero-length buffer"));
        }
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| KwError::AllocationFailed)?;
        data.resize(len, 0);
        Ok(Self { data })
    }

    /// Copy `bytes` into a fresh buffer.
    pub fn copy_from(bytes: &[u8]) -> KwResult<Self> {
        if bytes.is_empty() {
            return Err(KwError::InvalidArgument("empty buffer"));
        }
        let mut data = Vec::new();
        data.try_reserve_exact(bytes.len())
            .map_err(|_| KwError::AllocationFailed)?;
        data.extend_from_slice(bytes);
        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Take the bytes out, transferring the zeroization duty to the caller.
    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}

impl AsRef<[u8]> for SizedBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for SizedBuffer {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

impl std::fmt::Debug for SizedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SizedBuffer")
            .field("len", &self.data.len())
            .field("data", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_zero_length_rejected() {
        assert!(matches!(
            SizedBuffer::alloc(0),
            Err(KwError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_copy_from_empty_rejected() {
        assert!(matches!(
            SizedBuffer::copy_from(b""),
            Err(KwError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_alloc_is_zero_filled() {
        let buf = SizedBuffer::alloc(16).unwrap();
        assert_eq!(buf.len(), 16);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_copy_roundtrip() {
        let buf = SizedBuffer::copy_from(b"key material").unwrap();
        assert_eq!(buf.as_slice(), b"key material");
        assert_eq!(buf.into_vec(), b"key material".to_vec());
    }

    #[test]
    fn test_debug_redacts_contents() {
        let buf = SizedBuffer::copy_from(b"super secret").unwrap();
        let rendered = format!("{buf:?}");
        assert!(!rendered.contains("secret"), "debug output must not leak bytes");
        assert!(rendered.contains("REDACTED"));
    }
}
