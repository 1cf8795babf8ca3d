//! Session traits for the trusted execution boundary.
//!
//! Every call carries a dual-layered result: the transport into the trusted
//! context can fail, or the trusted program can run and report a non-zero
//! status. A call counts as successful only when both layers succeed;
//! [`BoundaryError`] keeps the two apart so callers can log the right one.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoundaryError {
    /// The call never reached the trusted program, or the reply was lost.
    #[error("boundary transport failure: {0}")]
    Transport(String),

    /// The trusted program executed and reported a non-zero status.
    #[error("trusted program returned status {0:#x}")]
    Operation(i32),
}

/// Identity of the trusted program a session binds to.
///
/// Sessions are always created against a fixed image; the runtime may verify
/// `measurement` against what it actually loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    pub name: String,
    pub measurement: Option<String>,
}

impl ProgramImage {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            measurement: None,
        }
    }
}

/// Creates sessions bound to a trusted program image.
pub trait EnclaveRuntime: Send + Sync {
    fn create_session(&self, image: &ProgramImage)
        -> Result<Box<dyn EnclaveSession>, BoundaryError>;
}

/// A live session with the trusted program.
///
/// Calls are synchronous and blocking; there is no retry, timeout, or
/// cancellation at this layer. Output buffers are caller-allocated and must
/// be exactly the size the operation requires.
pub trait EnclaveSession: Send {
    /// Fill `out` with random bytes from the trusted source.
    fn get_random_bytes(&mut self, out: &mut [u8]) -> Result<(), BoundaryError>;

    /// Create the master encryption key inside the trusted context.
    /// Creating a key that already exists is a success.
    fn create_master_key(&mut self) -> Result<(), BoundaryError>;

    /// Destroy the master encryption key. Destroying an absent key is a
    /// success.
    fn destroy_master_key(&mut self) -> Result<(), BoundaryError>;

    /// Seal `plaintext` for `identity` into `out`, which must be exactly
    /// `plaintext.len() + CIPHER_OVERHEAD` bytes.
    fn encrypt(
        &mut self,
        plaintext: &[u8],
        identity: &[u8],
        iv: &[u8],
        out: &mut [u8],
    ) -> Result<(), BoundaryError>;

    /// Open `ciphertext` for `identity` into `out`, which must be exactly
    /// `ciphertext.len() - CIPHER_OVERHEAD` bytes.
    fn decrypt(
        &mut self,
        ciphertext: &[u8],
        identity: &[u8],
        iv: &[u8],
        out: &mut [u8],
    ) -> Result<(), BoundaryError>;

    /// Terminate the session. Failures are reported so callers can log them;
    /// the session is gone either way.
    fn terminate(self: Box<Self>) -> Result<(), BoundaryError>;
}
