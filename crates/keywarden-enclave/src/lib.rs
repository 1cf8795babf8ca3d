//! keywarden-enclave: the trusted-execution boundary seam
//!
//! The host never sees raw master-key material; it opens a session against a
//! trusted program image and marshals buffers through it. This crate defines
//! the session traits, the buffer-sizing call protocol the crypto client
//! uses, and a software enclave that stands in for the trusted program.
//!
//! Cipher envelope produced by `encrypt`:
//! ```text
//! [8 bytes: magic || version || reserved][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! ```
//! so `ciphertext.len == plaintext.len + CIPHER_OVERHEAD` always holds.

pub mod protocol;
pub mod session;
pub mod soft;

pub use protocol::{decrypt_data, encrypt_data, CIPHER_HEADER_SIZE, CIPHER_OVERHEAD, TAG_SIZE};
pub use session::{BoundaryError, EnclaveRuntime, EnclaveSession, ProgramImage};
pub use soft::SoftEnclaveRuntime;

/// Size of the master encryption key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;
