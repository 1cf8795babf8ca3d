//! keywarden-store: the key store behind the crypto client
//!
//! Two key categories live here. SAS authentication keys are caller-supplied
//! and memory-only; data-encryption keys are generated on demand, persisted
//! as raw key files, and cached in memory on first open. Certificate
//! material is not stored here — those calls are sequenced through the
//! backing-store seam.

pub mod backend;
pub mod files;
pub mod keys;
pub mod keystore;
pub mod mem;
pub mod store;

pub use backend::{CertIssuer, StoreBackend, StoreHandle};
pub use files::KeyFiles;
pub use keys::{EncryptionKey, KeyHandle, SasKey};
pub use keystore::{KeyCategory, KeyStore};
pub use mem::{MemStore, StubIssuer};
pub use store::{CryptoStore, ENCRYPTION_KEY_SIZE};
