//! keywarden-crypto: the crypto client and its module lifecycle
//!
//! A [`CryptoModule`] is initialized once over a backing store and an
//! enclave runtime; it hands out [`CryptoClient`] handles, each owning an
//! opened store and a trusted-boundary session. Clients broker random
//! bytes, master-key lifecycle, certificate material, authenticated
//! encrypt/decrypt, and the SAS/data-encryption key surface.

pub mod client;
pub mod module;

pub use client::CryptoClient;
pub use module::CryptoModule;
