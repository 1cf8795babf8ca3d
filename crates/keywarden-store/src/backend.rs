//! Backing-store seam: the narrow interface to the external secret and
//! certificate store.
//!
//! This layer only sequences calls across the seam and treats any error as
//! a store failure; it never interprets certificate contents.

use keywarden_core::{CertificateInfo, CertificateProps, KwResult};

/// The store service: named stores that can be created, destroyed and
/// opened.
pub trait StoreBackend: Send + Sync {
    fn create(&self, name: &str) -> KwResult<()>;
    fn destroy(&self, name: &str) -> KwResult<()>;
    fn open(&self, name: &str) -> KwResult<Box<dyn StoreHandle>>;
}

/// An opened named store.
pub trait StoreHandle: Send {
    /// Create a certificate from `props`, stored under `props.alias`.
    fn create_pki_cert(&mut self, props: &CertificateProps) -> KwResult<()>;

    /// Fetch a certificate by alias.
    fn get_pki_cert(&self, alias: &str) -> KwResult<CertificateInfo>;

    /// The aggregate bundle of trusted certificates.
    fn get_pki_trusted_certs(&self) -> KwResult<CertificateInfo>;

    /// Remove a certificate by alias.
    fn remove_pki_cert(&mut self, alias: &str) -> KwResult<()>;

    /// Close the handle, releasing whatever the backend holds for it.
    fn close(self: Box<Self>) -> KwResult<()>;
}

/// The external PKI collaborator that materializes certificates from
/// properties. Issuance (key generation, signing, chaining) happens behind
/// this seam.
pub trait CertIssuer: Send + Sync {
    fn issue(&self, props: &CertificateProps) -> KwResult<CertificateInfo>;
}
