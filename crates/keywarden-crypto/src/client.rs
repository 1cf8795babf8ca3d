//! The per-handle crypto client.
//!
//! A client exclusively owns one opened store and one enclave session; the
//! two are released together by [`CryptoClient::destroy`]. Consuming `self`
//! there makes use-after-destroy unrepresentable — ownership transfer, not
//! reference counting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keywarden_core::{CertificateInfo, CertificateProps, KwError, KwResult, SizedBuffer};
use keywarden_enclave::protocol::{decrypt_data, encrypt_data};
use keywarden_enclave::session::EnclaveSession;
use keywarden_store::{CryptoStore, KeyCategory, KeyHandle};

pub struct CryptoClient {
    live: Arc<AtomicBool>,
    store: CryptoStore,
    session: Box<dyn EnclaveSession>,
}

impl CryptoClient {
    pub(crate) fn new(
        live: Arc<AtomicBool>,
        store: CryptoStore,
        session: Box<dyn EnclaveSession>,
    ) -> Self {
        Self {
            live,
            store,
            session,
        }
    }

    /// A client created before `deinit` must not keep operating afterwards.
    fn ensure_live(&self) -> KwResult<()> {
        if !self.live.load(Ordering::SeqCst) {
            tracing::error!("crypto module not initialized");
            return Err(KwError::NotInitialized);
        }
        Ok(())
    }

    /// Release the store handle and the enclave session. Failures on either
    /// are logged; teardown always completes.
    pub fn destroy(self) {
        let CryptoClient { store, session, .. } = self;
        if let Err(e) = store.close() {
            tracing::warn!(error = %e, "could not close store handle");
        }
        if let Err(e) = session.terminate() {
            tracing::warn!(error = %e, "could not terminate enclave session");
        }
    }

    /// Draw `num_bytes` random bytes from the trusted source.
    pub fn get_random_bytes(&mut self, num_bytes: usize) -> KwResult<SizedBuffer> {
        self.ensure_live()?;
        if num_bytes == 0 {
            tracing::error!("invalid number of random bytes requested");
            return Err(KwError::InvalidArgument("num_bytes"));
        }
        let mut buffer = SizedBuffer::alloc(num_bytes)?;
        self.session
            .get_random_bytes(buffer.as_mut_slice())
            .map_err(|e| {
                tracing::error!(error = %e, "enclave random bytes call failed");
                KwError::SecureOperationFailed("get_random_bytes")
            })?;
        Ok(buffer)
    }

    pub fn create_master_encryption_key(&mut self) -> KwResult<()> {
        self.ensure_live()?;
        self.session.create_master_key().map_err(|e| {
            tracing::error!(error = %e, "enclave master key creation failed");
            KwError::SecureOperationFailed("create_master_key")
        })
    }

    pub fn destroy_master_encryption_key(&mut self) -> KwResult<()> {
        self.ensure_live()?;
        self.session.destroy_master_key().map_err(|e| {
            tracing::error!(error = %e, "enclave master key destruction failed");
            KwError::SecureOperationFailed("destroy_master_key")
        })
    }

    /// Create a certificate from `props`, then fetch it back by alias.
    ///
    /// A fetch failure after a successful create is still an overall
    /// failure — the caller cannot assume the certificate was not created.
    pub fn create_certificate(&mut self, props: &CertificateProps) -> KwResult<CertificateInfo> {
        self.ensure_live()?;
        props.validate()?;

        self.store.create_pki_cert(props).map_err(|e| {
            tracing::error!(alias = %props.alias, error = %e, "could not create certificate in the store");
            e
        })?;
        self.store.get_pki_cert(&props.alias).map_err(|e| {
            tracing::error!(alias = %props.alias, error = %e, "certificate created but could not be fetched");
            e
        })
    }

    /// Best-effort certificate removal: a missing certificate is logged,
    /// not an error.
    pub fn destroy_certificate(&mut self, alias: &str) -> KwResult<()> {
        self.ensure_live()?;
        if alias.is_empty() {
            tracing::error!("invalid certificate alias provided");
            return Err(KwError::InvalidArgument("certificate alias"));
        }
        if let Err(e) = self.store.remove_pki_cert(alias) {
            tracing::info!(alias, error = %e, "certificate not removed from store");
        }
        Ok(())
    }

    /// The aggregate trusted-certificate bundle, as the store provides it.
    pub fn get_trust_bundle(&self) -> KwResult<CertificateInfo> {
        self.ensure_live()?;
        self.store.get_pki_trusted_certs()
    }

    /// Seal `plaintext` for `identity`; the result is
    /// `plaintext.len() + CIPHER_OVERHEAD` bytes.
    pub fn encrypt(
        &mut self,
        identity: &[u8],
        plaintext: &[u8],
        iv: &[u8],
    ) -> KwResult<SizedBuffer> {
        self.ensure_live()?;
        encrypt_data(self.session.as_mut(), identity, plaintext, iv)
    }

    /// Open a cipher envelope sealed by [`CryptoClient::encrypt`].
    pub fn decrypt(
        &mut self,
        identity: &[u8],
        ciphertext: &[u8],
        iv: &[u8],
    ) -> KwResult<SizedBuffer> {
        self.ensure_live()?;
        decrypt_data(self.session.as_mut(), identity, ciphertext, iv)
    }

    pub fn insert_sas_key(&self, name: &str, bytes: &[u8]) -> KwResult<()> {
        self.ensure_live()?;
        self.store.insert_sas_key(name, bytes)
    }

    pub fn insert_encryption_key(&self, name: &str) -> KwResult<()> {
        self.ensure_live()?;
        self.store.insert_encryption_key(name)
    }

    pub fn open_key(&self, category: KeyCategory, name: &str) -> KwResult<KeyHandle> {
        self.ensure_live()?;
        self.store.open_key(category, name)
    }

    pub fn close_key(&self, handle: KeyHandle) -> KwResult<()> {
        self.ensure_live()?;
        self.store.close_key(handle)
    }

    pub fn remove_key(&self, category: KeyCategory, name: &str) -> KwResult<()> {
        self.ensure_live()?;
        self.store.remove_key(category, name)
    }
}
