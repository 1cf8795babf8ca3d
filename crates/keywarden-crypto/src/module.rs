//! Module lifecycle: the one-time initialization that gates client
//! creation.
//!
//! The module is an explicitly constructed context rather than process
//! globals: every collaborator (backing store, enclave runtime,
//! provisioning gate, config) is injected, so the init/deinit state machine
//! is testable per instance. Init and deinit serialize on one lock, and
//! clients carry the init epoch's liveness flag so use after deinit fails
//! instead of touching freed state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use keywarden_core::{CryptoHomeConfig, KwError, KwResult, ProvisioningGate};
use keywarden_enclave::session::{EnclaveRuntime, ProgramImage};
use keywarden_store::{CryptoStore, KeyCategory, KeyFiles, KeyStore, StoreBackend};

use crate::client::CryptoClient;

/// State created by `init` and torn down by `deinit`.
struct Epoch {
    live: Arc<AtomicBool>,
    keys: Arc<KeyStore>,
    file_lock: Arc<Mutex<()>>,
}

pub struct CryptoModule {
    backend: Arc<dyn StoreBackend>,
    runtime: Arc<dyn EnclaveRuntime>,
    gate: ProvisioningGate,
    config: CryptoHomeConfig,
    state: Mutex<Option<Epoch>>,
}

impl CryptoModule {
    pub fn new(
        backend: Arc<dyn StoreBackend>,
        runtime: Arc<dyn EnclaveRuntime>,
        gate: ProvisioningGate,
        config: CryptoHomeConfig,
    ) -> Self {
        Self {
            backend,
            runtime,
            gate,
            config,
            state: Mutex::new(None),
        }
    }

    /// One-time initialization. Calling `init` on an initialized module is
    /// an error, not a no-op.
    pub fn init(&self) -> KwResult<()> {
        let mut state = self.state.lock();
        if state.is_some() {
            tracing::error!("re-initializing crypto module without de-initializing");
            return Err(KwError::AlreadyInitialized);
        }

        let store_name = &self.config.home.store_name;
        self.backend.create(store_name).map_err(|e| {
            tracing::error!(store = %store_name, error = %e, "could not create backing store");
            e
        })?;

        *state = Some(Epoch {
            live: Arc::new(AtomicBool::new(true)),
            keys: Arc::new(KeyStore::new()),
            file_lock: Arc::new(Mutex::new(())),
        });
        tracing::info!(store = %store_name, "crypto module initialized");
        Ok(())
    }

    /// Tear the module down. Never fails: a deinit before init and a
    /// backend that refuses to destroy its store are both logged and
    /// otherwise ignored so teardown always completes.
    pub fn deinit(&self) {
        let mut state = self.state.lock();
        let Some(epoch) = state.take() else {
            tracing::error!("crypto module deinit called before init");
            return;
        };

        let store_name = &self.config.home.store_name;
        if let Err(e) = self.backend.destroy(store_name) {
            tracing::warn!(store = %store_name, error = %e, "could not destroy backing store");
        }

        epoch.live.store(false, Ordering::SeqCst);
        epoch.keys.destroy_all(KeyCategory::Auth);
        epoch.keys.destroy_all(KeyCategory::Encryption);
        tracing::info!(store = %store_name, "crypto module deinitialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Create a crypto client: open the backing store, then bind an enclave
    /// session. All-or-nothing — if the session cannot be created, the
    /// already-opened store handle is closed before the error returns.
    pub fn create_client(&self) -> KwResult<CryptoClient> {
        let (live, keys, file_lock) = {
            let state = self.state.lock();
            match state.as_ref() {
                Some(epoch) => (
                    epoch.live.clone(),
                    epoch.keys.clone(),
                    epoch.file_lock.clone(),
                ),
                None => {
                    tracing::error!("crypto module not initialized");
                    return Err(KwError::NotInitialized);
                }
            }
        };

        let store_name = &self.config.home.store_name;
        let handle = self.backend.open(store_name).map_err(|e| {
            tracing::error!(store = %store_name, error = %e, "could not open backing store");
            e
        })?;
        let store = CryptoStore::new(
            keys,
            KeyFiles::new(self.config.home.keys_dir.clone()),
            file_lock,
            self.gate.clone(),
            handle,
        );

        let mut image = ProgramImage::named(self.config.enclave.program.clone());
        image.measurement = self.config.enclave.measurement.clone();
        let session = match self.runtime.create_session(&image) {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(program = %image.name, error = %e, "could not create enclave session");
                if let Err(close_err) = store.close() {
                    tracing::warn!(error = %close_err, "could not close store handle after failed session create");
                }
                return Err(KwError::SecureOperationFailed("create session"));
            }
        };

        Ok(CryptoClient::new(live, store, session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keywarden_core::{CertificateInfo, CertificateProps};
    use keywarden_enclave::session::{BoundaryError, EnclaveSession};
    use keywarden_enclave::SoftEnclaveRuntime;
    use keywarden_store::{MemStore, StoreHandle, StubIssuer};
    use std::sync::atomic::AtomicUsize;

    fn module_with(
        backend: Arc<dyn StoreBackend>,
        runtime: Arc<dyn EnclaveRuntime>,
    ) -> (tempfile::TempDir, CryptoModule) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CryptoHomeConfig::default();
        config.home.keys_dir = dir.path().join("keys");
        let module = CryptoModule::new(backend, runtime, ProvisioningGate::provisioned(), config);
        (dir, module)
    }

    fn default_module() -> (tempfile::TempDir, CryptoModule) {
        module_with(
            Arc::new(MemStore::new(Arc::new(StubIssuer))),
            Arc::new(SoftEnclaveRuntime::new()),
        )
    }

    #[test]
    fn test_double_init_fails() {
        let (_dir, module) = default_module();
        module.init().unwrap();
        assert!(matches!(module.init(), Err(KwError::AlreadyInitialized)));
        module.deinit();
        assert!(module.init().is_ok(), "init must work again after deinit");
        module.deinit();
    }

    #[test]
    fn test_deinit_before_init_is_harmless() {
        let (_dir, module) = default_module();
        module.deinit();
        assert!(!module.is_initialized());
    }

    #[test]
    fn test_create_client_requires_init() {
        let (_dir, module) = default_module();
        assert!(matches!(
            module.create_client(),
            Err(KwError::NotInitialized)
        ));
    }

    /// Backend whose `create` always fails.
    struct BrokenBackend;

    impl StoreBackend for BrokenBackend {
        fn create(&self, _name: &str) -> KwResult<()> {
            Err(KwError::StoreOperationFailed("disk full".into()))
        }
        fn destroy(&self, _name: &str) -> KwResult<()> {
            Err(KwError::StoreOperationFailed("disk full".into()))
        }
        fn open(&self, _name: &str) -> KwResult<Box<dyn StoreHandle>> {
            Err(KwError::StoreOperationFailed("disk full".into()))
        }
    }

    #[test]
    fn test_init_propagates_store_create_failure() {
        let (_dir, module) = module_with(Arc::new(BrokenBackend), Arc::new(SoftEnclaveRuntime::new()));
        assert!(matches!(
            module.init(),
            Err(KwError::StoreOperationFailed(_))
        ));
        assert!(!module.is_initialized());
    }

    /// Runtime that refuses to create sessions.
    struct DownRuntime;

    impl EnclaveRuntime for DownRuntime {
        fn create_session(
            &self,
            _image: &ProgramImage,
        ) -> Result<Box<dyn EnclaveSession>, BoundaryError> {
            Err(BoundaryError::Transport("enclave offline".into()))
        }
    }

    /// Backend wrapper that counts handle closes.
    struct CountingBackend {
        inner: MemStore,
        closes: Arc<AtomicUsize>,
    }

    struct CountingHandle {
        inner: Box<dyn StoreHandle>,
        closes: Arc<AtomicUsize>,
    }

    impl StoreBackend for CountingBackend {
        fn create(&self, name: &str) -> KwResult<()> {
            self.inner.create(name)
        }
        fn destroy(&self, name: &str) -> KwResult<()> {
            self.inner.destroy(name)
        }
        fn open(&self, name: &str) -> KwResult<Box<dyn StoreHandle>> {
            Ok(Box::new(CountingHandle {
                inner: self.inner.open(name)?,
                closes: self.closes.clone(),
            }))
        }
    }

    impl StoreHandle for CountingHandle {
        fn create_pki_cert(&mut self, props: &CertificateProps) -> KwResult<()> {
            self.inner.create_pki_cert(props)
        }
        fn get_pki_cert(&self, alias: &str) -> KwResult<CertificateInfo> {
            self.inner.get_pki_cert(alias)
        }
        fn get_pki_trusted_certs(&self) -> KwResult<CertificateInfo> {
            self.inner.get_pki_trusted_certs()
        }
        fn remove_pki_cert(&mut self, alias: &str) -> KwResult<()> {
            self.inner.remove_pki_cert(alias)
        }
        fn close(self: Box<Self>) -> KwResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.inner.close()
        }
    }

    #[test]
    fn test_failed_session_create_closes_the_opened_store() {
        let closes = Arc::new(AtomicUsize::new(0));
        let backend = CountingBackend {
            inner: MemStore::new(Arc::new(StubIssuer)),
            closes: closes.clone(),
        };
        let (_dir, module) = module_with(Arc::new(backend), Arc::new(DownRuntime));

        module.init().unwrap();
        assert!(matches!(
            module.create_client(),
            Err(KwError::SecureOperationFailed(_))
        ));
        assert_eq!(
            closes.load(Ordering::SeqCst),
            1,
            "the opened store handle must be closed when session creation fails"
        );
        module.deinit();
    }
}
