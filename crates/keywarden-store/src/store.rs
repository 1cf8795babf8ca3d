//! Provisioning-gated key and certificate surface over an opened store.
//!
//! One `CryptoStore` exists per open handle; the in-memory [`KeyStore`] is
//! shared across handles of the same named store, while the backing-store
//! handle is exclusive to this one.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::RngCore;
use zeroize::Zeroizing;

use keywarden_core::{
    CertificateInfo, CertificateProps, KwError, KwResult, ProvisioningGate,
};

use crate::backend::StoreHandle;
use crate::files::KeyFiles;
use crate::keys::{EncryptionKey, KeyHandle, SasKey};
use crate::keystore::{KeyCategory, KeyStore};

/// Generated data-encryption keys are 256-bit.
pub const ENCRYPTION_KEY_SIZE: usize = 32;

pub struct CryptoStore {
    keys: Arc<KeyStore>,
    files: KeyFiles,
    /// Serializes check/load/write/delete sequences on key files across
    /// handles of the same named store, so a delete cannot race a lazy load
    /// and two inserts cannot both generate.
    file_lock: Arc<Mutex<()>>,
    gate: ProvisioningGate,
    handle: Box<dyn StoreHandle>,
}

impl CryptoStore {
    pub fn new(
        keys: Arc<KeyStore>,
        files: KeyFiles,
        file_lock: Arc<Mutex<()>>,
        gate: ProvisioningGate,
        handle: Box<dyn StoreHandle>,
    ) -> Self {
        Self {
            keys,
            files,
            file_lock,
            gate,
            handle,
        }
    }

    /// Insert a caller-supplied SAS authentication key. Memory-only: the
    /// key does not survive a process restart.
    pub fn insert_sas_key(&self, name: &str, bytes: &[u8]) -> KwResult<()> {
        require_name(name)?;
        if bytes.is_empty() {
            tracing::error!(key = name, "invalid key bytes provided");
            return Err(KwError::InvalidArgument("key bytes"));
        }
        self.gate.ensure_provisioned()?;
        self.keys.put(KeyCategory::Auth, name, bytes)
    }

    /// Ensure a data-encryption key named `name` exists on disk.
    ///
    /// Idempotent: a key that is already cached or already persisted is left
    /// untouched — regenerating over a live key file would silently orphan
    /// everything encrypted under it. The in-memory cache is *not* populated
    /// here; that happens lazily on the first open.
    pub fn insert_encryption_key(&self, name: &str) -> KwResult<()> {
        require_name(name)?;
        self.gate.ensure_provisioned()?;

        let _files = self.file_lock.lock();
        if self.keys.exists(KeyCategory::Encryption, name) || self.files.exists(name) {
            tracing::debug!(key = name, "encryption key already present");
            return Ok(());
        }

        let mut key = Zeroizing::new([0u8; ENCRYPTION_KEY_SIZE]);
        rand::thread_rng().fill_bytes(key.as_mut());
        self.files.write(name, key.as_ref()).map_err(|e| {
            tracing::error!(key = name, error = %e, "could not persist encryption key");
            KwError::StoreOperationFailed(format!("persist key {name}: {e}"))
        })
    }

    /// Open a key as a typed handle.
    ///
    /// Encryption keys are loaded from their backing file and cached on the
    /// first open; authentication keys must already be cached.
    pub fn open_key(&self, category: KeyCategory, name: &str) -> KwResult<KeyHandle> {
        require_name(name)?;
        self.gate.ensure_provisioned()?;

        if category == KeyCategory::Encryption {
            let _files = self.file_lock.lock();
            if !self.keys.exists(KeyCategory::Encryption, name) {
                let bytes = Zeroizing::new(self.files.read(name).map_err(|e| {
                    tracing::error!(key = name, error = %e, "could not load encryption key from file");
                    KwError::KeyNotFound(name.to_owned())
                })?);
                self.keys.put(KeyCategory::Encryption, name, &bytes)?;
            }
        }

        self.keys
            .with_key(category, name, |bytes| match category {
                KeyCategory::Auth => KeyHandle::Sas(SasKey::from_bytes(bytes)),
                KeyCategory::Encryption => {
                    KeyHandle::Encryption(EncryptionKey::from_bytes(bytes))
                }
            })
            .ok_or_else(|| {
                tracing::error!(key = name, ?category, "key not found in store");
                KwError::KeyNotFound(name.to_owned())
            })
    }

    /// Release an open key handle. The cached store entry is unaffected.
    pub fn close_key(&self, handle: KeyHandle) -> KwResult<()> {
        self.gate.ensure_provisioned()?;
        drop(handle);
        Ok(())
    }

    /// Remove a key from the store.
    ///
    /// Encryption keys: the cache entry is removed if present (absence is
    /// fine), and the backing file is deleted; a name with neither cache
    /// entry nor file fails. Authentication keys have no backing file, so
    /// absence from the cache is an error.
    pub fn remove_key(&self, category: KeyCategory, name: &str) -> KwResult<()> {
        require_name(name)?;
        self.gate.ensure_provisioned()?;

        match category {
            KeyCategory::Encryption => {
                let _files = self.file_lock.lock();
                let cached = self.keys.remove(KeyCategory::Encryption, name).is_ok();
                if !cached {
                    tracing::debug!(key = name, "encryption key not cached in store");
                    if !self.files.exists(name) {
                        return Err(KwError::KeyNotFound(name.to_owned()));
                    }
                }
                self.files.delete(name).map_err(|e| {
                    tracing::error!(key = name, error = %e, "could not delete encryption key file");
                    KwError::StoreOperationFailed(format!("delete key {name}: {e}"))
                })
            }
            KeyCategory::Auth => self
                .keys
                .remove(KeyCategory::Auth, name)
                .map_err(|_| KwError::KeyNotFound(name.to_owned())),
        }
    }

    pub fn create_pki_cert(&mut self, props: &CertificateProps) -> KwResult<()> {
        self.handle.create_pki_cert(props)
    }

    pub fn get_pki_cert(&self, alias: &str) -> KwResult<CertificateInfo> {
        self.handle.get_pki_cert(alias)
    }

    pub fn get_pki_trusted_certs(&self) -> KwResult<CertificateInfo> {
        self.handle.get_pki_trusted_certs()
    }

    pub fn remove_pki_cert(&mut self, alias: &str) -> KwResult<()> {
        self.handle.remove_pki_cert(alias)
    }

    /// Close the backing-store handle.
    pub fn close(self) -> KwResult<()> {
        self.handle.close()
    }
}

fn require_name(name: &str) -> KwResult<()> {
    if name.is_empty() {
        tracing::error!("invalid key name provided");
        return Err(KwError::InvalidArgument("key name"));
    }
    Ok(())
}
