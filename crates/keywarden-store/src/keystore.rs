//! In-memory key store: two categories, each keyed by unique name.

use std::collections::HashMap;

use parking_lot::RwLock;
use zeroize::Zeroize;

use keywarden_core::{KwError, KwResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCategory {
    /// Caller-supplied SAS authentication keys; memory-only.
    Auth,
    /// System-generated data-encryption keys; file-persisted, cached here.
    Encryption,
}

struct KeyEntry {
    bytes: Vec<u8>,
}

impl Drop for KeyEntry {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// The in-memory key collections, one map per category.
///
/// Shared by every open store handle; mutations take the category's write
/// lock so concurrent handles cannot lose updates.
pub struct KeyStore {
    auth: RwLock<HashMap<String, KeyEntry>>,
    enc: RwLock<HashMap<String, KeyEntry>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self {
            auth: RwLock::new(HashMap::new()),
            enc: RwLock::new(HashMap::new()),
        }
    }

    fn shelf(&self, category: KeyCategory) -> &RwLock<HashMap<String, KeyEntry>> {
        match category {
            KeyCategory::Auth => &self.auth,
            KeyCategory::Encryption => &self.enc,
        }
    }

    /// Upsert: an existing entry under `name` is destroyed first.
    pub fn put(&self, category: KeyCategory, name: &str, bytes: &[u8]) -> KwResult<()> {
        let mut stored = Vec::new();
        stored
            .try_reserve_exact(bytes.len())
            .map_err(|_| KwError::AllocationFailed)?;
        stored.extend_from_slice(bytes);

        // insert drops any prior entry, which zeroizes it
        self.shelf(category)
            .write()
            .insert(name.to_owned(), KeyEntry { bytes: stored });
        Ok(())
    }

    /// Run `f` over the entry's bytes without copying them out.
    pub fn with_key<R>(
        &self,
        category: KeyCategory,
        name: &str,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Option<R> {
        let shelf = self.shelf(category).read();
        shelf.get(name).map(|entry| f(&entry.bytes))
    }

    pub fn exists(&self, category: KeyCategory, name: &str) -> bool {
        self.shelf(category).read().contains_key(name)
    }

    /// Destroy and unlink the entry.
    pub fn remove(&self, category: KeyCategory, name: &str) -> KwResult<()> {
        match self.shelf(category).write().remove(name) {
            Some(_) => Ok(()),
            None => Err(KwError::NotFound(name.to_owned())),
        }
    }

    /// Drain a category, destroying every entry. Store teardown only.
    pub fn destroy_all(&self, category: KeyCategory) {
        self.shelf(category).write().clear();
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_roundtrip() {
        let store = KeyStore::new();
        store.put(KeyCategory::Auth, "device", b"abc123").unwrap();

        let len = store.with_key(KeyCategory::Auth, "device", |b| {
            assert_eq!(b, b"abc123");
            b.len()
        });
        assert_eq!(len, Some(6));
    }

    #[test]
    fn test_categories_are_disjoint() {
        let store = KeyStore::new();
        store.put(KeyCategory::Auth, "same-name", b"auth").unwrap();
        store
            .put(KeyCategory::Encryption, "same-name", b"enc")
            .unwrap();

        store
            .with_key(KeyCategory::Auth, "same-name", |b| assert_eq!(b, b"auth"))
            .unwrap();
        store
            .with_key(KeyCategory::Encryption, "same-name", |b| {
                assert_eq!(b, b"enc")
            })
            .unwrap();
    }

    #[test]
    fn test_put_replaces_existing_entry() {
        let store = KeyStore::new();
        store.put(KeyCategory::Auth, "k", b"old").unwrap();
        store.put(KeyCategory::Auth, "k", b"new").unwrap();

        store
            .with_key(KeyCategory::Auth, "k", |b| assert_eq!(b, b"new"))
            .unwrap();
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let store = KeyStore::new();
        assert!(matches!(
            store.remove(KeyCategory::Encryption, "ghost"),
            Err(KwError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_then_lookup_misses() {
        let store = KeyStore::new();
        store.put(KeyCategory::Auth, "k", b"bytes").unwrap();
        store.remove(KeyCategory::Auth, "k").unwrap();

        assert!(!store.exists(KeyCategory::Auth, "k"));
        assert!(store.with_key(KeyCategory::Auth, "k", |_| ()).is_none());
    }

    #[test]
    fn test_destroy_all_drains_one_category() {
        let store = KeyStore::new();
        store.put(KeyCategory::Auth, "a", b"1").unwrap();
        store.put(KeyCategory::Encryption, "e", b"2").unwrap();

        store.destroy_all(KeyCategory::Auth);
        assert!(!store.exists(KeyCategory::Auth, "a"));
        assert!(store.exists(KeyCategory::Encryption, "e"));
    }
}
