use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Key/certificate layer configuration (loaded from keywarden.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoHomeConfig {
    pub home: HomeConfig,
    pub enclave: EnclaveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeConfig {
    /// Directory holding persisted data-encryption key files
    pub keys_dir: PathBuf,
    /// Name of the backing secret/certificate store
    pub store_name: String,
}

impl Default for HomeConfig {
    fn default() -> Self {
        Self {
            keys_dir: PathBuf::from("/var/lib/keywarden/keys"),
            store_name: "keywarden".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnclaveConfig {
    /// Name of the trusted program image sessions bind to
    pub program: String,
    /// Expected measurement (hex) of the trusted program image
    pub measurement: Option<String>,
}

impl Default for EnclaveConfig {
    fn default() -> Self {
        Self {
            program: "keywarden-ta".into(),
            measurement: None,
        }
    }
}
