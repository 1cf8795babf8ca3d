use thiserror::Error;

pub type KwResult<T> = Result<T, KwError>;

#[derive(Debug, Error)]
pub enum KwError {
    #[error("crypto module is not initialized")]
    NotInitialized,

    #[error("crypto module is already initialized")]
    AlreadyInitialized,

    #[error("device has not been provisioned")]
    NotProvisioned,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("buffer allocation failed")]
    AllocationFailed,

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store operation failed: {0}")]
    StoreOperationFailed(String),

    #[error("secure operation failed: {0}")]
    SecureOperationFailed(&'static str),

    #[error("ciphertext too short: {0} bytes")]
    InvalidCiphertext(usize),
}
