use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Wrong password and corrupted blob both map here.
    #[error("Invalid password or corrupted wallet data")]
    Decryption,

    #[error("Key derivation failed: {0}")]
    DerivationInvariant(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transaction signing failed: {0}")]
    Signing(String),

    #[error("Wallet locked")]
    WalletLocked,

    #[error("Wallet not initialized")]
    NotInitialized,

    #[error("Wallet already initialized")]
    AlreadyInitialized,
}

impl WalletError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        WalletError::Validation(msg.into())
    }
}
