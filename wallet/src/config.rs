use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec::KdfParams;
use crate::errors::WalletError;
use crate::transaction::TRANSFER_GAS_LIMIT;

pub const RPC_URL_ENV: &str = "SEEDVAULT_RPC_URL";
pub const CHAIN_ID_ENV: &str = "SEEDVAULT_CHAIN_ID";

/// Wallet configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Key-value store holding the encrypted seed and account count
    pub store_path: PathBuf,
    pub rpc_url: String,
    pub chain_id: u64,
    pub gas_limit: u64,
    pub rpc_timeout_secs: u64,
    /// Fetch every account balance as part of unlock. When false, accounts
    /// are only loaded on an explicit request.
    pub refresh_balances_on_unlock: bool,
    /// Cost parameters for newly written seed blobs
    pub kdf: KdfParams,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            store_path: Self::base_dir().join("wallet.json"),
            rpc_url: "http://localhost:8545".to_string(),
            chain_id: 1,
            gas_limit: TRANSFER_GAS_LIMIT,
            rpc_timeout_secs: 30,
            refresh_balances_on_unlock: true,
            kdf: KdfParams::default(),
        }
    }
}

impl WalletConfig {
    /// Load from `config_path` (or the default location), then apply
    /// environment overrides. A missing file yields the defaults.
    pub fn load(config_path: Option<&Path>) -> Result<Self, WalletError> {
        let config_path = config_path
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_config_path);

        let mut config = if config_path.exists() {
            let contents = fs::read_to_string(&config_path)?;
            serde_json::from_str(&contents).map_err(|e| {
                WalletError::Config(format!("failed to parse {}: {}", config_path.display(), e))
            })?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.kdf.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), WalletError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(RPC_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.rpc_url = url;
        }
        if let Some(raw) = lookup(CHAIN_ID_ENV) {
            self.chain_id = raw
                .trim()
                .parse()
                .map_err(|_| WalletError::Config(format!("{} is not a number: {:?}", CHAIN_ID_ENV, raw)))?;
        }
        Ok(())
    }

    pub fn save(&self, config_path: Option<&Path>) -> Result<(), WalletError> {
        let config_path = config_path
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_config_path);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, contents)?;
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn default_config_path() -> PathBuf {
        Self::base_dir().join("config.json")
    }

    fn base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".seedvault")
    }
}
