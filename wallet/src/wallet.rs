use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use zeroize::Zeroizing;

use crate::account::{Account, AccountRegistry};
use crate::codec::SecretCodec;
use crate::config::WalletConfig;
use crate::derivation::DerivedKey;
use crate::errors::WalletError;
use crate::lifecycle::{WalletLifecycle, WalletState};
use crate::rpc_client::{ChainProvider, RpcClient};
use crate::store::{FileStore, KeyValueStore};
use crate::transfer::{TransactionService, TxResult};

struct Inner {
    lifecycle: WalletLifecycle,
    /// Accounts derived since the last unlock; cleared on lock and reset
    accounts: Vec<Account>,
}

/// Main wallet structure.
///
/// Every operation holds one async mutex for its full duration, including
/// provider round trips, so lifecycle changes never interleave.
pub struct Wallet {
    config: WalletConfig,
    inner: Mutex<Inner>,
    registry: AccountRegistry,
    transactions: TransactionService,
}

impl Wallet {
    /// Open the wallet described by `config` with a file store and JSON-RPC provider
    pub fn open(config: WalletConfig) -> Result<Self, WalletError> {
        let store = Arc::new(FileStore::open(&config.store_path)?);
        let provider = Arc::new(RpcClient::new(&config.rpc_url, config.rpc_timeout())?);
        Self::with_backends(config, store, provider)
    }

    /// Open with explicit storage and chain backends
    pub fn with_backends(
        config: WalletConfig,
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn ChainProvider>,
    ) -> Result<Self, WalletError> {
        config.kdf.validate()?;
        let lifecycle = WalletLifecycle::open(store.clone(), SecretCodec::new(config.kdf))?;
        let registry = AccountRegistry::new(store, provider.clone());
        let transactions = TransactionService::new(provider, config.chain_id, config.gas_limit);

        Ok(Self {
            config,
            inner: Mutex::new(Inner {
                lifecycle,
                accounts: Vec::new(),
            }),
            registry,
            transactions,
        })
    }

    pub async fn state(&self) -> WalletState {
        self.inner.lock().await.lifecycle.state()
    }

    /// Create a new wallet and load its first account
    pub async fn create(&self, password: &str) -> Result<Vec<Account>, WalletError> {
        let mut inner = self.inner.lock().await;
        inner.lifecycle.create(password)?;
        inner.accounts = self.registry.load(&inner.lifecycle).await?;
        Ok(inner.accounts.clone())
    }

    /// Unlock and, unless configured otherwise, load all accounts
    pub async fn unlock(&self, password: &str) -> Result<Vec<Account>, WalletError> {
        let mut inner = self.inner.lock().await;
        inner.lifecycle.unlock(password)?;
        if self.config.refresh_balances_on_unlock {
            inner.accounts = self.registry.load(&inner.lifecycle).await?;
        }
        Ok(inner.accounts.clone())
    }

    pub async fn lock(&self) {
        let mut inner = self.inner.lock().await;
        inner.accounts.clear();
        inner.lifecycle.lock();
    }

    /// Delete the wallet from storage. Irreversible; callers must confirm first.
    pub async fn reset(&self) -> Result<(), WalletError> {
        let mut inner = self.inner.lock().await;
        inner.accounts.clear();
        inner.lifecycle.reset()
    }

    /// Accounts as last loaded
    pub async fn accounts(&self) -> Vec<Account> {
        self.inner.lock().await.accounts.clone()
    }

    /// Re-derive all accounts and fetch fresh balances
    pub async fn load_accounts(&self) -> Result<Vec<Account>, WalletError> {
        let mut inner = self.inner.lock().await;
        inner.accounts = self.registry.load(&inner.lifecycle).await?;
        Ok(inner.accounts.clone())
    }

    pub async fn add_account(&self) -> Result<Account, WalletError> {
        let mut inner = self.inner.lock().await;
        let account = self.registry.add_account(&inner.lifecycle).await?;
        if inner.accounts.len() == account.index as usize {
            inner.accounts.push(account.clone());
        } else {
            inner.accounts = self.registry.load(&inner.lifecycle).await?;
        }
        Ok(account)
    }

    /// Refresh balances of the loaded accounts, e.g. after a send
    pub async fn refresh_balances(&self) -> Result<(), WalletError> {
        let mut inner = self.inner.lock().await;
        if !inner.lifecycle.is_unlocked() {
            return Err(WalletError::WalletLocked);
        }
        self.registry.refresh_balances(&mut inner.accounts).await;
        Ok(())
    }

    /// Derive the key of an account that already exists
    fn existing_key(&self, lifecycle: &WalletLifecycle, index: u32) -> Result<DerivedKey, WalletError> {
        lifecycle.seed()?;
        if index >= self.registry.account_count()? {
            return Err(WalletError::validation(format!("no account with index {}", index)));
        }
        lifecycle.derive_account(index)
    }

    /// Send ether from an existing account
    pub async fn send(&self, from_index: u32, to_address: &str, amount: &str) -> TxResult {
        let inner = self.inner.lock().await;

        let key = match self.existing_key(&inner.lifecycle, from_index) {
            Ok(key) => key,
            Err(e) => return TxResult::failed(e),
        };
        info!(from = %key.address, "Sending transaction");
        self.transactions.send(key.private_key, to_address, amount).await
    }

    /// Hex private key of one account, for export to another wallet
    pub async fn export_private_key(&self, index: u32) -> Result<Zeroizing<String>, WalletError> {
        let inner = self.inner.lock().await;
        let key = self.existing_key(&inner.lifecycle, index)?;
        info!(index, "Private key exported");
        Ok(key.private_key.to_hex())
    }

    /// Seed phrase for the backup screen
    pub async fn reveal_seed_phrase(&self) -> Result<Zeroizing<String>, WalletError> {
        let inner = self.inner.lock().await;
        let seed = inner.lifecycle.reveal_seed_phrase()?;
        Ok(Zeroizing::new(seed.as_str().to_string()))
    }

    pub async fn seed_backup_confirmed(&self) -> Result<bool, WalletError> {
        self.inner.lock().await.lifecycle.seed_backup_confirmed()
    }

    pub async fn confirm_seed_backup(&self) -> Result<(), WalletError> {
        self.inner.lock().await.lifecycle.confirm_seed_backup()
    }

    /// Get config
    pub fn config(&self) -> &WalletConfig {
        &self.config
    }
}
