use primitive_types::U256;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::derivation::{self, Address, PrivateKey};
use crate::errors::WalletError;
use crate::lifecycle::WalletLifecycle;
use crate::rpc_client::ChainProvider;
use crate::store::{KeyValueStore, ACCOUNT_COUNT_KEY};
use crate::units::format_ether;

/// Balance snapshot, stale as soon as it is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Balance {
    /// Wei at the time of the lookup
    Known(U256),
    /// The lookup failed; rendered as `Error`
    Unavailable,
}

impl Balance {
    pub fn wei(&self) -> Option<U256> {
        match self {
            Balance::Known(wei) => Some(*wei),
            Balance::Unavailable => None,
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Balance::Known(wei) => f.write_str(&format_ether(*wei)),
            Balance::Unavailable => f.write_str("Error"),
        }
    }
}

/// Account information
#[derive(Debug, Clone)]
pub struct Account {
    pub index: u32,
    pub address: Address,
    pub private_key: PrivateKey,
    pub balance: Balance,
}

/// Owns the persisted account count and rebuilds accounts from the seed
pub struct AccountRegistry {
    store: Arc<dyn KeyValueStore>,
    provider: Arc<dyn ChainProvider>,
}

impl AccountRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>, provider: Arc<dyn ChainProvider>) -> Self {
        Self { store, provider }
    }

    /// Persisted account count. Missing means a fresh wallet (1); an
    /// unreadable or zero value also falls back to 1 since account 0 always
    /// exists once the wallet is initialized.
    pub fn account_count(&self) -> Result<u32, WalletError> {
        let Some(raw) = self.store.get(ACCOUNT_COUNT_KEY)? else {
            return Ok(1);
        };
        match raw.trim().parse::<u32>() {
            Ok(count) if count >= 1 => Ok(count),
            _ => {
                warn!(value = %raw, "Ignoring invalid stored account count");
                Ok(1)
            }
        }
    }

    /// Derive every account `0..count` in index order and fetch balances.
    pub async fn load(&self, lifecycle: &WalletLifecycle) -> Result<Vec<Account>, WalletError> {
        let seed = lifecycle.seed()?;
        let count = self.account_count()?;

        let mut accounts = Vec::with_capacity(count as usize);
        for index in 0..count {
            let key = derivation::derive(seed, index)?;
            let balance = self.fetch_balance(&key.address).await;
            accounts.push(Account {
                index,
                address: key.address,
                private_key: key.private_key,
                balance,
            });
        }

        debug!(count, "Loaded accounts");
        Ok(accounts)
    }

    /// Derive the next account and persist the new count before returning.
    pub async fn add_account(&self, lifecycle: &WalletLifecycle) -> Result<Account, WalletError> {
        let seed = lifecycle.seed()?;
        let index = self.account_count()?;
        let key = derivation::derive(seed, index)?;

        let next = index
            .checked_add(1)
            .ok_or_else(|| WalletError::validation("account limit reached"))?;
        self.store.set(ACCOUNT_COUNT_KEY, &next.to_string())?;
        info!(index, address = %key.address, "Added account");

        let balance = self.fetch_balance(&key.address).await;
        Ok(Account {
            index,
            address: key.address,
            private_key: key.private_key,
            balance,
        })
    }

    /// Refresh balances in place; failures only mark the affected account.
    pub async fn refresh_balances(&self, accounts: &mut [Account]) {
        for account in accounts.iter_mut() {
            account.balance = self.fetch_balance(&account.address).await;
        }
    }

    pub async fn fetch_balance(&self, address: &Address) -> Balance {
        match self.provider.get_balance(address).await {
            Ok(wei) => Balance::Known(wei),
            Err(e) => {
                warn!(%address, "Balance lookup failed: {}", e);
                Balance::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_display() {
        assert_eq!(Balance::Known(U256::exp10(18)).to_string(), "1.0");
        assert_eq!(Balance::Unavailable.to_string(), "Error");
        assert_eq!(Balance::Unavailable.wei(), None);
    }
}
