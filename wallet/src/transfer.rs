use primitive_types::H256;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::derivation::{Address, PrivateKey};
use crate::errors::WalletError;
use crate::rpc_client::ChainProvider;
use crate::transaction::TransactionBuilder;
use crate::units::parse_ether;

/// Outcome of a single send attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TxResult {
    pub fn submitted(hash: H256) -> Self {
        Self {
            success: true,
            hash: Some(format!("0x{}", hex::encode(hash))),
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            hash: None,
            error: Some(error.to_string()),
        }
    }
}

/// Builds, signs and submits plain ether transfers.
///
/// Holds no key material and no balances: the key is moved into [`send`]
/// and dropped when the call returns.
///
/// [`send`]: TransactionService::send
pub struct TransactionService {
    provider: Arc<dyn ChainProvider>,
    chain_id: u64,
    gas_limit: u64,
}

impl TransactionService {
    pub fn new(provider: Arc<dyn ChainProvider>, chain_id: u64, gas_limit: u64) -> Self {
        Self {
            provider,
            chain_id,
            gas_limit,
        }
    }

    /// Send `amount` ether to `to_address`. One attempt, never retried.
    pub async fn send(&self, private_key: PrivateKey, to_address: &str, amount: &str) -> TxResult {
        match self.try_send(&private_key, to_address, amount).await {
            Ok(hash) => {
                info!(hash = ?hash, "Transaction submitted");
                TxResult::submitted(hash)
            }
            Err(e) => {
                warn!("Transaction failed: {}", e);
                TxResult::failed(e)
            }
        }
    }

    async fn try_send(&self, private_key: &PrivateKey, to_address: &str, amount: &str) -> Result<H256, WalletError> {
        // Everything local is checked before the provider is contacted
        if to_address.trim().is_empty() {
            return Err(WalletError::validation("recipient address is required"));
        }
        let to: Address = to_address.parse()?;
        let value = parse_ether(amount)?;
        let from = private_key.address()?;

        let nonce = self.provider.get_transaction_count(&from).await?;
        let gas_price = self.provider.gas_price().await?;

        let tx = TransactionBuilder::new()
            .to(to)
            .value(value)
            .nonce(nonce)
            .gas_price(gas_price)
            .gas_limit(self.gas_limit)
            .chain_id(self.chain_id)
            .build_and_sign(private_key)?;

        debug!(%from, %to, nonce, "Submitting transaction");
        self.provider.submit_transaction(&tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_result_shapes() {
        let ok = TxResult::submitted(H256::repeat_byte(0xab));
        assert!(ok.success);
        assert_eq!(ok.hash.as_deref().map(str::len), Some(66));
        assert!(ok.error.is_none());

        let failed = TxResult::failed(WalletError::Rpc("nonce too low".into()));
        assert!(!failed.success);
        assert!(failed.hash.is_none());
        assert_eq!(failed.error.as_deref(), Some("RPC error: nonce too low"));

        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("hash").is_none());
    }
}
