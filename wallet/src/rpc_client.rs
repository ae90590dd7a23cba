use async_trait::async_trait;
use primitive_types::{H256, U256};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::derivation::Address;
use crate::errors::WalletError;
use crate::transaction::SignedTransaction;

/// Chain access needed by the engine.
///
/// Every method is a single attempt; implementations must not retry.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Balance in wei at the latest block
    async fn get_balance(&self, address: &Address) -> Result<U256, WalletError>;

    /// Pending transaction count, used as the next nonce
    async fn get_transaction_count(&self, address: &Address) -> Result<u64, WalletError>;

    /// Current gas price in wei
    async fn gas_price(&self) -> Result<U256, WalletError>;

    /// Broadcast a signed transaction, returning its hash
    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<H256, WalletError>;
}

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: String,
    method: String,
    params: Value,
    id: u64,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct RpcResponse {
    jsonrpc: String,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
    id: u64,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// JSON-RPC client for an Ethereum node
pub struct RpcClient {
    url: String,
    client: Client,
    request_id: AtomicU64,
}

impl RpcClient {
    /// Create new RPC client
    pub fn new(url: &str, timeout: Duration) -> Result<Self, WalletError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WalletError::Rpc(e.to_string()))?;

        Ok(Self {
            url: url.to_string(),
            client,
            request_id: AtomicU64::new(1),
        })
    }

    /// Make RPC call
    async fn call(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = RpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id,
        };

        debug!(method, id, "RPC call");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WalletError::Rpc(e.to_string()))?;

        let rpc_response: RpcResponse = response
            .json()
            .await
            .map_err(|e| WalletError::Rpc(e.to_string()))?;

        if let Some(error) = rpc_response.error {
            return Err(WalletError::Rpc(format!("{}: {}", error.code, error.message)));
        }

        Ok(rpc_response.result)
    }

    /// Get chain ID reported by the node
    pub async fn get_chain_id(&self) -> Result<u64, WalletError> {
        let result = self.call("eth_chainId", json!([])).await?;
        parse_quantity_u64(&result, "chain ID")
    }
}

#[async_trait]
impl ChainProvider for RpcClient {
    async fn get_balance(&self, address: &Address) -> Result<U256, WalletError> {
        let params = json!([format!("0x{}", hex::encode(address.0)), "latest"]);
        let result = self.call("eth_getBalance", params).await?;
        parse_quantity_u256(&result, "balance")
    }

    async fn get_transaction_count(&self, address: &Address) -> Result<u64, WalletError> {
        let params = json!([format!("0x{}", hex::encode(address.0)), "pending"]);
        let result = self.call("eth_getTransactionCount", params).await?;
        parse_quantity_u64(&result, "nonce")
    }

    async fn gas_price(&self) -> Result<U256, WalletError> {
        let result = self.call("eth_gasPrice", json!([])).await?;
        parse_quantity_u256(&result, "gas price")
    }

    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<H256, WalletError> {
        let result = self
            .call("eth_sendRawTransaction", json!([tx.raw_hex()]))
            .await?;

        parse_hash(&result)
    }
}

fn quantity_str<'a>(value: &'a Value, what: &str) -> Result<&'a str, WalletError> {
    value
        .as_str()
        .map(|s| s.trim_start_matches("0x"))
        .ok_or_else(|| WalletError::Rpc(format!("Invalid {} response", what)))
}

fn parse_hash(value: &Value) -> Result<H256, WalletError> {
    let digits = quantity_str(value, "transaction hash")?;
    match hex::decode(digits) {
        Ok(bytes) if bytes.len() == 32 => Ok(H256::from_slice(&bytes)),
        _ => Err(WalletError::Rpc(format!("Malformed transaction hash: {}", value))),
    }
}

fn parse_quantity_u256(value: &Value, what: &str) -> Result<U256, WalletError> {
    let digits = quantity_str(value, what)?;
    U256::from_str_radix(digits, 16)
        .map_err(|e| WalletError::Rpc(format!("Failed to parse {}: {}", what, e)))
}

fn parse_quantity_u64(value: &Value, what: &str) -> Result<u64, WalletError> {
    let digits = quantity_str(value, what)?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| WalletError::Rpc(format!("Failed to parse {}: {}", what, e)))
}
