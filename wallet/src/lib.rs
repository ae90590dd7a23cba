pub mod account;
pub mod codec;
pub mod config;
pub mod derivation;
pub mod errors;
pub mod lifecycle;
pub mod mnemonic;
pub mod rpc_client;
pub mod store;
pub mod transaction;
pub mod transfer;
pub mod units;
pub mod wallet;

pub use account::{Account, AccountRegistry, Balance};
pub use codec::{EncryptedSeedBlob, KdfParams, SecretCodec};
pub use config::WalletConfig;
pub use derivation::{derive, Address, DerivedKey, PrivateKey};
pub use errors::WalletError;
pub use lifecycle::{WalletLifecycle, WalletState};
pub use mnemonic::SeedPhrase;
pub use rpc_client::{ChainProvider, RpcClient};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use transaction::{SignedTransaction, TransactionBuilder};
pub use transfer::{TransactionService, TxResult};
pub use wallet::Wallet;
