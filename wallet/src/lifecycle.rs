//! Wallet lifecycle state machine.
//!
//! ```text
//! Uninitialized --create--> Unlocked --lock--> Locked --unlock--> Unlocked
//!       ^                                                            |
//!       +------------------------- reset (any state) ----------------+
//! ```
//!
//! The plaintext seed lives only inside the [`Session`] held while Unlocked.
//! Nothing else in the crate keeps a copy; callers borrow it through
//! [`WalletLifecycle::seed`] for the duration of a single operation.

use std::sync::Arc;
use tracing::{info, warn};

use crate::codec::{EncryptedSeedBlob, SecretCodec};
use crate::derivation::{self, DerivedKey};
use crate::errors::WalletError;
use crate::mnemonic::{self, SeedPhrase};
use crate::store::{
    KeyValueStore, ACCOUNT_COUNT_KEY, ENCRYPTED_SEED_KEY, LEGACY_PLAINTEXT_KEY, SEED_SHOWN_KEY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletState {
    /// No encrypted seed in the store
    Uninitialized,
    /// Encrypted seed stored, plaintext not in memory
    Locked,
    /// Plaintext seed held in memory
    Unlocked,
}

/// Unlocked key material. Dropping it wipes the seed.
struct Session {
    seed: SeedPhrase,
}

pub struct WalletLifecycle {
    store: Arc<dyn KeyValueStore>,
    codec: SecretCodec,
    initialized: bool,
    session: Option<Session>,
}

impl WalletLifecycle {
    /// Open against a store. The starting state is Locked when an encrypted
    /// seed is present and Uninitialized otherwise, never Unlocked.
    pub fn open(store: Arc<dyn KeyValueStore>, codec: SecretCodec) -> Result<Self, WalletError> {
        let initialized = store.get(ENCRYPTED_SEED_KEY)?.is_some();
        let lifecycle = Self {
            store,
            codec,
            initialized,
            session: None,
        };
        info!(state = ?lifecycle.state(), "Wallet opened");
        Ok(lifecycle)
    }

    pub fn state(&self) -> WalletState {
        if self.session.is_some() {
            WalletState::Unlocked
        } else if self.initialized {
            WalletState::Locked
        } else {
            WalletState::Uninitialized
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.session.is_some()
    }

    /// Generate, encrypt and persist a new seed phrase, leaving the wallet
    /// unlocked with a single account.
    pub fn create(&mut self, password: &str) -> Result<(), WalletError> {
        if password.is_empty() {
            return Err(WalletError::validation("password is required"));
        }
        if self.initialized {
            return Err(WalletError::AlreadyInitialized);
        }

        let seed = mnemonic::generate()?;
        let blob = self.codec.encrypt(&seed, password)?;

        self.store.set(ENCRYPTED_SEED_KEY, &blob.to_json()?)?;
        self.initialized = true;
        self.store.set(ACCOUNT_COUNT_KEY, "1")?;

        self.session = Some(Session { seed });
        info!("Wallet created");
        Ok(())
    }

    /// Decrypt the stored seed. On any failure the current state is kept.
    pub fn unlock(&mut self, password: &str) -> Result<(), WalletError> {
        if password.is_empty() {
            return Err(WalletError::validation("password is required"));
        }
        if !self.initialized {
            return Err(WalletError::NotInitialized);
        }

        let Some(raw) = self.store.get(ENCRYPTED_SEED_KEY)? else {
            warn!("Encrypted seed disappeared from the store");
            self.initialized = false;
            self.session = None;
            return Err(WalletError::NotInitialized);
        };

        let blob = EncryptedSeedBlob::from_json(&raw)?;
        match self.codec.decrypt(&blob, password) {
            Ok(seed) => {
                self.session = Some(Session { seed });
                info!("Wallet unlocked");
                Ok(())
            }
            Err(e) => {
                warn!("Unlock attempt failed");
                Err(e)
            }
        }
    }

    /// Drop the in-memory seed.
    pub fn lock(&mut self) {
        if self.session.take().is_some() {
            info!("Wallet locked");
        }
    }

    /// Irreversibly delete the stored seed and all wallet metadata.
    ///
    /// Only ever invoked by an explicit caller request.
    pub fn reset(&mut self) -> Result<(), WalletError> {
        self.session = None;

        self.store.delete(ENCRYPTED_SEED_KEY)?;
        self.initialized = false;

        for key in [ACCOUNT_COUNT_KEY, SEED_SHOWN_KEY, LEGACY_PLAINTEXT_KEY] {
            self.store.delete(key)?;
        }

        info!("Wallet reset");
        Ok(())
    }

    /// Borrow the unlocked seed
    pub(crate) fn seed(&self) -> Result<&SeedPhrase, WalletError> {
        match &self.session {
            Some(session) => Ok(&session.seed),
            None if self.initialized => Err(WalletError::WalletLocked),
            None => Err(WalletError::NotInitialized),
        }
    }

    /// The seed phrase, for the backup screen. Requires Unlocked.
    pub fn reveal_seed_phrase(&self) -> Result<&SeedPhrase, WalletError> {
        let seed = self.seed()?;
        info!("Seed phrase revealed");
        Ok(seed)
    }

    /// Derive one account's key pair from the unlocked seed
    pub fn derive_account(&self, index: u32) -> Result<DerivedKey, WalletError> {
        derivation::derive(self.seed()?, index)
    }

    /// Whether the host recorded that the user saw the seed phrase
    pub fn seed_backup_confirmed(&self) -> Result<bool, WalletError> {
        Ok(self.store.get(SEED_SHOWN_KEY)?.as_deref() == Some("true"))
    }

    pub fn confirm_seed_backup(&self) -> Result<(), WalletError> {
        if !self.initialized {
            return Err(WalletError::NotInitialized);
        }
        self.store.set(SEED_SHOWN_KEY, "true")
    }
}
