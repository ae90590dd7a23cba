use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::errors::WalletError;
use crate::mnemonic::SeedPhrase;

pub const BLOB_VERSION: u32 = 1;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Upper bound accepted from a blob, so a tampered blob cannot demand gigabytes.
const MAX_MEMORY_KIB: u32 = 1024 * 1024;
const MAX_ITERATIONS: u32 = 64;

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl KdfParams {
    fn argon2(&self) -> Result<Argon2<'static>, argon2::Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, Some(KEY_LEN))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn within_limits(&self) -> bool {
        self.memory_kib <= MAX_MEMORY_KIB && self.iterations <= MAX_ITERATIONS
    }

    /// Reject parameters that would produce a blob `decrypt` refuses to open
    pub fn validate(&self) -> Result<(), WalletError> {
        if !self.within_limits() {
            return Err(WalletError::Config(format!(
                "KDF parameters exceed limits (memory_kib <= {}, iterations <= {})",
                MAX_MEMORY_KIB, MAX_ITERATIONS
            )));
        }
        self.argon2()
            .map(|_| ())
            .map_err(|e| WalletError::Config(format!("invalid KDF parameters: {}", e)))
    }
}

/// Encrypted seed phrase as persisted in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSeedBlob {
    pub version: u32,
    pub kdf: KdfParams,
    /// Hex encoded Argon2 salt
    pub salt: String,
    /// Hex encoded AES-GCM nonce
    pub nonce: String,
    /// Hex encoded ciphertext with the GCM tag appended
    pub ciphertext: String,
}

impl EncryptedSeedBlob {
    pub fn to_json(&self) -> Result<String, WalletError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a stored blob. A malformed document is reported as a
    /// decryption failure, same as a wrong password.
    pub fn from_json(raw: &str) -> Result<Self, WalletError> {
        serde_json::from_str(raw).map_err(|_| WalletError::Decryption)
    }
}

/// Password based seed phrase encryption (Argon2id + AES-256-GCM)
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretCodec {
    params: KdfParams,
}

impl SecretCodec {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    /// Encrypt a seed phrase under a password with a fresh salt and nonce
    pub fn encrypt(&self, seed: &SeedPhrase, password: &str) -> Result<EncryptedSeedBlob, WalletError> {
        self.params.validate()?;

        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let aes_key = derive_key(&self.params, password, &salt)
            .map_err(|e| WalletError::Encryption(e.to_string()))?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&aes_key[..]));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, seed.as_str().as_bytes())
            .map_err(|e| WalletError::Encryption(e.to_string()))?;

        Ok(EncryptedSeedBlob {
            version: BLOB_VERSION,
            kdf: self.params,
            salt: hex::encode(salt),
            nonce: hex::encode(nonce_bytes),
            ciphertext: hex::encode(ciphertext),
        })
    }

    /// Decrypt a blob. Every failure collapses into [`WalletError::Decryption`].
    pub fn decrypt(&self, blob: &EncryptedSeedBlob, password: &str) -> Result<SeedPhrase, WalletError> {
        try_decrypt(blob, password).ok_or(WalletError::Decryption)
    }
}

fn try_decrypt(blob: &EncryptedSeedBlob, password: &str) -> Option<SeedPhrase> {
    if blob.version != BLOB_VERSION || !blob.kdf.within_limits() {
        return None;
    }

    let salt = hex::decode(&blob.salt).ok()?;
    let nonce_bytes = hex::decode(&blob.nonce).ok()?;
    let ciphertext = hex::decode(&blob.ciphertext).ok()?;
    if salt.len() != SALT_LEN || nonce_bytes.len() != NONCE_LEN {
        return None;
    }

    let aes_key = derive_key(&blob.kdf, password, &salt).ok()?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&aes_key[..]));
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .ok()?,
    );

    let phrase = std::str::from_utf8(&plaintext).ok()?;
    SeedPhrase::parse(phrase).ok()
}

fn derive_key(params: &KdfParams, password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>, argon2::Error> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    params
        .argon2()?
        .hash_password_into(password.as_bytes(), salt, &mut key[..])?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PHRASE: &str = "test test test test test test test test test test test junk";

    fn fast_codec() -> SecretCodec {
        SecretCodec::new(KdfParams {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        })
    }

    fn seed() -> SeedPhrase {
        SeedPhrase::parse(PHRASE).unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let codec = fast_codec();
        let blob = codec.encrypt(&seed(), "correct-password").unwrap();
        let decrypted = codec.decrypt(&blob, "correct-password").unwrap();
        assert_eq!(decrypted, seed());
    }

    #[test]
    fn test_fresh_randomness_per_call() {
        let codec = fast_codec();
        let a = codec.encrypt(&seed(), "pw").unwrap();
        let b = codec.encrypt(&seed(), "pw").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_password_fails() {
        let codec = fast_codec();
        let blob = codec.encrypt(&seed(), "correct-password").unwrap();
        assert!(matches!(
            codec.decrypt(&blob, "wrong-password"),
            Err(WalletError::Decryption)
        ));
    }

    #[test]
    fn test_corruption_is_indistinguishable_from_wrong_password() {
        let codec = fast_codec();
        let blob = codec.encrypt(&seed(), "pw").unwrap();

        let mut flipped = blob.clone();
        let mut bytes = hex::decode(&flipped.ciphertext).unwrap();
        bytes[0] ^= 0x01;
        flipped.ciphertext = hex::encode(bytes);

        let mut bad_nonce = blob.clone();
        bad_nonce.nonce = "abcd".to_string();

        let mut bad_hex = blob.clone();
        bad_hex.salt = "not hex".to_string();

        let mut greedy = blob.clone();
        greedy.kdf.memory_kib = u32::MAX;

        let wrong = codec.decrypt(&blob, "other").unwrap_err().to_string();
        for corrupted in [flipped, bad_nonce, bad_hex, greedy] {
            let err = codec.decrypt(&corrupted, "pw").unwrap_err();
            assert!(matches!(err, WalletError::Decryption));
            assert_eq!(err.to_string(), wrong);
        }
    }

    #[test]
    fn test_blob_json_roundtrip_and_garbage() {
        let codec = fast_codec();
        let blob = codec.encrypt(&seed(), "pw").unwrap();
        let json = blob.to_json().unwrap();
        assert_eq!(EncryptedSeedBlob::from_json(&json).unwrap(), blob);
        assert!(matches!(
            EncryptedSeedBlob::from_json("U2FsdGVkX1+legacy"),
            Err(WalletError::Decryption)
        ));
    }

    #[test]
    fn test_blob_carries_its_own_params() {
        let blob = fast_codec().encrypt(&seed(), "pw").unwrap();
        // A codec configured differently still honours the blob's parameters.
        let other = SecretCodec::new(KdfParams {
            memory_kib: 128,
            iterations: 2,
            parallelism: 1,
        });
        assert_eq!(other.decrypt(&blob, "pw").unwrap(), seed());
    }

    #[test]
    fn test_out_of_range_params_refuse_to_encrypt() {
        let over = [
            KdfParams {
                memory_kib: 64,
                iterations: MAX_ITERATIONS + 1,
                parallelism: 1,
            },
            KdfParams {
                memory_kib: MAX_MEMORY_KIB + 1,
                iterations: 1,
                parallelism: 1,
            },
            KdfParams {
                memory_kib: 64,
                iterations: 0,
                parallelism: 1,
            },
        ];
        for params in over {
            let result = SecretCodec::new(params).encrypt(&seed(), "pw");
            assert!(matches!(result, Err(WalletError::Config(_))), "{:?}", params);
        }

        // Every accepted parameter set must also decrypt
        let edge = SecretCodec::new(KdfParams {
            memory_kib: 64,
            iterations: MAX_ITERATIONS,
            parallelism: 1,
        });
        let blob = edge.encrypt(&seed(), "pw").unwrap();
        assert_eq!(edge.decrypt(&blob, "pw").unwrap(), seed());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_roundtrip_and_wrong_password(
            password in "[ -~]{1,24}",
            suffix in "[a-z0-9]{1,8}",
        ) {
            let codec = fast_codec();
            let phrase = crate::mnemonic::generate().unwrap();
            let blob = codec.encrypt(&phrase, &password).unwrap();
            prop_assert_eq!(codec.decrypt(&blob, &password).unwrap(), phrase);

            let wrong = format!("{}{}", password, suffix);
            prop_assert!(codec.decrypt(&blob, &wrong).is_err());
        }
    }
}
