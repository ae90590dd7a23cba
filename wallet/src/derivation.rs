//! Deterministic account derivation.
//!
//! Accounts follow the standard Ethereum BIP-44 path `m/44'/60'/0'/0/{index}`.
//! Nothing derived here is cached: the registry re-derives on every load, so
//! any change to this module changes which wallet a seed phrase opens.

use std::fmt;
use std::str::FromStr;

use bip32::{DerivationPath, XPrv};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};
use tracing::{debug, error};
use zeroize::Zeroizing;

use crate::errors::WalletError;
use crate::mnemonic::SeedPhrase;

/// Highest index usable as a non-hardened BIP-32 child
pub const MAX_ACCOUNT_INDEX: u32 = (1 << 31) - 1;

/// BIP-44 path of the account at `index`
pub fn derivation_path(index: u32) -> String {
    format!("m/44'/60'/0'/0/{}", index)
}

/// 20-byte Ethereum address
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        // Keccak-256 of the uncompressed key without its 0x04 prefix
        let uncompressed = public_key.serialize_uncompressed();
        let hash = Keccak256::digest(&uncompressed[1..]);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&hash[12..]);
        Address(addr)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// EIP-55 mixed-case checksum encoding, `0x` prefixed
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = Keccak256::digest(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for Address {
    type Err = WalletError;

    /// Accepts 40 hex digits with an optional `0x`. Mixed-case input must
    /// carry a valid EIP-55 checksum.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(WalletError::validation(format!("invalid address: {:?}", s)));
        }

        let bytes = hex::decode(digits)
            .map_err(|_| WalletError::validation(format!("invalid address: {:?}", s)))?;
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&bytes);
        let address = Address(addr);

        let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum()[2..] != *digits {
            return Err(WalletError::validation(format!("bad address checksum: {}", s)));
        }

        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

/// secp256k1 private key, wiped on drop
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    bytes: Zeroizing<[u8; 32]>,
}

impl PrivateKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        SecretKey::from_slice(bytes)
            .map_err(|_| WalletError::validation("invalid private key"))?;
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(bytes);
        Ok(Self { bytes: key })
    }

    /// Parse a hex key, with or without `0x`
    pub fn from_hex(s: &str) -> Result<Self, WalletError> {
        let s = s.trim();
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = Zeroizing::new(
            hex::decode(digits).map_err(|_| WalletError::validation("invalid private key"))?,
        );
        if bytes.len() != 32 {
            return Err(WalletError::validation("invalid private key length"));
        }
        Self::from_bytes(&bytes)
    }

    pub(crate) fn secret_key(&self) -> Result<SecretKey, WalletError> {
        SecretKey::from_slice(&self.bytes[..])
            .map_err(|e| WalletError::DerivationInvariant(e.to_string()))
    }

    pub fn address(&self) -> Result<Address, WalletError> {
        let secp = Secp256k1::signing_only();
        let public_key = PublicKey::from_secret_key(&secp, &self.secret_key()?);
        Ok(Address::from_public_key(&public_key))
    }

    /// `0x` prefixed hex, for export screens
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("0x{}", hex::encode(&self.bytes[..])))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Output of [`derive`]
#[derive(Debug, Clone)]
pub struct DerivedKey {
    pub index: u32,
    pub address: Address,
    pub private_key: PrivateKey,
}

/// Derive the account at `index` from a seed phrase.
pub fn derive(seed: &SeedPhrase, index: u32) -> Result<DerivedKey, WalletError> {
    if index > MAX_ACCOUNT_INDEX {
        return Err(WalletError::validation(format!(
            "account index {} out of range",
            index
        )));
    }

    let seed_bytes = seed.to_seed()?;
    let path: DerivationPath = derivation_path(index)
        .parse()
        .map_err(|e: bip32::Error| invariant(index, e))?;
    let xprv = XPrv::derive_from_path(&seed_bytes[..], &path).map_err(|e| invariant(index, e))?;
    let secret = Zeroizing::new(xprv.to_bytes());

    let private_key = PrivateKey::from_bytes(&secret[..]).map_err(|e| invariant(index, e))?;
    let address = private_key.address()?;

    debug!(index, %address, "Derived account");

    Ok(DerivedKey {
        index,
        address,
        private_key,
    })
}

fn invariant(index: u32, err: impl fmt::Display) -> WalletError {
    error!(index, "BIP-32 derivation failed on a validated index: {}", err);
    WalletError::DerivationInvariant(format!("index {}: {}", index, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HARDHAT_PHRASE: &str = "test test test test test test test test test test test junk";
    const ABANDON_PHRASE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn hardhat() -> SeedPhrase {
        SeedPhrase::parse(HARDHAT_PHRASE).unwrap()
    }

    #[test]
    fn test_known_vector_index_0() {
        let key = derive(&hardhat(), 0).unwrap();
        assert_eq!(key.index, 0);
        assert_eq!(
            key.address.to_string(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
        assert_eq!(
            key.private_key.to_hex().as_str(),
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
        );
    }

    #[test]
    fn test_known_vector_index_1() {
        let key = derive(&hardhat(), 1).unwrap();
        assert_eq!(
            key.address.to_string(),
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
        );
        assert_eq!(
            key.private_key.to_hex().as_str(),
            "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"
        );
    }

    #[test]
    fn test_known_vector_abandon_about() {
        let seed = SeedPhrase::parse(ABANDON_PHRASE).unwrap();
        let key = derive(&seed, 0).unwrap();
        assert_eq!(
            key.address.to_string(),
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
        );
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let seed = crate::mnemonic::generate().unwrap();
        let a = derive(&seed, 7).unwrap();
        let b = derive(&seed, 7).unwrap();
        assert_eq!(a.address, b.address);
        assert_eq!(a.private_key, b.private_key);
    }

    #[test]
    fn test_indices_are_distinct() {
        let seed = hardhat();
        let addresses: Vec<Address> = (0..5).map(|i| derive(&seed, i).unwrap().address).collect();
        for i in 0..addresses.len() {
            for j in (i + 1)..addresses.len() {
                assert_ne!(addresses[i], addresses[j]);
            }
        }
    }

    #[test]
    fn test_hardened_range_rejected() {
        assert!(matches!(
            derive(&hardhat(), MAX_ACCOUNT_INDEX + 1),
            Err(WalletError::Validation(_))
        ));
        assert!(derive(&hardhat(), MAX_ACCOUNT_INDEX).is_ok());
    }

    #[test]
    fn test_private_key_address_matches_derivation() {
        let key = derive(&hardhat(), 0).unwrap();
        let imported = PrivateKey::from_hex(&key.private_key.to_hex()).unwrap();
        assert_eq!(imported.address().unwrap(), key.address);

        let bare = PrivateKey::from_hex(key.private_key.to_hex().trim_start_matches("0x")).unwrap();
        assert_eq!(bare, key.private_key);

        let doubled = format!("0x{}", key.private_key.to_hex().as_str());
        assert!(matches!(
            PrivateKey::from_hex(&doubled),
            Err(WalletError::Validation(_))
        ));
    }

    #[test]
    fn test_address_parsing() {
        let checksummed = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
        let addr: Address = checksummed.parse().unwrap();
        assert_eq!(addr.to_string(), checksummed);

        let lower: Address = checksummed.to_lowercase().parse().unwrap();
        assert_eq!(lower, addr);
        let bare: Address = "f39fd6e51aad88f6f4ce6ab8827279cfffb92266".parse().unwrap();
        assert_eq!(bare, addr);

        // One flipped letter case breaks the checksum
        assert!("0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().is_err());
        assert!("".parse::<Address>().is_err());
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzz9Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().is_err());
    }

    #[test]
    fn test_private_key_debug_redacted() {
        let key = derive(&hardhat(), 0).unwrap();
        assert!(!format!("{:?}", key).contains("ac0974"));
    }
}
