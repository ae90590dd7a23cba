//! BIP-39 seed phrases.
//!
//! A [`SeedPhrase`] is only ever constructed from a phrase that passed the
//! BIP-39 checksum, either freshly generated here or decrypted by the codec.
//! The backing string is wiped when the value is dropped.

use std::fmt;

use bip39::{Language, Mnemonic};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::errors::WalletError;

/// Word count used by [`generate`].
pub const DEFAULT_WORD_COUNT: usize = 12;

/// Validated English BIP-39 mnemonic held in zeroizing memory
#[derive(Clone, PartialEq, Eq)]
pub struct SeedPhrase {
    phrase: Zeroizing<String>,
}

impl SeedPhrase {
    /// Parse and checksum-validate a user supplied phrase.
    ///
    /// Whitespace is collapsed and words are lowercased before validation.
    pub fn parse(phrase: &str) -> Result<Self, WalletError> {
        let normalized = Zeroizing::new(
            phrase
                .split_whitespace()
                .map(|w| w.to_lowercase())
                .collect::<Vec<_>>()
                .join(" "),
        );
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
            .map_err(|e| WalletError::validation(format!("invalid seed phrase: {}", e)))?;
        Ok(Self::from_mnemonic(&mnemonic))
    }

    fn from_mnemonic(mnemonic: &Mnemonic) -> Self {
        Self {
            phrase: Zeroizing::new(mnemonic.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.phrase
    }

    pub fn word_count(&self) -> usize {
        self.phrase.split(' ').count()
    }

    /// BIP-39 seed with an empty passphrase
    pub(crate) fn to_seed(&self) -> Result<Zeroizing<[u8; 64]>, WalletError> {
        // The phrase was validated on construction, so a parse failure here
        // means the value was corrupted in memory.
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, &self.phrase)
            .map_err(|e| WalletError::DerivationInvariant(format!("seed phrase rejected: {}", e)))?;
        Ok(Zeroizing::new(mnemonic.to_seed("")))
    }
}

impl fmt::Debug for SeedPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeedPhrase(<{} words redacted>)", self.word_count())
    }
}

/// Generate a fresh 12-word seed phrase from the OS random source.
pub fn generate() -> Result<SeedPhrase, WalletError> {
    generate_with_words(DEFAULT_WORD_COUNT)
}

/// Generate a seed phrase with 12, 15, 18, 21 or 24 words.
pub fn generate_with_words(word_count: usize) -> Result<SeedPhrase, WalletError> {
    if !(12..=24).contains(&word_count) || word_count % 3 != 0 {
        return Err(WalletError::validation(format!(
            "unsupported mnemonic length: {} words",
            word_count
        )));
    }

    let mut entropy = Zeroizing::new(vec![0u8; word_count / 3 * 4]);
    OsRng.fill_bytes(&mut entropy);

    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| WalletError::DerivationInvariant(format!("mnemonic encoding failed: {}", e)))?;
    Ok(SeedPhrase::from_mnemonic(&mnemonic))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HARDHAT_PHRASE: &str = "test test test test test test test test test test test junk";

    #[test]
    fn test_generate_default_is_twelve_words() {
        let phrase = generate().unwrap();
        assert_eq!(phrase.word_count(), 12);
        assert!(SeedPhrase::parse(phrase.as_str()).is_ok());
    }

    #[test]
    fn test_generate_all_lengths() {
        for words in [12, 15, 18, 21, 24] {
            let phrase = generate_with_words(words).unwrap();
            assert_eq!(phrase.word_count(), words);
        }
        assert!(generate_with_words(13).is_err());
        assert!(generate_with_words(9).is_err());
    }

    #[test]
    fn test_generate_never_repeats() {
        let a = generate().unwrap();
        let b = generate().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_normalizes_input() {
        let messy = "  TEST test\ttest test test test test test test test test   Junk ";
        let phrase = SeedPhrase::parse(messy).unwrap();
        assert_eq!(phrase.as_str(), HARDHAT_PHRASE);
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        let bad = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon";
        assert!(matches!(
            SeedPhrase::parse(bad),
            Err(WalletError::Validation(_))
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let phrase = SeedPhrase::parse(HARDHAT_PHRASE).unwrap();
        let debug = format!("{:?}", phrase);
        assert!(!debug.contains("junk"));
        assert!(debug.contains("12 words"));
    }
}
