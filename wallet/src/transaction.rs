use primitive_types::{H256, U256};
use rlp::RlpStream;
use secp256k1::{Message, Secp256k1};
use sha3::{Digest, Keccak256};

use crate::derivation::{Address, PrivateKey};
use crate::errors::WalletError;

/// Gas used by a plain value transfer
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Signed transaction ready for broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Sender recovered from the signing key
    pub from: Address,
    /// RLP encoded EIP-155 legacy transaction
    pub raw: Vec<u8>,
    /// Keccak-256 of `raw`, the hash the network will report
    pub hash: H256,
}

impl SignedTransaction {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }
}

/// Transaction builder
pub struct TransactionBuilder {
    to: Option<Address>,
    value: U256,
    nonce: u64,
    gas_price: U256,
    gas_limit: u64,
    chain_id: u64,
}

impl TransactionBuilder {
    /// Create new transaction builder
    pub fn new() -> Self {
        Self {
            to: None,
            value: U256::zero(),
            nonce: 0,
            gas_price: U256::from(1_000_000_000u64), // 1 gwei default
            gas_limit: TRANSFER_GAS_LIMIT,
            chain_id: 1,
        }
    }

    /// Set recipient
    pub fn to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    /// Set value in wei
    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Set nonce
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Set gas price in wei
    pub fn gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = gas_price;
        self
    }

    /// Set gas limit
    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Set chain ID
    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// EIP-155 signing hash: keccak(rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0]))
    pub fn signing_hash(&self) -> Result<H256, WalletError> {
        let to = self.recipient()?;
        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream, &to);
        stream.append(&self.chain_id);
        stream.append(&0u8);
        stream.append(&0u8);
        Ok(H256::from_slice(&Keccak256::digest(&stream.out())))
    }

    /// Build and sign transaction
    pub fn build_and_sign(self, private_key: &PrivateKey) -> Result<SignedTransaction, WalletError> {
        let to = self.recipient()?;
        let sighash = self.signing_hash()?;

        let secp = Secp256k1::signing_only();
        let secret_key = private_key.secret_key()?;
        let message = Message::from_slice(sighash.as_bytes())
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        let (recovery_id, compact) = secp
            .sign_ecdsa_recoverable(&message, &secret_key)
            .serialize_compact();

        // EIP-155: v = chainId * 2 + 35 + recovery id
        let v = self
            .chain_id
            .checked_mul(2)
            .and_then(|c| c.checked_add(35 + recovery_id.to_i32() as u64))
            .ok_or_else(|| WalletError::Signing(format!("chain id {} too large", self.chain_id)))?;

        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream, &to);
        stream.append(&v);
        stream.append(&U256::from_big_endian(&compact[..32]));
        stream.append(&U256::from_big_endian(&compact[32..]));
        let raw = stream.out().to_vec();

        let hash = H256::from_slice(&Keccak256::digest(&raw));

        Ok(SignedTransaction {
            from: private_key.address()?,
            raw,
            hash,
        })
    }

    fn recipient(&self) -> Result<Address, WalletError> {
        self.to
            .ok_or_else(|| WalletError::validation("recipient address not set"))
    }

    fn append_fields(&self, stream: &mut RlpStream, to: &Address) {
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas_limit);
        stream.append(&to.as_bytes().to_vec());
        stream.append(&self.value);
        stream.append_empty_data();
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlp::Rlp;
    use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};

    // Reference transaction from EIP-155
    fn eip155_example() -> (TransactionBuilder, PrivateKey) {
        let key = PrivateKey::from_hex(&"46".repeat(32)).unwrap();
        let builder = TransactionBuilder::new()
            .nonce(9)
            .gas_price(U256::from(20_000_000_000u64))
            .gas_limit(21_000)
            .to(Address([0x35; 20]))
            .value(U256::exp10(18))
            .chain_id(1);
        (builder, key)
    }

    #[test]
    fn test_eip155_signing_hash() {
        let (builder, _) = eip155_example();
        assert_eq!(
            hex::encode(builder.signing_hash().unwrap()),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_eip155_signed_encoding() {
        let (builder, key) = eip155_example();
        let tx = builder.build_and_sign(&key).unwrap();
        assert_eq!(
            tx.raw_hex(),
            "0xf86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
        assert_eq!(tx.hash, H256::from_slice(&Keccak256::digest(&tx.raw)));
    }

    #[test]
    fn test_signature_recovers_sender() {
        let key = PrivateKey::from_hex(
            "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        let builder = TransactionBuilder::new()
            .to(Address([0x11; 20]))
            .value(U256::from(1000u64))
            .nonce(3)
            .chain_id(1337);
        let sighash = builder.signing_hash().unwrap();
        let tx = builder.build_and_sign(&key).unwrap();

        let rlp = Rlp::new(&tx.raw);
        assert_eq!(rlp.item_count().unwrap(), 9);
        assert_eq!(rlp.val_at::<u64>(0).unwrap(), 3);
        let v: u64 = rlp.val_at(6).unwrap();
        let r: U256 = rlp.val_at(7).unwrap();
        let s: U256 = rlp.val_at(8).unwrap();

        let mut compact = [0u8; 64];
        r.to_big_endian(&mut compact[..32]);
        s.to_big_endian(&mut compact[32..]);
        let recid = RecoveryId::from_i32((v - 1337 * 2 - 35) as i32).unwrap();
        let signature = RecoverableSignature::from_compact(&compact, recid).unwrap();

        let secp = Secp256k1::verification_only();
        let message = Message::from_slice(sighash.as_bytes()).unwrap();
        let recovered = secp.recover_ecdsa(&message, &signature).unwrap();

        assert_eq!(Address::from_public_key(&recovered), tx.from);
        assert_eq!(
            tx.from.to_string(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn test_missing_recipient_rejected() {
        let key = PrivateKey::from_hex(&"46".repeat(32)).unwrap();
        assert!(matches!(
            TransactionBuilder::new().build_and_sign(&key),
            Err(WalletError::Validation(_))
        ));
    }
}
