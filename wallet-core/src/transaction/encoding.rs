//! Canonical byte encoding of transactions.
//!
//! Transactions are encoded as compact JSON with a fixed field order. The
//! signed message is the `TX` domain tag followed by the unsigned encoding,
//! and the transaction id is the SHA-512/256 digest of that message.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512_256};

use crate::blockchain::{Address, PublicKey};
use crate::errors::{WalletError, WalletResult};

const SIGNING_TAG: &[u8] = b"TX";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionBody {
    Payment {
        receiver: Address,
        amount: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        close_remainder_to: Option<Address>,
    },
    AssetTransfer {
        asset_id: u64,
        receiver: Address,
        amount: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        close_to: Option<Address>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub sender: Address,
    pub fee: u64,
    pub first_valid: u64,
    pub last_valid: u64,
    pub genesis_id: String,
    pub genesis_hash: String,
    /// Hex-encoded note bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rekey_to: Option<Address>,
    #[serde(flatten)]
    pub body: TransactionBody,
}

impl UnsignedTransaction {
    pub fn encode(&self) -> WalletResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn signing_payload(&self) -> WalletResult<Vec<u8>> {
        let encoded = self.encode()?;
        let mut payload = Vec::with_capacity(SIGNING_TAG.len() + encoded.len());
        payload.extend_from_slice(SIGNING_TAG);
        payload.extend_from_slice(&encoded);
        Ok(payload)
    }

    pub fn id(&self) -> WalletResult<String> {
        let digest = Sha512_256::digest(self.signing_payload()?);
        Ok(hex::encode_upper(digest))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Hex-encoded Ed25519 signature.
    pub sig: String,
    /// Authorizing address, present only when it differs from the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sgnr: Option<Address>,
    pub txn: UnsignedTransaction,
}

impl SignedTransaction {
    pub fn new(txn: UnsignedTransaction, signature: &[u8], signer: Address) -> WalletResult<Self> {
        if signature.len() != ed25519_dalek::SIGNATURE_LENGTH {
            return Err(WalletError::SignatureError(format!(
                "Expected {} signature bytes, got {}",
                ed25519_dalek::SIGNATURE_LENGTH,
                signature.len()
            )));
        }
        let sgnr = if signer == txn.sender { None } else { Some(signer) };
        Ok(Self {
            sig: hex::encode(signature),
            sgnr,
            txn,
        })
    }

    pub fn encode(&self) -> WalletResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> WalletResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn id(&self) -> WalletResult<String> {
        self.txn.id()
    }

    pub fn signer(&self) -> Address {
        self.sgnr.unwrap_or(self.txn.sender)
    }

    pub fn verify(&self, key: &PublicKey) -> WalletResult<bool> {
        if key.to_address() != self.signer() {
            return Ok(false);
        }
        let signature = hex::decode(&self.sig)
            .map_err(|e| WalletError::SignatureError(format!("Invalid signature hex: {}", e)))?;
        key.verify_signature(&self.txn.signing_payload()?, &signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::PrivateKey;

    fn payment(sender: Address, receiver: Address) -> UnsignedTransaction {
        UnsignedTransaction {
            sender,
            fee: 1000,
            first_valid: 10,
            last_valid: 1010,
            genesis_id: "testnet-v1.0".into(),
            genesis_hash: "hash".into(),
            note: None,
            rekey_to: None,
            body: TransactionBody::Payment {
                receiver,
                amount: 5,
                close_remainder_to: None,
            },
        }
    }

    #[test]
    fn signed_transaction_verifies_against_signer() {
        let key = PrivateKey::generate();
        let receiver = PrivateKey::generate().address();
        let txn = payment(key.address(), receiver);
        let signature = key.sign(&txn.signing_payload().unwrap());

        let signed = SignedTransaction::new(txn, &signature, key.address()).unwrap();
        assert!(signed.sgnr.is_none());
        assert!(signed.verify(key.public_key()).unwrap());

        let decoded = SignedTransaction::decode(&signed.encode().unwrap()).unwrap();
        assert_eq!(decoded, signed);
    }

    #[test]
    fn rekeyed_signer_is_recorded() {
        let sender = PrivateKey::generate().address();
        let auth = PrivateKey::generate();
        let txn = payment(sender, sender);
        let signature = auth.sign(&txn.signing_payload().unwrap());

        let signed = SignedTransaction::new(txn, &signature, auth.address()).unwrap();
        assert_eq!(signed.sgnr, Some(auth.address()));
        assert!(signed.verify(auth.public_key()).unwrap());
        assert!(signed.encode().unwrap().len() > signed.txn.encode().unwrap().len());
    }

    #[test]
    fn id_changes_with_fee() {
        let sender = PrivateKey::generate().address();
        let mut txn = payment(sender, sender);
        let first = txn.id().unwrap();
        txn.fee += 1;
        assert_ne!(first, txn.id().unwrap());
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn short_signature_rejected() {
        let sender = PrivateKey::generate().address();
        let err = SignedTransaction::new(payment(sender, sender), &[0u8; 10], sender).unwrap_err();
        assert!(matches!(err, WalletError::SignatureError(_)));
    }
}
