use super::draft::{TransactionDraft, TransactionType};
use super::encoding::SignedTransaction;
use crate::errors::WalletResult;

/// Signed bytes and the context needed after submission.
#[derive(Debug)]
pub struct SignedPayload {
    pub signed_bytes: Vec<u8>,
    pub tx_id: String,
    pub fee: u64,
    pub draft: TransactionDraft,
}

/// Output of a successful compose-and-sign round, consumed by `submit`.
///
/// Not `Clone`; `submit` takes it by value.
#[derive(Debug)]
pub enum SignedTransactionDetail {
    Send(SignedPayload),
    AssetOperation(SignedPayload),
    RekeyOperation(SignedPayload),
}

impl SignedTransactionDetail {
    pub fn new(draft: TransactionDraft, signed: &SignedTransaction) -> WalletResult<Self> {
        let payload = SignedPayload {
            signed_bytes: signed.encode()?,
            tx_id: signed.id()?,
            fee: signed.txn.fee,
            draft,
        };
        Ok(match payload.draft.transaction_type() {
            TransactionType::Send => SignedTransactionDetail::Send(payload),
            TransactionType::AssetAdd | TransactionType::AssetRemove => {
                SignedTransactionDetail::AssetOperation(payload)
            }
            TransactionType::Rekey => SignedTransactionDetail::RekeyOperation(payload),
        })
    }

    pub fn payload(&self) -> &SignedPayload {
        match self {
            SignedTransactionDetail::Send(payload)
            | SignedTransactionDetail::AssetOperation(payload)
            | SignedTransactionDetail::RekeyOperation(payload) => payload,
        }
    }

    pub fn into_payload(self) -> SignedPayload {
        match self {
            SignedTransactionDetail::Send(payload)
            | SignedTransactionDetail::AssetOperation(payload)
            | SignedTransactionDetail::RekeyOperation(payload) => payload,
        }
    }

    pub fn tx_id(&self) -> &str {
        &self.payload().tx_id
    }

    pub fn fee(&self) -> u64 {
        self.payload().fee
    }

    pub fn signed_bytes(&self) -> &[u8] {
        &self.payload().signed_bytes
    }
}
