//! Per-type transaction builders.
//!
//! Each transaction type is a pair of pure functions: `check` enforces the
//! balance rules for a given fee and `shape` lays out the unsigned
//! transaction. The controller sizes a transaction with `shape` alone before
//! the fee is known, then calls `compose` (both halves) with the real fee.

use crate::api::TransactionParams;
use crate::errors::{WalletError, WalletResult};
use crate::validation::MAX_NOTE_BYTES;

use super::draft::{DraftKind, SenderSnapshot, TransactionDraft, TransactionType};
use super::encoding::{TransactionBody, UnsignedTransaction};

/// Extra minimum balance each asset opt-in adds to an account.
pub const ASSET_MIN_BALANCE: u64 = 100_000;

type CheckFn = fn(&TransactionDraft, u64) -> WalletResult<()>;
type ShapeFn = fn(&TransactionDraft, &TransactionParams, u64) -> WalletResult<UnsignedTransaction>;

#[derive(Debug)]
pub struct Builder {
    pub transaction_type: TransactionType,
    check: CheckFn,
    shape: ShapeFn,
}

impl Builder {
    /// Lay out the transaction without balance checks, used for fee estimation.
    pub fn shape(
        &self,
        draft: &TransactionDraft,
        params: &TransactionParams,
        fee: u64,
    ) -> WalletResult<UnsignedTransaction> {
        (self.shape)(draft, params, fee)
    }

    pub fn compose(
        &self,
        draft: &TransactionDraft,
        params: &TransactionParams,
        fee: u64,
    ) -> WalletResult<UnsignedTransaction> {
        (self.check)(draft, fee)?;
        (self.shape)(draft, params, fee)
    }

    /// Fee for the unsigned encoding of `draft`.
    pub fn estimate_fee(
        &self,
        draft: &TransactionDraft,
        params: &TransactionParams,
    ) -> WalletResult<u64> {
        let sized = self.shape(draft, params, params.min_fee)?;
        Ok(params.fee_for_size(sized.encode()?.len()))
    }
}

static BUILDERS: [Builder; 4] = [
    Builder {
        transaction_type: TransactionType::Send,
        check: check_send,
        shape: shape_send,
    },
    Builder {
        transaction_type: TransactionType::AssetAdd,
        check: check_asset_add,
        shape: shape_asset_add,
    },
    Builder {
        transaction_type: TransactionType::AssetRemove,
        check: check_asset_remove,
        shape: shape_asset_remove,
    },
    Builder {
        transaction_type: TransactionType::Rekey,
        check: check_rekey,
        shape: shape_rekey,
    },
];

pub fn builder_for(transaction_type: TransactionType) -> &'static Builder {
    match transaction_type {
        TransactionType::Send => &BUILDERS[0],
        TransactionType::AssetAdd => &BUILDERS[1],
        TransactionType::AssetRemove => &BUILDERS[2],
        TransactionType::Rekey => &BUILDERS[3],
    }
}

fn require_balance(sender: &SenderSnapshot, required: u64) -> WalletResult<()> {
    if sender.balance < required {
        return Err(WalletError::MinimumBalance { required });
    }
    Ok(())
}

fn sum(values: &[u64]) -> WalletResult<u64> {
    values.iter().try_fold(0u64, |acc, value| {
        acc.checked_add(*value)
            .ok_or_else(|| WalletError::InvalidAmount("Amount overflow".to_string()))
    })
}

fn header(
    draft: &TransactionDraft,
    params: &TransactionParams,
    fee: u64,
    body: TransactionBody,
) -> WalletResult<UnsignedTransaction> {
    let note = match &draft.note {
        Some(bytes) if bytes.len() > MAX_NOTE_BYTES => {
            return Err(WalletError::InvalidDraft(format!(
                "Note is {} bytes, at most {} allowed",
                bytes.len(),
                MAX_NOTE_BYTES
            )));
        }
        Some(bytes) if !bytes.is_empty() => Some(hex::encode(bytes)),
        _ => None,
    };

    Ok(UnsignedTransaction {
        sender: draft.sender.address,
        fee,
        first_valid: params.first_valid(),
        last_valid: params.last_valid(),
        genesis_id: params.genesis_id.clone(),
        genesis_hash: params.genesis_hash.clone(),
        note,
        rekey_to: None,
        body,
    })
}

fn wrong_kind(expected: TransactionType) -> WalletError {
    WalletError::InvalidDraft(format!("Draft is not a {:?} transaction", expected))
}

fn check_send(draft: &TransactionDraft, fee: u64) -> WalletResult<()> {
    let DraftKind::Send {
        amount,
        asset_id,
        close_out,
        ..
    } = &draft.kind
    else {
        return Err(wrong_kind(TransactionType::Send));
    };
    let sender = &draft.sender;

    match (asset_id, close_out) {
        (None, false) => require_balance(sender, sum(&[*amount, fee, sender.min_balance])?),
        (None, true) => {
            if !sender.assets.is_empty() {
                return Err(WalletError::InvalidDraft(
                    "Remove all assets before closing the account".to_string(),
                ));
            }
            require_balance(sender, fee)
        }
        (Some(asset_id), false) => {
            let holding = sender.holding(*asset_id).ok_or_else(|| {
                WalletError::InvalidDraft(format!("Account does not hold asset {}", asset_id))
            })?;
            if holding.amount < *amount {
                return Err(WalletError::InvalidDraft(format!(
                    "Insufficient asset balance: {} available, {} requested",
                    holding.amount, amount
                )));
            }
            require_balance(sender, sum(&[sender.min_balance, fee])?)
        }
        (Some(_), true) => Err(WalletError::InvalidDraft(
            "Asset close-out is done through an asset removal".to_string(),
        )),
    }
}

fn shape_send(
    draft: &TransactionDraft,
    params: &TransactionParams,
    fee: u64,
) -> WalletResult<UnsignedTransaction> {
    let DraftKind::Send {
        receiver,
        amount,
        asset_id,
        close_out,
    } = &draft.kind
    else {
        return Err(wrong_kind(TransactionType::Send));
    };

    let body = match asset_id {
        None if *close_out => TransactionBody::Payment {
            receiver: *receiver,
            amount: draft.sender.balance.saturating_sub(fee),
            close_remainder_to: Some(*receiver),
        },
        None => TransactionBody::Payment {
            receiver: *receiver,
            amount: *amount,
            close_remainder_to: None,
        },
        Some(asset_id) => TransactionBody::AssetTransfer {
            asset_id: *asset_id,
            receiver: *receiver,
            amount: *amount,
            close_to: None,
        },
    };
    header(draft, params, fee, body)
}

fn check_asset_add(draft: &TransactionDraft, fee: u64) -> WalletResult<()> {
    let DraftKind::AssetAdd { asset_id } = &draft.kind else {
        return Err(wrong_kind(TransactionType::AssetAdd));
    };
    let sender = &draft.sender;
    if sender.holding(*asset_id).is_some() {
        return Err(WalletError::InvalidDraft(format!(
            "Account already holds asset {}",
            asset_id
        )));
    }
    require_balance(sender, sum(&[sender.min_balance, ASSET_MIN_BALANCE, fee])?)
}

fn shape_asset_add(
    draft: &TransactionDraft,
    params: &TransactionParams,
    fee: u64,
) -> WalletResult<UnsignedTransaction> {
    let DraftKind::AssetAdd { asset_id } = &draft.kind else {
        return Err(wrong_kind(TransactionType::AssetAdd));
    };
    let body = TransactionBody::AssetTransfer {
        asset_id: *asset_id,
        receiver: draft.sender.address,
        amount: 0,
        close_to: None,
    };
    header(draft, params, fee, body)
}

fn check_asset_remove(draft: &TransactionDraft, fee: u64) -> WalletResult<()> {
    let DraftKind::AssetRemove { asset_id, .. } = &draft.kind else {
        return Err(wrong_kind(TransactionType::AssetRemove));
    };
    if draft.sender.holding(*asset_id).is_none() {
        return Err(WalletError::InvalidDraft(format!(
            "Account does not hold asset {}",
            asset_id
        )));
    }
    require_balance(&draft.sender, fee)
}

fn shape_asset_remove(
    draft: &TransactionDraft,
    params: &TransactionParams,
    fee: u64,
) -> WalletResult<UnsignedTransaction> {
    let DraftKind::AssetRemove { asset_id, close_to } = &draft.kind else {
        return Err(wrong_kind(TransactionType::AssetRemove));
    };
    let body = TransactionBody::AssetTransfer {
        asset_id: *asset_id,
        receiver: *close_to,
        amount: 0,
        close_to: Some(*close_to),
    };
    header(draft, params, fee, body)
}

fn check_rekey(draft: &TransactionDraft, fee: u64) -> WalletResult<()> {
    let DraftKind::Rekey { rekey_to } = &draft.kind else {
        return Err(wrong_kind(TransactionType::Rekey));
    };
    let sender = &draft.sender;
    if *rekey_to == sender.authorizing_address() {
        return Err(WalletError::InvalidDraft(format!(
            "Account is already authorized by {}",
            rekey_to.short()
        )));
    }
    require_balance(sender, sum(&[sender.min_balance, fee])?)
}

fn shape_rekey(
    draft: &TransactionDraft,
    params: &TransactionParams,
    fee: u64,
) -> WalletResult<UnsignedTransaction> {
    let DraftKind::Rekey { rekey_to } = &draft.kind else {
        return Err(wrong_kind(TransactionType::Rekey));
    };
    let body = TransactionBody::Payment {
        receiver: draft.sender.address,
        amount: 0,
        close_remainder_to: None,
    };
    let mut txn = header(draft, params, fee, body)?;
    txn.rekey_to = Some(*rekey_to);
    Ok(txn)
}
