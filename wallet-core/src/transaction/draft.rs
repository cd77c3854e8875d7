use serde::{Deserialize, Serialize};

use crate::api::{AccountInformation, AssetHolding};
use crate::blockchain::Address;

/// The sending account as it looked when the draft was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderSnapshot {
    pub address: Address,
    pub balance: u64,
    pub min_balance: u64,
    #[serde(default)]
    pub assets: Vec<AssetHolding>,
    #[serde(default)]
    pub auth_address: Option<Address>,
}

impl SenderSnapshot {
    pub fn holding(&self, asset_id: u64) -> Option<&AssetHolding> {
        self.assets.iter().find(|holding| holding.asset_id == asset_id)
    }

    pub fn authorizing_address(&self) -> Address {
        self.auth_address.unwrap_or(self.address)
    }
}

impl From<&AccountInformation> for SenderSnapshot {
    fn from(info: &AccountInformation) -> Self {
        Self {
            address: info.address,
            balance: info.amount,
            min_balance: info.min_balance,
            assets: info.assets.clone(),
            auth_address: info.auth_address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DraftKind {
    /// Native coin transfer when `asset_id` is `None`, asset transfer otherwise.
    Send {
        receiver: Address,
        amount: u64,
        #[serde(default)]
        asset_id: Option<u64>,
        /// Send the whole balance and close the sender account.
        #[serde(default)]
        close_out: bool,
    },
    /// Opt in to an asset.
    AssetAdd { asset_id: u64 },
    /// Opt out of an asset, sending any remaining units to `close_to`.
    AssetRemove { asset_id: u64, close_to: Address },
    Rekey { rekey_to: Address },
}

/// Which builder handles a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Send,
    AssetAdd,
    AssetRemove,
    Rekey,
}

/// A not-yet-signed description of an intended transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub sender: SenderSnapshot,
    pub kind: DraftKind,
    #[serde(default)]
    pub note: Option<Vec<u8>>,
    /// Written by the controller once params are known.
    #[serde(default)]
    pub fee: Option<u64>,
}

impl TransactionDraft {
    pub fn new(sender: SenderSnapshot, kind: DraftKind) -> Self {
        Self {
            sender,
            kind,
            note: None,
            fee: None,
        }
    }

    pub fn send(sender: SenderSnapshot, receiver: Address, amount: u64) -> Self {
        Self::new(
            sender,
            DraftKind::Send {
                receiver,
                amount,
                asset_id: None,
                close_out: false,
            },
        )
    }

    pub fn close_out(sender: SenderSnapshot, receiver: Address) -> Self {
        Self::new(
            sender,
            DraftKind::Send {
                receiver,
                amount: 0,
                asset_id: None,
                close_out: true,
            },
        )
    }

    pub fn send_asset(
        sender: SenderSnapshot,
        receiver: Address,
        asset_id: u64,
        amount: u64,
    ) -> Self {
        Self::new(
            sender,
            DraftKind::Send {
                receiver,
                amount,
                asset_id: Some(asset_id),
                close_out: false,
            },
        )
    }

    pub fn with_note(mut self, note: impl Into<Vec<u8>>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn transaction_type(&self) -> TransactionType {
        match self.kind {
            DraftKind::Send { .. } => TransactionType::Send,
            DraftKind::AssetAdd { .. } => TransactionType::AssetAdd,
            DraftKind::AssetRemove { .. } => TransactionType::AssetRemove,
            DraftKind::Rekey { .. } => TransactionType::Rekey,
        }
    }

    /// Plain value transfers of the native coin get their fee reconciled after signing.
    pub fn is_native_send(&self) -> bool {
        matches!(self.kind, DraftKind::Send { asset_id: None, .. })
    }
}
