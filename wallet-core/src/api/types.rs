use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blockchain::Address;

/// Number of rounds a composed transaction stays valid for.
pub const VALIDITY_WINDOW: u64 = 1000;

/// Suggested parameters for composing a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TransactionParams {
    /// Fee per byte of the signed transaction, in micro-units.
    #[serde(rename = "fee")]
    pub fee_per_byte: u64,
    pub min_fee: u64,
    pub last_round: u64,
    pub genesis_id: String,
    pub genesis_hash: String,
}

impl TransactionParams {
    pub fn first_valid(&self) -> u64 {
        self.last_round
    }

    pub fn last_valid(&self) -> u64 {
        self.last_round.saturating_add(VALIDITY_WINDOW)
    }

    /// Fee owed by a transaction whose encoding is `size` bytes long.
    pub fn fee_for_size(&self, size: usize) -> u64 {
        let by_size = (size as u64).saturating_mul(self.fee_per_byte);
        by_size.max(self.min_fee)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AssetHolding {
    pub asset_id: u64,
    pub amount: u64,
    #[serde(default)]
    pub is_frozen: bool,
}

/// On-chain state of a single account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AccountInformation {
    pub address: Address,
    pub amount: u64,
    pub min_balance: u64,
    #[serde(default)]
    pub assets: Vec<AssetHolding>,
    #[serde(default, rename = "auth-addr", skip_serializing_if = "Option::is_none")]
    pub auth_address: Option<Address>,
    #[serde(default)]
    pub round: u64,
}

impl AccountInformation {
    pub fn holding(&self, asset_id: u64) -> Option<&AssetHolding> {
        self.assets.iter().find(|holding| holding.asset_id == asset_id)
    }

    pub fn is_rekeyed(&self) -> bool {
        matches!(self.auth_address, Some(auth) if auth != self.address)
    }

    /// Address whose key authorizes this account's transactions.
    pub fn authorizing_address(&self) -> Address {
        match self.auth_address {
            Some(auth) => auth,
            None => self.address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeStatus {
    pub last_round: u64,
    #[serde(default)]
    pub time_since_last_round: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub tx_id: String,
}

/// Exchange value of the native coin in a display currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyValue {
    pub currency_id: String,
    pub name: String,
    #[serde(default)]
    pub symbol: Option<String>,
    /// Price of one whole coin, as the decimal string the backend sends.
    pub exchange_price: String,
    #[serde(default)]
    pub last_updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDetail {
    pub asset_id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unit_name: Option<String>,
    #[serde(default)]
    pub fraction_decimals: u32,
    #[serde(default)]
    pub total_supply: u64,
    #[serde(default)]
    pub is_verified: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}
