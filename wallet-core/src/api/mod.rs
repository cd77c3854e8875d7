//! Remote collaborators: the node REST API and the wallet backend.

pub mod types;

use async_trait::async_trait;

use crate::blockchain::Address;
use crate::errors::WalletResult;

pub use types::{
    AccountInformation, AssetDetail, AssetHolding, CurrencyValue, NodeStatus, TransactionParams,
    VALIDITY_WINDOW,
};

/// Node operations the controller and the polling managers depend on.
#[async_trait]
pub trait NodeApi: Send + Sync {
    async fn transaction_params(&self) -> WalletResult<TransactionParams>;

    async fn account_information(&self, address: &Address) -> WalletResult<AccountInformation>;

    /// Broadcast a signed transaction and return its id.
    async fn submit_transaction(&self, signed: &[u8]) -> WalletResult<String>;

    async fn status(&self) -> WalletResult<NodeStatus>;

    /// Block until a round later than `round` exists, or the node's wait times out.
    async fn wait_for_block_after(&self, round: u64) -> WalletResult<NodeStatus>;
}

/// Price and asset metadata served by the wallet backend.
#[async_trait]
pub trait MarketApi: Send + Sync {
    async fn currency_value(&self, currency_id: &str) -> WalletResult<CurrencyValue>;

    async fn asset_detail(&self, asset_id: u64) -> WalletResult<AssetDetail>;
}
