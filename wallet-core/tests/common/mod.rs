#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use algo_wallet_core::api::{
    AccountInformation, AssetDetail, CurrencyValue, MarketApi, NodeApi, NodeStatus,
    TransactionParams,
};
use algo_wallet_core::errors::{LedgerError, WalletError, WalletResult};
use algo_wallet_core::transaction::{KeyStore, LedgerSignRequest, LedgerTransport};
use algo_wallet_core::{Address, PrivateKey};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

pub fn params(fee_per_byte: u64, min_fee: u64) -> TransactionParams {
    TransactionParams {
        fee_per_byte,
        min_fee,
        last_round: 20_000,
        genesis_id: "testnet-v1.0".to_string(),
        genesis_hash: "SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=".to_string(),
    }
}

pub fn information(address: Address, amount: u64) -> AccountInformation {
    AccountInformation {
        address,
        amount,
        min_balance: 100_000,
        assets: vec![],
        auth_address: None,
        round: 20_000,
    }
}

pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// In-memory algod node.
pub struct FakeNode {
    pub params: Mutex<WalletResult<TransactionParams>>,
    pub accounts: Mutex<HashMap<Address, WalletResult<AccountInformation>>>,
    pub submitted: Mutex<Vec<Vec<u8>>>,
    pub reject_submit: Mutex<Option<String>>,
    pub round: Mutex<u64>,
    pub account_calls: AtomicUsize,
}

impl FakeNode {
    pub fn new(params: TransactionParams) -> Self {
        Self {
            params: Mutex::new(Ok(params)),
            accounts: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            reject_submit: Mutex::new(None),
            round: Mutex::new(100),
            account_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_account(&self, address: Address, info: WalletResult<AccountInformation>) {
        self.accounts.lock().insert(address, info);
    }
}

#[async_trait]
impl NodeApi for FakeNode {
    async fn transaction_params(&self) -> WalletResult<TransactionParams> {
        self.params.lock().clone()
    }

    async fn account_information(&self, address: &Address) -> WalletResult<AccountInformation> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        self.accounts
            .lock()
            .get(address)
            .cloned()
            .unwrap_or_else(|| Err(WalletError::NotFound(address.as_string())))
    }

    async fn submit_transaction(&self, signed: &[u8]) -> WalletResult<String> {
        if let Some(reason) = self.reject_submit.lock().clone() {
            return Err(WalletError::SubmitRejected(reason));
        }
        self.submitted.lock().push(signed.to_vec());
        let decoded = algo_wallet_core::transaction::SignedTransaction::decode(signed)?;
        decoded.id()
    }

    async fn status(&self) -> WalletResult<NodeStatus> {
        Ok(NodeStatus {
            last_round: *self.round.lock(),
            time_since_last_round: 0,
        })
    }

    async fn wait_for_block_after(&self, round: u64) -> WalletResult<NodeStatus> {
        tokio::time::sleep(Duration::from_secs(4)).await;
        let next = round + 1;
        *self.round.lock() = next;
        Ok(NodeStatus {
            last_round: next,
            time_since_last_round: 0,
        })
    }
}

/// Price and asset backend whose answers can be held back per currency or asset.
#[derive(Default)]
pub struct FakeMarket {
    pub gated: Mutex<Vec<String>>,
    pub gate: Notify,
    pub fetch_started: Notify,
    pub price_calls: AtomicUsize,
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight: AtomicUsize,
    pub assets: Mutex<HashMap<u64, AssetDetail>>,
    pub gated_assets: Mutex<Vec<u64>>,
    pub asset_gate: Notify,
    pub asset_fetch_started: Notify,
    pub asset_calls: AtomicUsize,
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeMarket {
    pub fn gate_currency(&self, currency_id: &str) {
        self.gated.lock().push(currency_id.to_string());
    }

    pub fn gate_asset(&self, asset_id: u64) {
        self.gated_assets.lock().push(asset_id);
    }
}

pub fn asset_detail(asset_id: u64, unit_name: &str) -> AssetDetail {
    AssetDetail {
        asset_id,
        name: Some(unit_name.to_string()),
        unit_name: Some(unit_name.to_string()),
        fraction_decimals: 6,
        total_supply: 1_000_000_000,
        is_verified: false,
    }
}

pub fn currency_value(currency_id: &str, price: &str) -> CurrencyValue {
    CurrencyValue {
        currency_id: currency_id.to_string(),
        name: currency_id.to_string(),
        symbol: None,
        exchange_price: price.to_string(),
        last_updated_at: None,
    }
}

#[async_trait]
impl MarketApi for FakeMarket {
    async fn currency_value(&self, currency_id: &str) -> WalletResult<CurrencyValue> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(self.in_flight.clone());
        self.fetch_started.notify_one();

        let gated = self.gated.lock().iter().any(|gated| gated == currency_id);
        if gated {
            self.gate.notified().await;
        }
        Ok(currency_value(currency_id, "0.25"))
    }

    async fn asset_detail(&self, asset_id: u64) -> WalletResult<AssetDetail> {
        self.asset_calls.fetch_add(1, Ordering::SeqCst);
        let gated = self.gated_assets.lock().contains(&asset_id);
        if gated {
            self.asset_fetch_started.notify_one();
            self.asset_gate.notified().await;
        }
        self.assets
            .lock()
            .get(&asset_id)
            .cloned()
            .ok_or_else(|| WalletError::NotFound(format!("asset {}", asset_id)))
    }
}

/// Forwards sign requests to the test, which answers through `LedgerSigner::deliver`.
pub struct ChannelTransport {
    requests: mpsc::UnboundedSender<LedgerSignRequest>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LedgerSignRequest>) {
        let (requests, receiver) = mpsc::unbounded_channel();
        (Self { requests }, receiver)
    }
}

#[async_trait]
impl LedgerTransport for ChannelTransport {
    async fn dispatch(&self, request: LedgerSignRequest) -> Result<(), LedgerError> {
        self.requests
            .send(request)
            .map_err(|_| LedgerError::Transport("device gone".to_string()))
    }
}

#[derive(Default)]
pub struct MemoryKeys {
    keys: Mutex<HashMap<Address, PrivateKey>>,
}

impl MemoryKeys {
    pub fn insert(&self, key: PrivateKey) {
        self.keys.lock().insert(key.address(), key);
    }
}

impl KeyStore for MemoryKeys {
    fn signing_key(&self, address: &Address) -> WalletResult<PrivateKey> {
        self.keys
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| WalletError::MissingSigningKey(address.as_string()))
    }
}
