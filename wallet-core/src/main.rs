//! wallet-monitor: run the wallet caches against the configured node and log
//! what they observe until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use algo_wallet_core::errors::LedgerError;
use algo_wallet_core::transaction::LedgerSignRequest;
use algo_wallet_core::{AccountCacheStatus, LedgerTransport, WalletContext, WalletServices};

/// The monitor has no device attached; every sign request is refused.
struct NoDevice;

#[async_trait]
impl LedgerTransport for NoDevice {
    async fn dispatch(&self, request: LedgerSignRequest) -> Result<(), LedgerError> {
        Err(LedgerError::Transport(format!(
            "no ledger attached for {}",
            request.device_id
        )))
    }
}

fn wallet_root() -> PathBuf {
    std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("ALGO_WALLET_HOME").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(".algo-wallet"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let root = wallet_root();
    let context = WalletContext::initialize(root.clone())
        .with_context(|| format!("opening wallet at {}", root.display()))?;
    log::info!(
        "{} local accounts, node {}",
        context.accounts().accounts().len(),
        context.config().network.node_endpoint
    );

    let services = WalletServices::connect(&context, Arc::new(NoDevice))
        .context("building network clients")?;

    let mut status = services.account_cache().subscribe_status();
    let mut blocks = services.block_cache().subscribe();
    let mut price = services.price_cache().subscribe();

    services.resume().await.context("starting cache managers")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                if current == AccountCacheStatus::Done {
                    for (address, entry) in services.account_cache().snapshot() {
                        match entry.data() {
                            Some(data) => log::info!(
                                "{} balance {} ({} assets){}",
                                address.short(),
                                data.information.amount,
                                data.information.assets.len(),
                                if entry.is_success() { "" } else { " [stale]" }
                            ),
                            None => log::warn!("{} unavailable", address.short()),
                        }
                    }
                } else {
                    log::info!("account cache {:?}", current);
                }
            }
            changed = blocks.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(round) = *blocks.borrow_and_update() {
                    log::info!("round {}", round);
                }
            }
            changed = price.changed() => {
                if changed.is_err() {
                    break;
                }
                let entry = price.borrow_and_update().clone();
                match entry.as_ref().and_then(|result| result.data()) {
                    Some(value) => log::info!(
                        "1 ALGO = {} {}",
                        value.exchange_price,
                        value.currency_id
                    ),
                    None => log::info!("price unavailable"),
                }
            }
        }
    }

    log::info!("shutting down");
    services.destroy().await;
    Ok(())
}
