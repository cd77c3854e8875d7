use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use crate::api::MarketApi;
use crate::config_store::PollingConfig;

use super::lifecycle::{restart_job, stop_job, JobSlot, Manager};
use super::store::{AccountCacheStatus, AccountCacheStore, AssetCacheStore};

/// Fetches details of assets held by local accounts.
///
/// Runs only while the account cache is `Done` and at least one asset is held.
pub struct AssetCacheManager {
    market: Arc<dyn MarketApi>,
    accounts: Arc<AccountCacheStore>,
    assets: Arc<AssetCacheStore>,
    polling: PollingConfig,
    job: JobSlot,
}

impl AssetCacheManager {
    pub fn new(
        market: Arc<dyn MarketApi>,
        accounts: Arc<AccountCacheStore>,
        assets: Arc<AssetCacheStore>,
        polling: PollingConfig,
    ) -> Self {
        Self {
            market,
            accounts,
            assets,
            polling,
            job: JobSlot::new(),
        }
    }

    fn should_run(&self) -> bool {
        self.accounts.status() == AccountCacheStatus::Done
            && !self.accounts.distinct_asset_ids().is_empty()
    }

    fn missing(&self) -> Vec<u64> {
        self.assets.missing(&self.accounts.distinct_asset_ids())
    }

    /// Fetch the given assets once. Returns whether all fetches succeeded.
    async fn fetch(&self, missing: Vec<u64>) -> bool {
        log::debug!("fetching {} asset details", missing.len());

        let fetches = missing.into_iter().map(|asset_id| async move {
            (asset_id, self.market.asset_detail(asset_id).await)
        });
        let results = join_all(fetches).await;
        let all_ok = results.iter().all(|(_, fetched)| fetched.is_ok());
        self.assets.commit(results);
        all_ok
    }
}

#[async_trait]
impl Manager for AssetCacheManager {
    fn name(&self) -> &'static str {
        "asset"
    }

    fn job_slot(&self) -> &JobSlot {
        &self.job
    }

    async fn initialize(self: Arc<Self>) {
        let mut status = self.accounts.subscribe_status();
        let mut entries = self.accounts.subscribe();
        loop {
            status.borrow_and_update();
            entries.borrow_and_update();
            if self.should_run() {
                if !self.job.is_running().await {
                    restart_job(&self).await;
                }
            } else {
                stop_job(&self).await;
            }

            tokio::select! {
                changed = status.changed() => if changed.is_err() { break },
                changed = entries.changed() => if changed.is_err() { break },
            }
        }
    }

    async fn do_job(self: Arc<Self>) {
        // Held assets may change while a fetch is in flight; the job stays
        // alive until nothing is missing.
        loop {
            let missing = self.missing();
            if missing.is_empty() {
                break;
            }
            if !self.fetch(missing).await {
                log::warn!("some asset details failed to load, retrying");
                tokio::time::sleep(self.polling.asset_retry_delay()).await;
            }
        }
    }

    fn release(&self) {
        self.assets.clear();
    }
}
