use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{CurrencyValue, MarketApi};
use crate::config_store::PollingConfig;
use crate::errors::WalletError;
use crate::storage::PreferenceStore;

use super::lifecycle::{restart_job, JobSlot, Manager};
use super::store::ValueCache;

/// Keeps the price of the native coin in the selected currency fresh.
pub struct PriceManager {
    market: Arc<dyn MarketApi>,
    preferences: Arc<PreferenceStore>,
    cache: Arc<ValueCache<CurrencyValue>>,
    polling: PollingConfig,
    job: JobSlot,
}

impl PriceManager {
    pub fn new(
        market: Arc<dyn MarketApi>,
        preferences: Arc<PreferenceStore>,
        cache: Arc<ValueCache<CurrencyValue>>,
        polling: PollingConfig,
    ) -> Self {
        Self {
            market,
            preferences,
            cache,
            polling,
            job: JobSlot::new(),
        }
    }

    pub fn cache(&self) -> &Arc<ValueCache<CurrencyValue>> {
        &self.cache
    }

    /// Fetch once and commit the result if the currency is still selected.
    /// Returns whether the fetch succeeded, or `None` when it was discarded.
    async fn fetch_once(&self) -> Option<bool> {
        let currency = self.preferences.currency();
        let fetched = match self.market.currency_value(&currency).await {
            Ok(value) if value.currency_id != currency => Err(WalletError::InvalidResponse(
                format!("price backend answered {} for {}", value.currency_id, currency),
            )),
            other => other,
        };
        let succeeded = fetched.is_ok();
        if let Err(error) = &fetched {
            log::warn!("price refresh for {} failed: {}", currency, error);
        }

        let committed = self
            .cache
            .commit_if(fetched, || self.preferences.currency() == currency);
        if !committed {
            log::debug!("discarding {} price, currency changed meanwhile", currency);
            return None;
        }
        if succeeded {
            if let Err(error) = self.preferences.mark_price_refreshed() {
                log::warn!("failed to record price refresh time: {}", error);
            }
        }
        Some(succeeded)
    }
}

#[async_trait]
impl Manager for PriceManager {
    fn name(&self) -> &'static str {
        "price"
    }

    fn job_slot(&self) -> &JobSlot {
        &self.job
    }

    async fn initialize(self: Arc<Self>) {
        let mut currency = self.preferences.subscribe_currency();
        currency.borrow_and_update();
        restart_job(&self).await;

        while currency.changed().await.is_ok() {
            let selected = currency.borrow_and_update().clone();
            log::info!("currency changed to {}, invalidating price cache", selected);
            self.cache.clear();
            restart_job(&self).await;
        }
    }

    async fn do_job(self: Arc<Self>) {
        loop {
            let delay = match self.fetch_once().await {
                Some(true) => self.polling.price_refresh_interval(),
                Some(false) => self.polling.price_retry_delay(),
                None => continue,
            };
            tokio::time::sleep(delay).await;
        }
    }

    fn release(&self) {
        self.cache.clear();
    }
}
