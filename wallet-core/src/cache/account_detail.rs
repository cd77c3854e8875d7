use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use crate::api::NodeApi;
use crate::storage::{AccountRegistry, PreferenceStore};

use super::lifecycle::{restart_job, JobSlot, Manager};
use super::store::{AccountCacheStatus, AccountCacheStore, BlockCache};

/// Refreshes every local account on account-set changes and new blocks.
pub struct AccountDetailCacheManager {
    node: Arc<dyn NodeApi>,
    accounts: Arc<AccountRegistry>,
    blocks: Arc<BlockCache>,
    store: Arc<AccountCacheStore>,
    preferences: Arc<PreferenceStore>,
    job: JobSlot,
}

impl AccountDetailCacheManager {
    pub fn new(
        node: Arc<dyn NodeApi>,
        accounts: Arc<AccountRegistry>,
        blocks: Arc<BlockCache>,
        store: Arc<AccountCacheStore>,
        preferences: Arc<PreferenceStore>,
    ) -> Self {
        Self {
            node,
            accounts,
            blocks,
            store,
            preferences,
            job: JobSlot::new(),
        }
    }

    /// Fetch all local accounts concurrently and commit them as one batch.
    pub async fn refresh(&self) {
        let locals = self.accounts.accounts();
        if locals.is_empty() {
            self.store.clear();
            self.store.set_status(AccountCacheStatus::Empty);
            return;
        }
        if self.store.status() != AccountCacheStatus::Done {
            self.store.set_status(AccountCacheStatus::Loading);
        }

        let fetches = locals.into_iter().map(|account| async move {
            let fetched = self.node.account_information(&account.address).await;
            (account, fetched)
        });
        let batch = join_all(fetches).await;
        let failures = batch.iter().filter(|(_, fetched)| fetched.is_err()).count();
        log::debug!(
            "account refresh finished, {} of {} failed",
            failures,
            batch.len()
        );

        self.store.commit_batch(batch);
        self.store.set_status(AccountCacheStatus::Done);
        if let Err(error) = self.preferences.mark_accounts_refreshed() {
            log::warn!("failed to record account refresh time: {}", error);
        }
    }
}

#[async_trait]
impl Manager for AccountDetailCacheManager {
    fn name(&self) -> &'static str {
        "account-detail"
    }

    fn job_slot(&self) -> &JobSlot {
        &self.job
    }

    async fn initialize(self: Arc<Self>) {
        let mut accounts = self.accounts.subscribe();
        let mut blocks = self.blocks.subscribe();
        accounts.borrow_and_update();
        blocks.borrow_and_update();
        restart_job(&self).await;

        loop {
            tokio::select! {
                changed = accounts.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    accounts.borrow_and_update();
                    // The in-flight batch covers an outdated account set.
                    restart_job(&self).await;
                }
                changed = blocks.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    blocks.borrow_and_update();
                    if !self.job.is_running().await {
                        restart_job(&self).await;
                    }
                }
            }
        }
    }

    async fn do_job(self: Arc<Self>) {
        self.refresh().await;
    }

    fn release(&self) {
        self.store.clear();
        self.store.set_status(AccountCacheStatus::Idle);
    }
}
