use std::sync::Arc;

use async_trait::async_trait;

use crate::api::NodeApi;
use crate::config_store::PollingConfig;
use crate::storage::AccountRegistry;

use super::lifecycle::{restart_job, stop_job, JobSlot, Manager};
use super::store::BlockCache;

/// Long-polls the node for new rounds while there are accounts to refresh.
pub struct BlockPollingManager {
    node: Arc<dyn NodeApi>,
    accounts: Arc<AccountRegistry>,
    blocks: Arc<BlockCache>,
    polling: PollingConfig,
    job: JobSlot,
}

impl BlockPollingManager {
    pub fn new(
        node: Arc<dyn NodeApi>,
        accounts: Arc<AccountRegistry>,
        blocks: Arc<BlockCache>,
        polling: PollingConfig,
    ) -> Self {
        Self {
            node,
            accounts,
            blocks,
            polling,
            job: JobSlot::new(),
        }
    }

    async fn poll_once(&self) {
        let next = match self.blocks.latest_round() {
            Some(round) => self.node.wait_for_block_after(round).await,
            None => self.node.status().await,
        };
        match next {
            Ok(status) => {
                if self.blocks.update(status.last_round) {
                    log::debug!("new block {}", status.last_round);
                }
            }
            Err(error) => {
                log::warn!("block polling failed: {}", error);
                tokio::time::sleep(self.polling.block_retry_delay()).await;
            }
        }
    }
}

#[async_trait]
impl Manager for BlockPollingManager {
    fn name(&self) -> &'static str {
        "block-polling"
    }

    fn job_slot(&self) -> &JobSlot {
        &self.job
    }

    async fn initialize(self: Arc<Self>) {
        let mut accounts = self.accounts.subscribe();
        let mut polling = false;
        loop {
            let has_accounts = !accounts.borrow_and_update().is_empty();
            if has_accounts && !polling {
                restart_job(&self).await;
            } else if !has_accounts && polling {
                log::info!("no local accounts left, block polling stopped");
                stop_job(&self).await;
            }
            polling = has_accounts;

            if accounts.changed().await.is_err() {
                break;
            }
        }
    }

    async fn do_job(self: Arc<Self>) {
        loop {
            self.poll_once().await;
        }
    }

    fn release(&self) {
        self.blocks.clear();
    }
}
