//! Injected stores shared between the managers and the host.
//!
//! Every store publishes its content on a `watch` channel. Managers are the
//! only writers; the host only reads and subscribes.

use std::collections::{BTreeMap, BTreeSet};

use tokio::sync::watch;

use crate::api::{AccountInformation, AssetDetail};
use crate::blockchain::Address;
use crate::errors::{WalletError, WalletResult};
use crate::storage::LocalAccount;

use super::result::CacheResult;

/// On-chain state of a local account together with its local metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCacheData {
    pub account: LocalAccount,
    pub information: AccountInformation,
}

impl AccountCacheData {
    pub fn address(&self) -> Address {
        self.account.address
    }

    pub fn auth_address(&self) -> Option<Address> {
        self.information.auth_address
    }

    pub fn is_rekeyed(&self) -> bool {
        self.information.is_rekeyed()
    }

    pub fn asset_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.information.assets.iter().map(|holding| holding.asset_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountCacheStatus {
    /// Nothing fetched yet.
    Idle,
    /// First fetch in progress.
    Loading,
    /// Every local account has an entry.
    Done,
    /// There are no local accounts.
    Empty,
}

pub type AccountEntries = BTreeMap<Address, CacheResult<AccountCacheData>>;

#[derive(Debug)]
pub struct AccountCacheStore {
    entries: watch::Sender<AccountEntries>,
    status: watch::Sender<AccountCacheStatus>,
}

impl Default for AccountCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountCacheStore {
    pub fn new() -> Self {
        let (entries, _) = watch::channel(BTreeMap::new());
        let (status, _) = watch::channel(AccountCacheStatus::Idle);
        Self { entries, status }
    }

    pub fn subscribe(&self) -> watch::Receiver<AccountEntries> {
        self.entries.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<AccountCacheStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> AccountCacheStatus {
        *self.status.borrow()
    }

    pub fn set_status(&self, status: AccountCacheStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    pub fn snapshot(&self) -> AccountEntries {
        self.entries.borrow().clone()
    }

    pub fn get(&self, address: &Address) -> Option<CacheResult<AccountCacheData>> {
        self.entries.borrow().get(address).cloned()
    }

    /// Replace the whole cache with one refresh cycle's results.
    ///
    /// Accounts missing from `batch` are dropped. A failed fetch keeps that
    /// account's previous data as stale.
    pub fn commit_batch(&self, batch: Vec<(LocalAccount, WalletResult<AccountInformation>)>) {
        self.entries.send_modify(|entries| {
            let mut next = BTreeMap::new();
            for (account, fetched) in batch {
                let address = account.address;
                let previous = entries.get(&address);
                let result = match fetched {
                    Ok(information) => CacheResult::success(AccountCacheData {
                        account,
                        information,
                    }),
                    Err(error) => {
                        log::warn!("account {} refresh failed: {}", address.short(), error);
                        let mut result = CacheResult::error(error, previous);
                        // Local metadata may have changed since the last success.
                        if let CacheResult::Error {
                            stale: Some(data), ..
                        } = &mut result
                        {
                            data.account = account;
                        }
                        result
                    }
                };
                next.insert(address, result);
            }
            *entries = next;
        });
    }

    /// Distinct asset ids held across all cached accounts.
    pub fn distinct_asset_ids(&self) -> BTreeSet<u64> {
        self.entries
            .borrow()
            .values()
            .filter_map(|result| result.data())
            .flat_map(|data| data.asset_ids())
            .collect()
    }

    pub fn clear(&self) {
        self.entries.send_modify(|entries| entries.clear());
    }
}

#[derive(Debug)]
pub struct AssetCacheStore {
    entries: watch::Sender<BTreeMap<u64, CacheResult<AssetDetail>>>,
}

impl Default for AssetCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetCacheStore {
    pub fn new() -> Self {
        let (entries, _) = watch::channel(BTreeMap::new());
        Self { entries }
    }

    pub fn subscribe(&self) -> watch::Receiver<BTreeMap<u64, CacheResult<AssetDetail>>> {
        self.entries.subscribe()
    }

    pub fn get(&self, asset_id: u64) -> Option<CacheResult<AssetDetail>> {
        self.entries.borrow().get(&asset_id).cloned()
    }

    /// Ids from `wanted` that have no successful entry yet.
    pub fn missing(&self, wanted: &BTreeSet<u64>) -> Vec<u64> {
        let entries = self.entries.borrow();
        wanted
            .iter()
            .copied()
            .filter(|id| !entries.get(id).is_some_and(|result| result.is_success()))
            .collect()
    }

    pub fn commit(&self, results: Vec<(u64, WalletResult<AssetDetail>)>) {
        self.entries.send_modify(|entries| {
            for (asset_id, fetched) in results {
                let result = match fetched {
                    Ok(detail) => CacheResult::success(detail),
                    Err(error) => CacheResult::error(error, entries.get(&asset_id)),
                };
                entries.insert(asset_id, result);
            }
        });
    }

    pub fn clear(&self) {
        self.entries.send_modify(|entries| entries.clear());
    }
}

/// Single cached value, such as the current price.
#[derive(Debug)]
pub struct ValueCache<T> {
    value: watch::Sender<Option<CacheResult<T>>>,
}

impl<T: Clone> Default for ValueCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> ValueCache<T> {
    pub fn new() -> Self {
        let (value, _) = watch::channel(None);
        Self { value }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CacheResult<T>>> {
        self.value.subscribe()
    }

    pub fn get(&self) -> Option<CacheResult<T>> {
        self.value.borrow().clone()
    }

    pub fn set_success(&self, data: T) {
        self.value.send_replace(Some(CacheResult::success(data)));
    }

    pub fn set_error(&self, error: WalletError) {
        self.value.send_modify(|value| {
            let next = CacheResult::error(error, value.as_ref());
            *value = Some(next);
        });
    }

    /// Commit a fetch result only if `still_current` holds at commit time.
    pub fn commit_if<F>(&self, fetched: WalletResult<T>, still_current: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        self.value.send_if_modified(|value| {
            if !still_current() {
                return false;
            }
            let next = match fetched {
                Ok(data) => CacheResult::success(data),
                Err(error) => CacheResult::error(error, value.as_ref()),
            };
            *value = Some(next);
            true
        })
    }

    pub fn clear(&self) {
        self.value.send_replace(None);
    }
}

/// Latest round seen by block polling.
#[derive(Debug)]
pub struct BlockCache {
    round: watch::Sender<Option<u64>>,
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockCache {
    pub fn new() -> Self {
        let (round, _) = watch::channel(None);
        Self { round }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<u64>> {
        self.round.subscribe()
    }

    pub fn latest_round(&self) -> Option<u64> {
        *self.round.borrow()
    }

    /// Record `round` if it is newer. Returns whether it was.
    pub fn update(&self, round: u64) -> bool {
        self.round.send_if_modified(|current| match current {
            Some(latest) if *latest >= round => false,
            _ => {
                *current = Some(round);
                true
            }
        })
    }

    pub fn clear(&self) {
        self.round.send_replace(None);
    }
}
