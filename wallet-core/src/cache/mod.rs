//! Lifecycle-scoped caches kept fresh by polling managers.

pub mod account_detail;
pub mod asset;
pub mod block;
pub mod lifecycle;
pub mod price;
pub mod result;
pub mod store;

pub use account_detail::AccountDetailCacheManager;
pub use asset::AssetCacheManager;
pub use block::BlockPollingManager;
pub use lifecycle::{restart_job, stop_job, JobSlot, LifecycleState, Manager, ManagerLifecycle};
pub use price::PriceManager;
pub use result::CacheResult;
pub use store::{
    AccountCacheData, AccountCacheStatus, AccountCacheStore, AccountEntries, AssetCacheStore,
    BlockCache, ValueCache,
};
