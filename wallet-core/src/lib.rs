// lib.rs - Core library structure for the wallet

pub mod api;
pub mod app_state;
pub mod blockchain;
pub mod blockchain_client;
pub mod cache;
pub mod config_store;
pub mod errors;
pub mod session;
pub mod storage;
pub mod transaction;
pub mod validation;

// Re-export common types
pub use api::types::*;
pub use api::{MarketApi, NodeApi};
pub use app_state::{WalletContext, WalletServices};
pub use blockchain::{Address, Amount, PrivateKey, PublicKey};
pub use blockchain_client::{AlgodClient, MobileApiClient};
pub use cache::{
    AccountCacheData, AccountCacheStatus, CacheResult, LifecycleState, Manager, ManagerLifecycle,
};
pub use config_store::{
    ConfigStore, NetworkConfig, PollingConfig, SessionConfig, SigningConfig, WalletConfig,
};
pub use errors::{WalletError, WalletResult};
pub use session::SessionManager;
pub use storage::{
    AccountRegistry, AccountType, LocalAccount, PreferenceStore, VaultCreateParams, VaultManager,
    VaultMetadata, VaultSecrets, VaultUnlocked,
};
pub use transaction::{
    ControllerState, LedgerSigner, LedgerTransport, SignedTransactionDetail, TransactionController,
    TransactionDraft,
};
pub use validation::InputValidator;
