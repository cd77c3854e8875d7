pub mod accounts;
pub mod paths;
pub mod preferences;
pub mod vault;

pub use accounts::{AccountRegistry, AccountType, LocalAccount};
pub use paths::WalletPaths;
pub use preferences::{PreferenceStore, Preferences};
pub use vault::{
    AccountKey, KdfParameters, VaultCreateParams, VaultManager, VaultMetadata, VaultSecrets,
    VaultUnlocked,
};
