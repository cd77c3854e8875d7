use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::api::{CurrencyValue, MarketApi, NodeApi};
use crate::blockchain::{Address, PrivateKey};
use crate::blockchain_client::{AlgodClient, MobileApiClient};
use crate::cache::{
    AccountCacheStore, AccountDetailCacheManager, AssetCacheManager, AssetCacheStore, BlockCache,
    BlockPollingManager, ManagerLifecycle, PriceManager, ValueCache,
};
use crate::config_store::{ConfigStore, WalletConfig};
use crate::errors::{WalletError, WalletResult};
use crate::session::SessionManager;
use crate::storage::{
    AccountRegistry, AccountType, KdfParameters, LocalAccount, PreferenceStore,
    VaultCreateParams, VaultManager, VaultMetadata, VaultSecrets, VaultUnlocked, WalletPaths,
};
use crate::transaction::{KeyStore, LedgerSigner, LedgerTransport, TransactionController};

/// Everything loaded from the wallet root directory.
#[derive(Debug)]
pub struct WalletContext {
    paths: WalletPaths,
    vault: VaultManager,
    config_store: ConfigStore,
    config: WalletConfig,
    session: Arc<SessionManager>,
    accounts: Arc<AccountRegistry>,
    preferences: Arc<PreferenceStore>,
    environment: String,
}

impl WalletContext {
    pub fn initialize(root_dir: PathBuf) -> WalletResult<Self> {
        let environment =
            std::env::var("ALGO_WALLET_ENV").unwrap_or_else(|_| "development".to_string());
        let paths = WalletPaths::new(&root_dir)?;
        paths.ensure_directories()?;

        let vault = VaultManager::from_paths(&paths);
        let config_store = ConfigStore::from_paths(&paths);
        let config = config_store.load_or_default(environment.clone())?;
        let session = SessionManager::new(
            duration_from_minutes(config.session.auto_lock_minutes),
            config.session.max_failed_attempts.max(1),
        );
        let accounts = AccountRegistry::load(paths.accounts_file())?;
        let preferences = PreferenceStore::load(paths.preferences_file())?;
        log::info!(
            "wallet context ready at {} ({})",
            paths.root_dir().display(),
            environment
        );

        Ok(Self {
            paths,
            vault,
            config_store,
            config,
            session: Arc::new(session),
            accounts: Arc::new(accounts),
            preferences: Arc::new(preferences),
            environment,
        })
    }

    /// Use different key-derivation costs for the vault.
    pub fn with_kdf(mut self, kdf: KdfParameters) -> Self {
        self.vault = self.vault.with_kdf(kdf);
        self
    }

    pub fn paths(&self) -> &WalletPaths {
        &self.paths
    }

    pub fn vault(&self) -> &VaultManager {
        &self.vault
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn accounts(&self) -> &Arc<AccountRegistry> {
        &self.accounts
    }

    pub fn preferences(&self) -> &Arc<PreferenceStore> {
        &self.preferences
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn update_config<F>(&mut self, updater: F) -> WalletResult<&WalletConfig>
    where
        F: FnOnce(&mut WalletConfig) -> WalletResult<()>,
    {
        self.config = self
            .config_store
            .update(self.environment.clone(), updater)?;
        Ok(&self.config)
    }

    pub fn create_vault(&self, password: &SecretString, wallet_name: &str) -> WalletResult<()> {
        self.vault.create(VaultCreateParams {
            password,
            metadata: VaultMetadata::new(wallet_name),
            secrets: VaultSecrets::default(),
        })
    }

    pub fn unlock(&self, password: &SecretString) -> WalletResult<()> {
        match self.vault.unlock(password) {
            Ok(unlocked) => {
                self.session.unlock(unlocked);
                Ok(())
            }
            Err(WalletError::FileNotFound(path)) => Err(WalletError::FileNotFound(path)),
            Err(error) => {
                let remaining = self.session.register_failed_attempt()?;
                log::warn!("unlock failed, {} attempts remaining", remaining);
                Err(error)
            }
        }
    }

    pub fn lock(&self) {
        self.session.lock();
    }

    /// Wallet name and account addresses, readable without the password.
    pub fn wallet_metadata(&self) -> WalletResult<Option<VaultMetadata>> {
        self.vault.read_metadata()
    }

    pub fn change_password(
        &self,
        current_password: &SecretString,
        new_password: &SecretString,
    ) -> WalletResult<()> {
        self.vault.change_password(current_password, new_password)?;
        log::info!("vault password changed");
        Ok(())
    }

    /// Vault backups, newest first.
    pub fn backups(&self) -> WalletResult<Vec<PathBuf>> {
        self.vault.available_backups()
    }

    /// Replace the vault with `backup_path` and lock the session.
    pub fn restore_backup(&self, backup_path: &Path) -> WalletResult<()> {
        self.vault.restore_from_backup(backup_path)?;
        self.session.lock();
        Ok(())
    }

    /// Store a standard account's key in the vault and register the account.
    pub fn import_account(
        &self,
        password: &SecretString,
        key: &PrivateKey,
        name: &str,
    ) -> WalletResult<LocalAccount> {
        let address = key.address();
        if self.accounts.get(&address).is_some() {
            return Err(WalletError::AlreadyExists(address.as_string()));
        }

        let unlocked = self.vault.store_account_key(password, key)?;
        let account = LocalAccount::new(address, name.trim(), AccountType::Standard);
        if let Err(error) = self.accounts.add(account.clone()) {
            let rolled_back = self.vault.remove_account_key(password, &address)?;
            self.sync_session(rolled_back)?;
            return Err(error);
        }
        self.sync_session(unlocked)?;
        Ok(account)
    }

    pub fn add_ledger_account(
        &self,
        address: Address,
        name: &str,
        device_id: &str,
        account_index: u32,
    ) -> WalletResult<LocalAccount> {
        let account = LocalAccount::new(
            address,
            name.trim(),
            AccountType::Ledger {
                device_id: device_id.to_string(),
                account_index,
            },
        );
        self.accounts.add(account.clone())?;
        Ok(account)
    }

    pub fn add_watch_account(&self, address: Address, name: &str) -> WalletResult<LocalAccount> {
        let account = LocalAccount::new(address, name.trim(), AccountType::WatchOnly);
        self.accounts.add(account.clone())?;
        Ok(account)
    }

    /// Forget an account, deleting its key from the vault when it has one.
    pub fn remove_account(&self, password: &SecretString, address: &Address) -> WalletResult<()> {
        let account = self
            .accounts
            .get(address)
            .ok_or_else(|| WalletError::NotFound(address.as_string()))?;
        if account.account_type == AccountType::Standard {
            let unlocked = self.vault.remove_account_key(password, address)?;
            self.sync_session(unlocked)?;
        }
        self.accounts.remove(address)?;
        Ok(())
    }

    fn sync_session(&self, unlocked: VaultUnlocked) -> WalletResult<()> {
        if self.session.is_locked() {
            self.session.unlock(unlocked);
            Ok(())
        } else {
            self.session.refresh(unlocked)
        }
    }
}

/// Stores, polling managers and signing shared by the host for one session.
pub struct WalletServices {
    node: Arc<dyn NodeApi>,
    keys: Arc<dyn KeyStore>,
    ledger: Arc<LedgerSigner>,
    accounts: Arc<AccountRegistry>,
    preferences: Arc<PreferenceStore>,
    account_cache: Arc<AccountCacheStore>,
    asset_cache: Arc<AssetCacheStore>,
    price_cache: Arc<ValueCache<CurrencyValue>>,
    block_cache: Arc<BlockCache>,
    price: ManagerLifecycle<PriceManager>,
    blocks: ManagerLifecycle<BlockPollingManager>,
    account_details: ManagerLifecycle<AccountDetailCacheManager>,
    assets: ManagerLifecycle<AssetCacheManager>,
}

impl WalletServices {
    pub fn new(
        context: &WalletContext,
        node: Arc<dyn NodeApi>,
        market: Arc<dyn MarketApi>,
        transport: Arc<dyn LedgerTransport>,
    ) -> Self {
        let config = context.config();
        let polling = config.polling.clone();
        let accounts = context.accounts().clone();
        let preferences = context.preferences().clone();

        let account_cache = Arc::new(AccountCacheStore::new());
        let asset_cache = Arc::new(AssetCacheStore::new());
        let price_cache = Arc::new(ValueCache::new());
        let block_cache = Arc::new(BlockCache::new());

        let price = PriceManager::new(
            market.clone(),
            preferences.clone(),
            price_cache.clone(),
            polling.clone(),
        );
        let blocks = BlockPollingManager::new(
            node.clone(),
            accounts.clone(),
            block_cache.clone(),
            polling.clone(),
        );
        let account_details = AccountDetailCacheManager::new(
            node.clone(),
            accounts.clone(),
            block_cache.clone(),
            account_cache.clone(),
            preferences.clone(),
        );
        let assets = AssetCacheManager::new(
            market,
            account_cache.clone(),
            asset_cache.clone(),
            polling,
        );

        let keys: Arc<dyn KeyStore> = context.session().clone();
        Self {
            node,
            keys,
            ledger: Arc::new(LedgerSigner::new(
                transport,
                config.signing.ledger_timeout(),
            )),
            accounts,
            preferences,
            account_cache,
            asset_cache,
            price_cache,
            block_cache,
            price: ManagerLifecycle::new(Arc::new(price)),
            blocks: ManagerLifecycle::new(Arc::new(blocks)),
            account_details: ManagerLifecycle::new(Arc::new(account_details)),
            assets: ManagerLifecycle::new(Arc::new(assets)),
        }
    }

    /// Build services talking to the endpoints in the context's configuration.
    pub fn connect(
        context: &WalletContext,
        transport: Arc<dyn LedgerTransport>,
    ) -> WalletResult<Self> {
        let network = &context.config().network;
        let node = Arc::new(AlgodClient::from_config(network)?);
        let market = Arc::new(MobileApiClient::from_config(network)?);
        Ok(Self::new(context, node, market, transport))
    }

    pub async fn resume(&self) -> WalletResult<()> {
        self.price.resume().await?;
        self.blocks.resume().await?;
        self.account_details.resume().await?;
        self.assets.resume().await
    }

    pub async fn pause(&self) {
        self.assets.pause().await;
        self.account_details.pause().await;
        self.blocks.pause().await;
        self.price.pause().await;
    }

    pub async fn destroy(&self) {
        self.assets.destroy().await;
        self.account_details.destroy().await;
        self.blocks.destroy().await;
        self.price.destroy().await;
    }

    pub fn transaction_controller(&self) -> TransactionController {
        TransactionController::new(
            self.node.clone(),
            self.keys.clone(),
            self.ledger.clone(),
            self.accounts.clone(),
        )
    }

    /// Fetch the price now, replacing any fetch in flight.
    pub async fn refresh_price_cache(&self) -> WalletResult<()> {
        self.price.refresh().await
    }

    pub fn ledger(&self) -> &Arc<LedgerSigner> {
        &self.ledger
    }

    pub fn preferences(&self) -> &Arc<PreferenceStore> {
        &self.preferences
    }

    pub fn account_cache(&self) -> &Arc<AccountCacheStore> {
        &self.account_cache
    }

    pub fn asset_cache(&self) -> &Arc<AssetCacheStore> {
        &self.asset_cache
    }

    pub fn price_cache(&self) -> &Arc<ValueCache<CurrencyValue>> {
        &self.price_cache
    }

    pub fn block_cache(&self) -> &Arc<BlockCache> {
        &self.block_cache
    }
}

fn duration_from_minutes(minutes: u32) -> Duration {
    let clamped = minutes.max(1) as u64;
    Duration::from_secs(clamped.saturating_mul(60))
}
