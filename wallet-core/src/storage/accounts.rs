use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::blockchain::Address;
use crate::config_store::{read_envelope, write_envelope};
use crate::errors::{WalletError, WalletResult};
use crate::validation::InputValidator;

/// How an account's transactions get authorized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccountType {
    /// Key material lives in the local vault.
    Standard,
    /// Key material lives on a paired Ledger device.
    Ledger {
        device_id: String,
        account_index: u32,
    },
    /// Tracked without any signing capability.
    WatchOnly,
}

impl AccountType {
    pub fn can_sign(&self) -> bool {
        !matches!(self, AccountType::WatchOnly)
    }
}

/// An account the user added to this wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAccount {
    pub address: Address,
    pub name: String,
    pub account_type: AccountType,
    pub created_at: DateTime<Utc>,
}

impl LocalAccount {
    pub fn new(address: Address, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            address,
            name: name.into(),
            account_type,
            created_at: Utc::now(),
        }
    }
}

/// Persisted list of locally known accounts.
///
/// Consumers subscribe to the account list; every mutation publishes a new
/// snapshot after it has been written to disk.
#[derive(Debug)]
pub struct AccountRegistry {
    path: Option<PathBuf>,
    accounts: watch::Sender<Vec<LocalAccount>>,
    write_lock: Mutex<()>,
    validator: InputValidator,
}

impl AccountRegistry {
    /// Load the registry from disk, starting empty when the file is missing.
    pub fn load(path: impl AsRef<Path>) -> WalletResult<Self> {
        let path = path.as_ref().to_path_buf();
        let accounts: Vec<LocalAccount> = read_envelope(&path)?.unwrap_or_default();
        log::info!("loaded {} local accounts", accounts.len());
        Self::build(Some(path), accounts)
    }

    /// Registry that never touches the filesystem.
    pub fn in_memory(accounts: Vec<LocalAccount>) -> WalletResult<Self> {
        Self::build(None, accounts)
    }

    fn build(path: Option<PathBuf>, accounts: Vec<LocalAccount>) -> WalletResult<Self> {
        let (sender, _) = watch::channel(accounts);
        Ok(Self {
            path,
            accounts: sender,
            write_lock: Mutex::new(()),
            validator: InputValidator::new()?,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<LocalAccount>> {
        self.accounts.subscribe()
    }

    pub fn accounts(&self) -> Vec<LocalAccount> {
        self.accounts.borrow().clone()
    }

    pub fn get(&self, address: &Address) -> Option<LocalAccount> {
        self.accounts
            .borrow()
            .iter()
            .find(|account| account.address == *address)
            .cloned()
    }

    pub fn add(&self, account: LocalAccount) -> WalletResult<()> {
        self.validator.validate_account_name(&account.name)?;
        self.mutate(|accounts| {
            if accounts.iter().any(|a| a.address == account.address) {
                return Err(WalletError::AlreadyExists(account.address.as_string()));
            }
            log::info!("adding local account {}", account.address.short());
            accounts.push(account);
            Ok(())
        })
    }

    pub fn remove(&self, address: &Address) -> WalletResult<LocalAccount> {
        self.mutate(|accounts| {
            let index = accounts
                .iter()
                .position(|a| a.address == *address)
                .ok_or_else(|| WalletError::NotFound(address.as_string()))?;
            log::info!("removing local account {}", address.short());
            Ok(accounts.remove(index))
        })
    }

    pub fn rename(&self, address: &Address, name: &str) -> WalletResult<()> {
        self.validator.validate_account_name(name)?;
        self.mutate(|accounts| {
            let account = accounts
                .iter_mut()
                .find(|a| a.address == *address)
                .ok_or_else(|| WalletError::NotFound(address.as_string()))?;
            account.name = name.trim().to_string();
            Ok(())
        })
    }

    /// Drop every account, e.g. when the wallet is reset.
    pub fn clear(&self) -> WalletResult<()> {
        self.mutate(|accounts| {
            accounts.clear();
            Ok(())
        })
    }

    fn mutate<F, T>(&self, op: F) -> WalletResult<T>
    where
        F: FnOnce(&mut Vec<LocalAccount>) -> WalletResult<T>,
    {
        let _guard = self.write_lock.lock();
        let mut next = self.accounts.borrow().clone();
        let output = op(&mut next)?;
        if let Some(path) = &self.path {
            write_envelope(path, &next)?;
        }
        self.accounts.send_replace(next);
        Ok(output)
    }
}
