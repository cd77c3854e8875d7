use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config_store::{read_envelope, write_envelope};
use crate::errors::WalletResult;
use crate::validation::InputValidator;

pub const DEFAULT_CURRENCY: &str = "USD";

/// Account refreshes closer together than this are not written to disk.
pub const ACCOUNT_REFRESH_RECORD_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub currency_id: String,
    #[serde(default)]
    pub last_price_refresh: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_account_refresh: Option<DateTime<Utc>>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            currency_id: DEFAULT_CURRENCY.to_string(),
            last_price_refresh: None,
            last_account_refresh: None,
        }
    }
}

/// Key-value style preferences the host can change at runtime.
///
/// The selected currency is published on its own channel so price
/// consumers only wake up when it actually changes.
#[derive(Debug)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    state: Mutex<Preferences>,
    currency: watch::Sender<String>,
    validator: InputValidator,
}

impl PreferenceStore {
    pub fn load(path: impl AsRef<Path>) -> WalletResult<Self> {
        let path = path.as_ref().to_path_buf();
        let prefs: Preferences = read_envelope(&path)?.unwrap_or_default();
        Self::build(Some(path), prefs)
    }

    pub fn in_memory(prefs: Preferences) -> WalletResult<Self> {
        Self::build(None, prefs)
    }

    fn build(path: Option<PathBuf>, prefs: Preferences) -> WalletResult<Self> {
        let (currency, _) = watch::channel(prefs.currency_id.clone());
        Ok(Self {
            path,
            state: Mutex::new(prefs),
            currency,
            validator: InputValidator::new()?,
        })
    }

    pub fn currency(&self) -> String {
        self.currency.borrow().clone()
    }

    pub fn subscribe_currency(&self) -> watch::Receiver<String> {
        self.currency.subscribe()
    }

    pub fn set_currency(&self, currency_id: &str) -> WalletResult<()> {
        self.validator.validate_currency(currency_id)?;
        self.update(|prefs| prefs.currency_id = currency_id.to_string())?;
        let changed = self.currency.send_if_modified(|current| {
            if current == currency_id {
                false
            } else {
                *current = currency_id.to_string();
                true
            }
        });
        if changed {
            log::info!("currency preference changed to {}", currency_id);
        }
        Ok(())
    }

    pub fn mark_price_refreshed(&self) -> WalletResult<()> {
        self.update(|prefs| prefs.last_price_refresh = Some(Utc::now()))
    }

    /// Record an account refresh. Returns false when a recent record made
    /// this one redundant.
    pub fn mark_accounts_refreshed(&self) -> WalletResult<bool> {
        let now = Utc::now();
        let recent = self
            .state
            .lock()
            .last_account_refresh
            .is_some_and(|last| (now - last).num_seconds() < ACCOUNT_REFRESH_RECORD_SECS);
        if recent {
            return Ok(false);
        }
        self.update(|prefs| prefs.last_account_refresh = Some(now))?;
        Ok(true)
    }

    pub fn snapshot(&self) -> Preferences {
        self.state.lock().clone()
    }

    fn update<F: FnOnce(&mut Preferences)>(&self, op: F) -> WalletResult<()> {
        let mut state = self.state.lock();
        op(&mut state);
        if let Some(path) = &self.path {
            write_envelope(path, &*state)?;
        }
        Ok(())
    }
}
