use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use blake3::Hasher as Blake3;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{WalletError, WalletResult};
use crate::storage::WalletPaths;

const CONFIG_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub node_endpoint: String,
    pub indexer_endpoint: String,
    pub mobile_api_endpoint: String,
    #[serde(default)]
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            node_endpoint: "https://mainnet-api.algonode.cloud".to_string(),
            indexer_endpoint: "https://mainnet-idx.algonode.cloud".to_string(),
            mobile_api_endpoint: "https://mainnet.api.wallet.example".to_string(),
            api_token: None,
            request_timeout_secs: 30,
        }
    }
}

/// Delays used by the polling managers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollingConfig {
    pub price_refresh_interval_ms: u64,
    pub price_retry_delay_ms: u64,
    pub block_retry_delay_ms: u64,
    pub asset_retry_delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            price_refresh_interval_ms: 60_000,
            price_retry_delay_ms: 2_500,
            block_retry_delay_ms: 2_500,
            asset_retry_delay_ms: 2_500,
        }
    }
}

impl PollingConfig {
    pub fn price_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.price_refresh_interval_ms)
    }

    pub fn price_retry_delay(&self) -> Duration {
        Duration::from_millis(self.price_retry_delay_ms)
    }

    pub fn block_retry_delay(&self) -> Duration {
        Duration::from_millis(self.block_retry_delay_ms)
    }

    pub fn asset_retry_delay(&self) -> Duration {
        Duration::from_millis(self.asset_retry_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SigningConfig {
    pub ledger_timeout_secs: u64,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            ledger_timeout_secs: 15,
        }
    }
}

impl SigningConfig {
    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    pub auto_lock_minutes: u32,
    pub max_failed_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_lock_minutes: 15,
            max_failed_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletConfig {
    pub network: NetworkConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    pub session: SessionConfig,
    pub environment: String,
    pub last_updated: DateTime<Utc>,
    pub version: u16,
}

impl WalletConfig {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            network: NetworkConfig::default(),
            polling: PollingConfig::default(),
            signing: SigningConfig::default(),
            session: SessionConfig::default(),
            environment: environment.into(),
            last_updated: Utc::now(),
            version: CONFIG_VERSION,
        }
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEnvelope<T> {
    version: u16,
    checksum: [u8; 32],
    payload: T,
    modified_at_unix: i64,
}

/// Handles persistence of wallet configuration with integrity checks.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn from_paths(paths: &WalletPaths) -> Self {
        Self {
            path: paths.config_file().to_path_buf(),
        }
    }

    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load_or_default(&self, environment: impl Into<String>) -> WalletResult<WalletConfig> {
        match read_envelope(&self.path)? {
            Some(config) => Ok(config),
            None => {
                let config = WalletConfig::new(environment);
                self.save(&config)?;
                Ok(config)
            }
        }
    }

    pub fn save(&self, config: &WalletConfig) -> WalletResult<()> {
        let mut payload = config.clone();
        payload.touch();
        write_envelope(&self.path, &payload)
    }

    pub fn update<F>(
        &self,
        environment: impl Into<String>,
        updater: F,
    ) -> WalletResult<WalletConfig>
    where
        F: FnOnce(&mut WalletConfig) -> WalletResult<()>,
    {
        let mut config = self.load_or_default(environment)?;
        updater(&mut config)?;
        config.touch();
        self.save(&config)?;
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read a checksummed JSON envelope. Returns `None` when the file does not exist.
pub(crate) fn read_envelope<T>(path: &Path) -> WalletResult<Option<T>>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    if !path.exists() {
        return Ok(None);
    }

    let bytes = fs::read(path)?;
    let envelope: ConfigEnvelope<T> = serde_json::from_slice(&bytes)?;
    if envelope.version != CONFIG_VERSION {
        return Err(WalletError::ValidationError(format!(
            "Unsupported file version {} in {}",
            envelope.version,
            path.display()
        )));
    }

    if checksum(&envelope.payload)? != envelope.checksum {
        return Err(WalletError::ValidationError(format!(
            "Integrity verification failed for {}",
            path.display()
        )));
    }

    Ok(Some(envelope.payload))
}

/// Atomically write a checksummed JSON envelope (temp file + rename).
pub(crate) fn write_envelope<T: Serialize>(path: &Path, payload: &T) -> WalletResult<()> {
    let envelope = ConfigEnvelope {
        version: CONFIG_VERSION,
        checksum: checksum(payload)?,
        modified_at_unix: SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_err(|e| WalletError::StorageError(e.to_string()))?
            .as_secs() as i64,
        payload,
    };

    let serialized = serde_json::to_vec_pretty(&envelope)?;
    let tmp_path = path.with_extension("new");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&serialized)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

fn checksum<T: Serialize>(payload: &T) -> WalletResult<[u8; 32]> {
    let mut hasher = Blake3::new();
    let encoded = serde_json::to_vec(payload)?;
    hasher.update(&encoded);
    let mut output = [0u8; 32];
    output.copy_from_slice(hasher.finalize().as_bytes());
    Ok(output)
}
