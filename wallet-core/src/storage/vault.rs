use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use argon2::{Algorithm, Argon2, Params, Version};
use blake3::Hasher as Blake3;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use super::WalletPaths;
use crate::blockchain::{Address, PrivateKey};
use crate::errors::{WalletError, WalletResult};

const VAULT_MAGIC: &[u8; 8] = b"ALGOVLT1";
const VAULT_VERSION: u16 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const MAX_VAULT_BACKUPS: usize = 10;

/// Metadata stored alongside encrypted key material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VaultMetadata {
    /// Human-readable wallet name.
    pub wallet_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u16,
    /// Addresses whose keys are stored, readable without unlocking.
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl VaultMetadata {
    pub fn new(wallet_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            wallet_name: wallet_name.into(),
            created_at: now,
            updated_at: now,
            schema_version: VAULT_VERSION,
            addresses: Vec::new(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// One standard account's signing key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct AccountKey {
    pub address: String,
    pub secret_key: Vec<u8>,
}

impl AccountKey {
    pub fn from_private_key(key: &PrivateKey) -> Self {
        Self {
            address: key.address().as_string(),
            secret_key: key.secret_bytes().to_vec(),
        }
    }
}

/// Secrets encrypted within the vault.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct VaultSecrets {
    pub account_keys: Vec<AccountKey>,
}

impl VaultSecrets {
    pub fn new(account_keys: Vec<AccountKey>) -> Self {
        Self { account_keys }
    }

    /// Insert or replace the key stored for the key's address.
    pub fn upsert(&mut self, key: AccountKey) {
        self.account_keys.retain(|existing| existing.address != key.address);
        self.account_keys.push(key);
    }

    pub fn remove(&mut self, address: &Address) -> bool {
        let target = address.as_string();
        let before = self.account_keys.len();
        self.account_keys.retain(|existing| existing.address != target);
        before != self.account_keys.len()
    }

    pub fn private_key(&self, address: &Address) -> WalletResult<PrivateKey> {
        let target = address.as_string();
        let entry = self
            .account_keys
            .iter()
            .find(|key| key.address == target)
            .ok_or_else(|| WalletError::MissingSigningKey(target.clone()))?;
        let key = PrivateKey::from_bytes(&entry.secret_key)?;
        if key.address() != *address {
            return Err(WalletError::InvalidKey(format!(
                "Stored key does not derive {}",
                target
            )));
        }
        Ok(key)
    }

    fn addresses(&self) -> Vec<String> {
        self.account_keys
            .iter()
            .map(|key| key.address.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VaultFile {
    magic: [u8; 8],
    version: u16,
    nonce: [u8; NONCE_LEN],
    kdf: KdfParameters,
    checksum: [u8; 32],
    ciphertext: Vec<u8>,
    metadata: VaultMetadata,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct KdfParameters {
    pub m_cost_kib: u32,
    pub t_cost: u32,
    pub p_cost: u32,
    salt: [u8; SALT_LEN],
}

impl Default for KdfParameters {
    fn default() -> Self {
        Self {
            m_cost_kib: 256 * 1024, // 256 MiB
            t_cost: 4,
            p_cost: 1,
            salt: [0u8; SALT_LEN],
        }
    }
}

impl KdfParameters {
    /// Cheap parameters for tests and constrained devices.
    pub fn interactive() -> Self {
        Self {
            m_cost_kib: 8 * 1024,
            t_cost: 1,
            ..Self::default()
        }
    }
}

/// Parameters required to write a vault on disk.
pub struct VaultCreateParams<'a> {
    pub password: &'a SecretString,
    pub metadata: VaultMetadata,
    pub secrets: VaultSecrets,
}

/// Result returned after successfully unlocking a vault.
#[derive(Debug, Clone)]
pub struct VaultUnlocked {
    pub metadata: VaultMetadata,
    pub secrets: VaultSecrets,
}

/// Handles persistence and encryption of the key vault file.
#[derive(Debug, Clone)]
pub struct VaultManager {
    vault_path: PathBuf,
    wallet_paths: Option<WalletPaths>,
    kdf: KdfParameters,
}

impl VaultManager {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            vault_path: path.as_ref().to_path_buf(),
            wallet_paths: None,
            kdf: KdfParameters::default(),
        }
    }

    pub fn from_paths(paths: &WalletPaths) -> Self {
        Self {
            vault_path: paths.vault_file().to_path_buf(),
            wallet_paths: Some(paths.clone()),
            kdf: KdfParameters::default(),
        }
    }

    pub fn with_kdf(mut self, kdf: KdfParameters) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn vault_path(&self) -> &Path {
        &self.vault_path
    }

    /// Create a new encrypted vault on disk. Fails if a vault already exists.
    pub fn create(&self, params: VaultCreateParams<'_>) -> WalletResult<()> {
        if self.vault_path.exists() {
            return Err(WalletError::AlreadyExists(
                self.vault_path.display().to_string(),
            ));
        }
        self.write(params)
    }

    /// Overwrite an existing vault file with new secrets and metadata.
    pub fn update(&self, params: VaultCreateParams<'_>) -> WalletResult<()> {
        self.snapshot_existing_vault()?;
        self.write(params)
    }

    /// Unlock the vault and return decrypted secrets.
    pub fn unlock(&self, password: &SecretString) -> WalletResult<VaultUnlocked> {
        let vault_file = self.read_vault_file()?;
        let plaintext = self.decrypt_payload(password, &vault_file)?;
        if blake3_checksum(&plaintext) != vault_file.checksum {
            return Err(WalletError::ValidationError(
                "Vault integrity verification failed".to_string(),
            ));
        }

        let secrets: VaultSecrets = serde_json::from_slice(&plaintext)?;
        Ok(VaultUnlocked {
            metadata: vault_file.metadata,
            secrets,
        })
    }

    /// Add (or replace) a standard account key, re-encrypting the vault.
    pub fn store_account_key(
        &self,
        password: &SecretString,
        key: &PrivateKey,
    ) -> WalletResult<VaultUnlocked> {
        let mut unlocked = self.unlock(password)?;
        unlocked.secrets.upsert(AccountKey::from_private_key(key));
        self.rewrite(password, unlocked)
    }

    /// Remove an account key, re-encrypting the vault.
    pub fn remove_account_key(
        &self,
        password: &SecretString,
        address: &Address,
    ) -> WalletResult<VaultUnlocked> {
        let mut unlocked = self.unlock(password)?;
        if !unlocked.secrets.remove(address) {
            return Err(WalletError::NotFound(address.as_string()));
        }
        self.rewrite(password, unlocked)
    }

    /// Read vault metadata without decrypting secrets.
    pub fn read_metadata(&self) -> WalletResult<Option<VaultMetadata>> {
        if !self.exists() {
            return Ok(None);
        }
        Ok(Some(self.read_vault_file()?.metadata))
    }

    /// Change the password by re-encrypting the existing vault with a new password.
    pub fn change_password(
        &self,
        current_password: &SecretString,
        new_password: &SecretString,
    ) -> WalletResult<()> {
        let unlocked = self.unlock(current_password)?;
        let mut metadata = unlocked.metadata.clone();
        metadata.touch();
        self.update(VaultCreateParams {
            password: new_password,
            metadata,
            secrets: unlocked.secrets.clone(),
        })
    }

    pub fn exists(&self) -> bool {
        self.vault_path.exists()
    }

    /// List available vault backups ordered by newest first.
    pub fn available_backups(&self) -> WalletResult<Vec<PathBuf>> {
        match &self.wallet_paths {
            Some(paths) => paths.list_backups(),
            None => Ok(Vec::new()),
        }
    }

    /// Restore the vault state from a specific backup file.
    pub fn restore_from_backup(&self, backup_path: &Path) -> WalletResult<()> {
        let paths = self.wallet_paths.as_ref().ok_or_else(|| {
            WalletError::StorageError("Vault manager configured without wallet paths".to_string())
        })?;
        paths.restore_vault_from_backup(backup_path)
    }

    fn rewrite(
        &self,
        password: &SecretString,
        unlocked: VaultUnlocked,
    ) -> WalletResult<VaultUnlocked> {
        let mut metadata = unlocked.metadata.clone();
        metadata.touch();
        metadata.addresses = unlocked.secrets.addresses();
        self.update(VaultCreateParams {
            password,
            metadata: metadata.clone(),
            secrets: unlocked.secrets.clone(),
        })?;
        Ok(VaultUnlocked {
            metadata,
            secrets: unlocked.secrets,
        })
    }

    fn write(&self, params: VaultCreateParams<'_>) -> WalletResult<()> {
        let mut file = create_atomic_file(&self.vault_path)?;
        let encrypted = self.encrypt_payload(params)?;
        let serialized = serde_json::to_vec(&encrypted)?;
        file.write_all(&serialized)?;
        file.sync_all()?;
        finalize_atomic_file(file, &self.vault_path)
    }

    fn read_vault_file(&self) -> WalletResult<VaultFile> {
        let bytes = fs::read(&self.vault_path)?;
        let vault_file: VaultFile = serde_json::from_slice(&bytes)?;

        if &vault_file.magic != VAULT_MAGIC {
            return Err(WalletError::ValidationError(
                "Invalid vault magic marker".to_string(),
            ));
        }

        if vault_file.version != VAULT_VERSION {
            return Err(WalletError::ValidationError(format!(
                "Unsupported vault version: {}",
                vault_file.version
            )));
        }

        Ok(vault_file)
    }

    fn encrypt_payload(&self, params: VaultCreateParams<'_>) -> WalletResult<VaultFile> {
        let mut rng = OsRng;
        let mut salt = [0u8; SALT_LEN];
        rng.fill_bytes(&mut salt);

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut nonce_bytes);

        let kdf_params = KdfParameters { salt, ..self.kdf };

        let key = derive_key(params.password, &kdf_params)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut metadata = params.metadata;
        metadata.addresses = params.secrets.addresses();

        let json_secrets = Zeroizing::new(serde_json::to_vec(&params.secrets)?);
        let checksum = blake3_checksum(&json_secrets);
        let ciphertext = encrypt_aes_gcm(&key, nonce, &json_secrets)?;

        Ok(VaultFile {
            magic: *VAULT_MAGIC,
            version: VAULT_VERSION,
            nonce: nonce_bytes,
            kdf: kdf_params,
            checksum,
            ciphertext,
            metadata,
        })
    }

    fn decrypt_payload(
        &self,
        password: &SecretString,
        vault_file: &VaultFile,
    ) -> WalletResult<Zeroizing<Vec<u8>>> {
        let key = derive_key(password, &vault_file.kdf)?;
        let nonce = Nonce::assume_unique_for_key(vault_file.nonce);
        decrypt_aes_gcm(&key, nonce, &vault_file.ciphertext)
    }

    fn snapshot_existing_vault(&self) -> WalletResult<()> {
        if let Some(paths) = &self.wallet_paths {
            if self.exists() {
                let backup_path = paths.create_vault_backup()?;
                log::debug!("vault snapshot written to {}", backup_path.display());
                let pruned = paths.prune_old_backups(MAX_VAULT_BACKUPS)?;
                if pruned > 0 {
                    log::debug!("pruned {} old vault snapshots", pruned);
                }
            }
        }
        Ok(())
    }
}

fn derive_key(
    password: &SecretString,
    params: &KdfParameters,
) -> WalletResult<Zeroizing<[u8; KEY_LEN]>> {
    let argon_params = Params::new(
        params.m_cost_kib,
        params.t_cost,
        params.p_cost,
        Some(KEY_LEN),
    )
    .map_err(|e| WalletError::CryptoError(format!("Invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(
            password.expose_secret().as_bytes(),
            &params.salt,
            &mut key[..],
        )
        .map_err(|e| WalletError::CryptoError(format!("KDF failed: {e}")))?;
    Ok(key)
}

fn encrypt_aes_gcm(
    key: &Zeroizing<[u8; KEY_LEN]>,
    nonce: Nonce,
    plaintext: &[u8],
) -> WalletResult<Vec<u8>> {
    let unbound_key = UnboundKey::new(&aead::AES_256_GCM, &key[..])
        .map_err(|e| WalletError::CryptoError(format!("Invalid encryption key: {e}")))?;
    let key = LessSafeKey::new(unbound_key);

    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| WalletError::CryptoError("Encryption failure".to_string()))?;
    Ok(in_out)
}

fn decrypt_aes_gcm(
    key: &Zeroizing<[u8; KEY_LEN]>,
    nonce: Nonce,
    ciphertext: &[u8],
) -> WalletResult<Zeroizing<Vec<u8>>> {
    let unbound_key = UnboundKey::new(&aead::AES_256_GCM, &key[..])
        .map_err(|e| WalletError::CryptoError(format!("Invalid encryption key: {e}")))?;
    let key = LessSafeKey::new(unbound_key);

    if ciphertext.len() < aead::AES_256_GCM.tag_len() {
        return Err(WalletError::CryptoError(
            "Ciphertext shorter than authentication tag".to_string(),
        ));
    }

    let mut in_out = Zeroizing::new(ciphertext.to_vec());
    let plaintext_len = key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| WalletError::CryptoError("Decryption failure".to_string()))?
        .len();
    in_out.truncate(plaintext_len);
    Ok(in_out)
}

fn blake3_checksum(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake3::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(hasher.finalize().as_bytes());
    output
}

fn create_atomic_file(path: &Path) -> WalletResult<File> {
    let dir = path
        .parent()
        .ok_or_else(|| WalletError::StorageError("Invalid vault path".to_string()))?;
    fs::create_dir_all(dir)?;
    let tmp_path = path.with_extension("new");
    Ok(File::create(&tmp_path)?)
}

fn finalize_atomic_file(mut file: File, final_path: &Path) -> WalletResult<()> {
    file.flush()?;
    drop(file);
    let tmp_path = final_path.with_extension("new");
    fs::rename(tmp_path, final_path)?;
    Ok(())
}
