use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::errors::{WalletError, WalletResult};

/// Manages filesystem paths used by the wallet core.
#[derive(Debug, Clone)]
pub struct WalletPaths {
    /// Root directory for wallet data.
    root_dir: PathBuf,
    /// Encrypted key vault file path.
    vault_file: PathBuf,
    /// Directory for vault backups.
    backup_dir: PathBuf,
    /// Persisted wallet configuration.
    config_file: PathBuf,
    /// Locally added accounts.
    accounts_file: PathBuf,
    /// Host preferences (currency selection, refresh timestamps).
    preferences_file: PathBuf,
}

impl WalletPaths {
    /// Default vault file name used on disk.
    pub const DEFAULT_VAULT_FILENAME: &'static str = "wallet.vault";
    /// Backup file extension appended to timestamped backups.
    pub const BACKUP_EXTENSION: &'static str = "vault.bak";

    /// Create a new path manager rooted at the provided directory.
    pub fn new(root: impl AsRef<Path>) -> WalletResult<Self> {
        let root_dir = root.as_ref().to_path_buf();
        if root_dir.as_os_str().is_empty() {
            return Err(WalletError::StorageError(
                "Wallet root directory cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            vault_file: root_dir.join(Self::DEFAULT_VAULT_FILENAME),
            backup_dir: root_dir.join("backups"),
            config_file: root_dir.join("wallet.config"),
            accounts_file: root_dir.join("accounts.json"),
            preferences_file: root_dir.join("preferences.json"),
            root_dir,
        })
    }

    /// Ensure the directory structure exists, creating missing folders.
    pub fn ensure_directories(&self) -> WalletResult<()> {
        fs::create_dir_all(&self.root_dir)?;
        fs::create_dir_all(&self.backup_dir)?;
        Ok(())
    }

    pub fn vault_file(&self) -> &Path {
        &self.vault_file
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn accounts_file(&self) -> &Path {
        &self.accounts_file
    }

    pub fn preferences_file(&self) -> &Path {
        &self.preferences_file
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Create a timestamped backup of the vault file.
    /// Returns the path to the created backup file.
    pub fn create_vault_backup(&self) -> WalletResult<PathBuf> {
        if !self.vault_file.exists() {
            return Err(WalletError::NotFound(
                "Vault file does not exist, cannot create backup".to_string(),
            ));
        }

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
        let backup_filename = format!("wallet_{}.{}", timestamp, Self::BACKUP_EXTENSION);
        let backup_path = self.backup_dir.join(backup_filename);

        fs::create_dir_all(&self.backup_dir)?;
        fs::copy(&self.vault_file, &backup_path)?;

        let original_size = fs::metadata(&self.vault_file)?.len();
        let backup_size = fs::metadata(&backup_path)?.len();
        if original_size != backup_size {
            fs::remove_file(&backup_path)?;
            return Err(WalletError::StorageError(
                "Backup verification failed: size mismatch".to_string(),
            ));
        }

        Ok(backup_path)
    }

    /// Restore the vault from a backup file, rolling back if the copy fails.
    pub fn restore_vault_from_backup(&self, backup_path: impl AsRef<Path>) -> WalletResult<()> {
        let backup_path = backup_path.as_ref();
        if !backup_path.exists() {
            return Err(WalletError::NotFound(format!(
                "Backup file does not exist: {}",
                backup_path.display()
            )));
        }

        let rollback = if self.vault_file.exists() {
            let temp_name = format!("wallet_pre_restore_{}.tmp", Utc::now().timestamp());
            let temp_path = self.backup_dir.join(temp_name);
            fs::copy(&self.vault_file, &temp_path)?;
            Some(temp_path)
        } else {
            None
        };

        match fs::copy(backup_path, &self.vault_file) {
            Ok(_) => {
                if let Some(temp_path) = rollback {
                    let _ = fs::remove_file(temp_path);
                }
                Ok(())
            }
            Err(err) => {
                if let Some(temp_path) = rollback {
                    let _ = fs::copy(&temp_path, &self.vault_file);
                    let _ = fs::remove_file(temp_path);
                }
                Err(WalletError::StorageError(format!(
                    "Failed to restore vault from backup: {}",
                    err
                )))
            }
        }
    }

    /// List all available backup files, newest first.
    pub fn list_backups(&self) -> WalletResult<Vec<PathBuf>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)? {
            let path = entry?.path();
            let is_backup = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.ends_with(Self::BACKUP_EXTENSION))
                .unwrap_or(false);
            if path.is_file() && is_backup {
                backups.push(path);
            }
        }

        // File names embed a sortable timestamp.
        backups.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(backups)
    }

    /// Delete old backups, keeping only the N most recent.
    pub fn prune_old_backups(&self, keep_count: usize) -> WalletResult<usize> {
        let backups = self.list_backups()?;
        let mut deleted_count = 0;

        for backup_path in backups.iter().skip(keep_count) {
            fs::remove_file(backup_path)?;
            deleted_count += 1;
        }

        Ok(deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_vault(paths: &WalletPaths, content: &[u8]) -> WalletResult<()> {
        paths.ensure_directories()?;
        fs::write(paths.vault_file(), content)?;
        Ok(())
    }

    #[test]
    fn test_wallet_paths_creation() {
        let temp_dir = TempDir::new().unwrap();
        let paths = WalletPaths::new(temp_dir.path()).unwrap();

        assert_eq!(
            paths.vault_file(),
            temp_dir.path().join(WalletPaths::DEFAULT_VAULT_FILENAME)
        );
        assert_eq!(paths.backup_dir(), temp_dir.path().join("backups"));
        assert_eq!(paths.accounts_file(), temp_dir.path().join("accounts.json"));
        assert_eq!(paths.config_file(), temp_dir.path().join("wallet.config"));
    }

    #[test]
    fn test_empty_root_directory_rejected() {
        match WalletPaths::new("") {
            Err(WalletError::StorageError(msg)) => assert!(msg.contains("cannot be empty")),
            other => panic!("Expected StorageError for empty root, got {:?}", other),
        }
    }

    #[test]
    fn test_backup_and_restore() {
        let temp_dir = TempDir::new().unwrap();
        let paths = WalletPaths::new(temp_dir.path()).unwrap();
        create_test_vault(&paths, b"original").unwrap();

        let backup_path = paths.create_vault_backup().unwrap();
        fs::write(paths.vault_file(), b"modified").unwrap();
        paths.restore_vault_from_backup(&backup_path).unwrap();

        assert_eq!(fs::read(paths.vault_file()).unwrap(), b"original");
    }

    #[test]
    fn test_create_backup_no_vault() {
        let temp_dir = TempDir::new().unwrap();
        let paths = WalletPaths::new(temp_dir.path()).unwrap();
        paths.ensure_directories().unwrap();

        assert!(matches!(
            paths.create_vault_backup(),
            Err(WalletError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_and_prune_backups() {
        let temp_dir = TempDir::new().unwrap();
        let paths = WalletPaths::new(temp_dir.path()).unwrap();
        create_test_vault(&paths, b"test").unwrap();

        for _ in 0..4 {
            paths.create_vault_backup().unwrap();
            thread::sleep(Duration::from_millis(5));
        }
        fs::write(paths.backup_dir().join("notes.txt"), b"not a backup").unwrap();

        let before = paths.list_backups().unwrap();
        assert_eq!(before.len(), 4);

        assert_eq!(paths.prune_old_backups(1).unwrap(), 3);
        let after = paths.list_backups().unwrap();
        assert_eq!(after, vec![before[0].clone()]);
    }
}
