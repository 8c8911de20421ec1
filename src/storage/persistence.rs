//! Vault persistence layer
//!
//! Saves and loads [`WalletSnapshot`]s as JSON, with atomic writes and
//! rotating backups. Saves are serialized, and a snapshot older than the
//! last one written for the same wallet is dropped, so the file on disk
//! never moves backwards (an executed transaction never reappears as
//! pending after a restart).

use crate::multisig::WalletSnapshot;
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub wallet_file: String,
    pub backup_enabled: bool,
    pub max_backups: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".vault_data"),
            wallet_file: "wallet.json".to_string(),
            backup_enabled: true,
            max_backups: 5,
        }
    }
}

/// Wallet snapshot storage manager
#[derive(Debug)]
pub struct Storage {
    config: StorageConfig,
    /// Address and version of the last snapshot written
    last_saved: Mutex<Option<(String, u64)>>,
}

impl Storage {
    /// Create a new storage manager
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self {
            config,
            last_saved: Mutex::new(None),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the wallet file path
    fn wallet_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.wallet_file)
    }

    /// Get a backup file path
    fn backup_path(&self, index: usize) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.backup.{}", self.config.wallet_file, index))
    }

    /// Save a snapshot to disk
    ///
    /// Returns `false` without writing when a newer snapshot of the same
    /// wallet has already been saved.
    pub fn save(&self, snapshot: &WalletSnapshot) -> Result<bool, StorageError> {
        let mut last_saved = self
            .last_saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some((address, version)) = last_saved.as_ref() {
            if *address == snapshot.address && snapshot.version < *version {
                log::debug!(
                    "Skipping stale snapshot of {} (version {} < {})",
                    address,
                    snapshot.version,
                    version
                );
                return Ok(false);
            }
        }

        let path = self.wallet_path();

        if self.config.backup_enabled && self.config.max_backups > 0 && path.exists() {
            self.rotate_backups()?;
            fs::copy(&path, self.backup_path(0))?;
        }

        // Unique temporary file in the same directory, then atomic rename
        let mut temp = NamedTempFile::new_in(&self.config.data_dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, snapshot)?;
            writer.flush()?;
        }
        temp.persist(&path).map_err(|e| e.error)?;

        *last_saved = Some((snapshot.address.clone(), snapshot.version));
        log::debug!(
            "Saved wallet {} (version {}) to {:?}",
            snapshot.address,
            snapshot.version,
            path
        );
        Ok(true)
    }

    /// Load the snapshot from disk
    pub fn load(&self) -> Result<WalletSnapshot, StorageError> {
        let path = self.wallet_path();

        if !path.exists() {
            return Err(StorageError::InvalidData(
                "Wallet file not found".to_string(),
            ));
        }

        load_from_file(&path)
    }

    /// Check if a saved wallet exists
    pub fn exists(&self) -> bool {
        self.wallet_path().exists()
    }

    /// Delete the saved wallet
    pub fn delete(&self) -> Result<(), StorageError> {
        let path = self.wallet_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Rotate backup files
    fn rotate_backups(&self) -> Result<(), StorageError> {
        // Delete oldest backup
        let oldest = self.backup_path(self.config.max_backups - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        // Shift existing backups
        for i in (0..self.config.max_backups - 1).rev() {
            let current = self.backup_path(i);
            if current.exists() {
                fs::rename(&current, self.backup_path(i + 1))?;
            }
        }

        Ok(())
    }

    /// Load a backup snapshot
    pub fn restore_backup(&self, backup_index: usize) -> Result<WalletSnapshot, StorageError> {
        let backup_path = self.backup_path(backup_index);

        if !backup_path.exists() {
            return Err(StorageError::InvalidData(format!(
                "Backup {} not found",
                backup_index
            )));
        }

        load_from_file(&backup_path)
    }

    /// List available backups
    pub fn list_backups(&self) -> Vec<usize> {
        (0..self.config.max_backups)
            .filter(|&i| self.backup_path(i).exists())
            .collect()
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats, StorageError> {
        let path = self.wallet_path();

        let file_size = if path.exists() {
            fs::metadata(&path)?.len()
        } else {
            0
        };

        Ok(StorageStats {
            file_size,
            backup_count: self.list_backups().len(),
            data_dir: self.config.data_dir.clone(),
        })
    }
}

/// Storage statistics
#[derive(Debug)]
pub struct StorageStats {
    pub file_size: u64,
    pub backup_count: usize,
    pub data_dir: PathBuf,
}

/// Save a snapshot to a specific file path
pub fn save_to_file(snapshot: &WalletSnapshot, path: &Path) -> Result<(), StorageError> {
    let file = fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, snapshot)?;
    Ok(())
}

/// Load a snapshot from a specific file path
pub fn load_from_file(path: &Path) -> Result<WalletSnapshot, StorageError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}
