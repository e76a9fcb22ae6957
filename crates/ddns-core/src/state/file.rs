// # File Record Store
//
// File-based implementation of RecordStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: JSON parse failures on load
// - Automatic backup: Keeps .backup of the previous good file
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "records": [
//     {
//       "api_token": "…",
//       "record_name": "home.example.com",
//       "proxied": false,
//       "zone_id": "023e105f4ecef8ad9ca31a8372d0c353",
//       "record_id": "372e67954025e0ba6aaa6d586b9e0b59",
//       "enabled": true,
//       "created_at": "2025-01-09T12:00:00Z",
//       "last_updated": "2025-01-09T12:05:00Z",
//       "last_ip": "203.0.113.7",
//       "notes": ""
//     }
//   ],
//   "web": { "port": 8082, "session_timeout": 60 },
//   "update_interval": 5,
//   "auto_update": true,
//   "default_api_token": ""
// }
// ```
//
// The file holds provider credentials, so it is written owner-only on Unix.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::Inventory;
use crate::error::Error;
use crate::traits::RecordStore;

/// File-based record store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use ddns_core::state::FileRecordStore;
/// use ddns_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileRecordStore::new("/var/lib/ddns/ddns.json").await?;
///
///     let mut inventory = store.load().await?;
///     inventory.auto_update = true;
///     store.save(&inventory).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    path: PathBuf,
}

impl FileRecordStore {
    /// Create a file record store, creating parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::persistence(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        Ok(Self { path })
    }

    /// Path of the record-set file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load the main file
    /// 2. If it does not parse, try the backup and restore the main file from it
    /// 3. If the backup is missing or also broken, report the original error
    ///
    /// Unlike a cache, the record set cannot be silently replaced with an empty
    /// one: that would drop every managed record on the next save.
    async fn load_with_recovery(&self) -> Result<Inventory, Error> {
        let err = match Self::load_file(&self.path).await {
            Ok(inventory) => {
                tracing::debug!(
                    "Loaded record set from {}: {} records",
                    self.path.display(),
                    inventory.records.len()
                );
                return Ok(inventory);
            }
            Err(e @ Error::Json(_)) => e,
            Err(e) => return Err(e),
        };

        tracing::warn!(
            "Record set file appears corrupted: {}. Attempting recovery from backup.",
            err
        );

        let backup_path = Self::backup_path(&self.path);
        if !backup_path.exists() {
            return Err(Error::persistence(format!(
                "Failed to parse {}: {}. No backup file found.",
                self.path.display(),
                err
            )));
        }

        match Self::load_file(&backup_path).await {
            Ok(inventory) => {
                tracing::info!(
                    "Recovered record set from backup: {} records",
                    inventory.records.len()
                );
                if let Err(restore_err) = fs::copy(&backup_path, &self.path).await {
                    tracing::error!(
                        "Failed to restore record set file from backup: {}",
                        restore_err
                    );
                }
                Ok(inventory)
            }
            Err(backup_err) => Err(Error::persistence(format!(
                "Failed to parse {} ({}) and its backup ({})",
                self.path.display(),
                err,
                backup_err
            ))),
        }
    }

    /// Load from one file; absent means empty
    async fn load_file(path: &Path) -> Result<Inventory, Error> {
        if !path.exists() {
            tracing::debug!("Record set file does not exist: {}", path.display());
            return Ok(Inventory::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::persistence(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Inventory::from_json(&content)
    }

    /// Write the inventory atomically
    async fn write_file(&self, inventory: &Inventory) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(inventory)
            .map_err(|e| Error::persistence(format!("Failed to serialize record set: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        restrict_permissions(&temp_path).await?;

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::persistence(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Record set written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| {
            Error::persistence(format!(
                "Failed to set permissions on {}: {}",
                path.display(),
                e
            ))
        })
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), Error> {
    Ok(())
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn load(&self) -> Result<Inventory, Error> {
        self.load_with_recovery().await
    }

    async fn save(&self, inventory: &Inventory) -> Result<(), Error> {
        self.write_file(inventory).await
    }
}
