// # File Stores
//
// File-based implementations of WhitelistStore and ConfigStore.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good file
// - Recovery: Falls back to backup if corruption detected
//
// ## Whitelist File Format
//
// ```json
// {
//   "version": "1.0",
//   "updated_at": "2025-01-09T12:00:00Z",
//   "entries": ["76561198000000000", "slg123"]
// }
// ```
//
// The config file is the plain JSON form of `WhitelistConfig`.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::WhitelistConfig;
use crate::traits::{ConfigStore, WhitelistStore};

/// Whitelist file format version
const WHITELIST_FILE_VERSION: &str = "1.0";

/// Serializable whitelist file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct WhitelistFileFormat {
    version: String,
    updated_at: chrono::DateTime<chrono::Utc>,
    entries: Vec<String>,
}

/// A JSON document on disk with atomic replace and backup recovery
#[derive(Debug, Clone)]
struct JsonFile {
    path: PathBuf,
    make_error: fn(String) -> Error,
}

impl JsonFile {
    fn new(path: PathBuf, make_error: fn(String) -> Error) -> Self {
        Self { path, make_error }
    }

    fn error(&self, msg: String) -> Error {
        (self.make_error)(msg)
    }

    /// Create the parent directory if it doesn't exist
    async fn ensure_parent(&self) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    self.error(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Load the document with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main file
    /// 2. If JSON parse error, try loading backup
    /// 3. If backup also fails, start empty
    async fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, Error> {
        match Self::read_file(&self.path).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(parse_err)) => {
                tracing::warn!(
                    "{} appears corrupted: {}. Attempting recovery from backup.",
                    self.path.display(),
                    parse_err
                );

                let backup_path = self.backup_path();
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting empty.");
                    return Ok(None);
                }

                match Self::read_file::<T>(&backup_path).await {
                    Ok(Ok(value)) => {
                        tracing::info!("Recovered {} from backup", self.path.display());
                        if let Err(e) = fs::copy(&backup_path, &self.path).await {
                            tracing::error!("Failed to restore file from backup: {}", e);
                        }
                        Ok(value)
                    }
                    Ok(Err(e)) => {
                        tracing::error!("Backup also corrupted: {}. Starting empty.", e);
                        Ok(None)
                    }
                    Err(e) => Err(self.error(format!(
                        "Failed to read backup {}: {}",
                        backup_path.display(),
                        e
                    ))),
                }
            }
            Err(e) => Err(self.error(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Read and parse a file; the outer error is I/O, the inner one parsing
    async fn read_file<T: DeserializeOwned>(
        path: &Path,
    ) -> std::io::Result<Result<Option<T>, serde_json::Error>> {
        if !path.exists() {
            tracing::debug!("File does not exist: {}", path.display());
            return Ok(Ok(None));
        }

        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content).map(Some))
    }

    /// Write the document atomically
    async fn write<T: Serialize>(&self, value: &T) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| self.error(format!("Failed to serialize: {}", e)))?;

        self.ensure_parent().await?;

        // Write to temporary file first
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                self.error(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                self.error(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                self.error(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Create backup of current file (if it exists)
        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, self.backup_path()).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            self.error(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Written {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(&self) -> PathBuf {
        let mut backup = self.path.clone();
        backup.set_extension("backup");
        backup
    }
}

/// File-backed whitelist
///
/// `replace` only changes the in-memory list; `persist` writes it to disk
/// if it changed since the last write.
///
/// # Example
///
/// ```rust,no_run
/// use whitelist_core::state::FileWhitelistStore;
/// use whitelist_core::traits::WhitelistStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileWhitelistStore::new("/var/lib/whitelist/whitelist.json").await?;
///
///     store.replace(vec!["76561198000000000".to_string()]).await?;
///     store.persist().await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileWhitelistStore {
    file: JsonFile,
    state: Arc<RwLock<WhitelistState>>,
}

#[derive(Debug)]
struct WhitelistState {
    entries: Vec<String>,
    dirty: bool,
}

impl FileWhitelistStore {
    /// Create or load a file-backed whitelist
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = JsonFile::new(path.as_ref().to_path_buf(), Error::WhitelistStore);
        file.ensure_parent().await?;

        let entries = file
            .load::<WhitelistFileFormat>()
            .await?
            .map(|loaded| {
                if loaded.version != WHITELIST_FILE_VERSION {
                    tracing::warn!(
                        "Whitelist file version mismatch: expected {}, got {}. \
                        Attempting to load anyway.",
                        WHITELIST_FILE_VERSION,
                        loaded.version
                    );
                }
                loaded.entries
            })
            .unwrap_or_default();

        tracing::debug!("Loaded whitelist: {} entries", entries.len());

        Ok(Self {
            file,
            state: Arc::new(RwLock::new(WhitelistState {
                entries,
                dirty: false,
            })),
        })
    }

    /// Path of the whitelist file
    pub fn path(&self) -> &Path {
        &self.file.path
    }
}

#[async_trait]
impl WhitelistStore for FileWhitelistStore {
    async fn read(&self) -> Result<Vec<String>, Error> {
        Ok(self.state.read().await.entries.clone())
    }

    async fn replace(&self, entries: Vec<String>) -> Result<(), Error> {
        let mut state = self.state.write().await;
        state.entries = entries;
        state.dirty = true;
        Ok(())
    }

    async fn persist(&self) -> Result<(), Error> {
        // Held across the write so a concurrent replace is not marked clean
        let mut state = self.state.write().await;
        if !state.dirty {
            return Ok(());
        }

        let document = WhitelistFileFormat {
            version: WHITELIST_FILE_VERSION.to_string(),
            updated_at: chrono::Utc::now(),
            entries: state.entries.clone(),
        };
        self.file.write(&document).await?;
        state.dirty = false;
        Ok(())
    }
}

/// File-backed configuration store
#[derive(Debug)]
pub struct FileConfigStore {
    file: JsonFile,
}

impl FileConfigStore {
    /// Create a store for the config at `path`; nothing is read yet
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            file: JsonFile::new(path.as_ref().to_path_buf(), Error::ConfigStore),
        }
    }

    /// Path of the config file
    pub fn path(&self) -> &Path {
        &self.file.path
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self) -> Result<WhitelistConfig, Error> {
        let config = self.file.load::<WhitelistConfig>().await?;
        if config.is_none() {
            tracing::info!(
                "No config at {}, using defaults",
                self.file.path.display()
            );
        }
        Ok(config.unwrap_or_default())
    }

    async fn save(&self, config: &WhitelistConfig) -> Result<(), Error> {
        self.file.write(config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_file_whitelist_persist_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("whitelist.json");

        let store = FileWhitelistStore::new(&path).await.unwrap();
        assert!(store.read().await.unwrap().is_empty());

        store
            .replace(vec!["111".to_string(), "222".to_string()])
            .await
            .unwrap();

        // Not written until persisted
        assert!(!path.exists());
        assert_ok!(store.persist().await);
        assert!(path.exists());

        // Clean store does not rewrite
        assert_ok!(store.persist().await);

        let reloaded = assert_ok!(FileWhitelistStore::new(&path).await);
        assert_eq!(
            reloaded.read().await.unwrap(),
            vec!["111".to_string(), "222".to_string()]
        );
    }

    #[tokio::test]
    async fn test_file_whitelist_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("whitelist.json");

        let store = FileWhitelistStore::new(&path).await.unwrap();
        store.replace(vec!["111".to_string()]).await.unwrap();
        store.persist().await.unwrap();

        // Second write creates the backup
        store.replace(vec!["222".to_string()]).await.unwrap();
        store.persist().await.unwrap();
        assert!(dir.path().join("whitelist.backup").exists());

        fs::write(&path, b"corrupted json data").await.unwrap();

        let recovered = FileWhitelistStore::new(&path).await.unwrap();
        // Backup holds the state before the last write
        assert_eq!(recovered.read().await.unwrap(), vec!["111".to_string()]);
    }

    #[tokio::test]
    async fn test_file_config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let store = FileConfigStore::new(&path);
        assert_eq!(assert_ok!(store.load().await), WhitelistConfig::default());

        let config = WhitelistConfig::new()
            .with_url("https://lists.example/subs.txt")
            .with_manual_entry("76561198000000000")
            .with_refresh_interval_secs(60);
        store.save(&config).await.unwrap();

        assert_eq!(FileConfigStore::new(&path).load().await.unwrap(), config);
    }
}
