//! Per-version metadata and capability flags.
//!
//! Every `(app_id, sequence)` has one JSON envelope, stored under the decimal
//! sequence as key. A missing envelope means "not supported", never an error.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use appstash_core::error::{Result, StashError};
use appstash_core::version::{AppVersionEnvelope, ApplicationDocument, LicenseDocument};
use parking_lot::RwLock;

/// Key-value store of version envelopes, grouped per app.
pub trait MetadataStore: Send + Sync {
    fn get(&self, app_id: &str, key: &str) -> Result<Option<String>>;

    fn put(&self, app_id: &str, key: &str, value: &str) -> Result<()>;

    /// Insert `value` unless `key` is already set. Returns whether it was
    /// inserted.
    fn put_new(&self, app_id: &str, key: &str, value: &str) -> Result<bool> {
        if self.get(app_id, key)?.is_some() {
            return Ok(false);
        }
        self.put(app_id, key, value)?;
        Ok(true)
    }
}

/// In-process `MetadataStore`.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    apps: RwLock<HashMap<String, BTreeMap<String, String>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn get(&self, app_id: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .apps
            .read()
            .get(app_id)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    fn put(&self, app_id: &str, key: &str, value: &str) -> Result<()> {
        self.apps
            .write()
            .entry(app_id.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn put_new(&self, app_id: &str, key: &str, value: &str) -> Result<bool> {
        let mut apps = self.apps.write();
        let entries = apps.entry(app_id.to_string()).or_default();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }
}

/// `MetadataStore` keeping one `<app_id>.json` map per app in a directory.
///
/// Writes are atomic (write tmp, then rename).
#[derive(Debug)]
pub struct FileMetadataStore {
    dir: PathBuf,
    lock: RwLock<()>,
}

impl FileMetadataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: RwLock::new(()),
        }
    }

    /// Store at `~/.appstash/versions`.
    pub fn default_path() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            StashError::ConfigError("Cannot determine home directory for version metadata".to_string())
        })?;
        Ok(Self::new(home.join(".appstash").join("versions")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn app_path(&self, app_id: &str) -> Result<PathBuf> {
        if app_id.is_empty()
            || app_id.starts_with('.')
            || app_id.contains(['/', '\\'])
        {
            return Err(StashError::ConfigError(format!(
                "app id '{}' cannot be used as a file name",
                app_id
            )));
        }
        Ok(self.dir.join(format!("{}.json", app_id)))
    }

    fn load(&self, path: &Path) -> Result<BTreeMap<String, String>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| {
            StashError::EncodingError(format!(
                "failed to parse metadata file {}: {}",
                path.display(),
                e
            ))
        })
    }

    fn save(&self, path: &Path, entries: &BTreeMap<String, String>) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_string_pretty(entries)?)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

impl MetadataStore for FileMetadataStore {
    fn get(&self, app_id: &str, key: &str) -> Result<Option<String>> {
        let path = self.app_path(app_id)?;
        let _guard = self.lock.read();
        Ok(self.load(&path)?.remove(key))
    }

    fn put(&self, app_id: &str, key: &str, value: &str) -> Result<()> {
        let path = self.app_path(app_id)?;
        let _guard = self.lock.write();
        let mut entries = self.load(&path)?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&path, &entries)
    }

    fn put_new(&self, app_id: &str, key: &str, value: &str) -> Result<bool> {
        let path = self.app_path(app_id)?;
        let _guard = self.lock.write();
        let mut entries = self.load(&path)?;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_string());
        self.save(&path, &entries)?;
        Ok(true)
    }
}

/// Answers capability questions about stored versions.
pub struct VersionMetadataIndex {
    store: Arc<dyn MetadataStore>,
}

impl VersionMetadataIndex {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Record the envelope of a new version. Versions are write-once.
    pub fn put_version_metadata(
        &self,
        app_id: &str,
        sequence: i64,
        envelope: &AppVersionEnvelope,
    ) -> Result<()> {
        let value = serde_json::to_string(envelope)?;
        if !self.store.put_new(app_id, &sequence.to_string(), &value)? {
            return Err(StashError::VersionExists {
                app_id: app_id.to_string(),
                sequence,
            });
        }
        tracing::debug!(app_id, sequence, "Stored version metadata");
        Ok(())
    }

    /// Fail with `VersionExists` if anything is recorded for the version,
    /// readable or not.
    pub fn ensure_absent(&self, app_id: &str, sequence: i64) -> Result<()> {
        if self.store.get(app_id, &sequence.to_string())?.is_some() {
            return Err(StashError::VersionExists {
                app_id: app_id.to_string(),
                sequence,
            });
        }
        Ok(())
    }

    /// Envelope of a version, if one was recorded.
    pub fn get_version_metadata(
        &self,
        app_id: &str,
        sequence: i64,
    ) -> Result<Option<AppVersionEnvelope>> {
        let Some(raw) = self.store.get(app_id, &sequence.to_string())? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| encoding_error(app_id, sequence, "envelope", &e.to_string()))
    }

    /// Whether the version's license allows GitOps. `false` when unknown or
    /// when no license was recorded.
    pub fn is_gitops_supported_for_version(&self, app_id: &str, sequence: i64) -> Result<bool> {
        let Some(envelope) = self.get_version_metadata(app_id, sequence)? else {
            return Ok(false);
        };
        if envelope.license.trim().is_empty() {
            return Ok(false);
        }
        let license = LicenseDocument::decode(&envelope.license)
            .map_err(|e| encoding_error(app_id, sequence, "license", &e.to_string()))?;
        Ok(license.spec.is_gitops_supported)
    }

    /// Whether the version's application spec allows rollback. `false` when
    /// unknown or when no application spec was recorded.
    pub fn is_rollback_supported_for_version(&self, app_id: &str, sequence: i64) -> Result<bool> {
        let Some(envelope) = self.get_version_metadata(app_id, sequence)? else {
            return Ok(false);
        };
        if envelope.app_spec.trim().is_empty() {
            return Ok(false);
        }
        let app = ApplicationDocument::decode(&envelope.app_spec)
            .map_err(|e| encoding_error(app_id, sequence, "application spec", &e.to_string()))?;
        Ok(app.spec.allow_rollback)
    }

    /// Snapshots are never available from registry-backed storage.
    pub fn is_snapshots_supported_for_version(&self, _app_id: &str, _sequence: i64) -> Result<bool> {
        Ok(false)
    }
}

fn encoding_error(app_id: &str, sequence: i64, what: &str, message: &str) -> StashError {
    StashError::EncodingError(format!(
        "app '{}' sequence {}: bad {}: {}",
        app_id, sequence, what, message
    ))
}
