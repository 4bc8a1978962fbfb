//! Per-host registry credentials.
//!
//! Credentials live at `~/.appstash/auth/credentials.json` and are resolved
//! by registry host, so the artifact registry and the source registries each
//! get their own login. Writes are atomic (write tmp, rename).

use std::collections::BTreeMap;
use std::path::PathBuf;

use appstash_core::error::{Result, StashError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialEntry {
    username: String,
    password: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    registries: BTreeMap<String, CredentialEntry>,
}

/// Persistent credential store for registry hosts.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Credential store at `~/.appstash/auth/credentials.json`.
    pub fn default_path() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            StashError::ConfigError("Cannot determine home directory for credential store".to_string())
        })?;
        Ok(Self {
            path: home.join(".appstash").join("auth").join("credentials.json"),
        })
    }

    /// Credential store at a custom path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store credentials for a host, replacing any existing entry.
    pub fn store(&self, host: &str, username: &str, password: &str) -> Result<()> {
        let mut file = self.load()?;
        file.registries.insert(
            normalize_host(host),
            CredentialEntry {
                username: username.to_string(),
                password: password.to_string(),
            },
        );
        self.save(&file)
    }

    /// Credentials for a host as `(username, password)`.
    pub fn get(&self, host: &str) -> Result<Option<(String, String)>> {
        let file = self.load()?;
        Ok(file
            .registries
            .get(&normalize_host(host))
            .map(|e| (e.username.clone(), e.password.clone())))
    }

    /// Remove credentials for a host. Returns true if an entry existed.
    pub fn remove(&self, host: &str) -> Result<bool> {
        let mut file = self.load()?;
        let removed = file.registries.remove(&normalize_host(host)).is_some();
        if removed {
            self.save(&file)?;
        }
        Ok(removed)
    }

    /// Hosts with stored credentials, sorted.
    pub fn hosts(&self) -> Result<Vec<String>> {
        Ok(self.load()?.registries.into_keys().collect())
    }

    fn load(&self) -> Result<CredentialFile> {
        if !self.path.exists() {
            return Ok(CredentialFile::default());
        }
        let data = std::fs::read_to_string(&self.path).map_err(|e| {
            StashError::ConfigError(format!(
                "Failed to read credential store {}: {}",
                self.path.display(),
                e
            ))
        })?;
        serde_json::from_str(&data).map_err(|e| {
            StashError::EncodingError(format!(
                "Failed to parse credential store {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn save(&self, file: &CredentialFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_string_pretty(file)?)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Normalize a host key: drop any scheme and path, lowercase, and fold the
/// Docker Hub aliases onto `index.docker.io`.
fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = host.split_once("://").map(|(_, rest)| rest).unwrap_or(host);
    let host = host.split('/').next().unwrap_or(host).to_lowercase();
    match host.as_str() {
        "docker.io" | "registry-1.docker.io" => "index.docker.io".to_string(),
        _ => host,
    }
}
