//! Per-sequence metadata stored alongside a version archive.
//!
//! The envelope keeps the license, application spec and config values as the
//! serialized documents they were received as. They are only decoded on
//! demand, when a capability flag is asked for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StashError};

/// Metadata envelope for one `(app_id, sequence)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVersionEnvelope {
    pub sequence: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Serialized `License` document
    #[serde(default)]
    pub license: String,

    /// Serialized `Application` document
    #[serde(default)]
    pub app_spec: String,

    /// Serialized `ConfigValues` document
    #[serde(default)]
    pub config_values: String,
}

/// License document (`kind: License`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseDocument {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub spec: LicenseSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseSpec {
    #[serde(default, rename = "licenseID")]
    pub license_id: String,
    #[serde(default)]
    pub app_slug: String,
    #[serde(default, rename = "isGitOpsSupported")]
    pub is_gitops_supported: bool,
    #[serde(default)]
    pub is_snapshot_supported: bool,
    #[serde(default)]
    pub is_airgap_supported: bool,
}

impl LicenseDocument {
    /// Decode a license from YAML or JSON text.
    pub fn decode(text: &str) -> Result<Self> {
        let doc: LicenseDocument = decode_kind(text, "License")?;
        Ok(doc)
    }
}

/// Application document (`kind: Application`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDocument {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub spec: ApplicationSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub allow_rollback: bool,
    #[serde(default)]
    pub additional_images: Vec<String>,
}

impl ApplicationDocument {
    /// Decode an application spec from YAML or JSON text.
    pub fn decode(text: &str) -> Result<Self> {
        decode_kind(text, "Application")
    }
}

/// Decode a document and check it is of the expected kind.
fn decode_kind<T>(text: &str, expected: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned + HasKind,
{
    let doc: T = serde_yaml::from_str(text).map_err(|e| {
        StashError::EncodingError(format!("failed to decode {} document: {}", expected, e))
    })?;
    if doc.kind() != expected {
        return Err(StashError::EncodingError(format!(
            "expected a {} document, found kind '{}'",
            expected,
            doc.kind()
        )));
    }
    Ok(doc)
}

trait HasKind {
    fn kind(&self) -> &str;
}

impl HasKind for LicenseDocument {
    fn kind(&self) -> &str {
        &self.kind
    }
}

impl HasKind for ApplicationDocument {
    fn kind(&self) -> &str {
        &self.kind
    }
}
