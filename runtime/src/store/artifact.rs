//! Versioned application archives in an OCI artifact registry.
//!
//! Each `(app_id, sequence)` is one single-layer artifact whose layer is the
//! gzip tar of the release directories.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use appstash_core::config::StorageConfig;
use appstash_core::error::{Result, StashError};
use async_trait::async_trait;
use oci_distribution::client::{Config, ImageLayer};
use oci_distribution::errors::OciDistributionError;
use oci_distribution::{Client, Reference};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use super::archive::{build_archive, unpack_archive};
use super::reference::{archive_title, artifact_reference, registry_host};
use crate::oci::registry::{build_client, is_not_found, is_unauthorized, RegistryAuth};

/// Media type of the archive layer.
pub const ARCHIVE_MEDIA_TYPE: &str = "application/gzip";

/// Config media type for artifacts without an image config.
const ARTIFACT_CONFIG_MEDIA_TYPE: &str = "application/vnd.unknown.config.v1+json";

const TITLE_ANNOTATION: &str = "org.opencontainers.image.title";

/// Release directories archived by [`ArtifactStore::create_app_version_archive`].
const RELEASE_DIRS: [&str; 3] = ["upstream", "base", "overlays"];

/// Optional release directory, archived only when present.
const SKIPPED_FILES_DIR: &str = "skippedFiles";

/// One layer of a pulled artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactLayer {
    pub media_type: String,
    pub data: Vec<u8>,
}

/// Result of a successful push.
#[derive(Debug, Clone, PartialEq)]
pub struct PushedArchive {
    pub reference: String,
    /// `sha256:<hex>` of the archive layer
    pub digest: String,
    pub size: u64,
}

/// Transport to the artifact registry.
///
/// Implementations map registry failures onto `StashError` themselves:
/// `NotFound`, `AuthError`, `CorruptArtifact` or `StorageError`.
#[async_trait]
pub trait ArtifactRegistry: Send + Sync {
    /// Push `archive` as the single layer of the artifact at `reference`.
    async fn push(&self, reference: &str, archive: Vec<u8>, title: &str) -> Result<()>;

    /// Pull the layers of the artifact at `reference`.
    async fn pull(&self, reference: &str) -> Result<Vec<ArtifactLayer>>;
}

/// `ArtifactRegistry` over `oci-distribution`.
pub struct OciArtifactRegistry {
    client: Client,
}

impl OciArtifactRegistry {
    pub fn new(plain_http: bool) -> Self {
        Self {
            client: build_client(plain_http, &[]),
        }
    }

    fn parse_reference(reference: &str) -> Result<Reference> {
        reference.parse::<Reference>().map_err(|e| StashError::StorageError {
            reference: reference.to_string(),
            message: format!("invalid artifact reference: {}", e),
        })
    }

    fn map_error(reference: &str, action: &str, err: OciDistributionError) -> StashError {
        if is_unauthorized(&err) {
            return StashError::AuthError {
                registry: registry_host(reference).to_string(),
                message: format!("{} {}: {}", action, reference, err),
            };
        }
        if is_not_found(&err) {
            return StashError::NotFound(reference.to_string());
        }
        match err {
            OciDistributionError::IncompatibleLayerMediaTypeError(media_type) => {
                StashError::CorruptArtifact {
                    reference: reference.to_string(),
                    message: format!("unexpected layer media type {}", media_type),
                }
            }
            other => StashError::StorageError {
                reference: reference.to_string(),
                message: format!("{} failed: {}", action, other),
            },
        }
    }
}

/// The single gzip layer of an archive artifact, titled for registry UIs.
fn archive_layer(archive: Vec<u8>, title: &str) -> ImageLayer {
    let mut annotations = HashMap::new();
    annotations.insert(TITLE_ANNOTATION.to_string(), title.to_string());
    ImageLayer::new(archive, ARCHIVE_MEDIA_TYPE.to_string(), Some(annotations))
}

#[async_trait]
impl ArtifactRegistry for OciArtifactRegistry {
    async fn push(&self, reference: &str, archive: Vec<u8>, title: &str) -> Result<()> {
        let oci_ref = Self::parse_reference(reference)?;
        let auth = RegistryAuth::from_credential_store(registry_host(reference))?.to_oci_auth();

        let layers = vec![archive_layer(archive, title)];
        let config = Config::new(
            b"{}".to_vec(),
            ARTIFACT_CONFIG_MEDIA_TYPE.to_string(),
            None,
        );

        self.client
            .push(&oci_ref, &layers, config, &auth, None)
            .await
            .map_err(|e| Self::map_error(reference, "push", e))?;
        Ok(())
    }

    async fn pull(&self, reference: &str) -> Result<Vec<ArtifactLayer>> {
        let oci_ref = Self::parse_reference(reference)?;
        let auth = RegistryAuth::from_credential_store(registry_host(reference))?.to_oci_auth();

        let image = self
            .client
            .pull(&oci_ref, &auth, vec![ARCHIVE_MEDIA_TYPE])
            .await
            .map_err(|e| Self::map_error(reference, "pull", e))?;

        Ok(image
            .layers
            .into_iter()
            .map(|layer| ArtifactLayer {
                media_type: layer.media_type,
                data: layer.data,
            })
            .collect())
    }
}

/// Stores and retrieves application version archives.
pub struct ArtifactStore {
    config: StorageConfig,
    registry: Arc<dyn ArtifactRegistry>,
}

impl ArtifactStore {
    /// Store backed by the OCI registry named in `config`.
    pub fn new(config: StorageConfig) -> Self {
        let registry = Arc::new(OciArtifactRegistry::new(config.plain_http));
        Self { config, registry }
    }

    /// Store configured from `STORAGE_BASEURI` / `STORAGE_BASEURI_PLAINHTTP`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(StorageConfig::from_env()?))
    }

    pub fn with_registry(config: StorageConfig, registry: Arc<dyn ArtifactRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Reference the archive of `(app_id, sequence)` is stored under.
    pub fn reference(&self, app_id: &str, sequence: i64) -> String {
        artifact_reference(app_id, sequence, &self.config.base_uri)
    }

    /// Archive `dirs` and push them as version `sequence` of `app_id`.
    pub async fn put_version_archive(
        &self,
        app_id: &str,
        sequence: i64,
        dirs: &[PathBuf],
    ) -> Result<PushedArchive> {
        let reference = self.reference(app_id, sequence);

        let owned = dirs.to_vec();
        let archive = tokio::task::spawn_blocking(move || build_archive(&owned))
            .await
            .map_err(|e| StashError::StorageError {
                reference: reference.clone(),
                message: format!("archive task failed: {}", e),
            })?
            .map_err(|e| StashError::StorageError {
                reference: reference.clone(),
                message: format!("failed to build archive: {}", e),
            })?;

        let digest = format!("sha256:{}", hex::encode(Sha256::digest(&archive)));
        let size = archive.len() as u64;

        self.with_timeout(
            &reference,
            self.registry
                .push(&reference, archive, &archive_title(app_id, sequence)),
        )
        .await?;

        tracing::info!(
            app_id,
            sequence,
            reference = %reference,
            digest = %digest,
            size,
            "Pushed app version archive"
        );

        Ok(PushedArchive {
            reference,
            digest,
            size,
        })
    }

    /// Archive the release directories under `root`: `upstream`, `base`,
    /// `overlays`, and `skippedFiles` when present.
    pub async fn create_app_version_archive(
        &self,
        app_id: &str,
        sequence: i64,
        root: &Path,
    ) -> Result<PushedArchive> {
        let mut dirs: Vec<PathBuf> = RELEASE_DIRS.iter().map(|d| root.join(d)).collect();
        let skipped = root.join(SKIPPED_FILES_DIR);
        if skipped.exists() {
            dirs.push(skipped);
        }
        self.put_version_archive(app_id, sequence, &dirs).await
    }

    /// Pull and unpack version `sequence` of `app_id`.
    ///
    /// The returned directory belongs to the caller and is deleted on drop.
    pub async fn get_version_archive(&self, app_id: &str, sequence: i64) -> Result<TempDir> {
        let reference = self.reference(app_id, sequence);
        tracing::debug!(app_id, sequence, reference = %reference, "Pulling app version archive");

        let layers = self
            .with_timeout(&reference, self.registry.pull(&reference))
            .await?;

        let layer = layers
            .into_iter()
            .find(|layer| layer.media_type == ARCHIVE_MEDIA_TYPE)
            .ok_or_else(|| StashError::CorruptArtifact {
                reference: reference.clone(),
                message: format!("no {} layer", ARCHIVE_MEDIA_TYPE),
            })?;
        let digest = format!("sha256:{}", hex::encode(Sha256::digest(&layer.data)));

        let target = tempfile::Builder::new().prefix("appstash").tempdir()?;
        let path = target.path().to_path_buf();
        let unpack_ref = reference.clone();
        tokio::task::spawn_blocking(move || unpack_archive(&layer.data, &path))
            .await
            .map_err(|e| StashError::CorruptArtifact {
                reference: unpack_ref.clone(),
                message: format!("unpack task failed: {}", e),
            })?
            .map_err(|e| StashError::CorruptArtifact {
                reference: unpack_ref,
                message: format!("failed to unpack archive: {}", e),
            })?;

        tracing::info!(
            app_id,
            sequence,
            reference = %reference,
            digest = %digest,
            "Pulled app version archive"
        );

        Ok(target)
    }

    async fn with_timeout<T>(
        &self,
        reference: &str,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        let timeout = self.config.timeout();
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StashError::TimeoutError(format!(
                "{} did not complete within {:?}",
                reference, timeout
            ))),
        }
    }
}
