//! Public/private classification of literal image strings.
//!
//! Each distinct literal is classified once per pass. Images on the
//! first-party registry are private without a network round trip; everything
//! else is probed anonymously.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use appstash_core::config::SourceRegistry;
use appstash_core::error::{Result, StashError};
use appstash_core::image::CheckedImage;
use async_trait::async_trait;
use oci_distribution::Client;

use crate::oci::reference::ImageReference;
use crate::oci::registry::{build_client, is_unauthorized, to_oci_reference, RegistryAuth};

/// Default deadline for one classification pass.
pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(120);

/// Outcome of an anonymous pull probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn is_private(self) -> bool {
        self == Visibility::Private
    }
}

/// Answers "can this image be pulled without credentials?".
///
/// Returns `Private` when the registry rejects anonymous access and an error
/// when the registry cannot be asked at all.
#[async_trait]
pub trait RegistryProbe: Send + Sync {
    async fn probe(&self, reference: &ImageReference) -> Result<Visibility>;
}

/// Probe that fetches the image manifest anonymously.
pub struct OciRegistryProbe {
    client: Client,
}

impl OciRegistryProbe {
    pub fn new() -> Self {
        Self::with_insecure_hosts(&[])
    }

    /// Probe that talks plain HTTP to the listed hosts.
    pub fn with_insecure_hosts(hosts: &[String]) -> Self {
        Self {
            client: build_client(false, hosts),
        }
    }
}

impl Default for OciRegistryProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryProbe for OciRegistryProbe {
    async fn probe(&self, reference: &ImageReference) -> Result<Visibility> {
        let oci_ref = to_oci_reference(reference)?;
        let auth = RegistryAuth::anonymous().to_oci_auth();

        match self.client.pull_manifest(&oci_ref, &auth).await {
            Ok(_) => Ok(Visibility::Public),
            Err(e) if is_unauthorized(&e) => Ok(Visibility::Private),
            Err(e) => Err(StashError::NetworkError {
                registry: reference.registry.clone(),
                message: format!("probe of {} failed: {}", reference, e),
            }),
        }
    }
}

/// Classification settings.
#[derive(Debug, Clone)]
pub struct ClassifyOptions {
    pub source_registry: SourceRegistry,
    /// Treat every image as private and skip probing
    pub all_private: bool,
    /// Deadline for the whole pass
    pub timeout: Duration,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            source_registry: SourceRegistry::default(),
            all_private: false,
            timeout: DEFAULT_CLASSIFY_TIMEOUT,
        }
    }
}

/// Decides which literals need credentials to pull.
pub struct ImageClassifier {
    options: ClassifyOptions,
    probe: Arc<dyn RegistryProbe>,
}

impl ImageClassifier {
    /// Classifier probing real registries.
    pub fn new(options: ClassifyOptions) -> Self {
        Self::with_probe(options, Arc::new(OciRegistryProbe::new()))
    }

    pub fn with_probe(options: ClassifyOptions, probe: Arc<dyn RegistryProbe>) -> Self {
        Self { options, probe }
    }

    pub fn options(&self) -> &ClassifyOptions {
        &self.options
    }

    /// Classify each literal, preserving input order.
    ///
    /// All-or-nothing: an unparsable literal, an unreachable registry or an
    /// expired deadline fails the pass.
    pub async fn classify(&self, images: &[String]) -> Result<Vec<CheckedImage>> {
        let deadline = tokio::time::Instant::now() + self.options.timeout;
        match tokio::time::timeout_at(deadline, self.classify_all(images)).await {
            Ok(result) => result,
            Err(_) => Err(StashError::TimeoutError(format!(
                "classifying {} images exceeded {:?}",
                images.len(),
                self.options.timeout
            ))),
        }
    }

    async fn classify_all(&self, images: &[String]) -> Result<Vec<CheckedImage>> {
        let mut memo: HashMap<&str, bool> = HashMap::new();
        let mut checked = Vec::with_capacity(images.len());

        for literal in images {
            let is_private = match memo.get(literal.as_str()) {
                Some(&is_private) => is_private,
                None => {
                    let is_private = self.classify_one(literal).await?;
                    memo.insert(literal.as_str(), is_private);
                    is_private
                }
            };
            checked.push(CheckedImage::new(literal.clone(), is_private));
        }

        Ok(checked)
    }

    async fn classify_one(&self, literal: &str) -> Result<bool> {
        let reference = ImageReference::parse(literal).map_err(|e| match e {
            StashError::InvalidReference(message) => {
                StashError::InvalidReference(format!("'{}': {}", literal, message))
            }
            other => other,
        })?;

        if self.options.all_private {
            return Ok(true);
        }

        let source = &self.options.source_registry;
        if source.is_first_party(&reference.registry)
            && source.is_licensed_path(&reference.repository)
        {
            tracing::debug!(image = literal, "First-party image, private");
            return Ok(true);
        }

        let visibility = self.probe.probe(&reference).await?;
        tracing::debug!(image = literal, ?visibility, "Probed image");
        Ok(visibility.is_private())
    }
}
