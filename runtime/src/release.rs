//! Release image processing: scan, classify, plan.
//!
//! Runs the three stages in sequence for one rendered release. Nothing is
//! returned unless every stage succeeds.

use std::path::Path;
use std::sync::Arc;

use appstash_core::config::{DestinationRegistry, DigestPolicy, RelocationPolicy};
use appstash_core::error::Result;
use appstash_core::image::{CheckedImage, RelocationDirective};

use crate::image::classify::{ClassifyOptions, ImageClassifier, RegistryProbe};
use crate::image::relocate::{plan_proxy, RelocationPlanner};
use crate::image::scan::{AuxiliarySpecs, ImageScanner, ParsedDocument};

/// Where relocated images go.
#[derive(Debug, Clone, Default)]
pub enum RelocationTarget {
    /// Classify only
    #[default]
    None,
    /// Copy into a mirror registry
    Mirror(DestinationRegistry),
    /// Pull private images through the vendor proxy
    Proxy { app_slug: String },
}

/// Options for [`ReleaseImages::process`].
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub classify: ClassifyOptions,
    pub target: RelocationTarget,
    pub policy: RelocationPolicy,
    pub digest_policy: DigestPolicy,
    /// Emit directives for the other Docker Hub spellings of an image
    pub docker_hub_aliases: bool,
    /// Read additional images and collectors from the release's own
    /// `Application`, `Preflight` and `SupportBundle` documents
    pub include_app_kinds: bool,
}

/// Result of processing a release.
#[derive(Debug, Clone, Default)]
pub struct ProcessedRelease {
    pub checked_images: Vec<CheckedImage>,
    pub directives: Vec<RelocationDirective>,
    pub documents: Vec<ParsedDocument>,
    /// Number of documents that failed to parse and were skipped
    pub skipped_documents: usize,
}

impl ProcessedRelease {
    pub fn private_images(&self) -> impl Iterator<Item = &CheckedImage> {
        self.checked_images.iter().filter(|c| c.is_private)
    }
}

/// Image pipeline for one release.
pub struct ReleaseImages {
    probe: Option<Arc<dyn RegistryProbe>>,
}

impl ReleaseImages {
    /// Pipeline probing real registries.
    pub fn new() -> Self {
        Self { probe: None }
    }

    pub fn with_probe(probe: Arc<dyn RegistryProbe>) -> Self {
        Self { probe: Some(probe) }
    }

    /// Scan `root`, classify every literal found and plan relocations.
    pub async fn process(
        &self,
        root: &Path,
        aux: &AuxiliarySpecs,
        options: &ProcessOptions,
    ) -> Result<ProcessedRelease> {
        let scan = ImageScanner::new()
            .with_app_kinds(options.include_app_kinds)
            .scan(root, aux)?;

        let classifier = match &self.probe {
            Some(probe) => ImageClassifier::with_probe(options.classify.clone(), probe.clone()),
            None => ImageClassifier::new(options.classify.clone()),
        };
        let checked_images = classifier.classify(&scan.images).await?;

        let directives = match &options.target {
            RelocationTarget::None => Vec::new(),
            RelocationTarget::Mirror(destination) => {
                RelocationPlanner::new(destination.clone(), options.policy)
                    .with_digest_policy(options.digest_policy)
                    .with_docker_hub_aliases(options.docker_hub_aliases)
                    .plan(&checked_images)?
            }
            RelocationTarget::Proxy { app_slug } => {
                plan_proxy(&checked_images, &options.classify.source_registry, app_slug)?
            }
        };

        tracing::info!(
            root = %root.display(),
            images = checked_images.len(),
            private = checked_images.iter().filter(|c| c.is_private).count(),
            directives = directives.len(),
            skipped = scan.failures.len(),
            "Processed release images"
        );

        Ok(ProcessedRelease {
            checked_images,
            directives,
            documents: scan.documents,
            skipped_documents: scan.failures.len(),
        })
    }
}

impl Default for ReleaseImages {
    fn default() -> Self {
        Self::new()
    }
}
