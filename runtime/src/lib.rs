//! Appstash runtime: the release engine.
//!
//! Discovers and classifies the container images a release references, plans
//! their relocation, and stores each release as an immutable archive in an
//! OCI artifact registry.

#![allow(clippy::result_large_err)]

pub mod image;
pub mod oci;
pub mod release;
pub mod store;

// Re-export common types
pub use image::{AuxiliarySpecs, Collector, ImageClassifier, ImageScanner, PodSpec, RelocationPlanner};
pub use image::{ClassifyOptions, OciRegistryProbe, ParsedDocument, RegistryProbe, ScanResult, Visibility};
pub use image::plan_proxy;
pub use oci::{CredentialStore, ImageReference, RegistryAuth};
pub use release::{ProcessOptions, ProcessedRelease, RelocationTarget, ReleaseImages};
pub use store::{artifact_reference, ArtifactRegistry, ArtifactStore, PushedArchive};
pub use store::{FileMetadataStore, MemoryMetadataStore, MetadataStore, VersionMetadataIndex};

/// Appstash runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
