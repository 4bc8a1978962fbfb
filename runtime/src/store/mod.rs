//! Versioned application storage.
//!
//! Archives go to an OCI artifact registry, one artifact per
//! `(app_id, sequence)`; per-version metadata goes to a `MetadataStore`.

pub mod archive;
pub mod artifact;
pub mod metadata;
pub mod reference;

pub use artifact::{ArtifactLayer, ArtifactRegistry, ArtifactStore, OciArtifactRegistry, PushedArchive, ARCHIVE_MEDIA_TYPE};
pub use metadata::{FileMetadataStore, MemoryMetadataStore, MetadataStore, VersionMetadataIndex};
pub use reference::artifact_reference;
