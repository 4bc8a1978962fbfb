//! Appstash Core - Foundational Types
//!
//! Error taxonomy, configuration and the release data model shared by the
//! appstash runtime and CLI.

pub mod config;
pub mod error;
pub mod image;
pub mod version;

// Re-export commonly used types
pub use config::{
    DestinationRegistry, DigestPolicy, LogLevel, RelocationPolicy, SourceRegistry, StorageConfig,
};
pub use error::{Result, StashError};
pub use image::{CheckedImage, RelocationDirective};
pub use version::{AppVersionEnvelope, ApplicationDocument, LicenseDocument};

/// Appstash version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
