//! OCI registry plumbing.
//!
//! - Image reference parsing (literal → canonical form)
//! - Per-host credentials
//! - Registry client construction and error classification

pub mod credentials;
pub mod reference;
pub mod registry;

pub use credentials::CredentialStore;
pub use reference::ImageReference;
pub use registry::RegistryAuth;
