//! Registry client plumbing shared by the image probe and the artifact store.
//!
//! Uses the `oci-distribution` crate to talk to OCI-distribution registries
//! (Docker Hub, quay.io, private mirrors, the artifact registry).

use appstash_core::error::{Result, StashError};
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::errors::{OciDistributionError, OciErrorCode};
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference};

use super::credentials::CredentialStore;
use super::reference::ImageReference;

/// Authentication credentials for a container registry.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    /// Anonymous authentication (no credentials).
    pub fn anonymous() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    /// Basic authentication with username and password.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Basic authentication when both parts are present, anonymous otherwise.
    pub fn from_parts(username: Option<&str>, password: Option<&str>) -> Self {
        match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() => Self::basic(u, p),
            _ => Self::anonymous(),
        }
    }

    /// Reads `REGISTRY_USERNAME` and `REGISTRY_PASSWORD`, anonymous if unset.
    pub fn from_env() -> Self {
        let username = std::env::var("REGISTRY_USERNAME").ok();
        let password = std::env::var("REGISTRY_PASSWORD").ok();
        Self::from_parts(username.as_deref(), password.as_deref())
    }

    /// Credentials for `host` from the default credential store, falling back
    /// to env vars, then anonymous.
    ///
    /// An unreadable credential file is an error rather than anonymous access.
    pub fn from_credential_store(host: &str) -> Result<Self> {
        match CredentialStore::default_path() {
            Ok(store) => Self::from_store(&store, host),
            Err(e) => {
                tracing::warn!(error = %e, "No credential store, using environment");
                Ok(Self::from_env())
            }
        }
    }

    /// Credentials for `host` from `store`, falling back to env vars.
    pub fn from_store(store: &CredentialStore, host: &str) -> Result<Self> {
        match store.get(host)? {
            Some((username, password)) => Ok(Self::basic(username, password)),
            None => Ok(Self::from_env()),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_none()
    }

    pub(crate) fn to_oci_auth(&self) -> OciRegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

/// Build a registry client.
///
/// `plain_http` switches every host to HTTP; `insecure_hosts` switches only
/// the listed hosts.
pub(crate) fn build_client(plain_http: bool, insecure_hosts: &[String]) -> Client {
    let protocol = if plain_http {
        ClientProtocol::Http
    } else if insecure_hosts.is_empty() {
        ClientProtocol::Https
    } else {
        ClientProtocol::HttpsExcept(insecure_hosts.to_vec())
    };
    Client::new(ClientConfig {
        protocol,
        ..Default::default()
    })
}

/// Convert an ImageReference to an oci-distribution Reference.
pub(crate) fn to_oci_reference(reference: &ImageReference) -> Result<Reference> {
    let ref_str = match (&reference.tag, &reference.digest) {
        (_, Some(digest)) => format!("{}@{}", reference.name(), digest),
        (Some(tag), None) => format!("{}:{}", reference.name(), tag),
        (None, None) => format!("{}:latest", reference.name()),
    };

    ref_str.parse::<Reference>().map_err(|e| {
        StashError::InvalidReference(format!("'{}': {}", ref_str, e))
    })
}

/// Whether a registry error means the caller lacks access.
pub(crate) fn is_unauthorized(err: &OciDistributionError) -> bool {
    match err {
        OciDistributionError::AuthenticationFailure(..)
        | OciDistributionError::UnauthorizedError { .. } => true,
        OciDistributionError::ServerError { code, .. } => *code == 401 || *code == 403,
        OciDistributionError::RegistryError { envelope, .. } => envelope
            .errors
            .iter()
            .any(|e| matches!(e.code, OciErrorCode::Unauthorized | OciErrorCode::Denied)),
        _ => false,
    }
}

/// Whether a registry error means nothing exists at the reference.
pub(crate) fn is_not_found(err: &OciDistributionError) -> bool {
    match err {
        OciDistributionError::ImageManifestNotFoundError(..) => true,
        OciDistributionError::ServerError { code, .. } => *code == 404,
        OciDistributionError::RegistryError { envelope, .. } => envelope
            .errors
            .iter()
            .any(|e| matches!(e.code, OciErrorCode::ManifestUnknown | OciErrorCode::NameUnknown)),
        _ => false,
    }
}
