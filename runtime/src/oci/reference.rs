//! Container image reference parsing.
//!
//! Turns a literal image string such as `busybox` or `quay.io/org/app:1.0`
//! into its canonical `{registry, repository, tag|digest}` form. The canonical
//! form is used for classification and destination naming only; manifests are
//! always matched against the literal.

use appstash_core::error::{Result, StashError};

/// Default registry when none is specified.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Repository prefix Docker Hub uses for official images.
const DEFAULT_REPOSITORY_PREFIX: &str = "library/";

/// Default tag when none is specified.
pub const DEFAULT_TAG: &str = "latest";

/// Parsed (canonical) image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    /// Registry hostname (e.g., "quay.io", "docker.io")
    pub registry: String,
    /// Repository path (e.g., "library/nginx", "replicatedcom/qa-kots-1")
    pub repository: String,
    /// Tag (e.g., "latest", "alpine-3.5")
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...")
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Supports formats:
    /// - `nginx` → docker.io/library/nginx:latest
    /// - `nginx:1` → docker.io/library/nginx:1
    /// - `library/busybox` → docker.io/library/busybox:latest
    /// - `quay.io/org/image:tag` → quay.io/org/image:tag
    /// - `quay.io/org/image@sha256:abc...` → quay.io/org/image@sha256:abc...
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(StashError::InvalidReference(
                "Empty image reference".to_string(),
            ));
        }

        // Split off digest first (@ separator)
        let (name_tag, digest) = match reference.rfind('@') {
            Some(at_pos) => {
                let digest_part = &reference[at_pos + 1..];
                if !digest_part.contains(':') {
                    return Err(StashError::InvalidReference(format!(
                        "Invalid digest format in reference '{}': expected algorithm:hex",
                        reference
                    )));
                }
                (&reference[..at_pos], Some(digest_part.to_string()))
            }
            None => (reference, None),
        };

        let (name, tag) = split_tag(name_tag);
        if tag == Some("") {
            return Err(StashError::InvalidReference(format!(
                "Empty tag in reference '{}'",
                reference
            )));
        }
        if name.is_empty() {
            return Err(StashError::InvalidReference(format!(
                "Empty repository in reference '{}'",
                reference
            )));
        }

        let (registry, repository) = Self::split_registry_repository(name, reference)?;

        // Apply default tag if no tag and no digest
        let tag = match (tag, &digest) {
            (None, None) => Some(DEFAULT_TAG.to_string()),
            (tag, _) => tag.map(str::to_string),
        };

        Ok(ImageReference {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Split a name into registry and repository components.
    ///
    /// The first path segment is a registry host only if it contains a dot or
    /// a colon, or is `localhost`.
    fn split_registry_repository(name: &str, reference: &str) -> Result<(String, String)> {
        if let Some(slash_pos) = name.find('/') {
            let first = &name[..slash_pos];
            if first.contains('.') || first.contains(':') || first == "localhost" {
                let repo = &name[slash_pos + 1..];
                if repo.is_empty() {
                    return Err(StashError::InvalidReference(format!(
                        "Empty repository in reference '{}'",
                        reference
                    )));
                }
                return Ok((first.to_string(), repo.to_string()));
            }
        }

        let repository = if name.contains('/') {
            name.to_string()
        } else {
            format!("{}{}", DEFAULT_REPOSITORY_PREFIX, name)
        };

        Ok((DEFAULT_REGISTRY.to_string(), repository))
    }

    /// Registry and repository without tag or digest.
    pub fn name(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// Final path segment of the repository (`qa-kots-1` for `replicatedcom/qa-kots-1`).
    pub fn last_path_segment(&self) -> &str {
        self.repository
            .rsplit('/')
            .next()
            .unwrap_or(&self.repository)
    }

    /// Whether the image is served by Docker Hub.
    pub fn is_docker_hub(&self) -> bool {
        matches!(
            self.registry.as_str(),
            "docker.io" | "index.docker.io" | "registry-1.docker.io"
        )
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        let mut s = self.name();
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

/// Split `name[:tag]` on the last colon after the last slash.
///
/// A name without a slash has no registry, so its colon is always a tag
/// separator (`nginx:1`); a `host:port` only appears before a slash.
fn split_tag(name_tag: &str) -> (&str, Option<&str>) {
    let name_start = name_tag.rfind('/').map(|p| p + 1).unwrap_or(0);
    match name_tag[name_start..].rfind(':') {
        Some(colon_pos) => {
            let split = name_start + colon_pos;
            (&name_tag[..split], Some(&name_tag[split + 1..]))
        }
        None => (name_tag, None),
    }
}

/// Split a literal into its name and its `:tag` / `@digest` suffix, verbatim.
///
/// `nginx:1` → (`nginx`, `:1`); `localhost:5000/app@sha256:ab` →
/// (`localhost:5000/app`, `@sha256:ab`).
pub fn split_literal_suffix(literal: &str) -> (&str, &str) {
    let name_start = literal.rfind('/').map(|p| p + 1).unwrap_or(0);
    match literal[name_start..].find([':', '@']) {
        Some(offset) => literal.split_at(name_start + offset),
        None => (literal, ""),
    }
}
