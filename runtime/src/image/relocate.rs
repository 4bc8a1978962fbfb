//! Relocation planning.
//!
//! Computes where each selected image lands in the destination registry. Pure
//! computation: nothing here talks to a registry.

use std::collections::HashSet;

use appstash_core::config::{DestinationRegistry, DigestPolicy, RelocationPolicy, SourceRegistry};
use appstash_core::error::{Result, StashError};
use appstash_core::image::{CheckedImage, RelocationDirective};

use crate::oci::reference::{split_literal_suffix, ImageReference, DEFAULT_REGISTRY, DEFAULT_TAG};

/// Path segment the vendor proxy serves rewritten images under.
const PROXY_PATH: &str = "proxy";

/// Plans relocation directives into a destination registry.
#[derive(Debug, Clone)]
pub struct RelocationPlanner {
    destination: DestinationRegistry,
    policy: RelocationPolicy,
    digest_policy: DigestPolicy,
    docker_hub_aliases: bool,
}

impl RelocationPlanner {
    pub fn new(destination: DestinationRegistry, policy: RelocationPolicy) -> Self {
        Self {
            destination,
            policy,
            digest_policy: DigestPolicy::default(),
            docker_hub_aliases: false,
        }
    }

    pub fn with_digest_policy(mut self, digest_policy: DigestPolicy) -> Self {
        self.digest_policy = digest_policy;
        self
    }

    /// Also emit directives for the other spellings of Docker Hub images
    /// (`busybox`, `library/busybox`, `docker.io/library/busybox`).
    pub fn with_docker_hub_aliases(mut self, enabled: bool) -> Self {
        self.docker_hub_aliases = enabled;
        self
    }

    /// One directive per distinct selected literal, in input order.
    pub fn plan(&self, images: &[CheckedImage]) -> Result<Vec<RelocationDirective>> {
        let present: HashSet<&str> = images.iter().map(|c| c.image.as_str()).collect();
        let mut emitted: HashSet<String> = HashSet::new();
        let mut directives = Vec::new();

        for checked in images {
            if !self.selects(checked) || emitted.contains(&checked.image) {
                continue;
            }

            let reference = parse_literal(&checked.image)?;
            if reference.digest.is_some() && self.digest_policy == DigestPolicy::Exclude {
                tracing::debug!(image = %checked.image, "Leaving digest-pinned image in place");
                continue;
            }

            let directive = self.directive_for(&checked.image, &reference);
            emitted.insert(checked.image.clone());

            if self.docker_hub_aliases && reference.is_docker_hub() {
                let aliases = docker_hub_spellings(&checked.image, &reference);
                directives.push(directive.clone());
                for alias in aliases {
                    if present.contains(alias.as_str()) || emitted.contains(&alias) {
                        continue;
                    }
                    emitted.insert(alias.clone());
                    directives.push(RelocationDirective {
                        name: alias,
                        ..directive.clone()
                    });
                }
            } else {
                directives.push(directive);
            }
        }

        Ok(directives)
    }

    /// Destination `new_name` for a canonical image.
    ///
    /// `lowercase(endpoint/namespace/last-segment)`, with an empty namespace
    /// omitted.
    pub fn destination_for(&self, reference: &ImageReference) -> String {
        let endpoint = self.destination.endpoint.trim_end_matches('/');
        let namespace = self.destination.namespace.trim_matches('/');
        let name = if namespace.is_empty() {
            format!("{}/{}", endpoint, reference.last_path_segment())
        } else {
            format!("{}/{}/{}", endpoint, namespace, reference.last_path_segment())
        };
        name.to_lowercase()
    }

    fn selects(&self, checked: &CheckedImage) -> bool {
        match self.policy {
            RelocationPolicy::RelocateAll => true,
            RelocationPolicy::RelocatePrivateOnly => checked.is_private,
        }
    }

    fn directive_for(&self, literal: &str, reference: &ImageReference) -> RelocationDirective {
        RelocationDirective {
            name: literal.to_string(),
            new_name: self.destination_for(reference),
            new_tag: tag_or_default(reference),
            digest: reference.digest.clone(),
        }
    }
}

/// Rewrite private third-party images to pull through the vendor proxy.
///
/// Each selected image becomes
/// `<proxy_endpoint>/proxy/<app_slug>/<host>/<repository>` with its original
/// tag. Public images and images already on the first-party registry are
/// left alone.
pub fn plan_proxy(
    images: &[CheckedImage],
    source: &SourceRegistry,
    app_slug: &str,
) -> Result<Vec<RelocationDirective>> {
    if source.proxy_endpoint.is_empty() {
        return Err(StashError::ConfigError(
            "proxy relocation needs a proxy endpoint".to_string(),
        ));
    }

    let proxy = source.proxy_endpoint.trim_end_matches('/');
    let mut emitted = HashSet::new();
    let mut directives = Vec::new();

    for checked in images.iter().filter(|c| c.is_private) {
        if !emitted.insert(checked.image.as_str()) {
            continue;
        }
        let reference = parse_literal(&checked.image)?;
        if source.is_first_party(&reference.registry) {
            continue;
        }

        directives.push(RelocationDirective {
            name: checked.image.clone(),
            new_name: format!(
                "{}/{}/{}/{}/{}",
                proxy, PROXY_PATH, app_slug, reference.registry, reference.repository
            ),
            new_tag: tag_or_default(&reference),
            digest: reference.digest.clone(),
        });
    }

    Ok(directives)
}

fn parse_literal(literal: &str) -> Result<ImageReference> {
    ImageReference::parse(literal).map_err(|e| match e {
        StashError::InvalidReference(message) => {
            StashError::InvalidReference(format!("'{}': {}", literal, message))
        }
        other => other,
    })
}

fn tag_or_default(reference: &ImageReference) -> String {
    reference
        .tag
        .clone()
        .unwrap_or_else(|| DEFAULT_TAG.to_string())
}

/// Other spellings of a Docker Hub literal, each keeping its tag/digest suffix.
fn docker_hub_spellings(literal: &str, reference: &ImageReference) -> Vec<String> {
    let (_, suffix) = split_literal_suffix(literal);
    let repository = &reference.repository;

    let mut names = Vec::new();
    if let Some(short) = repository.strip_prefix("library/") {
        names.push(short.to_string());
    }
    names.push(repository.clone());
    names.push(format!("{}/{}", DEFAULT_REGISTRY, repository));

    names
        .into_iter()
        .map(|name| format!("{}{}", name, suffix))
        .filter(|spelling| spelling != literal)
        .collect()
}
