//! `appstash images` command.

use std::path::PathBuf;
use std::time::Duration;

use appstash_core::config::{DestinationRegistry, DigestPolicy, RelocationPolicy, SourceRegistry};
use appstash_runtime::{AuxiliarySpecs, ClassifyOptions, ProcessOptions, ReleaseImages, RelocationTarget};
use clap::Args;

use crate::output;

#[derive(Args)]
pub struct ImagesArgs {
    /// Directory holding the rendered release manifests
    pub dir: PathBuf,

    /// Extra image to include, ahead of those found in manifests (repeatable)
    #[arg(long = "additional-image")]
    pub additional_images: Vec<String>,

    /// Read additional images and collectors from Application, Preflight and
    /// SupportBundle documents in the release
    #[arg(long)]
    pub app_kinds: bool,

    /// First-party registry host (images there are private)
    #[arg(long, default_value = "registry.replicated.com")]
    pub registry_endpoint: String,

    /// First-party proxy host
    #[arg(long, default_value = "proxy.replicated.com")]
    pub proxy_endpoint: String,

    /// Licensed repository path prefix on the first-party registry (repeatable)
    #[arg(long = "licensed-path")]
    pub licensed_paths: Vec<String>,

    /// Treat every image as private without probing
    #[arg(long)]
    pub all_private: bool,

    /// Classification deadline in seconds
    #[arg(long, default_value_t = 120)]
    pub timeout: u64,

    /// Mirror registry host; enables relocation planning
    #[arg(long, conflicts_with = "proxy_app_slug")]
    pub dest_endpoint: Option<String>,

    /// Namespace under the mirror registry host
    #[arg(long, default_value = "")]
    pub dest_namespace: String,

    /// Relocate public images too
    #[arg(long)]
    pub relocate_all: bool,

    /// Leave digest-pinned images where they are
    #[arg(long)]
    pub exclude_digests: bool,

    /// Also plan the other Docker Hub spellings of each image
    #[arg(long)]
    pub docker_hub_aliases: bool,

    /// Rewrite private images to pull through the proxy under this app slug
    #[arg(long)]
    pub proxy_app_slug: Option<String>,

    /// Print JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

impl ImagesArgs {
    fn options(&self) -> ProcessOptions {
        let target = match (&self.dest_endpoint, &self.proxy_app_slug) {
            (Some(endpoint), _) => RelocationTarget::Mirror(DestinationRegistry::new(
                endpoint.clone(),
                self.dest_namespace.clone(),
            )),
            (None, Some(app_slug)) => RelocationTarget::Proxy {
                app_slug: app_slug.clone(),
            },
            (None, None) => RelocationTarget::None,
        };

        ProcessOptions {
            classify: ClassifyOptions {
                source_registry: SourceRegistry {
                    endpoint: self.registry_endpoint.clone(),
                    proxy_endpoint: self.proxy_endpoint.clone(),
                    licensed_paths: self.licensed_paths.clone(),
                },
                all_private: self.all_private,
                timeout: Duration::from_secs(self.timeout),
            },
            target,
            policy: if self.relocate_all {
                RelocationPolicy::RelocateAll
            } else {
                RelocationPolicy::RelocatePrivateOnly
            },
            digest_policy: if self.exclude_digests {
                DigestPolicy::Exclude
            } else {
                DigestPolicy::Carry
            },
            docker_hub_aliases: self.docker_hub_aliases,
            include_app_kinds: self.app_kinds,
        }
    }
}

pub async fn execute(args: ImagesArgs) -> Result<(), Box<dyn std::error::Error>> {
    let aux = AuxiliarySpecs::new(args.additional_images.clone(), Vec::new());
    let processed = ReleaseImages::new()
        .process(&args.dir, &aux, &args.options())
        .await?;

    if args.json {
        let out = serde_json::json!({
            "checkedImages": processed.checked_images,
            "directives": processed.directives,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let mut table = output::new_table(&["IMAGE", "PRIVATE"]);
    for checked in &processed.checked_images {
        table.add_row([checked.image.as_str(), output::yes_no(checked.is_private)]);
    }
    println!("{table}");

    if !processed.directives.is_empty() {
        println!();
        let mut table = output::new_table(&["NAME", "NEW NAME", "NEW TAG", "DIGEST"]);
        for d in &processed.directives {
            table.add_row([
                d.name.as_str(),
                d.new_name.as_str(),
                d.new_tag.as_str(),
                d.digest.as_deref().unwrap_or(""),
            ]);
        }
        println!("{table}");
    }

    if processed.skipped_documents > 0 {
        eprintln!(
            "{} document(s) could not be parsed and were skipped",
            processed.skipped_documents
        );
    }

    Ok(())
}
