//! End-to-end release image processing against a rendered release on disk.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use appstash_core::config::{DestinationRegistry, RelocationPolicy, SourceRegistry};
use appstash_core::error::{Result, StashError};
use appstash_core::image::CheckedImage;
use appstash_runtime::{
    AuxiliarySpecs, ClassifyOptions, ImageReference, ProcessOptions, RegistryProbe, ReleaseImages,
    RelocationTarget, Visibility,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

/// quay.io needs credentials, everything else is public.
#[derive(Default)]
struct QuayIsPrivate {
    probed: Mutex<Vec<String>>,
}

#[async_trait]
impl RegistryProbe for QuayIsPrivate {
    async fn probe(&self, reference: &ImageReference) -> Result<Visibility> {
        self.probed.lock().push(reference.to_string());
        if reference.registry == "quay.io" {
            Ok(Visibility::Private)
        } else {
            Ok(Visibility::Public)
        }
    }
}

fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn release() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    write(
        root,
        "base/deployment.yaml",
        r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  template:
    spec:
      containers:
        - name: a
          image: busybox
        - name: b
          image: docker.io/library/busybox
      initContainers:
        - name: c
          image: library/busybox
"#,
    );
    write(
        root,
        "base/job.yaml",
        r#"apiVersion: batch/v1
kind: Job
metadata:
  name: migrate
spec:
  template:
    spec:
      containers:
        - name: migrate
          image: quay.io/replicatedcom/qa-kots-3:alpine-3.6
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
"#,
    );
    write(root, "broken.yaml", "kind: [oops\n");
    write(
        root,
        "kots-app.yaml",
        r#"apiVersion: kots.io/v1beta1
kind: Application
spec:
  title: Test App
  additionalImages:
    - registry.replicated.com/appslug/image:version
"#,
    );
    write(
        root,
        "preflight.yaml",
        r#"apiVersion: troubleshoot.sh/v1beta2
kind: Preflight
spec:
  collectors:
    - run:
        image: quay.io/replicatedcom/qa-kots-1:alpine-3.5
"#,
    );
    write(
        root,
        "support-bundle.yaml",
        r#"apiVersion: troubleshoot.sh/v1beta2
kind: SupportBundle
spec:
  collectors:
    - clusterInfo: {}
    - run:
        image: quay.io/replicatedcom/qa-kots-2:alpine-3.4
"#,
    );

    dir
}

fn source_registry() -> SourceRegistry {
    SourceRegistry {
        endpoint: "registry.replicated.com".to_string(),
        proxy_endpoint: "proxy.replicated.com".to_string(),
        licensed_paths: Vec::new(),
    }
}

fn options(target: RelocationTarget) -> ProcessOptions {
    ProcessOptions {
        classify: ClassifyOptions {
            source_registry: source_registry(),
            ..Default::default()
        },
        target,
        include_app_kinds: true,
        ..Default::default()
    }
}

fn mirror() -> RelocationTarget {
    RelocationTarget::Mirror(DestinationRegistry::new("ttl.sh", "testing-ns"))
}

#[tokio::test]
async fn test_checked_images() {
    let dir = release();
    let probe = Arc::new(QuayIsPrivate::default());
    let processed = ReleaseImages::with_probe(probe.clone())
        .process(dir.path(), &AuxiliarySpecs::default(), &options(RelocationTarget::None))
        .await
        .unwrap();

    assert_eq!(
        processed.checked_images,
        vec![
            CheckedImage::new("registry.replicated.com/appslug/image:version", true),
            CheckedImage::new("busybox", false),
            CheckedImage::new("docker.io/library/busybox", false),
            CheckedImage::new("library/busybox", false),
            CheckedImage::new("quay.io/replicatedcom/qa-kots-3:alpine-3.6", true),
            CheckedImage::new("quay.io/replicatedcom/qa-kots-1:alpine-3.5", true),
            CheckedImage::new("quay.io/replicatedcom/qa-kots-2:alpine-3.4", true),
        ]
    );
    assert!(processed.directives.is_empty());
    assert_eq!(processed.skipped_documents, 1);
    assert_eq!(processed.private_images().count(), 4);

    // The first-party image never reaches the probe; each literal is probed once.
    let probed = probe.probed.lock().clone();
    assert_eq!(probed.len(), 6);
    assert!(!probed.iter().any(|p| p.starts_with("registry.replicated.com")));
}

#[tokio::test]
async fn test_mirror_private_only() {
    let dir = release();
    let processed = ReleaseImages::with_probe(Arc::new(QuayIsPrivate::default()))
        .process(dir.path(), &AuxiliarySpecs::default(), &options(mirror()))
        .await
        .unwrap();

    let planned: Vec<(&str, &str, &str)> = processed
        .directives
        .iter()
        .map(|d| (d.name.as_str(), d.new_name.as_str(), d.new_tag.as_str()))
        .collect();
    assert_eq!(
        planned,
        vec![
            (
                "registry.replicated.com/appslug/image:version",
                "ttl.sh/testing-ns/image",
                "version"
            ),
            (
                "quay.io/replicatedcom/qa-kots-3:alpine-3.6",
                "ttl.sh/testing-ns/qa-kots-3",
                "alpine-3.6"
            ),
            (
                "quay.io/replicatedcom/qa-kots-1:alpine-3.5",
                "ttl.sh/testing-ns/qa-kots-1",
                "alpine-3.5"
            ),
            (
                "quay.io/replicatedcom/qa-kots-2:alpine-3.4",
                "ttl.sh/testing-ns/qa-kots-2",
                "alpine-3.4"
            ),
        ]
    );
}

#[tokio::test]
async fn test_mirror_all_keeps_every_spelling() {
    let dir = release();
    let mut options = options(mirror());
    options.policy = RelocationPolicy::RelocateAll;

    let processed = ReleaseImages::with_probe(Arc::new(QuayIsPrivate::default()))
        .process(dir.path(), &AuxiliarySpecs::default(), &options)
        .await
        .unwrap();

    let busybox: Vec<&str> = processed
        .directives
        .iter()
        .filter(|d| d.new_name == "ttl.sh/testing-ns/busybox")
        .map(|d| d.name.as_str())
        .collect();
    assert_eq!(busybox, vec!["busybox", "docker.io/library/busybox", "library/busybox"]);
    assert_eq!(processed.directives.len(), processed.checked_images.len());
}

#[tokio::test]
async fn test_mirror_all_with_docker_hub_aliases() {
    let dir = release();
    let aux = AuxiliarySpecs::new(vec!["nginx:1".to_string()], Vec::new());
    let mut options = options(mirror());
    options.policy = RelocationPolicy::RelocateAll;
    options.docker_hub_aliases = true;

    let probe = Arc::new(QuayIsPrivate::default());
    let processed = ReleaseImages::with_probe(probe.clone())
        .process(dir.path(), &aux, &options)
        .await
        .unwrap();

    let nginx: Vec<(&str, &str, &str)> = processed
        .directives
        .iter()
        .filter(|d| d.name.contains("nginx"))
        .map(|d| (d.name.as_str(), d.new_name.as_str(), d.new_tag.as_str()))
        .collect();
    assert_eq!(
        nginx,
        vec![
            ("nginx:1", "ttl.sh/testing-ns/nginx", "1"),
            ("library/nginx:1", "ttl.sh/testing-ns/nginx", "1"),
            ("docker.io/library/nginx:1", "ttl.sh/testing-ns/nginx", "1"),
        ]
    );
    assert!(probe
        .probed
        .lock()
        .contains(&"docker.io/library/nginx:1".to_string()));
}

#[tokio::test]
async fn test_explicit_images_and_proxy() {
    let dir = release();
    let aux = AuxiliarySpecs::new(vec!["nginx:1".to_string()], Vec::new());
    let processed = ReleaseImages::with_probe(Arc::new(QuayIsPrivate::default()))
        .process(
            dir.path(),
            &aux,
            &options(RelocationTarget::Proxy {
                app_slug: "test-app-slug".to_string(),
            }),
        )
        .await
        .unwrap();

    assert_eq!(processed.checked_images[0], CheckedImage::new("nginx:1", false));
    let proxied: Vec<(&str, &str)> = processed
        .directives
        .iter()
        .map(|d| (d.new_name.as_str(), d.new_tag.as_str()))
        .collect();
    assert_eq!(
        proxied,
        vec![
            (
                "proxy.replicated.com/proxy/test-app-slug/quay.io/replicatedcom/qa-kots-3",
                "alpine-3.6"
            ),
            (
                "proxy.replicated.com/proxy/test-app-slug/quay.io/replicatedcom/qa-kots-1",
                "alpine-3.5"
            ),
            (
                "proxy.replicated.com/proxy/test-app-slug/quay.io/replicatedcom/qa-kots-2",
                "alpine-3.4"
            ),
        ]
    );
}

#[tokio::test]
async fn test_invalid_image_fails_whole_release() {
    let dir = release();
    write(
        dir.path(),
        "base/bad.yaml",
        "kind: Pod\nspec:\n  containers:\n    - image: quay.io/org/app@nodigest\n",
    );

    let err = ReleaseImages::with_probe(Arc::new(QuayIsPrivate::default()))
        .process(dir.path(), &AuxiliarySpecs::default(), &options(mirror()))
        .await
        .unwrap_err();
    assert!(matches!(err, StashError::InvalidReference(_)));
}

#[tokio::test]
async fn test_missing_root() {
    let dir = TempDir::new().unwrap();
    let err = ReleaseImages::with_probe(Arc::new(QuayIsPrivate::default()))
        .process(
            &dir.path().join("missing"),
            &AuxiliarySpecs::default(),
            &options(RelocationTarget::None),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StashError::IoError(_)));
}
