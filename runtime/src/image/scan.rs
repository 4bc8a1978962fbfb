//! Image discovery across rendered manifests and auxiliary specs.
//!
//! Every file under the root is parsed independently; a file (or a single
//! document inside a multi-document file) that does not parse is dropped and
//! recorded, never fatal.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use appstash_core::error::{Result, StashError};
use appstash_core::version::ApplicationDocument;
use serde::Deserialize;
use serde_yaml::Value;

use super::pod::{find_pod_specs, Collector};

/// Kinds whose pod specs are collectors, reached only through `AuxiliarySpecs`.
const COLLECTOR_KINDS: &[&str] = &["Preflight", "SupportBundle"];

/// A successfully parsed manifest document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    /// File the document came from
    pub path: PathBuf,
    /// Position of the document within its file
    pub index: usize,
    pub value: Value,
}

impl ParsedDocument {
    /// `kind` of the document, if present.
    pub fn kind(&self) -> Option<&str> {
        self.value.get("kind").and_then(Value::as_str)
    }

    /// Whether the document declares collectors rather than workloads.
    pub fn is_collector_kind(&self) -> bool {
        self.kind().is_some_and(|kind| COLLECTOR_KINDS.contains(&kind))
    }

    /// Images of every pod specification in the document, verbatim.
    pub fn images(&self) -> Vec<String> {
        find_pod_specs(&self.value)
            .iter()
            .flat_map(|spec| spec.images().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }
}

/// Image sources that are not manifests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuxiliarySpecs {
    /// Images listed explicitly, taken verbatim
    pub additional_images: Vec<String>,
    pub collectors: Vec<Collector>,
}

impl AuxiliarySpecs {
    pub fn new(additional_images: Vec<String>, collectors: Vec<Collector>) -> Self {
        Self {
            additional_images,
            collectors,
        }
    }

    /// Auxiliary specs declared by the application's own kinds.
    ///
    /// Reads `spec.additionalImages` of `Application` documents and the
    /// image-bearing `spec.collectors` of `Preflight` and `SupportBundle`
    /// documents.
    pub fn from_documents(documents: &[ParsedDocument]) -> Self {
        let mut specs = Self::default();
        for doc in documents {
            match doc.kind() {
                Some("Application") => {
                    if let Ok(app) = ApplicationDocument::deserialize(doc.value.clone()) {
                        specs.additional_images.extend(app.spec.additional_images);
                    }
                }
                _ if doc.is_collector_kind() => {
                    let collectors = doc
                        .value
                        .get("spec")
                        .and_then(|spec| spec.get("collectors"))
                        .and_then(Value::as_sequence);
                    if let Some(collectors) = collectors {
                        specs
                            .collectors
                            .extend(collectors.iter().filter_map(Collector::from_value));
                    }
                }
                _ => {}
            }
        }
        specs
    }

    /// Concatenate two inputs, `self` first.
    pub fn merge(mut self, other: AuxiliarySpecs) -> Self {
        self.additional_images.extend(other.additional_images);
        self.collectors.extend(other.collectors);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.additional_images.is_empty() && self.collectors.is_empty()
    }
}

/// Outcome of one scan pass.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Distinct literal images in first-encounter order
    pub images: Vec<String>,
    pub documents: Vec<ParsedDocument>,
    /// Documents that were dropped, as `StashError::ParseError`
    pub failures: Vec<StashError>,
}

/// Finds the literal image strings a release references.
#[derive(Debug, Clone, Default)]
pub struct ImageScanner {
    include_app_kinds: bool,
}

impl ImageScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also take images from `Application`, `Preflight` and `SupportBundle`
    /// documents found under the root (after the caller's explicit list).
    pub fn with_app_kinds(mut self, include: bool) -> Self {
        self.include_app_kinds = include;
        self
    }

    /// Scan `root` and the auxiliary specs.
    ///
    /// Order of the result: explicit images, then documents in sorted path
    /// order, then collectors. A missing root is an error; an empty one is not.
    pub fn scan(&self, root: &Path, aux: &AuxiliarySpecs) -> Result<ScanResult> {
        let (documents, failures) = load_documents(root)?;

        let images = if self.include_app_kinds {
            let aux = aux.clone().merge(AuxiliarySpecs::from_documents(&documents));
            collect_images(&documents, &aux)
        } else {
            collect_images(&documents, aux)
        };

        tracing::debug!(
            root = %root.display(),
            documents = documents.len(),
            skipped = failures.len(),
            images = images.len(),
            "Scanned release manifests"
        );

        Ok(ScanResult {
            images,
            documents,
            failures,
        })
    }
}

/// Distinct images from already parsed documents and auxiliary specs.
///
/// `Preflight` and `SupportBundle` documents are not walked; their images
/// keep their collector position when the caller lists them as collectors.
pub fn collect_images(documents: &[ParsedDocument], aux: &AuxiliarySpecs) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();
    let mut add = |image: &str| {
        if seen.insert(image.to_string()) {
            images.push(image.to_string());
        }
    };

    for image in &aux.additional_images {
        add(image.as_str());
    }
    for doc in documents.iter().filter(|doc| !doc.is_collector_kind()) {
        for image in doc.images() {
            add(image.as_str());
        }
    }
    for collector in &aux.collectors {
        for image in collector.images() {
            add(image);
        }
    }

    images
}

/// Parse every file under `root`, accumulating successes and failures
/// separately.
pub fn load_documents(root: &Path) -> Result<(Vec<ParsedDocument>, Vec<StashError>)> {
    let mut files = Vec::new();
    list_files(root, &mut files)?;

    let mut documents = Vec::new();
    let mut failures = Vec::new();
    for path in files {
        match std::fs::read_to_string(&path) {
            Ok(text) => parse_file(&path, &text, &mut documents, &mut failures),
            Err(e) => failures.push(parse_error(&path, e.to_string())),
        }
    }

    for failure in &failures {
        tracing::debug!(error = %failure, "Skipping unparsable document");
    }

    Ok((documents, failures))
}

fn parse_file(
    path: &Path,
    text: &str,
    documents: &mut Vec<ParsedDocument>,
    failures: &mut Vec<StashError>,
) {
    for (index, de) in serde_yaml::Deserializer::from_str(text).enumerate() {
        match Value::deserialize(de) {
            Ok(Value::Null) => {}
            Ok(value @ Value::Mapping(_)) => documents.push(ParsedDocument {
                path: path.to_path_buf(),
                index,
                value,
            }),
            Ok(_) => failures.push(parse_error(path, format!("document {} is not a mapping", index))),
            Err(e) => {
                // The rest of the stream cannot be trusted after a syntax error.
                failures.push(parse_error(path, format!("document {}: {}", index, e)));
                break;
            }
        }
    }
}

fn parse_error(path: &Path, message: String) -> StashError {
    StashError::ParseError {
        path: path.display().to_string(),
        message,
    }
}

/// Recursively list regular files in sorted order. Symlinked directories are
/// not followed.
fn list_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            list_files(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::pod::PodSpec;
    use std::fs;
    use tempfile::TempDir;

    const DEPLOYMENT: &str = r#"
apiVersion: apps/v1
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
"#;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_empty_root() {
        let tmp = TempDir::new().unwrap();
        let result = ImageScanner::new()
            .scan(tmp.path(), &AuxiliarySpecs::default())
            .unwrap();
        assert!(result.images.is_empty());
        assert!(result.documents.is_empty());
        assert!(result.failures.is_empty());
    }

    #[test]
    fn test_missing_root_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = ImageScanner::new().scan(&tmp.path().join("nope"), &AuxiliarySpecs::default());
        assert!(matches!(result, Err(StashError::IoError(_))));
    }

    #[test]
    fn test_keeps_every_distinct_spelling() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "deployment.yaml", DEPLOYMENT);

        let result = ImageScanner::new()
            .scan(tmp.path(), &AuxiliarySpecs::default())
            .unwrap();
        assert_eq!(
            result.images,
            vec!["busybox", "docker.io/library/busybox", "library/busybox"]
        );
    }

    #[test]
    fn test_order_explicit_documents_collectors() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "b.yaml", "kind: Pod\nspec:\n  containers:\n    - image: nginx:1\n");
        write(tmp.path(), "a.yaml", "kind: Pod\nspec:\n  containers:\n    - image: redis:7\n");

        let aux = AuxiliarySpecs::new(
            vec!["registry.replicated.com/appslug/image:version".to_string()],
            vec![
                Collector::run("quay.io/replicatedcom/qa-kots-1:alpine-3.5"),
                Collector::run_pod(PodSpec {
                    containers: vec![crate::image::pod::Container {
                        name: "x".to_string(),
                        image: "nginx:1".to_string(),
                    }],
                    ..Default::default()
                }),
            ],
        );

        let result = ImageScanner::new().scan(tmp.path(), &aux).unwrap();
        assert_eq!(
            result.images,
            vec![
                "registry.replicated.com/appslug/image:version",
                "redis:7",
                "nginx:1",
                "quay.io/replicatedcom/qa-kots-1:alpine-3.5",
            ]
        );
    }

    #[test]
    fn test_parse_failures_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "good.yaml", DEPLOYMENT);
        write(tmp.path(), "bad.yaml", "kind: [unterminated\n");
        write(tmp.path(), "notes.txt", "just some words");

        let result = ImageScanner::new()
            .scan(tmp.path(), &AuxiliarySpecs::default())
            .unwrap();
        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.failures.len(), 2);
        assert!(result.failures.iter().all(StashError::is_recoverable));
        assert_eq!(result.images.len(), 3);
    }

    #[test]
    fn test_multi_document_file_and_nested_dirs() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "overlays/midstream/all.yaml",
            "kind: Pod\nspec:\n  containers:\n    - image: a:1\n---\n---\nkind: Pod\nspec:\n  containers:\n    - image: b:1\n",
        );
        write(tmp.path(), "base/pod.json", r#"{"kind":"Pod","spec":{"containers":[{"image":"c:1"}]}}"#);

        let result = ImageScanner::new()
            .scan(tmp.path(), &AuxiliarySpecs::default())
            .unwrap();
        assert_eq!(result.documents.len(), 3);
        assert_eq!(result.images, vec!["c:1", "a:1", "b:1"]);
    }

    #[test]
    fn test_scan_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        for i in 0..10 {
            write(
                tmp.path(),
                &format!("pod-{}.yaml", i),
                &format!("kind: Pod\nspec:\n  containers:\n    - image: img-{}:1\n", i),
            );
        }
        let aux = AuxiliarySpecs::new(vec!["extra:1".to_string()], vec![Collector::run("c:1")]);

        let first = ImageScanner::new().scan(tmp.path(), &aux).unwrap();
        let second = ImageScanner::new().scan(tmp.path(), &aux).unwrap();
        assert_eq!(first.images, second.images);
        assert_eq!(first.images.len(), 12);
    }

    #[test]
    fn test_app_kinds() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "kots-app.yaml",
            "apiVersion: kots.io/v1beta1\nkind: Application\nspec:\n  additionalImages:\n    - registry.replicated.com/appslug/image:version\n",
        );
        write(
            tmp.path(),
            "preflight.yaml",
            r#"
apiVersion: troubleshoot.sh/v1beta2
kind: Preflight
spec:
  collectors:
    - clusterInfo: {}
    - run:
        image: quay.io/replicatedcom/qa-kots-1:alpine-3.5
    - runPod:
        podSpec:
          containers:
            - image: nginx:1
"#,
        );

        write(tmp.path(), "z-pod.yaml", "kind: Pod\nspec:\n  containers:\n    - image: redis:7\n");

        // The Preflight's runPod spec is a collector, not a workload.
        let without = ImageScanner::new()
            .scan(tmp.path(), &AuxiliarySpecs::default())
            .unwrap();
        assert_eq!(without.images, vec!["redis:7"]);

        let with = ImageScanner::new()
            .with_app_kinds(true)
            .scan(tmp.path(), &AuxiliarySpecs::default())
            .unwrap();
        assert_eq!(
            with.images,
            vec![
                "registry.replicated.com/appslug/image:version",
                "redis:7",
                "quay.io/replicatedcom/qa-kots-1:alpine-3.5",
                "nginx:1",
            ]
        );
    }
}
