//! Pod specifications and diagnostic collectors.
//!
//! Only the parts that carry image references are modelled; everything else
//! in a document is ignored.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// The image-bearing part of a Kubernetes pod specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub init_containers: Vec<Container>,
    #[serde(default)]
    pub ephemeral_containers: Vec<Container>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
}

impl PodSpec {
    /// Image fields of every container, init container and ephemeral
    /// container, verbatim, skipping empty ones.
    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.containers
            .iter()
            .chain(&self.init_containers)
            .chain(&self.ephemeral_containers)
            .map(|c| c.image.as_str())
            .filter(|image| !image.is_empty())
    }
}

/// Every pod specification reachable from a document.
///
/// A pod specification is any mapping with a `containers` sequence: the
/// document itself for a Pod, `spec.template.spec` for workloads,
/// `spec.jobTemplate.spec.template.spec` for CronJobs, or any other embedding.
/// The walk does not descend into a pod specification once found.
pub fn find_pod_specs(value: &Value) -> Vec<PodSpec> {
    let mut specs = Vec::new();
    walk(value, &mut specs);
    specs
}

fn walk(value: &Value, specs: &mut Vec<PodSpec>) {
    match value {
        Value::Mapping(map) => {
            if matches!(map.get("containers"), Some(Value::Sequence(_))) {
                if let Ok(spec) = serde_yaml::from_value::<PodSpec>(value.clone()) {
                    specs.push(spec);
                    return;
                }
            }
            for child in map.values() {
                walk(child, specs);
            }
        }
        Value::Sequence(items) => {
            for item in items {
                walk(item, specs);
            }
        }
        Value::Tagged(tagged) => walk(&tagged.value, specs),
        _ => {}
    }
}

/// `run` collector: a bare image to run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCollector {
    #[serde(default)]
    pub collector_name: Option<String>,
    #[serde(default)]
    pub image: String,
}

/// `runPod` collector: a full pod specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPodCollector {
    #[serde(default)]
    pub collector_name: Option<String>,
    #[serde(default)]
    pub pod_spec: PodSpec,
}

/// A diagnostic collector that references container images.
#[derive(Debug, Clone, PartialEq)]
pub enum Collector {
    Run(RunCollector),
    RunPod(RunPodCollector),
}

impl Collector {
    /// Collector for a bare image.
    pub fn run(image: impl Into<String>) -> Self {
        Collector::Run(RunCollector {
            collector_name: None,
            image: image.into(),
        })
    }

    /// Collector for an embedded pod specification.
    pub fn run_pod(pod_spec: PodSpec) -> Self {
        Collector::RunPod(RunPodCollector {
            collector_name: None,
            pod_spec,
        })
    }

    /// Images referenced by this collector, verbatim.
    pub fn images(&self) -> Vec<&str> {
        match self {
            Collector::Run(run) if !run.image.is_empty() => vec![run.image.as_str()],
            Collector::Run(_) => Vec::new(),
            Collector::RunPod(run_pod) => run_pod.pod_spec.images().collect(),
        }
    }

    /// Read one entry of a `spec.collectors` list.
    ///
    /// Returns `None` for collector kinds that reference no images
    /// (`clusterInfo`, `logs`, ...) or for entries that do not decode.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_mapping()?;
        if let Some(run) = map.get("run") {
            return serde_yaml::from_value(run.clone()).ok().map(Collector::Run);
        }
        if let Some(run_pod) = map.get("runPod") {
            return serde_yaml::from_value(run_pod.clone())
                .ok()
                .map(Collector::RunPod);
        }
        None
    }
}
