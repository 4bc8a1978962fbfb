//! Image discovery, classification and relocation.
//!
//! - `scan`: literal image strings referenced by a release
//! - `classify`: which of them need credentials to pull
//! - `relocate`: where they land in a mirror or behind the vendor proxy

pub mod classify;
pub mod pod;
pub mod relocate;
pub mod scan;

pub use classify::{ClassifyOptions, ImageClassifier, OciRegistryProbe, RegistryProbe, Visibility};
pub use pod::{Collector, PodSpec};
pub use relocate::{plan_proxy, RelocationPlanner};
pub use scan::{AuxiliarySpecs, ImageScanner, ParsedDocument, ScanResult};
