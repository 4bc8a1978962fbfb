//! `appstash push-version` command.

use std::path::PathBuf;

use appstash_core::version::AppVersionEnvelope;
use appstash_runtime::ArtifactStore;
use clap::Args;

use super::StorageArgs;
use crate::output;

#[derive(Args)]
pub struct PushVersionArgs {
    /// Application id
    pub app_id: String,

    /// Version sequence number
    pub sequence: i64,

    /// Rendered release root (holding upstream/, base/, overlays/)
    pub root: PathBuf,

    /// Archive these directories instead of the release layout (repeatable)
    #[arg(long = "dir")]
    pub dirs: Vec<PathBuf>,

    /// License document to record with the version
    #[arg(long)]
    pub license: Option<PathBuf>,

    /// Application spec document to record with the version
    #[arg(long)]
    pub app_spec: Option<PathBuf>,

    /// Config values document to record with the version
    #[arg(long)]
    pub config_values: Option<PathBuf>,

    /// Version label to record with the version
    #[arg(long)]
    pub version_label: Option<String>,

    /// Version metadata directory (default: ~/.appstash/versions)
    #[arg(long)]
    pub metadata_dir: Option<PathBuf>,

    #[command(flatten)]
    pub storage: StorageArgs,
}

impl PushVersionArgs {
    fn has_metadata(&self) -> bool {
        self.license.is_some() || self.app_spec.is_some() || self.config_values.is_some()
    }

    fn envelope(&self) -> std::io::Result<AppVersionEnvelope> {
        let read = |path: &Option<PathBuf>| -> std::io::Result<String> {
            match path {
                Some(path) => std::fs::read_to_string(path),
                None => Ok(String::new()),
            }
        };
        Ok(AppVersionEnvelope {
            sequence: self.sequence,
            version_label: self.version_label.clone(),
            created_at: Some(chrono::Utc::now()),
            license: read(&self.license)?,
            app_spec: read(&self.app_spec)?,
            config_values: read(&self.config_values)?,
        })
    }
}

pub async fn execute(args: PushVersionArgs) -> Result<(), Box<dyn std::error::Error>> {
    // Read everything up front so a bad path fails before anything is pushed.
    let envelope = if args.has_metadata() {
        Some(args.envelope()?)
    } else {
        None
    };
    let index = match envelope {
        Some(_) => Some(super::open_metadata_index(args.metadata_dir.as_ref())?),
        None => None,
    };
    // Recorded versions are immutable; refuse before the artifact is overwritten.
    if let Some(index) = &index {
        index.ensure_absent(&args.app_id, args.sequence)?;
    }

    let store = ArtifactStore::new(args.storage.config()?);
    let pushed = if args.dirs.is_empty() {
        store
            .create_app_version_archive(&args.app_id, args.sequence, &args.root)
            .await?
    } else {
        let dirs: Vec<PathBuf> = args.dirs.iter().map(|d| args.root.join(d)).collect();
        store
            .put_version_archive(&args.app_id, args.sequence, &dirs)
            .await?
    };

    if let (Some(index), Some(envelope)) = (index, envelope) {
        index.put_version_metadata(&args.app_id, args.sequence, &envelope)?;
    }

    println!("Pushed {}", pushed.reference);
    println!("Digest: {}", pushed.digest);
    println!("Size: {}", output::format_bytes(pushed.size));
    Ok(())
}
