//! CLI command definitions and dispatch.

mod images;
mod login;
mod pull_version;
mod push_version;
mod version_info;

use std::path::PathBuf;

use appstash_core::config::{LogLevel, StorageConfig};
use appstash_core::error::Result;
use appstash_runtime::{FileMetadataStore, VersionMetadataIndex};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;

/// Appstash: versioned application storage and image relocation.
#[derive(Parser)]
#[command(name = "appstash", version, about)]
pub struct Cli {
    /// Log level (debug, info, warn, error); overrides RUST_LOG
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Find, classify and plan relocation of the images a release references
    Images(images::ImagesArgs),
    /// Archive a rendered release and push it as a new version
    PushVersion(push_version::PushVersionArgs),
    /// Pull a stored version and unpack it into a directory
    PullVersion(pull_version::PullVersionArgs),
    /// Show the capability flags recorded for a version
    VersionInfo(version_info::VersionInfoArgs),
    /// Store registry credentials
    Login(login::LoginArgs),
}

/// Artifact registry connection flags shared by the version commands.
#[derive(Args, Debug, Clone)]
pub struct StorageArgs {
    /// Artifact registry base URI (default: $STORAGE_BASEURI)
    #[arg(long)]
    pub storage_uri: Option<String>,

    /// Talk plain HTTP to the artifact registry
    #[arg(long)]
    pub plain_http: bool,

    /// Push/pull timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl StorageArgs {
    /// Storage configuration from flags, falling back to the environment.
    pub fn config(&self) -> Result<StorageConfig> {
        let mut config = match &self.storage_uri {
            Some(uri) => {
                let mut config = StorageConfig::new(uri.clone());
                config.plain_http = self.plain_http;
                config
            }
            None => {
                let mut config = StorageConfig::from_env()?;
                config.plain_http |= self.plain_http;
                config
            }
        };
        if let Some(secs) = self.timeout {
            config.timeout_secs = secs;
        }
        Ok(config)
    }
}

/// Version metadata index over `dir`, or `~/.appstash/versions`.
fn open_metadata_index(dir: Option<&PathBuf>) -> Result<VersionMetadataIndex> {
    let store = match dir {
        Some(dir) => FileMetadataStore::new(dir.clone()),
        None => FileMetadataStore::default_path()?,
    };
    Ok(VersionMetadataIndex::new(Arc::new(store)))
}

/// Dispatch a parsed CLI command to its handler.
pub async fn dispatch(cli: Cli) -> std::result::Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Images(args) => images::execute(args).await,
        Command::PushVersion(args) => push_version::execute(args).await,
        Command::PullVersion(args) => pull_version::execute(args).await,
        Command::VersionInfo(args) => version_info::execute(args).await,
        Command::Login(args) => login::execute(args).await,
    }
}
