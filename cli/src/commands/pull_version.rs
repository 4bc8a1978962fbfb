//! `appstash pull-version` command.

use std::path::{Path, PathBuf};

use appstash_runtime::ArtifactStore;
use clap::Args;

use super::StorageArgs;

#[derive(Args)]
pub struct PullVersionArgs {
    /// Application id
    pub app_id: String,

    /// Version sequence number
    pub sequence: i64,

    /// Directory to unpack the release into (created if missing, must be empty)
    #[arg(short, long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub storage: StorageArgs,
}

pub async fn execute(args: PullVersionArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.output.exists() && std::fs::read_dir(&args.output)?.next().is_some() {
        return Err(format!("{} is not empty", args.output.display()).into());
    }

    let store = ArtifactStore::new(args.storage.config()?);
    let pulled = store.get_version_archive(&args.app_id, args.sequence).await?;

    copy_dir_recursive(pulled.path(), &args.output)?;

    println!(
        "Pulled {} into {}",
        store.reference(&args.app_id, args.sequence),
        args.output.display()
    );
    Ok(())
}

/// Recursively copy a directory, recreating symlinks rather than following them.
fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else if file_type.is_symlink() {
            copy_symlink(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(std::fs::read_link(src)?, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::copy(src, dst).map(|_| ())
}
