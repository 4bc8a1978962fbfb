//! Gzip tar archives of release directories.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use appstash_core::error::{Result, StashError};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};

/// Build a `.tar.gz` in memory.
///
/// Each listed directory becomes a top-level folder named after its basename.
/// Directories that do not exist are left out; a path that exists but is not a
/// directory is an error. Symlinks are stored as links, never followed.
pub fn build_archive(dirs: &[PathBuf]) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);
    builder.follow_symlinks(false);

    let mut folders = HashSet::new();
    for dir in dirs {
        if !dir.exists() {
            tracing::debug!(path = %dir.display(), "Directory missing, not archived");
            continue;
        }
        if !dir.is_dir() {
            return Err(StashError::Other(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        let folder = dir.file_name().ok_or_else(|| {
            StashError::Other(format!("{} has no folder name", dir.display()))
        })?;
        if !folders.insert(folder.to_os_string()) {
            return Err(StashError::Other(format!(
                "two directories would both be archived as '{}'",
                folder.to_string_lossy()
            )));
        }

        builder.append_dir_all(folder, dir)?;
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

/// Unpack a `.tar.gz` into `target_dir`, creating it if needed.
pub fn unpack_archive(data: &[u8], target_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(target_dir)?;

    let mut archive = Archive::new(GzDecoder::new(data));
    archive.unpack(target_dir)?;

    tracing::debug!(
        target = %target_dir.display(),
        bytes = data.len(),
        "Unpacked archive"
    );
    Ok(())
}
