//! Tarball Extraction
//!
//! Unpacks npm package tarballs (`.tgz`) into a staging directory. Entries
//! are checked before anything touches the disk:
//! - no absolute paths, `..`, root or prefix components
//! - regular files and directories only (no links or devices)
//! - bounded entry count and total unpacked size

use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};

use crate::utils::error::{AppError, AppResult};

/// Maximum number of entries in one archive.
pub const MAX_ENTRY_COUNT: usize = 10_000;

/// Maximum total unpacked size (500 MB).
pub const MAX_EXTRACTED_SIZE: u64 = 500_000_000;

/// Leading directory npm puts around package contents.
const PACKAGE_PREFIX: &str = "package";

/// Extract a gzip tarball into `dest` (which must exist).
///
/// The leading `package/` directory is stripped, so `dest` becomes the
/// plugin root. Returns the number of entries written.
pub fn extract_tarball(data: &[u8], dest: &Path) -> AppResult<usize> {
    let dest = dest
        .canonicalize()
        .map_err(|e| AppError::install(format!("failed to resolve {}: {}", dest.display(), e)))?;

    let mut archive = Archive::new(GzDecoder::new(data));
    let entries = archive
        .entries()
        .map_err(|e| AppError::install(format!("failed to read archive: {}", e)))?;

    let mut count = 0usize;
    let mut total_size: u64 = 0;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| AppError::install(format!("corrupt archive entry: {}", e)))?;

        count += 1;
        if count > MAX_ENTRY_COUNT {
            return Err(AppError::install(format!(
                "archive has more than {} entries",
                MAX_ENTRY_COUNT
            )));
        }

        let path = entry
            .path()
            .map_err(|e| AppError::install(format!("unreadable entry path: {}", e)))?
            .into_owned();

        let entry_type = entry.header().entry_type();
        if !matches!(entry_type, EntryType::Regular | EntryType::Directory) {
            return Err(AppError::install(format!(
                "archive entry {} has unsupported type {:?}",
                path.display(),
                entry_type
            )));
        }

        total_size = total_size.saturating_add(entry.header().size().unwrap_or(0));
        if total_size > MAX_EXTRACTED_SIZE {
            return Err(AppError::install(format!(
                "archive unpacks to more than {} bytes",
                MAX_EXTRACTED_SIZE
            )));
        }

        check_entry_path(&path)?;

        let relative = strip_package_prefix(&path);
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(&relative);

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
            let parent = parent.canonicalize()?;
            if !parent.starts_with(&dest) {
                return Err(AppError::install(format!(
                    "archive entry {} escapes the plugin directory",
                    path.display()
                )));
            }
        }

        entry
            .unpack(&target)
            .map_err(|e| AppError::install(format!("failed to unpack {}: {}", path.display(), e)))?;
    }

    if count == 0 {
        return Err(AppError::install("archive is empty"));
    }

    Ok(count)
}

fn check_entry_path(path: &Path) -> AppResult<()> {
    let unsafe_component = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if path.is_absolute() || unsafe_component {
        return Err(AppError::install(format!(
            "archive entry {} has an unsafe path",
            path.display()
        )));
    }
    Ok(())
}

fn strip_package_prefix(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == PACKAGE_PREFIX => components.as_path().to_path_buf(),
        _ => path.to_path_buf(),
    }
}
