//! Copying static assets into the output directory

use std::path::Path;

use tracing::{debug, info};
use walkdir::WalkDir;

use super::writer::{create_dir_all, AtomicFileWriter};
use crate::error::{GenError, Result};

/// Copy every file under `src` to the same relative path under `dst`.
///
/// Copies keep the permissions of their source file.
///
/// Returns the number of files copied.
pub fn copy_static_files(src: &Path, dst: &Path) -> Result<usize> {
    if !src.is_dir() {
        return Err(GenError::Config(format!(
            "static_dir {} is not a directory",
            src.display()
        )));
    }

    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(std::io::Error::from)?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            create_dir_all(&target)?;
        } else {
            debug!("Copying {} to {}", entry.path().display(), target.display());
            AtomicFileWriter.copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    info!("Copied {} static files from {}", copied, src.display());
    Ok(copied)
}
