//! Owner-side file coordination: dataset tree placement, schema inference,
//! and artifact copying. These managers touch the filesystem only; records
//! always go through the RPC path.

pub mod dataset;

use std::path::Path;

use rds_core::Result;
use walkdir::WalkDir;

/// Copy a file or a whole directory tree under `dest`.
pub fn copy_into(src: &Path, dest: &Path) -> Result<()> {
    if src.is_file() {
        std::fs::create_dir_all(dest)?;
        let file_name = src.file_name().expect("file path has a name");
        std::fs::copy(src, dest.join(file_name))?;
        return Ok(());
    }
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(std::io::Error::from)?;
        let rel_path = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir stays under its root");
        let target = dest.join(rel_path);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Remove a directory tree, tolerating its absence.
pub fn remove_tree(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
