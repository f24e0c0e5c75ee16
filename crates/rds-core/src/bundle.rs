//! Zip bundling for code payloads (`files_zipped`). Bundles exist only on
//! the wire: the sender packs a file or folder, the receiver extracts it
//! next to its store and drops the bytes.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{RdsError, Result};

/// Patterns skipped when packing a folder, unless the caller overrides them.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] =
    &[".venv", "__pycache__", "*.pyc", ".DS_Store", ".git"];

fn build_ignore_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| RdsError::Validation(format!("bad ignore pattern '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| RdsError::Validation(format!("bad ignore patterns: {e}")))
}

fn is_ignored(rel_path: &Path, ignore: &GlobSet) -> bool {
    // Match the whole relative path and every component, so a bare
    // directory name like `.venv` prunes the entire subtree.
    if ignore.is_match(rel_path) {
        return true;
    }
    rel_path
        .components()
        .any(|component| ignore.is_match(Path::new(component.as_os_str())))
}

/// Pack a single file into a bundle holding just that file.
pub fn pack_file(path: &Path) -> Result<Vec<u8>> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| RdsError::Validation(format!("not a file path: {}", path.display())))?;
    let contents = std::fs::read(path)?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(file_name, SimpleFileOptions::default())
        .map_err(|e| RdsError::Validation(format!("zip error: {e}")))?;
    writer.write_all(&contents)?;
    let cursor = writer
        .finish()
        .map_err(|e| RdsError::Validation(format!("zip error: {e}")))?;
    Ok(cursor.into_inner())
}

/// Pack a folder, skipping anything matching the ignore patterns. An empty
/// pattern list packs everything.
pub fn pack_dir(dir: &Path, ignore_patterns: &[String]) -> Result<Vec<u8>> {
    let ignore = build_ignore_set(ignore_patterns)?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel_path = entry
            .path()
            .strip_prefix(dir)
            .expect("walkdir stays under its root");
        if is_ignored(rel_path, &ignore) {
            continue;
        }
        let name = rel_path.to_string_lossy().replace('\\', "/");
        writer
            .start_file(name, SimpleFileOptions::default())
            .map_err(|e| RdsError::Validation(format!("zip error: {e}")))?;
        let contents = std::fs::read(entry.path())?;
        writer.write_all(&contents)?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| RdsError::Validation(format!("zip error: {e}")))?;
    Ok(cursor.into_inner())
}

/// Extract a bundle under `dest`, refusing entries that would escape it.
pub fn unpack(bytes: &[u8], dest: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| RdsError::Validation(format!("bad code bundle: {e}")))?;
    std::fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| RdsError::Validation(format!("bad code bundle: {e}")))?;
        let Some(rel_path) = entry.enclosed_name() else {
            return Err(RdsError::Validation(format!(
                "bundle entry escapes extraction root: {}",
                entry.name()
            )));
        };
        let out_path = dest.join(rel_path);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        std::fs::write(&out_path, contents)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(patterns: &[&str]) -> Vec<String> {
        patterns.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn file_bundle_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("main.py");
        std::fs::write(&src, "print('hi')\n").unwrap();

        let bytes = pack_file(&src).unwrap();
        let dest = dir.path().join("out");
        unpack(&bytes, &dest).unwrap();

        assert_eq!(
            std::fs::read_to_string(dest.join("main.py")).unwrap(),
            "print('hi')\n"
        );
    }

    #[test]
    fn default_patterns_prune_ignored_trees() {
        let dir = tempfile::tempdir().unwrap();
        let code = dir.path().join("code");
        std::fs::create_dir_all(code.join(".venv")).unwrap();
        std::fs::create_dir_all(code.join("__pycache__")).unwrap();
        std::fs::write(code.join("main.py"), "print('main')").unwrap();
        std::fs::write(code.join("utils.py"), "pass").unwrap();
        std::fs::write(code.join(".venv/lib.py"), "# venv").unwrap();
        std::fs::write(code.join("__pycache__/main.pyc"), "# compiled").unwrap();
        std::fs::write(code.join("stale.pyc"), "# compiled").unwrap();
        std::fs::write(code.join(".DS_Store"), "# mac").unwrap();

        let bytes = pack_dir(&code, &strings(DEFAULT_IGNORE_PATTERNS)).unwrap();
        let dest = dir.path().join("out");
        unpack(&bytes, &dest).unwrap();

        assert!(dest.join("main.py").exists());
        assert!(dest.join("utils.py").exists());
        assert!(!dest.join(".venv").exists());
        assert!(!dest.join("__pycache__").exists());
        assert!(!dest.join("stale.pyc").exists());
        assert!(!dest.join(".DS_Store").exists());
    }

    #[test]
    fn custom_patterns_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let code = dir.path().join("code");
        std::fs::create_dir_all(&code).unwrap();
        std::fs::write(code.join("main.py"), "print('main')").unwrap();
        std::fs::write(code.join("config.json"), "{}").unwrap();
        std::fs::write(code.join("secret.key"), "secret").unwrap();
        std::fs::write(code.join("data.csv"), "a,b,c").unwrap();

        let bytes = pack_dir(&code, &strings(&["*.key", "*.csv"])).unwrap();
        let dest = dir.path().join("out");
        unpack(&bytes, &dest).unwrap();

        assert!(dest.join("main.py").exists());
        assert!(dest.join("config.json").exists());
        assert!(!dest.join("secret.key").exists());
        assert!(!dest.join("data.csv").exists());
    }

    #[test]
    fn empty_patterns_pack_everything() {
        let dir = tempfile::tempdir().unwrap();
        let code = dir.path().join("code");
        std::fs::create_dir_all(code.join(".venv")).unwrap();
        std::fs::write(code.join("main.py"), "print('main')").unwrap();
        std::fs::write(code.join(".venv/lib.py"), "# venv").unwrap();
        std::fs::write(code.join("stale.pyc"), "# compiled").unwrap();

        let bytes = pack_dir(&code, &[]).unwrap();
        let dest = dir.path().join("out");
        unpack(&bytes, &dest).unwrap();

        assert!(dest.join("main.py").exists());
        assert!(dest.join(".venv/lib.py").exists());
        assert!(dest.join("stale.pyc").exists());
    }
}
