//! Filesystem utilities

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;

/// Create a directory and all parent directories if they don't exist
pub fn create_dir_all(path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    if !path.is_dir() {
        fs::create_dir_all(path)?;
        info!("Created directory: {}", path.display());
    }
    Ok(())
}

/// Make sure the directory a file will live in exists
pub fn ensure_parent_dir(file: impl AsRef<Path>) -> io::Result<()> {
    match file.as_ref().parent() {
        Some(parent) if !parent.as_os_str().is_empty() => create_dir_all(parent),
        _ => Ok(()),
    }
}

/// List regular files in `dir` whose extension is `extension`, sorted by file name
///
/// Subdirectories are not descended into.
pub fn list_files_with_extension(dir: impl AsRef<Path>, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut files = vec![];
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) == Some(extension) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
