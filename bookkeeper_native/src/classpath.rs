//! Class path assembly from a directory of jars.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Regular files directly under `directory` with a `.jar` extension,
/// sorted by path.
pub fn list_archives(directory: &Path) -> io::Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "jar") {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}

/// `list_archives` joined with `:`. An unreadable directory is logged and
/// yields an empty class path.
pub fn build_classpath(directory: &Path) -> String {
    match list_archives(directory) {
        Ok(archives) => {
            debug!(dir = %directory.display(), jars = archives.len(), "class path assembled");
            archives
                .iter()
                .map(|p| p.to_string_lossy())
                .collect::<Vec<_>>()
                .join(":")
        }
        Err(err) => {
            warn!(dir = %directory.display(), error = %err, "cannot list jar directory, class path is empty");
            String::new()
        }
    }
}
