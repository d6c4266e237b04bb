//! Locating configured source files in a data folder.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{IngestError, Result};

/// Lists all CSV files in a directory.
///
/// Returns files sorted by filename.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();

    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::DirectoryRead {
        path: dir.to_path_buf(),
        source: e,
    })?;

    for entry_result in entries {
        let entry = entry_result.map_err(|e| IngestError::DirectoryRead {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

        if is_csv {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(files)
}

/// Source files resolved against a data folder.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredSources {
    /// Source name to the file found for it.
    pub found: BTreeMap<String, PathBuf>,
    /// Source name to the file name that was expected but not found.
    pub missing: BTreeMap<String, String>,
    /// CSV files in the folder that no source refers to.
    pub unused: Vec<PathBuf>,
}

impl DiscoveredSources {
    pub fn path(&self, source: &str) -> Option<&Path> {
        self.found.get(source).map(PathBuf::as_path)
    }
}

/// Resolve configured source file names in `dir`.
///
/// File names match case-insensitively. A configured file that is absent is
/// recorded in [`DiscoveredSources::missing`] rather than failing, so that
/// the remaining sources can still be evaluated.
pub fn discover_sources(
    dir: &Path,
    sources: &BTreeMap<String, String>,
) -> Result<DiscoveredSources> {
    let files = list_csv_files(dir)?;
    let mut by_name: BTreeMap<String, PathBuf> = BTreeMap::new();
    for path in &files {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            by_name
                .entry(name.to_lowercase())
                .or_insert_with(|| path.clone());
        }
    }

    let mut discovered = DiscoveredSources::default();
    for (source, file_name) in sources {
        match by_name.get(&file_name.trim().to_lowercase()) {
            Some(path) => {
                discovered.found.insert(source.clone(), path.clone());
            }
            None => {
                tracing::warn!(source = %source, file = %file_name, "source file not found");
                discovered.missing.insert(source.clone(), file_name.clone());
            }
        }
    }
    discovered.unused = files
        .into_iter()
        .filter(|path| !discovered.found.values().any(|found| found == path))
        .collect();

    Ok(discovered)
}
