//! Entry discovery and loading.

use crate::config::Config;
use crate::entry::Entry;
use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file that could not be turned into an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Find every entry file under the content directory.
///
/// Hidden files and directories are skipped, as are paths matching one of
/// the configured ignore globs (matched against the path relative to the
/// content directory).
pub fn discover_entries(config: &Config) -> std::io::Result<Vec<PathBuf>> {
    let content_dir = config.content_dir();
    let ignores = compile_ignore_patterns(&config.ignore);
    let mut files = Vec::new();

    for entry in WalkDir::new(&content_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
    {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() || !has_extension(entry.path(), &config.extensions) {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(&content_dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .to_string();
        if ignores.iter().any(|p| p.matches(&rel)) {
            tracing::debug!("Ignoring {} due to ignore patterns", rel);
            continue;
        }

        files.push(entry.into_path());
    }

    Ok(files)
}

/// Load every discovered entry, newest first.
///
/// Files that fail to load are reported rather than aborting the build.
pub fn load_entries(config: &Config) -> std::io::Result<(Vec<Entry>, Vec<EntryFailure>)> {
    let mut entries = Vec::new();
    let mut failures = Vec::new();

    for path in discover_entries(config)? {
        match Entry::load(&path, config) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                tracing::warn!("Skipping {:?}: {}", path, err);
                failures.push(EntryFailure {
                    path,
                    message: err.to_string(),
                });
            }
        }
    }

    entries.sort_by(|a, b| {
        b.date()
            .cmp(&a.date())
            .then_with(|| a.filename.cmp(&b.filename))
    });
    tracing::info!("Loaded {} entries ({} skipped)", entries.len(), failures.len());

    Ok((entries, failures))
}

fn compile_ignore_patterns(patterns: &[String]) -> Vec<Pattern> {
    let mut compiled = Vec::new();
    for pat in patterns {
        match Pattern::new(pat) {
            Ok(p) => compiled.push(p),
            Err(err) => tracing::warn!("Invalid ignore pattern '{}': {}", pat, err),
        }
    }
    compiled
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}
