//! What the previous render produced.
//!
//! The manifest lives in the cache directory under a dot-name, so the cache
//! never treats it as a bucket. It records a fingerprint of everything the
//! templates read from the configuration, plus every page written, so a
//! later render can tell when all pages are dirty and which pages no longer
//! belong to the site.

use lectern_core::Config;
use lectern_incremental::Digest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = ".render-manifest.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderManifest {
    /// Digest of the page-shaping configuration
    pub fingerprint: String,
    /// Pages relative to the output directory
    pub pages: BTreeSet<PathBuf>,
}

impl RenderManifest {
    /// Read the manifest at `path`; missing or unreadable means empty
    pub fn load(path: &Path) -> Self {
        let Ok(raw) = fs::read(path) else {
            return Self::default();
        };
        serde_json::from_slice(&raw).unwrap_or_else(|err| {
            tracing::debug!("ignoring unreadable render manifest {:?}: {}", path, err);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self).map_err(io::Error::other)?;
        fs::write(path, json)
    }
}

/// Digest of the configuration that reaches the templates
pub fn fingerprint(config: &Config) -> String {
    let mut components: Vec<String> = vec![
        env!("CARGO_PKG_VERSION").to_string(),
        config.site.title.clone(),
        config.site.author.clone(),
        config.site.description.clone(),
        config.site.url.clone(),
        config.permalink.clone(),
    ];
    for view in &config.views {
        components.push(format!(
            "{}:{:?}:{}",
            view.name,
            view.kind,
            view.path.as_deref().unwrap_or("")
        ));
    }

    let bytes: Vec<&[u8]> = components.iter().map(|c| c.as_bytes()).collect();
    Digest::from_components(&bytes).to_hex()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_or_corrupt_manifest_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        assert_eq!(RenderManifest::load(&path), RenderManifest::default());

        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(RenderManifest::load(&path), RenderManifest::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache").join(MANIFEST_FILE);
        let manifest = RenderManifest {
            fingerprint: "abc".into(),
            pages: [PathBuf::from("index.html"), PathBuf::from("2024/a/index.html")]
                .into_iter()
                .collect(),
        };
        manifest.save(&path).unwrap();
        assert_eq!(RenderManifest::load(&path), manifest);
    }

    #[test]
    fn test_fingerprint_follows_site_metadata() {
        let mut config = Config::default();
        let before = fingerprint(&config);
        assert_eq!(before, fingerprint(&config));

        config.site.title = "Renamed".into();
        assert_ne!(fingerprint(&config), before);

        let renamed = fingerprint(&config);
        config.summarize.max_words = 3;
        assert_eq!(fingerprint(&config), renamed);
    }
}
