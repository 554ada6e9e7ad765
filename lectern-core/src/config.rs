//! Configuration parsing and management.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Duplicate view name: {0}")]
    DuplicateView(String),
}

/// Main configuration struct matching the lectern.yml schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Filters applied to every entry in every view
    #[serde(default = "default_filters")]
    pub filters: Vec<String>,

    /// Permalink format, e.g. `/:year/:slug/`
    #[serde(default = "default_permalink")]
    pub permalink: String,

    /// Glob patterns (relative to the content dir) to skip
    #[serde(default)]
    pub ignore: Vec<String>,

    /// File extensions treated as entries
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Degrade unknown or broken filters to no-ops instead of failing
    #[serde(default)]
    pub ignore_errors: bool,

    #[serde(default)]
    pub summarize: SummarizeConfig,

    #[serde(default = "default_views")]
    pub views: Vec<ViewConfig>,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache/lectern")
}

fn default_filters() -> Vec<String> {
    vec!["markdown".to_string()]
}

fn default_permalink() -> String {
    String::from("/:year/:slug/")
}

fn default_extensions() -> Vec<String> {
    vec!["md".into(), "markdown".into(), "txt".into()]
}

fn default_views() -> Vec<ViewConfig> {
    vec![
        ViewConfig {
            name: "entry".into(),
            kind: ViewKind::Entry,
            path: None,
            filters: Vec::new(),
        },
        ViewConfig {
            name: "index".into(),
            kind: ViewKind::Index,
            path: Some("/".into()),
            filters: vec!["summarize".into()],
        },
    ]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeConfig {
    #[serde(default = "default_max_words")]
    pub max_words: usize,

    #[serde(default = "default_link_text")]
    pub link_text: String,
}

fn default_max_words() -> usize {
    100
}

fn default_link_text() -> String {
    String::from("continue")
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            max_words: default_max_words(),
            link_text: default_link_text(),
        }
    }
}

/// What a view renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    /// One page per entry, at the entry's permalink
    Entry,
    /// One page listing every published entry
    Index,
}

/// A view: a way of rendering entries, with its own filters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    pub name: String,
    pub kind: ViewKind,

    /// Route under the output directory the view renders into
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub filters: Vec<String>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;

        // Store config file path for relative path resolution
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for view in &self.views {
            if !seen.insert(view.name.as_str()) {
                return Err(ConfigError::DuplicateView(view.name.clone()));
            }
        }
        Ok(())
    }

    /// Get the content directory, resolved relative to config file
    pub fn content_dir(&self) -> PathBuf {
        self.resolve_path(&self.content_dir)
    }

    /// Get the output directory, resolved relative to config file
    pub fn output_dir(&self) -> PathBuf {
        self.resolve_path(&self.output_dir)
    }

    /// Get the cache directory, resolved relative to config file
    pub fn cache_dir(&self) -> PathBuf {
        self.resolve_path(&self.cache_dir)
    }

    /// Find a view by name
    pub fn view(&self, name: &str) -> Option<&ViewConfig> {
        self.views.iter().find(|v| v.name == name)
    }

    /// Resolve a path relative to the config file location
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(parent) = self.config_path.as_deref().and_then(Path::parent) {
            parent.join(path)
        } else {
            path.to_path_buf()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            content_dir: default_content_dir(),
            output_dir: default_output_dir(),
            cache_dir: default_cache_dir(),
            filters: default_filters(),
            permalink: default_permalink(),
            ignore: Vec::new(),
            extensions: default_extensions(),
            ignore_errors: false,
            summarize: SummarizeConfig::default(),
            views: default_views(),
            config_path: None,
        }
    }
}
