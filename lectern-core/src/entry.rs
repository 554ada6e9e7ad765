//! The content model: one source file with its metadata and body.

use crate::config::Config;
use crate::frontmatter::{parse_frontmatter, FrontmatterError};
use crate::slug::slugify;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use lectern_incremental::Digest;
use once_cell::sync::OnceCell;
use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EntryError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid frontmatter in {path:?}: {source}")]
    Frontmatter {
        path: PathBuf,
        source: FrontmatterError,
    },

    #[error("Unparseable date {value:?} in {path:?}")]
    InvalidDate { path: PathBuf, value: String },
}

/// Formats accepted for the `date` header field, tried in order
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Date-only formats, taken as midnight
const DAY_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// A single post or page
#[derive(Debug)]
pub struct Entry {
    /// Path the entry was read from
    pub filename: PathBuf,

    /// Modification time of the source file
    pub mtime: SystemTime,

    /// Header fields
    pub metadata: Mapping,

    /// Number of header lines preceding the body
    pub offset: usize,

    /// Body text, header excluded
    pub source: String,

    /// Filter identifiers named by the entry itself
    pub filters: Vec<String>,

    title: String,
    date: NaiveDateTime,
    content_hash: String,
    permalink_format: String,
    permalink: OnceCell<String>,
    tags: OnceCell<Vec<String>>,
}

impl Entry {
    /// Read and parse an entry from disk
    pub fn load(path: &Path, config: &Config) -> Result<Self, EntryError> {
        let io_err = |source| EntryError::Io {
            path: path.to_path_buf(),
            source,
        };
        let raw = std::fs::read_to_string(path).map_err(io_err)?;
        let mtime = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(io_err)?;

        let mut entry = Self::parse(path, &raw, mtime, &config.permalink)?;
        // Spelling of the content dir (`content/` vs `./content/`) must not
        // move the entry to another bucket
        if let Ok(relative) = path.strip_prefix(config.content_dir()) {
            entry.content_hash = identity_hash(relative, &entry.title, entry.date);
        }
        Ok(entry)
    }

    /// Build an entry from already-read file content
    pub fn parse(
        filename: impl Into<PathBuf>,
        raw: &str,
        mtime: SystemTime,
        permalink_format: &str,
    ) -> Result<Self, EntryError> {
        let filename = filename.into();
        let fm = parse_frontmatter(raw).map_err(|source| EntryError::Frontmatter {
            path: filename.clone(),
            source,
        })?;

        let title = fm
            .metadata
            .get("title")
            .and_then(scalar_to_string)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| file_stem(&filename));

        let date = match fm.metadata.get("date") {
            None | Some(Value::Null) => DateTime::<Local>::from(mtime).naive_local(),
            Some(value) => {
                let text = scalar_to_string(value).unwrap_or_default();
                parse_date(&text).ok_or_else(|| EntryError::InvalidDate {
                    path: filename.clone(),
                    value: text,
                })?
            }
        };

        let filters = ["filter", "filters"]
            .iter()
            .flat_map(|key| list_field(&fm.metadata, key))
            .collect();

        let content_hash = identity_hash(&filename, &title, date);

        Ok(Self {
            filename,
            mtime,
            metadata: fm.metadata,
            offset: fm.offset,
            source: fm.body,
            filters,
            title,
            date,
            content_hash,
            permalink_format: permalink_format.to_string(),
            permalink: OnceCell::new(),
            tags: OnceCell::new(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Publication date, from the header or the file's mtime
    pub fn date(&self) -> NaiveDateTime {
        self.date
    }

    /// Stable identity over filename, title and date; names the cache bucket
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// The `slug` header field, or the slugified title
    pub fn slug(&self) -> String {
        if let Some(slug) = self.metadata.get("slug").and_then(scalar_to_string) {
            return slugify(&slug);
        }
        let slug = slugify(&self.title);
        if slug.is_empty() {
            slugify(&file_stem(&self.filename))
        } else {
            slug
        }
    }

    pub fn tags(&self) -> &[String] {
        self.tags
            .get_or_init(|| list_field(&self.metadata, "tags"))
            .as_slice()
    }

    pub fn is_draft(&self) -> bool {
        match self.metadata.get("draft") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.to_lowercase().as_str(), "yes" | "true"),
            _ => false,
        }
    }

    /// URL path of the entry, always starting with `/`
    pub fn permalink(&self) -> &str {
        self.permalink.get_or_init(|| {
            let raw = match self.metadata.get("permalink").and_then(scalar_to_string) {
                Some(custom) => custom,
                None => self.expand_permalink(),
            };
            if raw.starts_with('/') {
                raw
            } else {
                format!("/{}", raw)
            }
        })
    }

    /// Output file path relative to the output directory
    pub fn output_path(&self) -> PathBuf {
        let trimmed = self.permalink().trim_start_matches('/');
        if trimmed.is_empty() || trimmed.ends_with('/') {
            PathBuf::from(trimmed).join("index.html")
        } else if Path::new(trimmed).extension().is_some() {
            PathBuf::from(trimmed)
        } else {
            PathBuf::from(trimmed).join("index.html")
        }
    }

    fn expand_permalink(&self) -> String {
        static TOKENS: OnceLock<Regex> = OnceLock::new();
        let re = TOKENS.get_or_init(|| Regex::new(r":(year|month|day|slug|name)").unwrap());

        re.replace_all(&self.permalink_format, |caps: &Captures| match &caps[1] {
            "year" => self.date.format("%Y").to_string(),
            "month" => self.date.format("%m").to_string(),
            "day" => self.date.format("%d").to_string(),
            "slug" => self.slug(),
            _ => slugify(&file_stem(&self.filename)),
        })
        .into_owned()
    }
}

/// Parse a header date in any accepted format
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    for format in DATE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    DAY_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Content hash over filename, title and date. Path separators are
/// normalized to `/`.
fn identity_hash(filename: &Path, title: &str, date: NaiveDateTime) -> String {
    let name = filename
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Digest::from_components(&[
        name.as_bytes(),
        title.as_bytes(),
        date.format("%Y-%m-%dT%H:%M:%S").to_string().as_bytes(),
    ])
    .to_hex()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A field given either as a YAML list or a comma-separated string
fn list_field(metadata: &Mapping, key: &str) -> Vec<String> {
    match metadata.get(key) {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(scalar_to_string)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(value) => scalar_to_string(value)
            .map(|s| {
                s.split(',')
                    .map(|part| part.trim().to_string())
                    .filter(|part| !part.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        None => Vec::new(),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
