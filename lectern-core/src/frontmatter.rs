//! Frontmatter parsing from entry files.

use regex::Regex;
use serde_yaml::Mapping;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("Invalid YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Frontmatter must be a mapping")]
    NotAMapping,
}

/// An entry file split into its header and body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    /// Header fields, in the order they were written
    pub metadata: Mapping,
    /// Everything after the closing delimiter
    pub body: String,
    /// Number of lines the header occupies, delimiters included
    pub offset: usize,
}

static FRONTMATTER_REGEX: OnceLock<Regex> = OnceLock::new();

fn frontmatter_regex() -> &'static Regex {
    FRONTMATTER_REGEX.get_or_init(|| {
        Regex::new(r"(?ms)\A---[ \t]*\r?\n(.*?)^---[ \t]*(?:\r?\n|\z)(.*)\z").unwrap()
    })
}

/// Parse frontmatter from entry content
///
/// If no frontmatter is present, the metadata is empty and the whole
/// content is the body.
///
/// # Example
///
/// ```
/// use lectern_core::frontmatter::parse_frontmatter;
///
/// let content = "---\ntitle: My Post\ndate: 2025-01-01\n---\n# Hello World\n";
///
/// let fm = parse_frontmatter(content).unwrap();
/// assert_eq!(fm.metadata.get("title").and_then(|v| v.as_str()), Some("My Post"));
/// assert_eq!(fm.body, "# Hello World\n");
/// assert_eq!(fm.offset, 4);
/// ```
pub fn parse_frontmatter(content: &str) -> Result<Frontmatter, FrontmatterError> {
    let Some(captures) = frontmatter_regex().captures(content) else {
        return Ok(Frontmatter {
            metadata: Mapping::new(),
            body: content.to_string(),
            offset: 0,
        });
    };

    let (Some(header), Some(body)) = (captures.get(1), captures.get(2)) else {
        return Err(FrontmatterError::NotAMapping);
    };

    let metadata = if header.as_str().trim().is_empty() {
        Mapping::new()
    } else {
        match serde_yaml::from_str::<serde_yaml::Value>(header.as_str())? {
            serde_yaml::Value::Mapping(map) => map,
            serde_yaml::Value::Null => Mapping::new(),
            _ => return Err(FrontmatterError::NotAMapping),
        }
    };

    let offset = content[..body.start()].matches('\n').count();

    Ok(Frontmatter {
        metadata,
        body: body.as_str().to_string(),
        offset,
    })
}
