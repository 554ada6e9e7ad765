//! Slug generation.

use regex::Regex;
use std::sync::OnceLock;
use unicode_segmentation::UnicodeSegmentation;

static HYPHENS: OnceLock<Regex> = OnceLock::new();

/// Convert a string to a URL-safe slug
///
/// # Examples
///
/// ```
/// use lectern_core::slugify;
///
/// assert_eq!(slugify("Hello World"), "hello-world");
/// assert_eq!(slugify("Rust & Safety"), "rust-safety");
/// assert_eq!(slugify("C++ Programming"), "c-programming");
/// ```
pub fn slugify(input: &str) -> String {
    let cleaned = input
        .to_lowercase()
        .graphemes(true)
        .filter_map(|g| {
            let c = g.chars().next()?;
            if c.is_whitespace() || c == '_' || c == '-' {
                Some("-")
            } else if c.is_alphanumeric() {
                Some(g)
            } else {
                None
            }
        })
        .collect::<String>();

    let re = HYPHENS.get_or_init(|| Regex::new(r"-+").unwrap());
    re.replace_all(&cleaned, "-").trim_matches('-').to_string()
}
