//! Minimal HTML tokenizing shared by the post-markdown filters.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Tag(&'a str),
    Text(&'a str),
}

/// Elements that never have a closing tag
const VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Split `html` into tags (comments included) and the text between them
pub(crate) fn tokenize(html: &str) -> Vec<Token<'_>> {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let re = TAGS.get_or_init(|| Regex::new(r"(?s)<!--.*?-->|<[^>]*>").unwrap());

    let mut tokens = Vec::new();
    let mut last = 0;
    for m in re.find_iter(html) {
        if m.start() > last {
            tokens.push(Token::Text(&html[last..m.start()]));
        }
        tokens.push(Token::Tag(m.as_str()));
        last = m.end();
    }
    if last < html.len() {
        tokens.push(Token::Text(&html[last..]));
    }
    tokens
}

/// A parsed tag: lowercase element name and whether it opens or closes
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TagKind {
    Open(String),
    Close(String),
    /// Void elements, self-closing tags, comments and doctypes
    Empty,
}

pub(crate) fn classify(tag: &str) -> TagKind {
    let inner = tag.trim_start_matches('<').trim_end_matches('>');
    if inner.starts_with('!') || inner.starts_with('?') {
        return TagKind::Empty;
    }

    let (closing, inner) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    let name: String = inner
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    if name.is_empty() {
        TagKind::Empty
    } else if closing {
        TagKind::Close(name)
    } else if inner.trim_end().ends_with('/') || VOID.contains(&name.as_str()) {
        TagKind::Empty
    } else {
        TagKind::Open(name)
    }
}
