//! Typographic punctuation: curly quotes, dashes and ellipses.

use super::html::{classify, tokenize, TagKind, Token};
use super::{FilterDef, FilterError, FilterPlugin};
use crate::entry::Entry;

pub fn definition() -> FilterDef {
    FilterDef::new("typography", 25.0, || Box::new(Typography)).aliases(&["smartypants"])
}

/// Elements whose text is left untouched
const VERBATIM: &[&str] = &["pre", "code", "kbd", "script", "style", "math"];

#[derive(Debug, Default, Clone, Copy)]
pub struct Typography;

impl FilterPlugin for Typography {
    fn transform(&self, text: &str, _entry: &Entry, _args: &[String]) -> Result<String, FilterError> {
        let mut out = String::with_capacity(text.len() + text.len() / 8);
        let mut verbatim = 0usize;
        let mut prev = None;

        for token in tokenize(text) {
            match token {
                Token::Tag(tag) => {
                    match classify(tag) {
                        TagKind::Open(name) if VERBATIM.contains(&name.as_str()) => verbatim += 1,
                        TagKind::Close(name) if VERBATIM.contains(&name.as_str()) => {
                            verbatim = verbatim.saturating_sub(1)
                        }
                        _ => {}
                    }
                    out.push_str(tag);
                }
                Token::Text(t) if verbatim > 0 => {
                    out.push_str(t);
                    prev = t.chars().last();
                }
                Token::Text(t) => {
                    educate(t, prev, &mut out);
                    prev = t.chars().last();
                }
            }
        }
        Ok(out)
    }
}

/// Rewrite punctuation in a run of text. `prev` is the character that ended
/// the previous run, used to decide whether a leading quote opens or closes.
fn educate(text: &str, prev: Option<char>, out: &mut String) {
    let text = text.replace("&quot;", "\"").replace("&#39;", "'");
    let chars: Vec<char> = text.chars().collect();
    let mut last = prev;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let rest = &chars[i..];
        let opens = last.map_or(true, |p| p.is_whitespace() || "([{-\u{2014}".contains(p));

        let consumed = if rest.starts_with(&['-', '-', '-']) {
            out.push_str("&#8212;");
            3
        } else if rest.starts_with(&['-', '-']) {
            out.push_str("&#8211;");
            2
        } else if rest.starts_with(&['.', '.', '.']) {
            out.push_str("&#8230;");
            3
        } else if c == '"' {
            out.push_str(if opens { "&#8220;" } else { "&#8221;" });
            1
        } else if c == '\'' {
            out.push_str(if opens { "&#8216;" } else { "&#8217;" });
            1
        } else {
            out.push(c);
            1
        };

        last = Some(chars[i + consumed - 1]);
        i += consumed;
    }
}
