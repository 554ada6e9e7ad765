//! Markdown to HTML via pulldown-cmark.

use super::{FilterDef, FilterEnv, FilterError, FilterPlugin};
use crate::entry::Entry;
use once_cell::sync::OnceCell;
use pulldown_cmark::{html, Options, Parser};

pub fn definition() -> FilterDef {
    FilterDef::new("markdown", 70.0, || Box::new(Markdown::default()))
        .aliases(&["md", "mkdown"])
        .conflicts(&["rest", "plain"])
}

/// Markdown converter; arguments switch on parser extensions
#[derive(Debug, Default)]
pub struct Markdown {
    options: OnceCell<Options>,
}

fn extension(name: &str) -> Option<Options> {
    match name {
        "tables" => Some(Options::ENABLE_TABLES),
        "footnotes" => Some(Options::ENABLE_FOOTNOTES),
        "strikethrough" => Some(Options::ENABLE_STRIKETHROUGH),
        "tasklists" => Some(Options::ENABLE_TASKLISTS),
        "smartpunct" => Some(Options::ENABLE_SMART_PUNCTUATION),
        "heading_attributes" | "headerid" => Some(Options::ENABLE_HEADING_ATTRIBUTES),
        _ => None,
    }
}

impl FilterPlugin for Markdown {
    fn init(&self, env: &FilterEnv<'_>) -> Result<(), FilterError> {
        let mut options = Options::empty();
        for arg in env.args {
            let name = arg.to_lowercase();
            let ext = extension(&name).ok_or_else(|| FilterError::InvalidArguments {
                filter: env.name.to_string(),
                reason: format!("unknown markdown extension '{}'", arg),
            })?;
            options.insert(ext);
        }
        let _ = self.options.set(options);
        Ok(())
    }

    fn transform(&self, text: &str, _entry: &Entry, _args: &[String]) -> Result<String, FilterError> {
        let options = self.options.get().copied().unwrap_or_else(Options::empty);
        let parser = Parser::new_ext(text, options);

        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out.truncate(out.trim_end().len());
        Ok(out)
    }
}
