//! Cut HTML down to its first words, closing any open elements and linking
//! to the full entry.

use super::html::{classify, tokenize, TagKind, Token};
use super::{FilterDef, FilterEnv, FilterError, FilterPlugin};
use crate::entry::Entry;
use once_cell::sync::OnceCell;
use unicode_segmentation::UnicodeSegmentation;

pub fn definition() -> FilterDef {
    FilterDef::new("summarize", 15.0, || Box::new(Summarize::default()))
}

#[derive(Debug, Clone)]
struct Settings {
    max_words: usize,
    link_text: String,
}

/// `summarize` uses the site's `summarize.max_words`; `summarize+50` overrides it
#[derive(Debug, Default)]
pub struct Summarize {
    settings: OnceCell<Settings>,
}

impl Settings {
    fn from_env(env: &FilterEnv<'_>) -> Result<Self, FilterError> {
        let max_words = match env.args.first() {
            Some(arg) => arg.parse::<usize>().map_err(|_| FilterError::InvalidArguments {
                filter: env.name.to_string(),
                reason: format!("expected a word count, got '{}'", arg),
            })?,
            None => env.config.summarize.max_words,
        };
        Ok(Self {
            max_words: max_words.max(1),
            link_text: env.config.summarize.link_text.clone(),
        })
    }
}

impl FilterPlugin for Summarize {
    fn init(&self, env: &FilterEnv<'_>) -> Result<(), FilterError> {
        let _ = self.settings.set(Settings::from_env(env)?);
        Ok(())
    }

    // The continue link embeds the permalink, so its format counts too
    fn fingerprint(&self, env: &FilterEnv<'_>) -> String {
        match Settings::from_env(env) {
            Ok(settings) => format!(
                "{}:{}:{}",
                settings.max_words, settings.link_text, env.config.permalink
            ),
            Err(_) => String::new(),
        }
    }

    fn transform(&self, text: &str, entry: &Entry, _args: &[String]) -> Result<String, FilterError> {
        let settings = self.settings.get().ok_or_else(|| FilterError::Transform {
            filter: "summarize".into(),
            reason: "not initialized".into(),
        })?;

        let tokens = tokenize(text);
        let total: usize = tokens
            .iter()
            .map(|t| match t {
                Token::Text(t) => t.unicode_words().count(),
                Token::Tag(_) => 0,
            })
            .sum();
        if total <= settings.max_words {
            return Ok(text.to_string());
        }

        let mut out = String::with_capacity(text.len());
        let mut open: Vec<String> = Vec::new();
        let mut words = 0;

        for token in tokens {
            match token {
                Token::Tag(tag) => {
                    match classify(tag) {
                        TagKind::Open(name) => open.push(name),
                        TagKind::Close(name) => {
                            if let Some(pos) = open.iter().rposition(|n| *n == name) {
                                open.truncate(pos);
                            }
                        }
                        TagKind::Empty => {}
                    }
                    out.push_str(tag);
                }
                Token::Text(t) => {
                    let cut = t.unicode_word_indices().find_map(|(start, word)| {
                        words += 1;
                        (words == settings.max_words).then_some(start + word.len())
                    });
                    match cut {
                        Some(end) => {
                            out.push_str(&t[..end]);
                            break;
                        }
                        None => out.push_str(t),
                    }
                }
            }
        }

        out.push_str(&format!(
            "&#8230; <a class=\"continue\" href=\"{}\">{}</a>",
            entry.permalink(),
            settings.link_text
        ));
        for name in open.iter().rev() {
            out.push_str(&format!("</{}>", name));
        }
        Ok(out)
    }
}
