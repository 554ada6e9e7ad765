//! Remove markup, leaving only text.

use super::{FilterDef, FilterEnv, FilterError, FilterPlugin};
use crate::entry::Entry;
use regex::Regex;
use std::sync::OnceLock;

pub fn definition() -> FilterDef {
    FilterDef::new("strip", 0.0, || Box::new(Strip))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Strip;

impl FilterPlugin for Strip {
    fn init(&self, env: &FilterEnv<'_>) -> Result<(), FilterError> {
        if env.args.is_empty() {
            Ok(())
        } else {
            Err(FilterError::InvalidArguments {
                filter: env.name.to_string(),
                reason: "takes no arguments".into(),
            })
        }
    }

    fn transform(&self, text: &str, _entry: &Entry, _args: &[String]) -> Result<String, FilterError> {
        static MARKUP: OnceLock<Regex> = OnceLock::new();
        let re = MARKUP.get_or_init(|| Regex::new(r"(?s)<!--.*?-->|<[^>]*>").unwrap());
        Ok(re.replace_all(text, "").into_owned())
    }
}
