//! Pass-through filter for entries that are already HTML.

use super::{FilterDef, FilterError, FilterPlugin};
use crate::entry::Entry;

pub fn definition() -> FilterDef {
    FilterDef::new("plain", 70.0, || Box::new(Plain))
        .aliases(&["html"])
        .conflicts(&["markdown", "rest"])
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Plain;

impl FilterPlugin for Plain {
    fn transform(&self, text: &str, _entry: &Entry, _args: &[String]) -> Result<String, FilterError> {
        Ok(text.to_string())
    }
}
