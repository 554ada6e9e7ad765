//! Demote headings: `h1` shifts every heading down one level, `h2` two, and
//! so on, never past `<h6>`.

use super::{FilterDef, FilterEnv, FilterError, FilterPlugin};
use crate::entry::Entry;
use once_cell::sync::OnceCell;
use regex::{Captures, Regex};
use std::sync::OnceLock;

pub fn definition() -> FilterDef {
    FilterDef::new("h1", 10.0, || Box::new(HeadOffset::default())).aliases(&["h2", "h3", "h4", "h5"])
}

#[derive(Debug, Default)]
pub struct HeadOffset {
    offset: OnceCell<u8>,
}

impl FilterPlugin for HeadOffset {
    fn init(&self, env: &FilterEnv<'_>) -> Result<(), FilterError> {
        let offset = env
            .name
            .strip_prefix('h')
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (1..=5).contains(n))
            .ok_or_else(|| FilterError::InvalidArguments {
                filter: env.name.to_string(),
                reason: "expected h1 through h5".into(),
            })?;
        let _ = self.offset.set(offset);
        Ok(())
    }

    fn transform(&self, text: &str, _entry: &Entry, _args: &[String]) -> Result<String, FilterError> {
        static HEADINGS: OnceLock<Regex> = OnceLock::new();
        let re = HEADINGS.get_or_init(|| Regex::new(r"(?i)<(/?)h([1-6])\b").unwrap());

        let offset = self.offset.get().copied().unwrap_or(0);
        let shifted = re.replace_all(text, |caps: &Captures| {
            let level: u8 = caps[2].parse().unwrap_or(6);
            format!("<{}h{}", &caps[1], (level + offset).min(6))
        });
        Ok(shifted.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::SystemTime;

    fn run(name: &str, text: &str) -> String {
        let filter = HeadOffset::default();
        let config = Config::default();
        filter
            .init(&FilterEnv {
                name,
                args: &[],
                config: &config,
            })
            .unwrap();
        let entry = Entry::parse("a.md", "", SystemTime::UNIX_EPOCH, "/:slug/").unwrap();
        filter.transform(text, &entry, &[]).unwrap()
    }

    #[test]
    fn test_shift_by_one() {
        assert_eq!(run("h1", "<h1>Test</h1>"), "<h2>Test</h2>");
    }

    #[test]
    fn test_shift_keeps_attributes() {
        assert_eq!(
            run("h2", "<h2 id=\"x\">A</h2><p>h1</p>"),
            "<h4 id=\"x\">A</h4><p>h1</p>"
        );
    }

    #[test]
    fn test_capped_at_h6() {
        assert_eq!(run("h5", "<h3>A</h3>"), "<h6>A</h6>");
    }
}
