//! Text filters and the machinery for resolving filter chains.
//!
//! A filter is registered once as a [`FilterDef`] (names, priority,
//! conflicts and a plugin constructor). Every distinct identifier used by
//! the site, such as `markdown+tables` or `h2`, becomes one shared
//! [`Filter`] value that owns its own plugin instance and is initialized
//! at most once.

pub mod headoffset;
mod html;
pub mod markdown;
pub mod plain;
pub mod registry;
pub mod strip;
pub mod summarize;
pub mod typography;

use crate::config::Config;
use crate::entry::Entry;
use once_cell::sync::OnceCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

pub use registry::{FilterList, FilterRegistry};

#[derive(Error, Debug, Clone)]
pub enum FilterError {
    #[error("No such filter: {0}")]
    NoSuchFilter(String),

    #[error("Invalid arguments for filter {filter}: {reason}")]
    InvalidArguments { filter: String, reason: String },

    #[error("Filter {filter} failed to initialize: {reason}")]
    Init { filter: String, reason: String },

    #[error("Filter {filter} failed: {reason}")]
    Transform { filter: String, reason: String },
}

/// What a plugin sees when it is initialized
#[derive(Debug, Clone, Copy)]
pub struct FilterEnv<'a> {
    /// The name the filter was invoked by, e.g. `h2` or `md`
    pub name: &'a str,
    /// Arguments given after `+`
    pub args: &'a [String],
    pub config: &'a Config,
}

/// A text transformation
pub trait FilterPlugin: Send + Sync {
    /// One-time setup, run before the first transform.
    fn init(&self, _env: &FilterEnv<'_>) -> Result<(), FilterError> {
        Ok(())
    }

    /// Settings outside the filter's name and arguments that shape its
    /// output. Folded into the cache key so editing them invalidates
    /// cached text.
    fn fingerprint(&self, _env: &FilterEnv<'_>) -> String {
        String::new()
    }

    fn transform(&self, text: &str, entry: &Entry, args: &[String]) -> Result<String, FilterError>;
}

type Constructor = Arc<dyn Fn() -> Box<dyn FilterPlugin> + Send + Sync>;

/// Registration record for a filter plugin
#[derive(Clone)]
pub struct FilterDef {
    /// Every name the filter answers to; the first is canonical
    pub names: Vec<String>,
    /// Higher runs earlier
    pub priority: f64,
    /// Names of filters that cannot share a chain with this one
    pub conflicts: Vec<String>,
    build: Constructor,
}

impl FilterDef {
    pub fn new<B>(name: &str, priority: f64, build: B) -> Self
    where
        B: Fn() -> Box<dyn FilterPlugin> + Send + Sync + 'static,
    {
        Self {
            names: vec![name.to_lowercase()],
            priority,
            conflicts: Vec::new(),
            build: Arc::new(build),
        }
    }

    /// Additional names the filter answers to
    pub fn aliases(mut self, names: &[&str]) -> Self {
        self.names.extend(names.iter().map(|n| n.to_lowercase()));
        self
    }

    pub fn conflicts(mut self, names: &[&str]) -> Self {
        self.conflicts.extend(names.iter().map(|n| n.to_lowercase()));
        self
    }

    pub fn name(&self) -> &str {
        &self.names[0]
    }

    pub(crate) fn instantiate(&self) -> Box<dyn FilterPlugin> {
        (self.build)()
    }
}

impl fmt::Debug for FilterDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterDef")
            .field("names", &self.names)
            .field("priority", &self.priority)
            .field("conflicts", &self.conflicts)
            .finish_non_exhaustive()
    }
}

/// Every filter shipped with lectern
pub fn builtin() -> Vec<FilterDef> {
    vec![
        markdown::definition(),
        plain::definition(),
        typography::definition(),
        summarize::definition(),
        headoffset::definition(),
        strip::definition(),
    ]
}

/// One configured filter: a plugin bound to a name and arguments.
///
/// Equality and hashing use the name, arguments and negation only, so the
/// same identifier always maps to the same node of the filter tree.
pub struct Filter {
    name: String,
    args: Vec<String>,
    negated: bool,
    priority: f64,
    matches: Vec<String>,
    conflicts: Vec<String>,
    plugin: Option<Box<dyn FilterPlugin>>,
    init: OnceCell<Result<(), String>>,
    degraded: AtomicBool,
}

impl Filter {
    /// Bind `def` to the name it was invoked by and its arguments
    pub fn from_def(def: &FilterDef, name: &str, args: Vec<String>, negated: bool) -> Self {
        Self {
            name: name.to_lowercase(),
            args,
            negated,
            priority: def.priority,
            matches: def.names.clone(),
            conflicts: def.conflicts.clone(),
            plugin: Some(def.instantiate()),
            init: OnceCell::new(),
            degraded: AtomicBool::new(false),
        }
    }

    /// A filter that passes text through unchanged.
    ///
    /// Stands in for unknown names when errors are ignored.
    pub fn identity(name: &str, args: Vec<String>) -> Self {
        let name = name.to_lowercase();
        Self {
            matches: vec![name.clone()],
            name,
            args,
            negated: false,
            priority: 0.0,
            conflicts: Vec::new(),
            plugin: None,
            init: OnceCell::new(),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn priority(&self) -> f64 {
        self.priority
    }

    /// Whether this is a `no<name>` entry that removes a filter
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Names this filter answers to
    pub fn matches(&self) -> &[String] {
        &self.matches
    }

    /// Canonical text form, e.g. `markdown+tables`
    pub fn key(&self) -> String {
        let mut key = String::new();
        if self.negated {
            key.push_str("no");
        }
        key.push_str(&self.name);
        for arg in &self.args {
            key.push('+');
            key.push_str(arg);
        }
        key
    }

    /// The identity this filter contributes to a cache key: its [`key`]
    /// plus whatever configuration the plugin reads.
    ///
    /// [`key`]: Filter::key
    pub fn cache_key(&self, config: &Config) -> String {
        let mut key = self.key();
        if let Some(plugin) = &self.plugin {
            let fingerprint = plugin.fingerprint(&FilterEnv {
                name: &self.name,
                args: &self.args,
                config,
            });
            if !fingerprint.is_empty() {
                key.push('#');
                key.push_str(&fingerprint);
            }
        }
        key
    }

    /// Whether the two filters cannot both appear in one chain.
    ///
    /// True when they are equal, share a name, or either lists one of the
    /// other's names among its conflicts.
    pub fn conflicts_with(&self, other: &Filter) -> bool {
        if self == other {
            return true;
        }
        let overlaps = |names: &[String], with: &[String]| names.iter().any(|n| with.contains(n));
        overlaps(&self.matches, &other.matches)
            || overlaps(&self.conflicts, &other.matches)
            || overlaps(&other.conflicts, &self.matches)
    }

    /// Run the plugin's one-time setup, or return its remembered outcome
    pub fn init(&self, config: &Config) -> Result<(), FilterError> {
        let outcome = self.init.get_or_init(|| match &self.plugin {
            Some(plugin) => plugin
                .init(&FilterEnv {
                    name: &self.name,
                    args: &self.args,
                    config,
                })
                .map_err(|e| e.to_string()),
            None => Ok(()),
        });

        outcome.clone().map_err(|reason| FilterError::Init {
            filter: self.key(),
            reason,
        })
    }

    /// Mark the filter as a no-op after a failed init.
    ///
    /// Returns true only for the first caller.
    pub(crate) fn degrade(&self) -> bool {
        !self.degraded.swap(true, Ordering::AcqRel)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// Transform `text` for `entry`
    pub fn apply(&self, text: &str, entry: &Entry) -> Result<String, FilterError> {
        match &self.plugin {
            Some(plugin) if !self.is_degraded() => plugin.transform(text, entry, &self.args),
            _ => Ok(text.to_string()),
        }
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.args == other.args && self.negated == other.negated
    }
}

impl Eq for Filter {}

impl Hash for Filter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.args.hash(state);
        self.negated.hash(state);
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("key", &self.key())
            .field("priority", &self.priority)
            .field("matches", &self.matches)
            .field("conflicts", &self.conflicts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Plugins for exercising the filter machinery.

    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Appends `[name]` and counts calls
    pub struct Tag {
        pub label: &'static str,
        pub calls: Arc<AtomicUsize>,
    }

    impl FilterPlugin for Tag {
        fn transform(&self, text: &str, _: &Entry, _: &[String]) -> Result<String, FilterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}[{}]", text, self.label))
        }
    }

    pub fn tag_def(label: &'static str, priority: f64, calls: Arc<AtomicUsize>) -> FilterDef {
        FilterDef::new(label, priority, move || {
            Box::new(Tag {
                label,
                calls: calls.clone(),
            })
        })
    }

    pub struct Failing {
        pub on_init: bool,
    }

    impl FilterPlugin for Failing {
        fn init(&self, env: &FilterEnv<'_>) -> Result<(), FilterError> {
            if self.on_init {
                return Err(FilterError::Init {
                    filter: env.name.to_string(),
                    reason: "boom".into(),
                });
            }
            Ok(())
        }

        fn transform(&self, _: &str, _: &Entry, _: &[String]) -> Result<String, FilterError> {
            Err(FilterError::Transform {
                filter: "failing".into(),
                reason: "boom".into(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(names: &[&str], conflicts: &[&str]) -> FilterDef {
        FilterDef::new(names[0], 10.0, || Box::new(plain::Plain))
            .aliases(&names[1..])
            .conflicts(conflicts)
    }

    #[test]
    fn test_conflict_membership() {
        let f1 = Filter::from_def(&def(&["foo", "bar"], &["spam"]), "foo", vec![], false);
        let f2 = Filter::from_def(&def(&["spam"], &[]), "spam", vec![], false);
        let f3 = Filter::from_def(&def(&["baz"], &[]), "baz", vec![], false);

        assert!(f1.conflicts_with(&f2));
        assert!(f2.conflicts_with(&f1));
        assert!(!f1.conflicts_with(&f3));
        assert!(f1.conflicts_with(&f1));
    }

    #[test]
    fn test_aliases_conflict_with_each_other() {
        let d = def(&["markdown", "md"], &[]);
        let a = Filter::from_def(&d, "markdown", vec![], false);
        let b = Filter::from_def(&d, "md", vec!["tables".into()], false);
        assert_ne!(a, b);
        assert!(a.conflicts_with(&b));
    }

    #[test]
    fn test_key_and_equality() {
        let d = def(&["markdown"], &[]);
        let a = Filter::from_def(&d, "Markdown", vec!["tables".into()], false);
        let b = Filter::from_def(&d, "markdown", vec!["tables".into()], false);
        let neg = Filter::from_def(&d, "markdown", vec![], true);

        assert_eq!(a, b);
        assert_eq!(a.key(), "markdown+tables");
        assert_eq!(neg.key(), "nomarkdown");
        assert!(neg.is_negated());
    }

    #[test]
    fn test_init_outcome_is_remembered() {
        let d = FilterDef::new("failing", 1.0, || {
            Box::new(testing::Failing { on_init: true })
        });
        let f = Filter::from_def(&d, "failing", vec![], false);
        let config = Config::default();

        assert!(matches!(f.init(&config), Err(FilterError::Init { .. })));
        assert!(matches!(f.init(&config), Err(FilterError::Init { .. })));
        assert!(f.degrade());
        assert!(!f.degrade());
        assert!(f.is_degraded());
    }

    #[test]
    fn test_cache_key_follows_plugin_fingerprint() {
        let d = summarize::definition();
        let f = Filter::from_def(&d, "summarize", vec![], false);
        let mut config = Config::default();
        let before = f.cache_key(&config);
        assert!(before.starts_with("summarize#"));

        config.summarize.link_text = "more".into();
        assert_ne!(f.cache_key(&config), before);

        let plain = Filter::from_def(&def(&["plain"], &[]), "plain", vec![], false);
        assert_eq!(plain.cache_key(&config), "plain");
    }

    #[test]
    fn test_identity_filter_passes_through() {
        let f = Filter::identity("unknown", vec![]);
        let e = Entry::parse("a.md", "x", std::time::SystemTime::UNIX_EPOCH, "/:slug/").unwrap();
        assert!(f.init(&Config::default()).is_ok());
        assert_eq!(f.apply("text", &e).unwrap(), "text");
    }
}
