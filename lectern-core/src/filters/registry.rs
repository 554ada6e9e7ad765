//! Filter registration and chain resolution.

use super::{builtin, Filter, FilterDef, FilterError};
use std::collections::HashMap;
use std::sync::Arc;

/// Split `name+arg1+arg2` into a lowercase name and its arguments
pub fn parse_identifier(identifier: &str) -> Option<(String, Vec<String>)> {
    let mut parts = identifier.split('+').map(str::trim);
    let name = parts.next()?.to_lowercase();
    if name.is_empty() {
        return None;
    }
    let args = parts
        .filter(|arg| !arg.is_empty())
        .map(String::from)
        .collect();
    Some((name, args))
}

/// Known filters, plus one shared [`Filter`] per distinct identifier
#[derive(Debug, Default)]
pub struct FilterRegistry {
    defs: Vec<FilterDef>,
    names: HashMap<String, usize>,
    arena: HashMap<String, Arc<Filter>>,
    ignore_errors: bool,
}

impl FilterRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in filter
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for def in builtin() {
            registry.register(def);
        }
        registry
    }

    /// Make names resolvable. A name registered twice points at the later def.
    pub fn register(&mut self, def: FilterDef) {
        let index = self.defs.len();
        for name in &def.names {
            if self.names.insert(name.clone(), index).is_some() {
                tracing::debug!(filter = %name, "filter name re-registered");
            }
        }
        self.defs.push(def);
    }

    /// Resolve unknown names to pass-through filters instead of failing
    pub fn set_ignore_errors(&mut self, ignore: bool) {
        self.ignore_errors = ignore;
    }

    pub fn def(&self, name: &str) -> Option<&FilterDef> {
        self.names
            .get(&name.to_lowercase())
            .map(|&index| &self.defs[index])
    }

    /// The shared filter for one identifier, e.g. `markdown+tables` or `noh1`.
    ///
    /// Returns `None` for blank identifiers.
    pub fn lookup(&mut self, identifier: &str) -> Result<Option<Arc<Filter>>, FilterError> {
        let Some((name, args)) = parse_identifier(identifier) else {
            return Ok(None);
        };

        let (index, name, negated) = if let Some(&index) = self.names.get(&name) {
            (Some(index), name, false)
        } else if let Some(&index) = name.strip_prefix("no").and_then(|n| self.names.get(n)) {
            (Some(index), name[2..].to_string(), true)
        } else {
            (None, name, false)
        };

        let filter = match index {
            Some(index) => Filter::from_def(&self.defs[index], &name, args, negated),
            None if self.ignore_errors => {
                tracing::warn!(filter = %name, "unknown filter, passing text through unchanged");
                Filter::identity(&name, args)
            }
            None => return Err(FilterError::NoSuchFilter(name)),
        };

        let shared = self
            .arena
            .entry(filter.key())
            .or_insert_with(|| Arc::new(filter));
        Ok(Some(shared.clone()))
    }

    /// Resolve identifier groups into one ordered chain.
    ///
    /// Groups are applied in order (site, view, entry), so a later filter
    /// replaces any earlier one it conflicts with. Negations remove their
    /// target and never appear in the result.
    pub fn resolve<I, S>(&mut self, identifiers: I) -> Result<Vec<Arc<Filter>>, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = FilterList::new();
        for identifier in identifiers {
            if let Some(filter) = self.lookup(identifier.as_ref())? {
                list.push(filter);
            }
        }
        Ok(list.into_chain())
    }

    /// Every filter value resolved so far
    pub fn filters(&self) -> impl Iterator<Item = &Arc<Filter>> {
        self.arena.values()
    }
}

/// An unordered set of filters where membership is decided by conflicts
#[derive(Debug, Default, Clone)]
pub struct FilterList {
    items: Vec<Arc<Filter>>,
}

impl FilterList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `filter`, dropping anything already present that conflicts with it
    pub fn push(&mut self, filter: Arc<Filter>) {
        self.items.retain(|existing| !existing.conflicts_with(&filter));
        self.items.push(filter);
    }

    /// Whether `filter` or anything conflicting with it is present
    pub fn contains(&self, filter: &Filter) -> bool {
        self.items.iter().any(|f| f.conflicts_with(filter))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Filter>> {
        self.items.iter()
    }

    /// The application order: highest priority first, ties by name
    pub fn into_chain(self) -> Vec<Arc<Filter>> {
        let mut chain: Vec<_> = self.items.into_iter().filter(|f| !f.is_negated()).collect();
        chain.sort_by(|a, b| {
            b.priority()
                .total_cmp(&a.priority())
                .then_with(|| a.name().cmp(b.name()))
        });
        chain
    }
}
