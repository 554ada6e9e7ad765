//! Site building: load entries, resolve their chains, compile every view.

use crate::compiler::{ChainTree, Compiled, CompileError, Compiler, ContextKey};
use crate::config::Config;
use crate::entry::Entry;
use crate::filters::{FilterError, FilterRegistry};
use crate::loader::{load_entries, EntryFailure};
use lectern_incremental::{CacheError, CacheStats, FileCache};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Content directory not found: {0:?}")]
    MissingContentDir(PathBuf),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Bad filter in {path:?}: {source}")]
    Filter { path: PathBuf, source: FilterError },

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Per-run switches
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Drop the cache before compiling
    pub force: bool,
    /// Degrade unknown or broken filters instead of failing
    pub ignore_errors: bool,
}

/// An entry with its compiled text for each view
#[derive(Debug)]
pub struct CompiledEntry {
    pub entry: Entry,
    pub views: BTreeMap<String, Compiled>,
}

impl CompiledEntry {
    pub fn view(&self, name: &str) -> Option<&Compiled> {
        self.views.get(name)
    }

    /// Whether any view had to be recompiled
    pub fn has_changed(&self) -> bool {
        self.views.values().any(|c| c.has_changed)
    }
}

/// Everything one build produced
#[derive(Debug)]
pub struct SiteIndex {
    /// Newest first
    pub entries: Vec<CompiledEntry>,
    pub failures: Vec<EntryFailure>,
    /// Cache buckets deleted because no entry uses them any more
    pub removed_buckets: usize,
    pub stats: CacheStats,
}

impl SiteIndex {
    /// Entries that are not drafts
    pub fn published(&self) -> impl Iterator<Item = &CompiledEntry> {
        self.entries.iter().filter(|c| !c.entry.is_draft())
    }
}

/// Main site builder
#[derive(Debug)]
pub struct SiteBuilder {
    config: Config,
    registry: FilterRegistry,
}

impl SiteBuilder {
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, FilterRegistry::with_builtins())
    }

    /// Build with a custom set of filters
    pub fn with_registry(config: Config, registry: FilterRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry_mut(&mut self) -> &mut FilterRegistry {
        &mut self.registry
    }

    /// Build the entire site
    pub fn build(&mut self, options: &BuildOptions) -> Result<SiteIndex, BuildError> {
        let ignore_errors = options.ignore_errors || self.config.ignore_errors;
        self.registry.set_ignore_errors(ignore_errors);

        let content_dir = self.config.content_dir();
        if !content_dir.is_dir() {
            return Err(BuildError::MissingContentDir(content_dir));
        }

        let cache = FileCache::open(self.config.cache_dir())?;
        if options.force {
            tracing::info!("Clearing cache at {:?}", cache.root());
            cache.clear()?;
        }

        let (entries, failures) = load_entries(&self.config)?;

        // Every chain must be in the tree before the first batch is read.
        let mut tree = ChainTree::new();
        let mut contexts = Vec::with_capacity(entries.len());
        for entry in &entries {
            let mut keys = Vec::with_capacity(self.config.views.len());
            for view in &self.config.views {
                let identifiers = self
                    .config
                    .filters
                    .iter()
                    .chain(&view.filters)
                    .chain(&entry.filters);
                let chain = self
                    .registry
                    .resolve(identifiers)
                    .map_err(|source| BuildError::Filter {
                        path: entry.filename.clone(),
                        source,
                    })?;

                let key = ContextKey::new(&view.name, entry);
                tracing::debug!(
                    context = %key,
                    chain = ?chain.iter().map(|f| f.key()).collect::<Vec<_>>(),
                    "resolved filter chain"
                );
                tree.add(chain, key.clone());
                keys.push(key);
            }
            contexts.push(keys);
        }

        let compiler = Compiler::new(&tree, &cache, &self.config).ignore_errors(ignore_errors);
        let view_names: Vec<&str> = self.config.views.iter().map(|v| v.name.as_str()).collect();

        let compiled = entries
            .into_par_iter()
            .zip(contexts.into_par_iter())
            .map(|(entry, keys)| -> Result<CompiledEntry, CompileError> {
                let outputs = compiler.compile_views(&entry, &keys)?;
                let views = view_names
                    .iter()
                    .map(|name| name.to_string())
                    .zip(outputs)
                    .collect();
                Ok(CompiledEntry { entry, views })
            })
            .collect::<Result<Vec<_>, CompileError>>()?;

        let live: HashSet<String> = compiled
            .iter()
            .map(|c| c.entry.content_hash().to_string())
            .collect();
        let removed_buckets = cache.sweep(&live);
        if removed_buckets > 0 {
            tracing::info!("Removed {} unused cache buckets", removed_buckets);
        }

        let stats = cache.stats();
        let changed = compiled.iter().filter(|c| c.has_changed()).count();
        tracing::info!(
            "Compiled {} entries ({} changed) | {}",
            compiled.len(),
            changed,
            stats
        );

        Ok(SiteIndex {
            entries: compiled,
            failures,
            removed_buckets,
            stats,
        })
    }
}
