//! Incremental compilation of entries through their filter chains.
//!
//! Each batch of a context's path is cached under the digest of every
//! filter applied up to and including that batch (with the configuration
//! each filter reads), in the bucket named by
//! the entry's content hash. On a hit the cached text is carried into the
//! next batch; on a miss the batch runs from the previous text and the
//! result is stored.

use crate::config::Config;
use crate::entry::Entry;
use crate::filters::{Filter, FilterError};
use lectern_incremental::{ChainKey, FileCache, FilterTree};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Cannot compile {path:?}: {source}")]
    Filter { path: PathBuf, source: FilterError },
}

/// One (view, entry) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey {
    pub view: String,
    /// Content hash of the entry
    pub entry: String,
}

impl ContextKey {
    pub fn new(view: &str, entry: &Entry) -> Self {
        Self {
            view: view.to_string(),
            entry: entry.content_hash().to_string(),
        }
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.view, &self.entry[..self.entry.len().min(12)])
    }
}

/// The tree every chain of a build is registered in
pub type ChainTree = FilterTree<Arc<Filter>, ContextKey>;

/// Result of compiling one context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiled {
    pub content: String,
    /// False only when every batch came from an up-to-date cache
    pub has_changed: bool,
}

/// Runs contexts through the tree's batches against the cache
#[derive(Debug)]
pub struct Compiler<'a> {
    tree: &'a ChainTree,
    cache: &'a FileCache,
    config: &'a Config,
    ignore_errors: bool,
}

impl<'a> Compiler<'a> {
    pub fn new(tree: &'a ChainTree, cache: &'a FileCache, config: &'a Config) -> Self {
        Self {
            tree,
            cache,
            config,
            ignore_errors: config.ignore_errors,
        }
    }

    /// Degrade filters whose init fails instead of aborting
    pub fn ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = ignore;
        self
    }

    /// Compile one context of `entry`
    pub fn compile(&self, entry: &Entry, context: &ContextKey) -> Result<Compiled, CompileError> {
        let stale = self.is_stale(entry);
        self.compile_with(entry, context, stale)
    }

    /// Compile several contexts of the same entry.
    ///
    /// Staleness is judged once, before any of them touches the bucket, so
    /// every view of an edited entry reports a change even when it only
    /// reuses batches another view just wrote.
    pub fn compile_views(
        &self,
        entry: &Entry,
        contexts: &[ContextKey],
    ) -> Result<Vec<Compiled>, CompileError> {
        let stale = self.is_stale(entry);
        contexts
            .iter()
            .map(|context| self.compile_with(entry, context, stale))
            .collect()
    }

    fn is_stale(&self, entry: &Entry) -> bool {
        match self.cache.mtime(entry.content_hash()) {
            Some(written) => written < entry.mtime,
            None => true,
        }
    }

    fn compile_with(
        &self,
        entry: &Entry,
        context: &ContextKey,
        stale: bool,
    ) -> Result<Compiled, CompileError> {
        let bucket = entry.content_hash();
        let mut has_changed = stale;
        let mut key = ChainKey::new();
        let mut text: Option<String> = None;

        for batch in self.tree.iter(context) {
            for filter in &batch {
                key.push(&filter.cache_key(self.config));
            }
            let digest = key.digest();

            if let Some(bytes) = self.cache.get(bucket, &digest, entry.mtime) {
                match String::from_utf8(bytes) {
                    Ok(cached) => {
                        tracing::trace!(%context, batch = batch.len(), "cache hit");
                        text = Some(cached);
                        continue;
                    }
                    Err(_) => tracing::debug!(%context, "cached text is not UTF-8, recompiling"),
                }
            }

            has_changed = true;
            let mut current = text.take().unwrap_or_else(|| entry.source.clone());
            let mut failed = false;

            for filter in batch {
                if !self.prepare(filter, entry)? {
                    continue;
                }
                match filter.apply(&current, entry) {
                    Ok(output) => current = output,
                    Err(err) => {
                        failed = true;
                        tracing::error!(
                            file = %entry.filename.display(),
                            filter = %filter,
                            error = %err,
                            "filter failed, passing text through"
                        );
                    }
                }
            }

            if !failed {
                self.cache.set(bucket, &digest, current.clone().into_bytes());
            }
            text = Some(current);
        }

        let content = match text {
            Some(content) => content,
            None => {
                // Empty chain: record a marker so an untouched entry reads as unchanged
                let digest = key.digest();
                if self.cache.get(bucket, &digest, entry.mtime).is_none() {
                    has_changed = true;
                    self.cache.set(bucket, &digest, entry.source.clone().into_bytes());
                }
                entry.source.clone()
            }
        };

        Ok(Compiled {
            content,
            has_changed,
        })
    }

    /// Initialize `filter` once; false when it has degraded to a no-op
    fn prepare(&self, filter: &Filter, entry: &Entry) -> Result<bool, CompileError> {
        match filter.init(self.config) {
            Ok(()) => Ok(true),
            Err(err) if self.ignore_errors => {
                if filter.degrade() {
                    tracing::warn!(filter = %filter, error = %err, "filter disabled");
                }
                Ok(false)
            }
            Err(source) => Err(CompileError::Filter {
                path: entry.filename.clone(),
                source,
            }),
        }
    }
}
