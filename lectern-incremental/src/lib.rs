//! # lectern-incremental
//!
//! Incremental build machinery for the lectern site compiler.
//!
//! Two pieces cooperate to avoid re-running text filters:
//!
//! - [`FilterTree`] aggregates the filter chain of every (entry, view)
//!   context and splits each chain into batches at the points where fewer
//!   contexts share the work.
//! - [`FileCache`] persists the output of each batch on disk, one bucket per
//!   entry, keyed by a [`ChainKey`] digest of every filter applied so far.
//!
//! ```text
//! chains ──add──> FilterTree ──iter──> batches ──ChainKey──> FileCache
//! ```
//!
//! The crate knows nothing about entries or filters; the tree is generic over
//! any hashable filter value and context key, and the cache stores raw bytes.
//!
//! # Example
//!
//! ```
//! use lectern_incremental::FilterTree;
//!
//! let mut tree = FilterTree::new();
//! tree.add(vec!["markdown", "h1", "typography"], "post/entry");
//! tree.add(vec!["markdown", "h1", "summarize"], "post/index");
//!
//! let batches: Vec<Vec<&&str>> = tree.iter(&"post/entry").collect();
//! assert_eq!(batches, vec![vec![&"markdown", &"h1"], vec![&"typography"]]);
//! ```

#![warn(missing_debug_implementations)]

pub mod cache;
pub mod key;
pub mod tree;

pub use cache::{CacheError, CacheStats, FileCache};
pub use key::{ChainKey, Digest};
pub use tree::{Batches, FilterTree};
