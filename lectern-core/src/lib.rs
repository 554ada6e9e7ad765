//! # lectern-core
//!
//! Core library for the lectern static blog compiler.
//!
//! This crate provides the content model, configuration, the filter
//! registry and the incremental compiler that runs every entry through the
//! filter chain of each view.

pub mod builder;
pub mod compiler;
pub mod config;
pub mod entry;
pub mod filters;
pub mod frontmatter;
pub mod loader;
pub mod slug;

pub use builder::{BuildError, BuildOptions, CompiledEntry, SiteBuilder, SiteIndex};
pub use compiler::{ChainTree, CompileError, Compiled, Compiler, ContextKey};
pub use config::{Config, ViewConfig, ViewKind};
pub use entry::{Entry, EntryError};
pub use filters::{Filter, FilterDef, FilterError, FilterPlugin, FilterRegistry};
pub use loader::EntryFailure;
pub use slug::slugify;
