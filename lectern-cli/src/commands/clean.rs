//! Clean command implementation.

use anyhow::{Context, Result};
use lectern_core::Config;
use lectern_incremental::FileCache;
use std::path::Path;

/// Delete every cached batch
pub fn clean_cache(config_path: &Path) -> Result<()> {
    let config = Config::from_file(config_path).context("Failed to load configuration")?;
    let cache_dir = config.cache_dir();

    let cache = FileCache::open(&cache_dir)
        .with_context(|| format!("Failed to open cache at {:?}", cache_dir))?;
    let buckets = cache.buckets().len();
    cache
        .clear()
        .with_context(|| format!("Failed to clear cache at {:?}", cache_dir))?;

    println!("✓ Removed {} cache buckets from {:?}", buckets, cache_dir);
    Ok(())
}
