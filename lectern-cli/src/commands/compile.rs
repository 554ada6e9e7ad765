//! Compile command implementation.

use anyhow::{Context, Result};
use lectern_core::{BuildOptions, Config, SiteBuilder};
use lectern_render::Renderer;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    pub force: bool,
    pub ignore_errors: bool,
}

/// Compile every entry and render the pages that changed
pub fn compile_site(config_path: &Path, options: CompileOptions) -> Result<()> {
    tracing::info!("Loading config from {:?}", config_path);
    let config = Config::from_file(config_path).context("Failed to load configuration")?;

    tracing::info!("Compiling site: {}", config.site.title);

    let mut builder = SiteBuilder::new(config.clone());
    let site = builder
        .build(&BuildOptions {
            force: options.force,
            ignore_errors: options.ignore_errors,
        })
        .context("Failed to compile site")?;

    let report = Renderer::new(&config)
        .render(&site)
        .context("Failed to render site")?;

    println!(
        "✓ Compiled {} entries: {} pages written, {} unchanged, {} skipped, {} removed",
        site.entries.len(),
        report.written,
        report.unchanged,
        report.skipped,
        report.removed
    );
    println!("  cache {}", site.stats);

    if !site.failures.is_empty() {
        println!("  {} files could not be read:", site.failures.len());
        for failure in &site.failures {
            println!("    {}: {}", failure.path.display(), failure.message);
        }
    }

    Ok(())
}
