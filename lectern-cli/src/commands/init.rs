//! Init command implementation.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

const DEFAULT_CONFIG: &str = include_str!("../../../lectern.yml.example");

/// Initialize a new lectern project
pub fn init_project(path: Option<&Path>) -> Result<()> {
    let root = path.unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(root).with_context(|| format!("Failed to create {:?}", root))?;

    write_config(root)?;
    scaffold_content(root)?;

    println!("✓ lectern initialized in {:?}", root);
    println!("  - Edit lectern.yml to customize site metadata and filters");
    println!("  - Write entries in content/ and run `lectern compile`");
    Ok(())
}

fn write_config(root: &Path) -> Result<()> {
    let config_path = root.join("lectern.yml");
    if config_path.exists() {
        println!("lectern.yml already exists at {:?}", config_path);
        return Ok(());
    }

    fs::write(&config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {:?}", config_path))?;
    println!("Created {:?}", config_path);
    Ok(())
}

fn scaffold_content(root: &Path) -> Result<()> {
    let content = root.join("content");
    fs::create_dir_all(&content).with_context(|| format!("Failed to create {:?}", content))?;

    let sample = content.join("hello-world.md");
    if !sample.exists() {
        fs::write(&sample, SAMPLE_ENTRY).with_context(|| format!("Failed to write {:?}", sample))?;
        println!("Created {:?}", sample);
    }
    Ok(())
}

const SAMPLE_ENTRY: &str = r#"---
title: Hello World
date: 2024-01-01
tags: [meta]
---

# Hello

This is your first entry. Entries are Markdown files with a YAML header;
the `filters` field adds filters for this entry only, and a `no` prefix
removes one, e.g. `filters: [notypography]`.

Edit it, run `lectern compile` again, and only this page is rebuilt.
"#;
