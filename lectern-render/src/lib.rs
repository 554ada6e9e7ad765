//! # lectern-render
//!
//! Template rendering library for lectern.
//!
//! This crate turns a compiled [`SiteIndex`] into HTML pages using Askama,
//! writing only the pages whose inputs changed.

pub mod manifest;
pub mod output;
pub mod templates;

use askama::Template;
use lectern_core::{CompiledEntry, Config, SiteIndex, ViewConfig, ViewKind};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub use manifest::{fingerprint, RenderManifest, MANIFEST_FILE};
pub use output::write_if_changed;
pub use templates::{EntryTemplate, IndexItem, IndexTemplate};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Failed to write {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// What a render pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Pages written to disk
    pub written: usize,
    /// Pages rendered but identical to what was on disk
    pub unchanged: usize,
    /// Pages not rendered because nothing they show changed
    pub skipped: usize,
    /// Pages from the previous render that no longer belong to the site
    pub removed: usize,
}

/// State of one render pass
struct Pass {
    output_dir: PathBuf,
    /// The configuration the templates read differs from the last render
    config_changed: bool,
    pages: BTreeSet<PathBuf>,
    report: RenderReport,
}

impl Pass {
    /// Claim `page` for this render and say whether it must be rendered
    fn claim(&mut self, page: &Path, changed: bool) -> Option<PathBuf> {
        self.pages.insert(page.to_path_buf());
        let path = self.output_dir.join(page);
        if self.config_changed || changed || !path.exists() {
            Some(path)
        } else {
            self.report.skipped += 1;
            None
        }
    }
}

/// Renders every view of a compiled site into the output directory
#[derive(Debug)]
pub struct Renderer<'a> {
    config: &'a Config,
}

impl<'a> Renderer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn render(&self, site: &SiteIndex) -> Result<RenderReport, RenderError> {
        let manifest_path = self.config.cache_dir().join(MANIFEST_FILE);
        let previous = RenderManifest::load(&manifest_path);
        let fingerprint = fingerprint(self.config);

        let config_changed = previous.fingerprint != fingerprint;
        if config_changed && !previous.fingerprint.is_empty() {
            tracing::info!("Site configuration changed, rendering every page");
        }

        let mut pass = Pass {
            output_dir: self.config.output_dir(),
            config_changed,
            pages: BTreeSet::new(),
            report: RenderReport::default(),
        };

        for view in &self.config.views {
            match view.kind {
                ViewKind::Entry => self.render_entries(view, site, &mut pass)?,
                ViewKind::Index => self.render_index(view, site, &mut pass)?,
            }
        }

        for page in previous.pages.difference(&pass.pages) {
            if remove_page(&pass.output_dir, page)? {
                pass.report.removed += 1;
            }
        }

        let manifest = RenderManifest {
            fingerprint,
            pages: pass.pages,
        };
        manifest
            .save(&manifest_path)
            .map_err(|source| RenderError::Io {
                path: manifest_path.clone(),
                source,
            })?;

        let report = pass.report;
        tracing::info!(
            "Rendered {} pages ({} unchanged, {} skipped, {} removed)",
            report.written,
            report.unchanged,
            report.skipped,
            report.removed
        );
        Ok(report)
    }

    fn render_entries(
        &self,
        view: &ViewConfig,
        site: &SiteIndex,
        pass: &mut Pass,
    ) -> Result<(), RenderError> {
        let root = route(view);

        for compiled in site.published() {
            let Some(result) = compiled.view(&view.name) else {
                continue;
            };
            let page = root.join(compiled.entry.output_path());
            let Some(path) = pass.claim(&page, result.has_changed) else {
                continue;
            };

            let entry = &compiled.entry;
            let html = EntryTemplate {
                site_title: self.config.site.title.clone(),
                site_description: self.config.site.description.clone(),
                site_author: self.config.site.author.clone(),
                base_url: self.base_url(),
                title: entry.title().to_string(),
                date: entry.date().format("%B %-d, %Y").to_string(),
                date_iso: entry.date().format("%Y-%m-%dT%H:%M:%S").to_string(),
                tags: entry.tags().to_vec(),
                content: result.content.clone(),
            }
            .render()?;
            write_page(&path, &html, &mut pass.report)?;
        }
        Ok(())
    }

    fn render_index(
        &self,
        view: &ViewConfig,
        site: &SiteIndex,
        pass: &mut Pass,
    ) -> Result<(), RenderError> {
        // Drafts count: an entry that just became a draft must drop off the list
        let changed = site.removed_buckets > 0
            || site
                .entries
                .iter()
                .any(|c| c.view(&view.name).is_some_and(|v| v.has_changed));
        let Some(path) = pass.claim(&route(view).join("index.html"), changed) else {
            return Ok(());
        };

        let items = site
            .published()
            .filter_map(|c| self.index_item(c, &view.name))
            .collect();
        let html = IndexTemplate {
            site_title: self.config.site.title.clone(),
            site_description: self.config.site.description.clone(),
            site_author: self.config.site.author.clone(),
            base_url: self.base_url(),
            items,
        }
        .render()?;
        write_page(&path, &html, &mut pass.report)
    }

    fn index_item(&self, compiled: &CompiledEntry, view: &str) -> Option<IndexItem> {
        let entry = &compiled.entry;
        Some(IndexItem {
            title: entry.title().to_string(),
            permalink: entry.permalink().to_string(),
            date: entry.date().format("%B %-d, %Y").to_string(),
            date_iso: entry.date().format("%Y-%m-%dT%H:%M:%S").to_string(),
            content: compiled.view(view)?.content.clone(),
        })
    }

    fn base_url(&self) -> String {
        self.config.site.url.trim_end_matches('/').to_string()
    }
}

/// Directory a view renders into, relative to the output directory
fn route(view: &ViewConfig) -> PathBuf {
    match view.path.as_deref().map(|p| p.trim_matches('/')) {
        Some(route) if !route.is_empty() => PathBuf::from(route),
        _ => PathBuf::new(),
    }
}

fn write_page(path: &Path, html: &str, report: &mut RenderReport) -> Result<(), RenderError> {
    let written = write_if_changed(path, html.as_bytes()).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if written {
        tracing::debug!("Wrote {:?}", path);
        report.written += 1;
    } else {
        report.unchanged += 1;
    }
    Ok(())
}

/// Delete a page left over from an earlier render, then any directories it
/// leaves empty. Returns whether a file was removed.
fn remove_page(output_dir: &Path, page: &Path) -> Result<bool, RenderError> {
    if !page.components().all(|c| matches!(c, Component::Normal(_))) {
        tracing::warn!("Ignoring suspicious page {:?} in render manifest", page);
        return Ok(false);
    }

    let path = output_dir.join(page);
    match fs::remove_file(&path) {
        Ok(()) => tracing::debug!("Removed stale page {:?}", path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(source) => return Err(RenderError::Io { path, source }),
    }

    let mut dir = path.parent();
    while let Some(current) = dir {
        if current == output_dir || fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::{BuildOptions, SiteBuilder};
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn site(entries: &[(&str, &str)]) -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let content = dir.path().join("content");
        fs::create_dir_all(&content).unwrap();
        for (name, body) in entries {
            let path = content.join(name);
            fs::write(&path, body).unwrap();
            fs::File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(SystemTime::now() - Duration::from_secs(3600))
                .unwrap();
        }
        let config_path = dir.path().join("lectern.yml");
        fs::write(&config_path, "site:\n  title: My Blog\n").unwrap();
        (dir, Config::from_file(&config_path).unwrap())
    }

    fn rewrite(dir: &TempDir, name: &str, body: &str) {
        let path = dir.path().join("content").join(name);
        fs::write(&path, body).unwrap();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(5))
            .unwrap();
    }

    fn build(config: &Config) -> SiteIndex {
        SiteBuilder::new(config.clone())
            .build(&BuildOptions::default())
            .unwrap()
    }

    #[test]
    fn test_renders_entry_and_index_pages() {
        let (dir, config) = site(&[
            ("hello.md", "---\ntitle: Hello\ndate: 2024-05-01\ntags: [rust]\n---\n# Hi *there*\n"),
            ("draft.md", "---\ntitle: Secret\ndate: 2024-05-02\ndraft: true\n---\nsecret\n"),
        ]);
        let report = Renderer::new(&config).render(&build(&config)).unwrap();
        assert_eq!(report.written, 2);

        let entry = fs::read_to_string(dir.path().join("output/2024/hello/index.html")).unwrap();
        assert!(entry.contains("<h1>Hi <em>there</em></h1>"));
        assert!(entry.contains("<title>Hello | My Blog</title>"));
        assert!(entry.contains("<span class=\"tag\">rust</span>"));

        let index = fs::read_to_string(dir.path().join("output/index.html")).unwrap();
        assert!(index.contains("href=\"/2024/hello/\""));
        assert!(!index.contains("Secret"));
        assert!(!dir.path().join("output/2024/secret").exists());
    }

    #[test]
    fn test_unchanged_site_skips_pages() {
        let (dir, config) = site(&[("a.md", "---\ntitle: A\ndate: 2024-01-01\n---\nbody\n")]);
        Renderer::new(&config).render(&build(&config)).unwrap();

        let report = Renderer::new(&config).render(&build(&config)).unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(report.skipped, 2);

        fs::remove_file(dir.path().join("output/2024/a/index.html")).unwrap();
        let report = Renderer::new(&config).render(&build(&config)).unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_removed_entry_rerenders_index() {
        let (dir, config) = site(&[
            ("a.md", "---\ntitle: Alpha\ndate: 2024-01-01\n---\na\n"),
            ("b.md", "---\ntitle: Beta\ndate: 2024-01-02\n---\nb\n"),
        ]);
        Renderer::new(&config).render(&build(&config)).unwrap();

        fs::remove_file(dir.path().join("content/b.md")).unwrap();
        let report = Renderer::new(&config).render(&build(&config)).unwrap();
        assert_eq!(report.written, 1);

        let index = fs::read_to_string(dir.path().join("output/index.html")).unwrap();
        assert!(index.contains("Alpha"));
        assert!(!index.contains("Beta"));
    }

    #[test]
    fn test_site_metadata_change_rerenders_every_page() {
        let (dir, config) = site(&[("a.md", "---\ntitle: A\ndate: 2024-01-01\n---\nbody\n")]);
        Renderer::new(&config).render(&build(&config)).unwrap();

        let config_path = dir.path().join("lectern.yml");
        fs::write(&config_path, "site:\n  title: New Title\n").unwrap();
        let config = Config::from_file(&config_path).unwrap();
        let report = Renderer::new(&config).render(&build(&config)).unwrap();
        assert_eq!(report.written, 2);
        assert_eq!(report.skipped, 0);

        let entry = fs::read_to_string(dir.path().join("output/2024/a/index.html")).unwrap();
        assert!(entry.contains("New Title"));
        let index = fs::read_to_string(dir.path().join("output/index.html")).unwrap();
        assert!(index.contains("New Title"));

        let report = Renderer::new(&config).render(&build(&config)).unwrap();
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_new_draft_page_is_removed() {
        let (dir, config) = site(&[
            ("a.md", "---\ntitle: Alpha\ndate: 2024-01-01\n---\na\n"),
            ("b.md", "---\ntitle: Beta\ndate: 2024-01-02\n---\nb\n"),
        ]);
        Renderer::new(&config).render(&build(&config)).unwrap();
        assert!(dir.path().join("output/2024/beta/index.html").exists());

        rewrite(&dir, "b.md", "---\ntitle: Beta\ndate: 2024-01-02\ndraft: true\n---\nb\n");
        let report = Renderer::new(&config).render(&build(&config)).unwrap();
        assert_eq!(report.removed, 1);
        assert!(!dir.path().join("output/2024/beta").exists());
        assert!(dir.path().join("output/2024/alpha/index.html").exists());

        let index = fs::read_to_string(dir.path().join("output/index.html")).unwrap();
        assert!(!index.contains("Beta"));
    }

    #[test]
    fn test_renamed_entry_leaves_no_old_page() {
        let (dir, config) = site(&[("a.md", "---\ntitle: Old Name\ndate: 2024-01-01\n---\na\n")]);
        Renderer::new(&config).render(&build(&config)).unwrap();

        rewrite(&dir, "a.md", "---\ntitle: New Name\ndate: 2024-01-01\n---\na\n");
        let report = Renderer::new(&config).render(&build(&config)).unwrap();
        assert_eq!(report.removed, 1);
        assert!(!dir.path().join("output/2024/old-name").exists());
        assert!(dir.path().join("output/2024/new-name/index.html").exists());
    }

    #[test]
    fn test_route() {
        let view = ViewConfig {
            name: "feed".into(),
            kind: ViewKind::Index,
            path: Some("/feed/".into()),
            filters: vec![],
        };
        assert_eq!(route(&view), PathBuf::from("feed"));
    }
}
