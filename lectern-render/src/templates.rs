//! Askama template definitions.

use askama::Template;

/// An entry page
#[derive(Template)]
#[template(path = "entry.html")]
pub struct EntryTemplate {
    // Site metadata
    pub site_title: String,
    pub site_description: String,
    pub site_author: String,
    pub base_url: String,

    // Page metadata
    pub title: String,
    pub date: String,
    pub date_iso: String,
    pub tags: Vec<String>,

    // Compiled HTML
    pub content: String,
}

/// One entry as listed on an index page
#[derive(Debug, Clone)]
pub struct IndexItem {
    pub title: String,
    pub permalink: String,
    pub date: String,
    pub date_iso: String,
    pub content: String,
}

/// A page listing entries, newest first
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    // Site metadata
    pub site_title: String,
    pub site_description: String,
    pub site_author: String,
    pub base_url: String,

    pub items: Vec<IndexItem>,
}
