//! Page-tree manifest
//!
//! The converter writes the rendered page tree as YAML, either as a bare
//! list of pages or wrapped in a `pages:` key. Relative attachment paths
//! and source files are resolved against the manifest's directory.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use pagesync_core::domain::Page;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestFile {
    Pages(Vec<Page>),
    Wrapped { pages: Vec<Page> },
}

/// Loads the page tree from a manifest file
pub fn load(path: &Path) -> Result<Vec<Page>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let mut pages = parse(&content)
        .with_context(|| format!("Failed to parse manifest {}", path.display()))?;

    if let Some(dir) = path.parent() {
        for page in &mut pages {
            resolve_paths(page, dir);
        }
    }
    Ok(pages)
}

fn parse(content: &str) -> Result<Vec<Page>> {
    let pages = match serde_yaml::from_str(content)? {
        ManifestFile::Pages(pages) => pages,
        ManifestFile::Wrapped { pages } => pages,
    };
    Ok(pages)
}

fn resolve_paths(page: &mut Page, dir: &Path) {
    for attachment in &mut page.content.attachments {
        if attachment.resource_location.is_relative() {
            attachment.resource_location = dir.join(&attachment.resource_location);
        }
    }
    if !page.source.as_os_str().is_empty() && page.source.is_relative() {
        page.source = dir.join(&page.source);
    }
    for child in &mut page.children {
        resolve_paths(child, dir);
    }
}
