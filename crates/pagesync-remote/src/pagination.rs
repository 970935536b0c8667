//! Cursor pagination over REST collections
//!
//! Collection endpoints answer with a page of `results` and, when more
//! items exist, a `_links.next` link. [`fetch_all`] follows those links
//! until the collection is exhausted.
//!
//! ## Flow
//!
//! 1. The caller makes the first request itself and hands over the page
//! 2. `next` is resolved against the API base URL and loaded
//! 3. Items are appended in server order
//! 4. The loop stops on a page without `next`, or on a page with zero
//!    items even when a `next` link is still present
//!
//! Retries are not handled here; the loader goes through the client's
//! retry wrapper.

use std::collections::HashSet;
use std::future::Future;

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::RemoteError;

/// Links block of a paginated response
#[derive(Debug, Default, Deserialize)]
pub struct Links {
    /// Link to the next page, usually relative to the API base
    pub next: Option<String>,
}

/// One page of a paginated collection
#[derive(Debug, Deserialize)]
pub struct Paged<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(rename = "_links", default)]
    pub links: Links,
}

impl<T> Paged<T> {
    pub fn new(results: Vec<T>, next: Option<String>) -> Self {
        Self {
            results,
            links: Links { next },
        }
    }
}

/// Resolves a next link against the API base URL.
///
/// Absolute links are used as-is. Relative links are appended to the base,
/// keeping any context path the base carries (`https://host/wiki`).
pub fn resolve_link(base_url: &str, link: &str) -> Result<Url, RemoteError> {
    match Url::parse(link) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base_url.trim_end_matches('/');
            if link.starts_with('/') {
                Ok(Url::parse(&format!("{base}{link}"))?)
            } else {
                Ok(Url::parse(&format!("{base}/{link}"))?)
            }
        }
        Err(err) => Err(err.into()),
    }
}

/// Collects every item of a paginated collection
///
/// # Arguments
///
/// * `first` - The already loaded first page
/// * `first_url` - URL the first page was loaded from, when known
/// * `base_url` - Base URL relative next links are resolved against
/// * `load` - Loads one page given its absolute URL
///
/// # Returns
///
/// All items in server order. A next link that was already requested
/// ends the walk instead of looping.
pub async fn fetch_all<T, F, Fut>(
    first: Paged<T>,
    first_url: Option<Url>,
    base_url: &str,
    mut load: F,
) -> Result<Vec<T>, RemoteError>
where
    F: FnMut(Url) -> Fut,
    Fut: Future<Output = Result<Paged<T>, RemoteError>>,
{
    let mut items = first.results;
    let mut next = first.links.next;
    let mut visited: HashSet<Url> = first_url.into_iter().collect();
    let mut page_count: u32 = 1;

    if items.is_empty() {
        return Ok(items);
    }

    while let Some(link) = next.take() {
        let url = resolve_link(base_url, &link)?;
        if !visited.insert(url.clone()) {
            warn!(%url, "Next link points at an already fetched page, stopping");
            break;
        }

        page_count += 1;
        debug!(page = page_count, %url, "Following next link");
        let page = load(url).await?;

        if page.results.is_empty() {
            debug!(page = page_count, "Empty page, treating as end of collection");
            break;
        }

        items.extend(page.results);
        next = page.links.next;
    }

    debug!(
        total_items = items.len(),
        total_pages = page_count,
        "Pagination complete"
    );
    Ok(items)
}
