// ABOUTME: Pre-compiled CSS selector cache shared by every enhancer.
// ABOUTME: Compiles each selector string once and hands out clones on later lookups.

//! Selector caching for repeated DOM queries.
//!
//! Every document processed by an enhancer runs the same handful of
//! selectors. Parsing them is more expensive than matching, so they are
//! compiled once per process and reused.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use scraper::Selector;

use crate::error::EnhanceError;
use crate::result::Result;

/// Thread-safe cache of compiled CSS selectors. Invalid selectors are cached as `None`.
static SELECTOR_CACHE: Lazy<RwLock<HashMap<String, Option<Selector>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Gets or compiles a CSS selector, caching the result.
///
/// Returns `Some(Selector)` if the selector is valid, `None` if invalid.
pub fn get_or_compile(css: &str) -> Option<Selector> {
    {
        let cache = SELECTOR_CACHE.read().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.get(css) {
            return cached.clone();
        }
    }

    let compiled = Selector::parse(css).ok();
    let mut cache = SELECTOR_CACHE.write().unwrap_or_else(|e| e.into_inner());
    // Another thread may have inserted while we compiled
    if let Some(cached) = cache.get(css) {
        return cached.clone();
    }
    cache.insert(css.to_string(), compiled.clone());
    compiled
}

/// Compiles a selector that comes from configuration, reporting invalid ones.
pub fn compile(css: &str, op: &str) -> Result<Selector> {
    get_or_compile(css).ok_or_else(|| EnhanceError::invalid_selector(css, op, None))
}

/// Compiles a list of selectors into one comma-joined selector.
///
/// Returns `Ok(None)` for an empty list.
pub fn compile_any(list: &[String], op: &str) -> Result<Option<Selector>> {
    if list.is_empty() {
        return Ok(None);
    }
    for css in list {
        compile(css, op)?;
    }
    compile(&list.join(", "), op).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_selector_is_cached() {
        assert!(get_or_compile("a[href^=\"#bib-\"]").is_some());
        assert!(get_or_compile("a[href^=\"#bib-\"]").is_some());
    }

    #[test]
    fn invalid_selector_returns_none() {
        assert!(get_or_compile("[[[invalid").is_none());
        assert!(get_or_compile("[[[invalid").is_none());
    }

    #[test]
    fn compile_reports_invalid_selector() {
        let err = compile("p >>> ", "compile containers").unwrap_err();
        assert!(err.is_invalid_selector());
        assert_eq!(err.target, "p >>> ");
    }

    #[test]
    fn compile_any_joins_list() {
        let sel = compile_any(&["dd".to_string(), "p".to_string()], "containers")
            .unwrap()
            .unwrap();
        let doc = scraper::Html::parse_fragment("<dl><dd>x</dd></dl><p>y</p>");
        assert_eq!(doc.select(&sel).count(), 2);
        assert!(compile_any(&[], "containers").unwrap().is_none());
    }
}
