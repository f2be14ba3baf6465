// ABOUTME: Builds the identifier -> sanitized HTML lookup map from a page's definitions.
// ABOUTME: Finds each definition's container, drops marker anchors, prefers a single inner container and sanitizes.

use std::collections::HashMap;

use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::dom::selectors::{compile, compile_any};
use crate::dom::serialize::Edits;
use crate::dom::{closest, parent_element, Page};
use crate::error::EnhanceError;
use crate::result::Result;
use crate::options::{KeySource, PopoverConfig};
use crate::sanitize::Sanitizer;

/// Identifier to sanitized payload. Built once per page and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupMap {
    entries: HashMap<String, String>,
}

impl LookupMap {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects entries keeping the first payload seen for each key.
impl FromIterator<(String, String)> for LookupMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut entries = HashMap::new();
        for (key, payload) in iter {
            entries.entry(key).or_insert(payload);
        }
        Self { entries }
    }
}

#[derive(Debug, Clone)]
enum KeyRule {
    Attr { name: String, pattern: Regex },
    Text { pattern: Regex },
}

impl KeyRule {
    fn extract(&self, element: &ElementRef) -> Option<String> {
        match self {
            KeyRule::Attr { name, pattern } => {
                let value = element.value().attr(name)?;
                first_capture(pattern, value)
            }
            KeyRule::Text { pattern } => {
                let text: String = element.text().collect();
                first_capture(pattern, &text)
            }
        }
    }
}

/// Capture group 1 of `pattern` in `haystack`.
pub(crate) fn first_capture(pattern: &Regex, haystack: &str) -> Option<String> {
    pattern
        .captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Compiles a configured regex; it must have at least one capture group when `capturing`.
pub(crate) fn compile_pattern(pattern: &str, op: &str, capturing: bool) -> Result<Regex> {
    let re = Regex::new(pattern)
        .map_err(|e| EnhanceError::invalid_pattern(pattern, op, Some(e.into())))?;
    if capturing && re.captures_len() < 2 {
        return Err(EnhanceError::invalid_pattern(
            pattern,
            op,
            Some(anyhow::anyhow!("pattern needs a capture group for the identifier")),
        ));
    }
    Ok(re)
}

/// Compiled definition-discovery rules for one popover variant.
#[derive(Debug, Clone)]
pub struct DefinitionRules {
    definitions: Selector,
    key: KeyRule,
    containers: Option<Selector>,
    markers: Option<Selector>,
    inner: Option<Selector>,
    payload_prefix: Option<Regex>,
    sanitizer: Sanitizer,
}

impl DefinitionRules {
    pub fn new(cfg: &PopoverConfig) -> Result<Self> {
        let key = match &cfg.key {
            KeySource::Attr { name, pattern } => KeyRule::Attr {
                name: name.clone(),
                pattern: compile_pattern(pattern, "compile definition key", true)?,
            },
            KeySource::Text { pattern } => KeyRule::Text {
                pattern: compile_pattern(pattern, "compile definition key", true)?,
            },
        };

        Ok(Self {
            definitions: compile(&cfg.definitions, "compile definitions")?,
            key,
            containers: compile_any(&cfg.containers, "compile containers")?,
            markers: cfg
                .markers
                .as_deref()
                .map(|css| compile(css, "compile markers"))
                .transpose()?,
            inner: cfg
                .inner
                .as_deref()
                .map(|css| compile(css, "compile inner container"))
                .transpose()?,
            payload_prefix: cfg
                .payload_prefix
                .as_deref()
                .map(|p| compile_pattern(p, "compile payload prefix", false))
                .transpose()?,
            sanitizer: if cfg.allow_cite {
                Sanitizer::citation()
            } else {
                Sanitizer::inline()
            },
        })
    }

    /// Scans definitions in document order. Duplicate keys keep the first
    /// payload; definitions without a key or container are skipped.
    pub fn scan(&self, page: &Page) -> LookupMap {
        let mut entries: Vec<(String, String)> = Vec::new();

        for definition in page.select(&self.definitions) {
            let Some(key) = self.key.extract(&definition) else {
                tracing::debug!("definition without a usable identifier skipped");
                continue;
            };
            if entries.iter().any(|(k, _)| k == &key) {
                tracing::debug!(key = %key, "duplicate definition ignored");
                continue;
            }
            let Some(container) = self.container_of(&definition) else {
                tracing::debug!(key = %key, "definition without a container skipped");
                continue;
            };
            entries.push((key, self.payload(page, container)));
        }

        entries.into_iter().collect()
    }

    fn container_of<'a>(&self, definition: &ElementRef<'a>) -> Option<ElementRef<'a>> {
        let Some(containers) = &self.containers else {
            return Some(*definition);
        };
        closest(definition, containers)
            .or_else(|| parent_element(definition))
            .filter(|el| !matches!(el.value().name(), "html" | "body"))
    }

    fn payload(&self, page: &Page, container: ElementRef) -> String {
        let mut edits = Edits::new();
        if let Some(markers) = &self.markers {
            for marker in container.select(markers) {
                edits.skip(marker.id());
            }
        }

        let target = self
            .inner
            .as_ref()
            .and_then(|sel| single(container.select(sel).filter(|el| !edits.is_skipped(el.id()))))
            .unwrap_or(container);

        let html = page.renderer(&edits).contents(target.id());
        let mut payload = self.sanitizer.sanitize(&html);
        if let Some(prefix) = &self.payload_prefix {
            payload = prefix.replace(&payload, "").into_owned();
        }
        payload.trim().to_string()
    }
}

/// The only item of an iterator, or `None` for zero or several.
fn single<T>(mut iter: impl Iterator<Item = T>) -> Option<T> {
    let first = iter.next()?;
    if iter.next().is_some() {
        None
    } else {
        Some(first)
    }
}
