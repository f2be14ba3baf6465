// ABOUTME: Popover enhancer that wraps reference anchors with an accessible, initially hidden bubble.
// ABOUTME: One compiled configuration covers both citation and footnote variants.

//! Reference popovers.
//!
//! A [`PopoverEnhancer`] scans a page's definitions into a [`LookupMap`], then
//! wraps every matching reference anchor:
//!
//! ```text
//! <span class="cite-popover"><a aria-describedby="cite-bubble-1" href="#bib-x" tabindex="0">3</a>
//!   <span class="cite-bubble" hidden="" id="cite-bubble-1" role="tooltip">payload</span></span>
//! ```
//!
//! References already inside a bubble (this variant's or one listed with
//! [`PopoverEnhancer::skip_inside`]) are left alone, so a payload never
//! grows a bubble of its own.
//!
//! Showing and hiding the bubbles is the job of [`crate::interact`].

pub mod lookup;

use std::collections::HashSet;

use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::dom::selectors::compile;
use crate::dom::serialize::{attr_value, escape_text, Edits, Insert};
use crate::dom::{has_class, parent_element, Page};
use crate::options::PopoverConfig;
use crate::result::{BubbleRecord, PopoverReport, Result};

pub use self::lookup::{DefinitionRules, LookupMap};
use self::lookup::{compile_pattern, first_capture};

/// A compiled popover variant.
#[derive(Debug, Clone)]
pub struct PopoverEnhancer {
    config: PopoverConfig,
    rules: DefinitionRules,
    references: Selector,
    reference_pattern: Regex,
    /// Bubble classes whose contents are never wrapped.
    bubble_classes: Vec<String>,
}

impl PopoverEnhancer {
    pub fn new(config: PopoverConfig) -> Result<Self> {
        Ok(Self {
            rules: DefinitionRules::new(&config)?,
            references: compile(&config.references, "compile references")?,
            reference_pattern: compile_pattern(&config.reference_pattern, "compile reference pattern", true)?,
            bubble_classes: vec![config.bubble_class.clone()],
            config,
        })
    }

    pub fn citation() -> Result<Self> {
        Self::new(PopoverConfig::citation())
    }

    pub fn footnote() -> Result<Self> {
        Self::new(PopoverConfig::footnote())
    }

    /// Also leave references inside bubbles of these classes alone.
    pub fn skip_inside<I, S>(mut self, bubble_classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bubble_classes.extend(bubble_classes.into_iter().map(Into::into));
        self
    }

    /// Parses, enhances and re-serializes markup.
    pub fn enhance(&self, source: &str) -> (String, PopoverReport) {
        let page = Page::parse(source);
        let mut edits = Edits::new();
        let report = self.plan(&page, &mut edits);
        (page.render(&edits), report)
    }

    /// Records the wrapping of every reference in `edits`.
    pub fn plan(&self, page: &Page, edits: &mut Edits) -> PopoverReport {
        let cfg = &self.config;
        let lookup = self.rules.scan(page);
        let mut ids = BubbleIds::new(&cfg.prefix, page.ids());

        let mut report = PopoverReport {
            prefix: cfg.prefix.clone(),
            click_toggles: cfg.click_toggles,
            definitions: lookup.len(),
            ..Default::default()
        };

        for reference in page.select(&self.references) {
            if self.is_wrapped(&reference) {
                continue;
            }
            if self.in_bubble(&reference) {
                tracing::debug!(
                    href = reference.value().attr("href").unwrap_or_default(),
                    prefix = %cfg.prefix,
                    "reference inside a bubble, not wrapped"
                );
                continue;
            }
            let Some(key) = reference
                .value()
                .attr("href")
                .and_then(|href| first_capture(&self.reference_pattern, href))
            else {
                tracing::debug!(
                    href = reference.value().attr("href").unwrap_or_default(),
                    prefix = %cfg.prefix,
                    "reference href does not carry an identifier"
                );
                report.skipped_references += 1;
                continue;
            };

            let bubble_id = ids.next_id();
            let (payload, resolved) = match lookup.get(&key) {
                Some(html) => (html.to_string(), true),
                None => {
                    tracing::debug!(key = %key, prefix = %cfg.prefix, "no definition, using fallback");
                    let mut text = String::new();
                    escape_text(&cfg.fallback, &mut text);
                    (text, false)
                }
            };

            self.wrap(&reference, &bubble_id, &payload, edits);
            report.bubbles.push(BubbleRecord {
                bubble_id,
                key,
                resolved,
            });
        }

        if let Some(root) = page.root_element() {
            edits.add_class(root, cfg.root_class.clone());
        }
        report
    }

    fn is_wrapped(&self, reference: &ElementRef) -> bool {
        parent_element(reference).is_some_and(|p| has_class(&p, &self.config.wrapper_class))
    }

    fn in_bubble(&self, reference: &ElementRef) -> bool {
        reference
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|el| self.bubble_classes.iter().any(|c| has_class(&el, c)))
    }

    fn wrap(&self, reference: &ElementRef, bubble_id: &str, payload: &str, edits: &mut Edits) {
        let cfg = &self.config;
        let id = reference.id();

        edits.insert_before(
            id,
            Insert::Html(format!(r#"<span class="{}">"#, attr_value(&cfg.wrapper_class))),
        );

        let described_by = match reference.value().attr("aria-describedby") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), bubble_id),
            _ => bubble_id.to_string(),
        };
        edits.set_attr(id, "aria-describedby", described_by);
        if reference.value().attr("tabindex").is_none() {
            edits.set_attr(id, "tabindex", "0");
        }

        edits.insert_after(
            id,
            Insert::Html(format!(
                r#"<span class="{}" hidden="" id="{}" role="tooltip">{}</span></span>"#,
                attr_value(&cfg.bubble_class),
                attr_value(bubble_id),
                payload
            )),
        );
    }
}

/// Sequential bubble ids that never collide with ids already in the page.
struct BubbleIds<'a> {
    prefix: &'a str,
    taken: HashSet<String>,
    counter: usize,
}

impl<'a> BubbleIds<'a> {
    fn new(prefix: &'a str, taken: HashSet<String>) -> Self {
        Self {
            prefix,
            taken,
            counter: 0,
        }
    }

    fn next_id(&mut self) -> String {
        loop {
            self.counter += 1;
            let id = format!("{}-bubble-{}", self.prefix, self.counter);
            if self.taken.insert(id.clone()) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn wraps_citation_reference_with_bubble() {
        let enhancer = PopoverEnhancer::citation().unwrap();
        let (html, report) = enhancer.enhance(
            r##"<p>See <a href="#bib-smith99">3</a>.</p><dl><dd><a id="bib-smith99"></a><p>Smith, 1999.</p></dd></dl>"##,
        );

        assert_eq!(report.bubbles.len(), 1);
        assert!(report.bubbles[0].resolved);
        assert!(html.contains(
            r##"<span class="cite-popover"><a aria-describedby="cite-bubble-1" href="#bib-smith99" tabindex="0">3</a><span class="cite-bubble" hidden="" id="cite-bubble-1" role="tooltip">Smith, 1999.</span></span>"##
        ));
    }

    #[test]
    fn unresolved_reference_gets_fallback() {
        let enhancer = PopoverEnhancer::footnote().unwrap();
        let (html, report) = enhancer.enhance(r##"<p>x<sup><a href="#footnote-9">9</a></sup></p>"##);
        assert_eq!(report.unresolved().count(), 1);
        assert!(html.contains(">Footnote not found.</span>"));
    }

    #[test]
    fn non_matching_href_is_skipped_and_counted() {
        let enhancer = PopoverEnhancer::citation().unwrap();
        let (html, report) = enhancer.enhance(r##"<a href="#bib-bad key">x</a>"##);
        assert_eq!(report.skipped_references, 1);
        assert!(report.bubbles.is_empty());
        assert_eq!(html, r##"<a href="#bib-bad key">x</a>"##);
    }

    #[test]
    fn keeps_existing_tabindex_and_describedby() {
        let enhancer = PopoverEnhancer::citation().unwrap();
        let (html, _) = enhancer.enhance(
            r##"<a href="#bib-a" tabindex="-1" aria-describedby="hint">a</a>"##,
        );
        assert!(html.contains(r#"tabindex="-1""#));
        assert!(html.contains(r#"aria-describedby="hint cite-bubble-1""#));
    }

    #[test]
    fn bubble_ids_skip_existing_ids() {
        let enhancer = PopoverEnhancer::citation().unwrap();
        let (_, report) = enhancer.enhance(
            r##"<span id="cite-bubble-1"></span><a href="#bib-a">a</a><a href="#bib-b">b</a>"##,
        );
        let ids: Vec<_> = report.bubbles.iter().map(|b| b.bubble_id.as_str()).collect();
        assert_eq!(ids, vec!["cite-bubble-2", "cite-bubble-3"]);
    }

    #[test]
    fn second_run_does_not_rewrap() {
        let enhancer = PopoverEnhancer::citation().unwrap();
        let (once, _) = enhancer.enhance(r##"<p><a href="#bib-a">a</a></p>"##);
        let (twice, report) = enhancer.enhance(&once);
        assert!(report.bubbles.is_empty());
        assert_eq!(once, twice);
    }

    #[test]
    fn references_inside_listed_bubbles_are_left_alone() {
        let enhancer = PopoverEnhancer::footnote().unwrap().skip_inside(["cite-bubble"]);
        let (html, report) = enhancer.enhance(concat!(
            r##"<p>x<sup><a href="#footnote-1">1</a></sup></p>"##,
            r##"<span class="cite-bubble" hidden=""><a href="#footnote-1">1</a></span>"##,
            r#"<div class="footnote"><p>1. Note.</p></div>"#,
        ));
        assert_eq!(report.bubbles.len(), 1);
        assert!(html.contains(r##"<span class="cite-bubble" hidden=""><a href="#footnote-1">1</a></span>"##));
    }

    #[test]
    fn documents_get_root_class() {
        let enhancer = PopoverEnhancer::citation().unwrap();
        let (html, _) = enhancer.enhance("<!DOCTYPE html><html><head></head><body><p>x</p></body></html>");
        assert!(html.contains(r#"<html class="citations-enhanced">"#));
    }
}
