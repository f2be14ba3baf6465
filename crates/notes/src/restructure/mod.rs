// ABOUTME: Footnote restructurer that turns inline footnote blocks into an endnotes list.
// ABOUTME: Relocates markers into the annotated paragraph, numbers the notes and attaches plain-text previews.

//! Inline footnotes to endnotes.
//!
//! Blocks, superscript markers and backward anchors are paired by position:
//! the i-th block belongs to the i-th marker and the i-th backward anchor.
//! Nothing checks that pairing against identifiers. When the counts differ
//! only indices with both a block and a marker are processed and the
//! mismatch is reported.

pub mod endnotes;

use scraper::{ElementRef, Selector};

use crate::dom::selectors::compile;
use crate::dom::serialize::{attr_value, Edits, Insert};
use crate::dom::{has_class, is_ancestor, plain_text, truncate_chars, Page};
use crate::options::RestructureConfig;
use crate::result::{Mismatch, RestructureReport, Result};

use self::endnotes::{item_content, render_item, Destination};

/// A superscript marker and the anchor inside it.
struct Marker<'a> {
    sup: ElementRef<'a>,
    anchor: ElementRef<'a>,
}

/// A compiled restructurer.
#[derive(Debug, Clone)]
pub struct Restructurer {
    config: RestructureConfig,
    blocks: Selector,
    references: Selector,
    backrefs: Selector,
}

impl Restructurer {
    pub fn new(config: RestructureConfig) -> Result<Self> {
        Ok(Self {
            blocks: compile(&config.blocks, "compile footnote blocks")?,
            references: compile(&config.references, "compile footnote references")?,
            backrefs: compile(&config.backrefs, "compile backward anchors")?,
            config,
        })
    }

    /// Parses, restructures and re-serializes markup. Markup without
    /// unprocessed blocks is returned unchanged with no report.
    pub fn restructure(&self, source: &str) -> (String, Option<RestructureReport>) {
        let page = Page::parse(source);
        let mut edits = Edits::new();
        match self.plan(&page, &mut edits) {
            Some(report) => (page.render(&edits), Some(report)),
            None => (source.to_string(), None),
        }
    }

    /// Records the restructuring in `edits`; `None` when the page has no
    /// unprocessed footnote blocks.
    pub fn plan(&self, page: &Page, edits: &mut Edits) -> Option<RestructureReport> {
        let cfg = &self.config;

        let blocks: Vec<ElementRef> = page
            .select(&self.blocks)
            .filter(|b| !has_class(b, &cfg.processed_class))
            .collect();
        if blocks.is_empty() {
            return None;
        }

        let markers: Vec<Marker> = page
            .select(&self.references)
            .filter(|a| !is_processed_marker(a, cfg))
            .filter_map(|anchor| {
                let sup = anchor
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .find(|el| el.value().name() == "sup")?;
                Some(Marker { sup, anchor })
            })
            .collect();

        let backrefs: Vec<ElementRef> = page
            .select(&self.backrefs)
            .filter(|a| !precedes_processed_marker(a, cfg))
            .collect();

        let mut report = RestructureReport::default();
        if blocks.len() != markers.len() || blocks.len() != backrefs.len() {
            let mismatch = Mismatch {
                blocks: blocks.len(),
                references: markers.len(),
                backrefs: backrefs.len(),
            };
            tracing::warn!(
                blocks = mismatch.blocks,
                references = mismatch.references,
                backrefs = mismatch.backrefs,
                "footnote counts differ, pairing by position"
            );
            report.mismatch = Some(mismatch);
        }

        let destination = Destination::locate(page, cfg);
        let offset = destination.offset();
        let pairs = blocks.len().min(markers.len());

        // Markers and backward anchors of every pair are left out of all
        // items, wherever they end up.
        let mut detached = Edits::new();
        for (i, marker) in markers.iter().take(pairs).enumerate() {
            detached.skip(marker.sup.id());
            if let Some(backref) = backrefs.get(i) {
                detached.skip(backref.id());
            }
        }

        let mut items = String::new();
        for (i, (block, marker)) in blocks.iter().zip(&markers).enumerate() {
            let n = offset + i + 1;
            if self.relocate(block, marker, backrefs.get(i), n, edits) {
                report.relocated += 1;
            }
            if backrefs.get(i).is_none() {
                report.synthesized_backrefs += 1;
            }

            let content = item_content(page, block, &detached, cfg);
            let preview = truncate_chars(&plain_text(&content), cfg.preview_chars);

            let anchor = marker.anchor.id();
            edits.set_attr(anchor, "href", format!("#{}{}", cfg.item_id_prefix, n));
            edits.set_attr(anchor, "id", format!("{}{}", cfg.marker_id_prefix, n));
            edits.set_attr(anchor, cfg.preview_attr.clone(), preview);
            edits.add_class(block.id(), cfg.processed_class.clone());

            items.push_str(&render_item(n, &content, cfg));
            report.endnotes.push(format!("{}{}", cfg.item_id_prefix, n));
        }

        if !items.is_empty() {
            destination.place(&items, cfg, edits);
        }

        if let Some(root) = page.root_element() {
            edits.add_class(root, cfg.ready_class.clone());
            edits.remove_class(root, cfg.pending_class.clone());
        }

        tracing::info!(
            endnotes = report.endnotes.len(),
            relocated = report.relocated,
            synthesized = report.synthesized_backrefs,
            "footnotes restructured"
        );
        Some(report)
    }

    /// Moves the backward anchor and then the marker to the end of the
    /// annotated paragraph. Returns false when there is no paragraph and the
    /// nodes stay where they are.
    fn relocate(
        &self,
        block: &ElementRef,
        marker: &Marker,
        backref: Option<&ElementRef>,
        n: usize,
        edits: &mut Edits,
    ) -> bool {
        let cfg = &self.config;
        let synthesized = || {
            Insert::Html(format!(
                r#"<a id="{}"></a>"#,
                attr_value(&format!("{}{}", cfg.backref_id_prefix, n))
            ))
        };

        let Some(paragraph) = target_paragraph(block) else {
            if backref.is_none() {
                edits.insert_before(marker.sup.id(), synthesized());
            }
            return false;
        };

        let inside = |el: &ElementRef| is_ancestor(paragraph.id(), el);
        let target = paragraph.id();
        let mut moved = false;

        match backref {
            Some(b) if inside(b) => {}
            Some(b) => {
                edits.skip(b.id());
                edits.append(target, Insert::Node(b.id()));
                moved = true;
            }
            None if inside(&marker.sup) => edits.insert_before(marker.sup.id(), synthesized()),
            None => edits.append(target, synthesized()),
        }

        if !inside(&marker.sup) {
            edits.skip(marker.sup.id());
            edits.append(target, Insert::Node(marker.sup.id()));
            moved = true;
        }
        moved
    }
}

/// Nearest preceding sibling `<p>`, else nearest ancestor `<p>`.
fn target_paragraph<'a>(block: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    block
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "p")
        .or_else(|| {
            block
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "p")
        })
}

/// A marker rewritten by an earlier run carries a marker id.
fn is_processed_marker(anchor: &ElementRef, cfg: &RestructureConfig) -> bool {
    anchor
        .value()
        .id()
        .is_some_and(|id| id.starts_with(&cfg.marker_id_prefix))
}

/// A backward anchor relocated by an earlier run sits right before its marker.
fn precedes_processed_marker(backref: &ElementRef, cfg: &RestructureConfig) -> bool {
    backref
        .next_siblings()
        .find_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "sup")
        .is_some_and(|sup| {
            sup.descendants()
                .filter_map(ElementRef::wrap)
                .any(|a| a.value().name() == "a" && is_processed_marker(&a, cfg))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn restructurer() -> Restructurer {
        Restructurer::new(RestructureConfig::default()).unwrap()
    }

    const ONE_NOTE: &str = r##"<p>Text.</p><div class="footnote"><a id="footnr-1"></a><sup><a href="#footnote-1">1</a></sup><p>1. The note.</p></div>"##;

    #[test]
    fn relocates_marker_and_builds_endnote() {
        let (html, report) = restructurer().restructure(ONE_NOTE);
        let report = report.unwrap();

        assert_eq!(report.endnotes, vec!["footnote-1"]);
        assert_eq!(report.relocated, 1);
        assert!(report.mismatch.is_none());
        assert_eq!(
            html,
            concat!(
                r##"<p>Text.<a id="footnr-1"></a><sup><a data-footnote-preview="The note." href="#footnote-1" id="footref-1">1</a></sup></p>"##,
                r#"<div class="footnote footnote-processed"><p>1. The note.</p></div>"#,
                r#"<section id="notes"><ol class="footnotes">"#,
                r##"<li id="footnote-1"><p>The note.</p><a class="footnote-backref" href="#footref-1">↩</a></li>"##,
                "</ol></section>"
            )
        );
    }

    #[test]
    fn second_run_is_a_no_op() {
        let (once, _) = restructurer().restructure(ONE_NOTE);
        let (twice, report) = restructurer().restructure(&once);
        assert!(report.is_none());
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_backref_is_synthesized() {
        let (html, report) = restructurer().restructure(
            r##"<p>Text.</p><div class="footnote"><sup><a href="#footnote-1">1</a></sup><p>1. Note.</p></div>"##,
        );
        let report = report.unwrap();
        assert_eq!(report.synthesized_backrefs, 1);
        assert!(report.mismatch.is_some());
        assert!(html.starts_with(r#"<p>Text.<a id="footnr-1"></a><sup>"#));
    }

    #[test]
    fn excess_blocks_are_left_untouched() {
        let (html, report) = restructurer().restructure(concat!(
            r##"<p>A.</p><div class="footnote"><a id="footnr-1"></a><sup><a href="#footnote-1">1</a></sup><p>1. One.</p></div>"##,
            r#"<p>B.</p><div class="footnote"><p>2. Two.</p></div>"#,
        ));
        let report = report.unwrap();
        assert_eq!(report.endnotes.len(), 1);
        assert_eq!(
            report.mismatch,
            Some(Mismatch {
                blocks: 2,
                references: 1,
                backrefs: 1
            })
        );
        assert!(html.contains(r#"<div class="footnote"><p>2. Two.</p></div>"#));
    }

    #[test]
    fn preview_is_truncated() {
        let mut cfg = RestructureConfig::default();
        cfg.preview_chars = 8;
        let (html, _) = Restructurer::new(cfg).unwrap().restructure(
            r##"<p>T</p><div class="footnote"><a id="footnr-1"></a><sup><a href="#footnote-1">1</a></sup><p>1. one two three</p></div>"##,
        );
        assert!(html.contains(r#"data-footnote-preview="one two…""#));
    }

    #[test]
    fn existing_section_is_reused_and_numbering_continues() {
        let (html, report) = restructurer().restructure(concat!(
            r##"<p>T.</p><div class="footnote"><a id="footnr-1"></a><sup><a href="#footnote-1">1</a></sup><p>1. New.</p></div>"##,
            r#"<section id="notes"><ol class="footnotes"><li id="footnote-1">Old.</li></ol></section>"#,
        ));
        assert_eq!(report.unwrap().endnotes, vec!["footnote-2"]);
        assert!(html.contains(r#"<li id="footnote-1">Old.</li><li id="footnote-2">"#));
        assert_eq!(html.matches("<section").count(), 1);
    }

    #[test]
    fn no_paragraph_leaves_marker_in_place() {
        let (html, report) = restructurer().restructure(
            r##"<div class="footnote"><a id="footnr-1"></a><sup><a href="#footnote-1">1</a></sup><p>1. Note.</p></div>"##,
        );
        let report = report.unwrap();
        assert_eq!(report.relocated, 0);
        assert!(html.starts_with(r##"<div class="footnote footnote-processed"><a id="footnr-1"></a><sup><a data-footnote-preview="Note." href="#footnote-1" id="footref-1""##));
    }

    #[test]
    fn block_inside_a_paragraph_annotates_that_paragraph() {
        let (html, report) = restructurer().restructure(
            r##"<div><p>Claim<span class="footnote"><sup><a href="#footnote-1">1</a></sup>1. Inline note.</span> continues.</p></div>"##,
        );
        let report = report.unwrap();
        assert_eq!(report.relocated, 0);
        assert_eq!(report.synthesized_backrefs, 1);
        assert_eq!(
            html,
            concat!(
                r#"<div><p>Claim<span class="footnote footnote-processed"><a id="footnr-1"></a><sup>"#,
                r##"<a data-footnote-preview="Inline note." href="#footnote-1" id="footref-1">1</a></sup>1. Inline note.</span> continues.</p></div>"##,
                r#"<section id="notes"><ol class="footnotes">"#,
                r##"<li id="footnote-1">Inline note.<a class="footnote-backref" href="#footref-1">↩</a></li>"##,
                "</ol></section>"
            )
        );
    }

    #[test]
    fn document_root_flips_readiness_classes() {
        let (html, _) = restructurer().restructure(concat!(
            r#"<!DOCTYPE html><html class="footnotes-pending"><head></head><body>"#,
            r##"<p>T.</p><div class="footnote"><a id="footnr-1"></a><sup><a href="#footnote-1">1</a></sup><p>1. N.</p></div>"##,
            "</body></html>"
        ));
        assert!(html.contains(r#"<html class="footnotes-ready">"#));
        assert!(html.contains(r#"</section></body>"#));
    }

    #[test]
    fn pages_without_blocks_are_unchanged() {
        let source = "<p>No notes here.</p>";
        assert_eq!(restructurer().restructure(source), (source.to_string(), None));
    }
}
