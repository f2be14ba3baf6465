// ABOUTME: Endnote list helpers: locating or creating the endnotes section and rendering one list item.
// ABOUTME: Items are cloned from inline footnote blocks with layout-only wrappers flattened and the numeral stripped.

use std::collections::HashSet;

use ego_tree::NodeId;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Node};

use crate::dom::serialize::{attr_value, escape_text, Edits, Insert};
use crate::dom::{has_class, Page};
use crate::options::RestructureConfig;

static LEADING_NUMERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\.\s+").unwrap());

/// Where new endnote items go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// An existing `<ol>` inside the section; numbering continues after `existing` items.
    List { list: NodeId, existing: usize },
    /// An existing section without a list.
    Section(NodeId),
    /// No section yet; one is created at the end of the body.
    Body(NodeId),
}

impl Destination {
    pub fn locate(page: &Page, cfg: &RestructureConfig) -> Self {
        let section = page
            .html()
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().id() == Some(cfg.section_id.as_str()));

        let Some(section) = section else {
            return Destination::Body(page.body());
        };

        let list = section
            .children()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "ol" && has_class(el, &cfg.list_class));

        match list {
            Some(list) => Destination::List {
                list: list.id(),
                existing: list
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|el| el.value().name() == "li")
                    .count(),
            },
            None => Destination::Section(section.id()),
        }
    }

    /// Number of items already in the list.
    pub fn offset(&self) -> usize {
        match self {
            Destination::List { existing, .. } => *existing,
            _ => 0,
        }
    }

    /// Records the insertion of the rendered items.
    pub fn place(&self, items: &str, cfg: &RestructureConfig, edits: &mut Edits) {
        let list = format!(
            r#"<ol class="{}">{}</ol>"#,
            attr_value(&cfg.list_class),
            items
        );
        match *self {
            Destination::List { list: id, .. } => edits.append(id, Insert::Html(items.to_string())),
            Destination::Section(id) => edits.append(id, Insert::Html(list)),
            Destination::Body(id) => edits.append(
                id,
                Insert::Html(format!(
                    r#"<section id="{}">{}</section>"#,
                    attr_value(&cfg.section_id),
                    list
                )),
            ),
        }
    }
}

/// Renders the content of an endnote item from an inline block.
///
/// `moved` holds nodes relocated out of the block (markers and backward
/// anchors); they never appear in the item.
pub fn item_content(page: &Page, block: &ElementRef, moved: &Edits, cfg: &RestructureConfig) -> String {
    let mut flat = Edits::new();
    flat.inherit_skips(moved);

    let flatten: HashSet<&str> = cfg.flatten_tags.iter().map(String::as_str).collect();
    for el in block.descendants().skip(1).filter_map(ElementRef::wrap) {
        if flatten.contains(el.value().name()) && only_layout_attrs(&el, cfg) {
            flat.unwrap(el.id());
        }
    }

    if let Some((text_id, stripped)) = numeral_text(block, &flat) {
        flat.replace_text(text_id, stripped);
    }

    page.renderer(&flat).contents(block.id()).trim().to_string()
}

fn only_layout_attrs(el: &ElementRef, cfg: &RestructureConfig) -> bool {
    el.value()
        .attrs()
        .all(|(name, _)| cfg.layout_attrs.iter().any(|a| a.eq_ignore_ascii_case(name)))
}

/// The first visible text of the first paragraph, with its numeral removed.
fn numeral_text(block: &ElementRef, edits: &Edits) -> Option<(NodeId, String)> {
    let visible = |node: ego_tree::NodeRef<Node>| {
        !edits.is_skipped(node.id()) && !node.ancestors().any(|a| edits.is_skipped(a.id()))
    };

    let paragraph = block
        .descendants()
        .skip(1)
        .filter(|n| visible(*n))
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "p")
        .unwrap_or(*block);

    let text = paragraph
        .descendants()
        .filter(|n| visible(*n))
        .find(|n| matches!(n.value(), Node::Text(t) if !t.trim().is_empty()))?;
    let Node::Text(t) = text.value() else {
        return None;
    };

    LEADING_NUMERAL
        .is_match(t)
        .then(|| (text.id(), LEADING_NUMERAL.replace(t, "").into_owned()))
}

/// One `<li>` with its back-reference link.
pub fn render_item(n: usize, content: &str, cfg: &RestructureConfig) -> String {
    let mut backref_text = String::new();
    escape_text(&cfg.backref_text, &mut backref_text);
    format!(
        r##"<li id="{item}">{content}<a class="{class}" href="#{marker}">{text}</a></li>"##,
        item = attr_value(&format!("{}{}", cfg.item_id_prefix, n)),
        content = content,
        marker = attr_value(&format!("{}{}", cfg.marker_id_prefix, n)),
        class = attr_value(&cfg.backref_class),
        text = backref_text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scraper::Selector;

    fn block(page: &Page) -> ElementRef<'_> {
        let sel = Selector::parse(".footnote").unwrap();
        page.select(&sel).next().unwrap()
    }

    #[test]
    fn flattens_layout_wrappers_and_strips_numeral() {
        let page = Page::parse(
            r#"<div class="footnote"><div style="margin:0"><p>2. <span>Body</span> text</p></div><span class="keep">k</span></div>"#,
        );
        let cfg = RestructureConfig::default();
        let content = item_content(&page, &block(&page), &Edits::new(), &cfg);
        assert_eq!(content, r#"<p>Body text</p><span class="keep">k</span>"#);
    }

    #[test]
    fn moved_nodes_are_left_out() {
        let page = Page::parse(
            r##"<div class="footnote"><sup><a href="#footnote-1">1</a></sup><p>1. Note</p></div>"##,
        );
        let cfg = RestructureConfig::default();
        let mut moved = Edits::new();
        let sup = page.select(&Selector::parse("sup").unwrap()).next().unwrap();
        moved.skip(sup.id());
        assert_eq!(item_content(&page, &block(&page), &moved, &cfg), "<p>Note</p>");
    }

    #[test]
    fn renders_item_with_backref() {
        let cfg = RestructureConfig::default();
        assert_eq!(
            render_item(3, "<p>x</p>", &cfg),
            r##"<li id="footnote-3"><p>x</p><a class="footnote-backref" href="#footref-3">↩</a></li>"##
        );
    }

    #[test]
    fn locates_existing_list() {
        let cfg = RestructureConfig::default();
        let page = Page::parse(
            r#"<p>x</p><section id="notes"><ol class="footnotes"><li>a</li><li>b</li></ol></section>"#,
        );
        let dest = Destination::locate(&page, &cfg);
        assert!(matches!(dest, Destination::List { existing: 2, .. }));
        assert_eq!(dest.offset(), 2);
    }

    #[test]
    fn missing_section_targets_body() {
        let cfg = RestructureConfig::default();
        let page = Page::parse("<p>x</p>");
        assert_eq!(Destination::locate(&page, &cfg), Destination::Body(page.body()));
    }
}
