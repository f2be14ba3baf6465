// ABOUTME: DOM utilities over scraper's tree: parsing pages, ancestor lookups and text helpers.
// ABOUTME: Submodules provide the selector cache and the edit-plan serializer.

//! DOM utilities for HTML document manipulation.
//!
//! A [`Page`] is a parsed document or fragment. Enhancers query it with
//! selectors, record changes in a [`serialize::Edits`] plan and render the
//! result with [`Page::render`].

pub mod selectors;
pub mod serialize;

use std::collections::HashSet;

use ego_tree::NodeId;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::html::Select;
use scraper::{ElementRef, Html, Selector};

use self::serialize::{Edits, Renderer};

static DOCUMENT_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<!doctype|<html[\s>]|<body[\s>]").unwrap());

/// A parsed page: a full document, or a fragment such as a template partial.
pub struct Page {
    html: Html,
    fragment: bool,
}

impl Page {
    /// Parses markup, as a document when it carries a doctype, `<html>` or
    /// `<body>`, otherwise as a body fragment.
    pub fn parse(source: &str) -> Self {
        if DOCUMENT_MARKERS.is_match(source) {
            Self {
                html: Html::parse_document(source),
                fragment: false,
            }
        } else {
            Self {
                html: Html::parse_fragment(source),
                fragment: true,
            }
        }
    }

    pub fn is_fragment(&self) -> bool {
        self.fragment
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn select<'a, 'b>(&'a self, selector: &'b Selector) -> Select<'a, 'b> {
        self.html.select(selector)
    }

    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }

    /// The `<html>` element of a document; fragments have no root to style.
    pub fn root_element(&self) -> Option<NodeId> {
        if self.fragment {
            None
        } else {
            Some(self.html.root_element().id())
        }
    }

    /// The element that receives end-of-document content.
    pub fn body(&self) -> NodeId {
        let root = self.html.root_element();
        if self.fragment {
            return root.id();
        }
        root.children()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name().eq_ignore_ascii_case("body"))
            .map(|el| el.id())
            .unwrap_or_else(|| root.id())
    }

    /// Every `id` attribute value in the page.
    pub fn ids(&self) -> HashSet<String> {
        self.html
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter_map(|el| el.value().id().map(str::to_string))
            .collect()
    }

    /// Renders the page through an edit plan.
    pub fn render(&self, edits: &Edits) -> String {
        let renderer = Renderer::new(&self.html.tree, edits);
        if self.fragment {
            renderer.contents(self.html.root_element().id())
        } else {
            renderer.contents(self.html.tree.root().id())
        }
    }

    /// Renders a single node, or an element's contents, through an edit plan.
    pub fn renderer<'a>(&'a self, edits: &'a Edits) -> Renderer<'a> {
        Renderer::new(&self.html.tree, edits)
    }
}

/// Nearest ancestor element (excluding the element itself) matching a selector.
pub fn closest<'a>(element: &ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| selector.matches(el))
}

/// Parent element, if the parent is an element.
pub fn parent_element<'a>(element: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    element.parent().and_then(ElementRef::wrap)
}

/// Returns true if `ancestor` is a proper ancestor of `element`.
pub fn is_ancestor(ancestor: NodeId, element: &ElementRef) -> bool {
    element.ancestors().any(|n| n.id() == ancestor)
}

pub fn has_class(element: &ElementRef, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates to `budget` characters, ending with an ellipsis when cut.
pub fn truncate_chars(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(budget).collect();
    let trimmed_len = cut.trim_end().len();
    cut.truncate(trimmed_len);
    cut.push('…');
    cut
}

/// Plain text of a markup fragment, whitespace-collapsed.
pub fn plain_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    normalize_spaces(&fragment.root_element().text().collect::<String>())
}
