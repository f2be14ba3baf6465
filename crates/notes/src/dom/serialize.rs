// ABOUTME: Edit-plan serializer that renders a parsed tree with skips, unwraps, attribute edits and insertions.
// ABOUTME: Enhancers plan their DOM changes as Edits keyed by NodeId, then render once.

//! Rendering a scraper tree through an edit plan.
//!
//! The enhancers never mutate the parsed tree. They record what should change
//! (drop a subtree, unwrap an element, set an attribute, insert markup or
//! move a node) in an [`Edits`] plan, and [`Renderer`] writes the resulting
//! markup in a single pass.

use std::collections::{HashMap, HashSet};

use ego_tree::{NodeId, NodeRef, Tree};
use scraper::Node;

/// Markup emitted at an insertion point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insert {
    /// Raw, already serialized markup.
    Html(String),
    /// Another node of the same tree, rendered with the same edits. The node
    /// is rendered even if it is skipped at its original position, which is
    /// how nodes are moved.
    Node(NodeId),
}

#[derive(Debug, Clone, Default)]
struct AttrEdit {
    set: Vec<(String, String)>,
    remove: Vec<String>,
    add_class: Vec<String>,
    remove_class: Vec<String>,
}

/// A set of pending changes to a parsed tree.
#[derive(Debug, Clone, Default)]
pub struct Edits {
    skip: HashSet<NodeId>,
    unwrap: HashSet<NodeId>,
    attrs: HashMap<NodeId, AttrEdit>,
    before: HashMap<NodeId, Vec<Insert>>,
    after: HashMap<NodeId, Vec<Insert>>,
    append: HashMap<NodeId, Vec<Insert>>,
    text: HashMap<NodeId, String>,
}

impl Edits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a node and its subtree at its original position.
    pub fn skip(&mut self, id: NodeId) {
        self.skip.insert(id);
    }

    pub fn is_skipped(&self, id: NodeId) -> bool {
        self.skip.contains(&id)
    }

    /// Render an element's children in place of the element.
    pub fn unwrap(&mut self, id: NodeId) {
        self.unwrap.insert(id);
    }

    /// Set an attribute, replacing any existing value.
    pub fn set_attr(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let edit = self.attrs.entry(id).or_default();
        edit.remove.retain(|n| n != &name);
        edit.set.retain(|(n, _)| n != &name);
        edit.set.push((name, value.into()));
    }

    pub fn remove_attr(&mut self, id: NodeId, name: impl Into<String>) {
        let name = name.into();
        let edit = self.attrs.entry(id).or_default();
        edit.set.retain(|(n, _)| n != &name);
        edit.remove.push(name);
    }

    pub fn add_class(&mut self, id: NodeId, class: impl Into<String>) {
        let class = class.into();
        let edit = self.attrs.entry(id).or_default();
        edit.remove_class.retain(|c| c != &class);
        if !edit.add_class.contains(&class) {
            edit.add_class.push(class);
        }
    }

    pub fn remove_class(&mut self, id: NodeId, class: impl Into<String>) {
        let class = class.into();
        let edit = self.attrs.entry(id).or_default();
        edit.add_class.retain(|c| c != &class);
        edit.remove_class.push(class);
    }

    pub fn insert_before(&mut self, id: NodeId, insert: Insert) {
        self.before.entry(id).or_default().push(insert);
    }

    pub fn insert_after(&mut self, id: NodeId, insert: Insert) {
        self.after.entry(id).or_default().push(insert);
    }

    /// Insert after the last child of an element.
    pub fn append(&mut self, id: NodeId, insert: Insert) {
        self.append.entry(id).or_default().push(insert);
    }

    /// Replace the content of a text node.
    pub fn replace_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.text.insert(id, text.into());
    }

    /// Copies the skip set of another plan into this one.
    pub fn inherit_skips(&mut self, other: &Edits) {
        self.skip.extend(other.skip.iter().copied());
    }
}

/// Renders a tree through an [`Edits`] plan.
pub struct Renderer<'a> {
    tree: &'a Tree<Node>,
    edits: &'a Edits,
}

impl<'a> Renderer<'a> {
    pub fn new(tree: &'a Tree<Node>, edits: &'a Edits) -> Self {
        Self { tree, edits }
    }

    /// Renders a node, even if it is skipped at its original position.
    pub fn node(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(node) = self.tree.get(id) {
            self.write(node, &mut out, false, false);
        }
        out
    }

    /// Renders an element's children followed by anything appended to it.
    pub fn contents(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(node) = self.tree.get(id) {
            let raw = is_raw_text_node(node);
            self.write_children(node, &mut out, raw);
            self.write_inserts(self.edits.append.get(&id), &mut out);
        }
        out
    }

    fn write(&self, node: NodeRef<'a, Node>, out: &mut String, raw_text: bool, honor_skip: bool) {
        let id = node.id();
        if honor_skip && self.edits.skip.contains(&id) {
            return;
        }
        self.write_inserts(self.edits.before.get(&id), out);

        match node.value() {
            Node::Text(t) => match self.edits.text.get(&id) {
                Some(replacement) => escape_text(replacement, out),
                None if raw_text => out.push_str(&**t),
                None => escape_text(&**t, out),
            },
            Node::Element(el) => {
                if self.edits.unwrap.contains(&id) {
                    self.write_children(node, out, raw_text);
                    self.write_inserts(self.edits.append.get(&id), out);
                } else {
                    let name = el.name();
                    out.push('<');
                    out.push_str(name);
                    for (k, v) in self.attributes(id, el) {
                        out.push(' ');
                        out.push_str(&k);
                        out.push_str("=\"");
                        escape_attr(&v, out);
                        out.push('"');
                    }
                    out.push('>');
                    if !is_void_element(name) {
                        self.write_children(node, out, is_raw_text_element(name));
                        self.write_inserts(self.edits.append.get(&id), out);
                        out.push_str("</");
                        out.push_str(name);
                        out.push('>');
                    }
                }
            }
            Node::Comment(c) => {
                out.push_str("<!--");
                out.push_str(&**c);
                out.push_str("-->");
            }
            Node::Doctype(d) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(d.name());
                out.push('>');
            }
            Node::Document | Node::Fragment => self.write_children(node, out, false),
            _ => {}
        }

        self.write_inserts(self.edits.after.get(&id), out);
    }

    fn write_children(&self, node: NodeRef<'a, Node>, out: &mut String, raw_text: bool) {
        for child in node.children() {
            self.write(child, out, raw_text, true);
        }
    }

    fn write_inserts(&self, inserts: Option<&Vec<Insert>>, out: &mut String) {
        for insert in inserts.into_iter().flatten() {
            match insert {
                Insert::Html(html) => out.push_str(html),
                Insert::Node(id) => {
                    if let Some(node) = self.tree.get(*id) {
                        self.write(node, out, false, false);
                    }
                }
            }
        }
    }

    /// Original attributes with the plan's attribute edits applied, sorted by
    /// name so that rendering a re-parsed page writes them the same way.
    fn attributes(&self, id: NodeId, el: &scraper::node::Element) -> Vec<(String, String)> {
        let mut attrs: Vec<(String, String)> = el
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if let Some(edit) = self.edits.attrs.get(&id) {
            apply_attr_edit(edit, &mut attrs);
        }
        attrs.sort_by(|a, b| a.0.cmp(&b.0));
        attrs
    }
}

fn apply_attr_edit(edit: &AttrEdit, attrs: &mut Vec<(String, String)>) {
    attrs.retain(|(k, _)| !edit.remove.iter().any(|r| r == k));
    for (name, value) in &edit.set {
        match attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value.clone(),
            None => attrs.push((name.clone(), value.clone())),
        }
    }

    if edit.add_class.is_empty() && edit.remove_class.is_empty() {
        return;
    }
    let existing = attrs
        .iter()
        .find(|(k, _)| k == "class")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    let mut classes: Vec<String> = existing
        .split_whitespace()
        .filter(|c| !edit.remove_class.iter().any(|r| r == c))
        .map(str::to_string)
        .collect();
    for class in &edit.add_class {
        if !classes.contains(class) {
            classes.push(class.clone());
        }
    }
    let joined = classes.join(" ");
    match attrs.iter_mut().position(|(k, _)| k == "class") {
        Some(pos) if joined.is_empty() => {
            attrs.remove(pos);
        }
        Some(pos) => attrs[pos].1 = joined,
        None if !joined.is_empty() => attrs.push(("class".to_string(), joined)),
        None => {}
    }
}

fn is_raw_text_node(node: NodeRef<Node>) -> bool {
    match node.value() {
        Node::Element(el) => is_raw_text_element(el.name()),
        _ => false,
    }
}

/// Escape text content.
pub fn escape_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

/// Escape an attribute value for a double-quoted attribute.
pub fn escape_attr(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

/// Convenience wrapper returning an escaped attribute value.
pub fn attr_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    escape_attr(s, &mut out);
    out
}

/// Check if tag is a void element
pub fn is_void_element(tag: &str) -> bool {
    matches!(
        tag.to_ascii_lowercase().as_str(),
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Elements whose text children are serialized without escaping.
fn is_raw_text_element(tag: &str) -> bool {
    matches!(
        tag.to_ascii_lowercase().as_str(),
        "script" | "style" | "xmp" | "iframe" | "noembed" | "noframes" | "plaintext" | "noscript"
    )
}
