// ABOUTME: Inline-markup sanitizer for popover payloads, built on ammonia.
// ABOUTME: Unwraps non-allow-listed tags, filters attributes and drops script URLs, then renders a re-parse-stable form.

//! Restricted HTML sanitizer.
//!
//! Cleaning is done by an `ammonia::Builder` with the popover allow-list.
//! Elements outside the list are unwrapped and their text is kept, including
//! the text of `<script>` and `<style>`. Allowed elements keep only `href`,
//! `title` and `aria-label`, and links with a scheme outside [`URL_SCHEMES`]
//! lose their `href`.
//!
//! Unwrapping can leave markup the HTML parser would restructure (an anchor
//! inside an anchor once a table between them is gone). The cleaned markup is
//! therefore re-parsed and rendered until it stops changing.

use std::collections::{HashMap, HashSet};

use scraper::Html;

use crate::dom::serialize::{Edits, Renderer};

/// Inline tags kept by every popover.
const INLINE_TAGS: &[&str] = &[
    "a", "em", "i", "strong", "b", "code", "span", "sub", "sup", "s", "strike", "u", "small", "br",
];

/// Attributes kept on allowed elements.
const ALLOWED_ATTRS: &[&str] = &["href", "title", "aria-label"];

/// Link schemes kept on `href`. Relative links always pass.
const URL_SCHEMES: &[&str] = &["http", "https", "mailto", "ftp", "tel"];

/// Re-parse passes before the output is taken as is.
const MAX_PASSES: usize = 4;

/// An allow-list sanitizer for popover content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitizer {
    tags: Vec<&'static str>,
}

impl Sanitizer {
    /// The inline allow-list used by footnote popovers.
    pub fn inline() -> Self {
        Self {
            tags: INLINE_TAGS.to_vec(),
        }
    }

    /// The inline allow-list plus `cite`, used by citation popovers.
    pub fn citation() -> Self {
        let mut tags = INLINE_TAGS.to_vec();
        tags.push("cite");
        Self { tags }
    }

    /// Returns the sanitized serialization of `html`. The input is only read.
    pub fn sanitize(&self, html: &str) -> String {
        let builder = self.builder();
        let mut current = clean(&builder, html);
        for _ in 0..MAX_PASSES {
            let next = clean(&builder, &current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn builder(&self) -> ammonia::Builder<'static> {
        let mut builder = ammonia::Builder::new();
        builder
            .tags(self.tags.iter().copied().collect())
            .clean_content_tags(HashSet::new())
            .tag_attributes(HashMap::new())
            .generic_attributes(ALLOWED_ATTRS.iter().copied().collect())
            .url_schemes(URL_SCHEMES.iter().copied().collect())
            .link_rel(None)
            .strip_comments(true);
        builder
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::inline()
    }
}

/// One ammonia pass, rendered the way the enhancers render pages.
fn clean(builder: &ammonia::Builder<'_>, html: &str) -> String {
    let cleaned = builder.clean(html).to_string();
    let fragment = Html::parse_fragment(&cleaned);
    Renderer::new(&fragment.tree, &Edits::new()).contents(fragment.root_element().id())
}

/// Sanitizes with the inline allow-list.
pub fn sanitize(html: &str) -> String {
    Sanitizer::inline().sanitize(html)
}
