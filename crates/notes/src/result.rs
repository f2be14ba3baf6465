// ABOUTME: Result and report types produced by an enhancement run.
// ABOUTME: EnhanceResult carries the rewritten HTML plus per-stage reports, serializable for the CLI's JSON output.

use serde::{Deserialize, Serialize};

use crate::error::EnhanceError;

/// Result alias for fallible marginalia operations.
pub type Result<T> = std::result::Result<T, EnhanceError>;

/// One bubble created by a popover enhancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BubbleRecord {
    /// Element id of the bubble, `<prefix>-bubble-<n>`.
    pub bubble_id: String,
    /// Identifier extracted from the reference.
    pub key: String,
    /// False when the bubble carries the fallback payload.
    pub resolved: bool,
}

/// What one popover enhancer did to a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PopoverReport {
    pub prefix: String,
    pub click_toggles: bool,
    /// Entries in the lookup map.
    pub definitions: usize,
    pub bubbles: Vec<BubbleRecord>,
    /// References whose href did not match the identifier pattern.
    pub skipped_references: usize,
}

impl PopoverReport {
    pub fn unresolved(&self) -> impl Iterator<Item = &BubbleRecord> {
        self.bubbles.iter().filter(|b| !b.resolved)
    }
}

/// Counts of the three index-paired lists when they disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub blocks: usize,
    pub references: usize,
    pub backrefs: usize,
}

/// What the footnote restructurer did to a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RestructureReport {
    /// Ids of the endnote list items created, in order.
    pub endnotes: Vec<String>,
    /// Items whose marker was moved into a paragraph.
    pub relocated: usize,
    /// Backward anchors synthesized because none existed at that index.
    pub synthesized_backrefs: usize,
    pub mismatch: Option<Mismatch>,
}

/// The rewritten page and what each stage did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EnhanceResult {
    pub html: String,
    pub endnotes: Option<RestructureReport>,
    pub citations: Option<PopoverReport>,
    pub footnotes: Option<PopoverReport>,
}

impl EnhanceResult {
    /// Total bubbles created across both popover variants.
    pub fn bubble_count(&self) -> usize {
        [&self.citations, &self.footnotes]
            .into_iter()
            .flatten()
            .map(|r| r.bubbles.len())
            .sum()
    }
}
