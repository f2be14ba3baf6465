// ABOUTME: Enhancer, the pipeline entry point: restructure footnotes, then citation and footnote popovers.
// ABOUTME: Each stage parses the previous stage's output, so later stages see the earlier rewrites.

use crate::options::{EnhancerBuilder, Options};
use crate::popover::PopoverEnhancer;
use crate::restructure::Restructurer;
use crate::result::{EnhanceResult, Result};
use crate::source::decode_document;

/// Runs the configured stages over a page.
///
/// Construction compiles every selector and pattern, so a built `Enhancer`
/// can be reused across pages and never fails while enhancing.
#[derive(Debug, Clone)]
pub struct Enhancer {
    restructurer: Option<Restructurer>,
    citations: Option<PopoverEnhancer>,
    footnotes: Option<PopoverEnhancer>,
}

impl Enhancer {
    /// Create a new EnhancerBuilder for configuring the enhancer.
    pub fn builder() -> EnhancerBuilder {
        EnhancerBuilder::new()
    }

    /// Compile the given options. Each popover variant leaves references
    /// inside the other variant's bubbles alone.
    pub fn new(opts: Options) -> Result<Self> {
        let Options {
            endnotes,
            citations,
            footnotes,
        } = opts;
        let citation_bubble = citations.as_ref().map(|c| c.bubble_class.clone());
        let footnote_bubble = footnotes.as_ref().map(|c| c.bubble_class.clone());

        Ok(Self {
            restructurer: endnotes.map(Restructurer::new).transpose()?,
            citations: citations
                .map(PopoverEnhancer::new)
                .transpose()?
                .map(|p| p.skip_inside(footnote_bubble)),
            footnotes: footnotes
                .map(PopoverEnhancer::new)
                .transpose()?
                .map(|p| p.skip_inside(citation_bubble)),
        })
    }

    /// Enhances one page.
    pub fn enhance(&self, html: &str) -> EnhanceResult {
        let mut result = EnhanceResult {
            html: html.to_string(),
            ..Default::default()
        };

        if let Some(restructurer) = &self.restructurer {
            let (html, report) = restructurer.restructure(&result.html);
            result.html = html;
            result.endnotes = report;
        }

        if let Some(citations) = &self.citations {
            let (html, report) = citations.enhance(&result.html);
            tracing::info!(
                bubbles = report.bubbles.len(),
                unresolved = report.unresolved().count(),
                skipped = report.skipped_references,
                "citation popovers"
            );
            result.html = html;
            result.citations = Some(report);
        }

        if let Some(footnotes) = &self.footnotes {
            let (html, report) = footnotes.enhance(&result.html);
            tracing::info!(
                bubbles = report.bubbles.len(),
                unresolved = report.unresolved().count(),
                skipped = report.skipped_references,
                "footnote popovers"
            );
            result.html = html;
            result.footnotes = Some(report);
        }

        result
    }

    /// Decodes and enhances raw page bytes.
    pub fn enhance_bytes(&self, bytes: &[u8], charset: Option<&str>) -> Result<EnhanceResult> {
        let html = decode_document(bytes, charset)?;
        Ok(self.enhance(&html))
    }
}
