// ABOUTME: Main library entry point for marginalia, a progressive enhancer for citations and footnotes in HTML.
// ABOUTME: Re-exports the public API: Enhancer, EnhancerBuilder, EnhanceResult, EnhanceError, ErrorCode, Options.

//! Marginalia - citation popovers, footnote popovers and endnotes for static HTML.
//!
//! The [`Enhancer`] rewrites a rendered page at build time: inline footnote
//! blocks become an endnotes list, and citation and footnote references are
//! wrapped with hidden, accessible bubbles. The runtime side of the bubbles
//! (show and hide, keyboard handling, placement) lives in [`interact`] and
//! [`position`] as host-driven state and pure geometry.
//!
//! # Example
//!
//! ```
//! use marginalia_notes::{EnhanceError, Enhancer};
//!
//! fn main() -> Result<(), EnhanceError> {
//!     let enhancer = Enhancer::builder().build()?;
//!     let result = enhancer.enhance(
//!         r##"<p>See <a href="#bib-smith99">3</a>.</p><dl><dd><a id="bib-smith99"></a><p>Smith, 1999.</p></dd></dl>"##,
//!     );
//!     assert!(result.html.contains("Smith, 1999.</span>"));
//!     Ok(())
//! }
//! ```

pub mod dom;
pub mod enhancer;
pub mod error;
pub mod interact;
pub mod options;
pub mod popover;
pub mod position;
pub mod restructure;
pub mod result;
pub mod sanitize;
pub mod source;

pub use crate::enhancer::Enhancer;
pub use crate::error::{EnhanceError, ErrorCode};
pub use crate::interact::{Behavior, LayoutProbe, PopoverSession};
pub use crate::options::{EnhancerBuilder, KeySource, Options, PopoverConfig, RestructureConfig};
pub use crate::popover::{LookupMap, PopoverEnhancer};
pub use crate::position::{compute_placement, Placement, Side};
pub use crate::restructure::Restructurer;
pub use crate::result::{EnhanceResult, PopoverReport, RestructureReport, Result};
pub use crate::sanitize::Sanitizer;
pub use crate::source::{decode_document, read_document};
