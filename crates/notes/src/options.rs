// ABOUTME: Configuration for the enhancers: popover presets, restructurer settings, JSON config files and EnhancerBuilder.
// ABOUTME: EnhancerBuilder provides a fluent API for constructing Enhancer instances with custom settings.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::enhancer::Enhancer;
use crate::error::EnhanceError;
use crate::result::Result;

/// Where a definition's identifier is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum KeySource {
    /// An attribute value matched against `pattern`; capture group 1 is the key.
    Attr { name: String, pattern: String },
    /// The element's text matched against `pattern`; capture group 1 is the key.
    Text { pattern: String },
}

/// Settings for one popover variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopoverConfig {
    /// Bubble ids are `<prefix>-bubble-<n>`.
    pub prefix: String,
    /// Selector for definition sources.
    pub definitions: String,
    pub key: KeySource,
    /// Enclosing containers tried nearest-first; empty means the definition
    /// element is its own container.
    pub containers: Vec<String>,
    /// Anchors that only mark a definition and are dropped from the payload.
    pub markers: Option<String>,
    /// Inner text container preferred when the container holds exactly one.
    pub inner: Option<String>,
    /// Pattern removed from the start of the payload text.
    pub payload_prefix: Option<String>,
    /// Selector for reference anchors.
    pub references: String,
    /// Pattern applied to a reference's href; capture group 1 is the key.
    pub reference_pattern: String,
    pub wrapper_class: String,
    pub bubble_class: String,
    /// Class added to `<html>` once the variant has run.
    pub root_class: String,
    /// Payload for references whose identifier has no definition.
    pub fallback: String,
    /// Keep `<cite>` in payloads.
    pub allow_cite: bool,
    /// A plain click toggles the bubble instead of navigating.
    pub click_toggles: bool,
}

impl PopoverConfig {
    /// Bibliography citations: `<a href="#bib-key">` pointing at `<a id="bib-key">`.
    pub fn citation() -> Self {
        Self {
            prefix: "cite".to_string(),
            definitions: r#"a[id^="bib-"]"#.to_string(),
            key: KeySource::Attr {
                name: "id".to_string(),
                pattern: r"^bib-([\w\-:.]+)$".to_string(),
            },
            containers: vec!["dd".to_string(), "p".to_string()],
            markers: Some(r#"a[id^="bib-"]:not([href])"#.to_string()),
            inner: Some("p".to_string()),
            payload_prefix: None,
            references: r##"a[href^="#bib-"]"##.to_string(),
            reference_pattern: r"^#bib-([\w\-:.]+)$".to_string(),
            wrapper_class: "cite-popover".to_string(),
            bubble_class: "cite-bubble".to_string(),
            root_class: "citations-enhanced".to_string(),
            fallback: "Citation not found.".to_string(),
            allow_cite: true,
            click_toggles: false,
        }
    }

    /// Footnotes: `<a href="#footnote-N">` pointing at a `.footnote` paragraph
    /// whose text starts with `N. `.
    pub fn footnote() -> Self {
        Self {
            prefix: "fn".to_string(),
            definitions: ".footnote p".to_string(),
            key: KeySource::Text {
                pattern: r"^\s*(\d+)\.\s".to_string(),
            },
            containers: Vec::new(),
            markers: Some(r#"a[id^="footnote-"]:not([href])"#.to_string()),
            inner: None,
            payload_prefix: Some(r"^\s*\d+\.\s+".to_string()),
            references: r##"a[href^="#footnote-"]"##.to_string(),
            reference_pattern: r"^#footnote-(\d+)$".to_string(),
            wrapper_class: "fn-popover".to_string(),
            bubble_class: "fn-bubble".to_string(),
            root_class: "footnote-popovers-enhanced".to_string(),
            fallback: "Footnote not found.".to_string(),
            allow_cite: false,
            click_toggles: true,
        }
    }
}

/// Settings for the footnote restructurer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestructureConfig {
    /// Inline footnote blocks.
    pub blocks: String,
    /// Forward reference anchors; the enclosing `<sup>` is what gets moved.
    pub references: String,
    /// Backward-reference anchors.
    pub backrefs: String,
    pub processed_class: String,
    pub section_id: String,
    pub list_class: String,
    pub item_id_prefix: String,
    pub marker_id_prefix: String,
    pub backref_id_prefix: String,
    pub backref_class: String,
    pub backref_text: String,
    pub preview_attr: String,
    pub preview_chars: usize,
    pub ready_class: String,
    pub pending_class: String,
    /// Wrapper tags flattened out of endnote items.
    pub flatten_tags: Vec<String>,
    /// Attributes that do not stop a wrapper from being flattened.
    pub layout_attrs: Vec<String>,
}

impl Default for RestructureConfig {
    fn default() -> Self {
        Self {
            blocks: ".footnote".to_string(),
            references: r##"sup a[href^="#footnote"]"##.to_string(),
            backrefs: r#"a[id^="footnr-"]"#.to_string(),
            processed_class: "footnote-processed".to_string(),
            section_id: "notes".to_string(),
            list_class: "footnotes".to_string(),
            item_id_prefix: "footnote-".to_string(),
            marker_id_prefix: "footref-".to_string(),
            backref_id_prefix: "footnr-".to_string(),
            backref_class: "footnote-backref".to_string(),
            backref_text: "\u{21a9}".to_string(),
            preview_attr: "data-footnote-preview".to_string(),
            preview_chars: 140,
            ready_class: "footnotes-ready".to_string(),
            pending_class: "footnotes-pending".to_string(),
            flatten_tags: ["div", "span", "font", "section"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            layout_attrs: ["style", "align", "dir", "lang", "width"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Which stages run and how. `None` disables a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub endnotes: Option<RestructureConfig>,
    pub citations: Option<PopoverConfig>,
    pub footnotes: Option<PopoverConfig>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            endnotes: Some(RestructureConfig::default()),
            citations: Some(PopoverConfig::citation()),
            footnotes: Some(PopoverConfig::footnote()),
        }
    }
}

impl Options {
    /// Parses a JSON config file and layers it over the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: OptionsFile = serde_json::from_str(json)
            .map_err(|e| EnhanceError::config("<json>", "parse config", Some(e.into())))?;
        let mut opts = Options::default();
        file.apply(&mut opts);
        Ok(opts)
    }
}

/// On-disk configuration. Every key is optional and overrides a preset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsFile {
    pub endnotes: Option<EndnotesSection>,
    pub citations: Option<PopoverOverrides>,
    pub footnotes: Option<PopoverOverrides>,
}

impl OptionsFile {
    pub fn apply(self, opts: &mut Options) {
        if let Some(section) = self.endnotes {
            opts.endnotes = section.enabled.then_some(section.config);
        }
        if let Some(overrides) = self.citations {
            opts.citations = overrides.apply(PopoverConfig::citation());
        }
        if let Some(overrides) = self.footnotes {
            opts.footnotes = overrides.apply(PopoverConfig::footnote());
        }
    }
}

/// The `endnotes` section: an `enabled` switch next to the restructurer
/// settings. Unknown keys are rejected like everywhere else in the file.
#[derive(Debug, Clone)]
pub struct EndnotesSection {
    pub enabled: bool,
    pub config: RestructureConfig,
}

impl<'de> Deserialize<'de> for EndnotesSection {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut map = serde_json::Map::deserialize(deserializer)?;
        let enabled = match map.remove("enabled") {
            Some(value) => bool::deserialize(value).map_err(D::Error::custom)?,
            None => true,
        };
        let config = RestructureConfig::deserialize(serde_json::Value::Object(map))
            .map_err(D::Error::custom)?;
        Ok(Self { enabled, config })
    }
}

/// Partial popover settings layered over a preset. An empty string clears
/// an optional setting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PopoverOverrides {
    pub enabled: Option<bool>,
    pub prefix: Option<String>,
    pub definitions: Option<String>,
    pub key: Option<KeySource>,
    pub containers: Option<Vec<String>>,
    pub markers: Option<String>,
    pub inner: Option<String>,
    pub payload_prefix: Option<String>,
    pub references: Option<String>,
    pub reference_pattern: Option<String>,
    pub wrapper_class: Option<String>,
    pub bubble_class: Option<String>,
    pub root_class: Option<String>,
    pub fallback: Option<String>,
    pub allow_cite: Option<bool>,
    pub click_toggles: Option<bool>,
}

impl PopoverOverrides {
    /// Applies the overrides; `None` when the variant is disabled.
    pub fn apply(self, mut cfg: PopoverConfig) -> Option<PopoverConfig> {
        if self.enabled == Some(false) {
            return None;
        }
        fn optional(value: String) -> Option<String> {
            if value.is_empty() {
                None
            } else {
                Some(value)
            }
        }

        if let Some(v) = self.prefix {
            cfg.prefix = v;
        }
        if let Some(v) = self.definitions {
            cfg.definitions = v;
        }
        if let Some(v) = self.key {
            cfg.key = v;
        }
        if let Some(v) = self.containers {
            cfg.containers = v;
        }
        if let Some(v) = self.markers {
            cfg.markers = optional(v);
        }
        if let Some(v) = self.inner {
            cfg.inner = optional(v);
        }
        if let Some(v) = self.payload_prefix {
            cfg.payload_prefix = optional(v);
        }
        if let Some(v) = self.references {
            cfg.references = v;
        }
        if let Some(v) = self.reference_pattern {
            cfg.reference_pattern = v;
        }
        if let Some(v) = self.wrapper_class {
            cfg.wrapper_class = v;
        }
        if let Some(v) = self.bubble_class {
            cfg.bubble_class = v;
        }
        if let Some(v) = self.root_class {
            cfg.root_class = v;
        }
        if let Some(v) = self.fallback {
            cfg.fallback = v;
        }
        if let Some(v) = self.allow_cite {
            cfg.allow_cite = v;
        }
        if let Some(v) = self.click_toggles {
            cfg.click_toggles = v;
        }
        Some(cfg)
    }
}

/// Builder for constructing Enhancer instances with custom configuration.
#[derive(Debug, Clone, Default)]
pub struct EnhancerBuilder {
    opts: Options,
}

impl EnhancerBuilder {
    /// Create a new EnhancerBuilder with every stage enabled.
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    /// Replace all options at once.
    pub fn options(mut self, opts: Options) -> Self {
        self.opts = opts;
        self
    }

    /// Set or disable the footnote restructurer.
    pub fn endnotes(mut self, cfg: Option<RestructureConfig>) -> Self {
        self.opts.endnotes = cfg;
        self
    }

    /// Set or disable the citation popovers.
    pub fn citations(mut self, cfg: Option<PopoverConfig>) -> Self {
        self.opts.citations = cfg;
        self
    }

    /// Set or disable the footnote popovers.
    pub fn footnotes(mut self, cfg: Option<PopoverConfig>) -> Self {
        self.opts.footnotes = cfg;
        self
    }

    /// Compile selectors and patterns into an Enhancer.
    pub fn build(self) -> Result<Enhancer> {
        Enhancer::new(self.opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_every_stage() {
        let opts = Options::default();
        assert!(opts.endnotes.is_some());
        assert_eq!(opts.citations.unwrap().prefix, "cite");
        assert_eq!(opts.footnotes.unwrap().prefix, "fn");
    }

    #[test]
    fn json_overrides_layer_over_presets() {
        let opts = Options::from_json(
            r#"{
                "footnotes": { "fallback": "Missing note.", "inner": "span.text" },
                "citations": { "enabled": false },
                "endnotes": { "preview_chars": 80 }
            }"#,
        )
        .unwrap();

        assert!(opts.citations.is_none());
        let footnotes = opts.footnotes.unwrap();
        assert_eq!(footnotes.fallback, "Missing note.");
        assert_eq!(footnotes.inner.as_deref(), Some("span.text"));
        // untouched keys keep the footnote preset
        assert_eq!(footnotes.prefix, "fn");
        assert!(footnotes.click_toggles);
        let endnotes = opts.endnotes.unwrap();
        assert_eq!(endnotes.preview_chars, 80);
        assert_eq!(endnotes.section_id, "notes");
    }

    #[test]
    fn endnotes_can_be_disabled() {
        let opts = Options::from_json(r#"{ "endnotes": { "enabled": false } }"#).unwrap();
        assert!(opts.endnotes.is_none());
    }

    #[test]
    fn empty_string_clears_optional_setting() {
        let opts = Options::from_json(r#"{ "citations": { "markers": "" } }"#).unwrap();
        assert!(opts.citations.unwrap().markers.is_none());
    }

    #[test]
    fn key_source_is_tagged() {
        let opts = Options::from_json(
            r#"{ "citations": { "key": { "from": "attr", "name": "name", "pattern": "^ref-(.+)$" } } }"#,
        )
        .unwrap();
        assert_eq!(
            opts.citations.unwrap().key,
            KeySource::Attr {
                name: "name".to_string(),
                pattern: "^ref-(.+)$".to_string()
            }
        );
    }

    #[test]
    fn unknown_keys_are_config_errors() {
        let err = Options::from_json(r#"{ "citation": {} }"#).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn misspelled_endnotes_key_is_a_config_error() {
        let err = Options::from_json(r#"{ "endnotes": { "preview_char": 80 } }"#).unwrap_err();
        assert!(err.is_config());
        let err = Options::from_json(r#"{ "endnotes": { "enabled": "yes" } }"#).unwrap_err();
        assert!(err.is_config());
    }
}
