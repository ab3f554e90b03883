//! Per-element options read from `data-rwdimage-*` attributes, and the
//! page-wide [`RwdConfig`].

use crate::directive::MediaUnits;
use crate::dom::dom_tree::ElementNode;
use crate::style::media::Viewport;

/// Class that marks an element for processing.
pub const MARKER_CLASS: &str = "rwdimage";
pub const DEFAULT_EM_BASE: u32 = 16;
pub const DEFAULT_RETINA_SUFFIX: &str = "@2x";
pub const DEFAULT_FALLBACK_CLASS: &str = "ltie9";

/// Attribute names read from and written to managed elements.
pub mod attr {
    pub const DIRECTIVE: &str = "data-rwdimage";
    pub const EM: &str = "data-rwdimage-em";
    pub const EM_BASE: &str = "data-rwdimage-em-base";
    pub const RETINA: &str = "data-rwdimage-retina";
    pub const RETINA_SUFFIX: &str = "data-rwdimage-retina-suffix";
    pub const FALLBACK: &str = "data-rwdimage-fallback";
    pub const FALLBACK_CLASS: &str = "data-rwdimage-fallback-class";
    pub const LAZY_LOAD: &str = "data-rwdimage-lazy-load";
    /// Written: the element's sequential identifier.
    pub const ID: &str = "data-rwdimage-id";
    /// Written: present when live breakpoint matching drives the element.
    pub const HAS_ENQUIRE: &str = "data-rwdimage-has-enquire";
}

/// Options for one element, read once at scan time.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOptions {
    pub em: bool,
    pub em_base: u32,
    pub retina: bool,
    pub retina_suffix: String,
    /// Declaration block applied under the fallback class.
    pub fallback: Option<String>,
    /// Fallback class name, without the leading dot.
    pub fallback_class: String,
    pub lazy_load: bool,
}

impl Default for ImageOptions {
    fn default() -> Self {
        ImageOptions {
            em: false,
            em_base: DEFAULT_EM_BASE,
            retina: false,
            retina_suffix: DEFAULT_RETINA_SUFFIX.to_string(),
            fallback: None,
            fallback_class: DEFAULT_FALLBACK_CLASS.to_string(),
            lazy_load: false,
        }
    }
}

impl ImageOptions {
    /// Reads the `data-rwdimage-*` options. Booleans are on only for the exact
    /// string `true`; empty strings count as absent.
    pub fn from_element(elem: &ElementNode) -> Self {
        let non_empty = |name: &str| elem.attribute(name).filter(|v| !v.is_empty());
        let flag = |name: &str| elem.attribute(name) == Some("true");

        ImageOptions {
            em: flag(attr::EM),
            em_base: non_empty(attr::EM_BASE)
                .and_then(parse_leading_int)
                .filter(|base| *base > 0)
                .unwrap_or(DEFAULT_EM_BASE),
            retina: flag(attr::RETINA),
            retina_suffix: non_empty(attr::RETINA_SUFFIX)
                .unwrap_or(DEFAULT_RETINA_SUFFIX)
                .to_string(),
            fallback: non_empty(attr::FALLBACK).map(str::to_string),
            fallback_class: non_empty(attr::FALLBACK_CLASS)
                .unwrap_or(DEFAULT_FALLBACK_CLASS)
                .to_string(),
            lazy_load: flag(attr::LAZY_LOAD),
        }
    }

    pub fn media_units(&self) -> MediaUnits {
        if self.em {
            MediaUnits::Ems {
                base: self.em_base,
            }
        } else {
            MediaUnits::Pixels
        }
    }
}

/// `"18px"` -> 18, `" 20"` -> 20, `"x"` -> None.
fn parse_leading_int(value: &str) -> Option<u32> {
    let value = value.trim_start();
    let digits = value
        .find(|c: char| !c.is_ascii_digit())
        .map_or(value, |end| &value[..end]);
    digits.parse().ok()
}

/// Page-wide settings for one processing run.
#[derive(Debug, Clone)]
pub struct RwdConfig {
    pub marker_class: String,
    /// Root class that switches the whole page into fallback mode.
    pub fallback_class: String,
    /// Viewport at load time.
    pub viewport: Viewport,
    /// Whether a live breakpoint matcher is available.
    pub live_matching: bool,
    /// Viewport changes replayed after load, in order.
    pub resizes: Vec<Viewport>,
    pub minify: bool,
}

impl Default for RwdConfig {
    fn default() -> Self {
        RwdConfig {
            marker_class: MARKER_CLASS.to_string(),
            fallback_class: DEFAULT_FALLBACK_CLASS.to_string(),
            viewport: Viewport::default(),
            live_matching: true,
            resizes: Vec::new(),
            minify: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use html5ever::{namespace_url, ns, LocalName, QualName};

    fn element(attrs: &[(&str, &str)]) -> ElementNode {
        let mut elem = ElementNode::new(
            "img".into(),
            QualName::new(None, ns!(html), LocalName::from("img")),
        );
        for (k, v) in attrs {
            elem.set_attribute(k, *v);
        }
        elem
    }

    #[test]
    fn test_defaults_when_absent() {
        assert_eq!(ImageOptions::from_element(&element(&[])), ImageOptions::default());
    }

    #[test]
    fn test_reads_every_option() {
        let options = ImageOptions::from_element(&element(&[
            (attr::EM, "true"),
            (attr::EM_BASE, "10px"),
            (attr::RETINA, "true"),
            (attr::RETINA_SUFFIX, "_hd"),
            (attr::FALLBACK, "{ src: url(f.png) }"),
            (attr::FALLBACK_CLASS, "no-mq"),
            (attr::LAZY_LOAD, "true"),
        ]));
        assert_eq!(
            options,
            ImageOptions {
                em: true,
                em_base: 10,
                retina: true,
                retina_suffix: "_hd".into(),
                fallback: Some("{ src: url(f.png) }".into()),
                fallback_class: "no-mq".into(),
                lazy_load: true,
            }
        );
        assert_eq!(options.media_units(), MediaUnits::Ems { base: 10 });
    }

    #[test]
    fn test_flags_need_literal_true() {
        let options = ImageOptions::from_element(&element(&[
            (attr::EM, "TRUE"),
            (attr::RETINA, "1"),
            (attr::LAZY_LOAD, ""),
        ]));
        assert!(!options.em && !options.retina && !options.lazy_load);
    }

    #[test]
    fn test_bad_em_base_falls_back() {
        for bad in ["", "abc", "0"] {
            let options = ImageOptions::from_element(&element(&[(attr::EM_BASE, bad)]));
            assert_eq!(options.em_base, DEFAULT_EM_BASE, "base {:?}", bad);
        }
    }
}
