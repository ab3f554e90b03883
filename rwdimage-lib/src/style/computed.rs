use crate::directive::Declaration;
use crate::dom::dom_tree::NodeHandle;
use crate::style::css_matcher::{compute_computed_style, matches_complex_selector, parse_selector, MatchedRule};
use crate::style::media::{MediaQueryList, Viewport};
use crate::style::owned_css::{OwnedRule, OwnedStylesheet};
use crate::style::stylesheet::Stylesheet;
use crate::sync::StyleResolver;
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{ParserOptions, StyleAttribute};
use log::{debug, trace};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

/// Represents final set of CSS properties an element gets.
#[derive(Default, Clone, Debug)]
pub struct ComputedStyle {
    pub properties: HashMap<String, String>,
}

impl ComputedStyle {
    pub fn get(&self, property: &str) -> Option<&str> {
        self.properties.get(property).map(String::as_str)
    }
}

/// Convert the generated stylesheet into a fully-owned, pre-parsed one.
pub fn own_stylesheet(stylesheet: &Stylesheet) -> OwnedStylesheet {
    let rules = stylesheet
        .rules
        .iter()
        .enumerate()
        .map(|(index, rule)| OwnedRule {
            media: rule.media.as_deref().map(MediaQueryList::parse),
            selectors: rule.selector.split(',').map(parse_selector).collect(),
            declarations: own_declarations(&rule.declarations),
            source_order: index as u32,
        })
        .collect();
    OwnedStylesheet { rules }
}

/// Normalizes declaration values the way a browser reports computed values
/// (`url(a.png)` reads back as `url("a.png")`). Falls back to the raw text when
/// LightningCSS cannot read the block.
fn own_declarations(declarations: &[Declaration]) -> Vec<(String, String)> {
    let raw = || {
        declarations
            .iter()
            .map(|d| (d.property.to_ascii_lowercase(), d.value.clone()))
            .collect::<Vec<_>>()
    };
    let text = declarations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");

    let attribute = match StyleAttribute::parse(&text, ParserOptions::default()) {
        Ok(attribute) => attribute,
        Err(e) => {
            debug!("keeping raw declarations for {:?}: {}", text, e);
            return raw();
        }
    };

    let block = &attribute.declarations;
    let normalized: Result<Vec<_>, _> = block
        .declarations
        .iter()
        .chain(block.important_declarations.iter())
        .map(|property| {
            property
                .value_to_css_string(PrinterOptions::default())
                .map(|value| (property.property_id().name().to_string(), value))
        })
        .collect();
    normalized.unwrap_or_else(|e| {
        debug!("keeping raw declarations for {:?}: {}", text, e);
        raw()
    })
}

/// Reads post-cascade style values for elements, under a viewport that may
/// change between reads.
#[derive(Debug)]
pub struct ComputedStyleReader {
    stylesheet: OwnedStylesheet,
    viewport: Rc<Cell<Viewport>>,
}

impl ComputedStyleReader {
    pub fn new(stylesheet: &Stylesheet, viewport: Rc<Cell<Viewport>>) -> Self {
        ComputedStyleReader {
            stylesheet: own_stylesheet(stylesheet),
            viewport,
        }
    }

    /// Build a final ComputedStyle from every active rule whose selector matches.
    pub fn computed_style(&self, element: &NodeHandle) -> ComputedStyle {
        let viewport = self.viewport.get();
        let matched: Vec<MatchedRule<'_>> = self
            .stylesheet
            .rules
            .iter()
            .filter(|rule| rule.media.as_ref().map_or(true, |m| m.matches(&viewport)))
            .filter_map(|rule| {
                let selector = rule
                    .selectors
                    .iter()
                    .find(|selector| matches_complex_selector(element, selector))?;
                trace!("matched {}", rule);
                Some(MatchedRule {
                    selector,
                    declarations: &rule.declarations,
                    source_order: rule.source_order,
                })
            })
            .collect();

        ComputedStyle {
            properties: compute_computed_style(matched),
        }
    }
}

impl StyleResolver for ComputedStyleReader {
    fn resolved_property(&self, element: &NodeHandle, property: &str) -> Option<String> {
        self.computed_style(element)
            .properties
            .remove(property)
    }
}
