//! Turns parsed clauses into structured CSS rules for one element.
//!
//! Each transform (declaration rewriting, retina duplication, fallback and
//! lazy-load scoping) is a separate pass over [`ElementRule`]s; rendering to
//! text happens later, in the stylesheet assembler.

use log::debug;
use std::fmt;

use super::lexer::{split_top_level, unwrap_braces};
use super::Clause;
use crate::config::{attr, ImageOptions};

/// The high-density display tests every retina duplicate is gated on.
pub const RETINA_QUERIES: [&str; 5] = [
    "(min--moz-device-pixel-ratio: 1.3)",
    "(-o-min-device-pixel-ratio: 2.6/2)",
    "(-webkit-min-device-pixel-ratio: 1.3)",
    "(min-device-pixel-ratio: 1.3)",
    "(min-resolution: 1.3dppx)",
];

/// Class an external lazy loader puts on an element once it may load.
pub const LAZY_LOADED_CLASS: &str = "lazy-loaded";

/// One `property: value` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Declaration {
            property: property.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "{}", self.property)
        } else {
            write!(f, "{}: {}", self.property, self.value)
        }
    }
}

/// The selector generated for one managed element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSelector {
    pub id: usize,
    pub lazy_loaded: bool,
    /// Root class the rule is scoped under, for fallback rules.
    pub fallback_class: Option<String>,
}

impl ElementSelector {
    pub fn new(id: usize) -> Self {
        ElementSelector {
            id,
            lazy_loaded: false,
            fallback_class: None,
        }
    }
}

/// Renders e.g. `.ltie9 .lazy-loaded[data-rwdimage-id="3"] `, trailing space included.
impl fmt::Display for ElementSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(class) = &self.fallback_class {
            write!(f, ".{} ", class)?;
        }
        if self.lazy_loaded {
            write!(f, ".{}", LAZY_LOADED_CLASS)?;
        }
        write!(f, "[{}=\"{}\"] ", attr::ID, self.id)
    }
}

/// A rule for one element, optionally inside an `@media` block.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementRule {
    pub media: Option<String>,
    pub selector: ElementSelector,
    pub declarations: Vec<Declaration>,
}

/// The media query a clause contributes for live matching; `None` for an
/// unconditional clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub media_query: Option<String>,
}

impl Breakpoint {
    pub fn is_unconditional(&self) -> bool {
        self.media_query.is_none()
    }
}

/// Everything compiled for one element.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledElement {
    pub rules: Vec<ElementRule>,
    pub breakpoints: Vec<Breakpoint>,
}

/// Compiles an element's clauses plus its configured extras.
///
/// Pass order: clauses, retina duplicates (each right after its original),
/// the fallback rule, then lazy-load scoping over everything.
pub fn compile_element(id: usize, clauses: &[Clause], options: &ImageOptions) -> CompiledElement {
    let (mut rules, breakpoints): (Vec<_>, Vec<_>) =
        clauses.iter().map(|clause| compile_clause(id, clause)).unzip();

    if options.retina {
        rules = duplicate_for_retina(rules, &options.retina_suffix);
    }
    if let Some(fallback) = &options.fallback {
        rules.push(fallback_rule(id, fallback, &options.fallback_class));
    }
    if options.lazy_load {
        apply_lazy_load(&mut rules);
    }

    CompiledElement { rules, breakpoints }
}

/// Compiles a single clause for element `id`.
pub fn compile_clause(id: usize, clause: &Clause) -> (ElementRule, Breakpoint) {
    let rule = ElementRule {
        media: clause.media_test.clone(),
        selector: ElementSelector::new(id),
        declarations: rewrite_declarations(&clause.declarations),
    };
    let breakpoint = Breakpoint {
        media_query: clause.media_test.clone(),
    };
    (rule, breakpoint)
}

/// Splits a declaration body and applies the shorthand rewrites:
/// `src` becomes `background-image` and `ratio(A/B)` becomes a percentage.
pub fn rewrite_declarations(body: &str) -> Vec<Declaration> {
    split_top_level(unwrap_braces(body), ';')
        .into_iter()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| match text.split_once(':') {
            Some((property, value)) => {
                let property = property.trim();
                let property = if property.eq_ignore_ascii_case("src") {
                    "background-image"
                } else {
                    property
                };
                Declaration::new(property, expand_ratios(value.trim()))
            }
            None => Declaration::new(expand_ratios(text), ""),
        })
        .collect()
}

/// Replaces each `ratio(A/B)` with `A / B * 100` percent.
pub fn expand_ratios(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = find_ignore_case(rest, "ratio(") {
        let args_start = start + "ratio(".len();
        let parsed = rest[args_start..].split_once(')').and_then(|(args, _)| {
            let (num, den) = args.split_once('/')?;
            let is_int = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
            if !is_int(num) || !is_int(den) {
                return None;
            }
            let percent = num.parse::<f64>().ok()? / den.parse::<f64>().ok()? * 100.0;
            Some((format!("{}%", percent), args.len()))
        });
        match parsed {
            Some((percent, args_len)) => {
                out.push_str(&rest[..start]);
                out.push_str(&percent);
                rest = &rest[args_start + args_len + 1..];
            }
            None => {
                out.push_str(&rest[..args_start]);
                rest = &rest[args_start..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

/// Appends after every rule a copy that serves the suffixed asset on high-density displays.
///
/// Rules without a `background-image` file extension to suffix get no copy.
pub fn duplicate_for_retina(rules: Vec<ElementRule>, suffix: &str) -> Vec<ElementRule> {
    let mut out = Vec::with_capacity(rules.len() * 2);
    for rule in rules {
        let duplicate = retina_variant(&rule, suffix);
        if duplicate.is_none() {
            debug!(
                "no retina duplicate for {}: no background-image file extension",
                rule.selector
            );
        }
        out.push(rule);
        out.extend(duplicate);
    }
    out
}

fn retina_variant(rule: &ElementRule, suffix: &str) -> Option<ElementRule> {
    let mut suffixed = false;
    let declarations: Vec<Declaration> = rule
        .declarations
        .iter()
        .map(|decl| {
            if !decl.property.eq_ignore_ascii_case("background-image") {
                return decl.clone();
            }
            match insert_before_extension(&decl.value, suffix) {
                Some(value) => {
                    suffixed = true;
                    Declaration::new(decl.property.clone(), value)
                }
                None => decl.clone(),
            }
        })
        .collect();
    if !suffixed {
        return None;
    }

    let media = match &rule.media {
        Some(test) => RETINA_QUERIES
            .iter()
            .map(|query| format!("{} and {}", test, query))
            .collect::<Vec<_>>()
            .join(", "),
        None => RETINA_QUERIES.join(", "),
    };
    Some(ElementRule {
        media: Some(media),
        selector: rule.selector.clone(),
        declarations,
    })
}

/// `url(img/a.png)` + `@2x` -> `url(img/a@2x.png)`.
pub fn insert_before_extension(value: &str, suffix: &str) -> Option<String> {
    // Query strings and fragments are not part of the file name.
    let path_end = value.find(['?', '#']).unwrap_or(value.len());
    let path = &value[..path_end];
    let is_terminator = |c: char| matches!(c, ')' | '"' | '\'' | ' ' | ',');

    path.match_indices('.').rev().find_map(|(dot, _)| {
        let ext_len = path[dot + 1..]
            .chars()
            .take_while(char::is_ascii_alphanumeric)
            .count();
        let after = dot + 1 + ext_len;
        let terminated = after == path.len() || path[after..].starts_with(is_terminator);
        let named = dot > 0 && !path[..dot].ends_with(['/', '(', '"', '\'', '.']);
        (ext_len > 0 && terminated && named)
            .then(|| format!("{}{}{}", &value[..dot], suffix, &value[dot..]))
    })
}

/// The rule applied when the fallback class is on the document root.
pub fn fallback_rule(id: usize, declarations: &str, fallback_class: &str) -> ElementRule {
    ElementRule {
        media: None,
        selector: ElementSelector {
            fallback_class: Some(fallback_class.to_string()),
            ..ElementSelector::new(id)
        },
        declarations: rewrite_declarations(declarations),
    }
}

/// Scopes every rule to elements carrying the lazy-loaded class.
pub fn apply_lazy_load(rules: &mut [ElementRule]) {
    for rule in rules {
        rule.selector.lazy_loaded = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::{parse_directive, MediaUnits};
    use pretty_assertions::assert_eq;

    fn options() -> ImageOptions {
        ImageOptions::default()
    }

    #[test]
    fn test_selector_format() {
        assert_eq!(ElementSelector::new(0).to_string(), "[data-rwdimage-id=\"0\"] ");
        assert_eq!(ElementSelector::new(1).to_string(), "[data-rwdimage-id=\"1\"] ");
        let scoped = ElementSelector {
            lazy_loaded: true,
            fallback_class: Some("no-mq".into()),
            ..ElementSelector::new(7)
        };
        assert_eq!(scoped.to_string(), ".no-mq .lazy-loaded[data-rwdimage-id=\"7\"] ");
    }

    #[test]
    fn test_rewrite_declarations() {
        assert_eq!(
            rewrite_declarations("  SRC:url(a.png);padding-bottom: ratio(1/2); "),
            vec![
                Declaration::new("background-image", "url(a.png)"),
                Declaration::new("padding-bottom", "50%"),
            ]
        );
    }

    #[test]
    fn test_ratio_sixteen_by_nine() {
        let value = expand_ratios("ratio(16/9)");
        let percent: f64 = value.trim_end_matches('%').parse().unwrap();
        assert!((percent - 1600.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_ratio_leaves_malformed_text() {
        assert_eq!(expand_ratios("Ratio(3/4) ratio(a/b)"), "75% ratio(a/b)");
    }

    #[test]
    fn test_data_uri_is_one_declaration() {
        let decls = rewrite_declarations("src: url(data:image/gif;base64,R0lG)");
        assert_eq!(
            decls,
            vec![Declaration::new("background-image", "url(data:image/gif;base64,R0lG)")]
        );
    }

    #[test]
    fn test_breakpoints_follow_clauses() {
        let clauses = parse_directive(
            "{ src: url(s.png) }, (min-width: 480px) { src: url(m.png) }",
            MediaUnits::Pixels,
        );
        let compiled = compile_element(0, &clauses, &options());
        assert_eq!(
            compiled.breakpoints,
            vec![
                Breakpoint { media_query: None },
                Breakpoint {
                    media_query: Some("(min-width: 480px)".into())
                },
            ]
        );
        assert_eq!(compiled.rules.len(), 2);
        assert_eq!(compiled.rules[1].media.as_deref(), Some("(min-width: 480px)"));
    }

    #[test]
    fn test_retina_plain_clause() {
        let clauses = parse_directive("src: a.png", MediaUnits::Pixels);
        let compiled = compile_element(
            2,
            &clauses,
            &ImageOptions {
                retina: true,
                ..options()
            },
        );
        assert_eq!(
            compiled.rules,
            vec![
                ElementRule {
                    media: None,
                    selector: ElementSelector::new(2),
                    declarations: vec![Declaration::new("background-image", "a.png")],
                },
                ElementRule {
                    media: Some(RETINA_QUERIES.join(", ")),
                    selector: ElementSelector::new(2),
                    declarations: vec![Declaration::new("background-image", "a@2x.png")],
                },
            ]
        );
    }

    #[test]
    fn test_retina_conditional_clause_conjoins_each_query() {
        let clauses = parse_directive("(min-width: 20em) { src: url(b.jpg) }", MediaUnits::Pixels);
        let compiled = compile_element(
            0,
            &clauses,
            &ImageOptions {
                retina: true,
                retina_suffix: "-hd".into(),
                ..options()
            },
        );
        let retina = &compiled.rules[1];
        assert_eq!(
            retina.media.as_deref(),
            Some(
                "(min-width: 20em) and (min--moz-device-pixel-ratio: 1.3), \
                 (min-width: 20em) and (-o-min-device-pixel-ratio: 2.6/2), \
                 (min-width: 20em) and (-webkit-min-device-pixel-ratio: 1.3), \
                 (min-width: 20em) and (min-device-pixel-ratio: 1.3), \
                 (min-width: 20em) and (min-resolution: 1.3dppx)"
            )
        );
        assert_eq!(
            retina.declarations,
            vec![Declaration::new("background-image", "url(b-hd.jpg)")]
        );
        // Breakpoints are per clause, not per emitted rule.
        assert_eq!(compiled.breakpoints.len(), 1);
    }

    #[test]
    fn test_retina_skips_rules_without_extension() {
        let clauses = parse_directive("{ padding-bottom: ratio(1/1) }", MediaUnits::Pixels);
        let compiled = compile_element(
            0,
            &clauses,
            &ImageOptions {
                retina: true,
                ..options()
            },
        );
        assert_eq!(compiled.rules.len(), 1);
    }

    #[test]
    fn test_insert_before_extension() {
        assert_eq!(
            insert_before_extension("url(../img/a.b.png)", "@2x").as_deref(),
            Some("url(../img/a.b@2x.png)")
        );
        assert_eq!(
            insert_before_extension("url(\"a.png?v=1.2\")", "@2x").as_deref(),
            Some("url(\"a@2x.png?v=1.2\")")
        );
        assert_eq!(insert_before_extension("url(img/noext)", "@2x"), None);
        assert_eq!(insert_before_extension("none", "@2x"), None);
    }

    #[test]
    fn test_fallback_and_lazy_load() {
        let clauses = parse_directive("(min-width: 480px) { src: url(m.png) }", MediaUnits::Pixels);
        let compiled = compile_element(
            4,
            &clauses,
            &ImageOptions {
                fallback: Some("{ src: url(m.png); padding-bottom: ratio(3/4) }".into()),
                lazy_load: true,
                ..options()
            },
        );
        assert_eq!(compiled.rules.len(), 2);
        assert!(compiled.rules.iter().all(|r| r.selector.lazy_loaded));
        let fallback = &compiled.rules[1];
        assert_eq!(fallback.media, None);
        assert_eq!(
            fallback.selector.to_string(),
            ".ltie9 .lazy-loaded[data-rwdimage-id=\"4\"] "
        );
        assert_eq!(
            fallback.declarations,
            vec![
                Declaration::new("background-image", "url(m.png)"),
                Declaration::new("padding-bottom", "75%"),
            ]
        );
    }

    #[test]
    fn test_no_lazy_prefix_without_flag() {
        let clauses = parse_directive("{ src: url(a.png) }", MediaUnits::Pixels);
        let compiled = compile_element(0, &clauses, &options());
        assert!(compiled
            .rules
            .iter()
            .all(|r| !r.selector.to_string().contains(LAZY_LOADED_CLASS)));
    }
}
