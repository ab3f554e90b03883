use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{ParserOptions, StyleSheet as LightningStyleSheet};
use lightningcss::targets::{Browsers, Targets};
use log::debug;
use std::fmt;

use crate::config::attr;
use crate::directive::{CompiledElement, Declaration};
use crate::error::RwdError;

/// A rendered-ready rule: selector text, declarations, optional media query.
#[derive(Debug, Clone, PartialEq)]
pub struct CssRule {
    pub media: Option<String>,
    pub selector: String,
    pub declarations: Vec<Declaration>,
}

impl CssRule {
    pub fn new(selector: impl Into<String>, declarations: Vec<Declaration>) -> Self {
        CssRule {
            media: None,
            selector: selector.into(),
            declarations,
        }
    }
}

/// One line per rule: `sel { a: b; }` or `@media q { sel { a: b; } }`.
impl fmt::Display for CssRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(media) = &self.media {
            write!(f, "@media {} {{ ", media)?;
        }
        write!(f, "{} {{", self.selector.trim_end())?;
        for decl in &self.declarations {
            write!(f, " {};", decl)?;
        }
        f.write_str(" }")?;
        if self.media.is_some() {
            f.write_str(" }")?;
        }
        f.write_str("\n")
    }
}

/// The complete generated stylesheet, in cascade order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    pub rules: Vec<CssRule>,
}

impl Stylesheet {
    pub fn to_css(&self) -> String {
        self.to_string()
    }

    /// Minified text via lightningcss. Media queries are printed with
    /// `min-`/`max-` prefixes so old browsers still read them.
    pub fn to_minified_css(&self) -> Result<String, RwdError> {
        let css = self.to_css();
        let parser_opts = ParserOptions {
            error_recovery: true,
            ..ParserOptions::default()
        };
        let sheet = LightningStyleSheet::parse(&css, parser_opts)
            .map_err(|e| RwdError::Minify(e.to_string()))?;
        let printer_opts = PrinterOptions {
            minify: true,
            targets: Targets::from(Browsers {
                ie: Some(9 << 16),
                ..Browsers::default()
            }),
            ..PrinterOptions::default()
        };
        let printed = sheet
            .to_css(printer_opts)
            .map_err(|e| RwdError::Minify(e.to_string()))?;
        Ok(printed.code)
    }
}

impl fmt::Display for Stylesheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in &self.rules {
            write!(f, "{}", rule)?;
        }
        Ok(())
    }
}

/// The rules every page gets, ahead of the per-element ones.
pub fn baseline_rules(marker_class: &str, live_matching: bool) -> Vec<CssRule> {
    let mut rules = vec![CssRule::new(
        format!(".{}", marker_class),
        vec![
            Declaration::new("background-repeat", "no-repeat"),
            Declaration::new("background-size", "contain"),
            Declaration::new("height", "0"),
            Declaration::new("width", "100%"),
        ],
    )];
    if live_matching {
        rules.push(CssRule::new(
            format!("img.{}[{}=\"true\"]", marker_class, attr::HAS_ENQUIRE),
            vec![
                Declaration::new("height", "auto"),
                Declaration::new("width", "auto"),
            ],
        ));
    }
    rules
}

/// Collects compiled elements, in scan order, behind the baseline rules.
#[derive(Debug)]
pub struct StylesheetAssembler {
    rules: Vec<CssRule>,
}

impl StylesheetAssembler {
    pub fn new(marker_class: &str, live_matching: bool) -> Self {
        StylesheetAssembler {
            rules: baseline_rules(marker_class, live_matching),
        }
    }

    pub fn push_element(&mut self, compiled: &CompiledElement) {
        for rule in &compiled.rules {
            self.rules.push(CssRule {
                media: rule.media.clone(),
                selector: rule.selector.to_string(),
                declarations: rule.declarations.clone(),
            });
        }
    }

    pub fn finish(self) -> Stylesheet {
        debug!("assembled stylesheet with {} rules", self.rules.len());
        Stylesheet { rules: self.rules }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageOptions;
    use crate::directive::{compile_element, parse_directive, MediaUnits};
    use pretty_assertions::assert_eq;

    fn compile(id: usize, directive: &str, options: &ImageOptions) -> CompiledElement {
        compile_element(id, &parse_directive(directive, options.media_units()), options)
    }

    #[test]
    fn test_baseline_only() {
        let css = StylesheetAssembler::new("rwdimage", false).finish().to_css();
        assert_eq!(
            css,
            ".rwdimage { background-repeat: no-repeat; background-size: contain; height: 0; width: 100%; }\n"
        );
    }

    #[test]
    fn test_live_matching_rule() {
        let css = StylesheetAssembler::new("rwdimage", true).finish().to_css();
        assert!(css.ends_with(
            "img.rwdimage[data-rwdimage-has-enquire=\"true\"] { height: auto; width: auto; }\n"
        ));
    }

    #[test]
    fn test_elements_in_scan_then_clause_order() {
        let options = ImageOptions {
            em: true,
            ..ImageOptions::default()
        };
        let mut assembler = StylesheetAssembler::new("rwdimage", false);
        assembler.push_element(&compile(
            0,
            "{ src: url(a.png); padding-bottom: ratio(1/2) }, (min-width: 320px) { src: url(b.png) }",
            &options,
        ));
        assembler.push_element(&compile(1, "{ src: url(c.png) }", &ImageOptions::default()));
        let css = assembler.finish().to_css();
        let expected = "\
.rwdimage { background-repeat: no-repeat; background-size: contain; height: 0; width: 100%; }
[data-rwdimage-id=\"0\"] { background-image: url(a.png); padding-bottom: 50%; }
@media (min-width: 20em) { [data-rwdimage-id=\"0\"] { background-image: url(b.png); } }
[data-rwdimage-id=\"1\"] { background-image: url(c.png); }
";
        assert_eq!(css, expected);
    }

    #[test]
    fn test_retina_plain_rule_text() {
        let options = ImageOptions {
            retina: true,
            ..ImageOptions::default()
        };
        let mut assembler = StylesheetAssembler::new("rwdimage", false);
        assembler.push_element(&compile(0, "src: a.png", &options));
        let css = assembler.finish().to_css();
        assert!(css.contains("[data-rwdimage-id=\"0\"] { background-image: a.png; }\n"));
        assert!(css.contains(
            "@media (min--moz-device-pixel-ratio: 1.3), (-o-min-device-pixel-ratio: 2.6/2), \
             (-webkit-min-device-pixel-ratio: 1.3), (min-device-pixel-ratio: 1.3), \
             (min-resolution: 1.3dppx) { [data-rwdimage-id=\"0\"] { background-image: a@2x.png; } }\n"
        ));
    }

    #[test]
    fn test_minified_output_is_smaller() {
        let mut assembler = StylesheetAssembler::new("rwdimage", true);
        assembler.push_element(&compile(
            0,
            "{ src: url(a.png) }, (min-width: 480px) { src: url(b.png) }",
            &ImageOptions::default(),
        ));
        let sheet = assembler.finish();
        let minified = sheet.to_minified_css().expect("minify");
        assert!(minified.len() < sheet.to_css().len());
        assert!(minified.contains("data-rwdimage-id"));
    }

    #[test]
    fn test_media_units_pass_through() {
        let clauses = parse_directive("(max-width: 300px) { src: url(a.png) }", MediaUnits::Pixels);
        let compiled = compile_element(0, &clauses, &ImageOptions::default());
        let mut assembler = StylesheetAssembler::new("rwdimage", false);
        assembler.push_element(&compiled);
        assert!(assembler
            .finish()
            .to_css()
            .contains("@media (max-width: 300px) { [data-rwdimage-id=\"0\"]"));
    }
}
