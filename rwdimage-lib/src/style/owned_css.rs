// Fully-owned, pre-parsed form of the generated stylesheet, ready for matching.
use std::fmt;

use super::css_matcher::ComplexSelector;
use super::media::MediaQueryList;

#[derive(Debug, Default)]
pub struct OwnedStylesheet {
    pub rules: Vec<OwnedRule>,
}

#[derive(Debug, Clone)]
pub struct OwnedRule {
    /// `None` when the rule is not inside an `@media` block.
    pub media: Option<MediaQueryList>,
    pub selectors: Vec<ComplexSelector>,
    /// Each declaration is (property, value), e.g. ("background-image", "url(\"a.png\")").
    pub declarations: Vec<(String, String)>,
    pub source_order: u32,
}

impl fmt::Display for OwnedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Rule #{} ({} selectors, media: {})",
            self.source_order,
            self.selectors.len(),
            self.media.is_some()
        )?;
        for (property, value) in &self.declarations {
            writeln!(f, "  {}: {}", property, value)?;
        }
        Ok(())
    }
}
