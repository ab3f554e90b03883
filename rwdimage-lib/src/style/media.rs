//! Media queries: parsing the small subset the compiler emits and evaluating
//! it against a simulated [`Viewport`].

use std::fmt;

/// The environment media queries are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub device_pixel_ratio: f64,
}

impl Viewport {
    /// Size of `1em` inside a media query, in CSS pixels.
    pub const ROOT_FONT_SIZE: f64 = 16.0;

    pub fn new(width: f64, height: f64) -> Self {
        Viewport {
            width,
            height,
            device_pixel_ratio: 1.0,
        }
    }

    pub fn with_pixel_ratio(mut self, device_pixel_ratio: f64) -> Self {
        self.device_pixel_ratio = device_pixel_ratio;
        self
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport::new(1024.0, 768.0)
    }
}

/// One parenthesized test, e.g. `(min-width: 320px)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFeature {
    pub name: String,
    pub value: Option<String>,
}

impl MediaFeature {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        MediaFeature {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Parses the inside of a parenthesized test (without the parentheses).
    fn parse_inner(inner: &str) -> Option<Self> {
        let (name, value) = match inner.split_once(':') {
            Some((name, value)) => (name.trim(), Some(value.trim().to_string())),
            None => (inner.trim(), None),
        };
        if name.is_empty() || value.as_deref() == Some("") {
            return None;
        }
        Some(MediaFeature {
            name: name.to_string(),
            value,
        })
    }

    /// Whether this is one of the four dimension tests the directive language allows.
    pub fn is_dimension_test(&self) -> bool {
        matches!(
            self.name.to_ascii_lowercase().as_str(),
            "min-width" | "max-width" | "min-height" | "max-height"
        )
    }

    /// Rewrites an integer pixel dimension test as ems: `(min-width: 320px)` with base 16
    /// becomes `(min-width: 20em)`. Anything else is returned unchanged.
    pub fn to_em(&self, em_base: u32) -> MediaFeature {
        let converted = self
            .value
            .as_deref()
            .filter(|_| self.is_dimension_test() && em_base > 0)
            .and_then(integer_pixels)
            .map(|px| format!("{}em", px as f64 / em_base as f64));
        match converted {
            Some(value) => MediaFeature {
                name: self.name.clone(),
                value: Some(value),
            },
            None => self.clone(),
        }
    }

    pub fn matches(&self, viewport: &Viewport) -> bool {
        let name = self.name.to_ascii_lowercase();
        let Some(value) = self.value.as_deref() else {
            return name == "color";
        };
        let dpr = viewport.device_pixel_ratio;
        let result = match name.as_str() {
            "min-width" => length(value).map(|v| viewport.width >= v),
            "max-width" => length(value).map(|v| viewport.width <= v),
            "width" => length(value).map(|v| viewport.width == v),
            "min-height" => length(value).map(|v| viewport.height >= v),
            "max-height" => length(value).map(|v| viewport.height <= v),
            "height" => length(value).map(|v| viewport.height == v),
            "min--moz-device-pixel-ratio"
            | "-o-min-device-pixel-ratio"
            | "-webkit-min-device-pixel-ratio"
            | "min-device-pixel-ratio" => number_or_ratio(value).map(|v| dpr >= v),
            "max--moz-device-pixel-ratio"
            | "-o-max-device-pixel-ratio"
            | "-webkit-max-device-pixel-ratio"
            | "max-device-pixel-ratio" => number_or_ratio(value).map(|v| dpr <= v),
            "min-resolution" => resolution(value).map(|v| dpr >= v),
            "max-resolution" => resolution(value).map(|v| dpr <= v),
            "orientation" => match value.to_ascii_lowercase().as_str() {
                "portrait" => Some(viewport.height >= viewport.width),
                "landscape" => Some(viewport.width > viewport.height),
                _ => None,
            },
            _ => None,
        };
        result.unwrap_or(false)
    }
}

impl fmt::Display for MediaFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "({}: {})", self.name, value),
            None => write!(f, "({})", self.name),
        }
    }
}

/// `320px` -> 320. Only whole pixel values qualify.
fn integer_pixels(value: &str) -> Option<u64> {
    let lower = value.to_ascii_lowercase();
    let digits = lower.strip_suffix("px")?.trim_end();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn split_number(value: &str) -> Option<(f64, String)> {
    let value = value.trim();
    let end = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(value.len());
    let number = value[..end].parse::<f64>().ok()?;
    Some((number, value[end..].trim().to_ascii_lowercase()))
}

fn length(value: &str) -> Option<f64> {
    let (number, unit) = split_number(value)?;
    match unit.as_str() {
        "px" => Some(number),
        "em" | "rem" => Some(number * Viewport::ROOT_FONT_SIZE),
        "" if number == 0.0 => Some(0.0),
        _ => None,
    }
}

/// `1.3` or `2.6/2`.
fn number_or_ratio(value: &str) -> Option<f64> {
    match value.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            Some(num / den)
        }
        None => value.trim().parse().ok(),
    }
}

/// Resolution in dots per CSS pixel.
fn resolution(value: &str) -> Option<f64> {
    let (number, unit) = split_number(value)?;
    match unit.as_str() {
        "dppx" | "x" => Some(number),
        "dpi" => Some(number / 96.0),
        "dpcm" => Some(number * 2.54 / 96.0),
        _ => None,
    }
}

/// A single query: `[not|only] [type] [and (feature)]*`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaQuery {
    pub negated: bool,
    pub media_type: Option<String>,
    pub features: Vec<MediaFeature>,
}

impl MediaQuery {
    /// Parses one query. Returns `None` for anything outside the supported grammar.
    pub fn parse(text: &str) -> Option<Self> {
        let mut query = MediaQuery::default();
        let mut rest = text.trim();
        let mut expect_operand = true;

        while !rest.is_empty() {
            if let Some(after_paren) = rest.strip_prefix('(') {
                let close = matching_paren(after_paren)?;
                if !expect_operand {
                    return None;
                }
                query
                    .features
                    .push(MediaFeature::parse_inner(&after_paren[..close])?);
                rest = after_paren[close + 1..].trim_start();
                expect_operand = false;
                continue;
            }

            let end = rest
                .find(|c: char| c.is_whitespace() || c == '(')
                .unwrap_or(rest.len());
            let word = &rest[..end];
            match word.to_ascii_lowercase().as_str() {
                "and" if !expect_operand => expect_operand = true,
                "and" => return None,
                "only" if query.media_type.is_none() && query.features.is_empty() => {}
                "not" if query.media_type.is_none() && query.features.is_empty() => {
                    query.negated = true
                }
                _ if expect_operand
                    && query.media_type.is_none()
                    && query.features.is_empty() =>
                {
                    query.media_type = Some(word.to_string());
                    expect_operand = false;
                }
                _ => return None,
            }
            rest = rest[end..].trim_start();
        }

        if expect_operand || (query.media_type.is_none() && query.features.is_empty()) {
            return None;
        }
        Some(query)
    }

    pub fn matches(&self, viewport: &Viewport) -> bool {
        let type_matches = match self.media_type.as_deref() {
            None => true,
            Some(t) => t.eq_ignore_ascii_case("all") || t.eq_ignore_ascii_case("screen"),
        };
        let result = type_matches && self.features.iter().all(|f| f.matches(viewport));
        result != self.negated
    }
}

impl fmt::Display for MediaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(media_type) = &self.media_type {
            parts.push(if self.negated {
                format!("not {}", media_type)
            } else {
                media_type.clone()
            });
        }
        parts.extend(self.features.iter().map(ToString::to_string));
        write!(f, "{}", parts.join(" and "))
    }
}

/// Index of the `)` closing an already-opened `(`.
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(i),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// A comma-separated list of queries; matches when any query matches.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaQueryList {
    pub queries: Vec<MediaQuery>,
}

impl MediaQueryList {
    /// Parses a query list. Unparsable members are kept out of the list and never match.
    pub fn parse(text: &str) -> Self {
        let queries = split_queries(text)
            .into_iter()
            .filter_map(MediaQuery::parse)
            .collect();
        MediaQueryList { queries }
    }

    pub fn matches(&self, viewport: &Viewport) -> bool {
        self.queries.iter().any(|q| q.matches(viewport))
    }
}

/// Splits on commas outside parentheses.
fn split_queries(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Parses an `and`-joined run of parenthesized tests, the shape of a directive's
/// conditional clause. Returns `None` if the text has any other shape.
pub fn parse_condition(text: &str) -> Option<Vec<MediaFeature>> {
    let query = MediaQuery::parse(text)?;
    if query.negated || query.media_type.is_some() {
        return None;
    }
    Some(query.features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_condition_with_and() {
        let features = parse_condition("(min-width: 320px) and (max-width:640px)").unwrap();
        assert_eq!(
            features,
            vec![
                MediaFeature::new("min-width", "320px"),
                MediaFeature::new("max-width", "640px"),
            ]
        );
    }

    #[test]
    fn test_parse_condition_rejects_other_shapes() {
        assert!(parse_condition("screen and (min-width: 320px)").is_none());
        assert!(parse_condition("(min-width: 320px) (max-width: 640px)").is_none());
        assert!(parse_condition("(min-width: 320px").is_none());
        assert!(parse_condition("").is_none());
    }

    #[test]
    fn test_to_em_divides_integer_pixels() {
        let feature = MediaFeature::new("min-width", "320px").to_em(16);
        assert_eq!(feature.to_string(), "(min-width: 20em)");

        let fractional = MediaFeature::new("max-height", "300px").to_em(16);
        assert_eq!(fractional.to_string(), "(max-height: 18.75em)");
    }

    #[test]
    fn test_to_em_leaves_non_integer_and_other_features_alone() {
        let decimal = MediaFeature::new("min-width", "320.5px");
        assert_eq!(decimal.to_em(16), decimal);
        let ratio = MediaFeature::new("min-device-pixel-ratio", "2");
        assert_eq!(ratio.to_em(16), ratio);
    }

    #[test]
    fn test_width_queries() {
        let viewport = Viewport::new(800.0, 600.0);
        assert!(MediaQueryList::parse("(min-width: 640px)").matches(&viewport));
        assert!(!MediaQueryList::parse("(min-width: 801px)").matches(&viewport));
        assert!(MediaQueryList::parse("(min-width: 40em) and (max-width: 50em)").matches(&viewport));
        assert!(!MediaQueryList::parse("(max-height: 599px)").matches(&viewport));
    }

    #[test]
    fn test_pixel_ratio_family() {
        let list = MediaQueryList::parse(
            "(min--moz-device-pixel-ratio: 1.3), (-o-min-device-pixel-ratio: 2.6/2), \
             (-webkit-min-device-pixel-ratio: 1.3), (min-device-pixel-ratio: 1.3), \
             (min-resolution: 1.3dppx)",
        );
        assert_eq!(list.queries.len(), 5);
        assert!(!list.matches(&Viewport::new(800.0, 600.0)));
        assert!(list.matches(&Viewport::new(800.0, 600.0).with_pixel_ratio(2.0)));

        let opera_only = MediaQueryList::parse("(-o-min-device-pixel-ratio: 2.6/2)");
        assert!(opera_only.matches(&Viewport::new(1.0, 1.0).with_pixel_ratio(1.3)));
    }

    #[test]
    fn test_media_types_and_negation() {
        let viewport = Viewport::default();
        assert!(MediaQueryList::parse("only screen and (min-width: 100px)").matches(&viewport));
        assert!(!MediaQueryList::parse("print").matches(&viewport));
        assert!(MediaQueryList::parse("not print").matches(&viewport));
    }

    #[test]
    fn test_unknown_features_never_match() {
        let viewport = Viewport::default();
        assert!(!MediaQueryList::parse("(hover: hover)").matches(&viewport));
        assert!(!MediaQueryList::parse("garbage ((").matches(&viewport));
    }

    #[test]
    fn test_display_round_trips_structure() {
        let query = MediaQuery::parse("not print and (min-width: 20em)").unwrap();
        assert_eq!(query.to_string(), "not print and (min-width: 20em)");
    }
}
