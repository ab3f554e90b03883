use log::debug;

use super::lexer::{split_block, split_top_level, unwrap_braces};
use super::{Clause, MediaUnits};
use crate::style::media::parse_condition;

/// Parses a directive attribute value into its clauses, in source order.
///
/// Every top-level comma starts a new clause, so the result always has one entry
/// per comma-separated segment (an empty directive yields one empty clause).
/// Malformed clauses are passed through as best-effort text.
pub fn parse_directive(directive: &str, units: MediaUnits) -> Vec<Clause> {
    split_top_level(directive, ',')
        .into_iter()
        .map(|segment| parse_clause(segment, units))
        .collect()
}

fn parse_clause(segment: &str, units: MediaUnits) -> Clause {
    let text = segment.trim_start();
    if !is_conditional(text) {
        return Clause {
            media_test: None,
            declarations: unwrap_braces(text).to_string(),
        };
    }

    let (test, declarations) = match split_block(text) {
        Some((test, body)) => (test.trim(), body.trim()),
        None => {
            debug!("conditional clause without a declaration block: {:?}", text);
            (text.trim(), "")
        }
    };
    Clause {
        media_test: Some(convert_units(test, units)),
        declarations: declarations.to_string(),
    }
}

/// A clause is conditional when it opens with `(` followed by `min` or `max`.
fn is_conditional(text: &str) -> bool {
    let Some(rest) = text.strip_prefix('(') else {
        return false;
    };
    let rest = rest.trim_start();
    rest.get(..3)
        .is_some_and(|head| head.eq_ignore_ascii_case("min") || head.eq_ignore_ascii_case("max"))
}

fn convert_units(test: &str, units: MediaUnits) -> String {
    let MediaUnits::Ems { base } = units else {
        return test.to_string();
    };
    match parse_condition(test) {
        Some(features) => features
            .iter()
            .map(|feature| feature.to_em(base).to_string())
            .collect::<Vec<_>>()
            .join(" and "),
        None => {
            debug!("leaving unrecognised media test untouched: {:?}", test);
            test.to_string()
        }
    }
}
