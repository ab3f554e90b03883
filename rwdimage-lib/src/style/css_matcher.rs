use crate::dom::dom_tree::{ElementNode, Node, NodeHandle};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};
use std::cell::RefCell;

/// ------------------------------
/// 1. Selector Parsing
/// ------------------------------

/// An exact-value attribute condition, `[name="value"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    pub name: String,
    pub value: String,
}

/// A compound selector: an optional tag, classes, and a list of attribute selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundSelector {
    pub tag: Option<String>,
    pub classes: HashSet<String>,
    pub attributes: Vec<AttributeSelector>,
}

/// A key compound selector plus the compounds that must appear among its
/// ancestors, nearest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    pub key: CompoundSelector,
    pub ancestors: Vec<CompoundSelector>,
}

/// Parses a whitespace-separated descendant selector; an empty selector parses
/// as a compound that matches everything.
pub fn parse_selector(selector: &str) -> ComplexSelector {
    let mut compounds: Vec<CompoundSelector> = selector
        .split_whitespace()
        .map(parse_compound_selector)
        .collect();
    let key = compounds.pop().unwrap_or_else(|| parse_compound_selector(""));
    compounds.reverse();
    ComplexSelector {
        key,
        ancestors: compounds,
    }
}

/// Reads an identifier up to the next `.` or `[`.
fn read_name(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut buffer = String::new();
    while let Some(&ch) = chars.peek() {
        if ch == '.' || ch == '[' {
            break;
        }
        buffer.push(ch);
        chars.next();
    }
    buffer
}

/// Parse a compound selector string, e.g. `img.rwdimage[data-rwdimage-id="0"]`
pub fn parse_compound_selector(selector: &str) -> CompoundSelector {
    let mut tag = None;
    let mut classes = HashSet::new();
    let mut attributes = Vec::new();
    let mut chars = selector.chars().peekable();

    // If first char is alphabetic or '*' assume tag.
    if chars.peek().is_some_and(|ch| ch.is_alphabetic() || *ch == '*') {
        let name = read_name(&mut chars);
        if name != "*" {
            tag = Some(name);
        }
    }

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                let name = read_name(&mut chars);
                if !name.is_empty() {
                    classes.insert(name);
                }
            }
            '[' => {
                if let Some(attr) = parse_attribute_selector(&mut chars) {
                    attributes.push(attr);
                }
            }
            _ => {}
        }
    }

    CompoundSelector {
        tag,
        classes,
        attributes,
    }
}

/// Parses the inside of `[name="value"]`; the opening bracket is already
/// consumed. Anything without an `=` and a value yields `None`.
fn parse_attribute_selector(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Option<AttributeSelector> {
    let mut inner = String::new();
    for ch in chars.by_ref() {
        if ch == ']' {
            break;
        }
        inner.push(ch);
    }

    let (name, value) = inner.split_once('=')?;
    let name = name.trim();
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')))
        .unwrap_or(value);

    (!name.is_empty()).then(|| AttributeSelector {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// ------------------------------
/// 2. Specificity & Cascade
/// ------------------------------

/// Compute specificity for a compound selector as (class+attribute_count, tag_count)
pub fn compute_specificity(compound: &CompoundSelector) -> (u32, u32) {
    let class_count = compound.classes.len() as u32;
    // Count each attribute as a class-level selector.
    let attr_count = compound.attributes.len() as u32;
    let tag_count = u32::from(compound.tag.is_some());
    (class_count + attr_count, tag_count)
}

/// Compute specificity for a complex selector by summing key and ancestors.
pub fn compute_complex_specificity(selector: &ComplexSelector) -> (u32, u32) {
    let mut spec = compute_specificity(&selector.key);
    for comp in &selector.ancestors {
        let anc_spec = compute_specificity(comp);
        spec.0 += anc_spec.0;
        spec.1 += anc_spec.1;
    }
    spec
}

/// A rule that matched an element, ready for the cascade.
#[derive(Debug, Clone)]
pub struct MatchedRule<'a> {
    pub selector: &'a ComplexSelector,
    /// Declarations in source order: (property, value).
    pub declarations: &'a [(String, String)],
    pub source_order: u32,
}

/// Merge matched rules by specificity, then source order; later declarations win.
pub fn compute_computed_style(matched_rules: Vec<MatchedRule<'_>>) -> HashMap<String, String> {
    let mut rules = matched_rules;
    rules.sort_by(|a, b| {
        let spec_a = compute_complex_specificity(a.selector);
        let spec_b = compute_complex_specificity(b.selector);
        match spec_a.cmp(&spec_b) {
            Ordering::Equal => a.source_order.cmp(&b.source_order),
            other => other,
        }
    });
    let mut computed: HashMap<String, String> = HashMap::new();
    for rule in rules {
        for (prop, value) in rule.declarations {
            computed.insert(prop.clone(), value.clone());
        }
    }
    computed
}

/// ------------------------------
/// 3. Selector Matching
/// ------------------------------

/// Returns true if the given ElementNode matches the CompoundSelector.
/// Checks tag, classes, and attribute conditions.
pub fn matches_compound(elem: &ElementNode, compound: &CompoundSelector) -> bool {
    if let Some(ref tag) = compound.tag {
        if !elem.is_tag(tag) {
            return false;
        }
    }
    if !compound.classes.iter().all(|class| elem.has_class(class)) {
        return false;
    }
    compound
        .attributes
        .iter()
        .all(|attr_sel| elem.attribute(&attr_sel.name) == Some(attr_sel.value.as_str()))
}

/// Matches a ComplexSelector against a candidate element.
/// The matching proceeds right-to-left, using parent pointers.
pub fn matches_complex_selector(candidate: &NodeHandle, complex: &ComplexSelector) -> bool {
    if !element_matches(candidate, &complex.key) {
        return false;
    }

    let mut current_node = Rc::clone(candidate);
    for compound in &complex.ancestors {
        let mut ancestor = get_parent(&current_node).and_then(|weak| weak.upgrade());
        while let Some(ancestor_rc) = ancestor.take() {
            if element_matches(&ancestor_rc, compound) {
                ancestor = Some(ancestor_rc);
                break;
            }
            ancestor = get_parent(&ancestor_rc).and_then(|weak| weak.upgrade());
        }
        match ancestor {
            Some(node) => current_node = node,
            None => return false,
        }
    }
    true
}

fn element_matches(node: &NodeHandle, compound: &CompoundSelector) -> bool {
    match &*node.borrow() {
        Node::Element(elem) => matches_compound(elem, compound),
        _ => false,
    }
}

/// Helper: get parent pointer from a node.
fn get_parent(node: &NodeHandle) -> Option<Weak<RefCell<Node>>> {
    match &*node.borrow() {
        Node::Element(elem) => elem.parent.clone(),
        _ => None,
    }
}
