//! Discovery of marked elements and the table of [`ManagedImage`]s.

use log::{debug, warn};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::config::{attr, ImageOptions, RwdConfig};
use crate::directive::{compile_element, parse_directive, Breakpoint};
use crate::dom::dom_tree::{Document, Node, NodeHandle};
use crate::parser::dom_indices::DomIndices;
use crate::style::stylesheet::{Stylesheet, StylesheetAssembler};

/// A 1x1 transparent GIF, given to marked `<img>` elements that have no `src`.
pub const BLANK_GIF: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAP///wAAACH5BAEHAAAALAAAAAABAAEAAAICRAEAOw==";

/// One marked element.
#[derive(Debug, Clone)]
pub struct ManagedImage {
    pub id: usize,
    /// The document owns the element; this goes dead if it is dropped.
    pub element: Weak<RefCell<Node>>,
    pub is_image_tag: bool,
    pub breakpoints: Vec<Breakpoint>,
    /// The root carried the page or element fallback class at scan time.
    pub fallback_mode: bool,
}

impl ManagedImage {
    pub fn element(&self) -> Option<NodeHandle> {
        self.element.upgrade()
    }

    /// Media queries of the conditional breakpoints, in clause order.
    pub fn conditional_queries(&self) -> impl Iterator<Item = &str> {
        self.breakpoints
            .iter()
            .filter_map(|bp| bp.media_query.as_deref())
    }

    pub fn has_unconditional_breakpoint(&self) -> bool {
        self.breakpoints.iter().any(Breakpoint::is_unconditional)
    }
}

/// Every managed image, indexed by id. Read-only once built.
#[derive(Debug, Default)]
pub struct ImageRegistry {
    images: Vec<ManagedImage>,
}

impl ImageRegistry {
    pub fn get(&self, id: usize) -> Option<&ManagedImage> {
        self.images.get(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ManagedImage> {
        self.images.iter()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl<'a> IntoIterator for &'a ImageRegistry {
    type Item = &'a ManagedImage;
    type IntoIter = std::slice::Iter<'a, ManagedImage>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Result of scanning a document.
#[derive(Debug)]
pub struct ScanOutcome {
    pub registry: ImageRegistry,
    pub stylesheet: Stylesheet,
    /// At least one image found its fallback class on the document root.
    pub fallback_mode: bool,
    /// At least one image is driven by live breakpoint matching.
    pub live_matching: bool,
}

/// Whether the document root carries `class_name`.
pub fn root_has_class(document: &Document, class_name: &str) -> bool {
    let Some(root) = document.document_element() else {
        return false;
    };
    let root_ref = root.borrow();
    root_ref
        .as_element()
        .is_some_and(|elem| elem.has_class(class_name))
}

/// Finds every marked element, assigns ids in document order, compiles its
/// directive and records it.
///
/// An element is in fallback mode when the document root carries either the
/// page-wide fallback class or the element's own `data-rwdimage-fallback-class`.
/// Writes `data-rwdimage-id` onto each element, and `data-rwdimage-has-enquire`
/// onto those that live matching drives. An element without a directive keeps
/// its id but contributes no rules.
pub fn scan(document: &Document, config: &RwdConfig) -> ScanOutcome {
    let page_fallback = root_has_class(document, &config.fallback_class);
    let indices = DomIndices::build(document);
    let mut images = Vec::new();
    let mut compiled_elements = Vec::new();

    for (id, node) in indices.by_class(&config.marker_class).iter().enumerate() {
        let mut node_ref = node.borrow_mut();
        let Some(elem) = node_ref.as_element_mut() else {
            continue;
        };
        elem.set_attribute(attr::ID, id.to_string());

        let is_image_tag = elem.is_tag("img");
        if is_image_tag && elem.attribute("src").map_or(true, str::is_empty) {
            elem.set_attribute("src", BLANK_GIF);
        }

        let options = ImageOptions::from_element(elem);
        let fallback_mode = page_fallback
            || (options.fallback_class != config.fallback_class
                && root_has_class(document, &options.fallback_class));
        if config.live_matching && !fallback_mode {
            elem.set_attribute(attr::HAS_ENQUIRE, "true");
        }

        let breakpoints = match elem.attribute(attr::DIRECTIVE) {
            Some(directive) => {
                let clauses = parse_directive(directive, options.media_units());
                let compiled = compile_element(id, &clauses, &options);
                debug!(
                    "element {} ({}): {} clauses, {} rules, fallback mode: {}",
                    id,
                    elem.tag,
                    clauses.len(),
                    compiled.rules.len(),
                    fallback_mode
                );
                let breakpoints = compiled.breakpoints.clone();
                compiled_elements.push(compiled);
                breakpoints
            }
            None => {
                warn!("element {} ({}) has no {} attribute; skipped", id, elem.tag, attr::DIRECTIVE);
                Vec::new()
            }
        };

        images.push(ManagedImage {
            id,
            element: Rc::downgrade(node),
            is_image_tag,
            breakpoints,
            fallback_mode,
        });
    }

    let fallback_mode = page_fallback || images.iter().any(|image| image.fallback_mode);
    let live_matching = config.live_matching && images.iter().any(|image| !image.fallback_mode);

    let mut assembler = StylesheetAssembler::new(&config.marker_class, live_matching);
    for compiled in &compiled_elements {
        assembler.push_element(compiled);
    }

    ScanOutcome {
        registry: ImageRegistry { images },
        stylesheet: assembler.finish(),
        fallback_mode,
        live_matching,
    }
}
