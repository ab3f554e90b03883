use std::collections::HashMap;
use std::rc::Rc;

use crate::dom::dom_tree::{Document, Node, NodeHandle};

/// Indexes for fast DOM lookup. Every list is in document order.
#[derive(Debug, Default)]
pub struct DomIndices {
    /// Maps a class name to all nodes that have that class.
    pub class_map: HashMap<String, Vec<NodeHandle>>,
    /// Maps a lowercase tag name (e.g., "div") to all nodes with that tag.
    pub tag_map: HashMap<String, Vec<NodeHandle>>,
}

impl DomIndices {
    /// Build the indices for the entire document.
    pub fn build(document: &Document) -> Self {
        let mut indices = DomIndices::default();
        Self::traverse(&document.root, &mut indices);
        indices
    }

    /// All elements carrying `class_name`.
    pub fn by_class(&self, class_name: &str) -> &[NodeHandle] {
        self.class_map
            .get(class_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The first element with the given tag name.
    pub fn first_by_tag(&self, tag: &str) -> Option<&NodeHandle> {
        self.tag_map
            .get(&tag.to_lowercase())
            .and_then(|nodes| nodes.first())
    }

    /// Pre-order walk, so every index list comes out in document order.
    fn traverse(node: &NodeHandle, indices: &mut DomIndices) {
        match &*node.borrow() {
            Node::DocumentRoot(root) => {
                for child in &root.children {
                    Self::traverse(child, indices);
                }
            }
            Node::Element(elem) => {
                indices
                    .tag_map
                    .entry(elem.tag.to_lowercase())
                    .or_default()
                    .push(Rc::clone(node));

                for class in elem.classes() {
                    let entry = indices.class_map.entry(class.to_string()).or_default();
                    // `class="a a"` must not index the element twice.
                    if !entry.last().is_some_and(|last| Rc::ptr_eq(last, node)) {
                        entry.push(Rc::clone(node));
                    }
                }
                for child in &elem.children {
                    Self::traverse(child, indices);
                }
            }
            Node::Text(_) | Node::Comment(_) => {}
        }
    }
}
