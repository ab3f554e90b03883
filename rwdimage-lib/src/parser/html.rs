//! This module contains functions and types for parsing HTML into a custom DOM tree
//! and writing it back out.
//!
//! It uses html5ever as the HTML parser and builds a DOM tree defined in the
//! `crate::dom::dom_tree` module.

use crate::dom::dom_tree::{self, NodeHandle};
use crate::error::RwdError;
use html5ever::serialize::{serialize, Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{
    interface::{ElemName, NodeOrText, QuirksMode, TreeSink},
    namespace_url, ns, LocalName, Namespace, QualName,
};
use log::debug;
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

/// Creates a DOM tree from the provided HTML content.
///
/// # Arguments
///
/// * `html_content` - A string slice containing the HTML to parse.
///
/// # Returns
///
/// A `dom_tree::Document` representing the parsed HTML.
pub fn create_dom_tree(html_content: &str) -> dom_tree::Document {
    let tree_sink = RwdTreeSink::new();
    html5ever::parse_document(tree_sink, Default::default()).one(html_content.to_string())
}

/// Serializes the entire Document, including its DOCTYPE (if any), back to HTML.
///
/// Escaping, raw-text elements and void elements are handled by html5ever's serializer.
pub fn serialize_document(document: &dom_tree::Document) -> Result<String, RwdError> {
    let mut out = Vec::new();
    if let Some(doctype) = &*document.doctype.borrow() {
        write_doctype(doctype, &mut out)?;
    }
    serialize(&mut out, document, SerializeOpts::default())?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Writes `<!DOCTYPE name [PUBLIC "..."] ["..."]>` followed by a newline.
fn write_doctype(doctype: &dom_tree::Doctype, out: &mut Vec<u8>) -> io::Result<()> {
    write!(out, "<!DOCTYPE {}", doctype.name)?;
    match (doctype.public_id.is_empty(), doctype.system_id.is_empty()) {
        (false, true) => write!(out, " PUBLIC \"{}\"", doctype.public_id)?,
        (false, false) => write!(
            out,
            " PUBLIC \"{}\" \"{}\"",
            doctype.public_id, doctype.system_id
        )?,
        (true, false) => write!(out, " SYSTEM \"{}\"", doctype.system_id)?,
        (true, true) => {}
    }
    writeln!(out, ">")
}

impl Serialize for dom_tree::Document {
    fn serialize<S>(&self, serializer: &mut S, _traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        serialize_node(&self.root, serializer)
    }
}

/// Feeds a node and its subtree to an html5ever serializer.
fn serialize_node<S: Serializer>(node: &NodeHandle, serializer: &mut S) -> io::Result<()> {
    match &*node.borrow() {
        dom_tree::Node::DocumentRoot(root) => {
            for child in &root.children {
                serialize_node(child, serializer)?;
            }
        }
        dom_tree::Node::Element(elem) => {
            let names: Vec<QualName> = elem
                .attributes
                .iter()
                .map(|(name, _)| QualName::new(None, ns!(), LocalName::from(name.as_str())))
                .collect();
            serializer.start_elem(
                elem.qual_name.clone(),
                names
                    .iter()
                    .zip(&elem.attributes)
                    .map(|(name, (_, value))| (name, value.as_str())),
            )?;
            for child in &elem.children {
                serialize_node(child, serializer)?;
            }
            serializer.end_elem(elem.qual_name.clone())?;
        }
        dom_tree::Node::Text(text) => serializer.write_text(text)?,
        dom_tree::Node::Comment(text) => serializer.write_comment(text)?,
    }
    Ok(())
}

/// A custom TreeSink for building the DOM tree used by the parser.
///
/// It holds the Document being built and a stack of open nodes.
pub struct RwdTreeSink {
    document: dom_tree::Document,
    stack: RefCell<Vec<NodeHandle>>,
}

impl RwdTreeSink {
    /// Creates a new `RwdTreeSink` with an initial document and root node.
    pub fn new() -> Self {
        let root_element = dom_tree::new_document();
        let root_clone = root_element.root.clone();
        Self {
            document: root_element,
            stack: RefCell::new(vec![root_clone]),
        }
    }
}

impl Default for RwdTreeSink {
    fn default() -> Self {
        Self::new()
    }
}

/// A simple implementation of the `ElemName` trait for our elements.
#[derive(Debug)]
pub struct RwdElemName {
    ns: Namespace,
    local: LocalName,
}

impl ElemName for RwdElemName {
    fn local_name(&self) -> &LocalName {
        &self.local
    }

    fn ns(&self) -> &Namespace {
        &self.ns
    }
}

/// Turns html5ever's `NodeOrText` into a node handle.
fn into_handle(child: NodeOrText<NodeHandle>) -> NodeHandle {
    match child {
        NodeOrText::AppendNode(node) => node,
        NodeOrText::AppendText(text) => {
            Rc::new(RefCell::new(dom_tree::Node::Text(text.to_string())))
        }
    }
}

fn parent_of(node: &NodeHandle) -> Option<NodeHandle> {
    node.borrow()
        .as_element()
        .and_then(|elem| elem.parent.as_ref())
        .and_then(|weak| weak.upgrade())
}

impl TreeSink for RwdTreeSink {
    type Handle = NodeHandle;
    type Output = dom_tree::Document;
    type ElemName<'a>
        = RwdElemName
    where
        Self: 'a;

    /// Finalizes and returns the constructed Document.
    fn finish(self) -> Self::Output {
        self.document
    }

    fn parse_error(&self, msg: std::borrow::Cow<'static, str>) {
        debug!("HTML parse error: {}", msg);
    }

    fn get_document(&self) -> Self::Handle {
        self.document.root.clone()
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        match target.borrow().as_element() {
            Some(elem) => RwdElemName {
                ns: elem.qual_name.ns.clone(),
                local: elem.qual_name.local.clone(),
            },
            // html5ever only asks for names of handles it created as elements.
            None => RwdElemName {
                ns: Namespace::from(""),
                local: LocalName::from(""),
            },
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<html5ever::Attribute>,
        _flags: html5ever::interface::ElementFlags,
    ) -> Self::Handle {
        let node = dom_tree::new_element(&name.local, name.clone());
        if let Some(elem) = node.borrow_mut().as_element_mut() {
            elem.attributes = attrs
                .into_iter()
                .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                .collect();
        }
        node
    }

    /// Comments are kept so conditional comments survive the round trip.
    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        Rc::new(RefCell::new(dom_tree::Node::Comment(text.to_string())))
    }

    fn create_pi(&self, target: StrTendril, data: StrTendril) -> Self::Handle {
        let combined = format!("?{} {}", target, data);
        Rc::new(RefCell::new(dom_tree::Node::Comment(combined)))
    }

    /// Appends a child node or text to the given parent node.
    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        // Adjacent text chunks are merged into one node.
        if let NodeOrText::AppendText(ref text) = child {
            let last = parent.borrow().children().last().cloned();
            if let Some(last) = last {
                let mut last_ref = last.borrow_mut();
                if let dom_tree::Node::Text(ref mut existing) = *last_ref {
                    existing.push_str(text);
                    return;
                }
            }
        }
        let child_node = into_handle(child);
        let is_element = child_node.borrow().as_element().is_some();
        dom_tree::append_child(parent, child_node.clone());
        if is_element {
            self.stack.borrow_mut().push(child_node);
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if parent_of(element).is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    ) {
        *self.document.doctype.borrow_mut() = Some(dom_tree::Doctype {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        });
    }

    fn mark_script_already_started(&self, _node: &Self::Handle) {}

    fn pop(&self, _node: &Self::Handle) {
        self.stack.borrow_mut().pop();
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        target.clone()
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        Rc::ptr_eq(x, y)
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        debug!("quirks mode: {:?}", mode);
    }

    /// Inserts a node before an element sibling (used for foster parenting).
    fn append_before_sibling(&self, sibling: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let Some(parent) = parent_of(sibling) else {
            return;
        };
        let child_node = into_handle(child);
        if let Some(elem) = child_node.borrow_mut().as_element_mut() {
            elem.parent = Some(Rc::downgrade(&parent));
        }
        let mut parent_ref = parent.borrow_mut();
        if let dom_tree::Node::Element(ref mut parent_elem) = *parent_ref {
            let index = parent_elem
                .children
                .iter()
                .position(|c| Rc::ptr_eq(c, sibling))
                .unwrap_or(parent_elem.children.len());
            parent_elem.children.insert(index, child_node);
        }
    }

    /// Adds attributes to the target node if they are missing.
    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<html5ever::Attribute>) {
        if let Some(elem) = target.borrow_mut().as_element_mut() {
            for attr in attrs {
                let key = attr.name.local.to_string();
                if elem.attribute(&key).is_none() {
                    elem.attributes.push((key, attr.value.to_string()));
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        dom_tree::detach(target);
    }

    /// Moves all children of `node` to the end of `new_parent`.
    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let children = match *node.borrow_mut() {
            dom_tree::Node::Element(ref mut elem) => std::mem::take(&mut elem.children),
            dom_tree::Node::DocumentRoot(ref mut root) => std::mem::take(&mut root.children),
            dom_tree::Node::Text(_) | dom_tree::Node::Comment(_) => Vec::new(),
        };
        for child in children {
            dom_tree::append_child(new_parent, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_keeps_attributes_in_order() {
        let html = r#"<!DOCTYPE html><html><head></head><body><img class="rwdimage" data-rwdimage="{ src: url(a.png) }" alt="A &amp; B"></body></html>"#;
        let document = create_dom_tree(html);
        let out = serialize_document(&document).expect("serialize");
        assert_eq!(
            out,
            "<!DOCTYPE html>\n<html><head></head><body><img class=\"rwdimage\" data-rwdimage=\"{ src: url(a.png) }\" alt=\"A &amp; B\"></body></html>"
        );
    }

    #[test]
    fn test_style_text_is_not_escaped() {
        let html = "<html><head><style>a > b { color: red; }</style></head><body>1 &lt; 2</body></html>";
        let out = serialize_document(&create_dom_tree(html)).expect("serialize");
        assert!(out.contains("<style>a > b { color: red; }</style>"));
        assert!(out.contains("<body>1 &lt; 2</body>"));
    }

    #[test]
    fn test_parser_inserts_missing_head() {
        let document = create_dom_tree("<img class=\"rwdimage\">");
        let out = serialize_document(&document).expect("serialize");
        assert_eq!(
            out,
            "<html><head></head><body><img class=\"rwdimage\"></body></html>"
        );
    }

    #[test]
    fn test_conditional_comments_survive() {
        let html = r#"<!DOCTYPE html><!--[if lt IE 9]><html class="ltie9"><![endif]--><html><head><!-- styles --></head><body></body></html>"#;
        let document = create_dom_tree(html);
        let out = serialize_document(&document).expect("serialize");
        assert_eq!(
            out,
            "<!DOCTYPE html>\n<!--[if lt IE 9]><html class=\"ltie9\"><![endif]--><html><head><!-- styles --></head><body></body></html>"
        );
        assert!(document.document_element().is_some());
    }

    #[test]
    fn test_doctype_identifiers_are_written() {
        let html = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd"><p>x</p>"#;
        let out = serialize_document(&create_dom_tree(html)).expect("serialize");
        assert!(out.starts_with(
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\">\n<html>"
        ));
    }

    #[test]
    fn test_stray_table_text_is_inserted_before_table() {
        let html = "<html><head></head><body><table>stray<tr><td>a</td></tr></table></body></html>";
        let out = serialize_document(&create_dom_tree(html)).expect("serialize");
        assert_eq!(
            out,
            "<html><head></head><body>stray<table><tbody><tr><td>a</td></tr></tbody></table></body></html>"
        );
    }

    #[test]
    fn test_parent_pointers_are_linked() {
        let document = create_dom_tree("<div id=\"outer\"><p>x</p></div>");
        let html = document.document_element().expect("html element");
        let body = html.borrow().children()[1].clone();
        let div = body.borrow().children()[0].clone();
        let p = div.borrow().children()[0].clone();
        let parent = parent_of(&p).expect("parent");
        assert!(Rc::ptr_eq(&parent, &div));
    }
}
