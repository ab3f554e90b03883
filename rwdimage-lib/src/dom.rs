use html5ever::QualName;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub mod dom_tree {
    use super::*;

    /// Shared handle to a node of the tree.
    pub type NodeHandle = Rc<RefCell<Node>>;

    #[derive(Debug, Clone)]
    pub enum Node {
        DocumentRoot(DocumentRootNode),
        Element(ElementNode),
        Text(String),
        Comment(String),
    }

    #[derive(Debug, Clone, Default)]
    pub struct DocumentRootNode {
        pub children: Vec<NodeHandle>,
    }

    #[derive(Debug, Clone)]
    pub struct ElementNode {
        pub tag: String,
        pub qual_name: QualName,
        /// Attributes in source order.
        pub attributes: Vec<(String, String)>,
        pub children: Vec<NodeHandle>,
        pub parent: Option<Weak<RefCell<Node>>>,
    }

    #[derive(Debug)]
    pub struct Document {
        pub root: NodeHandle,
        pub doctype: RefCell<Option<Doctype>>,
    }

    #[derive(Debug)]
    pub struct Doctype {
        pub name: String,
        pub public_id: String,
        pub system_id: String,
    }

    impl DocumentRootNode {
        pub fn new() -> Self {
            DocumentRootNode {
                children: Vec::new(),
            }
        }
    }

    impl ElementNode {
        pub fn new(tag: String, qual_name: QualName) -> Self {
            ElementNode {
                tag,
                qual_name,
                attributes: Vec::new(),
                children: Vec::new(),
                parent: None,
            }
        }

        pub fn attribute(&self, name: &str) -> Option<&str> {
            self.attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }

        /// Sets `name` to `value`, replacing an existing value in place.
        pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
            let value = value.into();
            match self
                .attributes
                .iter_mut()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
            {
                Some((_, existing)) => *existing = value,
                None => self.attributes.push((name.to_string(), value)),
            }
        }

        pub fn classes(&self) -> impl Iterator<Item = &str> {
            self.attribute("class").unwrap_or("").split_whitespace()
        }

        pub fn has_class(&self, class_name: &str) -> bool {
            self.classes().any(|c| c == class_name)
        }

        pub fn is_tag(&self, tag: &str) -> bool {
            self.tag.eq_ignore_ascii_case(tag)
        }
    }

    impl Node {
        pub fn as_element(&self) -> Option<&ElementNode> {
            match self {
                Node::Element(elem) => Some(elem),
                _ => None,
            }
        }

        pub fn as_element_mut(&mut self) -> Option<&mut ElementNode> {
            match self {
                Node::Element(elem) => Some(elem),
                _ => None,
            }
        }

        pub fn children(&self) -> &[NodeHandle] {
            match self {
                Node::DocumentRoot(root) => &root.children,
                Node::Element(elem) => &elem.children,
                Node::Text(_) | Node::Comment(_) => &[],
            }
        }

        fn children_mut(&mut self) -> Option<&mut Vec<NodeHandle>> {
            match self {
                Node::DocumentRoot(root) => Some(&mut root.children),
                Node::Element(elem) => Some(&mut elem.children),
                Node::Text(_) | Node::Comment(_) => None,
            }
        }
    }

    impl Document {
        /// The root `html` element, if the tree has one.
        pub fn document_element(&self) -> Option<NodeHandle> {
            self.root
                .borrow()
                .children()
                .iter()
                .find(|child| child.borrow().as_element().is_some())
                .cloned()
        }
    }

    pub fn new_document() -> Document {
        Document {
            root: Rc::new(RefCell::new(Node::DocumentRoot(DocumentRootNode::new()))),
            doctype: RefCell::new(None),
        }
    }

    /// Creates a detached element node.
    pub fn new_element(tag: &str, qual_name: QualName) -> NodeHandle {
        Rc::new(RefCell::new(Node::Element(ElementNode::new(
            tag.to_string(),
            qual_name,
        ))))
    }

    /// Appends `child` to `parent`, linking the child's parent pointer.
    pub fn append_child(parent: &NodeHandle, child: NodeHandle) {
        if let Some(elem) = child.borrow_mut().as_element_mut() {
            elem.parent = Some(Rc::downgrade(parent));
        }
        if let Some(children) = parent.borrow_mut().children_mut() {
            children.push(child);
        }
    }

    /// Removes `node` from its parent element. Returns false when the node has no live parent.
    pub fn detach(node: &NodeHandle) -> bool {
        let parent = match node.borrow().as_element().and_then(|e| e.parent.clone()) {
            Some(weak) => weak.upgrade(),
            None => None,
        };
        let Some(parent) = parent else {
            return false;
        };
        if let Some(children) = parent.borrow_mut().children_mut() {
            children.retain(|child| !Rc::ptr_eq(child, node));
        }
        if let Some(elem) = node.borrow_mut().as_element_mut() {
            elem.parent = None;
        }
        true
    }

    /// Reads an attribute from an element handle.
    pub fn get_attribute(node: &NodeHandle, name: &str) -> Option<String> {
        node.borrow()
            .as_element()
            .and_then(|elem| elem.attribute(name))
            .map(str::to_string)
    }

    /// Writes an attribute on an element handle. Non-elements are ignored.
    pub fn set_attribute(node: &NodeHandle, name: &str, value: impl Into<String>) {
        if let Some(elem) = node.borrow_mut().as_element_mut() {
            elem.set_attribute(name, value);
        }
    }
}
