//! `DomTree` over the live browser document.

use gloss_core::{DomError, DomTree, NodeKind, Rect};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, Node, Text};

fn platform(e: JsValue) -> DomError {
    DomError::Platform(format!("{e:?}"))
}

/// The browser document as a [`DomTree`]. Node handles are `web_sys::Node`s,
/// compared by identity.
#[derive(Debug, Clone)]
pub struct WebDom {
    document: Document,
}

impl WebDom {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    /// The window's document.
    pub fn current() -> Option<Self> {
        web_sys::window()?.document().map(Self::new)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn element<'a>(&self, node: &'a Node) -> Option<&'a Element> {
        node.dyn_ref::<Element>()
    }

    fn expect_element<'a>(&self, node: &'a Node) -> Result<&'a Element, DomError> {
        self.element(node)
            .ok_or_else(|| DomError::Platform("node is not an element".into()))
    }
}

impl DomTree for WebDom {
    type Node = Node;

    fn root(&self) -> Node {
        AsRef::<Node>::as_ref(&self.document).clone()
    }

    fn kind(&self, node: &Node) -> NodeKind {
        match node.node_type() {
            Node::ELEMENT_NODE => NodeKind::Element,
            Node::TEXT_NODE => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn children(&self, node: &Node) -> Vec<Node> {
        let list = node.child_nodes();
        (0..list.length()).filter_map(|i| list.item(i)).collect()
    }

    fn tag_name(&self, node: &Node) -> Option<String> {
        self.element(node).map(|el| el.tag_name().to_ascii_lowercase())
    }

    fn attribute(&self, node: &Node, name: &str) -> Option<String> {
        self.element(node)?.get_attribute(name)
    }

    fn set_attribute(&mut self, node: &Node, name: &str, value: &str) -> Result<(), DomError> {
        self.expect_element(node)?
            .set_attribute(name, value)
            .map_err(platform)
    }

    fn has_class(&self, node: &Node, class: &str) -> bool {
        self.element(node)
            .is_some_and(|el| el.class_list().contains(class))
    }

    fn add_class(&mut self, node: &Node, class: &str) -> Result<(), DomError> {
        self.expect_element(node)?
            .class_list()
            .add_1(class)
            .map_err(platform)
    }

    fn remove_class(&mut self, node: &Node, class: &str) -> Result<(), DomError> {
        self.expect_element(node)?
            .class_list()
            .remove_1(class)
            .map_err(platform)
    }

    fn text(&self, node: &Node) -> Option<String> {
        if node.node_type() != Node::TEXT_NODE {
            return None;
        }
        Some(node.node_value().unwrap_or_default())
    }

    fn set_text(&mut self, node: &Node, text: &str) -> Result<(), DomError> {
        if node.node_type() != Node::TEXT_NODE {
            return Err(DomError::NotText);
        }
        node.set_node_value(Some(text));
        Ok(())
    }

    fn element_by_id(&self, id: &str) -> Option<Node> {
        self.document.get_element_by_id(id).map(Node::from)
    }

    fn create_element(&mut self, tag: &str) -> Result<Node, DomError> {
        self.document
            .create_element(tag)
            .map(Node::from)
            .map_err(platform)
    }

    fn insert_before(
        &mut self,
        parent: &Node,
        child: &Node,
        reference: Option<&Node>,
    ) -> Result<(), DomError> {
        parent
            .insert_before(child, reference)
            .map(|_| ())
            .map_err(platform)
    }

    fn remove_child(&mut self, parent: &Node, child: &Node) -> Result<(), DomError> {
        parent.remove_child(child).map(|_| ()).map_err(platform)
    }

    fn split_text(&mut self, node: &Node, offset: usize) -> Result<Node, DomError> {
        let text = node.dyn_ref::<Text>().ok_or(DomError::NotText)?;
        let len = text.length() as usize;
        if offset > len {
            return Err(DomError::OffsetOutOfBounds { offset, len });
        }
        text.split_text(offset as u32)
            .map(Node::from)
            .map_err(platform)
    }

    fn bounding_rect(&self, node: &Node) -> Option<Rect> {
        let rect = self.element(node)?.get_bounding_client_rect();
        Some(Rect::new(rect.x(), rect.y(), rect.width(), rect.height()))
    }

    fn first_by_class(&self, class: &str) -> Option<Node> {
        self.document
            .get_elements_by_class_name(class)
            .item(0)
            .map(Node::from)
    }
}
