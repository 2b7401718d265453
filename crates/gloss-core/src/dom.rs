//! DOM surface abstraction.
//!
//! `DomTree` is the interface between the anchoring engine and whatever holds
//! the rendered document: the browser DOM (`gloss-browser`), or the in-memory
//! [`MemDom`](crate::memdom::MemDom) used natively and in tests. The trait only
//! carries primitives; wrapping, unwrapping, normalization and ancestor search
//! are derived here so every backend behaves the same way.

use crate::error::DomError;

/// Kind of a DOM node, as far as anchoring is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    /// Documents, comments, processing instructions.
    Other,
}

/// A point in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A bounding rectangle in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A boundary point: a node plus an offset into it.
///
/// For text nodes the offset counts UTF-16 code units; for elements it is a
/// child index, exactly like a browser `Range` boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct DomPoint<N> {
    pub node: N,
    pub offset: usize,
}

impl<N> DomPoint<N> {
    pub fn new(node: N, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// An ordered pair of boundary points (start precedes or equals end).
#[derive(Debug, Clone, PartialEq)]
pub struct DomRange<N> {
    pub start: DomPoint<N>,
    pub end: DomPoint<N>,
}

impl<N: PartialEq> DomRange<N> {
    pub fn new(start: DomPoint<N>, end: DomPoint<N>) -> Self {
        Self { start, end }
    }

    /// Both boundary points are identical.
    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

impl<N: Clone + PartialEq> DomRange<N> {
    /// Deepest node containing both boundary containers.
    pub fn common_ancestor<D: DomTree<Node = N> + ?Sized>(&self, dom: &D) -> Option<N> {
        let mut current = Some(self.start.node.clone());
        while let Some(node) = current {
            if contains(dom, &node, &self.end.node) {
                return Some(node);
            }
            current = dom.parent(&node);
        }
        None
    }
}

/// Platform DOM operations.
///
/// Implementations wrap a concrete document. Node handles are cheap to clone
/// and compare by identity.
pub trait DomTree {
    type Node: Clone + PartialEq + std::fmt::Debug;

    /// Document element (or document node) all searches start from.
    fn root(&self) -> Self::Node;

    fn kind(&self, node: &Self::Node) -> NodeKind;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Child nodes in document order.
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Lowercased tag name, `None` for non-elements.
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str)
    -> Result<(), DomError>;

    fn has_class(&self, node: &Self::Node, class: &str) -> bool;

    fn add_class(&mut self, node: &Self::Node, class: &str) -> Result<(), DomError>;

    fn remove_class(&mut self, node: &Self::Node, class: &str) -> Result<(), DomError>;

    /// Character data of a text node, `None` otherwise.
    fn text(&self, node: &Self::Node) -> Option<String>;

    fn set_text(&mut self, node: &Self::Node, text: &str) -> Result<(), DomError>;

    /// Element with the given `id` attribute anywhere in the document.
    fn element_by_id(&self, id: &str) -> Option<Self::Node>;

    fn create_element(&mut self, tag: &str) -> Result<Self::Node, DomError>;

    /// Insert `child` into `parent` before `reference`, or at the end when
    /// `reference` is `None`. A child that is already attached is moved.
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        reference: Option<&Self::Node>,
    ) -> Result<(), DomError>;

    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), DomError>;

    /// Split a text node at a UTF-16 offset. The node keeps the head; the
    /// returned node holds the tail and is inserted right after it.
    fn split_text(&mut self, node: &Self::Node, offset: usize) -> Result<Self::Node, DomError>;

    /// Viewport geometry, when the backend has any.
    fn bounding_rect(&self, _node: &Self::Node) -> Option<Rect> {
        None
    }

    /// First element carrying `class` in document order.
    fn first_by_class(&self, class: &str) -> Option<Self::Node> {
        let root = self.root();
        descendants(self, &root)
            .find(|node| self.kind(node) == NodeKind::Element && self.has_class(node, class))
    }

    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }
}

/// Preorder traversal of `root` and everything below it.
pub struct Descendants<'a, D: DomTree + ?Sized> {
    dom: &'a D,
    stack: Vec<D::Node>,
}

impl<D: DomTree + ?Sized> Iterator for Descendants<'_, D> {
    type Item = D::Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        let mut children = self.dom.children(&node);
        children.reverse();
        self.stack.extend(children);
        Some(node)
    }
}

/// Lazily walk `root` (inclusive) and its descendants in document order.
pub fn descendants<'a, D: DomTree + ?Sized>(dom: &'a D, root: &D::Node) -> Descendants<'a, D> {
    Descendants {
        dom,
        stack: vec![root.clone()],
    }
}

/// Whether `node` is `ancestor` or lies below it.
pub fn contains<D: DomTree + ?Sized>(dom: &D, ancestor: &D::Node, node: &D::Node) -> bool {
    let mut current = Some(node.clone());
    while let Some(n) = current {
        if &n == ancestor {
            return true;
        }
        current = dom.parent(&n);
    }
    false
}

/// Nearest element at or above `node` satisfying `pred`.
///
/// Text nodes start the search at their parent. The search stops (without
/// matching) when it reaches `boundary`, so the boundary itself never matches.
pub fn closest_element<D, F>(
    dom: &D,
    node: &D::Node,
    boundary: Option<&D::Node>,
    mut pred: F,
) -> Option<D::Node>
where
    D: DomTree + ?Sized,
    F: FnMut(&D::Node) -> bool,
{
    let mut current = match dom.kind(node) {
        NodeKind::Element => Some(node.clone()),
        _ => dom.parent(node),
    };
    while let Some(n) = current {
        if boundary.is_some_and(|b| b == &n) {
            return None;
        }
        if dom.kind(&n) == NodeKind::Element && pred(&n) {
            return Some(n);
        }
        current = dom.parent(&n);
    }
    None
}

/// Concatenated character data of every text node under `node`.
pub fn text_content<D: DomTree + ?Sized>(dom: &D, node: &D::Node) -> String {
    descendants(dom, node)
        .filter_map(|n| dom.text(&n))
        .collect()
}

/// Element children only.
pub fn element_children<D: DomTree + ?Sized>(dom: &D, node: &D::Node) -> Vec<D::Node> {
    dom.children(node)
        .into_iter()
        .filter(|c| dom.kind(c) == NodeKind::Element)
        .collect()
}

/// Move `node` into `wrapper`, putting `wrapper` where `node` was.
pub fn wrap_node<D: DomTree + ?Sized>(
    dom: &mut D,
    node: &D::Node,
    wrapper: &D::Node,
) -> Result<(), DomError> {
    let parent = dom.parent(node).ok_or(DomError::NoParent)?;
    dom.insert_before(&parent, wrapper, Some(node))?;
    dom.append_child(wrapper, node)
}

/// Replace `element` with its children.
pub fn unwrap_element<D: DomTree + ?Sized>(dom: &mut D, element: &D::Node) -> Result<(), DomError> {
    let parent = dom.parent(element).ok_or(DomError::NoParent)?;
    for child in dom.children(element) {
        dom.insert_before(&parent, &child, Some(element))?;
    }
    dom.remove_child(&parent, element)
}

/// Merge adjacent text children of `node` and drop empty ones, like
/// `Node.normalize()` restricted to one level.
pub fn normalize_children<D: DomTree + ?Sized>(dom: &mut D, node: &D::Node) -> Result<(), DomError> {
    let mut previous_text: Option<D::Node> = None;
    for child in dom.children(node) {
        let Some(data) = dom.text(&child) else {
            previous_text = None;
            continue;
        };
        if data.is_empty() {
            dom.remove_child(node, &child)?;
            continue;
        }
        match &previous_text {
            Some(prev) => {
                let mut merged = dom.text(prev).unwrap_or_default();
                merged.push_str(&data);
                dom.set_text(prev, &merged)?;
                dom.remove_child(node, &child)?;
            }
            None => previous_text = Some(child),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memdom::MemDom;

    #[test]
    fn test_closest_element_stops_at_boundary() {
        let dom = MemDom::parse(r#"<div class="root"><p>hi <em>there</em></p></div>"#).unwrap();
        let root = dom.first_by_class("root").unwrap();
        let em = dom.find_tag("em").unwrap();
        let text = dom.children(&em)[0];

        let p = closest_element(&dom, &text, Some(&root), |n| {
            dom.tag_name(n).as_deref() == Some("p")
        });
        assert_eq!(p, dom.find_tag("p"));

        let div = closest_element(&dom, &text, Some(&root), |n| {
            dom.tag_name(n).as_deref() == Some("div")
        });
        assert_eq!(div, None);
    }

    #[test]
    fn test_wrap_and_unwrap_round_trip() {
        let mut dom = MemDom::parse("<p>alpha beta</p>").unwrap();
        let p = dom.find_tag("p").unwrap();
        let text = dom.children(&p)[0];
        let tail = dom.split_text(&text, 6).unwrap();

        let span = dom.create_element("span").unwrap();
        wrap_node(&mut dom, &tail, &span).unwrap();
        assert_eq!(dom.inner_html(&p), "alpha <span>beta</span>");

        unwrap_element(&mut dom, &span).unwrap();
        normalize_children(&mut dom, &p).unwrap();
        assert_eq!(dom.inner_html(&p), "alpha beta");
        assert_eq!(dom.children(&p).len(), 1);
    }

    #[test]
    fn test_common_ancestor() {
        let dom = MemDom::parse("<div><p>one <b>two</b></p><p>three</p></div>").unwrap();
        let b_text = dom.children(&dom.find_tag("b").unwrap())[0];
        let p_text = dom.children(&dom.find_tag("p").unwrap())[0];

        let range = DomRange::new(DomPoint::new(p_text, 1), DomPoint::new(b_text, 2));
        assert_eq!(range.common_ancestor(&dom), dom.find_tag("p"));
        assert!(!range.is_collapsed());
    }
}
