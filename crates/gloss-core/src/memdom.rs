//! In-memory DOM.
//!
//! An arena-backed tree implementing [`DomTree`]. It is what the engine runs
//! against outside the browser: tests, and native tools that want to paint
//! stored highlights into generated HTML. The markup reader only accepts
//! well-formed, explicitly closed markup (the shape the site generator emits);
//! it is not an HTML5 parser.

use std::collections::HashMap;

use smol_str::SmolStr;

use crate::dom::{DomTree, NodeKind, Rect, descendants};
use crate::error::DomError;
use crate::text::utf16_to_byte;

/// Handle to a node in a [`MemDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeData {
    Document,
    Element {
        tag: SmolStr,
        attrs: Vec<(SmolStr, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeRecord {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Void elements never get a closing tag.
const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "meta", "link", "wbr"];

#[derive(Debug, Clone)]
pub struct MemDom {
    nodes: Vec<NodeRecord>,
    rects: HashMap<NodeId, Rect>,
}

impl Default for MemDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemDom {
    /// Empty document.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeRecord {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
            rects: HashMap::new(),
        }
    }

    /// Build a document from markup.
    pub fn parse(markup: &str) -> Result<Self, DomError> {
        let mut dom = Self::new();
        let root = dom.root();
        dom.append_markup(root, markup)?;
        Ok(dom)
    }

    pub fn document(&self) -> NodeId {
        NodeId(0)
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeRecord {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn record(&self, node: NodeId) -> &NodeRecord {
        &self.nodes[node.0]
    }

    fn record_mut(&mut self, node: NodeId) -> &mut NodeRecord {
        &mut self.nodes[node.0]
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.record(node).parent {
            self.record_mut(parent).children.retain(|c| *c != node);
            self.record_mut(node).parent = None;
        }
    }

    /// Append a new element under `parent`.
    pub fn element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.element_with(parent, tag, &[])
    }

    /// Append a new element with attributes under `parent`.
    pub fn element_with(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let node = self.alloc(NodeData::Element {
            tag: SmolStr::new(tag.to_ascii_lowercase()),
            attrs: attrs
                .iter()
                .map(|(k, v)| (SmolStr::new(k), v.to_string()))
                .collect(),
        });
        self.attach(parent, node);
        node
    }

    /// Append a new text node under `parent`.
    pub fn text_node(&mut self, parent: NodeId, content: &str) -> NodeId {
        let node = self.alloc(NodeData::Text(content.to_string()));
        self.attach(parent, node);
        node
    }

    fn attach(&mut self, parent: NodeId, node: NodeId) {
        self.record_mut(node).parent = Some(parent);
        self.record_mut(parent).children.push(node);
    }

    /// Give a node viewport geometry.
    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.rects.insert(node, rect);
    }

    /// First element with the given tag in document order.
    pub fn find_tag(&self, tag: &str) -> Option<NodeId> {
        self.find_all_tags(tag).into_iter().next()
    }

    /// All elements with the given tag in document order.
    pub fn find_all_tags(&self, tag: &str) -> Vec<NodeId> {
        descendants(self, &self.document())
            .filter(|n| self.tag_name(n).as_deref() == Some(tag))
            .collect()
    }

    /// Serialize the children of `node`.
    pub fn inner_html(&self, node: &NodeId) -> String {
        let mut out = String::new();
        for child in &self.record(*node).children {
            self.write_html(*child, &mut out);
        }
        out
    }

    /// Serialize `node` itself and everything below it.
    pub fn outer_html(&self, node: &NodeId) -> String {
        let mut out = String::new();
        self.write_html(*node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match &self.record(node).data {
            NodeData::Document => {
                for child in &self.record(node).children {
                    self.write_html(*child, out);
                }
            }
            NodeData::Text(text) => escape_into(text, false, out),
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_TAGS.contains(&tag.as_str()) {
                    return;
                }
                for child in &self.record(node).children {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    /// Parse `markup` and append the resulting nodes under `parent`.
    pub fn append_markup(&mut self, parent: NodeId, markup: &str) -> Result<(), DomError> {
        let mut stack = vec![parent];
        let mut rest = markup;
        let mut position = 0usize;

        while !rest.is_empty() {
            let top = *stack.last().unwrap_or(&parent);
            if let Some(after) = rest.strip_prefix("</") {
                let end = after.find('>').ok_or_else(|| markup_error(position, "unclosed end tag"))?;
                let name = after[..end].trim().to_ascii_lowercase();
                let open = self.tag_name(&top);
                if stack.len() < 2 || open.as_deref() != Some(name.as_str()) {
                    return Err(markup_error(position, format!("unexpected </{name}>")));
                }
                stack.pop();
                let consumed = 2 + end + 1;
                position += consumed;
                rest = &rest[consumed..];
            } else if let Some(after) = rest.strip_prefix('<') {
                let end = after.find('>').ok_or_else(|| markup_error(position, "unclosed tag"))?;
                let mut body = &after[..end];
                let self_closing = body.ends_with('/');
                if self_closing {
                    body = &body[..body.len() - 1];
                }
                let (tag, attrs) = parse_tag(body).map_err(|m| markup_error(position, m))?;
                let attr_refs: Vec<(&str, &str)> =
                    attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
                let node = self.element_with(top, &tag, &attr_refs);
                if !self_closing && !VOID_TAGS.contains(&tag.as_str()) {
                    stack.push(node);
                }
                let consumed = 1 + end + 1;
                position += consumed;
                rest = &rest[consumed..];
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                self.text_node(top, &unescape(&rest[..end]));
                position += end;
                rest = &rest[end..];
            }
        }

        if stack.len() > 1 {
            return Err(markup_error(position, "unclosed element at end of input"));
        }
        Ok(())
    }
}

fn markup_error(position: usize, message: impl Into<String>) -> DomError {
    DomError::Markup {
        position,
        message: message.into(),
    }
}

fn parse_tag(body: &str) -> Result<(String, Vec<(String, String)>), String> {
    let body = body.trim();
    let name_end = body
        .find(|c: char| c.is_whitespace())
        .unwrap_or(body.len());
    let tag = &body[..name_end];
    if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(format!("invalid tag name `{tag}`"));
    }

    let mut attrs = Vec::new();
    let mut rest = body[name_end..].trim_start();
    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_ascii_lowercase();
        rest = rest[name_end..].trim_start();
        match rest.strip_prefix('=') {
            Some(value_part) => {
                let value_part = value_part.trim_start();
                let inner = value_part
                    .strip_prefix('"')
                    .ok_or_else(|| format!("attribute `{name}` value must be double-quoted"))?;
                let close = inner
                    .find('"')
                    .ok_or_else(|| format!("unterminated value for `{name}`"))?;
                attrs.push((name, unescape(&inner[..close])));
                rest = inner[close + 1..].trim_start();
            }
            None => attrs.push((name, String::new())),
        }
    }
    Ok((tag.to_ascii_lowercase(), attrs))
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

impl DomTree for MemDom {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        self.document()
    }

    fn kind(&self, node: &NodeId) -> NodeKind {
        match self.record(*node).data {
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Document => NodeKind::Other,
        }
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.record(*node).parent
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.record(*node).children.clone()
    }

    fn tag_name(&self, node: &NodeId) -> Option<String> {
        match &self.record(*node).data {
            NodeData::Element { tag, .. } => Some(tag.to_string()),
            _ => None,
        }
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        match &self.record(*node).data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> Result<(), DomError> {
        match &mut self.record_mut(*node).data {
            NodeData::Element { attrs, .. } => {
                match attrs.iter_mut().find(|(k, _)| k == name) {
                    Some((_, v)) => *v = value.to_string(),
                    None => attrs.push((SmolStr::new(name), value.to_string())),
                }
                Ok(())
            }
            _ => Err("attributes can only be set on elements".into()),
        }
    }

    fn has_class(&self, node: &NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    fn add_class(&mut self, node: &NodeId, class: &str) -> Result<(), DomError> {
        if self.has_class(node, class) {
            return Ok(());
        }
        let classes = match self.attribute(node, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attribute(node, "class", &classes)
    }

    fn remove_class(&mut self, node: &NodeId, class: &str) -> Result<(), DomError> {
        let Some(existing) = self.attribute(node, "class") else {
            return Ok(());
        };
        let kept: Vec<&str> = existing.split_whitespace().filter(|c| *c != class).collect();
        self.set_attribute(node, "class", &kept.join(" "))
    }

    fn text(&self, node: &NodeId) -> Option<String> {
        match &self.record(*node).data {
            NodeData::Text(text) => Some(text.clone()),
            _ => None,
        }
    }

    fn set_text(&mut self, node: &NodeId, text: &str) -> Result<(), DomError> {
        match &mut self.record_mut(*node).data {
            NodeData::Text(existing) => {
                *existing = text.to_string();
                Ok(())
            }
            _ => Err(DomError::NotText),
        }
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        descendants(self, &self.document())
            .find(|n| self.attribute(n, "id").as_deref() == Some(id))
    }

    fn create_element(&mut self, tag: &str) -> Result<NodeId, DomError> {
        Ok(self.alloc(NodeData::Element {
            tag: SmolStr::new(tag.to_ascii_lowercase()),
            attrs: Vec::new(),
        }))
    }

    fn insert_before(
        &mut self,
        parent: &NodeId,
        child: &NodeId,
        reference: Option<&NodeId>,
    ) -> Result<(), DomError> {
        if crate::dom::contains(self, child, parent) {
            return Err("cannot insert a node into its own subtree".into());
        }
        self.detach(*child);
        let index = match reference {
            Some(r) => self
                .record(*parent)
                .children
                .iter()
                .position(|c| c == r)
                .ok_or_else(|| DomError::from("reference node is not a child of parent"))?,
            None => self.record(*parent).children.len(),
        };
        self.record_mut(*parent).children.insert(index, *child);
        self.record_mut(*child).parent = Some(*parent);
        Ok(())
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), DomError> {
        if self.record(*child).parent != Some(*parent) {
            return Err("node is not a child of parent".into());
        }
        self.detach(*child);
        Ok(())
    }

    fn split_text(&mut self, node: &NodeId, offset: usize) -> Result<NodeId, DomError> {
        let text = self.text(node).ok_or(DomError::NotText)?;
        let byte = utf16_to_byte(&text, offset).ok_or(DomError::OffsetOutOfBounds {
            offset,
            len: crate::text::utf16_len(&text),
        })?;
        let parent = self.parent(node).ok_or(DomError::NoParent)?;

        let tail = self.alloc(NodeData::Text(text[byte..].to_string()));
        self.set_text(node, &text[..byte])?;

        let position = self
            .record(parent)
            .children
            .iter()
            .position(|c| c == node)
            .ok_or(DomError::NoParent)?;
        self.record_mut(parent).children.insert(position + 1, tail);
        self.record_mut(tail).parent = Some(parent);
        Ok(tail)
    }

    fn bounding_rect(&self, node: &NodeId) -> Option<Rect> {
        self.rects.get(node).copied()
    }
}
