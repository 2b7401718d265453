//! Flattened-text addressing.
//!
//! Anchors address text by offsets into a block's flattened text content, in
//! UTF-16 code units (what `Range.toString().length` and `Text.length` report
//! in a browser). Everything here is built on [`TextNodes`], a lazy walk over
//! `(text node, cumulative offset)` pairs that callers consume as many times
//! as they need.

use std::ops::Range;

use crate::dom::{DomPoint, DomTree, NodeKind, descendants};

/// Length of `s` in UTF-16 code units.
pub fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Byte index of a UTF-16 offset, `None` if the offset is past the end or
/// splits a surrogate pair.
pub fn utf16_to_byte(s: &str, offset: usize) -> Option<usize> {
    let mut units = 0usize;
    for (byte, c) in s.char_indices() {
        if units == offset {
            return Some(byte);
        }
        units += c.len_utf16();
        if units > offset {
            return None;
        }
    }
    (units == offset).then_some(s.len())
}

/// Substring by UTF-16 range.
pub fn utf16_slice(s: &str, range: Range<usize>) -> Option<&str> {
    if range.start > range.end {
        return None;
    }
    let start = utf16_to_byte(s, range.start)?;
    let end = utf16_to_byte(s, range.end)?;
    Some(&s[start..end])
}

/// One text node with its position in the flattened text of the walk root.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan<N> {
    pub node: N,
    /// Flattened offset of the node's first code unit.
    pub start: usize,
    /// Length in UTF-16 code units.
    pub len: usize,
}

impl<N> TextSpan<N> {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Lazy iterator over the text nodes under a root, in document order.
pub struct TextNodes<'a, D: DomTree + ?Sized> {
    dom: &'a D,
    inner: crate::dom::Descendants<'a, D>,
    offset: usize,
}

impl<D: DomTree + ?Sized> Iterator for TextNodes<'_, D> {
    type Item = TextSpan<D::Node>;

    fn next(&mut self) -> Option<Self::Item> {
        for node in self.inner.by_ref() {
            if let Some(data) = self.dom.text(&node) {
                let len = utf16_len(&data);
                let span = TextSpan {
                    node,
                    start: self.offset,
                    len,
                };
                self.offset += len;
                return Some(span);
            }
        }
        None
    }
}

pub fn text_nodes<'a, D: DomTree + ?Sized>(dom: &'a D, root: &D::Node) -> TextNodes<'a, D> {
    TextNodes {
        dom,
        inner: descendants(dom, root),
        offset: 0,
    }
}

/// Flattened text content of `root`.
pub fn flatten_text<D: DomTree + ?Sized>(dom: &D, root: &D::Node) -> String {
    crate::dom::text_content(dom, root)
}

/// Flattened offset of the position just before `target` (its first text
/// code unit, or where it would be for an empty node).
fn offset_before<D: DomTree + ?Sized>(dom: &D, root: &D::Node, target: &D::Node) -> Option<usize> {
    let mut acc = 0usize;
    for node in descendants(dom, root) {
        if &node == target {
            return Some(acc);
        }
        if let Some(data) = dom.text(&node) {
            acc += utf16_len(&data);
        }
    }
    None
}

/// Flattened offset of a boundary point relative to `root`.
///
/// Equivalent to measuring a range from the start of `root` to the point.
/// Returns `None` when the point lies outside `root`.
pub fn point_offset<D: DomTree + ?Sized>(
    dom: &D,
    root: &D::Node,
    point: &DomPoint<D::Node>,
) -> Option<usize> {
    match dom.kind(&point.node) {
        NodeKind::Text => {
            let span = text_nodes(dom, root).find(|s| s.node == point.node)?;
            Some(span.start + point.offset.min(span.len))
        }
        _ => {
            let children = dom.children(&point.node);
            match children.get(point.offset) {
                Some(child) => offset_before(dom, root, child),
                None => {
                    let before = offset_before(dom, root, &point.node)?;
                    Some(before + utf16_len(&flatten_text(dom, &point.node)))
                }
            }
        }
    }
}

/// Flattened range `[start, end)` covered by `node` within `root`.
pub fn node_span<D: DomTree + ?Sized>(
    dom: &D,
    root: &D::Node,
    node: &D::Node,
) -> Option<Range<usize>> {
    let start = offset_before(dom, root, node)?;
    Some(start..start + utf16_len(&flatten_text(dom, node)))
}

/// Text nodes holding the two ends of a flattened range, with the offset
/// inside each node.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints<N> {
    pub start: DomPoint<N>,
    pub end: DomPoint<N>,
}

/// Map flattened `[start, end)` back to text-node endpoints.
///
/// The start endpoint is the first node whose end reaches `start`; the end
/// endpoint is the first node whose end reaches `end`.
pub fn locate_endpoints<D: DomTree + ?Sized>(
    dom: &D,
    root: &D::Node,
    start: usize,
    end: usize,
) -> Option<Endpoints<D::Node>> {
    let start_span = text_nodes(dom, root).find(|s| s.end() >= start)?;
    let end_span = text_nodes(dom, root)
        .skip_while(|s| s.node != start_span.node)
        .find(|s| s.end() >= end)?;

    tracing::trace!(
        start,
        end,
        start_node_offset = start - start_span.start,
        end_node_offset = end - end_span.start,
        "locate_endpoints: mapped flattened range"
    );

    Some(Endpoints {
        start: DomPoint::new(start_span.node, start - start_span.start),
        end: DomPoint::new(end_span.node, end - end_span.start),
    })
}

/// A text node and the part of it to wrap.
#[derive(Debug, Clone, PartialEq)]
pub struct WrapPiece<N> {
    pub node: N,
    pub range: Range<usize>,
}

/// Every text node from the start endpoint through the end endpoint, each
/// clipped to the endpoints. Empty pieces are dropped.
pub fn collect_wrap_set<D: DomTree + ?Sized>(
    dom: &D,
    root: &D::Node,
    endpoints: &Endpoints<D::Node>,
) -> Vec<WrapPiece<D::Node>> {
    let mut pieces = Vec::new();
    let mut collecting = false;

    for span in text_nodes(dom, root) {
        if span.node == endpoints.start.node {
            collecting = true;
        }
        if !collecting {
            continue;
        }

        let is_start = span.node == endpoints.start.node;
        let is_end = span.node == endpoints.end.node;
        let from = if is_start { endpoints.start.offset } else { 0 };
        let to = if is_end { endpoints.end.offset } else { span.len };

        if from < to {
            pieces.push(WrapPiece {
                node: span.node,
                range: from..to,
            });
        }
        if is_end {
            break;
        }
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memdom::MemDom;

    fn block(markup: &str) -> (MemDom, crate::memdom::NodeId) {
        let dom = MemDom::parse(markup).unwrap();
        let p = dom.find_tag("p").unwrap();
        (dom, p)
    }

    #[test]
    fn test_utf16_helpers() {
        assert_eq!(utf16_len("abc"), 3);
        assert_eq!(utf16_len("😀"), 2);
        assert_eq!(utf16_to_byte("a😀b", 3), Some(5));
        assert_eq!(utf16_to_byte("a😀b", 2), None);
        assert_eq!(utf16_to_byte("ab", 2), Some(2));
        assert_eq!(utf16_to_byte("ab", 3), None);
        assert_eq!(utf16_slice("불교 경전", 0..2), Some("불교"));
        assert_eq!(utf16_slice("abc", 2..1), None);
    }

    #[test]
    fn test_text_nodes_cumulative_offsets() {
        let (dom, p) = block("<p>one <em>two</em> three</p>");
        let spans: Vec<_> = text_nodes(&dom, &p).map(|s| (s.start, s.len)).collect();
        assert_eq!(spans, vec![(0, 4), (4, 3), (7, 6)]);
        assert_eq!(flatten_text(&dom, &p), "one two three");
    }

    #[test]
    fn test_point_offset_text_and_element_points() {
        let (dom, p) = block("<p>one <em>two</em> three</p>");
        let em = dom.find_tag("em").unwrap();
        let two = dom.children(&em)[0];

        assert_eq!(point_offset(&dom, &p, &DomPoint::new(two, 1)), Some(5));
        // Element point before the third child (" three").
        assert_eq!(point_offset(&dom, &p, &DomPoint::new(p, 2)), Some(7));
        // Element point after the last child.
        assert_eq!(point_offset(&dom, &p, &DomPoint::new(p, 3)), Some(13));
        assert_eq!(point_offset(&dom, &p, &DomPoint::new(em, 1)), Some(7));
    }

    #[test]
    fn test_point_offset_outside_root() {
        let dom = MemDom::parse("<p>a</p><p>b</p>").unwrap();
        let ps = dom.find_all_tags("p");
        let b = dom.children(&ps[1])[0];
        assert_eq!(point_offset(&dom, &ps[0], &DomPoint::new(b, 0)), None);
    }

    #[test]
    fn test_locate_endpoints_and_wrap_set() {
        let (dom, p) = block("<p>one <em>two</em> three</p>");
        let children = dom.children(&p);
        let em_text = dom.children(&children[1])[0];

        let ends = locate_endpoints(&dom, &p, 2, 9).unwrap();
        assert_eq!(ends.start, DomPoint::new(children[0], 2));
        assert_eq!(ends.end, DomPoint::new(children[2], 2));

        let pieces = collect_wrap_set(&dom, &p, &ends);
        assert_eq!(
            pieces,
            vec![
                WrapPiece { node: children[0], range: 2..4 },
                WrapPiece { node: em_text, range: 0..3 },
                WrapPiece { node: children[2], range: 0..2 },
            ]
        );
    }

    #[test]
    fn test_wrap_set_skips_empty_boundary_piece() {
        let (dom, p) = block("<p>one <em>two</em></p>");
        let em_text = dom.children(&dom.find_tag("em").unwrap())[0];

        // Start offset 4 is the end of "one ", so the first piece is empty.
        let ends = locate_endpoints(&dom, &p, 4, 7).unwrap();
        let pieces = collect_wrap_set(&dom, &p, &ends);
        assert_eq!(pieces, vec![WrapPiece { node: em_text, range: 0..3 }]);
    }

    #[test]
    fn test_locate_endpoints_past_end() {
        let (dom, p) = block("<p>short</p>");
        assert!(locate_endpoints(&dom, &p, 2, 40).is_none());
    }
}
