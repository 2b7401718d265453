//! Selection eligibility.
//!
//! A selection may become a highlight only if it is non-empty, sits inside
//! the content root, and neither starts or ends inside an existing highlight
//! nor swallows one. Overlap is judged per block, against both the markers
//! currently painted and the anchors stored for that block (an anchor that
//! failed its integrity check is not painted but still owns its range).
//! Cross-block selections pass here and are refused by the builder, which
//! knows the block the anchor would be scoped to.

use crate::anchor::Anchor;
use crate::builder::enclosing_block;
use crate::config::GlossConfig;
use crate::dom::{DomRange, DomTree, NodeKind, Point, closest_element, contains, descendants};
use crate::locator::BlockLocator;
use crate::text::{node_span, point_offset};

/// A finished selection as reported by the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSnapshot<N> {
    pub range: DomRange<N>,
    /// Pointer position when the selection finished.
    pub pointer: Point,
}

/// A selection that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<N> {
    pub range: DomRange<N>,
    /// Block enclosing the range start, if any.
    pub block: Option<N>,
    pub position: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Collapsed,
    OutsideContent,
    /// Start or end point lies inside a highlight.
    TouchesHighlight,
    /// The selection contains an existing highlight.
    SpansHighlight,
    SystemPage,
}

/// Whether `node` is at or below a highlight marker.
pub fn inside_marker<D: DomTree + ?Sized>(
    dom: &D,
    config: &GlossConfig,
    content_root: &D::Node,
    node: &D::Node,
) -> bool {
    closest_element(dom, node, Some(content_root), |el| {
        dom.has_class(el, &config.highlight_class)
    })
    .is_some()
}

pub fn validate<D: DomTree + ?Sized>(
    dom: &D,
    config: &GlossConfig,
    content_root: &D::Node,
    selection: &SelectionSnapshot<D::Node>,
    existing: &[Anchor],
) -> Result<Candidate<D::Node>, Rejection> {
    let range = &selection.range;
    if range.is_collapsed() {
        return Err(Rejection::Collapsed);
    }

    let within = range
        .common_ancestor(dom)
        .is_some_and(|ancestor| contains(dom, content_root, &ancestor));
    if !within {
        return Err(Rejection::OutsideContent);
    }

    if inside_marker(dom, config, content_root, &range.start.node)
        || inside_marker(dom, config, content_root, &range.end.node)
    {
        tracing::debug!("selection touches an existing highlight");
        return Err(Rejection::TouchesHighlight);
    }

    let block = enclosing_block(dom, config, content_root, &range.start.node);
    let spans = block
        .as_ref()
        .is_some_and(|block| spans_highlight(dom, config, content_root, block, range, existing));
    if spans {
        tracing::debug!("selection spans an existing highlight");
        return Err(Rejection::SpansHighlight);
    }

    Ok(Candidate {
        range: range.clone(),
        block,
        position: selection.pointer,
    })
}

fn spans_highlight<D: DomTree + ?Sized>(
    dom: &D,
    config: &GlossConfig,
    content_root: &D::Node,
    block: &D::Node,
    range: &DomRange<D::Node>,
    existing: &[Anchor],
) -> bool {
    let Some(start) = point_offset(dom, block, &range.start) else {
        return false;
    };
    // A range ending past the block is clipped to it.
    let end = point_offset(dom, block, &range.end)
        .or_else(|| node_span(dom, block, block).map(|span| span.end))
        .unwrap_or(start);
    let selected = start..end;

    let painted = descendants(dom, block)
        .filter(|n| dom.kind(n) == NodeKind::Element && dom.has_class(n, &config.highlight_class))
        .filter_map(|marker| node_span(dom, block, &marker))
        .any(|span| span.start < selected.end && selected.start < span.end);
    if painted {
        return true;
    }

    match BlockLocator::for_element(dom, block, content_root) {
        Some(locator) => existing.iter().any(|a| a.overlaps(&locator, &selected)),
        None => false,
    }
}
