//! Repaint engine: projecting stored anchors onto the document as markers.
//!
//! Each anchor is painted independently. An anchor whose block no longer
//! resolves, or whose stored text no longer matches the block, is skipped and
//! reported; it stays in storage untouched. A range crossing inline markup is
//! painted as one marker per text node, all sharing the anchor id.

use crate::anchor::{Anchor, AnchorId};
use crate::config::GlossConfig;
use crate::dom::{
    DomTree, NodeKind, closest_element, descendants, normalize_children, unwrap_element, wrap_node,
};
use crate::error::DomError;
use crate::text::{collect_wrap_set, flatten_text, locate_endpoints, utf16_slice};

/// What happened to one anchor during a paint pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaintOutcome {
    Painted { markers: usize },
    /// Markers for this id are already in the document.
    AlreadyPainted,
    /// The block locator no longer resolves.
    Orphaned,
    /// The block text at the stored offsets differs from the stored text.
    IntegrityMismatch { found: String },
    /// Offsets could not be mapped onto text nodes.
    Unmappable,
}

/// Tally of one paint pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaintReport {
    pub painted: usize,
    pub already_painted: usize,
    pub orphaned: usize,
    pub mismatched: usize,
    pub unmappable: usize,
    /// Anchors whose DOM mutation failed part-way.
    pub failed: usize,
}

impl PaintReport {
    pub fn record(&mut self, outcome: &PaintOutcome) {
        match outcome {
            PaintOutcome::Painted { .. } => self.painted += 1,
            PaintOutcome::AlreadyPainted => self.already_painted += 1,
            PaintOutcome::Orphaned => self.orphaned += 1,
            PaintOutcome::IntegrityMismatch { .. } => self.mismatched += 1,
            PaintOutcome::Unmappable => self.unmappable += 1,
        }
    }

    pub fn skipped(&self) -> usize {
        self.orphaned + self.mismatched + self.unmappable + self.failed
    }
}

/// Paint every anchor in list order.
pub fn paint_all<D: DomTree + ?Sized>(
    dom: &mut D,
    config: &GlossConfig,
    content_root: &D::Node,
    anchors: &[Anchor],
) -> PaintReport {
    let mut report = PaintReport::default();
    for anchor in anchors {
        match paint_anchor(dom, config, content_root, anchor) {
            Ok(outcome) => report.record(&outcome),
            Err(e) => {
                tracing::warn!(id = %anchor.id, error = %e, "failed to paint annotation");
                report.failed += 1;
            }
        }
    }
    tracing::debug!(
        painted = report.painted,
        already = report.already_painted,
        skipped = report.skipped(),
        "paint pass finished"
    );
    report
}

/// Paint a single anchor.
pub fn paint_anchor<D: DomTree + ?Sized>(
    dom: &mut D,
    config: &GlossConfig,
    content_root: &D::Node,
    anchor: &Anchor,
) -> Result<PaintOutcome, DomError> {
    if !markers_for(dom, config, content_root, &anchor.id).is_empty() {
        return Ok(PaintOutcome::AlreadyPainted);
    }

    let Some(block) = anchor.locator.resolve(dom, content_root) else {
        tracing::warn!(id = %anchor.id, locator = %anchor.locator, "annotation block not found");
        return Ok(PaintOutcome::Orphaned);
    };

    let flattened = flatten_text(dom, &block);
    let found = utf16_slice(&flattened, anchor.range()).unwrap_or_default();
    if !anchor.is_consistent() || found != anchor.text {
        tracing::warn!(
            id = %anchor.id,
            expected = %anchor.text,
            found,
            "annotation text no longer matches its block"
        );
        return Ok(PaintOutcome::IntegrityMismatch {
            found: found.to_string(),
        });
    }

    let Some(endpoints) = locate_endpoints(dom, &block, anchor.start_offset, anchor.end_offset)
    else {
        return Ok(PaintOutcome::Unmappable);
    };
    let pieces = collect_wrap_set(dom, &block, &endpoints);
    if pieces.is_empty() {
        return Ok(PaintOutcome::Unmappable);
    }

    for piece in &pieces {
        let len = dom.text(&piece.node).map(|t| crate::text::utf16_len(&t)).unwrap_or(0);
        if piece.range.end < len {
            dom.split_text(&piece.node, piece.range.end)?;
        }
        let target = if piece.range.start > 0 {
            dom.split_text(&piece.node, piece.range.start)?
        } else {
            piece.node.clone()
        };
        let marker = create_marker(dom, config, anchor)?;
        wrap_node(dom, &target, &marker)?;
    }

    tracing::trace!(id = %anchor.id, markers = pieces.len(), "painted annotation");
    Ok(PaintOutcome::Painted {
        markers: pieces.len(),
    })
}

fn create_marker<D: DomTree + ?Sized>(
    dom: &mut D,
    config: &GlossConfig,
    anchor: &Anchor,
) -> Result<D::Node, DomError> {
    let marker = dom.create_element(&config.marker_tag)?;
    dom.add_class(&marker, &config.highlight_class)?;
    if anchor.has_memo() {
        dom.add_class(&marker, &config.memo_class)?;
    }
    dom.set_attribute(&marker, &config.id_attribute, anchor.id.as_str())?;
    dom.set_attribute(&marker, &config.color_attribute, anchor.color.as_str())?;
    Ok(marker)
}

fn is_marker<D: DomTree + ?Sized>(dom: &D, config: &GlossConfig, node: &D::Node) -> bool {
    dom.kind(node) == NodeKind::Element && dom.has_class(node, &config.highlight_class)
}

/// All markers of one anchor, in document order.
pub fn markers_for<D: DomTree + ?Sized>(
    dom: &D,
    config: &GlossConfig,
    content_root: &D::Node,
    id: &AnchorId,
) -> Vec<D::Node> {
    descendants(dom, content_root)
        .filter(|n| {
            is_marker(dom, config, n)
                && dom.attribute(n, &config.id_attribute).as_deref() == Some(id.as_str())
        })
        .collect()
}

/// Anchor id of the marker at or above `node`, if any.
pub fn marker_at<D: DomTree + ?Sized>(
    dom: &D,
    config: &GlossConfig,
    content_root: &D::Node,
    node: &D::Node,
) -> Option<(D::Node, AnchorId)> {
    let marker = closest_element(dom, node, Some(content_root), |n| is_marker(dom, config, n))?;
    let id = dom.attribute(&marker, &config.id_attribute)?;
    Some((marker, AnchorId::from(id)))
}

/// Remove every marker of `id`, merging the text they held back into their
/// parents. Returns the number of markers removed.
pub fn unpaint<D: DomTree + ?Sized>(
    dom: &mut D,
    config: &GlossConfig,
    content_root: &D::Node,
    id: &AnchorId,
) -> Result<usize, DomError> {
    let markers = markers_for(dom, config, content_root, id);
    for marker in &markers {
        let parent = dom.parent(marker).ok_or(DomError::NoParent)?;
        unwrap_element(dom, marker)?;
        normalize_children(dom, &parent)?;
    }
    tracing::trace!(id = %id, removed = markers.len(), "unpainted annotation");
    Ok(markers.len())
}

/// Toggle the memo class on the markers of `id` without repainting.
pub fn sync_memo_class<D: DomTree + ?Sized>(
    dom: &mut D,
    config: &GlossConfig,
    content_root: &D::Node,
    id: &AnchorId,
    has_memo: bool,
) -> Result<usize, DomError> {
    let markers = markers_for(dom, config, content_root, id);
    for marker in &markers {
        if has_memo {
            dom.add_class(marker, &config.memo_class)?;
        } else {
            dom.remove_class(marker, &config.memo_class)?;
        }
    }
    Ok(markers.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::HighlightColor;
    use crate::memdom::{MemDom, NodeId};

    fn page(markup: &str) -> (MemDom, NodeId) {
        let dom = MemDom::parse(markup).unwrap();
        let root = dom.first_by_class("md-content").unwrap();
        (dom, root)
    }

    fn anchor(id: &str, locator: &str, start: usize, text: &str) -> Anchor {
        let mut anchor = Anchor::new(locator.parse().unwrap(), start, text, HighlightColor::Yellow);
        anchor.id = id.into();
        anchor
    }

    #[test]
    fn test_paint_single_node() {
        let (mut dom, root) = page(r#"<div class="md-content"><p>all things pass</p></div>"#);
        let config = GlossConfig::default();
        let a = anchor("a1", "p", 4, "things");

        let outcome = paint_anchor(&mut dom, &config, &root, &a).unwrap();
        assert_eq!(outcome, PaintOutcome::Painted { markers: 1 });
        insta::assert_snapshot!(
            dom.inner_html(&dom.find_tag("p").unwrap()),
            @r#"all <span class="db-highlight" data-id="a1" data-color="yellow">things</span> pass"#
        );
    }

    #[test]
    fn test_paint_is_idempotent() {
        let (mut dom, root) = page(r#"<div class="md-content"><p>all things pass</p></div>"#);
        let config = GlossConfig::default();
        let anchors = vec![anchor("a1", "p", 0, "all"), anchor("a2", "p", 11, "pass")];

        let first = paint_all(&mut dom, &config, &root, &anchors);
        let html = dom.inner_html(&root);
        let second = paint_all(&mut dom, &config, &root, &anchors);

        assert_eq!(first.painted, 2);
        assert_eq!(second.already_painted, 2);
        assert_eq!(second.painted, 0);
        assert_eq!(dom.inner_html(&root), html);
    }

    #[test]
    fn test_id_block_outside_content_is_orphaned() {
        let (mut dom, root) = page(
            r#"<aside><p id="note">side text</p></aside><div class="md-content"><p>body</p></div>"#,
        );
        let config = GlossConfig::default();
        let a = anchor("x", "#note", 0, "side");
        let aside = dom.find_tag("aside").unwrap();
        let before = dom.inner_html(&aside);

        for _ in 0..2 {
            let outcome = paint_anchor(&mut dom, &config, &root, &a).unwrap();
            assert_eq!(outcome, PaintOutcome::Orphaned);
        }
        assert_eq!(dom.inner_html(&aside), before);
    }

    #[test]
    fn test_mismatch_and_orphan_are_isolated() {
        let (mut dom, root) = page(r#"<div class="md-content"><p>all things pass</p></div>"#);
        let config = GlossConfig::default();
        let anchors = vec![
            anchor("bad", "p", 0, "ALL"),
            anchor("gone", "ul > li", 0, "x"),
            anchor("good", "p", 11, "pass"),
        ];

        let report = paint_all(&mut dom, &config, &root, &anchors);
        assert_eq!(report.painted, 1);
        assert_eq!(report.mismatched, 1);
        assert_eq!(report.orphaned, 1);
        assert!(markers_for(&dom, &config, &root, &"bad".into()).is_empty());
        assert_eq!(markers_for(&dom, &config, &root, &"good".into()).len(), 1);
    }

    #[test]
    fn test_memo_class_and_unpaint() {
        let (mut dom, root) =
            page(r#"<div class="md-content"><p>one <b>two</b> three</p></div>"#);
        let config = GlossConfig::default();
        let p = dom.find_tag("p").unwrap();
        let original = dom.inner_html(&p);
        let a = anchor("m", "p", 2, "e two t");

        assert_eq!(
            paint_anchor(&mut dom, &config, &root, &a).unwrap(),
            PaintOutcome::Painted { markers: 3 }
        );
        assert_eq!(sync_memo_class(&mut dom, &config, &root, &a.id, true).unwrap(), 3);
        let marker = markers_for(&dom, &config, &root, &a.id)[1];
        assert!(dom.has_class(&marker, "db-has-memo"));

        let inner = dom.children(&marker)[0];
        let (found, id) = marker_at(&dom, &config, &root, &inner).unwrap();
        assert_eq!((found, id), (marker, a.id.clone()));

        assert_eq!(unpaint(&mut dom, &config, &root, &a.id).unwrap(), 3);
        assert_eq!(dom.inner_html(&p), original);
    }
}
