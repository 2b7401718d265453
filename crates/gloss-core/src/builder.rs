//! Turning a validated selection into an [`Anchor`].

use crate::anchor::{Anchor, HighlightColor};
use crate::config::GlossConfig;
use crate::dom::{DomRange, DomTree, closest_element, contains};
use crate::error::BuildError;
use crate::locator::BlockLocator;
use crate::text::{flatten_text, point_offset, utf16_slice};

/// Closest block element at or above `node`, never the content root itself
/// nor anything outside it.
pub fn enclosing_block<D: DomTree + ?Sized>(
    dom: &D,
    config: &GlossConfig,
    content_root: &D::Node,
    node: &D::Node,
) -> Option<D::Node> {
    if !contains(dom, content_root, node) {
        return None;
    }
    closest_element(dom, node, Some(content_root), |el| {
        dom.tag_name(el).is_some_and(|tag| config.is_block_tag(&tag))
    })
}

/// Build an anchor for `range`.
///
/// The block is the one enclosing the range start; the range end must fall in
/// the same block. Offsets are measured against the block's flattened text.
pub fn build<D: DomTree + ?Sized>(
    dom: &D,
    config: &GlossConfig,
    content_root: &D::Node,
    range: &DomRange<D::Node>,
    color: HighlightColor,
) -> Result<Anchor, BuildError> {
    let block =
        enclosing_block(dom, config, content_root, &range.start.node).ok_or(BuildError::NoBlock)?;
    if !contains(dom, &block, &range.end.node) {
        tracing::debug!("selection end lies outside the start block");
        return Err(BuildError::CrossBlock);
    }

    let start = point_offset(dom, &block, &range.start).ok_or(BuildError::NoBlock)?;
    let end = point_offset(dom, &block, &range.end).ok_or(BuildError::CrossBlock)?;
    if end <= start {
        return Err(BuildError::EmptySelection);
    }

    let flattened = flatten_text(dom, &block);
    let text = utf16_slice(&flattened, start..end).ok_or(BuildError::EmptySelection)?;
    if text.is_empty() {
        return Err(BuildError::EmptySelection);
    }

    let locator =
        BlockLocator::for_element(dom, &block, content_root).ok_or(BuildError::Unlocatable)?;
    let anchor = Anchor::new(locator, start, text, color);
    tracing::debug!(
        id = %anchor.id,
        locator = %anchor.locator,
        start = anchor.start_offset,
        end = anchor.end_offset,
        "built anchor"
    );
    Ok(anchor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomPoint;
    use crate::memdom::MemDom;

    fn page(markup: &str) -> (MemDom, crate::memdom::NodeId) {
        let dom = MemDom::parse(markup).unwrap();
        let root = dom.first_by_class("md-content").unwrap();
        (dom, root)
    }

    #[test]
    fn test_offsets_span_inline_markup() {
        let (dom, root) = page(
            r#"<div class="md-content"><p>intro</p><p>The <em>middle</em> way.</p></div>"#,
        );
        let p = dom.find_all_tags("p")[1];
        let children = dom.children(&p);
        let em_text = dom.children(&children[1])[0];

        // "middle way" starts inside <em> and ends in the trailing text node.
        let range = DomRange::new(DomPoint::new(em_text, 0), DomPoint::new(children[2], 4));
        let anchor = build(&dom, &GlossConfig::default(), &root, &range, HighlightColor::Yellow)
            .unwrap();

        assert_eq!(anchor.text, "middle way");
        assert_eq!(anchor.range(), 4..14);
        assert_eq!(anchor.locator.to_string(), "p:nth-of-type(2)");
        assert!(anchor.is_consistent());
    }

    #[test]
    fn test_cross_block_is_rejected() {
        let (dom, root) =
            page(r#"<div class="md-content"><p>first block</p><p>second block</p></div>"#);
        let ps = dom.find_all_tags("p");
        let a = dom.children(&ps[0])[0];
        let b = dom.children(&ps[1])[0];

        let range = DomRange::new(DomPoint::new(a, 6), DomPoint::new(b, 6));
        assert_eq!(
            build(&dom, &GlossConfig::default(), &root, &range, HighlightColor::Yellow),
            Err(BuildError::CrossBlock)
        );
    }

    #[test]
    fn test_content_root_is_not_a_block() {
        let (dom, root) = page(r#"<div class="md-content">bare text</div>"#);
        let text = dom.children(&root)[0];
        let range = DomRange::new(DomPoint::new(text, 0), DomPoint::new(text, 4));
        assert_eq!(
            build(&dom, &GlossConfig::default(), &root, &range, HighlightColor::Yellow),
            Err(BuildError::NoBlock)
        );
    }

    #[test]
    fn test_utf16_offsets() {
        let (dom, root) = page(r#"<div class="md-content"><p>😀 색즉시공</p></div>"#);
        let text = dom.children(&dom.find_tag("p").unwrap())[0];
        let range = DomRange::new(DomPoint::new(text, 3), DomPoint::new(text, 7));
        let anchor =
            build(&dom, &GlossConfig::default(), &root, &range, HighlightColor::Blue).unwrap();
        assert_eq!(anchor.text, "색즉시공");
        assert_eq!(anchor.range(), 3..7);
    }
}
