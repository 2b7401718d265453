//! Reading and clearing the window selection.

use gloss_core::{DomPoint, DomRange, Point, SelectionSnapshot};
use web_sys::Node;

/// Snapshot of the first range of the window selection.
///
/// Returns `None` when there is no selection at all; a collapsed selection is
/// still returned so validation can reject it.
pub fn current_selection(pointer: Point) -> Option<SelectionSnapshot<Node>> {
    let selection = web_sys::window()?.get_selection().ok().flatten()?;
    if selection.range_count() == 0 {
        return None;
    }
    let range = selection.get_range_at(0).ok()?;
    let start = DomPoint::new(range.start_container().ok()?, range.start_offset().ok()? as usize);
    let end = DomPoint::new(range.end_container().ok()?, range.end_offset().ok()? as usize);

    tracing::trace!(
        start_offset = start.offset,
        end_offset = end.offset,
        collapsed = range.collapsed(),
        "read window selection"
    );
    Some(SelectionSnapshot {
        range: DomRange::new(start, end),
        pointer,
    })
}

pub fn clear_selection() {
    if let Some(selection) = web_sys::window().and_then(|w| w.get_selection().ok().flatten()) {
        if let Err(e) = selection.remove_all_ranges() {
            tracing::debug!("remove_all_ranges failed: {:?}", e);
        }
    }
}
