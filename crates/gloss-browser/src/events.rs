//! Event extraction helpers.

use gloss_core::Point;
use wasm_bindgen::JsCast;
use web_sys::{Element, Event, MouseEvent, Node};

/// Event target as a DOM node.
pub fn target_node(event: &Event) -> Option<Node> {
    event.target()?.dyn_into::<Node>().ok()
}

/// Whether the event target is inside an element matching `selector`.
pub fn target_within(event: &Event, selector: &str) -> bool {
    let Some(node) = target_node(event) else {
        return false;
    };
    let element = match node.dyn_ref::<Element>() {
        Some(el) => Some(el.clone()),
        None => node.parent_element(),
    };
    element
        .and_then(|el| el.closest(selector).ok().flatten())
        .is_some()
}

/// Pointer position in page coordinates.
pub fn page_point(event: &Event) -> Point {
    match event.dyn_ref::<MouseEvent>() {
        Some(mouse) => Point::new(f64::from(mouse.page_x()), f64::from(mouse.page_y())),
        None => Point::default(),
    }
}
