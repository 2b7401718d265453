//! Applying controller signals to the page.
//!
//! The contextual menu itself is page markup that listens for window events:
//!
//! - `db-open-menu` with `detail = { uuid, memo, top, left }`
//! - `db-close-menu`
//! - `db-stats` with `detail = { highlights, memos }`
//!
//! The selection affordance is a button this module creates and removes.

use gloss_core::{AnnotationStats, GlossConfig, Point, UiSignal};
use js_sys::{Object, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CustomEvent, CustomEventInit, HtmlElement};

pub const OPEN_MENU_EVENT: &str = "db-open-menu";
pub const CLOSE_MENU_EVENT: &str = "db-close-menu";
pub const STATS_EVENT: &str = "db-stats";
pub const AFFORDANCE_CLASS: &str = "db-temp-highlight-btn";

fn dispatch(name: &str, detail: Option<&JsValue>) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let init = CustomEventInit::new();
    if let Some(detail) = detail {
        init.set_detail(detail);
    }
    let event = CustomEvent::new_with_event_init_dict(name, &init)?;
    window.dispatch_event(&event)?;
    Ok(())
}

fn object(entries: &[(&str, JsValue)]) -> Result<Object, JsValue> {
    let obj = Object::new();
    for (key, value) in entries {
        Reflect::set(&obj, &JsValue::from_str(key), value)?;
    }
    Ok(obj)
}

fn remove_affordance() {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let existing = document.get_elements_by_class_name(AFFORDANCE_CLASS);
    while let Some(button) = existing.item(0) {
        button.remove();
    }
}

fn show_affordance(config: &GlossConfig, position: Point) -> Result<(), JsValue> {
    remove_affordance();
    let document = gloo_utils::document();
    let button: HtmlElement = document.create_element("button")?.dyn_into()?;
    button.set_class_name(AFFORDANCE_CLASS);
    button.set_text_content(Some(&config.affordance_label));
    let style = button.style();
    style.set_property("left", &format!("{}px", position.x))?;
    style.set_property("top", &format!("{}px", position.y))?;
    gloo_utils::body().append_child(&button)?;
    Ok(())
}

fn stats_detail(stats: AnnotationStats) -> Result<Object, JsValue> {
    object(&[
        ("highlights", JsValue::from(stats.highlights as u32)),
        ("memos", JsValue::from(stats.memos as u32)),
    ])
}

fn apply_one(config: &GlossConfig, signal: UiSignal) -> Result<(), JsValue> {
    match signal {
        UiSignal::ShowAffordance { position } => show_affordance(config, position),
        UiSignal::HideAffordance => {
            remove_affordance();
            Ok(())
        }
        UiSignal::OpenMenu {
            anchor_id,
            memo,
            position,
        } => {
            let detail = object(&[
                ("uuid", JsValue::from_str(anchor_id.as_str())),
                ("memo", JsValue::from_str(memo.as_deref().unwrap_or_default())),
                ("top", JsValue::from_f64(position.y)),
                ("left", JsValue::from_f64(position.x)),
            ])?;
            dispatch(OPEN_MENU_EVENT, Some(&JsValue::from(detail)))
        }
        UiSignal::CloseMenu => dispatch(CLOSE_MENU_EVENT, None),
        UiSignal::Notice(message) => gloo_utils::window().alert_with_message(&message),
        UiSignal::StatsChanged(stats) => {
            dispatch(STATS_EVENT, Some(&JsValue::from(stats_detail(stats)?)))
        }
    }
}

/// Apply signals in order. A failing signal is logged and does not stop the
/// rest.
pub fn apply(config: &GlossConfig, signals: Vec<UiSignal>) {
    for signal in signals {
        let name = format!("{signal:?}");
        if let Err(e) = apply_one(config, signal) {
            tracing::warn!(signal = %name, "failed to apply UI signal: {:?}", e);
        }
    }
}
