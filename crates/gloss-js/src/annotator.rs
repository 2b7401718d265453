//! JsAnnotator - the annotation layer wrapper for JavaScript.

use gloss_browser::BrowserAnnotator;
use gloss_core::{Anchor, GlossConfig, GlossError, HighlightColor};
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::types::{JsPaintReport, JsStats};

fn js_error(e: GlossError) -> JsError {
    JsError::new(&e.to_string())
}

/// Serialize as plain objects rather than JS `Map`s.
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}

fn anchor_to_js(anchor: Option<Anchor>) -> Result<JsValue, JsError> {
    match anchor {
        Some(anchor) => to_js(&anchor),
        None => Ok(JsValue::NULL),
    }
}

/// The annotation layer instance exposed to JavaScript.
#[wasm_bindgen]
pub struct JsAnnotator {
    inner: BrowserAnnotator,
}

#[wasm_bindgen]
impl JsAnnotator {
    /// Create an annotator. `config` may be `undefined` or a partial
    /// configuration object; missing fields take their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<JsAnnotator, JsError> {
        let config: GlossConfig = if config.is_undefined() || config.is_null() {
            GlossConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsError::new(&format!("Invalid config: {}", e)))?
        };
        let inner = BrowserAnnotator::new(config).map_err(js_error)?;
        Ok(Self { inner })
    }

    /// Fetch the document index in the background and mount the current page.
    pub fn start(&self) -> JsPaintReport {
        self.inner.start().into()
    }

    /// Rebind after the page content was replaced in place.
    #[wasm_bindgen(js_name = onNavigation)]
    pub fn on_navigation(&self) -> JsPaintReport {
        self.inner.on_navigation().into()
    }

    /// Detach from the current page.
    pub fn unmount(&self) {
        self.inner.unmount();
    }

    /// Save the pending selection as a highlight. Resolves to the new
    /// annotation, or `null` when nothing was saved.
    #[wasm_bindgen(js_name = commitSelection)]
    pub fn commit_selection(&self, color: Option<String>) -> Result<JsValue, JsError> {
        let color = color.map(HighlightColor::from);
        anchor_to_js(self.inner.commit_selection(color).map_err(js_error)?)
    }

    /// Set or clear (empty text) the memo of an annotation.
    #[wasm_bindgen(js_name = saveMemo)]
    pub fn save_memo(&self, uuid: &str, memo: Option<String>) -> Result<JsValue, JsError> {
        let anchor = self.inner.save_memo(uuid, memo).map_err(js_error)?;
        to_js(&anchor)
    }

    /// Delete an annotation after confirmation. Returns whether it was
    /// deleted.
    #[wasm_bindgen(js_name = removeAnnotation)]
    pub fn remove_annotation(&self, uuid: &str) -> Result<bool, JsError> {
        self.inner.remove_annotation(uuid).map_err(js_error)
    }

    #[wasm_bindgen(js_name = beginEdit)]
    pub fn begin_edit(&self) -> bool {
        self.inner.begin_edit()
    }

    #[wasm_bindgen(js_name = updateDraft)]
    pub fn update_draft(&self, text: &str) -> bool {
        self.inner.update_draft(text)
    }

    #[wasm_bindgen(js_name = cancelEdit)]
    pub fn cancel_edit(&self) -> bool {
        self.inner.cancel_edit()
    }

    /// Save the memo being edited in the open menu.
    #[wasm_bindgen(js_name = saveDraft)]
    pub fn save_draft(&self) -> Result<JsValue, JsError> {
        anchor_to_js(self.inner.save_draft().map_err(js_error)?)
    }

    #[wasm_bindgen(js_name = closeMenu)]
    pub fn close_menu(&self) {
        self.inner.close_menu();
    }

    pub fn repaint(&self) -> Result<JsPaintReport, JsError> {
        self.inner.repaint().map(Into::into).map_err(js_error)
    }

    /// Erase all stored user data and clear the page's highlights.
    #[wasm_bindgen(js_name = resetData)]
    pub fn reset_data(&self) -> Result<(), JsError> {
        self.inner.reset_data().map_err(js_error)
    }

    pub fn stats(&self) -> JsStats {
        self.inner.stats().into()
    }

    /// Annotations of the current document, in stored form.
    pub fn annotations(&self) -> Result<JsValue, JsError> {
        to_js(&self.inner.annotations())
    }

    /// Storage key of the current document, if one is mounted.
    #[wasm_bindgen(js_name = currentKey)]
    pub fn current_key(&self) -> Option<String> {
        self.inner.current_key()
    }
}
