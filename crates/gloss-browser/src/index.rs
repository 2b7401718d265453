//! Fetching the document index.

use gloss_core::DocumentIndex;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

async fn fetch_text(url: &str) -> Result<String, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let response: Response = JsFuture::from(window.fetch_with_str(url))
        .await?
        .dyn_into()?;
    if !response.ok() {
        return Err(JsValue::from_str(&format!("HTTP {}", response.status())));
    }
    let body = JsFuture::from(response.text()?).await?;
    body.as_string()
        .ok_or_else(|| JsValue::from_str("response body is not text"))
}

/// Fetch and parse the index from the first candidate URL that answers.
///
/// Sites are deployed both at the domain root and under a prefix, so the
/// index is tried at several locations in order.
pub async fn fetch_index(urls: &[String]) -> Result<DocumentIndex, JsValue> {
    for url in urls {
        let raw = match fetch_text(url).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(url = %url, "index candidate failed: {:?}", e);
                continue;
            }
        };
        match DocumentIndex::from_json(&raw) {
            Ok(index) => {
                tracing::debug!(url = %url, entries = index.len(), "document index fetched");
                return Ok(index);
            }
            Err(e) => tracing::warn!(url = %url, error = %e, "document index is malformed"),
        }
    }
    Err(JsValue::from_str("no document index candidate could be loaded"))
}
