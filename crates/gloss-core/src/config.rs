use serde::{Deserialize, Serialize};

use crate::anchor::HighlightColor;
use crate::error::GlossError;

/// Annotator configuration.
///
/// Every field has a default matching the generated site's markup, so an
/// empty JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlossConfig {
    /// Class of the element holding the rendered document.
    pub content_root_class: String,
    /// Tags that count as a block an anchor can be scoped to.
    pub block_tags: Vec<String>,
    /// Element used as the highlight marker.
    pub marker_tag: String,
    pub highlight_class: String,
    pub memo_class: String,
    /// Attribute carrying the anchor id on markers.
    pub id_attribute: String,
    pub color_attribute: String,
    /// localStorage key of the user data bundle.
    pub storage_key: String,
    /// Path suffixes of pages that never get annotation UI.
    pub system_paths: Vec<String>,
    /// Deployment prefixes that are the site root.
    pub base_paths: Vec<String>,
    /// Candidate URLs of the document index, tried in order.
    pub index_urls: Vec<String>,
    pub default_color: HighlightColor,
    /// The contextual menu opens this many pixels above the clicked marker.
    pub menu_offset_y: f64,
    /// The selection affordance sits this many pixels above the pointer.
    pub affordance_offset_y: f64,
    pub cross_block_notice: String,
    pub affordance_label: String,
    /// Selector of the contextual menu markup. Clicks inside it do not count
    /// as outside clicks.
    pub menu_selector: String,
    /// Asked before a highlight is deleted. `None` deletes without asking.
    pub delete_confirmation: Option<String>,
}

impl Default for GlossConfig {
    fn default() -> Self {
        Self {
            content_root_class: "md-content".to_owned(),
            block_tags: ["p", "li", "h1", "h2", "h3", "h4", "h5", "h6", "td", "th", "div"]
                .into_iter()
                .map(String::from)
                .collect(),
            marker_tag: "span".to_owned(),
            highlight_class: "db-highlight".to_owned(),
            memo_class: "db-has-memo".to_owned(),
            id_attribute: "data-id".to_owned(),
            color_attribute: "data-color".to_owned(),
            storage_key: "db_user_data_v1".to_owned(),
            system_paths: ["/card_view/", "/list_view/", "/user/"]
                .into_iter()
                .map(String::from)
                .collect(),
            base_paths: Vec::new(),
            index_urls: [
                "/assets/dharma_index.json",
                "../assets/dharma_index.json",
                "../../assets/dharma_index.json",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            default_color: HighlightColor::Yellow,
            menu_offset_y: 50.0,
            affordance_offset_y: 30.0,
            cross_block_notice: "Only selections within a single paragraph are supported."
                .to_owned(),
            affordance_label: "Highlight".to_owned(),
            menu_selector: ".db-floating-menu".to_owned(),
            delete_confirmation: Some("Delete this highlight?".to_owned()),
        }
    }
}

impl GlossConfig {
    pub fn from_json(raw: &str) -> Result<Self, GlossError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn is_block_tag(&self, tag: &str) -> bool {
        self.block_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Whether a normalized path is one of the configured system pages.
    pub fn is_system_path(&self, path: &str) -> bool {
        self.system_paths.iter().any(|p| path.ends_with(p.as_str()))
    }
}
