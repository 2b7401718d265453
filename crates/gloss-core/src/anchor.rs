//! The anchor model: a persisted, block-scoped highlight.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, ToSmolStr};

use crate::locator::BlockLocator;
use crate::text::utf16_len;

/// Opaque anchor handle. New anchors get a UUID v4; ids read from storage are
/// kept verbatim whatever their shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorId(SmolStr);

impl AnchorId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_smolstr())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnchorId {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<String> for AnchorId {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

/// Highlight color tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HighlightColor {
    #[default]
    Yellow,
    Green,
    Blue,
    Pink,
    Purple,
    /// Any other tag found in storage, preserved as-is.
    Other(SmolStr),
}

impl HighlightColor {
    pub fn as_str(&self) -> &str {
        match self {
            HighlightColor::Yellow => "yellow",
            HighlightColor::Green => "green",
            HighlightColor::Blue => "blue",
            HighlightColor::Pink => "pink",
            HighlightColor::Purple => "purple",
            HighlightColor::Other(s) => s,
        }
    }
}

impl From<String> for HighlightColor {
    fn from(s: String) -> Self {
        match s.as_str() {
            "yellow" => HighlightColor::Yellow,
            "green" => HighlightColor::Green,
            "blue" => HighlightColor::Blue,
            "pink" => HighlightColor::Pink,
            "purple" => HighlightColor::Purple,
            _ => HighlightColor::Other(s.into()),
        }
    }
}

impl From<HighlightColor> for String {
    fn from(color: HighlightColor) -> Self {
        color.as_str().to_string()
    }
}

/// A persisted highlight.
///
/// Field names on the wire match the bundle format the site has always
/// written (`selector`, `startOffset`, `created_at`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    pub id: AnchorId,
    #[serde(rename = "selector")]
    pub locator: BlockLocator,
    /// UTF-16 offset into the block's flattened text.
    pub start_offset: usize,
    pub end_offset: usize,
    /// Exact flattened text between the offsets at creation time.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default)]
    pub color: HighlightColor,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "created_at", default)]
    pub created_at: i64,
}

impl Anchor {
    /// New anchor with a fresh id. `end_offset` is derived from `text`.
    pub fn new(
        locator: BlockLocator,
        start_offset: usize,
        text: impl Into<String>,
        color: HighlightColor,
    ) -> Self {
        let text = text.into();
        Self {
            id: AnchorId::generate(),
            locator,
            start_offset,
            end_offset: start_offset + utf16_len(&text),
            text,
            memo: None,
            color,
            created_at: now_millis(),
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start_offset..self.end_offset
    }

    /// Memo with visible content. Whitespace-only memos count as none.
    pub fn memo_text(&self) -> Option<&str> {
        self.memo.as_deref().filter(|m| !m.trim().is_empty())
    }

    pub fn has_memo(&self) -> bool {
        self.memo_text().is_some()
    }

    /// Offsets agree with the stored text.
    pub fn is_consistent(&self) -> bool {
        self.end_offset > self.start_offset
            && self.end_offset - self.start_offset == utf16_len(&self.text)
    }

    /// Same block and intersecting offset ranges.
    pub fn overlaps(&self, locator: &BlockLocator, range: &Range<usize>) -> bool {
        &self.locator == locator
            && self.start_offset < range.end
            && range.start < self.end_offset
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
