//! Types exposed to JavaScript via wasm-bindgen.

use gloss_core::{AnnotationStats, PaintReport};
use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

/// Highlight and memo counts for the current document.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct JsStats {
    pub highlights: u32,
    pub memos: u32,
}

impl From<AnnotationStats> for JsStats {
    fn from(stats: AnnotationStats) -> Self {
        Self {
            highlights: stats.highlights as u32,
            memos: stats.memos as u32,
        }
    }
}

/// Outcome counts of a paint pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct JsPaintReport {
    pub painted: u32,
    pub already_painted: u32,
    pub orphaned: u32,
    /// Anchors whose stored text no longer matches the page.
    pub mismatched: u32,
    pub unmappable: u32,
    pub failed: u32,
}

impl From<PaintReport> for JsPaintReport {
    fn from(report: PaintReport) -> Self {
        Self {
            painted: report.painted as u32,
            already_painted: report.already_painted as u32,
            orphaned: report.orphaned as u32,
            mismatched: report.mismatched as u32,
            unmappable: report.unmappable as u32,
            failed: report.failed as u32,
        }
    }
}
