//! gloss-core: personal highlights and memos over rendered documents.
//!
//! This crate provides:
//! - `DomTree` trait for the document surface, with `MemDom` as an
//!   in-memory implementation
//! - Document identity resolution against the site's document index
//! - Block locators and UTF-16 flattened-text addressing
//! - Selection validation, anchor building and the repaint engine
//! - `AnnotationStore` over a pluggable `Storage`
//! - `Controller` and `Session` for interaction state and document lifecycle

pub mod anchor;
pub mod builder;
pub mod config;
pub mod controller;
pub mod dom;
pub mod error;
pub mod identity;
pub mod locator;
pub mod memdom;
pub mod paint;
pub mod session;
pub mod store;
pub mod text;
pub mod validate;

pub use anchor::{Anchor, AnchorId, HighlightColor};
pub use builder::{build, enclosing_block};
pub use config::GlossConfig;
pub use controller::{Controller, MenuState, SelectionPhase, UiSignal};
pub use dom::{DomPoint, DomRange, DomTree, NodeKind, Point, Rect};
pub use error::{BuildError, DomError, GlossError, LocatorParseError, StorageError};
pub use identity::{
    DocumentDescriptor, DocumentIndex, DocumentKey, DocumentMetadata, FetchTicket, IndexSlot,
    normalize_path,
};
pub use locator::BlockLocator;
pub use memdom::{MemDom, NodeId};
pub use paint::{
    PaintOutcome, PaintReport, marker_at, markers_for, paint_all, paint_anchor, sync_memo_class,
    unpaint,
};
pub use session::{DocumentContext, MountedDocument, Session};
pub use smol_str::SmolStr;
pub use store::{AnnotationStats, AnnotationStore, MemoryStorage, Storage, UserData};
pub use validate::{Candidate, Rejection, SelectionSnapshot, validate};
