//! Browser DOM layer for gloss.
//!
//! This crate binds the annotation engine in `gloss-core` to a live page.
//! It assumes a `wasm32-unknown-unknown` target environment.
//!
//! # Architecture
//!
//! - `dom`: `DomTree` over `web_sys` nodes
//! - `storage`: the user-data bundle in `localStorage`
//! - `selection`: reading and clearing the window selection
//! - `index`: fetching the document index
//! - `events`: event target and pointer helpers
//! - `signals`: turning controller signals into page effects
//! - `annotator`: the shell tying the above to a `Session`
//!
//! # Re-exports
//!
//! This crate re-exports `gloss-core` for convenience, so consumers
//! only need to depend on `gloss-browser`.

// Re-export core crate
pub use gloss_core;
pub use gloss_core::*;

pub mod annotator;
pub mod dom;
pub mod events;
pub mod index;
pub mod selection;
pub mod signals;
pub mod storage;

pub use annotator::{BrowserAnnotator, BrowserSession};
pub use dom::WebDom;
pub use storage::LocalStore;
