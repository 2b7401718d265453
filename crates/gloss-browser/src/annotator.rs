//! The browser shell: owns the session, binds page events, applies signals.
//!
//! Session state sits behind `Rc<RefCell<..>>` shared with the event
//! listeners. Every entry point borrows it, runs one session operation,
//! collects the queued signals and releases the borrow before applying them,
//! since applying a signal dispatches page events whose handlers may call
//! straight back in.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use gloo_events::EventListener;
use gloss_core::{
    Anchor, AnchorId, AnnotationStats, DomError, GlossConfig, GlossError, HighlightColor,
    PaintReport, Session,
};
use web_sys::Node;

use crate::dom::WebDom;
use crate::events::{page_point, target_node, target_within};
use crate::index::fetch_index;
use crate::selection::{clear_selection, current_selection};
use crate::signals::{self, AFFORDANCE_CLASS};
use crate::storage::LocalStore;

pub type BrowserSession = Session<LocalStore, Node>;

struct ShellState {
    session: BrowserSession,
    dom: WebDom,
    /// Listeners of the mounted document, removed on drop.
    bindings: Vec<EventListener>,
}

#[derive(Clone)]
pub struct BrowserAnnotator {
    state: Rc<RefCell<ShellState>>,
    config: Rc<GlossConfig>,
}

struct WeakAnnotator {
    state: Weak<RefCell<ShellState>>,
    config: Rc<GlossConfig>,
}

impl WeakAnnotator {
    fn upgrade(&self) -> Option<BrowserAnnotator> {
        Some(BrowserAnnotator {
            state: self.state.upgrade()?,
            config: self.config.clone(),
        })
    }
}

impl BrowserAnnotator {
    pub fn new(config: GlossConfig) -> Result<Self, GlossError> {
        let dom = WebDom::current().ok_or(DomError::Platform("no document".into()))?;
        let storage = LocalStore::new(config.storage_key.clone());
        let session = Session::new(config.clone(), storage);
        Ok(Self {
            state: Rc::new(RefCell::new(ShellState {
                session,
                dom,
                bindings: Vec::new(),
            })),
            config: Rc::new(config),
        })
    }

    pub fn config(&self) -> &GlossConfig {
        &self.config
    }

    fn downgrade(&self) -> WeakAnnotator {
        WeakAnnotator {
            state: Rc::downgrade(&self.state),
            config: self.config.clone(),
        }
    }

    /// Run one session operation, then apply whatever it queued.
    fn with_session<R>(&self, f: impl FnOnce(&mut BrowserSession, &mut WebDom) -> R) -> R {
        let (result, queued) = {
            let mut state = self.state.borrow_mut();
            let ShellState { session, dom, .. } = &mut *state;
            let result = f(session, dom);
            (result, session.take_signals())
        };
        signals::apply(&self.config, queued);
        result
    }

    /// Start fetching the index and mount the current page.
    pub fn start(&self) -> PaintReport {
        self.spawn_index_fetch();
        self.mount()
    }

    fn spawn_index_fetch(&self) {
        let ticket = self.state.borrow_mut().session.begin_index_fetch();
        let urls = self.config.index_urls.clone();
        let weak = self.downgrade();
        wasm_bindgen_futures::spawn_local(async move {
            let index = match fetch_index(&urls).await {
                Ok(index) => index,
                Err(e) => {
                    tracing::warn!("document index unavailable, keying by path: {:?}", e);
                    return;
                }
            };
            let Some(this) = weak.upgrade() else {
                return;
            };
            let report =
                this.with_session(|session, dom| session.index_loaded(dom, ticket, index));
            if let Some(report) = report {
                tracing::debug!(painted = report.painted, "index applied to mounted document");
            }
        });
    }

    /// Mount the document currently in the window.
    pub fn mount(&self) -> PaintReport {
        let path = gloo_utils::window()
            .location()
            .pathname()
            .unwrap_or_else(|_| "/".to_string());
        let report = self.with_session(|session, dom| session.on_document_mount(dom, &path));
        self.bind();
        report
    }

    pub fn unmount(&self) {
        let queued = {
            let mut state = self.state.borrow_mut();
            state.bindings.clear();
            state.session.on_document_unmount()
        };
        signals::apply(&self.config, queued);
    }

    /// The page content was replaced in place.
    pub fn on_navigation(&self) -> PaintReport {
        self.unmount();
        self.mount()
    }

    fn bind(&self) {
        let root = {
            let mut state = self.state.borrow_mut();
            state.bindings.clear();
            state
                .session
                .mounted()
                .filter(|m| m.annotatable)
                .and_then(|m| m.controller.content_root().cloned())
        };
        let Some(root) = root else {
            return;
        };
        let document = gloo_utils::document();
        let affordance = format!(".{AFFORDANCE_CLASS}");
        let menu = self.config.menu_selector.clone();

        let weak = self.downgrade();
        let mouseup = EventListener::new(&root, "mouseup", move |event| {
            let Some(this) = weak.upgrade() else {
                return;
            };
            let snapshot = current_selection(page_point(event));
            this.with_session(|session, dom| {
                if let Err(rejection) = session.selection_finished(&*dom, snapshot) {
                    tracing::trace!(?rejection, "selection not eligible");
                }
            });
        });

        let weak = self.downgrade();
        let affordance_down = affordance.clone();
        let mousedown = EventListener::new(&document, "mousedown", move |event| {
            if target_within(event, &affordance_down) {
                return;
            }
            if let Some(this) = weak.upgrade() {
                this.with_session(|session, _| session.pointer_down());
            }
        });

        let weak = self.downgrade();
        let click = EventListener::new(&document, "click", move |event| {
            let Some(this) = weak.upgrade() else {
                return;
            };
            if target_within(event, &affordance) {
                event.stop_propagation();
                if let Err(e) = this.commit_selection(None) {
                    tracing::error!(error = %e, "failed to save highlight");
                }
                clear_selection();
                return;
            }
            let Some(target) = target_node(event) else {
                return;
            };
            let opened = this.with_session(|session, dom| session.highlight_clicked(&*dom, &target));
            if !opened && !target_within(event, &menu) {
                this.with_session(|session, _| session.outside_click());
            }
        });

        self.state.borrow_mut().bindings = vec![mouseup, mousedown, click];
        tracing::debug!("annotation listeners bound");
    }

    /// Save the pending selection as a highlight.
    pub fn commit_selection(
        &self,
        color: Option<HighlightColor>,
    ) -> Result<Option<Anchor>, GlossError> {
        self.with_session(|session, dom| session.commit_candidate(dom, color))
    }

    pub fn save_memo(&self, id: &str, memo: Option<String>) -> Result<Anchor, GlossError> {
        let id = AnchorId::from(id);
        self.with_session(|session, dom| session.save_memo_for(dom, &id, memo))
    }

    /// Delete a highlight, asking first when a confirmation is configured.
    /// Returns `false` when the user declined.
    pub fn remove_annotation(&self, id: &str) -> Result<bool, GlossError> {
        if let Some(question) = &self.config.delete_confirmation {
            let confirmed = gloo_utils::window()
                .confirm_with_message(question)
                .unwrap_or(false);
            if !confirmed {
                return Ok(false);
            }
        }
        let id = AnchorId::from(id);
        self.with_session(|session, dom| session.delete_anchor(dom, &id))?;
        Ok(true)
    }

    pub fn begin_edit(&self) -> bool {
        self.with_session(|session, _| session.begin_edit())
    }

    pub fn update_draft(&self, text: &str) -> bool {
        self.with_session(|session, _| session.update_draft(text))
    }

    pub fn cancel_edit(&self) -> bool {
        self.with_session(|session, _| session.cancel_edit())
    }

    /// Save the memo being edited in the menu.
    pub fn save_draft(&self) -> Result<Option<Anchor>, GlossError> {
        self.with_session(|session, dom| session.save_memo(dom))
    }

    pub fn close_menu(&self) {
        self.with_session(|session, _| session.close_menu());
    }

    pub fn repaint(&self) -> Result<PaintReport, GlossError> {
        self.with_session(|session, dom| session.repaint(dom))
    }

    /// Erase all stored user data.
    pub fn reset_data(&self) -> Result<(), GlossError> {
        self.with_session(|session, dom| session.reset_data(dom))
    }

    pub fn stats(&self) -> AnnotationStats {
        self.state.borrow().session.stats()
    }

    /// Anchors of the mounted document.
    pub fn annotations(&self) -> Vec<Anchor> {
        self.state.borrow().session.anchors().to_vec()
    }

    pub fn current_key(&self) -> Option<String> {
        self.state
            .borrow()
            .session
            .current_key()
            .map(|k| k.as_str().to_string())
    }
}
