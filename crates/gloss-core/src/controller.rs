//! Interaction state machine for one mounted document.
//!
//! The controller never touches platform UI. It records state transitions and
//! queues [`UiSignal`]s, which the shell drains with
//! [`Controller::take_signals`] and turns into buttons, menus and notices.

use std::mem;

use crate::anchor::{Anchor, AnchorId, HighlightColor};
use crate::builder::build;
use crate::dom::{DomTree, Point};
use crate::error::{BuildError, GlossError};
use crate::paint::{PaintOutcome, marker_at, paint_anchor, sync_memo_class, unpaint};
use crate::session::DocumentContext;
use crate::store::{AnnotationStats, Storage};
use crate::validate::{Candidate, Rejection, SelectionSnapshot, validate};

/// Where the user is in making a highlight.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SelectionPhase<N> {
    #[default]
    Idle,
    /// Pointer is down, a selection may be forming.
    Selecting,
    /// A valid selection is waiting for confirmation.
    Candidate(Candidate<N>),
    /// The last candidate became this anchor.
    Committed(AnchorId),
}

/// Contextual menu for an existing highlight. Only one is ever open.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MenuState {
    #[default]
    Closed,
    Viewing {
        anchor_id: AnchorId,
        position: Point,
    },
    Editing {
        anchor_id: AnchorId,
        draft: String,
        position: Point,
    },
}

impl MenuState {
    pub fn anchor_id(&self) -> Option<&AnchorId> {
        match self {
            MenuState::Closed => None,
            MenuState::Viewing { anchor_id, .. } | MenuState::Editing { anchor_id, .. } => {
                Some(anchor_id)
            }
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, MenuState::Closed)
    }
}

/// Instructions for the UI shell.
#[derive(Debug, Clone, PartialEq)]
pub enum UiSignal {
    /// Show the "highlight" affordance at a viewport position.
    ShowAffordance { position: Point },
    HideAffordance,
    OpenMenu {
        anchor_id: AnchorId,
        memo: Option<String>,
        position: Point,
    },
    CloseMenu,
    /// A message the user should see.
    Notice(String),
    StatsChanged(AnnotationStats),
}

#[derive(Debug)]
pub struct Controller<N> {
    content_root: Option<N>,
    selection: SelectionPhase<N>,
    menu: MenuState,
    outbox: Vec<UiSignal>,
}

impl<N: Clone + PartialEq + std::fmt::Debug> Controller<N> {
    pub fn new(content_root: Option<N>) -> Self {
        Self {
            content_root,
            selection: SelectionPhase::Idle,
            menu: MenuState::Closed,
            outbox: Vec::new(),
        }
    }

    pub fn content_root(&self) -> Option<&N> {
        self.content_root.as_ref()
    }

    pub fn selection(&self) -> &SelectionPhase<N> {
        &self.selection
    }

    pub fn menu(&self) -> &MenuState {
        &self.menu
    }

    /// Drain queued UI signals.
    pub fn take_signals(&mut self) -> Vec<UiSignal> {
        mem::take(&mut self.outbox)
    }

    pub(crate) fn emit(&mut self, signal: UiSignal) {
        self.outbox.push(signal);
    }

    fn root(&self) -> Result<N, GlossError> {
        self.content_root.clone().ok_or(GlossError::NotMounted)
    }

    fn clear_candidate(&mut self) {
        if matches!(self.selection, SelectionPhase::Candidate(_)) {
            self.emit(UiSignal::HideAffordance);
        }
    }

    pub fn pointer_down(&mut self) {
        self.clear_candidate();
        self.selection = SelectionPhase::Selecting;
    }

    /// The user released the pointer. `selection` is `None` when the platform
    /// has no selection at all.
    pub fn selection_finished<D, S>(
        &mut self,
        dom: &D,
        ctx: &DocumentContext<'_, S>,
        selection: Option<SelectionSnapshot<N>>,
    ) -> Result<(), Rejection>
    where
        D: DomTree<Node = N> + ?Sized,
        S: Storage,
    {
        self.clear_candidate();
        match self.check_selection(dom, ctx, selection) {
            Ok(candidate) => {
                let position = Point::new(
                    candidate.position.x,
                    candidate.position.y - ctx.config.affordance_offset_y,
                );
                self.emit(UiSignal::ShowAffordance { position });
                self.selection = SelectionPhase::Candidate(candidate);
                Ok(())
            }
            Err(rejection) => {
                tracing::trace!(?rejection, "selection rejected");
                self.selection = SelectionPhase::Idle;
                Err(rejection)
            }
        }
    }

    fn check_selection<D, S>(
        &self,
        dom: &D,
        ctx: &DocumentContext<'_, S>,
        selection: Option<SelectionSnapshot<N>>,
    ) -> Result<Candidate<N>, Rejection>
    where
        D: DomTree<Node = N> + ?Sized,
        S: Storage,
    {
        if !ctx.annotatable {
            return Err(Rejection::SystemPage);
        }
        let selection = selection.ok_or(Rejection::Collapsed)?;
        let root = self.content_root.as_ref().ok_or(Rejection::OutsideContent)?;
        validate(dom, ctx.config, root, &selection, ctx.store.anchors(ctx.key))
    }

    /// Turn the pending candidate into a stored, painted anchor.
    ///
    /// Returns `Ok(None)` when there was no candidate or the selection could
    /// not be anchored; a cross-block selection also queues a notice.
    pub fn commit_candidate<D, S>(
        &mut self,
        dom: &mut D,
        ctx: &mut DocumentContext<'_, S>,
        color: Option<HighlightColor>,
    ) -> Result<Option<Anchor>, GlossError>
    where
        D: DomTree<Node = N> + ?Sized,
        S: Storage,
    {
        let SelectionPhase::Candidate(candidate) =
            mem::replace(&mut self.selection, SelectionPhase::Idle)
        else {
            return Ok(None);
        };
        self.emit(UiSignal::HideAffordance);
        let root = self.root()?;

        let color = color.unwrap_or_else(|| ctx.config.default_color.clone());
        let anchor = match build(dom, ctx.config, &root, &candidate.range, color) {
            Ok(anchor) => anchor,
            Err(BuildError::CrossBlock) => {
                self.emit(UiSignal::Notice(ctx.config.cross_block_notice.clone()));
                return Ok(None);
            }
            Err(e) => {
                tracing::debug!(error = %e, "selection could not be anchored");
                return Ok(None);
            }
        };

        ctx.store.insert(ctx.key, anchor.clone())?;
        match paint_anchor(dom, ctx.config, &root, &anchor)? {
            PaintOutcome::Painted { .. } => {}
            other => tracing::warn!(id = %anchor.id, ?other, "new annotation did not paint"),
        }

        self.selection = SelectionPhase::Committed(anchor.id.clone());
        self.emit(UiSignal::StatsChanged(ctx.store.stats(ctx.key)));
        Ok(Some(anchor))
    }

    pub fn dismiss_candidate(&mut self) {
        self.clear_candidate();
        self.selection = SelectionPhase::Idle;
    }

    /// A click landed on `target`. Opens the menu when it is inside a marker.
    pub fn highlight_clicked<D, S>(
        &mut self,
        dom: &D,
        ctx: &DocumentContext<'_, S>,
        target: &N,
    ) -> bool
    where
        D: DomTree<Node = N> + ?Sized,
        S: Storage,
    {
        let Some(root) = self.content_root.as_ref() else {
            return false;
        };
        let Some((marker, anchor_id)) = marker_at(dom, ctx.config, root, target) else {
            return false;
        };
        let rect = dom.bounding_rect(&marker).unwrap_or_default();
        let position = Point::new(rect.x + rect.width / 2.0, rect.y - ctx.config.menu_offset_y);
        let memo = ctx
            .store
            .get(ctx.key, &anchor_id)
            .and_then(|a| a.memo.clone());

        tracing::debug!(id = %anchor_id, "highlight clicked");
        self.emit(UiSignal::OpenMenu {
            anchor_id: anchor_id.clone(),
            memo,
            position,
        });
        self.menu = MenuState::Viewing {
            anchor_id,
            position,
        };
        true
    }

    /// Switch the open menu to memo editing, seeded with the stored memo.
    pub fn begin_edit<S: Storage>(&mut self, ctx: &DocumentContext<'_, S>) -> bool {
        let MenuState::Viewing {
            anchor_id,
            position,
        } = &self.menu
        else {
            return false;
        };
        let draft = ctx
            .store
            .get(ctx.key, anchor_id)
            .and_then(|a| a.memo.clone())
            .unwrap_or_default();
        self.menu = MenuState::Editing {
            anchor_id: anchor_id.clone(),
            draft,
            position: *position,
        };
        true
    }

    pub fn update_draft(&mut self, text: &str) -> bool {
        match &mut self.menu {
            MenuState::Editing { draft, .. } => {
                text.clone_into(draft);
                true
            }
            _ => false,
        }
    }

    pub fn cancel_edit(&mut self) -> bool {
        let MenuState::Editing {
            anchor_id,
            position,
            ..
        } = &self.menu
        else {
            return false;
        };
        self.menu = MenuState::Viewing {
            anchor_id: anchor_id.clone(),
            position: *position,
        };
        true
    }

    /// Save the draft of the memo being edited.
    pub fn save_memo<D, S>(
        &mut self,
        dom: &mut D,
        ctx: &mut DocumentContext<'_, S>,
    ) -> Result<Option<Anchor>, GlossError>
    where
        D: DomTree<Node = N> + ?Sized,
        S: Storage,
    {
        let MenuState::Editing {
            anchor_id, draft, ..
        } = &self.menu
        else {
            return Ok(None);
        };
        let (anchor_id, draft) = (anchor_id.clone(), draft.clone());
        self.save_memo_for(dom, ctx, &anchor_id, Some(draft)).map(Some)
    }

    /// Set or clear the memo of `anchor_id`, updating its markers in place.
    pub fn save_memo_for<D, S>(
        &mut self,
        dom: &mut D,
        ctx: &mut DocumentContext<'_, S>,
        anchor_id: &AnchorId,
        memo: Option<String>,
    ) -> Result<Anchor, GlossError>
    where
        D: DomTree<Node = N> + ?Sized,
        S: Storage,
    {
        let anchor = ctx.store.set_memo(ctx.key, anchor_id, memo)?;
        if let Some(root) = &self.content_root {
            sync_memo_class(dom, ctx.config, root, anchor_id, anchor.has_memo())?;
        }
        if self.menu.anchor_id() == Some(anchor_id) {
            self.close_menu();
        }
        self.emit(UiSignal::StatsChanged(ctx.store.stats(ctx.key)));
        Ok(anchor)
    }

    /// Remove `anchor_id` from storage and from the document.
    pub fn delete_anchor<D, S>(
        &mut self,
        dom: &mut D,
        ctx: &mut DocumentContext<'_, S>,
        anchor_id: &AnchorId,
    ) -> Result<Anchor, GlossError>
    where
        D: DomTree<Node = N> + ?Sized,
        S: Storage,
    {
        let removed = ctx.store.remove(ctx.key, anchor_id)?;
        if let Some(root) = &self.content_root {
            unpaint(dom, ctx.config, root, anchor_id)?;
        }
        if self.menu.anchor_id() == Some(anchor_id) {
            self.close_menu();
        }
        if self.selection == SelectionPhase::Committed(anchor_id.clone()) {
            self.selection = SelectionPhase::Idle;
        }
        self.emit(UiSignal::StatsChanged(ctx.store.stats(ctx.key)));
        Ok(removed)
    }

    pub fn close_menu(&mut self) {
        if self.menu.is_open() {
            self.menu = MenuState::Closed;
            self.emit(UiSignal::CloseMenu);
        }
    }

    /// A click outside any marker or menu.
    pub fn outside_click(&mut self) {
        self.close_menu();
    }

    /// Close everything before the document goes away.
    pub fn teardown(&mut self) {
        self.clear_candidate();
        self.close_menu();
        self.selection = SelectionPhase::Idle;
    }
}
