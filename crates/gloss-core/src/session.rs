//! Document lifecycle.
//!
//! A [`Session`] lives as long as the page script. The shell calls
//! [`Session::on_document_mount`] whenever a document is rendered (first
//! load and every in-place navigation) and [`Session::on_document_unmount`]
//! before it goes away. Everything that depends on the current document (its
//! key, whether it takes annotations, the interaction controller) lives in
//! the mounted state and is dropped wholesale on unmount.

use crate::anchor::{Anchor, AnchorId, HighlightColor};
use crate::config::GlossConfig;
use crate::controller::{Controller, UiSignal};
use crate::dom::DomTree;
use crate::error::GlossError;
use crate::identity::{DocumentIndex, DocumentKey, FetchTicket, IndexSlot, normalize_path, resolve_with};
use crate::paint::{PaintReport, paint_all, unpaint};
use crate::store::{AnnotationStats, AnnotationStore, Storage};
use crate::validate::{Rejection, SelectionSnapshot};

/// What one document's operations run against.
pub struct DocumentContext<'a, S> {
    pub key: &'a DocumentKey,
    /// `false` on system pages.
    pub annotatable: bool,
    pub config: &'a GlossConfig,
    pub store: &'a mut AnnotationStore<S>,
}

#[derive(Debug)]
pub struct MountedDocument<N> {
    /// Normalized observed path.
    pub path: String,
    pub key: DocumentKey,
    pub annotatable: bool,
    pub controller: Controller<N>,
}

pub struct Session<S, N> {
    config: GlossConfig,
    store: AnnotationStore<S>,
    index: IndexSlot,
    mounted: Option<MountedDocument<N>>,
}

fn is_annotatable(
    config: &GlossConfig,
    index: Option<&DocumentIndex>,
    path: &str,
    key: &DocumentKey,
) -> bool {
    !config.is_system_path(path) && !index.is_some_and(|i| i.is_system(key))
}

impl<S, N> Session<S, N>
where
    S: Storage,
    N: Clone + PartialEq + std::fmt::Debug,
{
    pub fn new(config: GlossConfig, storage: S) -> Self {
        Self {
            config,
            store: AnnotationStore::open(storage),
            index: IndexSlot::new(),
            mounted: None,
        }
    }

    pub fn config(&self) -> &GlossConfig {
        &self.config
    }

    pub fn store(&self) -> &AnnotationStore<S> {
        &self.store
    }

    pub fn index(&self) -> Option<&DocumentIndex> {
        self.index.get()
    }

    pub fn mounted(&self) -> Option<&MountedDocument<N>> {
        self.mounted.as_ref()
    }

    pub fn current_key(&self) -> Option<&DocumentKey> {
        self.mounted.as_ref().map(|m| &m.key)
    }

    /// Anchors of the mounted document.
    pub fn anchors(&self) -> &[Anchor] {
        match &self.mounted {
            Some(m) => self.store.anchors(&m.key),
            None => &[],
        }
    }

    pub fn stats(&self) -> AnnotationStats {
        self.mounted
            .as_ref()
            .map(|m| self.store.stats(&m.key))
            .unwrap_or_default()
    }

    pub fn begin_index_fetch(&mut self) -> FetchTicket {
        self.index.begin_fetch()
    }

    /// Install a fetched index. When a document is mounted and its key
    /// changes, its markers are moved over to the anchors of the new key.
    pub fn index_loaded<D>(
        &mut self,
        dom: &mut D,
        ticket: FetchTicket,
        index: DocumentIndex,
    ) -> Option<PaintReport>
    where
        D: DomTree<Node = N> + ?Sized,
    {
        let index = index.with_base_paths(self.config.base_paths.iter().cloned());
        if !self.index.complete(ticket, index) {
            return None;
        }

        let mounted = self.mounted.as_mut()?;
        let key = resolve_with(self.index.get(), &mounted.path);
        let annotatable = is_annotatable(&self.config, self.index.get(), &mounted.path, &key);
        if key == mounted.key && annotatable == mounted.annotatable {
            return Some(PaintReport::default());
        }
        tracing::debug!(from = %mounted.key, to = %key, annotatable, "document re-keyed");

        let root = mounted.controller.content_root().cloned();
        if let Some(root) = &root {
            for anchor in self.store.anchors(&mounted.key) {
                if let Err(e) = unpaint(dom, &self.config, root, &anchor.id) {
                    tracing::warn!(id = %anchor.id, error = %e, "failed to remove marker");
                }
            }
        }
        mounted.controller.teardown();
        mounted.key = key;
        mounted.annotatable = annotatable;

        let report = match (&root, annotatable) {
            (Some(root), true) => {
                paint_all(dom, &self.config, root, self.store.anchors(&mounted.key))
            }
            _ => PaintReport::default(),
        };
        mounted
            .controller
            .emit(UiSignal::StatsChanged(self.store.stats(&mounted.key)));
        Some(report)
    }

    /// Bind to a freshly rendered document and paint its annotations.
    pub fn on_document_mount<D>(&mut self, dom: &mut D, observed_path: &str) -> PaintReport
    where
        D: DomTree<Node = N> + ?Sized,
    {
        let leftover = self.on_document_unmount();

        let path = normalize_path(observed_path);
        let key = resolve_with(self.index.get(), &path);
        let annotatable = is_annotatable(&self.config, self.index.get(), &path, &key);
        let root = dom.first_by_class(&self.config.content_root_class);
        if root.is_none() {
            tracing::debug!(class = %self.config.content_root_class, "no content root on page");
        }

        // Another tab may have written since the last document.
        self.store.reload();

        let mut controller = Controller::new(root.clone());
        for signal in leftover {
            controller.emit(signal);
        }

        let report = match (&root, annotatable) {
            (Some(root), true) => paint_all(dom, &self.config, root, self.store.anchors(&key)),
            _ => PaintReport::default(),
        };
        if annotatable {
            controller.emit(UiSignal::StatsChanged(self.store.stats(&key)));
        }

        tracing::debug!(
            path,
            key = %key,
            annotatable,
            painted = report.painted,
            skipped = report.skipped(),
            "document mounted"
        );
        self.mounted = Some(MountedDocument {
            path,
            key,
            annotatable,
            controller,
        });
        report
    }

    /// Release the mounted document. Returns the signals the shell still has
    /// to apply (closing any open menu or affordance).
    pub fn on_document_unmount(&mut self) -> Vec<UiSignal> {
        let Some(mut mounted) = self.mounted.take() else {
            return Vec::new();
        };
        mounted.controller.teardown();
        tracing::debug!(key = %mounted.key, "document unmounted");
        mounted.controller.take_signals()
    }

    /// Paint the mounted document again. Already painted anchors are left alone.
    pub fn repaint<D>(&mut self, dom: &mut D) -> Result<PaintReport, GlossError>
    where
        D: DomTree<Node = N> + ?Sized,
    {
        let mounted = self.mounted.as_ref().ok_or(GlossError::NotMounted)?;
        if !mounted.annotatable {
            return Ok(PaintReport::default());
        }
        let root = mounted
            .controller
            .content_root()
            .ok_or(GlossError::NotMounted)?;
        Ok(paint_all(dom, &self.config, root, self.store.anchors(&mounted.key)))
    }

    /// Wipe all user data and the markers of the mounted document.
    pub fn reset_data<D>(&mut self, dom: &mut D) -> Result<(), GlossError>
    where
        D: DomTree<Node = N> + ?Sized,
    {
        if let Some(mounted) = self.mounted.as_mut() {
            if let Some(root) = mounted.controller.content_root().cloned() {
                for anchor in self.store.anchors(&mounted.key) {
                    unpaint(dom, &self.config, &root, &anchor.id)?;
                }
            }
            mounted.controller.teardown();
        }
        self.store.reset()?;
        if let Some(mounted) = self.mounted.as_mut() {
            mounted
                .controller
                .emit(UiSignal::StatsChanged(AnnotationStats::default()));
        }
        Ok(())
    }

    fn context(&mut self) -> Result<(&mut Controller<N>, DocumentContext<'_, S>), GlossError> {
        let mounted = self.mounted.as_mut().ok_or(GlossError::NotMounted)?;
        Ok((
            &mut mounted.controller,
            DocumentContext {
                key: &mounted.key,
                annotatable: mounted.annotatable,
                config: &self.config,
                store: &mut self.store,
            },
        ))
    }

    pub fn take_signals(&mut self) -> Vec<UiSignal> {
        self.mounted
            .as_mut()
            .map(|m| m.controller.take_signals())
            .unwrap_or_default()
    }

    pub fn pointer_down(&mut self) {
        if let Some(m) = self.mounted.as_mut() {
            m.controller.pointer_down();
        }
    }

    pub fn selection_finished<D>(
        &mut self,
        dom: &D,
        selection: Option<SelectionSnapshot<N>>,
    ) -> Result<(), Rejection>
    where
        D: DomTree<Node = N> + ?Sized,
    {
        let Ok((controller, ctx)) = self.context() else {
            return Err(Rejection::OutsideContent);
        };
        controller.selection_finished(dom, &ctx, selection)
    }

    pub fn commit_candidate<D>(
        &mut self,
        dom: &mut D,
        color: Option<HighlightColor>,
    ) -> Result<Option<Anchor>, GlossError>
    where
        D: DomTree<Node = N> + ?Sized,
    {
        let (controller, mut ctx) = self.context()?;
        controller.commit_candidate(dom, &mut ctx, color)
    }

    pub fn dismiss_candidate(&mut self) {
        if let Some(m) = self.mounted.as_mut() {
            m.controller.dismiss_candidate();
        }
    }

    pub fn highlight_clicked<D>(&mut self, dom: &D, target: &N) -> bool
    where
        D: DomTree<Node = N> + ?Sized,
    {
        match self.context() {
            Ok((controller, ctx)) => controller.highlight_clicked(dom, &ctx, target),
            Err(_) => false,
        }
    }

    pub fn begin_edit(&mut self) -> bool {
        match self.context() {
            Ok((controller, ctx)) => controller.begin_edit(&ctx),
            Err(_) => false,
        }
    }

    pub fn update_draft(&mut self, text: &str) -> bool {
        self.mounted
            .as_mut()
            .is_some_and(|m| m.controller.update_draft(text))
    }

    pub fn cancel_edit(&mut self) -> bool {
        self.mounted
            .as_mut()
            .is_some_and(|m| m.controller.cancel_edit())
    }

    pub fn save_memo<D>(&mut self, dom: &mut D) -> Result<Option<Anchor>, GlossError>
    where
        D: DomTree<Node = N> + ?Sized,
    {
        let (controller, mut ctx) = self.context()?;
        controller.save_memo(dom, &mut ctx)
    }

    pub fn save_memo_for<D>(
        &mut self,
        dom: &mut D,
        anchor_id: &AnchorId,
        memo: Option<String>,
    ) -> Result<Anchor, GlossError>
    where
        D: DomTree<Node = N> + ?Sized,
    {
        let (controller, mut ctx) = self.context()?;
        controller.save_memo_for(dom, &mut ctx, anchor_id, memo)
    }

    pub fn delete_anchor<D>(&mut self, dom: &mut D, anchor_id: &AnchorId) -> Result<Anchor, GlossError>
    where
        D: DomTree<Node = N> + ?Sized,
    {
        let (controller, mut ctx) = self.context()?;
        controller.delete_anchor(dom, &mut ctx, anchor_id)
    }

    pub fn close_menu(&mut self) {
        if let Some(m) = self.mounted.as_mut() {
            m.controller.close_menu();
        }
    }

    pub fn outside_click(&mut self) {
        if let Some(m) = self.mounted.as_mut() {
            m.controller.outside_click();
        }
    }
}
