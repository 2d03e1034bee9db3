//! Editor session: one open page design.
//!
//! The session owns the Tree Store, selection, history and canvas state and
//! is the only place that sequences them. Every content mutation:
//!
//! 1. snapshots the tree,
//! 2. runs the Tree Store operation (errors leave everything untouched),
//! 3. records the snapshot in history,
//! 4. prunes selection of removed ids,
//! 5. bumps the change revision observed by auto-save.
//!
//! Selection and canvas changes bump the revision too, but never create
//! undo steps.

use crate::canvas::CanvasState;
use crate::config::EditorConfig;
use crate::history::History;
use crate::selection::{DragState, SelectionRect, SelectionState};
use crate::shortcuts::ShortcutAction;
use chrono::Utc;
use pd_core::{
    ComponentId, ComponentPatch, ComponentRecord, ComponentTree, ComponentType, LintDiagnostic,
    LintSeverity, PageDesign, SerializationWarning, SerializeError, Serialized, TreeError, TreeResult, TreeStore,
    export_page, from_document, import_page, lint_tree, to_document,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// A session shared between the host UI and the auto-save task. Never hold
/// the guard across an `.await`.
pub type SharedSession = Arc<Mutex<EditorSession>>;

/// Lock a shared session, recovering from a panic in another holder.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, EditorSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a dispatched shortcut did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShortcutOutcome {
    /// Component content changed (an undo step may have been recorded).
    pub content_changed: bool,
    /// The user asked for an explicit save; the host forwards this to
    /// `AutoSave::save`.
    pub save_requested: bool,
}

pub struct EditorSession {
    /// Page metadata. `version` is the last persisted version; the live
    /// content is in `store`, not in `page.component_tree`.
    page: PageDesign,
    store: TreeStore,
    selection: SelectionState,
    history: History,
    canvas: CanvasState,
    config: EditorConfig,
    /// Newest record written (or loaded) for every id ever persisted.
    /// Entries outlive deletes so a restored node never goes back a version.
    persisted: HashMap<ComponentId, ComponentRecord>,
    /// Bumped on every content change, including undo/redo.
    edits: u64,
    changes: watch::Sender<u64>,
}

impl EditorSession {
    /// Fresh session for a page design that has never been saved.
    pub fn init(page_design_id: &str, config: EditorConfig) -> Self {
        let mut page = PageDesign::new(page_design_id, "");
        page.component_tree.page_design_id = page_design_id.to_string();
        Self::build(page, ComponentTree::new(page_design_id), config)
    }

    /// Open a loaded page design. Integrity problems in the stored tree are
    /// logged and tolerated.
    pub fn from_page(page: PageDesign, config: EditorConfig) -> Self {
        let mut tree = from_document(&page.component_tree);
        if tree.page_design_id.is_empty() {
            tree.page_design_id = page.id.clone();
        }
        if tree.root_id.is_none() {
            tree.root_id = page.root_component_id;
        }
        for diag in lint_tree(&tree, config.max_tree_depth) {
            match diag.severity {
                LintSeverity::Warning => {
                    log::warn!("{} [{}]: {}", diag.component_id, diag.rule, diag.message)
                }
                LintSeverity::Info => {
                    log::info!("{} [{}]: {}", diag.component_id, diag.rule, diag.message)
                }
            }
        }
        Self::build(page, tree, config)
    }

    fn build(page: PageDesign, tree: ComponentTree, config: EditorConfig) -> Self {
        let store = TreeStore::from_tree(tree, Arc::new(pd_core::BuiltinRegistry))
            .with_max_depth(config.max_tree_depth);
        let (changes, _) = watch::channel(0);
        log::debug!("opened page design {} ({} components)", page.id, store.len());
        let persisted = page
            .component_tree
            .components
            .iter()
            .map(|(id, record)| (*id, record.clone()))
            .collect();
        Self {
            page,
            store,
            selection: SelectionState::new(),
            history: History::new(config.history_depth()),
            canvas: CanvasState::default(),
            config,
            persisted,
            edits: 0,
            changes,
        }
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    /// Tear down per-session state. Subscribers see one final change.
    pub fn dispose(&mut self) {
        self.history.clear();
        self.selection = SelectionState::new();
        self.canvas = CanvasState::default();
        self.notify();
        log::debug!("disposed session for page design {}", self.page.id);
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn page(&self) -> &PageDesign {
        &self.page
    }

    pub fn page_design_id(&self) -> &str {
        &self.page.id
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    pub fn tree(&self) -> &ComponentTree {
        self.store.tree()
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn canvas(&self) -> &CanvasState {
        &self.canvas
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Monotonic change counter.
    pub fn revision(&self) -> u64 {
        *self.changes.borrow()
    }

    /// Receive the revision after every observable change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn lint(&self) -> Vec<LintDiagnostic> {
        lint_tree(self.store.tree(), self.store.max_depth())
    }

    // ─── Content mutations ───────────────────────────────────────────────

    /// Add a component and select it.
    pub fn add_component(
        &mut self,
        component_type: ComponentType,
        parent_id: Option<ComponentId>,
        at_index: Option<usize>,
    ) -> TreeResult<ComponentId> {
        let before = self.store.snapshot();
        let id = self.store.add_component(component_type, parent_id, at_index)?;
        self.record(before, &format!("add {component_type}"));
        self.selection.select(id, false);
        self.notify();
        Ok(id)
    }

    pub fn update_component(&mut self, id: ComponentId, patch: &ComponentPatch) -> TreeResult<()> {
        if patch.is_empty() {
            return if self.store.contains(id) {
                Ok(())
            } else {
                Err(TreeError::NotFound(id))
            };
        }
        let before = self.store.snapshot();
        self.store.update_component(id, patch)?;
        self.record(before, "update");
        self.notify();
        Ok(())
    }

    pub fn move_component(
        &mut self,
        id: ComponentId,
        new_parent_id: Option<ComponentId>,
        new_index: usize,
    ) -> TreeResult<()> {
        let before = self.store.snapshot();
        self.store.move_component(id, new_parent_id, new_index)?;
        self.record(before, "move");
        self.notify();
        Ok(())
    }

    /// Delete a component and return every removed id.
    pub fn delete_component(&mut self, id: ComponentId, cascade: bool) -> TreeResult<Vec<ComponentId>> {
        let before = self.store.snapshot();
        let removed = self.store.delete_component(id, cascade)?;
        self.record(before, "delete");
        self.selection.prune(&removed);
        self.notify();
        Ok(removed)
    }

    /// Cascade-delete the whole selection as one undo step.
    pub fn delete_selected(&mut self) -> Vec<ComponentId> {
        let targets = self.selection.selected().to_vec();
        self.delete_many(&targets, "delete")
    }

    pub fn bring_to_front(&mut self, id: ComponentId) -> TreeResult<bool> {
        let before = self.store.snapshot();
        let changed = self.store.bring_to_front(id)?;
        if changed {
            self.record(before, "bring to front");
            self.notify();
        }
        Ok(changed)
    }

    pub fn send_to_back(&mut self, id: ComponentId) -> TreeResult<bool> {
        let before = self.store.snapshot();
        let changed = self.store.send_to_back(id)?;
        if changed {
            self.record(before, "send to back");
            self.notify();
        }
        Ok(changed)
    }

    // ─── Clipboard ───────────────────────────────────────────────────────

    pub fn copy_selected(&mut self) {
        let nodes: Vec<_> = self
            .selection
            .selected()
            .iter()
            .filter_map(|id| self.store.get(*id))
            .collect();
        let before = self.selection.revision();
        self.selection.copy(nodes);
        self.notify_if(before != self.selection.revision());
    }

    /// Copy the selection, then delete it as one undo step.
    pub fn cut_selected(&mut self) -> Vec<ComponentId> {
        let nodes: Vec<_> = self
            .selection
            .selected()
            .iter()
            .filter_map(|id| self.store.get(*id))
            .collect();
        let targets = self.selection.cut(nodes);
        self.delete_many(&targets, "cut")
    }

    /// Insert the clipboard under `parent_id` (appended) and select the
    /// copies. Returns the new ids in clipboard order.
    pub fn paste(&mut self, parent_id: Option<ComponentId>) -> TreeResult<Vec<ComponentId>> {
        if let Some(p) = parent_id
            && !self.store.contains(p)
        {
            return Err(TreeError::InvalidParent(p));
        }
        let templates = self.selection.clipboard().to_vec();
        if templates.is_empty() {
            return Ok(Vec::new());
        }
        let before = self.store.snapshot();
        let ids = self.selection.paste();
        for (id, template) in ids.iter().zip(templates) {
            if let Err(e) = self.store.insert_template(*id, template, parent_id, None) {
                self.store.restore(before);
                self.selection.prune(&ids);
                self.notify();
                return Err(e);
            }
        }
        self.record(before, "paste");
        self.notify();
        Ok(ids)
    }

    /// Copy each selected component next to its source and select the
    /// copies. Children are not copied.
    pub fn duplicate_selected(&mut self) -> TreeResult<Vec<ComponentId>> {
        let sources: Vec<ComponentId> = self
            .selection
            .selected()
            .iter()
            .copied()
            .filter(|id| self.store.contains(*id))
            .collect();
        if sources.is_empty() {
            return Ok(Vec::new());
        }
        let before = self.store.snapshot();
        let ids = self.selection.duplicate(&sources);
        for (source, id) in sources.iter().zip(&ids) {
            let parent = self.store.parent_of(*source);
            let index = self
                .store
                .children(parent)
                .iter()
                .position(|c| c == source)
                .map(|i| i + 1);
            let inserted = match self.store.template_of(*source) {
                Some(template) => self.store.insert_template(*id, template, parent, index),
                None => Err(TreeError::NotFound(*source)),
            };
            if let Err(e) = inserted {
                self.store.restore(before);
                self.selection.prune(&ids);
                self.notify();
                return Err(e);
            }
        }
        self.record(before, "duplicate");
        self.notify();
        Ok(ids)
    }

    // ─── Undo / redo ─────────────────────────────────────────────────────

    pub fn undo(&mut self) -> Option<String> {
        let description = self.history.undo(&mut self.store)?;
        self.after_restore();
        Some(description)
    }

    pub fn redo(&mut self) -> Option<String> {
        let description = self.history.redo(&mut self.store)?;
        self.after_restore();
        Some(description)
    }

    /// Group the following mutations into one undo step.
    pub fn begin_gesture(&mut self, description: &str) {
        self.history.begin_batch(&self.store, description);
    }

    pub fn end_gesture(&mut self) -> bool {
        self.history.end_batch(&self.store)
    }

    // ─── Selection ───────────────────────────────────────────────────────

    pub fn select(&mut self, id: ComponentId, multi: bool) {
        self.with_selection(|s| s.select(id, multi));
    }

    pub fn unselect(&mut self, id: ComponentId) {
        self.with_selection(|s| s.unselect(id));
    }

    pub fn select_all(&mut self) {
        let ids = self.store.tree().sorted_ids();
        self.with_selection(|s| s.select_all(&ids));
    }

    pub fn clear_selection(&mut self) {
        self.with_selection(SelectionState::clear_selection);
    }

    pub fn set_hovered(&mut self, id: Option<ComponentId>) {
        self.with_selection(|s| s.set_hovered(id));
    }

    pub fn select_parent(&mut self) {
        let store = &self.store;
        let before = self.selection.revision();
        self.selection.select_parent(|id| store.parent_of(id));
        self.notify_if(before != self.selection.revision());
    }

    pub fn start_multi_select(&mut self, rect: SelectionRect) {
        self.with_selection(|s| s.start_multi_select(rect));
    }

    pub fn update_multi_select(&mut self, rect: SelectionRect) {
        self.with_selection(|s| s.update_multi_select(rect));
    }

    /// Resolve a rect-select to the ids the host hit-tested. Unknown ids
    /// are ignored.
    pub fn end_multi_select(&mut self, ids_in_rect: &[ComponentId]) {
        let known: Vec<ComponentId> = ids_in_rect
            .iter()
            .copied()
            .filter(|id| self.store.contains(*id))
            .collect();
        self.with_selection(|s| s.end_multi_select(&known));
    }

    pub fn start_drag(&mut self, ids: &[ComponentId]) {
        self.with_selection(|s| s.start_drag(ids));
    }

    pub fn drag_over(&mut self, target: Option<ComponentId>) {
        self.with_selection(|s| s.drag_over(target));
    }

    /// Finish a drag. With a drop target, every dragged component is
    /// appended under it as a single undo step; if any move is rejected the
    /// whole drop is rolled back and the error returned.
    pub fn end_drag(&mut self) -> TreeResult<Option<DragState>> {
        let Some(drag) = self.selection.end_drag() else {
            return Ok(None);
        };
        self.notify();
        let Some(target) = drag.over else {
            return Ok(Some(drag));
        };
        let before = self.store.snapshot();
        for id in &drag.dragged {
            if *id == target {
                continue;
            }
            let index = self.store.children(Some(target)).len();
            if let Err(e) = self.store.move_component(*id, Some(target), index) {
                self.store.restore(before);
                return Err(e);
            }
        }
        if before != *self.store.tree() {
            self.record(before, "drop");
            self.notify();
        }
        Ok(Some(drag))
    }

    // ─── Canvas ──────────────────────────────────────────────────────────

    pub fn set_zoom(&mut self, zoom: f64) {
        let changed = self.canvas.set_zoom(zoom);
        self.notify_if(changed);
    }

    pub fn zoom_in(&mut self) {
        let changed = self.canvas.zoom_in();
        self.notify_if(changed);
    }

    pub fn zoom_out(&mut self) {
        let changed = self.canvas.zoom_out();
        self.notify_if(changed);
    }

    pub fn reset_canvas(&mut self) {
        let changed = self.canvas.reset();
        self.notify_if(changed);
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let changed = self.canvas.pan_by(dx, dy);
        self.notify_if(changed);
    }

    // ─── Shortcuts ───────────────────────────────────────────────────────

    /// Dispatch a resolved shortcut. Rejected tree operations are logged
    /// and reported as "no change".
    pub fn apply_shortcut(&mut self, action: ShortcutAction) -> ShortcutOutcome {
        let edits = self.edits;
        let mut outcome = ShortcutOutcome::default();
        let result: TreeResult<()> = match action {
            ShortcutAction::Undo => {
                self.undo();
                Ok(())
            }
            ShortcutAction::Redo => {
                self.redo();
                Ok(())
            }
            ShortcutAction::Delete => {
                self.delete_selected();
                Ok(())
            }
            ShortcutAction::SelectAll => {
                self.select_all();
                Ok(())
            }
            ShortcutAction::Duplicate => self.duplicate_selected().map(drop),
            ShortcutAction::Copy => {
                self.copy_selected();
                Ok(())
            }
            ShortcutAction::Cut => {
                self.cut_selected();
                Ok(())
            }
            ShortcutAction::Paste => {
                let parent = self.paste_target();
                self.paste(parent).map(drop)
            }
            ShortcutAction::Save => {
                outcome.save_requested = true;
                Ok(())
            }
            ShortcutAction::Deselect => {
                self.clear_selection();
                Ok(())
            }
            ShortcutAction::SelectParent => {
                self.select_parent();
                Ok(())
            }
            ShortcutAction::ZoomIn => {
                self.zoom_in();
                Ok(())
            }
            ShortcutAction::ZoomOut => {
                self.zoom_out();
                Ok(())
            }
            ShortcutAction::ZoomReset => {
                self.reset_canvas();
                Ok(())
            }
            ShortcutAction::BringToFront => self.restack_selected(true),
            ShortcutAction::SendToBack => self.restack_selected(false),
        };
        if let Err(e) = result {
            log::warn!("shortcut {} rejected: {e}", action.as_str());
        }
        outcome.content_changed = self.edits != edits;
        outcome
    }

    /// Paste into the active component if it accepts children, else next to it.
    fn paste_target(&self) -> Option<ComponentId> {
        let active = self.selection.active()?;
        let node = self.store.get(active)?;
        if node.component_type.is_container() {
            Some(active)
        } else {
            self.store.parent_of(active)
        }
    }

    fn restack_selected(&mut self, to_front: bool) -> TreeResult<()> {
        let Some(id) = self.selection.active() else {
            return Ok(());
        };
        if to_front {
            self.bring_to_front(id)?;
        } else {
            self.send_to_back(id)?;
        }
        Ok(())
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Last persisted version of the page design (0 = never saved).
    pub fn persisted_version(&self) -> u64 {
        self.page.version
    }

    /// The page design as it should be written next: live content encoded,
    /// `version` advanced by one. Function-valued props are dropped.
    ///
    /// Each record that differs from its last persisted form carries that
    /// record's version plus one; unchanged records keep theirs. Undo can
    /// therefore restore an older node without its version going backwards.
    pub fn persisted_document(&self) -> (PageDesign, Vec<SerializationWarning>) {
        let (mut document, warnings) = to_document(self.store.tree());
        let now = Utc::now();
        for record in document.components.values_mut() {
            let Some(stored) = self.persisted.get(&record.id) else {
                continue;
            };
            if same_content(stored, record) {
                record.version = stored.version;
                record.updated_at = stored.updated_at;
            } else {
                record.version = stored.version + 1;
                record.updated_at = now;
            }
        }
        let mut page = self.page.clone();
        page.root_component_id = document.root_id;
        page.component_tree = document;
        page.version = self.page.version + 1;
        page.updated_at = now;
        (page, warnings)
    }

    /// Record a successful write of `written` (as produced by
    /// `persisted_document`) at page version `version`.
    pub fn mark_saved(&mut self, version: u64, written: &PageDesign) {
        self.page.version = version;
        self.page.updated_at = Utc::now();
        self.persisted.extend(
            written
                .component_tree
                .components
                .iter()
                .map(|(id, record)| (*id, record.clone())),
        );
    }

    pub fn export(&self) -> Result<Serialized, SerializeError> {
        export_page(&self.page, self.store.tree())
    }

    /// Replace the content with an export file. Undoable as one step.
    pub fn import(&mut self, json: &str) -> Result<(), SerializeError> {
        let mut imported = import_page(json)?;
        imported.retarget(&self.page.id);
        let before = self.store.snapshot();
        self.store.restore(imported.tree);
        self.record(before, "import");
        self.selection.reset();
        self.notify();
        Ok(())
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn record(&mut self, before: ComponentTree, description: &str) {
        self.history.record(before, description);
        self.edits += 1;
    }

    fn delete_many(&mut self, targets: &[ComponentId], description: &str) -> Vec<ComponentId> {
        let before = self.store.snapshot();
        let mut removed = Vec::new();
        for id in targets {
            // An ancestor earlier in the list may already have taken it.
            if let Ok(gone) = self.store.delete_component(*id, true) {
                removed.extend(gone);
            }
        }
        if !removed.is_empty() {
            self.record(before, description);
            self.selection.prune(&removed);
            self.notify();
        }
        removed
    }

    fn after_restore(&mut self) {
        let gone: Vec<ComponentId> = self
            .selection
            .selected()
            .iter()
            .chain(self.selection.hovered().iter())
            .copied()
            .filter(|id| !self.store.contains(*id))
            .collect();
        self.selection.prune(&gone);
        self.edits += 1;
        self.notify();
    }

    fn with_selection(&mut self, f: impl FnOnce(&mut SelectionState)) {
        let before = self.selection.revision();
        f(&mut self.selection);
        self.notify_if(before != self.selection.revision());
    }

    fn notify_if(&self, changed: bool) {
        if changed {
            self.notify();
        }
    }

    fn notify(&self) {
        self.changes.send_modify(|revision| *revision += 1);
    }
}

/// Equal apart from the persistence bookkeeping.
fn same_content(stored: &ComponentRecord, live: &ComponentRecord) -> bool {
    let stamped = ComponentRecord {
        version: live.version,
        updated_at: live.updated_at,
        ..stored.clone()
    };
    stamped == *live
}
