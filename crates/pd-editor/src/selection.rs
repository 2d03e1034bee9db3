//! Selection, hover, rect-select, clipboard and drag tracking.
//!
//! This state describes UI focus only; it never touches component content.
//! Paste and duplicate mint fresh ids and select them, and the caller
//! inserts the matching templates into the Tree Store.
//!
//! Every operation is total: absent or empty inputs leave the state
//! unchanged instead of failing.
//!
//! ## Selection rules
//!
//! | Call | Effect on `selected` | Effect on `active` |
//! |------|----------------------|--------------------|
//! | `select(id, false)` | replaced by `[id]` | `id` |
//! | `select(id, true)`, not selected | `id` appended | `id` |
//! | `select(id, true)`, selected | `id` removed | kept; moves to the newest remaining if it was `id`; cleared if empty |

use pd_core::{ComponentId, ComponentNode, ComponentTemplate};

/// Axis-aligned rubber-band rectangle in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SelectionRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SelectionRect {
    /// Normalize a drag from `(x1, y1)` to `(x2, y2)` into a positive rect.
    pub fn from_points(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// An in-progress drag of one or more components.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DragState {
    pub dragged: Vec<ComponentId>,
    /// Component currently under the pointer, i.e. the prospective drop parent.
    pub over: Option<ComponentId>,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    selected: Vec<ComponentId>,
    active: Option<ComponentId>,
    hovered: Option<ComponentId>,
    multi_selecting: bool,
    selection_rect: Option<SelectionRect>,
    clipboard: Vec<ComponentTemplate>,
    drag: Option<DragState>,
    /// Bumped on every observable change.
    revision: u64,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// Selected ids in selection order.
    pub fn selected(&self) -> &[ComponentId] {
        &self.selected
    }

    pub fn first_selected(&self) -> Option<ComponentId> {
        self.selected.first().copied()
    }

    pub fn is_selected(&self, id: ComponentId) -> bool {
        self.selected.contains(&id)
    }

    pub fn active(&self) -> Option<ComponentId> {
        self.active
    }

    pub fn hovered(&self) -> Option<ComponentId> {
        self.hovered
    }

    pub fn is_multi_selecting(&self) -> bool {
        self.multi_selecting
    }

    pub fn selection_rect(&self) -> Option<SelectionRect> {
        self.selection_rect
    }

    pub fn clipboard(&self) -> &[ComponentTemplate] {
        &self.clipboard
    }

    pub fn drag(&self) -> Option<&DragState> {
        self.drag.as_ref()
    }

    /// Change counter, used by observers to detect updates.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ─── Selection ───────────────────────────────────────────────────────

    pub fn select(&mut self, id: ComponentId, multi: bool) {
        if !multi {
            if self.selected == [id] && self.active == Some(id) {
                return;
            }
            self.selected = vec![id];
            self.active = Some(id);
        } else if self.is_selected(id) {
            self.remove(id);
        } else {
            self.selected.push(id);
            self.active = Some(id);
        }
        self.bump();
    }

    /// Drop `id` from the selection. No-op if it is not selected.
    pub fn unselect(&mut self, id: ComponentId) {
        if self.is_selected(id) {
            self.remove(id);
            self.bump();
        }
    }

    /// Replace the selection with `ids` (duplicates ignored). The last id
    /// becomes active.
    pub fn select_all(&mut self, ids: &[ComponentId]) {
        let mut next = Vec::with_capacity(ids.len());
        for id in ids {
            if !next.contains(id) {
                next.push(*id);
            }
        }
        let active = next.last().copied();
        if next == self.selected && active == self.active {
            return;
        }
        self.selected = next;
        self.active = active;
        self.bump();
    }

    pub fn clear_selection(&mut self) {
        if self.selected.is_empty() && self.active.is_none() {
            return;
        }
        self.selected.clear();
        self.active = None;
        self.bump();
    }

    pub fn set_hovered(&mut self, id: Option<ComponentId>) {
        if self.hovered != id {
            self.hovered = id;
            self.bump();
        }
    }

    /// Select the parent of the active component, if it has one.
    pub fn select_parent(&mut self, parent_of: impl Fn(ComponentId) -> Option<ComponentId>) {
        if let Some(parent) = self.active.and_then(parent_of) {
            self.select(parent, false);
        }
    }

    // ─── Rect-select ─────────────────────────────────────────────────────

    pub fn start_multi_select(&mut self, rect: SelectionRect) {
        self.multi_selecting = true;
        self.selection_rect = Some(rect);
        self.bump();
    }

    /// Track the rubber band. Ignored outside a rect-select gesture.
    pub fn update_multi_select(&mut self, rect: SelectionRect) {
        if self.multi_selecting && self.selection_rect != Some(rect) {
            self.selection_rect = Some(rect);
            self.bump();
        }
    }

    /// Resolve the gesture to the ids the host found inside the rectangle.
    pub fn end_multi_select(&mut self, ids_in_rect: &[ComponentId]) {
        if !self.multi_selecting {
            return;
        }
        self.multi_selecting = false;
        self.selection_rect = None;
        self.bump();
        self.select_all(ids_in_rect);
    }

    // ─── Clipboard ───────────────────────────────────────────────────────

    /// Store templates of `nodes`. An empty input keeps the clipboard.
    pub fn copy<'a>(&mut self, nodes: impl IntoIterator<Item = &'a ComponentNode>) {
        let templates: Vec<ComponentTemplate> = nodes.into_iter().map(ComponentNode::to_template).collect();
        if templates.is_empty() {
            return;
        }
        self.clipboard = templates;
        self.bump();
    }

    /// Copy `nodes` and return their ids for the caller to delete.
    pub fn cut<'a>(&mut self, nodes: impl IntoIterator<Item = &'a ComponentNode>) -> Vec<ComponentId> {
        let nodes: Vec<&ComponentNode> = nodes.into_iter().collect();
        let ids: Vec<ComponentId> = nodes.iter().map(|n| n.id).collect();
        self.copy(nodes);
        ids
    }

    /// Mint one fresh id per clipboard entry (same order) and select them.
    pub fn paste(&mut self) -> Vec<ComponentId> {
        let ids: Vec<ComponentId> = self.clipboard.iter().map(|_| ComponentId::mint()).collect();
        if !ids.is_empty() {
            self.select_all(&ids);
        }
        ids
    }

    /// Mint one fresh id per source id (same order) and select them.
    pub fn duplicate(&mut self, ids: &[ComponentId]) -> Vec<ComponentId> {
        let fresh: Vec<ComponentId> = ids.iter().map(|_| ComponentId::mint()).collect();
        if !fresh.is_empty() {
            self.select_all(&fresh);
        }
        fresh
    }

    // ─── Drag ────────────────────────────────────────────────────────────

    pub fn start_drag(&mut self, ids: &[ComponentId]) {
        if ids.is_empty() {
            return;
        }
        self.drag = Some(DragState {
            dragged: ids.to_vec(),
            over: None,
        });
        self.bump();
    }

    pub fn drag_over(&mut self, target: Option<ComponentId>) {
        if let Some(drag) = &mut self.drag
            && drag.over != target
        {
            drag.over = target;
            self.bump();
        }
    }

    /// Finish the drag, handing back what was dragged and where.
    pub fn end_drag(&mut self) -> Option<DragState> {
        let drag = self.drag.take()?;
        self.bump();
        Some(drag)
    }

    // ─── Deletion sync ───────────────────────────────────────────────────

    /// Forget every reference to components that no longer exist.
    pub fn prune(&mut self, removed: &[ComponentId]) {
        for id in removed {
            self.unselect(*id);
        }
        let mut changed = false;
        if self.hovered.is_some_and(|h| removed.contains(&h)) {
            self.hovered = None;
            changed = true;
        }
        if let Some(drag) = &mut self.drag {
            let before = drag.dragged.len();
            drag.dragged.retain(|id| !removed.contains(id));
            changed |= drag.dragged.len() != before;
            if drag.over.is_some_and(|o| removed.contains(&o)) {
                drag.over = None;
                changed = true;
            }
            if drag.dragged.is_empty() {
                self.drag = None;
            }
        }
        if changed {
            self.bump();
        }
    }

    /// Reset focus state, keeping the clipboard.
    pub fn reset(&mut self) {
        let clipboard = std::mem::take(&mut self.clipboard);
        let revision = self.revision;
        *self = Self {
            clipboard,
            revision,
            ..Self::default()
        };
        self.bump();
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn remove(&mut self, id: ComponentId) {
        self.selected.retain(|s| *s != id);
        if self.selected.is_empty() {
            self.active = None;
        } else if self.active == Some(id) {
            self.active = self.selected.last().copied();
        }
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_core::{ComponentType, prop_map};

    fn id(s: &str) -> ComponentId {
        ComponentId::intern(s)
    }

    #[test]
    fn single_select_replaces() {
        let mut sel = SelectionState::new();
        sel.select(id("sel_a"), false);
        sel.select(id("sel_b"), false);
        assert_eq!(sel.selected(), &[id("sel_b")]);
        assert_eq!(sel.active(), Some(id("sel_b")));
    }

    #[test]
    fn multi_select_toggles() {
        let mut sel = SelectionState::new();
        sel.select(id("sel_a"), true);
        sel.select(id("sel_b"), true);
        assert_eq!(sel.selected(), &[id("sel_a"), id("sel_b")]);
        assert_eq!(sel.active(), Some(id("sel_b")));

        // Toggling off a non-active id keeps the active one.
        sel.select(id("sel_a"), true);
        assert_eq!(sel.selected(), &[id("sel_b")]);
        assert_eq!(sel.active(), Some(id("sel_b")));

        // Emptying the set clears active.
        sel.select(id("sel_b"), true);
        assert!(sel.selected().is_empty());
        assert_eq!(sel.active(), None);
    }

    #[test]
    fn toggling_off_active_falls_back_to_newest() {
        let mut sel = SelectionState::new();
        for s in ["sel_x", "sel_y", "sel_z"] {
            sel.select(id(s), true);
        }
        sel.select(id("sel_z"), true);
        assert_eq!(sel.active(), Some(id("sel_y")));
    }

    #[test]
    fn absent_inputs_are_no_ops() {
        let mut sel = SelectionState::new();
        let rev = sel.revision();
        sel.unselect(id("sel_missing"));
        sel.clear_selection();
        sel.select_parent(|_| Some(id("sel_parent")));
        sel.update_multi_select(SelectionRect::default());
        sel.end_multi_select(&[id("sel_a")]);
        sel.start_drag(&[]);
        sel.drag_over(Some(id("sel_a")));
        assert_eq!(sel.end_drag(), None);
        assert!(sel.paste().is_empty());
        sel.copy(std::iter::empty::<&ComponentNode>());
        assert_eq!(sel.revision(), rev);
        assert!(sel.selected().is_empty());
    }

    #[test]
    fn rect_select_lifecycle() {
        let mut sel = SelectionState::new();
        sel.start_multi_select(SelectionRect::from_points(10.0, 10.0, 10.0, 10.0));
        assert!(sel.is_multi_selecting());

        let rect = SelectionRect::from_points(10.0, 10.0, 0.0, 50.0);
        sel.update_multi_select(rect);
        assert_eq!(
            sel.selection_rect(),
            Some(SelectionRect {
                x: 0.0,
                y: 10.0,
                width: 10.0,
                height: 40.0
            })
        );
        assert!(rect.contains(5.0, 20.0));

        sel.end_multi_select(&[id("sel_r1"), id("sel_r2"), id("sel_r1")]);
        assert!(!sel.is_multi_selecting());
        assert_eq!(sel.selection_rect(), None);
        assert_eq!(sel.selected(), &[id("sel_r1"), id("sel_r2")]);
    }

    #[test]
    fn clipboard_holds_templates_not_references() {
        let mut node = ComponentNode::new(id("sel_btn"), "page", ComponentType::Button);
        node.props = prop_map([("label", "Buy")]);
        node.parent_id = Some(id("sel_form"));

        let mut sel = SelectionState::new();
        sel.copy([&node]);
        assert_eq!(sel.clipboard(), &[node.to_template()]);

        let pasted = sel.paste();
        assert_eq!(pasted.len(), 1);
        assert_ne!(pasted[0], node.id);
        assert_eq!(sel.selected(), pasted.as_slice());

        // Pasting twice yields distinct ids.
        let again = sel.paste();
        assert_ne!(again, pasted);
    }

    #[test]
    fn cut_returns_ids_to_delete() {
        let a = ComponentNode::new(id("sel_cut_a"), "page", ComponentType::Text);
        let b = ComponentNode::new(id("sel_cut_b"), "page", ComponentType::Image);
        let mut sel = SelectionState::new();
        let ids = sel.cut([&a, &b]);
        assert_eq!(ids, vec![a.id, b.id]);
        assert_eq!(sel.clipboard().len(), 2);
    }

    #[test]
    fn select_parent_walks_up() {
        let mut sel = SelectionState::new();
        sel.select(id("sel_child"), false);
        sel.select_parent(|c| (c == id("sel_child")).then(|| id("sel_parent")));
        assert_eq!(sel.selected(), &[id("sel_parent")]);

        // Root has no parent: nothing changes.
        sel.select_parent(|_| None);
        assert_eq!(sel.active(), Some(id("sel_parent")));
    }

    #[test]
    fn prune_drops_removed_ids_everywhere() {
        let mut sel = SelectionState::new();
        sel.select_all(&[id("sel_p1"), id("sel_p2"), id("sel_p3")]);
        sel.set_hovered(Some(id("sel_p2")));
        sel.start_drag(&[id("sel_p2")]);
        sel.drag_over(Some(id("sel_p3")));

        sel.prune(&[id("sel_p2"), id("sel_p3")]);
        assert_eq!(sel.selected(), &[id("sel_p1")]);
        assert_eq!(sel.active(), Some(id("sel_p1")));
        assert_eq!(sel.hovered(), None);
        assert_eq!(sel.drag(), None);
    }

    #[test]
    fn drag_tracks_target() {
        let mut sel = SelectionState::new();
        sel.start_drag(&[id("sel_d")]);
        sel.drag_over(Some(id("sel_row")));
        let drag = sel.end_drag().unwrap();
        assert_eq!(drag.dragged, vec![id("sel_d")]);
        assert_eq!(drag.over, Some(id("sel_row")));
        assert_eq!(sel.drag(), None);
    }
}
