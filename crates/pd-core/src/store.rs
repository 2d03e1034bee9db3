//! Tree Store: the single source of truth for one open page design.
//!
//! Nodes live in a flat arena (`ComponentTree`) and point at their parent.
//! A `ChildIndex` is kept in step with every mutation so ordering, moves and
//! cascade deletes never need a full scan. All operations validate first and
//! mutate second; a returned error means nothing changed.

use crate::error::TreeError;
use crate::hierarchy::{ChildIndex, DEFAULT_MAX_DEPTH, HierarchyNode};
use crate::id::ComponentId;
use crate::model::{ComponentNode, ComponentPatch, ComponentTemplate, ComponentTree, ComponentType};
use crate::registry::{BuiltinRegistry, ComponentRegistry};
use chrono::Utc;
use std::sync::Arc;

pub type TreeResult<T> = Result<T, TreeError>;

pub struct TreeStore {
    tree: ComponentTree,
    index: ChildIndex,
    registry: Arc<dyn ComponentRegistry>,
    max_depth: usize,
}

impl TreeStore {
    /// Empty store using the built-in registry.
    pub fn new(page_design_id: &str) -> Self {
        Self::with_registry(page_design_id, Arc::new(BuiltinRegistry))
    }

    pub fn with_registry(page_design_id: &str, registry: Arc<dyn ComponentRegistry>) -> Self {
        Self {
            tree: ComponentTree::new(page_design_id),
            index: ChildIndex::default(),
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Load an existing tree (e.g. a deserialized document).
    pub fn from_tree(tree: ComponentTree, registry: Arc<dyn ComponentRegistry>) -> Self {
        let index = ChildIndex::build(&tree);
        Self {
            tree,
            index,
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn page_design_id(&self) -> &str {
        &self.tree.page_design_id
    }

    pub fn tree(&self) -> &ComponentTree {
        &self.tree
    }

    pub fn root_id(&self) -> Option<ComponentId> {
        self.tree.root_id
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn get(&self, id: ComponentId) -> Option<&ComponentNode> {
        self.tree.get(id)
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.tree.components.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Ordered children of `parent` (`None` = root level).
    pub fn children(&self, parent: Option<ComponentId>) -> &[ComponentId] {
        self.index.children(parent)
    }

    /// The existing parent of `id`, if any.
    pub fn parent_of(&self, id: ComponentId) -> Option<ComponentId> {
        self.tree
            .get(id)
            .and_then(|n| n.parent_id)
            .filter(|p| self.contains(*p))
    }

    /// Ancestors from nearest to farthest, bounded by the depth cap.
    pub fn ancestors(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut out = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(p) = current {
            if out.len() >= self.max_depth || p == id || out.contains(&p) {
                break;
            }
            out.push(p);
            current = self.parent_of(p);
        }
        out
    }

    pub fn descendants(&self, id: ComponentId) -> Vec<ComponentId> {
        self.index.descendants(id)
    }

    /// Whether `ancestor` is a parent/grandparent/etc. of `descendant`.
    pub fn is_ancestor_of(&self, ancestor: ComponentId, descendant: ComponentId) -> bool {
        ancestor != descendant && self.ancestors(descendant).contains(&ancestor)
    }

    pub fn template_of(&self, id: ComponentId) -> Option<ComponentTemplate> {
        self.tree.get(id).map(ComponentNode::to_template)
    }

    /// Derived nested tree. Orphans are roots; see `ChildIndex::hierarchy`.
    pub fn build_hierarchy(&self) -> Vec<HierarchyNode> {
        self.index.hierarchy(&self.tree, self.max_depth)
    }

    // ─── Snapshots ───────────────────────────────────────────────────────

    pub fn snapshot(&self) -> ComponentTree {
        self.tree.clone()
    }

    /// Replace the whole tree (undo/redo, reload) and rebuild the index.
    pub fn restore(&mut self, tree: ComponentTree) {
        self.index = ChildIndex::build(&tree);
        self.tree = tree;
    }

    // ─── Mutations ───────────────────────────────────────────────────────

    /// Create a component seeded with registry defaults and return its id.
    pub fn add_component(
        &mut self,
        component_type: ComponentType,
        parent_id: Option<ComponentId>,
        at_index: Option<usize>,
    ) -> TreeResult<ComponentId> {
        self.check_parent(parent_id)?;
        let id = self.fresh_id();
        let defaults = self.registry.defaults(component_type);
        let mut node = ComponentNode::new(id, &self.tree.page_design_id, component_type);
        node.props = defaults.props;
        node.styles = defaults.styles;
        node.layout_props = defaults.layout_props;
        self.insert_node(node, parent_id, at_index);
        Ok(id)
    }

    /// Create a component from a clipboard template under a caller-minted id.
    /// Props carried over from an existing node are not re-validated; schema
    /// mismatches are only logged.
    pub fn insert_template(
        &mut self,
        id: ComponentId,
        template: ComponentTemplate,
        parent_id: Option<ComponentId>,
        at_index: Option<usize>,
    ) -> TreeResult<()> {
        if self.contains(id) {
            return Err(TreeError::DuplicateId(id));
        }
        self.check_parent(parent_id)?;
        if let Err(messages) = self.registry.validate(template.component_type, &template.props) {
            log::warn!(
                "component {id} ({}) carries props outside its schema: {}",
                template.component_type,
                messages.join("; ")
            );
        }
        let mut node = ComponentNode::new(id, &self.tree.page_design_id, template.component_type);
        node.props = template.props;
        node.styles = template.styles;
        node.layout_props = template.layout_props;
        self.insert_node(node, parent_id, at_index);
        Ok(())
    }

    /// Shallow-merge `patch` into the component. Only the props the patch
    /// sets are validated, so stored values outside the schema do not block
    /// unrelated edits. On error the node is left untouched.
    pub fn update_component(&mut self, id: ComponentId, patch: &ComponentPatch) -> TreeResult<()> {
        let current = self.tree.get(id).ok_or(TreeError::NotFound(id))?;
        self.validate(current.component_type, &patch.props)?;
        let mut updated = current.clone();
        updated.apply_patch(patch);
        updated.updated_at = Utc::now();
        self.tree.components.insert(id, updated);
        Ok(())
    }

    /// Reparent `id` under `new_parent_id` at `new_index` (clamped).
    pub fn move_component(
        &mut self,
        id: ComponentId,
        new_parent_id: Option<ComponentId>,
        new_index: usize,
    ) -> TreeResult<()> {
        if !self.contains(id) {
            return Err(TreeError::NotFound(id));
        }
        if let Some(new_parent) = new_parent_id {
            if new_parent == id {
                return Err(TreeError::Cycle { id, new_parent });
            }
            if !self.contains(new_parent) {
                return Err(TreeError::InvalidParent(new_parent));
            }
            self.check_not_descendant(id, new_parent)?;
        }

        let old_parent = self.parent_of(id);
        self.index.remove(old_parent, id);
        self.renumber(old_parent);
        self.index.insert(new_parent_id, Some(new_index), id);
        if let Some(node) = self.tree.components.get_mut(&id) {
            node.parent_id = new_parent_id;
            node.updated_at = Utc::now();
        }
        self.renumber(new_parent_id);
        if new_parent_id.is_some() && self.tree.root_id == Some(id) {
            self.tree.root_id = self.index.children(None).first().copied();
        } else if new_parent_id.is_none() && self.tree.root_id.is_none() {
            self.tree.root_id = Some(id);
        }
        Ok(())
    }

    /// Remove `id`. With `cascade`, every descendant goes too; otherwise the
    /// children are promoted into `id`'s slot under its parent. Returns all
    /// removed ids, `id` first.
    pub fn delete_component(&mut self, id: ComponentId, cascade: bool) -> TreeResult<Vec<ComponentId>> {
        if !self.contains(id) {
            return Err(TreeError::NotFound(id));
        }
        let parent = self.parent_of(id);
        let slot = self.index.remove(parent, id);

        let removed = if cascade {
            let mut removed = vec![id];
            removed.extend(self.index.descendants(id));
            for gone in &removed {
                self.index.forget(*gone);
                self.tree.components.remove(gone);
            }
            removed
        } else {
            let orphans = self.index.forget(id);
            let mut at = slot.unwrap_or(usize::MAX);
            for child in orphans {
                at = self.index.insert(parent, Some(at), child) + 1;
                if let Some(node) = self.tree.components.get_mut(&child) {
                    node.parent_id = parent;
                    node.updated_at = Utc::now();
                }
            }
            self.tree.components.remove(&id);
            vec![id]
        };

        self.renumber(parent);
        if self.tree.root_id.is_some_and(|r| removed.contains(&r)) {
            self.tree.root_id = self.index.children(None).first().copied();
        }
        Ok(removed)
    }

    /// Raise `id` above all its siblings. Returns whether anything changed.
    pub fn bring_to_front(&mut self, id: ComponentId) -> TreeResult<bool> {
        let top = self.sibling_z(id)?.into_iter().max();
        self.restack(id, top, |z, top| z <= top, |top| top + 1)
    }

    /// Lower `id` beneath all its siblings. Returns whether anything changed.
    pub fn send_to_back(&mut self, id: ComponentId) -> TreeResult<bool> {
        let bottom = self.sibling_z(id)?.into_iter().min();
        self.restack(id, bottom, |z, bottom| z >= bottom, |bottom| bottom - 1)
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn fresh_id(&self) -> ComponentId {
        loop {
            let id = ComponentId::mint();
            if !self.contains(id) {
                return id;
            }
        }
    }

    fn check_parent(&self, parent_id: Option<ComponentId>) -> TreeResult<()> {
        match parent_id {
            Some(p) if !self.contains(p) => Err(TreeError::InvalidParent(p)),
            _ => Ok(()),
        }
    }

    fn validate(&self, component_type: ComponentType, props: &crate::model::PropMap) -> TreeResult<()> {
        self.registry
            .validate(component_type, props)
            .map_err(|messages| TreeError::Validation {
                component_type,
                messages,
            })
    }

    /// Walk up from `new_parent`; meeting `id` or running past the depth
    /// cap both reject the move.
    fn check_not_descendant(&self, id: ComponentId, new_parent: ComponentId) -> TreeResult<()> {
        let mut current = Some(new_parent);
        let mut depth = 0;
        while let Some(c) = current {
            if c == id || depth > self.max_depth {
                return Err(TreeError::Cycle { id, new_parent });
            }
            depth += 1;
            current = self.parent_of(c);
        }
        Ok(())
    }

    fn insert_node(&mut self, mut node: ComponentNode, parent_id: Option<ComponentId>, at_index: Option<usize>) {
        let id = node.id;
        node.parent_id = parent_id;
        self.tree.components.insert(id, node);
        self.index.insert(parent_id, at_index, id);
        self.renumber(parent_id);
        if parent_id.is_none() && self.tree.root_id.is_none() {
            self.tree.root_id = Some(id);
        }
    }

    /// Rewrite `position.order` of `parent`'s children to 0..n.
    fn renumber(&mut self, parent: Option<ComponentId>) {
        for (i, child) in self.index.children(parent).iter().enumerate() {
            if let Some(node) = self.tree.components.get_mut(child) {
                node.position.order = i as u32;
            }
        }
    }

    fn sibling_z(&self, id: ComponentId) -> TreeResult<Vec<i32>> {
        if !self.contains(id) {
            return Err(TreeError::NotFound(id));
        }
        Ok(self
            .index
            .children(self.parent_of(id))
            .iter()
            .filter(|s| **s != id)
            .filter_map(|s| self.tree.get(*s).map(|n| n.position.z_index))
            .collect())
    }

    fn restack(
        &mut self,
        id: ComponentId,
        bound: Option<i32>,
        needs_move: impl Fn(i32, i32) -> bool,
        next: impl Fn(i32) -> i32,
    ) -> TreeResult<bool> {
        let Some(bound) = bound else {
            return Ok(false);
        };
        let node = self.tree.components.get_mut(&id).ok_or(TreeError::NotFound(id))?;
        if !needs_move(node.position.z_index, bound) {
            return Ok(false);
        }
        node.position.z_index = next(bound);
        node.updated_at = Utc::now();
        Ok(true)
    }
}
