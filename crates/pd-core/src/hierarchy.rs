//! Parent → children adjacency index and nested hierarchy construction.
//!
//! Nodes only store `parent_id`. The index groups them by *effective*
//! parent: a `parent_id` that points at a missing node is treated as root
//! level, so a corrupted document still yields a usable tree.

use crate::id::ComponentId;
use crate::model::{ComponentNode, ComponentTree, ComponentType};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet, VecDeque};

/// Practical bound on nesting depth used by every ancestor walk.
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// One node of the derived nested tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: ComponentId,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    /// Ids in depth-first pre-order.
    pub fn flatten(&self) -> Vec<ComponentId> {
        let mut out = vec![self.id];
        for child in &self.children {
            out.extend(child.flatten());
        }
        out
    }
}

type Siblings = SmallVec<[ComponentId; 4]>;

/// Ordered child lists keyed by effective parent (`None` = root level).
#[derive(Debug, Clone, Default)]
pub struct ChildIndex {
    children: HashMap<Option<ComponentId>, Siblings>,
}

impl ChildIndex {
    /// Build the index in one pass over the tree; siblings are ordered by
    /// `position.order`, ties broken by id.
    pub fn build(tree: &ComponentTree) -> Self {
        let mut children: HashMap<Option<ComponentId>, Siblings> = HashMap::new();
        for node in tree.components.values() {
            children
                .entry(effective_parent(tree, node))
                .or_default()
                .push(node.id);
        }
        for list in children.values_mut() {
            list.sort_by(|a, b| {
                let oa = tree.get(*a).map(|n| n.position.order).unwrap_or(0);
                let ob = tree.get(*b).map(|n| n.position.order).unwrap_or(0);
                oa.cmp(&ob).then_with(|| a.cmp(b))
            });
        }
        Self { children }
    }

    pub fn children(&self, parent: Option<ComponentId>) -> &[ComponentId] {
        self.children
            .get(&parent)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    pub fn position_of(&self, parent: Option<ComponentId>, id: ComponentId) -> Option<usize> {
        self.children(parent).iter().position(|c| *c == id)
    }

    /// Insert `id` under `parent` at `index` (clamped; `None` appends).
    /// Returns the index actually used.
    pub fn insert(&mut self, parent: Option<ComponentId>, index: Option<usize>, id: ComponentId) -> usize {
        let list = self.children.entry(parent).or_default();
        let at = index.unwrap_or(list.len()).min(list.len());
        list.insert(at, id);
        at
    }

    /// Detach `id` from `parent`'s list. Returns its former index.
    pub fn remove(&mut self, parent: Option<ComponentId>, id: ComponentId) -> Option<usize> {
        let list = self.children.get_mut(&parent)?;
        let at = list.iter().position(|c| *c == id)?;
        list.remove(at);
        if list.is_empty() {
            self.children.remove(&parent);
        }
        Some(at)
    }

    /// Drop the (possibly empty) child list owned by a deleted node.
    pub fn forget(&mut self, id: ComponentId) -> Siblings {
        self.children.remove(&Some(id)).unwrap_or_default()
    }

    /// All transitive descendants of `id`, breadth-first. A visited set
    /// keeps malformed cycles from looping.
    pub fn descendants(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue: VecDeque<ComponentId> = self.children(Some(id)).iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next);
            queue.extend(self.children(Some(next)).iter().copied());
        }
        out
    }

    /// Derive the nested tree. Nodes unreachable from any root (members of
    /// a parent cycle, or below the depth cap) are surfaced as extra roots
    /// so nothing silently disappears.
    pub fn hierarchy(&self, tree: &ComponentTree, max_depth: usize) -> Vec<HierarchyNode> {
        let mut visited = HashSet::with_capacity(tree.len());
        let mut roots: Vec<HierarchyNode> = self
            .children(None)
            .iter()
            .filter_map(|id| self.walk(tree, *id, 0, max_depth, &mut visited))
            .collect();

        if visited.len() < tree.len() {
            for id in tree.sorted_ids() {
                if visited.contains(&id) {
                    continue;
                }
                log::warn!("component {id} is unreachable from any root; surfacing it as a root");
                if let Some(node) = self.walk(tree, id, 0, max_depth, &mut visited) {
                    roots.push(node);
                }
            }
        }
        roots
    }

    fn walk(
        &self,
        tree: &ComponentTree,
        id: ComponentId,
        depth: usize,
        max_depth: usize,
        visited: &mut HashSet<ComponentId>,
    ) -> Option<HierarchyNode> {
        let node = tree.get(id)?;
        if !visited.insert(id) {
            return None;
        }
        let children = if depth >= max_depth {
            log::warn!("component {id} exceeds the maximum nesting depth of {max_depth}");
            Vec::new()
        } else {
            self.children(Some(id))
                .iter()
                .filter_map(|child| self.walk(tree, *child, depth + 1, max_depth, visited))
                .collect()
        };
        Some(HierarchyNode {
            id,
            component_type: node.component_type,
            children,
        })
    }
}

/// The parent a node is indexed under: its `parent_id` when that node
/// exists, otherwise root level.
pub fn effective_parent(tree: &ComponentTree, node: &ComponentNode) -> Option<ComponentId> {
    node.parent_id
        .filter(|p| tree.components.contains_key(p))
}

/// Build the nested tree for a snapshot without keeping an index around.
pub fn build_hierarchy(tree: &ComponentTree, max_depth: usize) -> Vec<HierarchyNode> {
    ChildIndex::build(tree).hierarchy(tree, max_depth)
}
