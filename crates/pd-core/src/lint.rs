//! Integrity diagnostics for component trees.
//!
//! Reports structural damage without repairing it. The store and the
//! hierarchy builder already tolerate every case listed here; the lint makes
//! it visible after loading a document.

use crate::id::ComponentId;
use crate::model::ComponentTree;
use std::collections::{HashMap, HashSet};

// ─── Diagnostic types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintSeverity {
    /// The tree is damaged and is being read in a degraded way.
    Warning,
    /// Cosmetic; normalised by the next mutation.
    Info,
}

#[derive(Debug, Clone)]
pub struct LintDiagnostic {
    pub component_id: ComponentId,
    pub message: String,
    pub severity: LintSeverity,
    /// Short rule identifier (e.g. "dangling-parent", "parent-cycle").
    pub rule: &'static str,
}

// ─── Public API ──────────────────────────────────────────────────────────

/// Run all rules. Diagnostics are ordered by component id, then rule.
#[must_use]
pub fn lint_tree(tree: &ComponentTree, max_depth: usize) -> Vec<LintDiagnostic> {
    let mut diags = Vec::new();
    lint_root(tree, &mut diags);
    lint_dangling_parents(tree, &mut diags);
    lint_page_mismatch(tree, &mut diags);
    lint_cycles(tree, max_depth, &mut diags);
    lint_duplicate_order(tree, &mut diags);
    diags.sort_by(|a, b| a.component_id.cmp(&b.component_id).then(a.rule.cmp(b.rule)));
    diags
}

// ─── Rules ───────────────────────────────────────────────────────────────

fn lint_root(tree: &ComponentTree, diags: &mut Vec<LintDiagnostic>) {
    if let Some(root) = tree.root_id
        && !tree.components.contains_key(&root)
    {
        diags.push(LintDiagnostic {
            component_id: root,
            message: format!("root component {root} does not exist"),
            severity: LintSeverity::Warning,
            rule: "missing-root",
        });
    }
}

fn lint_dangling_parents(tree: &ComponentTree, diags: &mut Vec<LintDiagnostic>) {
    for node in tree.components.values() {
        if let Some(parent) = node.parent_id
            && !tree.components.contains_key(&parent)
        {
            diags.push(LintDiagnostic {
                component_id: node.id,
                message: format!("parent {parent} does not exist; treated as root level"),
                severity: LintSeverity::Warning,
                rule: "dangling-parent",
            });
        }
    }
}

fn lint_page_mismatch(tree: &ComponentTree, diags: &mut Vec<LintDiagnostic>) {
    for node in tree.components.values() {
        if node.page_design_id != tree.page_design_id {
            diags.push(LintDiagnostic {
                component_id: node.id,
                message: format!(
                    "belongs to page design `{}`, not `{}`",
                    node.page_design_id, tree.page_design_id
                ),
                severity: LintSeverity::Warning,
                rule: "page-mismatch",
            });
        }
    }
}

/// A node whose ancestor walk revisits a node, or runs past `max_depth`,
/// sits on (or below) a parent cycle.
fn lint_cycles(tree: &ComponentTree, max_depth: usize, diags: &mut Vec<LintDiagnostic>) {
    for node in tree.components.values() {
        let mut seen = HashSet::from([node.id]);
        let mut current = node.parent_id;
        let mut depth = 0;
        while let Some(p) = current {
            let Some(parent) = tree.get(p) else { break };
            depth += 1;
            if !seen.insert(p) || depth > max_depth {
                diags.push(LintDiagnostic {
                    component_id: node.id,
                    message: format!("ancestor chain does not terminate within {max_depth} levels"),
                    severity: LintSeverity::Warning,
                    rule: "parent-cycle",
                });
                break;
            }
            current = parent.parent_id;
        }
    }
}

fn lint_duplicate_order(tree: &ComponentTree, diags: &mut Vec<LintDiagnostic>) {
    let mut slots: HashMap<(Option<ComponentId>, u32), Vec<ComponentId>> = HashMap::new();
    for node in tree.components.values() {
        slots
            .entry((node.parent_id, node.position.order))
            .or_default()
            .push(node.id);
    }
    for ((_, order), mut ids) in slots {
        if ids.len() < 2 {
            continue;
        }
        ids.sort();
        for id in ids {
            diags.push(LintDiagnostic {
                component_id: id,
                message: format!("shares sibling order {order} with another component"),
                severity: LintSeverity::Info,
                rule: "duplicate-order",
            });
        }
    }
}
