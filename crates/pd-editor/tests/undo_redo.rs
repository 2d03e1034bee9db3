//! Integration tests: undo/redo through the editor session (pd-editor ↔ pd-core).
//!
//! Every mutating action must undo to the exact prior tree and redo to the
//! exact later one; new actions after an undo discard the redo branch.

use pd_core::*;
use pd_editor::{EditorConfig, EditorSession};
use pretty_assertions::assert_eq;

fn session() -> EditorSession {
    EditorSession::init("undo_page", EditorConfig::default())
}

// ─── Single update ──────────────────────────────────────────────────────

#[test]
fn undo_update_restores_label_and_redo_reapplies() {
    let mut s = session();
    let id = s.add_component(ComponentType::Button, None, None).unwrap();
    let original = s.store().get(id).unwrap().props["label"].clone();

    s.update_component(id, &ComponentPatch::new().prop("label", "Hi"))
        .unwrap();
    assert_eq!(s.store().get(id).unwrap().props["label"], PropValue::from("Hi"));

    assert_eq!(s.undo().as_deref(), Some("update"));
    assert_eq!(s.store().get(id).unwrap().props["label"], original);

    assert_eq!(s.redo().as_deref(), Some("update"));
    assert_eq!(s.store().get(id).unwrap().props["label"], PropValue::from("Hi"));
}

// ─── Symmetry over mixed sequences ───────────────────────────────────────

#[test]
fn every_step_of_a_mixed_sequence_is_symmetric() {
    let mut s = session();
    let mut states = vec![s.store().snapshot()];

    let page = s.add_component(ComponentType::Container, None, None).unwrap();
    states.push(s.store().snapshot());
    let row = s.add_component(ComponentType::Row, Some(page), None).unwrap();
    states.push(s.store().snapshot());
    let col = s.add_component(ComponentType::Col, Some(row), None).unwrap();
    states.push(s.store().snapshot());
    s.update_component(col, &ComponentPatch::new().prop("span", 6i64).style("padding", "8px"))
        .unwrap();
    states.push(s.store().snapshot());
    s.move_component(col, Some(page), 0).unwrap();
    states.push(s.store().snapshot());
    s.bring_to_front(row).unwrap();
    states.push(s.store().snapshot());
    s.delete_component(page, true).unwrap();
    states.push(s.store().snapshot());
    assert!(s.store().is_empty());

    // Walk all the way back, then all the way forward.
    for expected in states.iter().rev().skip(1) {
        assert!(s.undo().is_some());
        assert_eq!(&s.store().snapshot(), expected);
    }
    assert!(!s.can_undo());
    assert_eq!(s.undo(), None);

    for expected in states.iter().skip(1) {
        assert!(s.redo().is_some());
        assert_eq!(&s.store().snapshot(), expected);
    }
    assert!(!s.can_redo());
}

#[test]
fn non_cascade_delete_undoes_exactly() {
    let mut s = session();
    let form = s.add_component(ComponentType::Form, None, None).unwrap();
    let a = s.add_component(ComponentType::Input, Some(form), None).unwrap();
    let b = s.add_component(ComponentType::Button, Some(form), None).unwrap();
    let before = s.store().snapshot();

    s.delete_component(form, false).unwrap();
    assert_eq!(s.store().children(None), &[a, b]);

    s.undo();
    assert_eq!(s.store().snapshot(), before);
    assert_eq!(s.store().children(Some(form)), &[a, b]);
}

// ─── Branch invalidation ─────────────────────────────────────────────────

#[test]
fn new_action_after_undo_clears_redo() {
    let mut s = session();
    let id = s.add_component(ComponentType::Text, None, None).unwrap();
    s.update_component(id, &ComponentPatch::new().prop("content", "one"))
        .unwrap();
    s.undo();
    assert!(s.can_redo());

    s.update_component(id, &ComponentPatch::new().prop("content", "two"))
        .unwrap();
    assert!(!s.can_redo());
    assert_eq!(s.redo(), None);
    assert_eq!(s.store().get(id).unwrap().props["content"], PropValue::from("two"));
}

#[test]
fn rejected_action_keeps_redo() {
    let mut s = session();
    let a = s.add_component(ComponentType::Container, None, None).unwrap();
    let b = s.add_component(ComponentType::Container, Some(a), None).unwrap();
    s.undo();
    assert!(s.can_redo());

    // Fails validation and records nothing.
    let ghost = ComponentId::intern("undo_ghost");
    assert!(s.move_component(a, Some(ghost), 0).is_err());
    assert!(s.can_redo());
    s.redo();
    assert_eq!(s.store().parent_of(b), Some(a));
}

// ─── Gestures ────────────────────────────────────────────────────────────

#[test]
fn drag_gesture_undoes_as_one_step() {
    let mut s = session();
    let list = s.add_component(ComponentType::List, None, None).unwrap();
    let items: Vec<ComponentId> = (0..3)
        .map(|_| s.add_component(ComponentType::Text, Some(list), None).unwrap())
        .collect();
    let before = s.store().snapshot();
    let steps = s.history().undo_len();

    s.begin_gesture("reorder");
    for index in [1, 2, 0, 2] {
        s.move_component(items[0], Some(list), index).unwrap();
    }
    assert!(s.end_gesture());
    assert_eq!(s.history().undo_len(), steps + 1);

    s.undo();
    assert_eq!(s.store().snapshot(), before);
}

#[test]
fn undo_depth_follows_config() {
    let config = EditorConfig::from_json(r#"{"history_depth": 2}"#).unwrap();
    let mut s = EditorSession::init("shallow", config);
    for _ in 0..4 {
        s.add_component(ComponentType::Badge, None, None).unwrap();
    }
    assert!(s.undo().is_some());
    assert!(s.undo().is_some());
    assert_eq!(s.undo(), None);
    assert_eq!(s.store().len(), 2);
}

#[test]
fn zero_depth_config_still_keeps_one_step() {
    let config = EditorConfig::from_json(r#"{"history_depth": 0}"#).unwrap();
    let mut s = EditorSession::init("no_depth", config);
    s.add_component(ComponentType::Badge, None, None).unwrap();
    s.add_component(ComponentType::Badge, None, None).unwrap();
    assert!(s.undo().is_some());
    assert_eq!(s.undo(), None);
    assert_eq!(s.store().len(), 1);
}
