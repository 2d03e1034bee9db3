//! Integration tests: selection coordinator inside a session.

use pd_core::*;
use pd_editor::{EditorConfig, EditorSession, SelectionRect, SelectionState};
use pretty_assertions::assert_eq;

#[test]
fn select_toggle_and_clear() {
    let x = ComponentId::intern("sel_it_x");
    let y = ComponentId::intern("sel_it_y");
    let mut sel = SelectionState::new();

    sel.select(x, false);
    sel.select(y, true);
    assert_eq!(sel.selected(), &[x, y]);
    assert_eq!(sel.active(), Some(y));

    sel.clear_selection();
    assert!(sel.selected().is_empty());
    assert_eq!(sel.active(), None);
}

#[test]
fn cascade_delete_prunes_selected_descendants() {
    let mut s = EditorSession::init("sel_page", EditorConfig::default());
    let card = s.add_component(ComponentType::Card, None, None).unwrap();
    let title = s.add_component(ComponentType::Heading, Some(card), None).unwrap();
    let other = s.add_component(ComponentType::Text, None, None).unwrap();

    s.select(title, false);
    s.select(other, true);
    s.set_hovered(Some(title));

    let removed = s.delete_component(card, true).unwrap();
    assert!(removed.contains(&title));
    assert_eq!(s.selection().selected(), &[other]);
    assert_eq!(s.selection().active(), Some(other));
    assert_eq!(s.selection().hovered(), None);
}

#[test]
fn rect_select_ignores_unknown_ids() {
    let mut s = EditorSession::init("sel_rect", EditorConfig::default());
    let a = s.add_component(ComponentType::Image, None, None).unwrap();
    let b = s.add_component(ComponentType::Image, None, None).unwrap();

    s.start_multi_select(SelectionRect::from_points(0.0, 0.0, 0.0, 0.0));
    s.update_multi_select(SelectionRect::from_points(0.0, 0.0, 300.0, 200.0));
    assert!(s.selection().is_multi_selecting());

    s.end_multi_select(&[a, ComponentId::intern("sel_rect_stale"), b]);
    assert_eq!(s.selection().selected(), &[a, b]);
    assert_eq!(s.selection().active(), Some(b));
}

#[test]
fn select_parent_climbs_one_level() {
    let mut s = EditorSession::init("sel_parent", EditorConfig::default());
    let row = s.add_component(ComponentType::Row, None, None).unwrap();
    let col = s.add_component(ComponentType::Col, Some(row), None).unwrap();
    assert_eq!(s.selection().active(), Some(col));

    s.select_parent();
    assert_eq!(s.selection().selected(), &[row]);

    // Already at the top: nothing changes.
    let rev = s.revision();
    s.select_parent();
    assert_eq!(s.selection().selected(), &[row]);
    assert_eq!(s.revision(), rev);
}

#[test]
fn selection_changes_never_touch_content_or_history() {
    let mut s = EditorSession::init("sel_content", EditorConfig::default());
    let a = s.add_component(ComponentType::Link, None, None).unwrap();
    let tree = s.store().snapshot();
    let steps = s.history().undo_len();

    s.select(a, true);
    s.select_all();
    s.copy_selected();
    s.clear_selection();
    s.start_drag(&[a]);
    s.end_drag().unwrap();

    assert_eq!(s.store().snapshot(), tree);
    assert_eq!(s.history().undo_len(), steps);
}
