//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic `ShortcutAction`s so every host
//! (web shell, desktop shell, tests) shares one binding table.

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    // ── Edit ──
    Undo,
    Redo,
    Delete,
    SelectAll,
    Duplicate,
    Copy,
    Cut,
    Paste,
    Save,

    // ── Selection ──
    Deselect,
    /// Move the selection to the active component's parent.
    SelectParent,

    // ── View ──
    ZoomIn,
    ZoomOut,
    ZoomReset,

    // ── Z-order ──
    SendToBack,
    BringToFront,
}

impl ShortcutAction {
    /// Stable camelCase name for host bindings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::Delete => "delete",
            Self::SelectAll => "selectAll",
            Self::Duplicate => "duplicate",
            Self::Copy => "copy",
            Self::Cut => "cut",
            Self::Paste => "paste",
            Self::Save => "save",
            Self::Deselect => "deselect",
            Self::SelectParent => "selectParent",
            Self::ZoomIn => "zoomIn",
            Self::ZoomOut => "zoomOut",
            Self::ZoomReset => "zoomReset",
            Self::SendToBack => "sendToBack",
            Self::BringToFront => "bringToFront",
        }
    }
}

/// Resolves key events into shortcut actions.
///
/// On macOS `meta` is ⌘; elsewhere `ctrl` plays the same role, so either
/// counts as the command modifier.
pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a key event to an action.
    ///
    /// `key` is the `KeyboardEvent.key` value (e.g. `"z"`, `"Delete"`).
    /// Returns `None` if the key combo has no binding.
    pub fn resolve(key: &str, ctrl: bool, shift: bool, _alt: bool, meta: bool) -> Option<ShortcutAction> {
        let cmd = ctrl || meta;

        // ── Modifier combos first (most specific) ──
        if cmd && shift {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Redo),
                "[" | "{" => Some(ShortcutAction::SendToBack),
                "]" | "}" => Some(ShortcutAction::BringToFront),
                _ => None,
            };
        }

        if cmd {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Undo),
                "y" | "Y" => Some(ShortcutAction::Redo),
                "a" | "A" => Some(ShortcutAction::SelectAll),
                "d" | "D" => Some(ShortcutAction::Duplicate),
                "c" | "C" => Some(ShortcutAction::Copy),
                "x" | "X" => Some(ShortcutAction::Cut),
                "v" | "V" => Some(ShortcutAction::Paste),
                "s" | "S" => Some(ShortcutAction::Save),
                "=" | "+" => Some(ShortcutAction::ZoomIn),
                "-" => Some(ShortcutAction::ZoomOut),
                "0" => Some(ShortcutAction::ZoomReset),
                _ => None,
            };
        }

        if shift {
            return None;
        }

        // ── Single keys (no modifiers) ──
        match key {
            "Delete" | "Backspace" => Some(ShortcutAction::Delete),
            "Escape" => Some(ShortcutAction::Deselect),
            "Enter" => Some(ShortcutAction::SelectParent),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_undo_redo() {
        // Cmd+Z → Undo
        assert_eq!(
            ShortcutMap::resolve("z", false, false, false, true),
            Some(ShortcutAction::Undo)
        );
        // Ctrl+Z → Undo
        assert_eq!(
            ShortcutMap::resolve("z", true, false, false, false),
            Some(ShortcutAction::Undo)
        );
        // Cmd+Shift+Z → Redo
        assert_eq!(
            ShortcutMap::resolve("Z", false, true, false, true),
            Some(ShortcutAction::Redo)
        );
        // Ctrl+Y → Redo
        assert_eq!(
            ShortcutMap::resolve("y", true, false, false, false),
            Some(ShortcutAction::Redo)
        );
    }

    #[test]
    fn resolve_clipboard() {
        assert_eq!(
            ShortcutMap::resolve("c", true, false, false, false),
            Some(ShortcutAction::Copy)
        );
        assert_eq!(
            ShortcutMap::resolve("x", false, false, false, true),
            Some(ShortcutAction::Cut)
        );
        assert_eq!(
            ShortcutMap::resolve("v", true, false, false, false),
            Some(ShortcutAction::Paste)
        );
        assert_eq!(
            ShortcutMap::resolve("d", true, false, false, false),
            Some(ShortcutAction::Duplicate)
        );
    }

    #[test]
    fn resolve_delete_and_escape() {
        assert_eq!(
            ShortcutMap::resolve("Delete", false, false, false, false),
            Some(ShortcutAction::Delete)
        );
        assert_eq!(
            ShortcutMap::resolve("Backspace", false, false, false, false),
            Some(ShortcutAction::Delete)
        );
        assert_eq!(
            ShortcutMap::resolve("Escape", false, false, false, false),
            Some(ShortcutAction::Deselect)
        );
    }

    #[test]
    fn resolve_zoom_and_z_order() {
        assert_eq!(
            ShortcutMap::resolve("=", true, false, false, false),
            Some(ShortcutAction::ZoomIn)
        );
        assert_eq!(
            ShortcutMap::resolve("0", false, false, false, true),
            Some(ShortcutAction::ZoomReset)
        );
        assert_eq!(
            ShortcutMap::resolve("]", true, true, false, false),
            Some(ShortcutAction::BringToFront)
        );
        assert_eq!(
            ShortcutMap::resolve("[", false, true, false, true),
            Some(ShortcutAction::SendToBack)
        );
    }

    #[test]
    fn unbound_keys_resolve_to_none() {
        assert_eq!(ShortcutMap::resolve("q", false, false, false, false), None);
        assert_eq!(ShortcutMap::resolve("q", true, false, false, false), None);
        // Shift alone never triggers an edit.
        assert_eq!(ShortcutMap::resolve("Delete", false, true, false, false), None);
        // Plain letters are reserved for text entry.
        assert_eq!(ShortcutMap::resolve("z", false, false, false, false), None);
    }

    #[test]
    fn names_are_camel_case() {
        assert_eq!(ShortcutAction::SelectAll.as_str(), "selectAll");
        assert_eq!(ShortcutAction::BringToFront.as_str(), "bringToFront");
    }
}
