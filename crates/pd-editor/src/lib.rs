pub mod autosave;
pub mod canvas;
pub mod config;
pub mod history;
pub mod selection;
pub mod session;
pub mod shortcuts;
pub mod storage;

pub use autosave::{AutoSave, ErrorCallback, SaveOutcome};
pub use canvas::CanvasState;
pub use config::{AutoSaveConfig, EditorConfig};
pub use history::{History, HistoryEntry};
pub use selection::{DragState, SelectionRect, SelectionState};
pub use session::{EditorSession, SharedSession, ShortcutOutcome, lock_session};
pub use shortcuts::{ShortcutAction, ShortcutMap};
pub use storage::{DocumentStore, InMemoryDocumentStore, StoreError};
