pub mod error;
pub mod hierarchy;
pub mod id;
pub mod lint;
pub mod model;
pub mod page;
pub mod registry;
pub mod serialize;
pub mod store;

pub use error::{SerializeError, TreeError};
pub use hierarchy::{ChildIndex, DEFAULT_MAX_DEPTH, HierarchyNode, build_hierarchy};
pub use id::ComponentId;
pub use lint::{LintDiagnostic, LintSeverity, lint_tree};
pub use model::*;
pub use page::{ComponentRecord, FORMAT_VERSION, PageConfig, PageDesign, PageStatus, TreeDocument};
pub use registry::{BuiltinRegistry, ComponentDefaults, ComponentRegistry};
pub use serialize::{
    ExportedPage, ImportedPage, SerializationWarning, Serialized, deserialize, export_page,
    from_document, import_page, serialize, to_document,
};
pub use store::{TreeResult, TreeStore};
