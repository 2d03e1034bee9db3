use crate::id::ComponentId;
use crate::model::ComponentType;

/// Structural failures of Tree Store operations. Every variant is returned
/// before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("component {0} not found")]
    NotFound(ComponentId),

    #[error("parent component {0} does not exist")]
    InvalidParent(ComponentId),

    #[error("component id {0} already exists")]
    DuplicateId(ComponentId),

    #[error("moving {id} under {new_parent} would create a cycle")]
    Cycle {
        id: ComponentId,
        new_parent: ComponentId,
    },

    #[error("invalid {component_type} props: {}", .messages.join("; "))]
    Validation {
        component_type: ComponentType,
        messages: Vec<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("malformed document JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document format {found} is newer than supported format {supported}")]
    UnsupportedVersion { found: String, supported: &'static str },
}
