//! Persisted page-design documents.
//!
//! These are the JSON-safe shapes that cross the storage boundary. Live
//! values (`PropValue::Date`, `PropValue::Function`) never appear here; the
//! serializer converts between the two worlds.

use crate::hierarchy::HierarchyNode;
use crate::id::ComponentId;
use crate::model::{ComponentMeta, ComponentType, Position};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Current component-tree document format.
pub const FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

/// Page-level settings: document title plus free-form meta, global styles
/// and layout options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default)]
    pub styles: Map<String, Value>,
    #[serde(default)]
    pub layout: Map<String, Value>,
}

/// One component as stored: identical to `ComponentNode` but with every
/// property bag already encoded to plain JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub id: ComponentId,
    #[serde(default)]
    pub page_design_id: String,
    pub component_type: ComponentType,
    #[serde(default)]
    pub parent_id: Option<ComponentId>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub props: Map<String, Value>,
    #[serde(default)]
    pub styles: Map<String, Value>,
    #[serde(default)]
    pub events: Map<String, Value>,
    #[serde(default)]
    pub responsive: Map<String, Value>,
    #[serde(default)]
    pub layout_props: Map<String, Value>,
    #[serde(default)]
    pub meta: ComponentMeta,
    #[serde(default = "first_version")]
    pub version: u64,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

fn first_version() -> u64 {
    1
}

fn format_version() -> String {
    FORMAT_VERSION.to_string()
}

/// The `component_tree` payload of a page design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeDocument {
    #[serde(default = "format_version")]
    pub version: String,
    #[serde(default)]
    pub page_design_id: String,
    #[serde(default)]
    pub root_id: Option<ComponentId>,
    #[serde(default)]
    pub components: BTreeMap<ComponentId, ComponentRecord>,
    /// Derived nesting, stored for consumers that do not rebuild it.
    /// `parent_id` on each record stays authoritative.
    #[serde(default)]
    pub hierarchy: Vec<HierarchyNode>,
}

impl Default for TreeDocument {
    fn default() -> Self {
        Self {
            version: format_version(),
            page_design_id: String::new(),
            root_id: None,
            components: BTreeMap::new(),
            hierarchy: Vec::new(),
        }
    }
}

/// The document container persisted per page-design id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDesign {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: PageConfig,
    #[serde(default)]
    pub status: PageStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub shared_with: Vec<String>,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub root_component_id: Option<ComponentId>,
    #[serde(default)]
    pub component_tree: TreeDocument,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl PageDesign {
    /// A fresh, empty draft at version 0 (never persisted).
    pub fn new(id: &str, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            config: PageConfig {
                title: name.to_string(),
                ..Default::default()
            },
            status: PageStatus::Draft,
            tags: Vec::new(),
            shared_with: Vec::new(),
            version: 0,
            root_component_id: None,
            component_tree: TreeDocument {
                page_design_id: id.to_string(),
                ..Default::default()
            },
            created_at: now,
            updated_at: now,
        }
    }
}
