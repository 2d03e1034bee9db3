//! Live tree ⇄ versioned JSON document.
//!
//! Encoding rules for every property bag, applied recursively:
//!
//! | live value            | persisted form                              |
//! |-----------------------|---------------------------------------------|
//! | `Function`            | dropped, reported as a `SerializationWarning` |
//! | `Date`                | `{"_type": "date", "_value": "<rfc3339>"}`  |
//! | `Object` with `_type` | `{"_type": "object", "_value": {…}}`        |
//! | `Array` / `Object`    | recursed with the same rules                |
//! | anything else         | copied verbatim                             |
//!
//! `deserialize(serialize(tree))` reproduces `tree` exactly when it holds no
//! functions. Function-valued entries vanish on the way out and are never
//! reintroduced. Reading is lenient: absent or malformed top-level fields
//! fall back to defaults and unreadable component records are skipped.

use crate::error::SerializeError;
use crate::hierarchy::{DEFAULT_MAX_DEPTH, HierarchyNode, build_hierarchy};
use crate::id::ComponentId;
use crate::model::{ComponentNode, ComponentTree, Namespace, PropMap, PropValue};
use crate::page::{ComponentRecord, FORMAT_VERSION, PageConfig, PageDesign, TreeDocument};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;

const TYPE_KEY: &str = "_type";
const VALUE_KEY: &str = "_value";
const DATE_TAG: &str = "date";
/// Escapes a plain object whose own keys would read as a wrapper.
const OBJECT_TAG: &str = "object";

/// A function-valued entry that was left out of the persisted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationWarning {
    pub component_id: ComponentId,
    pub namespace: Namespace,
    /// Key path inside the namespace, e.g. `onClick` or `items[2].render`.
    pub path: String,
}

impl fmt::Display for SerializationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dropped function-valued {}.{} on component {}",
            self.namespace, self.path, self.component_id
        )
    }
}

/// Output of `serialize`.
#[derive(Debug, Clone)]
pub struct Serialized {
    pub json: String,
    pub warnings: Vec<SerializationWarning>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    version: &'a str,
    timestamp: DateTime<Utc>,
    data: &'a TreeDocument,
}

// ─── Tree → document ─────────────────────────────────────────────────────

/// Serialize a tree into the `{version, timestamp, data}` envelope.
pub fn serialize(tree: &ComponentTree) -> Result<Serialized, SerializeError> {
    let (document, warnings) = to_document(tree);
    let json = serde_json::to_string(&Envelope {
        version: FORMAT_VERSION,
        timestamp: Utc::now(),
        data: &document,
    })?;
    Ok(Serialized { json, warnings })
}

/// Encode a tree into the persisted `TreeDocument` shape.
pub fn to_document(tree: &ComponentTree) -> (TreeDocument, Vec<SerializationWarning>) {
    let mut warnings = Vec::new();
    let components = tree
        .components
        .values()
        .map(|node| (node.id, encode_node(node, &mut warnings)))
        .collect();
    for w in &warnings {
        log::warn!("{w}");
    }
    let document = TreeDocument {
        version: FORMAT_VERSION.to_string(),
        page_design_id: tree.page_design_id.clone(),
        root_id: tree.root_id,
        components,
        hierarchy: build_hierarchy(tree, DEFAULT_MAX_DEPTH),
    };
    (document, warnings)
}

fn encode_node(node: &ComponentNode, warnings: &mut Vec<SerializationWarning>) -> ComponentRecord {
    let mut bag = |ns: Namespace| encode_map(node.namespace(ns), node.id, ns, "", warnings);
    ComponentRecord {
        id: node.id,
        page_design_id: node.page_design_id.clone(),
        component_type: node.component_type,
        parent_id: node.parent_id,
        position: node.position,
        props: bag(Namespace::Props),
        styles: bag(Namespace::Styles),
        events: bag(Namespace::Events),
        responsive: bag(Namespace::Responsive),
        layout_props: bag(Namespace::LayoutProps),
        meta: node.meta.clone(),
        version: node.version,
        created_at: node.created_at,
        updated_at: node.updated_at,
    }
}

fn encode_map(
    map: &PropMap,
    id: ComponentId,
    ns: Namespace,
    prefix: &str,
    warnings: &mut Vec<SerializationWarning>,
) -> Map<String, Value> {
    map.iter()
        .filter_map(|(key, value)| {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            encode_value(value, id, ns, &path, warnings).map(|v| (key.clone(), v))
        })
        .collect()
}

/// `None` means "omit this entry".
fn encode_value(
    value: &PropValue,
    id: ComponentId,
    ns: Namespace,
    path: &str,
    warnings: &mut Vec<SerializationWarning>,
) -> Option<Value> {
    match value {
        PropValue::Function(_) => {
            warnings.push(SerializationWarning {
                component_id: id,
                namespace: ns,
                path: path.to_string(),
            });
            None
        }
        PropValue::Date(d) => Some(json!({
            TYPE_KEY: DATE_TAG,
            VALUE_KEY: d.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        })),
        PropValue::Array(items) => Some(Value::Array(
            items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| encode_value(item, id, ns, &format!("{path}[{i}]"), warnings))
                .collect(),
        )),
        PropValue::Object(map) => {
            let encoded = Value::Object(encode_map(map, id, ns, path, warnings));
            Some(if map.contains_key(TYPE_KEY) {
                json!({ TYPE_KEY: OBJECT_TAG, VALUE_KEY: encoded })
            } else {
                encoded
            })
        }
        PropValue::Null => Some(Value::Null),
        PropValue::Bool(b) => Some(Value::Bool(*b)),
        PropValue::Number(n) => Some(Value::Number(n.clone())),
        PropValue::String(s) => Some(Value::String(s.clone())),
    }
}

// ─── Document → tree ─────────────────────────────────────────────────────

/// Parse an envelope produced by `serialize`. Invalid JSON text and a newer
/// major format are errors; structural damage degrades to defaults.
pub fn deserialize(json: &str) -> Result<ComponentTree, SerializeError> {
    let root: Value = serde_json::from_str(json)?;
    let version = root
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or(FORMAT_VERSION);
    check_version(version)?;
    let document = document_from_value(root.get("data").unwrap_or(&Value::Null));
    Ok(from_document(&document))
}

/// Same major format: readable (minor differences are logged). Newer major:
/// refused. Unparseable version strings are read optimistically.
fn check_version(version: &str) -> Result<(), SerializeError> {
    if version == FORMAT_VERSION {
        return Ok(());
    }
    let major = |v: &str| v.split('.').next().and_then(|m| m.trim().parse::<u32>().ok());
    if let (Some(found), Some(supported)) = (major(version), major(FORMAT_VERSION))
        && found > supported
    {
        return Err(SerializeError::UnsupportedVersion {
            found: version.to_string(),
            supported: FORMAT_VERSION,
        });
    }
    log::warn!("reading component tree written as format {version}; expected {FORMAT_VERSION}");
    Ok(())
}

/// Leniently read a `TreeDocument` out of arbitrary JSON.
pub fn document_from_value(value: &Value) -> TreeDocument {
    let mut document = TreeDocument::default();
    let Some(obj) = value.as_object() else {
        if !value.is_null() {
            log::warn!("component tree payload is not an object; treating as empty");
        }
        return document;
    };
    if let Some(v) = obj.get("version").and_then(Value::as_str) {
        document.version = v.to_string();
    }
    if let Some(p) = obj.get("page_design_id").and_then(Value::as_str) {
        document.page_design_id = p.to_string();
    }
    document.root_id = obj
        .get("root_id")
        .and_then(Value::as_str)
        .map(ComponentId::intern);
    if let Some(components) = obj.get("components").and_then(Value::as_object) {
        document.components = read_records(components);
    }
    if let Some(h) = obj.get("hierarchy") {
        document.hierarchy = Vec::<HierarchyNode>::deserialize(h).unwrap_or_default();
    }
    document
}

fn read_records(components: &Map<String, Value>) -> BTreeMap<ComponentId, ComponentRecord> {
    components
        .iter()
        .filter_map(|(key, raw)| match ComponentRecord::deserialize(raw) {
            Ok(record) => Some((record.id, record)),
            Err(e) => {
                log::warn!("skipping unreadable component record {key}: {e}");
                None
            }
        })
        .collect()
}

/// Decode a persisted document back into a live tree. The stored
/// `hierarchy` is ignored; `parent_id` is authoritative.
pub fn from_document(document: &TreeDocument) -> ComponentTree {
    let page_design_id = if document.page_design_id.is_empty() {
        document
            .components
            .values()
            .next()
            .map(|r| r.page_design_id.clone())
            .unwrap_or_default()
    } else {
        document.page_design_id.clone()
    };
    let components = document
        .components
        .values()
        .map(|record| (record.id, decode_record(record)))
        .collect();
    ComponentTree {
        page_design_id,
        root_id: document.root_id,
        components,
    }
}

fn decode_record(record: &ComponentRecord) -> ComponentNode {
    ComponentNode {
        id: record.id,
        page_design_id: record.page_design_id.clone(),
        component_type: record.component_type,
        parent_id: record.parent_id,
        position: record.position,
        props: decode_map(&record.props),
        styles: decode_map(&record.styles),
        events: decode_map(&record.events),
        responsive: decode_map(&record.responsive),
        layout_props: decode_map(&record.layout_props),
        meta: record.meta.clone(),
        version: record.version,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

fn decode_map(map: &Map<String, Value>) -> PropMap {
    map.iter()
        .map(|(k, v)| (k.clone(), decode_value(v)))
        .collect()
}

fn decode_value(value: &Value) -> PropValue {
    match value {
        Value::Null => PropValue::Null,
        Value::Bool(b) => PropValue::Bool(*b),
        Value::Number(n) => PropValue::Number(n.clone()),
        Value::String(s) => PropValue::String(s.clone()),
        Value::Array(items) => PropValue::Array(items.iter().map(decode_value).collect()),
        Value::Object(map) => {
            decode_wrapper(map).unwrap_or_else(|| PropValue::Object(decode_map(map)))
        }
    }
}

/// A `{"_type":…,"_value":…}` wrapper: a date with a parseable timestamp,
/// or an escaped object.
fn decode_wrapper(map: &Map<String, Value>) -> Option<PropValue> {
    if map.len() != 2 {
        return None;
    }
    let value = map.get(VALUE_KEY)?;
    match map.get(TYPE_KEY)?.as_str()? {
        DATE_TAG => DateTime::parse_from_rfc3339(value.as_str()?)
            .ok()
            .map(|d| PropValue::Date(d.with_timezone(&Utc))),
        OBJECT_TAG => Some(PropValue::Object(decode_map(value.as_object()?))),
        _ => None,
    }
}

// ─── Export / import ─────────────────────────────────────────────────────

/// Page metadata carried by an export file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExportedPage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: PageConfig,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportFile<'a> {
    version: &'a str,
    export_time: DateTime<Utc>,
    page_design: ExportedPage,
    components: &'a BTreeMap<ComponentId, ComponentRecord>,
    component_tree: ExportedTree<'a>,
}

#[derive(Serialize)]
struct ExportedTree<'a> {
    root_id: Option<ComponentId>,
    hierarchy: &'a [HierarchyNode],
}

/// Result of `import_page`.
#[derive(Debug, Clone)]
pub struct ImportedPage {
    pub page: ExportedPage,
    pub tree: ComponentTree,
}

impl ImportedPage {
    /// Rebind every component to a different page design, e.g. when an
    /// export is uploaded as a new page.
    pub fn retarget(&mut self, page_design_id: &str) {
        self.tree.page_design_id = page_design_id.to_string();
        for node in self.tree.components.values_mut() {
            node.page_design_id = page_design_id.to_string();
        }
    }
}

/// Produce a download-as-file document for `page` with the content of `tree`.
pub fn export_page(page: &PageDesign, tree: &ComponentTree) -> Result<Serialized, SerializeError> {
    let (document, warnings) = to_document(tree);
    let file = ExportFile {
        version: FORMAT_VERSION,
        export_time: Utc::now(),
        page_design: ExportedPage {
            id: page.id.clone(),
            name: page.name.clone(),
            description: page.description.clone(),
            config: page.config.clone(),
            tags: page.tags.clone(),
        },
        components: &document.components,
        component_tree: ExportedTree {
            root_id: document.root_id,
            hierarchy: &document.hierarchy,
        },
    };
    let json = serde_json::to_string_pretty(&file)?;
    Ok(Serialized { json, warnings })
}

/// Read an export file. Unknown top-level keys are ignored.
pub fn import_page(json: &str) -> Result<ImportedPage, SerializeError> {
    let root: Value = serde_json::from_str(json)?;
    let page = root
        .get("pageDesign")
        .and_then(|v| ExportedPage::deserialize(v).ok())
        .unwrap_or_default();
    let components = root
        .get("components")
        .and_then(Value::as_object)
        .map(read_records)
        .unwrap_or_default();
    let root_id = root
        .get("componentTree")
        .and_then(|t| t.get("root_id"))
        .and_then(Value::as_str)
        .map(ComponentId::intern);
    let document = TreeDocument {
        page_design_id: page.id.clone(),
        root_id,
        components,
        ..Default::default()
    };
    Ok(ImportedPage {
        page,
        tree: from_document(&document),
    })
}
