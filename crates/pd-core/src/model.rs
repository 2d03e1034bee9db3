//! Core data model for page designs.
//!
//! A page is a flat arena of `ComponentNode` values keyed by `ComponentId`.
//! Containment is expressed by each node's `parent_id` back-reference, not by
//! owned child lists; the Tree Store derives a parent→children index from it.
//! Property bags are open maps of live `PropValue`s whose shape depends on the
//! node's `ComponentType` and is checked by the registry, not by the store.

use crate::id::ComponentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

// ─── Component types ─────────────────────────────────────────────────────

/// The palette of placeable components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Button,
    Input,
    Textarea,
    Select,
    Checkbox,
    Radio,
    Switch,
    Text,
    Heading,
    Link,
    Image,
    Icon,
    Badge,
    Divider,
    Container,
    Row,
    Col,
    Form,
    Card,
    List,
    Table,
}

impl ComponentType {
    pub const ALL: [ComponentType; 21] = [
        Self::Button,
        Self::Input,
        Self::Textarea,
        Self::Select,
        Self::Checkbox,
        Self::Radio,
        Self::Switch,
        Self::Text,
        Self::Heading,
        Self::Link,
        Self::Image,
        Self::Icon,
        Self::Badge,
        Self::Divider,
        Self::Container,
        Self::Row,
        Self::Col,
        Self::Form,
        Self::Card,
        Self::List,
        Self::Table,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Input => "input",
            Self::Textarea => "textarea",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Switch => "switch",
            Self::Text => "text",
            Self::Heading => "heading",
            Self::Link => "link",
            Self::Image => "image",
            Self::Icon => "icon",
            Self::Badge => "badge",
            Self::Divider => "divider",
            Self::Container => "container",
            Self::Row => "row",
            Self::Col => "col",
            Self::Form => "form",
            Self::Card => "card",
            Self::List => "list",
            Self::Table => "table",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    /// Whether the designer offers this type as a drop target for children.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Container | Self::Row | Self::Col | Self::Form | Self::Card | Self::List
        )
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Live property values ────────────────────────────────────────────────

/// A callable attached to a component at edit time (e.g. a preview event
/// handler). Never persisted; equality is identity of the closure.
#[derive(Clone)]
pub struct FunctionRef {
    name: Arc<str>,
    func: Arc<dyn Fn(&[PropValue]) -> PropValue + Send + Sync>,
}

impl FunctionRef {
    pub fn new(
        name: &str,
        func: impl Fn(&[PropValue]) -> PropValue + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[PropValue]) -> PropValue {
        (self.func)(args)
    }
}

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name)
    }
}

/// A live property value. The JSON-safe variants mirror `serde_json::Value`;
/// `Date` and `Function` only exist in memory and are handled explicitly by
/// the serializer.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<PropValue>),
    Object(PropMap),
    Date(DateTime<Utc>),
    Function(FunctionRef),
}

/// Ordered string → value map used for every property namespace.
pub type PropMap = BTreeMap<String, PropValue>;

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Short name of the variant, used in validation messages.
    pub fn kind(&self) -> &'static str {
        match self {
            PropValue::Null => "null",
            PropValue::Bool(_) => "bool",
            PropValue::Number(_) => "number",
            PropValue::String(_) => "string",
            PropValue::Array(_) => "array",
            PropValue::Object(_) => "object",
            PropValue::Date(_) => "date",
            PropValue::Function(_) => "function",
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::String(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::String(s)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

impl From<i64> for PropValue {
    fn from(n: i64) -> Self {
        PropValue::Number(n.into())
    }
}

/// Non-finite floats have no JSON representation and become `Null`.
impl From<f64> for PropValue {
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n)
            .map(PropValue::Number)
            .unwrap_or(PropValue::Null)
    }
}

impl From<DateTime<Utc>> for PropValue {
    fn from(d: DateTime<Utc>) -> Self {
        PropValue::Date(d)
    }
}

impl From<FunctionRef> for PropValue {
    fn from(f: FunctionRef) -> Self {
        PropValue::Function(f)
    }
}

impl From<Vec<PropValue>> for PropValue {
    fn from(items: Vec<PropValue>) -> Self {
        PropValue::Array(items)
    }
}

impl From<PropMap> for PropValue {
    fn from(map: PropMap) -> Self {
        PropValue::Object(map)
    }
}

/// Build a `PropMap` from key/value pairs.
pub fn prop_map<K, V, I>(pairs: I) -> PropMap
where
    K: Into<String>,
    V: Into<PropValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// The property namespaces carried by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Props,
    Styles,
    Events,
    Responsive,
    LayoutProps,
}

impl Namespace {
    pub const ALL: [Namespace; 5] = [
        Self::Props,
        Self::Styles,
        Self::Events,
        Self::Responsive,
        Self::LayoutProps,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Props => "props",
            Self::Styles => "styles",
            Self::Events => "events",
            Self::Responsive => "responsive",
            Self::LayoutProps => "layout_props",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Component nodes ─────────────────────────────────────────────────────

/// Paint order and sibling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub z_index: i32,
    pub order: u32,
}

/// Editor-only flags and labels.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComponentMeta {
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A single placed UI element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentNode {
    pub id: ComponentId,
    pub page_design_id: String,
    pub component_type: ComponentType,
    /// Weak reference to the containing node; `None` for root-level nodes.
    pub parent_id: Option<ComponentId>,
    pub position: Position,
    pub props: PropMap,
    pub styles: PropMap,
    pub events: PropMap,
    pub responsive: PropMap,
    pub layout_props: PropMap,
    pub meta: ComponentMeta,
    /// Version as last loaded. Edits leave it alone; the session assigns
    /// the next version when the page is persisted.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ComponentNode {
    pub fn new(id: ComponentId, page_design_id: &str, component_type: ComponentType) -> Self {
        let now = Utc::now();
        Self {
            id,
            page_design_id: page_design_id.to_string(),
            component_type,
            parent_id: None,
            position: Position::default(),
            props: PropMap::new(),
            styles: PropMap::new(),
            events: PropMap::new(),
            responsive: PropMap::new(),
            layout_props: PropMap::new(),
            meta: ComponentMeta::default(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn namespace(&self, ns: Namespace) -> &PropMap {
        match ns {
            Namespace::Props => &self.props,
            Namespace::Styles => &self.styles,
            Namespace::Events => &self.events,
            Namespace::Responsive => &self.responsive,
            Namespace::LayoutProps => &self.layout_props,
        }
    }

    pub fn namespace_mut(&mut self, ns: Namespace) -> &mut PropMap {
        match ns {
            Namespace::Props => &mut self.props,
            Namespace::Styles => &mut self.styles,
            Namespace::Events => &mut self.events,
            Namespace::Responsive => &mut self.responsive,
            Namespace::LayoutProps => &mut self.layout_props,
        }
    }

    /// Label shown in layer panels: the custom name if set, else the type.
    pub fn display_name(&self) -> &str {
        self.meta
            .custom_name
            .as_deref()
            .unwrap_or(self.component_type.as_str())
    }

    /// Shallow-merge a patch: each namespace merges key by key, `meta`
    /// merges field by field. `id` and `created_at` are not reachable
    /// through a patch.
    pub fn apply_patch(&mut self, patch: &ComponentPatch) {
        for ns in Namespace::ALL {
            let target = self.namespace_mut(ns);
            for (k, v) in patch.namespace(ns) {
                target.insert(k.clone(), v.clone());
            }
        }
        if let Some(meta) = &patch.meta {
            if let Some(locked) = meta.locked {
                self.meta.locked = locked;
            }
            if let Some(hidden) = meta.hidden {
                self.meta.hidden = hidden;
            }
            if let Some(name) = &meta.custom_name {
                self.meta.custom_name = name.clone();
            }
            if let Some(notes) = &meta.notes {
                self.meta.notes = notes.clone();
            }
        }
        if let Some(z) = patch.z_index {
            self.position.z_index = z;
        }
    }

    /// The content of this node without identity or placement.
    pub fn to_template(&self) -> ComponentTemplate {
        ComponentTemplate {
            component_type: self.component_type,
            props: self.props.clone(),
            styles: self.styles.clone(),
            layout_props: self.layout_props.clone(),
        }
    }
}

/// A clipboard entry: what a component *is*, not where it lives.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentTemplate {
    pub component_type: ComponentType,
    pub props: PropMap,
    pub styles: PropMap,
    pub layout_props: PropMap,
}

impl ComponentTemplate {
    pub fn new(component_type: ComponentType) -> Self {
        Self {
            component_type,
            props: PropMap::new(),
            styles: PropMap::new(),
            layout_props: PropMap::new(),
        }
    }
}

/// Partial update of `ComponentMeta`. `Some(None)` clears an optional label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaPatch {
    pub locked: Option<bool>,
    pub hidden: Option<bool>,
    pub custom_name: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

/// Partial update of a component, merged shallowly per namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentPatch {
    pub props: PropMap,
    pub styles: PropMap,
    pub events: PropMap,
    pub responsive: PropMap,
    pub layout_props: PropMap,
    pub meta: Option<MetaPatch>,
    pub z_index: Option<i32>,
}

impl ComponentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(&self, ns: Namespace) -> &PropMap {
        match ns {
            Namespace::Props => &self.props,
            Namespace::Styles => &self.styles,
            Namespace::Events => &self.events,
            Namespace::Responsive => &self.responsive,
            Namespace::LayoutProps => &self.layout_props,
        }
    }

    pub fn prop(mut self, key: &str, value: impl Into<PropValue>) -> Self {
        self.props.insert(key.to_string(), value.into());
        self
    }

    pub fn style(mut self, key: &str, value: impl Into<PropValue>) -> Self {
        self.styles.insert(key.to_string(), value.into());
        self
    }

    pub fn event(mut self, key: &str, value: impl Into<PropValue>) -> Self {
        self.events.insert(key.to_string(), value.into());
        self
    }

    pub fn layout(mut self, key: &str, value: impl Into<PropValue>) -> Self {
        self.layout_props.insert(key.to_string(), value.into());
        self
    }

    pub fn meta(mut self, meta: MetaPatch) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn is_empty(&self) -> bool {
        Namespace::ALL.iter().all(|ns| self.namespace(*ns).is_empty())
            && self.meta.is_none()
            && self.z_index.is_none()
    }
}

// ─── Component tree ──────────────────────────────────────────────────────

/// The full content of one page design: the unit of undo snapshots and of
/// serialization. Equality is deep.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComponentTree {
    pub page_design_id: String,
    /// The page's designated root component, if any.
    pub root_id: Option<ComponentId>,
    pub components: HashMap<ComponentId, ComponentNode>,
}

impl ComponentTree {
    pub fn new(page_design_id: &str) -> Self {
        Self {
            page_design_id: page_design_id.to_string(),
            root_id: None,
            components: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, id: ComponentId) -> Option<&ComponentNode> {
        self.components.get(&id)
    }

    /// Component ids sorted by string value.
    pub fn sorted_ids(&self) -> Vec<ComponentId> {
        let mut ids: Vec<ComponentId> = self.components.keys().copied().collect();
        ids.sort();
        ids
    }
}
