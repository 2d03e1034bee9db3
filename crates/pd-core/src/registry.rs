//! Component-type registry: default content for new nodes and a per-type
//! prop schema checked at the store boundary.
//!
//! The store keeps props generically; this is the only place that knows what
//! a `button` or a `col` expects.

use crate::model::{ComponentType, PropMap, PropValue, prop_map};

/// Seed content for a freshly created component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentDefaults {
    pub props: PropMap,
    pub styles: PropMap,
    pub layout_props: PropMap,
}

/// Supplies defaults and validation for each component type.
pub trait ComponentRegistry: Send + Sync {
    fn defaults(&self, component_type: ComponentType) -> ComponentDefaults;

    /// Check a full props map. Returns one message per violation.
    fn validate(&self, component_type: ComponentType, props: &PropMap) -> Result<(), Vec<String>>;
}

/// Expected shape of a known prop.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PropKind {
    String,
    Bool,
    Array,
    /// Number within an inclusive range.
    Number(f64, f64),
}

impl PropKind {
    fn check(&self, key: &str, value: &PropValue) -> Option<String> {
        let ok = match (self, value) {
            // Null clears a prop and is always accepted.
            (_, PropValue::Null) => true,
            (PropKind::String, PropValue::String(_)) => true,
            (PropKind::Bool, PropValue::Bool(_)) => true,
            (PropKind::Array, PropValue::Array(_)) => true,
            (PropKind::Number(min, max), PropValue::Number(n)) => {
                return match n.as_f64() {
                    Some(v) if v >= *min && v <= *max => None,
                    _ => Some(format!("`{key}` must be between {min} and {max}, got {n}")),
                };
            }
            _ => false,
        };
        if ok {
            None
        } else {
            Some(format!(
                "`{key}` must be {}, got {}",
                self.describe(),
                value.kind()
            ))
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            PropKind::String => "a string",
            PropKind::Bool => "a bool",
            PropKind::Array => "an array",
            PropKind::Number(..) => "a number",
        }
    }
}

const ANY_NUMBER: PropKind = PropKind::Number(f64::MIN, f64::MAX);

/// Registry for the built-in palette.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRegistry;

impl BuiltinRegistry {
    fn schema(component_type: ComponentType) -> &'static [(&'static str, PropKind)] {
        use PropKind::*;
        match component_type {
            ComponentType::Button => &[
                ("label", String),
                ("variant", String),
                ("size", String),
                ("disabled", Bool),
            ],
            ComponentType::Input => &[
                ("placeholder", String),
                ("type", String),
                ("disabled", Bool),
                ("maxLength", Number(0.0, 1_000_000.0)),
            ],
            ComponentType::Textarea => &[("placeholder", String), ("rows", Number(1.0, 100.0))],
            ComponentType::Select => &[("placeholder", String), ("options", Array)],
            ComponentType::Checkbox | ComponentType::Switch => &[("label", String), ("checked", Bool)],
            ComponentType::Radio => &[("label", String), ("options", Array)],
            ComponentType::Text => &[("content", String)],
            ComponentType::Heading => &[("content", String), ("level", Number(1.0, 6.0))],
            ComponentType::Link => &[("text", String), ("href", String), ("target", String)],
            ComponentType::Image => &[("src", String), ("alt", String), ("fit", String)],
            ComponentType::Icon => &[("name", String), ("size", ANY_NUMBER)],
            ComponentType::Badge => &[("text", String), ("variant", String)],
            ComponentType::Divider => &[("orientation", String)],
            ComponentType::Container => &[],
            ComponentType::Row => &[("gutter", ANY_NUMBER), ("justify", String), ("align", String)],
            ComponentType::Col => &[("span", Number(1.0, 24.0)), ("offset", Number(0.0, 23.0))],
            ComponentType::Form => &[("layout", String), ("labelAlign", String)],
            ComponentType::Card => &[("title", String), ("bordered", Bool)],
            ComponentType::List => &[("items", Array), ("bordered", Bool)],
            ComponentType::Table => &[("columns", Array), ("dataSource", Array)],
        }
    }
}

impl ComponentRegistry for BuiltinRegistry {
    fn defaults(&self, component_type: ComponentType) -> ComponentDefaults {
        let empty = || PropMap::new();
        let (props, styles) = match component_type {
            ComponentType::Button => (
                prop_map([
                    ("label", PropValue::from("Button")),
                    ("variant", "primary".into()),
                    ("size", "medium".into()),
                    ("disabled", false.into()),
                ]),
                empty(),
            ),
            ComponentType::Input => (
                prop_map([
                    ("placeholder", PropValue::from("Please enter")),
                    ("type", "text".into()),
                    ("disabled", false.into()),
                ]),
                prop_map([("width", "100%")]),
            ),
            ComponentType::Textarea => (
                prop_map([
                    ("placeholder", PropValue::from("Please enter")),
                    ("rows", 4i64.into()),
                ]),
                prop_map([("width", "100%")]),
            ),
            ComponentType::Select => (
                prop_map([
                    ("placeholder", PropValue::from("Please select")),
                    ("options", PropValue::Array(Vec::new())),
                ]),
                empty(),
            ),
            ComponentType::Checkbox => (
                prop_map([("label", PropValue::from("Checkbox")), ("checked", false.into())]),
                empty(),
            ),
            ComponentType::Radio => (
                prop_map([
                    ("label", PropValue::from("Radio")),
                    ("options", PropValue::Array(Vec::new())),
                ]),
                empty(),
            ),
            ComponentType::Switch => (prop_map([("checked", false)]), empty()),
            ComponentType::Text => (prop_map([("content", "Text")]), empty()),
            ComponentType::Heading => (
                prop_map([("content", PropValue::from("Heading")), ("level", 2i64.into())]),
                empty(),
            ),
            ComponentType::Link => (
                prop_map([("text", "Link"), ("href", "#"), ("target", "_self")]),
                empty(),
            ),
            ComponentType::Image => (
                prop_map([("src", ""), ("alt", ""), ("fit", "cover")]),
                prop_map([("width", "100%")]),
            ),
            ComponentType::Icon => (
                prop_map([("name", PropValue::from("star")), ("size", 16i64.into())]),
                empty(),
            ),
            ComponentType::Badge => (prop_map([("text", "Badge"), ("variant", "default")]), empty()),
            ComponentType::Divider => (prop_map([("orientation", "horizontal")]), empty()),
            ComponentType::Container => (
                empty(),
                prop_map([("padding", "16px"), ("minHeight", "80px")]),
            ),
            ComponentType::Row => (
                prop_map([
                    ("gutter", PropValue::from(16i64)),
                    ("justify", "start".into()),
                    ("align", "top".into()),
                ]),
                prop_map([("display", "flex")]),
            ),
            ComponentType::Col => (
                prop_map([("span", 12i64), ("offset", 0i64)]),
                empty(),
            ),
            ComponentType::Form => (
                prop_map([("layout", "vertical"), ("labelAlign", "left")]),
                empty(),
            ),
            ComponentType::Card => (
                prop_map([("title", PropValue::from("Card")), ("bordered", true.into())]),
                prop_map([("padding", "16px")]),
            ),
            ComponentType::List => (
                prop_map([
                    ("items", PropValue::Array(Vec::new())),
                    ("bordered", false.into()),
                ]),
                empty(),
            ),
            ComponentType::Table => (
                prop_map([
                    ("columns", PropValue::Array(Vec::new())),
                    ("dataSource", PropValue::Array(Vec::new())),
                ]),
                prop_map([("width", "100%")]),
            ),
        };
        ComponentDefaults {
            props,
            styles,
            layout_props: PropMap::new(),
        }
    }

    fn validate(&self, component_type: ComponentType, props: &PropMap) -> Result<(), Vec<String>> {
        let errors: Vec<String> = Self::schema(component_type)
            .iter()
            .filter_map(|(key, kind)| props.get(*key).and_then(|v| kind.check(key, v)))
            .collect();
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation_for_every_type() {
        let registry = BuiltinRegistry;
        for ty in ComponentType::ALL {
            let defaults = registry.defaults(ty);
            assert_eq!(registry.validate(ty, &defaults.props), Ok(()), "{ty}");
        }
    }

    #[test]
    fn wrong_kind_is_reported() {
        let props = prop_map([("label", 42i64)]);
        let errs = BuiltinRegistry
            .validate(ComponentType::Button, &props)
            .unwrap_err();
        assert_eq!(errs, vec!["`label` must be a string, got number".to_string()]);
    }

    #[test]
    fn numeric_range_is_enforced() {
        let props = prop_map([("span", 30i64)]);
        let errs = BuiltinRegistry.validate(ComponentType::Col, &props).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("between 1 and 24"));
    }

    #[test]
    fn unknown_keys_and_nulls_are_accepted() {
        let props = prop_map([("label", PropValue::Null), ("data-test", "x".into())]);
        assert!(BuiltinRegistry.validate(ComponentType::Button, &props).is_ok());
    }
}
