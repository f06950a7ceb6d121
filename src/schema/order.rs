//! Declaration-order recovery.
//!
//! The value handed to the parsers does not remember key order, so the
//! order is read separately from a tree that does (a `serde_yaml::Value`, or
//! a `serde_json::Value` built with `preserve_order`).

use indexmap::IndexMap;
use serde::Serialize;

/// Root field order plus one entry per nested object, keyed by the dotted
/// path of field names from the schema root (`user_profile.address`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldOrder {
    pub root: Vec<String>,
    pub nested: IndexMap<String, Vec<String>>,
}

impl FieldOrder {
    pub fn is_empty(&self) -> bool {
        self.root.is_empty() && self.nested.is_empty()
    }

    pub fn nested(&self, path: &str) -> Option<&[String]> {
        self.nested.get(path).map(Vec::as_slice)
    }
}

/// Read access to an order-preserving document tree.
pub trait OrderedTree {
    /// Mapping entries in declaration order; `None` when not a mapping.
    fn entries(&self) -> Option<Vec<(String, &Self)>>;
    fn scalar_str(&self) -> Option<&str>;

    fn lookup(&self, key: &str) -> Option<&Self> {
        self.entries()?.into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl OrderedTree for serde_yaml::Value {
    fn entries(&self) -> Option<Vec<(String, &Self)>> {
        use serde_yaml::Value;
        match self {
            Value::Mapping(m) => Some(
                m.iter()
                    .filter_map(|(k, v)| yaml_key_text(k).map(|k| (k, v)))
                    .collect()
            ),
            Value::Tagged(tagged) => tagged.value.entries(),
            _ => None,
        }
    }

    fn scalar_str(&self) -> Option<&str> {
        use serde_yaml::Value;
        match self {
            Value::String(s) => Some(s),
            Value::Tagged(tagged) => tagged.value.scalar_str(),
            _ => None,
        }
    }
}

fn yaml_key_text(key: &serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value;
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Tagged(tagged) => yaml_key_text(&tagged.value),
        _ => None,
    }
}

impl OrderedTree for serde_json::Value {
    fn entries(&self) -> Option<Vec<(String, &Self)>> {
        self.as_object().map(|m| m.iter().map(|(k, v)| (k.clone(), v)).collect())
    }

    fn scalar_str(&self) -> Option<&str> {
        self.as_str()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RESOLVER
// ————————————————————————————————————————————————————————————————————————————

/// Recover the declaration order of a schema node.
///
/// `root` holds the keys of `properties` when the node has such a mapping
/// (structured), otherwise the node's own keys (compact). Every object-typed
/// field (`type: object` plus a `properties` mapping) found under any
/// `properties` level contributes a `nested` entry. Array items do not.
pub fn resolve_field_order<T: OrderedTree>(schema: &T) -> FieldOrder {
    let mut order = FieldOrder::default();
    let Some(entries) = schema.entries() else {
        return order;
    };
    match schema.lookup("properties").and_then(T::entries) {
        Some(props) => {
            order.root = props.iter().map(|(k, _)| k.clone()).collect();
            walk_properties(&props, "", &mut order.nested);
        }
        None => {
            order.root = entries.into_iter().map(|(k, _)| k).collect();
        }
    }
    order
}

fn walk_properties<T: OrderedTree>(
    props: &[(String, &T)],
    path: &str,
    nested: &mut IndexMap<String, Vec<String>>,
) {
    for (name, node) in props {
        if !is_object_node(*node) {
            continue;
        }
        let Some(child) = node.lookup("properties").and_then(T::entries) else {
            continue;
        };
        let child_path = super::join_path(path, name);
        if !child.is_empty() {
            nested.insert(child_path.clone(), child.iter().map(|(k, _)| k.clone()).collect());
        }
        walk_properties(&child, &child_path, nested);
    }
}

fn is_object_node<T: OrderedTree>(node: &T) -> bool {
    let typed_object = node.lookup("type").and_then(T::scalar_str) == Some("object");
    let has_properties = node.lookup("properties").is_some_and(|p| p.entries().is_some());
    typed_object && has_properties
}
