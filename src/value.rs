//! Decoded schema document at the trust boundary.
//!
//! Upstream decoders (`serde_json`, `serde_yaml`) are narrowed into one
//! explicit recursive union before any parser sees the data. Mappings are
//! kept in a `BTreeMap` on purpose: key order is recovered separately by
//! [`crate::schema::order`], never from iteration of this tree.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Number;

use crate::error::SchemaError;

pub type Mapping = BTreeMap<String, SchemaValue>;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SchemaValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<SchemaValue>),
    Mapping(Mapping),
}

impl SchemaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SchemaValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            SchemaValue::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[SchemaValue]> {
        match self {
            SchemaValue::Sequence(xs) => Some(xs),
            _ => None,
        }
    }

    /// Key lookup on a mapping; `None` for every other shape.
    pub fn get(&self, key: &str) -> Option<&SchemaValue> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SchemaValue::Null)
    }

    /// Short shape name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SchemaValue::Null => "null",
            SchemaValue::Bool(_) => "boolean",
            SchemaValue::Number(_) => "number",
            SchemaValue::String(_) => "string",
            SchemaValue::Sequence(_) => "sequence",
            SchemaValue::Mapping(_) => "mapping",
        }
    }

    /// Text of a scalar as it would appear in the document.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            SchemaValue::Null => Some("null".to_string()),
            SchemaValue::Bool(b) => Some(b.to_string()),
            SchemaValue::Number(n) => Some(n.to_string()),
            SchemaValue::String(s) => Some(s.clone()),
            SchemaValue::Sequence(_) | SchemaValue::Mapping(_) => None,
        }
    }
}

impl fmt::Display for SchemaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaValue::Sequence(xs) => {
                f.write_str("[")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 { f.write_str(", ")?; }
                    write!(f, "{x}")?;
                }
                f.write_str("]")
            }
            SchemaValue::Mapping(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 { f.write_str(", ")?; }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            scalar => f.write_str(&scalar.scalar_text().unwrap_or_default()),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONVERSIONS
// ————————————————————————————————————————————————————————————————————————————

impl From<serde_json::Value> for SchemaValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => SchemaValue::Null,
            Value::Bool(b) => SchemaValue::Bool(b),
            Value::Number(n) => SchemaValue::Number(n),
            Value::String(s) => SchemaValue::String(s),
            Value::Array(xs) => SchemaValue::Sequence(xs.into_iter().map(SchemaValue::from).collect()),
            Value::Object(m) => SchemaValue::Mapping(
                m.into_iter().map(|(k, v)| (k, SchemaValue::from(v))).collect()
            ),
        }
    }
}

impl TryFrom<serde_yaml::Value> for SchemaValue {
    type Error = SchemaError;

    fn try_from(value: serde_yaml::Value) -> Result<Self, Self::Error> {
        use serde_yaml::Value;
        Ok(match value {
            Value::Null => SchemaValue::Null,
            Value::Bool(b) => SchemaValue::Bool(b),
            Value::Number(n) => yaml_number(&n),
            Value::String(s) => SchemaValue::String(s),
            Value::Sequence(xs) => SchemaValue::Sequence(
                xs.into_iter().map(SchemaValue::try_from).collect::<Result<Vec<_>, _>>()?
            ),
            Value::Mapping(m) => {
                let mut out = Mapping::new();
                for (k, v) in m {
                    out.insert(yaml_key(k)?, SchemaValue::try_from(v)?);
                }
                SchemaValue::Mapping(out)
            }
            Value::Tagged(tagged) => {
                let inner = *tagged;
                SchemaValue::try_from(inner.value)?
            }
        })
    }
}

fn yaml_number(n: &serde_yaml::Number) -> SchemaValue {
    if let Some(i) = n.as_i64() {
        SchemaValue::Number(Number::from(i))
    } else if let Some(u) = n.as_u64() {
        SchemaValue::Number(Number::from(u))
    } else {
        // .nan / .inf have no JSON number form; keep their YAML spelling
        match n.as_f64().and_then(Number::from_f64) {
            Some(f) => SchemaValue::Number(f),
            None => SchemaValue::String(n.to_string()),
        }
    }
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, SchemaError> {
    use serde_yaml::Value;
    match key {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Tagged(tagged) => {
            let inner = *tagged;
            yaml_key(inner.value)
        }
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => Err(
            SchemaError::UnsupportedSchemaShape("mapping keys must be strings, numbers or booleans".into())
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_and_yaml_decode_to_the_same_tree() {
        let from_json = SchemaValue::from(json!({
            "type": "object",
            "properties": { "age": { "type": "integer", "enum": [1, 2] } },
            "required": ["age"]
        }));
        let yaml: serde_yaml::Value = serde_yaml::from_str(
            "type: object\nproperties:\n  age:\n    type: integer\n    enum: [1, 2]\nrequired: [age]\n"
        ).unwrap();
        let from_yaml = SchemaValue::try_from(yaml).unwrap();
        assert_eq!(from_json, from_yaml);
    }

    #[test]
    fn yaml_scalar_keys_are_stringified() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("1: one\ntrue: yes\n").unwrap();
        let value = SchemaValue::try_from(yaml).unwrap();
        assert_eq!(value.get("1").and_then(SchemaValue::as_str), Some("one"));
        assert!(value.get("true").is_some());
    }

    #[test]
    fn yaml_complex_keys_are_rejected() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("? [a, b]\n: value\n").unwrap();
        let err = SchemaValue::try_from(yaml).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedSchemaShape(_)));
    }

    #[test]
    fn scalar_text_matches_document_spelling() {
        assert_eq!(SchemaValue::from(json!(3)).scalar_text().as_deref(), Some("3"));
        assert_eq!(SchemaValue::from(json!(true)).scalar_text().as_deref(), Some("true"));
        assert_eq!(SchemaValue::from(json!([1])).scalar_text(), None);
        assert_eq!(SchemaValue::from(json!(["a", 1])).to_string(), "[a, 1]");
    }
}
