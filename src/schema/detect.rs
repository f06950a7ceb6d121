use serde::Serialize;

use crate::error::{Result, SchemaError};
use crate::value::{Mapping, SchemaValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaFormat {
    Compact,
    Structured,
}

/// Purely structural: a mapping with `type` or `properties` is structured,
/// any other mapping is compact, and everything else is unsupported.
pub fn detect_format(value: &SchemaValue) -> Result<SchemaFormat> {
    match value {
        SchemaValue::Mapping(map) => Ok(classify(map)),
        other => Err(SchemaError::UnsupportedSchemaShape(format!(
            "schema root must be a mapping, found {}", other.kind_name()
        ))),
    }
}

pub fn classify(map: &Mapping) -> SchemaFormat {
    if map.contains_key("type") || map.contains_key("properties") {
        SchemaFormat::Structured
    } else {
        SchemaFormat::Compact
    }
}
