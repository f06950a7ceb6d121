//! Schema dialect parsers and the canonical type-model builder.
//!
//! A prompt schema comes in one of two dialects:
//! - compact: every field is a single descriptive string (`"string, the user name"`)
//! - structured: JSON-Schema-like nested objects (`type`, `properties`, `items`, `enum`, `required`)
//!
//! Both resolve through [`parse`] to the same [`ParseResult`]: root fields,
//! plus every enum and nested record found at any depth, flattened in a
//! deterministic order. Parsing is pure: no IO, no shared state.
pub mod compact;
pub mod detect;
pub mod order;
pub mod structured;

mod builder;

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::error::{Result, SchemaError};
use crate::ir::{ParseResult, PrimitiveKind, TypeRef};
use crate::value::{Mapping, SchemaValue};

pub use compact::CompactParser;
pub use detect::{SchemaFormat, detect_format};
pub use order::{FieldOrder, OrderedTree, resolve_field_order};
pub use structured::StructuredParser;

// ------------------------------- Policy ---------------------------------- //

/// Recursion bound for nested objects; schemas come from untrusted documents.
pub const DEFAULT_MAX_DEPTH: usize = 64;

// -------------------------------- Types ---------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaRole {
    /// Generation request: every field is implicitly required.
    Input,
    /// Generation response: requiredness is explicit, the rest is nullable.
    Output,
}

impl fmt::Display for SchemaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SchemaRole::Input => "input",
            SchemaRole::Output => "output",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub role: SchemaRole,
    /// Root-level required names (ignored for [`SchemaRole::Input`]).
    pub required: Vec<String>,
    /// Declaration order recovered from the original document.
    pub order: Option<FieldOrder>,
    pub max_depth: usize,
    /// Names already claimed by the caller (e.g. the root type name).
    pub reserved_names: Vec<String>,
}

impl ParseOptions {
    pub fn new(role: SchemaRole) -> Self {
        Self {
            role,
            required: Vec::new(),
            order: None,
            max_depth: DEFAULT_MAX_DEPTH,
            reserved_names: Vec::new(),
        }
    }

    pub fn with_required<I, S>(mut self, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = required.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_order(mut self, order: FieldOrder) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn reserve(mut self, name: impl Into<String>) -> Self {
        self.reserved_names.push(name.into());
        self
    }

    fn root_order(&self) -> Option<&[String]> {
        self.order.as_ref().map(|o| o.root.as_slice())
    }

    fn nested_order(&self, path: &str) -> Option<&[String]> {
        self.order.as_ref().and_then(|o| o.nested(path))
    }
}

/// Common contract of the two dialect parsers.
pub trait DialectParser {
    fn format(&self) -> SchemaFormat;
    fn parse(&self, schema: &Mapping, opts: &ParseOptions) -> Result<ParseResult>;
}

// ------------------------------- Entry ----------------------------------- //

/// Detect the dialect of `schema` and resolve it into the canonical model.
pub fn parse(schema: &SchemaValue, opts: &ParseOptions) -> Result<ParseResult> {
    let format = detect_format(schema)?;
    let Some(map) = schema.as_mapping() else {
        return Err(SchemaError::UnsupportedSchemaShape(format!(
            "schema root must be a mapping, found {}", schema.kind_name()
        )));
    };
    let parser = dialect_parser(format);
    tracing::debug!(format = ?parser.format(), role = %opts.role, fields = map.len(), "parsing schema");
    parser.parse(map, opts)
}

pub fn dialect_parser(format: SchemaFormat) -> &'static dyn DialectParser {
    match format {
        SchemaFormat::Compact => &CompactParser,
        SchemaFormat::Structured => &StructuredParser,
    }
}

// ---------------------------- Shared policy ------------------------------ //

/// JSON-Schema-ish primitive names. Anything unknown is untyped.
pub fn primitive_kind(name: &str) -> PrimitiveKind {
    match name {
        "string" => PrimitiveKind::String,
        "number" => PrimitiveKind::Float,
        "integer" => PrimitiveKind::Integer,
        "boolean" => PrimitiveKind::Boolean,
        _ => PrimitiveKind::Any,
    }
}

/// Processing order of the keys of one `properties` level.
///
/// Hinted names come first (only those actually present, first occurrence
/// wins); every other key follows alphabetically. Without a hint the whole
/// level is alphabetical.
pub(crate) fn ordered_keys<'m>(props: &'m Mapping, hint: Option<&[String]>) -> Vec<&'m str> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(props.len());
    for name in hint.unwrap_or_default() {
        if let Some((key, _)) = props.get_key_value(name.as_str()) {
            if seen.insert(key.as_str()) {
                out.push(key.as_str());
            }
        }
    }
    // BTreeMap iteration is the alphabetical fallback
    for key in props.keys() {
        if seen.insert(key.as_str()) {
            out.push(key.as_str());
        }
    }
    out
}

/// Input schemas make every field required; output schemas use the list.
pub(crate) fn is_required(role: SchemaRole, required: &[String], external_name: &str) -> bool {
    match role {
        SchemaRole::Input => true,
        SchemaRole::Output => required.iter().any(|r| r == external_name),
    }
}

/// Non-required output fields are wrapped, except collections whose empty
/// value already means "absent".
pub(crate) fn is_nullable(role: SchemaRole, required: bool, ty: &TypeRef) -> bool {
    role == SchemaRole::Output && !required && !ty.is_collection()
}

pub(crate) fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}
