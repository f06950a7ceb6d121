// Strongly-typed type model for codegen. No decoded document values here.
//
// Everything in this module is built fresh by one `schema::parse` call and is
// never mutated afterwards; the code generator only reads it.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    String,
    Integer,
    Float,
    Boolean,
    Any,                     // untyped value, also the fallback for unknown names
}

/// Type of a field. Nullability is not part of the type: it lives on the
/// field, so an array element can never be wrapped on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum TypeRef {
    Primitive(PrimitiveKind),
    Array(Box<TypeRef>),
    EnumRef(String),
    RecordRef(String),
    Map,                     // `type: object` without `properties`
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,          // identifier derived from `external_name`
    pub external_name: String, // wire key, round-trips unchanged
    pub type_ref: TypeRef,
    pub description: String,
    pub required: bool,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,  // declaration order (or alphabetical fallback)
    pub doc_comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumValue {
    pub constant_name: String,
    pub literal: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumDescriptor {
    pub name: String,
    pub underlying: PrimitiveKind,
    pub values: Vec<EnumValue>,        // source declaration order
    pub doc_comment: String,
}

/// Root return value of one parse call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseResult {
    pub fields: Vec<FieldDescriptor>,
    pub enums: Vec<EnumDescriptor>,
    pub records: Vec<RecordDescriptor>,
}

impl TypeRef {
    pub fn is_array(&self) -> bool {
        matches!(self, TypeRef::Array(_))
    }

    /// Arrays and untyped maps carry their own "no value" (the empty
    /// collection) and are never wrapped.
    pub fn is_collection(&self) -> bool {
        matches!(self, TypeRef::Array(_) | TypeRef::Map)
    }

    /// Name of the synthesized record/enum this type points at, looking
    /// through arrays.
    pub fn referenced_name(&self) -> Option<&str> {
        match self {
            TypeRef::EnumRef(name) | TypeRef::RecordRef(name) => Some(name),
            TypeRef::Array(inner) => inner.referenced_name(),
            TypeRef::Primitive(_) | TypeRef::Map => None,
        }
    }
}

impl ParseResult {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.enums.is_empty() && self.records.is_empty()
    }

    pub fn external_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.external_name.as_str()).collect()
    }

    pub fn record(&self, name: &str) -> Option<&RecordDescriptor> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn enumeration(&self, name: &str) -> Option<&EnumDescriptor> {
        self.enums.iter().find(|e| e.name == name)
    }

    pub fn field(&self, external_name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.external_name == external_name)
    }
}

impl RecordDescriptor {
    pub fn field(&self, external_name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.external_name == external_name)
    }
}
