//! Compact dialect: one descriptive string per field.
//!
//! ```text
//! name: string, the user name
//! age?: integer, age in years
//! tags(array): string, free-form labels
//! language: string(enum): [en, zh-cn], reply language
//! ```
//!
//! No nested objects: every field is a primitive, an array of primitives,
//! or an enum (an `(array)` key with an enum definition is an array of enum).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SchemaError};
use crate::ir::{FieldDescriptor, ParseResult, PrimitiveKind, TypeRef};
use crate::naming::field_identifier;
use crate::value::{Mapping, SchemaValue};

use super::builder::TypeModelBuilder;
use super::{DialectParser, ParseOptions, SchemaFormat, is_nullable, is_required, ordered_keys};

const OPTIONAL_MARKER: &str = "?";
const ARRAY_MARKER: &str = "(array)";

/// `base(enum)` at the start of a definition; text after the head is free.
static ENUM_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\w*\(enum").expect("enum head pattern is valid")
});

static ENUM_DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\w+)\(enum[^)]*\):\s*\[([^\]]+)\]").expect("enum definition pattern is valid")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct CompactParser;

impl DialectParser for CompactParser {
    fn format(&self) -> SchemaFormat {
        SchemaFormat::Compact
    }

    fn parse(&self, schema: &Mapping, opts: &ParseOptions) -> Result<ParseResult> {
        let mut model = TypeModelBuilder::new(opts);
        model.check_depth(1)?;
        let mut fields = Vec::with_capacity(schema.len());
        for raw_key in ordered_keys(schema, opts.root_order()) {
            let definition = &schema[raw_key];
            let field = resolve_field(&mut model, raw_key, definition, opts)
                .map_err(|e| e.in_field(CompactKey::parse(raw_key).external_name))?;
            fields.push(field);
        }
        Ok(model.finish(fields))
    }
}

// ------------------------------- Keys ------------------------------------ //

/// A field key with its dialect markers split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactKey {
    pub external_name: String,
    pub optional: bool,
    pub array: bool,
}

impl CompactKey {
    /// Strips trailing `?` and `(array)` markers, in either order.
    pub fn parse(raw: &str) -> Self {
        let mut rest = raw.trim();
        let mut optional = false;
        let mut array = false;
        loop {
            if let Some(stripped) = rest.strip_suffix(OPTIONAL_MARKER) {
                optional = true;
                rest = stripped;
            } else if let Some(stripped) = rest.strip_suffix(ARRAY_MARKER) {
                array = true;
                rest = stripped;
            } else {
                break;
            }
        }
        Self { external_name: rest.to_string(), optional, array }
    }
}

// ------------------------------ Grammar ---------------------------------- //

/// Parsed right-hand side of a compact field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactDefinition {
    Enum { base: String, values: Vec<String>, description: String },
    Array { element: String, description: String },
    Simple { type_name: String, description: String },
}

/// Classify one definition string. `array` tells whether the key carried `(array)`.
pub fn parse_definition(text: &str, array: bool) -> Result<CompactDefinition> {
    if ENUM_HEAD.is_match(text) {
        return parse_enum_definition(text);
    }
    let (head, description) = split_first_comma(text);
    if array {
        if head.is_empty() {
            return Err(SchemaError::InvalidArrayDeclaration(format!(
                "missing element type in `{text}`"
            )));
        }
        return Ok(CompactDefinition::Array { element: head.to_string(), description });
    }
    if head.is_empty() {
        return Err(SchemaError::MalformedFieldDefinition(format!(
            "missing type in `{text}`"
        )));
    }
    Ok(CompactDefinition::Simple { type_name: head.to_string(), description })
}

fn parse_enum_definition(text: &str) -> Result<CompactDefinition> {
    let Some(caps) = ENUM_DEFINITION.captures(text) else {
        if !text.contains('[') {
            return Err(SchemaError::InvalidEnumDeclaration(format!(
                "enum values must be a bracketed list: {text}"
            )));
        }
        return Err(SchemaError::MalformedFieldDefinition(format!("invalid enum format: {text}")));
    };
    let whole = caps.get(0).map_or(text.len(), |m| m.end());
    let base = caps.get(1).map_or("", |m| m.as_str()).to_string();
    let values = caps.get(2)
        .map_or("", |m| m.as_str())
        .split(',')
        .map(|v| unquote(v.trim()))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    if values.is_empty() {
        return Err(SchemaError::MalformedFieldDefinition(format!("enum has no values: {text}")));
    }
    // description only when the bracket is followed by a comma
    let description = text[whole..]
        .trim()
        .strip_prefix(',')
        .map(|d| d.trim().to_string())
        .unwrap_or_default();
    Ok(CompactDefinition::Enum { base, values, description })
}

fn split_first_comma(text: &str) -> (&str, String) {
    match text.split_once(',') {
        Some((head, tail)) => (head.trim(), tail.trim().to_string()),
        None => (text.trim(), String::new()),
    }
}

fn unquote(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

/// Compact primitive names. `null` is untyped and always nullable.
pub fn compact_primitive(name: &str) -> (PrimitiveKind, bool) {
    match name {
        "null" => (PrimitiveKind::Any, true),
        "any" => (PrimitiveKind::Any, false),
        other => (super::primitive_kind(other), false),
    }
}

// ------------------------------ Resolve ---------------------------------- //

fn resolve_field(
    model: &mut TypeModelBuilder,
    raw_key: &str,
    definition: &SchemaValue,
    opts: &ParseOptions,
) -> Result<FieldDescriptor> {
    let key = CompactKey::parse(raw_key);
    let Some(text) = definition.as_str() else {
        return Err(SchemaError::MalformedFieldDefinition(format!(
            "compact field must be a string, found {}", definition.kind_name()
        )));
    };
    let ident = field_identifier(&key.external_name);
    let required = is_required(opts.role, &opts.required, &key.external_name);

    let (type_ref, description, always_nullable) = match parse_definition(text, key.array)? {
        CompactDefinition::Enum { base, values, description } => {
            let (underlying, _) = compact_primitive(&base);
            let (base_name, doc) = if key.array {
                (format!("{ident}ItemEnum"), format!("valid {} item values", key.external_name))
            } else {
                (format!("{ident}Enum"), format!("valid {} values", key.external_name))
            };
            let name = model.add_enum(&key.external_name, &base_name, underlying, values, doc);
            let ty = TypeRef::EnumRef(name);
            let ty = if key.array { TypeRef::Array(Box::new(ty)) } else { ty };
            (ty, description, false)
        }
        CompactDefinition::Array { element, description } => {
            let (kind, _) = compact_primitive(&element);
            (TypeRef::Array(Box::new(TypeRef::Primitive(kind))), description, false)
        }
        CompactDefinition::Simple { type_name, description } => {
            let (kind, always_nullable) = compact_primitive(&type_name);
            (TypeRef::Primitive(kind), description, always_nullable)
        }
    };

    let nullable = always_nullable || is_nullable(opts.role, required, &type_ref);
    Ok(FieldDescriptor {
        name: ident,
        external_name: key.external_name,
        type_ref,
        description,
        required,
        nullable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRole;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse_json(v: serde_json::Value, opts: &ParseOptions) -> Result<ParseResult> {
        match SchemaValue::from(v) {
            SchemaValue::Mapping(m) => CompactParser.parse(&m, opts),
            _ => unreachable!(),
        }
    }

    #[test]
    fn key_markers_strip_in_any_order() {
        assert_eq!(CompactKey::parse("age?"), CompactKey { external_name: "age".into(), optional: true, array: false });
        assert_eq!(CompactKey::parse("tags(array)"), CompactKey { external_name: "tags".into(), optional: false, array: true });
        assert_eq!(CompactKey::parse("tags?(array)"), CompactKey { external_name: "tags".into(), optional: true, array: true });
        assert_eq!(CompactKey::parse("tags(array)?"), CompactKey { external_name: "tags".into(), optional: true, array: true });
    }

    #[test]
    fn simple_definition_splits_on_first_comma() {
        assert_eq!(
            parse_definition("string, the name, with commas", false).unwrap(),
            CompactDefinition::Simple { type_name: "string".into(), description: "the name, with commas".into() }
        );
        assert_eq!(
            parse_definition("boolean", false).unwrap(),
            CompactDefinition::Simple { type_name: "boolean".into(), description: String::new() }
        );
    }

    #[test]
    fn enum_definition_keeps_value_order() {
        assert_eq!(
            parse_definition("string(enum): [zh-cn, en, \"fr\"], reply language", false).unwrap(),
            CompactDefinition::Enum {
                base: "string".into(),
                values: vec!["zh-cn".into(), "en".into(), "fr".into()],
                description: "reply language".into(),
            }
        );
        // text after the bracket without a comma is not a description
        assert_eq!(
            parse_definition("string(enum): [a, b] trailing", false).unwrap(),
            CompactDefinition::Enum { base: "string".into(), values: vec!["a".into(), "b".into()], description: String::new() }
        );
    }

    #[test]
    fn enum_mentioned_in_description_is_not_an_enum() {
        assert_eq!(
            parse_definition("string, pick one (enum) value", false).unwrap(),
            CompactDefinition::Simple { type_name: "string".into(), description: "pick one (enum) value".into() }
        );
        assert_eq!(
            parse_definition("string, e.g. mode(enum): [a]", true).unwrap(),
            CompactDefinition::Array { element: "string".into(), description: "e.g. mode(enum): [a]".into() }
        );
    }

    #[test]
    fn malformed_definitions() {
        assert!(matches!(parse_definition("string(enum): a, b", false), Err(SchemaError::InvalidEnumDeclaration(_))));
        assert!(matches!(parse_definition("(enum): [a]", false), Err(SchemaError::MalformedFieldDefinition(_))));
        assert!(matches!(parse_definition(", just a description", true), Err(SchemaError::InvalidArrayDeclaration(_))));
        assert!(matches!(parse_definition("   ", false), Err(SchemaError::MalformedFieldDefinition(_))));
    }

    #[test]
    fn input_role_forces_required_even_with_optional_marker() {
        let opts = ParseOptions::new(SchemaRole::Input);
        let result = parse_json(json!({ "name": "string, the user name", "age?": "integer, age" }), &opts).unwrap();
        let summary: Vec<_> = result.fields.iter()
            .map(|f| (f.name.as_str(), f.external_name.as_str(), f.required, f.nullable, f.type_ref.clone()))
            .collect();
        assert_eq!(summary, vec![
            ("Age", "age", true, false, TypeRef::Primitive(PrimitiveKind::Integer)),
            ("Name", "name", true, false, TypeRef::Primitive(PrimitiveKind::String)),
        ]);
        assert_eq!(result.fields[1].description, "the user name");
    }

    #[test]
    fn output_role_wraps_non_required_scalars_not_arrays() {
        let opts = ParseOptions::new(SchemaRole::Output).with_required(["id"]);
        let result = parse_json(json!({
            "id": "string",
            "score?": "number, confidence",
            "labels(array)": "string, labels, comma separated",
            "mood": "string(enum): [happy, sad]",
        }), &opts).unwrap();
        let id = result.field("id").unwrap();
        assert!(id.required && !id.nullable);
        let score = result.field("score").unwrap();
        assert!(!score.required && score.nullable);
        assert_eq!(score.type_ref, TypeRef::Primitive(PrimitiveKind::Float));
        let labels = result.field("labels").unwrap();
        assert!(!labels.nullable);
        assert_eq!(labels.type_ref, TypeRef::Array(Box::new(TypeRef::Primitive(PrimitiveKind::String))));
        assert_eq!(labels.description, "labels, comma separated");
        let mood = result.field("mood").unwrap();
        assert!(mood.nullable);
        assert_eq!(mood.type_ref, TypeRef::EnumRef("MoodEnum".into()));
    }

    #[test]
    fn enum_synthesis() {
        let opts = ParseOptions::new(SchemaRole::Input);
        let result = parse_json(json!({ "language": "string(enum): [zh-cn, en], reply language" }), &opts).unwrap();
        let e = result.enumeration("LanguageEnum").unwrap();
        assert_eq!(e.underlying, PrimitiveKind::String);
        assert_eq!(e.doc_comment, "valid language values");
        let consts: Vec<_> = e.values.iter().map(|v| (v.constant_name.as_str(), v.literal.as_str())).collect();
        assert_eq!(consts, vec![("LanguageEnumZhCn", "zh-cn"), ("LanguageEnumEn", "en")]);
    }

    #[test]
    fn array_of_enum() {
        let opts = ParseOptions::new(SchemaRole::Input);
        let result = parse_json(json!({ "tags(array)": "string(enum): [a, b]" }), &opts).unwrap();
        assert_eq!(result.fields[0].external_name, "tags");
        assert_eq!(result.fields[0].type_ref, TypeRef::Array(Box::new(TypeRef::EnumRef("TagsItemEnum".into()))));
    }

    #[test]
    fn null_and_unknown_types() {
        let opts = ParseOptions::new(SchemaRole::Input);
        let result = parse_json(json!({ "blob": "null", "odd": "uuid, whatever" }), &opts).unwrap();
        let blob = result.field("blob").unwrap();
        assert_eq!(blob.type_ref, TypeRef::Primitive(PrimitiveKind::Any));
        assert!(blob.nullable);
        assert_eq!(result.field("odd").unwrap().type_ref, TypeRef::Primitive(PrimitiveKind::Any));
    }

    #[test]
    fn non_string_definition_fails_with_field_context() {
        let opts = ParseOptions::new(SchemaRole::Input);
        let err = parse_json(json!({ "ok": "string", "bad?": 3 }), &opts).unwrap_err();
        assert_eq!(err.field_path(), vec!["bad"]);
        assert!(matches!(err.root_cause(), SchemaError::MalformedFieldDefinition(_)));
        assert!(err.to_string().starts_with("failed to parse field `bad`: "));
    }

    #[test]
    fn explicit_order_is_followed() {
        let order = crate::schema::FieldOrder {
            root: vec!["name".into(), "age?".into(), "height".into()],
            ..Default::default()
        };
        let opts = ParseOptions::new(SchemaRole::Input).with_order(order);
        let result = parse_json(json!({
            "height": "number", "age?": "integer", "name": "string", "active": "boolean"
        }), &opts).unwrap();
        let names: Vec<_> = result.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Name", "Age", "Height", "Active"]);
    }
}
