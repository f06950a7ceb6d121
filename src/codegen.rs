//! Rust source for a parsed type model.
//!
//! Records become serde structs keyed by their external names; string enums
//! become Rust enums; enums over numbers or booleans become validated
//! newtypes with one associated constant per value.

use std::collections::BTreeSet;

use crate::ir::{EnumDescriptor, FieldDescriptor, ParseResult, PrimitiveKind, RecordDescriptor, TypeRef};
use crate::naming::snake_case;

const INDENT: &str = "    ";

const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub",
    "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true", "try",
    "type", "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Keywords that cannot be written as raw identifiers.
const NOT_RAW: &[&str] = &["crate", "self", "Self", "super"];

#[derive(Debug, Default)]
pub struct Codegen {
    out: String,
}

impl Codegen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.out
    }

    pub fn emit_banner(&mut self, source_name: &str) {
        self.line(0, format!("// Code generated by dotprompt-gen from `{source_name}`. DO NOT EDIT."));
        self.blank();
    }

    pub fn emit_prelude(&mut self) {
        self.line(0, "use serde::{Deserialize, Serialize};");
        self.blank();
    }

    /// Enums first, then the root struct, then nested records in discovery order.
    pub fn emit_model(&mut self, model: &ParseResult, root_name: &str, root_doc: &str) {
        for e in &model.enums {
            self.emit_enum(e);
        }
        self.emit_struct(root_name, &model.fields, root_doc);
        for r in &model.records {
            self.emit_record(r);
        }
    }

    pub fn emit_record(&mut self, record: &RecordDescriptor) {
        self.emit_struct(&record.name, &record.fields, &record.doc_comment);
    }

    pub fn emit_enum(&mut self, e: &EnumDescriptor) {
        match scalar_repr(e) {
            Some(repr) => self.emit_scalar_enum(e, repr),
            None => self.emit_string_enum(e),
        }
    }

    // ------------------------------- Records ----------------------------- //

    fn emit_struct(&mut self, name: &str, fields: &[FieldDescriptor], doc: &str) {
        self.doc(0, doc);
        self.line(0, "#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]");
        self.line(0, format!("pub struct {name} {{"));
        let idents = unique(fields.iter().map(|f| field_ident(&f.external_name)));
        for (field, ident) in fields.iter().zip(idents) {
            self.doc(1, &field.description);
            self.line(1, format!("#[serde({})]", serde_attributes(field).join(", ")));
            self.line(1, format!("pub {ident}: {},", field_type(field)));
        }
        self.line(0, "}");
        self.blank();
    }

    // -------------------------------- Enums ------------------------------ //

    fn emit_string_enum(&mut self, e: &EnumDescriptor) {
        let name = &e.name;
        let variants = unique(e.values.iter().map(|v| variant_ident(name, &v.constant_name)));
        let pairs: Vec<(&str, &str)> = variants.iter()
            .map(String::as_str)
            .zip(e.values.iter().map(|v| v.literal.as_str()))
            .collect();

        self.doc(0, &e.doc_comment);
        self.line(0, "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]");
        self.line(0, format!("pub enum {name} {{"));
        for (variant, literal) in &pairs {
            self.line(1, format!("#[serde(rename = {literal:?})]"));
            self.line(1, format!("{variant},"));
        }
        self.line(0, "}");
        self.blank();

        self.line(0, format!("impl {name} {{"));
        let all = pairs.iter().map(|(v, _)| format!("{name}::{v}")).collect::<Vec<_>>().join(", ");
        self.line(1, format!("pub const ALL: &'static [{name}] = &[{all}];"));
        self.blank();
        self.line(1, "pub fn as_str(&self) -> &'static str {");
        self.line(2, "match self {");
        for (variant, literal) in &pairs {
            self.line(3, format!("{name}::{variant} => {literal:?},"));
        }
        self.line(2, "}");
        self.line(1, "}");
        self.line(0, "}");
        self.blank();

        self.line(0, format!("impl std::fmt::Display for {name} {{"));
        self.line(1, "fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {");
        self.line(2, "f.write_str(self.as_str())");
        self.line(1, "}");
        self.line(0, "}");
        self.blank();

        self.line(0, format!("impl std::str::FromStr for {name} {{"));
        self.line(1, "type Err = String;");
        self.blank();
        self.line(1, "fn from_str(s: &str) -> Result<Self, Self::Err> {");
        self.line(2, "match s {");
        for (variant, literal) in &pairs {
            self.line(3, format!("{literal:?} => Ok({name}::{variant}),"));
        }
        self.line(3, format!("other => Err(format!(\"invalid {name} value: {{other:?}}\")),"));
        self.line(2, "}");
        self.line(1, "}");
        self.line(0, "}");
        self.blank();
    }

    fn emit_scalar_enum(&mut self, e: &EnumDescriptor, repr: ScalarRepr) {
        let name = &e.name;
        let consts = unique(e.values.iter().map(|v| sanitize_ident(&v.constant_name)));

        self.doc(0, &e.doc_comment);
        let derives = match repr {
            ScalarRepr::Float => "Debug, Clone, Copy, PartialEq, Serialize, Deserialize",
            ScalarRepr::Integer | ScalarRepr::Boolean => "Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize",
        };
        self.line(0, format!("#[derive({derives})]"));
        self.line(0, "#[serde(transparent)]");
        self.line(0, format!("pub struct {name}(pub {});", repr.rust_type()));
        self.blank();

        self.line(0, "#[allow(non_upper_case_globals)]");
        self.line(0, format!("impl {name} {{"));
        for (ident, value) in consts.iter().zip(&e.values) {
            self.line(1, format!("pub const {ident}: {name} = {name}({});", repr.literal(&value.literal)));
        }
        let all = consts.iter().map(|c| format!("{name}::{c}")).collect::<Vec<_>>().join(", ");
        self.line(1, format!("pub const ALL: &'static [{name}] = &[{all}];"));
        self.blank();
        self.line(1, "pub fn is_valid(&self) -> bool {");
        self.line(2, "Self::ALL.contains(self)");
        self.line(1, "}");
        self.line(0, "}");
        self.blank();
    }

    // ------------------------------- Output ------------------------------ //

    fn doc(&mut self, depth: usize, text: &str) {
        for line in text.lines().map(str::trim_end) {
            if line.is_empty() {
                self.line(depth, "///");
            } else {
                self.line(depth, format!("/// {line}"));
            }
        }
    }

    fn line(&mut self, depth: usize, text: impl AsRef<str>) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

pub fn rust_type(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Primitive(kind) => primitive_type(*kind).to_string(),
        TypeRef::Array(inner) => format!("Vec<{}>", rust_type(inner)),
        TypeRef::EnumRef(name) | TypeRef::RecordRef(name) => name.clone(),
        TypeRef::Map => "serde_json::Map<String, serde_json::Value>".to_string(),
    }
}

fn primitive_type(kind: PrimitiveKind) -> &'static str {
    match kind {
        PrimitiveKind::String => "String",
        PrimitiveKind::Integer => "i64",
        PrimitiveKind::Float => "f64",
        PrimitiveKind::Boolean => "bool",
        PrimitiveKind::Any => "serde_json::Value",
    }
}

fn field_type(field: &FieldDescriptor) -> String {
    let ty = rust_type(&field.type_ref);
    if field.nullable { format!("Option<{ty}>") } else { ty }
}

fn serde_attributes(field: &FieldDescriptor) -> Vec<String> {
    let mut attrs = vec![format!("rename = {:?}", field.external_name)];
    if field.nullable {
        attrs.push("default".to_string());
        attrs.push("skip_serializing_if = \"Option::is_none\"".to_string());
    } else if field.type_ref.is_collection() {
        attrs.push("default".to_string());
    }
    attrs
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarRepr {
    Integer,
    Float,
    Boolean,
}

impl ScalarRepr {
    fn rust_type(self) -> &'static str {
        match self {
            ScalarRepr::Integer => "i64",
            ScalarRepr::Float => "f64",
            ScalarRepr::Boolean => "bool",
        }
    }

    fn accepts(self, literal: &str) -> bool {
        match self {
            ScalarRepr::Integer => literal.parse::<i64>().is_ok(),
            ScalarRepr::Float => literal.parse::<f64>().is_ok_and(f64::is_finite),
            ScalarRepr::Boolean => matches!(literal, "true" | "false"),
        }
    }

    /// Rust literal for an accepted source literal.
    fn literal(self, literal: &str) -> String {
        match self {
            ScalarRepr::Float if !literal.contains(['.', 'e', 'E']) => format!("{literal}.0"),
            _ => literal.to_string(),
        }
    }
}

/// Newtype representation when every literal fits the underlying kind;
/// otherwise the enum falls back to strings.
fn scalar_repr(e: &EnumDescriptor) -> Option<ScalarRepr> {
    let repr = match e.underlying {
        PrimitiveKind::Integer => ScalarRepr::Integer,
        PrimitiveKind::Float => ScalarRepr::Float,
        PrimitiveKind::Boolean => ScalarRepr::Boolean,
        PrimitiveKind::String | PrimitiveKind::Any => return None,
    };
    if e.values.iter().all(|v| repr.accepts(&v.literal)) {
        Some(repr)
    } else {
        tracing::debug!(enum_name = %e.name, "enum literals do not fit {:?}; emitting a string enum", repr);
        None
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IDENTIFIERS
// ————————————————————————————————————————————————————————————————————————————

/// snake_case field name, escaped when it collides with a keyword.
pub fn field_ident(external_name: &str) -> String {
    let base = snake_case(external_name);
    let base = match base.chars().next() {
        None => "field".to_string(),
        Some(c) if c.is_ascii_digit() => format!("_{base}"),
        Some(_) => base,
    };
    if NOT_RAW.contains(&base.as_str()) {
        format!("{base}_")
    } else if RUST_KEYWORDS.contains(&base.as_str()) {
        format!("r#{base}")
    } else {
        base
    }
}

/// Variant of a string enum: the constant name without the enum-name prefix
/// when that leaves a usable identifier.
fn variant_ident(enum_name: &str, constant_name: &str) -> String {
    let short = constant_name.strip_prefix(enum_name).map(sanitize_ident);
    match short {
        Some(s) if s.starts_with(|c: char| c.is_ascii_uppercase()) && s != "Self" => s,
        _ => sanitize_ident(constant_name),
    }
}

fn sanitize_ident(s: &str) -> String {
    let mut out: String = s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Resolve duplicates with numeric suffixes, keeping the first occurrence.
fn unique(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    names.map(|base| {
        let mut name = base.clone();
        let mut n = 2;
        while !seen.insert(name.clone()) {
            name = format!("{base}{n}");
            n += 1;
        }
        name
    }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::EnumValue;
    use crate::schema::{ParseOptions, SchemaRole, parse};
    use crate::value::SchemaValue;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn enum_of(name: &str, underlying: PrimitiveKind, values: &[(&str, &str)]) -> EnumDescriptor {
        EnumDescriptor {
            name: name.to_string(),
            underlying,
            values: values.iter()
                .map(|(c, l)| EnumValue { constant_name: c.to_string(), literal: l.to_string() })
                .collect(),
            doc_comment: format!("valid {} values", name.to_lowercase()),
        }
    }

    #[test]
    fn field_identifiers() {
        assert_eq!(field_ident("userName"), "user_name");
        assert_eq!(field_ident("type"), "r#type");
        assert_eq!(field_ident("self"), "self_");
        assert_eq!(field_ident("2fa"), "_2fa");
        assert_eq!(field_ident("--"), "field");
    }

    #[test]
    fn string_enum() {
        let mut cg = Codegen::new();
        cg.emit_enum(&enum_of("LanguageEnum", PrimitiveKind::String, &[
            ("LanguageEnumZhCn", "zh-cn"),
            ("LanguageEnumEn", "en"),
        ]));
        assert_eq!(cg.into_string(), indoc! {r#"
            /// valid languageenum values
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
            pub enum LanguageEnum {
                #[serde(rename = "zh-cn")]
                ZhCn,
                #[serde(rename = "en")]
                En,
            }

            impl LanguageEnum {
                pub const ALL: &'static [LanguageEnum] = &[LanguageEnum::ZhCn, LanguageEnum::En];

                pub fn as_str(&self) -> &'static str {
                    match self {
                        LanguageEnum::ZhCn => "zh-cn",
                        LanguageEnum::En => "en",
                    }
                }
            }

            impl std::fmt::Display for LanguageEnum {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl std::str::FromStr for LanguageEnum {
                type Err = String;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    match s {
                        "zh-cn" => Ok(LanguageEnum::ZhCn),
                        "en" => Ok(LanguageEnum::En),
                        other => Err(format!("invalid LanguageEnum value: {other:?}")),
                    }
                }
            }

        "#});
    }

    #[test]
    fn integer_enum_is_a_newtype() {
        let mut cg = Codegen::new();
        cg.emit_enum(&enum_of("PriorityEnum", PrimitiveKind::Integer, &[
            ("PriorityEnum1", "1"),
            ("PriorityEnum_1", "-1"),
        ]));
        let out = cg.into_string();
        assert!(out.contains("pub struct PriorityEnum(pub i64);"));
        assert!(out.contains("pub const PriorityEnum1: PriorityEnum = PriorityEnum(1);"));
        assert!(out.contains("pub const PriorityEnum_1: PriorityEnum = PriorityEnum(-1);"));
        assert!(out.contains("pub const ALL: &'static [PriorityEnum] = &[PriorityEnum::PriorityEnum1, PriorityEnum::PriorityEnum_1];"));
        assert!(out.contains("Self::ALL.contains(self)"));
    }

    #[test]
    fn float_literals_gain_a_decimal_point() {
        let mut cg = Codegen::new();
        cg.emit_enum(&enum_of("RatioEnum", PrimitiveKind::Float, &[("RatioEnum2", "2"), ("RatioEnum0.5", "0.5")]));
        let out = cg.into_string();
        assert!(out.contains("pub const RatioEnum2: RatioEnum = RatioEnum(2.0);"));
        assert!(out.contains("pub const RatioEnum0_5: RatioEnum = RatioEnum(0.5);"));
        assert!(out.contains("#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]"));
    }

    #[test]
    fn unparsable_numeric_enum_falls_back_to_strings() {
        let mut cg = Codegen::new();
        cg.emit_enum(&enum_of("SizeEnum", PrimitiveKind::Integer, &[("SizeEnum1", "1"), ("SizeEnumBig", "big")]));
        let out = cg.into_string();
        assert!(out.contains("pub enum SizeEnum {"));
        assert!(out.contains("#[serde(rename = \"1\")]\n    SizeEnum1,"));
        assert!(out.contains("    Big,"));
    }

    #[test]
    fn struct_fields_follow_nullability() {
        let schema = SchemaValue::from(json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "stable id" },
                "score": { "type": "number" },
                "tags": { "type": "array", "items": { "type": "string" } },
                "meta": { "type": "object" },
                "type": { "type": "string" }
            },
            "required": ["id"]
        }));
        let model = parse(&schema, &ParseOptions::new(SchemaRole::Output)).unwrap();
        let mut cg = Codegen::new();
        cg.emit_model(&model, "ReviewOutput", "Output of the `review` prompt.");
        assert_eq!(cg.into_string(), indoc! {r#"
            /// Output of the `review` prompt.
            #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
            pub struct ReviewOutput {
                /// stable id
                #[serde(rename = "id")]
                pub id: String,
                #[serde(rename = "meta", default)]
                pub meta: serde_json::Map<String, serde_json::Value>,
                #[serde(rename = "score", default, skip_serializing_if = "Option::is_none")]
                pub score: Option<f64>,
                #[serde(rename = "tags", default)]
                pub tags: Vec<String>,
                #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
                pub r#type: Option<String>,
            }

        "#});
    }

    #[test]
    fn model_emits_enums_root_then_records() {
        let schema = SchemaValue::from(json!({
            "type": "object",
            "properties": {
                "profile": {
                    "type": "object",
                    "properties": { "role": { "type": "string", "enum": ["admin", "guest"] } }
                }
            }
        }));
        let model = parse(&schema, &ParseOptions::new(SchemaRole::Input)).unwrap();
        let mut cg = Codegen::new();
        cg.emit_prelude();
        cg.emit_model(&model, "AccountInput", "");
        let out = cg.into_string();
        let at = |needle: &str| out.find(needle).unwrap();
        assert!(out.starts_with("use serde::{Deserialize, Serialize};\n\n"));
        assert!(at("pub enum RoleEnum") < at("pub struct AccountInput"));
        assert!(at("pub struct AccountInput") < at("pub struct Profile"));
        assert!(out.contains("pub profile: Profile,"));
        assert!(out.contains("pub role: RoleEnum,"));
    }

    #[test]
    fn colliding_field_identifiers_are_suffixed() {
        let names = unique(["user_name", "userName"].into_iter().map(field_ident));
        assert_eq!(names, vec!["user_name", "user_name2"]);
    }
}
