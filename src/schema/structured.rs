//! Structured dialect: JSON-Schema-like nested objects.
//!
//! Only shape keywords are read (`type`, `properties`, `items`, `enum`,
//! `required`, `description`); validation keywords are ignored.

use crate::error::{Result, SchemaError};
use crate::ir::{FieldDescriptor, ParseResult, PrimitiveKind, TypeRef};
use crate::naming::field_identifier;
use crate::value::{Mapping, SchemaValue};

use super::builder::TypeModelBuilder;
use super::{DialectParser, ParseOptions, SchemaFormat, is_nullable, is_required, join_path, ordered_keys, primitive_kind};

#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredParser;

impl DialectParser for StructuredParser {
    fn format(&self) -> SchemaFormat {
        SchemaFormat::Structured
    }

    fn parse(&self, schema: &Mapping, opts: &ParseOptions) -> Result<ParseResult> {
        let Some(properties) = schema.get("properties").and_then(SchemaValue::as_mapping) else {
            return Err(SchemaError::UnsupportedSchemaShape(
                "structured schema must have a `properties` mapping".into()
            ));
        };
        let mut walker = Walker { opts, model: TypeModelBuilder::new(opts) };
        let scope = Scope {
            record_prefix: "",
            path: "",
            order: opts.root_order(),
            required: &opts.required,
            depth: 1,
        };
        let fields = walker.resolve_properties(properties, &scope)?;
        Ok(walker.model.finish(fields))
    }
}

// ------------------------------- Walker ---------------------------------- //

struct Walker<'o> {
    opts: &'o ParseOptions,
    model: TypeModelBuilder,
}

/// Where a `properties` level sits in the document.
struct Scope<'s> {
    record_prefix: &'s str,   // name of the enclosing record ("" at the root)
    path: &'s str,            // dotted external names from the root
    order: Option<&'s [String]>,
    required: &'s [String],
    depth: usize,
}

impl Walker<'_> {
    fn resolve_properties(&mut self, props: &Mapping, scope: &Scope<'_>) -> Result<Vec<FieldDescriptor>> {
        self.model.check_depth(scope.depth)?;
        let mut fields = Vec::with_capacity(props.len());
        for name in ordered_keys(props, scope.order) {
            let field = self.resolve_field(name, &props[name], scope)
                .map_err(|e| e.in_field(name))?;
            fields.push(field);
        }
        Ok(fields)
    }

    fn resolve_field(&mut self, name: &str, definition: &SchemaValue, scope: &Scope<'_>) -> Result<FieldDescriptor> {
        let Some(def) = definition.as_mapping() else {
            return Err(SchemaError::MalformedFieldShape(format!(
                "field definition must be a mapping, found {}", definition.kind_name()
            )));
        };
        let ident = field_identifier(name);
        let path = join_path(scope.path, name);
        let type_name = def.get("type").and_then(SchemaValue::as_str);

        let type_ref = if let Some(values) = def.get("enum") {
            let underlying = type_name.map_or(PrimitiveKind::String, primitive_kind);
            let literals = enum_literals(values)?;
            let enum_name = self.model.add_enum(
                &path,
                &format!("{ident}Enum"),
                underlying,
                literals,
                format!("valid {name} values"),
            );
            TypeRef::EnumRef(enum_name)
        } else {
            match type_name {
                Some("array") => self.resolve_array(name, &ident, &path, def, scope)?,
                Some("object") => self.resolve_object(&ident, &path, def, scope)?,
                Some(other) => TypeRef::Primitive(primitive_kind(other)),
                None => TypeRef::Primitive(PrimitiveKind::Any),
            }
        };

        let required = is_required(self.opts.role, scope.required, name);
        let nullable = is_nullable(self.opts.role, required, &type_ref);
        Ok(FieldDescriptor {
            name: ident,
            external_name: name.to_string(),
            type_ref,
            description: description_of(def).to_string(),
            required,
            nullable,
        })
    }

    fn resolve_object(&mut self, ident: &str, path: &str, def: &Mapping, scope: &Scope<'_>) -> Result<TypeRef> {
        let Some(props) = def.get("properties").and_then(SchemaValue::as_mapping) else {
            return Ok(TypeRef::Map);
        };
        let opts = self.opts;
        let slot = self.model.begin_record(path, &format!("{}{ident}", scope.record_prefix));
        let required = required_list(def);
        let fields = self.resolve_properties(props, &Scope {
            record_prefix: &slot.name,
            path,
            order: opts.nested_order(path),
            required: &required,
            depth: scope.depth + 1,
        })?;
        let name = slot.name.clone();
        self.model.finish_record(slot, fields, description_of(def).to_string());
        Ok(TypeRef::RecordRef(name))
    }

    fn resolve_array(
        &mut self,
        name: &str,
        ident: &str,
        path: &str,
        def: &Mapping,
        scope: &Scope<'_>,
    ) -> Result<TypeRef> {
        let Some(items) = def.get("items").and_then(SchemaValue::as_mapping) else {
            return Ok(array_of(TypeRef::Primitive(PrimitiveKind::Any)));
        };
        let item_type = items.get("type").and_then(SchemaValue::as_str);
        let item_path = format!("{path}[]");

        if let Some(props) = items.get("properties").and_then(SchemaValue::as_mapping) {
            if matches!(item_type, None | Some("object")) {
                let slot = self.model.begin_record(&item_path, &format!("{ident}Item"));
                let required = required_list(items);
                let fields = self.resolve_properties(props, &Scope {
                    record_prefix: &slot.name,
                    path: &item_path,
                    order: None,
                    required: &required,
                    depth: scope.depth + 1,
                })?;
                let doc = match description_of(items) {
                    "" => format!("item in {name} array"),
                    desc => desc.to_string(),
                };
                let record_name = slot.name.clone();
                self.model.finish_record(slot, fields, doc);
                return Ok(array_of(TypeRef::RecordRef(record_name)));
            }
        }

        if let Some(values) = items.get("enum") {
            let underlying = item_type.map_or(PrimitiveKind::String, primitive_kind);
            let literals = enum_literals(values)?;
            let enum_name = self.model.add_enum(
                &item_path,
                &format!("{ident}ItemEnum"),
                underlying,
                literals,
                format!("valid {name} item values"),
            );
            return Ok(array_of(TypeRef::EnumRef(enum_name)));
        }

        Ok(array_of(TypeRef::Primitive(item_type.map_or(PrimitiveKind::Any, primitive_kind))))
    }
}

// ------------------------------ Helpers ---------------------------------- //

fn array_of(element: TypeRef) -> TypeRef {
    TypeRef::Array(Box::new(element))
}

fn description_of(def: &Mapping) -> &str {
    def.get("description").and_then(SchemaValue::as_str).unwrap_or_default()
}

/// Names listed under `required`; non-string entries are ignored.
fn required_list(def: &Mapping) -> Vec<String> {
    def.get("required")
        .and_then(SchemaValue::as_sequence)
        .map(|xs| xs.iter().filter_map(SchemaValue::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn enum_literals(values: &SchemaValue) -> Result<Vec<String>> {
    let Some(seq) = values.as_sequence() else {
        return Err(SchemaError::InvalidEnumDeclaration(format!(
            "enum values must be a list, found {}", values.kind_name()
        )));
    };
    if seq.is_empty() {
        return Err(SchemaError::InvalidEnumDeclaration("enum has no values".into()));
    }
    seq.iter()
        .map(|v| v.scalar_text().ok_or_else(|| SchemaError::InvalidEnumDeclaration(format!(
            "enum values must be scalars, found {}", v.kind_name()
        ))))
        .collect()
}
