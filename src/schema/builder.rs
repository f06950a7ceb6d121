// Type model assembler shared by both dialect parsers.
//
// Threaded by `&mut` through the recursion: it owns the name registry and
// collects every synthesized enum/record, so the per-field resolvers only
// return the field itself.

use crate::error::{Result, SchemaError};
use crate::ir::{EnumDescriptor, EnumValue, FieldDescriptor, ParseResult, PrimitiveKind, RecordDescriptor};
use crate::naming::{NameRegistry, enum_constant_names};

use super::ParseOptions;

pub(crate) struct TypeModelBuilder {
    names: NameRegistry,
    enums: Vec<EnumDescriptor>,
    records: Vec<RecordDescriptor>,
    max_depth: usize,
}

/// Position reserved for a record whose fields are still being resolved.
pub(crate) struct RecordSlot {
    pub name: String,
    index: usize,
}

impl TypeModelBuilder {
    pub fn new(opts: &ParseOptions) -> Self {
        let mut names = NameRegistry::new();
        for reserved in &opts.reserved_names {
            names.reserve(reserved);
        }
        Self {
            names,
            enums: Vec::new(),
            records: Vec::new(),
            max_depth: opts.max_depth,
        }
    }

    pub fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(SchemaError::DepthLimitExceeded { limit: self.max_depth });
        }
        Ok(())
    }

    /// Register an enum found at `path` and return its (unique) name.
    pub fn add_enum(
        &mut self,
        path: &str,
        base_name: &str,
        underlying: PrimitiveKind,
        literals: Vec<String>,
        doc_comment: String,
    ) -> String {
        let key = format!("{path}#enum");
        let name = self.names.allocate(&key, base_name);
        if self.enums.iter().any(|e| e.name == name) {
            return name;
        }
        let constants = enum_constant_names(&name, literals.iter().map(String::as_str));
        let values = constants.into_iter()
            .zip(literals)
            .map(|(constant_name, literal)| EnumValue { constant_name, literal })
            .collect::<Vec<_>>();
        tracing::debug!(enum_name = %name, path, values = values.len(), "synthesized enum");
        self.enums.push(EnumDescriptor { name: name.clone(), underlying, values, doc_comment });
        name
    }

    /// Name a record found at `path` and keep its place ahead of any record
    /// discovered while resolving its own fields.
    pub fn begin_record(&mut self, path: &str, base_name: &str) -> RecordSlot {
        let name = self.names.allocate(path, base_name);
        RecordSlot { name, index: self.records.len() }
    }

    pub fn finish_record(&mut self, slot: RecordSlot, fields: Vec<FieldDescriptor>, doc_comment: String) {
        tracing::debug!(record = %slot.name, fields = fields.len(), "synthesized record");
        let record = RecordDescriptor { name: slot.name, fields, doc_comment };
        self.records.insert(slot.index, record);
    }

    pub fn finish(self, fields: Vec<FieldDescriptor>) -> ParseResult {
        ParseResult { fields, enums: self.enums, records: self.records }
    }
}
