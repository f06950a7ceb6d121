//! `.prompt` documents: YAML front matter followed by a Handlebars template.
//!
//! ```text
//! ---
//! model: googleai/gemini-2.0-flash
//! input:
//!   schema:
//!     name: string, the user name
//! output:
//!   schema: { type: object, properties: { ... } }
//! ---
//! Hello {{name}}
//! ```
use serde::Deserialize;
use thiserror::Error;

use crate::error::SchemaError;
use crate::ir::ParseResult;
use crate::naming::prompt_type_names;
use crate::path_de::from_yaml_str_with_path;
use crate::schema::{self, FieldOrder, ParseOptions, SchemaRole, resolve_field_order};
use crate::template::{self, TemplateError};
use crate::value::SchemaValue;

const DELIMITER: &str = "---";

// -------------------------------- Types ---------------------------------- //

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("missing front matter: the document must start with a `---` line")]
    MissingFrontMatter,
    #[error("unterminated front matter: no closing `---` line")]
    UnterminatedFrontMatter,
    #[error("invalid front matter at `{path}`: {message}")]
    FrontMatter { path: String, message: String },
    #[error("invalid {role} schema: {source}")]
    Schema {
        role: SchemaRole,
        #[source]
        source: SchemaError,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Frontmatter {
    pub model: Option<String>,
    pub input: SchemaSpec,
    pub output: SchemaSpec,
    pub config: Option<serde_yaml::Value>,
}

/// `input:` / `output:` block of the front matter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchemaSpec {
    /// Kept as raw YAML so key order can still be read from it.
    pub schema: Option<serde_yaml::Value>,
    pub default: Option<serde_yaml::Value>,
    pub required: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PromptDocument {
    /// File stem; the generated type names derive from it.
    pub name: String,
    pub frontmatter: Frontmatter,
    pub template: String,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl PromptDocument {
    pub fn parse(source: &str, name: impl Into<String>) -> Result<Self, PromptError> {
        let (front, body) = split_front_matter(source)?;
        let frontmatter = if front.trim().is_empty() {
            Frontmatter::default()
        } else {
            from_yaml_str_with_path::<Frontmatter>(front)
                .map_err(|e| PromptError::FrontMatter { path: e.path, message: e.message })?
        };
        Ok(Self { name: name.into(), frontmatter, template: body.trim().to_string() })
    }

    pub fn spec(&self, role: SchemaRole) -> &SchemaSpec {
        match role {
            SchemaRole::Input => &self.frontmatter.input,
            SchemaRole::Output => &self.frontmatter.output,
        }
    }

    /// Raw schema node of a role; an explicit `schema: null` counts as absent.
    pub fn schema(&self, role: SchemaRole) -> Option<&serde_yaml::Value> {
        self.spec(role).schema.as_ref().filter(|v| !v.is_null())
    }

    pub fn has_schema(&self) -> bool {
        self.schema(SchemaRole::Input).is_some() || self.schema(SchemaRole::Output).is_some()
    }

    /// The schema's own `required` list when it has one, else the block's.
    pub fn required_fields(&self, role: SchemaRole) -> Vec<String> {
        let own = self.schema(role)
            .and_then(|s| s.get("required"))
            .and_then(serde_yaml::Value::as_sequence);
        match own {
            Some(xs) => xs.iter().filter_map(serde_yaml::Value::as_str).map(str::to_string).collect(),
            None => self.spec(role).required.clone(),
        }
    }

    pub fn field_order(&self, role: SchemaRole) -> FieldOrder {
        self.schema(role).map(resolve_field_order).unwrap_or_default()
    }

    /// `(<Stem>Input, <Stem>Output)`
    pub fn type_names(&self) -> (String, String) {
        prompt_type_names(&self.name)
    }

    pub fn parse_options(&self, role: SchemaRole) -> ParseOptions {
        let (input_name, output_name) = self.type_names();
        ParseOptions::new(role)
            .with_required(self.required_fields(role))
            .with_order(self.field_order(role))
            .reserve(input_name)
            .reserve(output_name)
    }

    /// Type model of one role, `None` when the role declares no schema.
    pub fn type_model(&self, role: SchemaRole) -> Result<Option<ParseResult>, PromptError> {
        self.parse_model(role, &self.parse_options(role))
    }

    /// `(input, output)` models as they share one generated module: the
    /// output model is parsed with every input type name reserved.
    pub fn type_models(&self) -> Result<(Option<ParseResult>, Option<ParseResult>), PromptError> {
        let input = self.type_model(SchemaRole::Input)?;
        let taken = input.iter()
            .flat_map(|m| m.enums.iter().map(|e| &e.name).chain(m.records.iter().map(|r| &r.name)));
        let opts = taken.fold(self.parse_options(SchemaRole::Output), |opts, name| opts.reserve(name.clone()));
        let output = self.parse_model(SchemaRole::Output, &opts)?;
        Ok((input, output))
    }

    fn parse_model(&self, role: SchemaRole, opts: &ParseOptions) -> Result<Option<ParseResult>, PromptError> {
        let Some(raw) = self.schema(role) else {
            return Ok(None);
        };
        let wrap = |source| PromptError::Schema { role, source };
        let value = SchemaValue::try_from(raw.clone()).map_err(wrap)?;
        let model = schema::parse(&value, opts).map_err(wrap)?;
        Ok(Some(model))
    }

    /// Template findings. Variables are checked against the root fields of
    /// the input schema when there is one.
    pub fn check_template(&self) -> Result<Vec<TemplateError>, PromptError> {
        let input = self.type_model(SchemaRole::Input)?;
        let names = input.as_ref().map(ParseResult::external_names);
        Ok(template::check_template(&self.template, names.as_deref()))
    }
}

/// Split on a leading `---` line and the next `---` line.
fn split_front_matter(source: &str) -> Result<(&str, &str), PromptError> {
    let source = source.trim_start_matches('\u{feff}').trim_start();
    let mut lines = source.split_inclusive('\n');
    let front_start = match lines.next() {
        Some(first) if first.trim_end() == DELIMITER => first.len(),
        _ => return Err(PromptError::MissingFrontMatter),
    };
    let mut offset = front_start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            let front = &source[front_start..offset];
            let body = &source[offset + line.len()..];
            return Ok((front, body));
        }
        offset += line.len();
    }
    Err(PromptError::UnterminatedFrontMatter)
}
