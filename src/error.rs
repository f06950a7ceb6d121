use thiserror::Error;

pub type Result<T, E = SchemaError> = std::result::Result<T, E>;

/// Failures of the schema parsers. Every parse function stops at the first
/// error; callers add the offending field's external name with
/// [`SchemaError::in_field`] on the way up.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unsupported schema shape: {0}")]
    UnsupportedSchemaShape(String),

    #[error("malformed field definition: {0}")]
    MalformedFieldDefinition(String),

    #[error("malformed field shape: {0}")]
    MalformedFieldShape(String),

    #[error("invalid enum declaration: {0}")]
    InvalidEnumDeclaration(String),

    #[error("invalid array declaration: {0}")]
    InvalidArrayDeclaration(String),

    #[error("schema nesting exceeds the maximum depth of {limit}")]
    DepthLimitExceeded { limit: usize },

    #[error("failed to parse field `{name}`: {source}")]
    Field {
        name: String,
        #[source]
        source: Box<SchemaError>,
    },
}

impl SchemaError {
    pub fn in_field(self, name: impl Into<String>) -> Self {
        SchemaError::Field { name: name.into(), source: Box::new(self) }
    }

    /// Innermost error, skipping the field-context wrappers.
    pub fn root_cause(&self) -> &SchemaError {
        match self {
            SchemaError::Field { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// External names of the fields the error passed through, outermost first.
    pub fn field_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut cur = self;
        while let SchemaError::Field { name, source } = cur {
            path.push(name.as_str());
            cur = source;
        }
        path
    }
}
