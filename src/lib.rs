//! Typed Rust models from dotprompt `.prompt` files.
//!
//! A prompt's front matter declares an input and an output schema in one of
//! two dialects (compact strings or JSON-Schema-like objects). [`schema`]
//! turns either into one canonical type model, [`codegen`] renders it as
//! serde-ready Rust, and [`generate`] drives both over files and batches.
pub mod cli;
pub mod codegen;
pub mod error;
pub mod generate;
pub mod ir;
pub mod naming;
pub mod path_de;
pub mod prompt;
pub mod schema;
pub mod template;
pub mod value;

pub use error::{Result, SchemaError};
pub use ir::{EnumDescriptor, EnumValue, FieldDescriptor, ParseResult, PrimitiveKind, RecordDescriptor, TypeRef};
pub use prompt::{PromptDocument, PromptError};
pub use schema::{FieldOrder, ParseOptions, SchemaRole, parse};
