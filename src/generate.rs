//! `.prompt` → `.rs` generation for single files and batches.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::codegen::Codegen;
use crate::prompt::{PromptDocument, PromptError};

pub const PROMPT_EXTENSION: &str = "prompt";

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Where modules are written; beside each prompt when `None`.
    pub output_dir: Option<PathBuf>,
    /// Emit the "generated, do not edit" banner.
    pub banner: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { output_dir: None, banner: true }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Generator {
    pub config: GeneratorConfig,
}

/// Outcome of one batch run. A failing prompt never stops the others.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub generated: Vec<PathBuf>,
    /// Prompts without any schema; nothing to generate.
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, anyhow::Error)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Rust module for one prompt, or `None` when it declares no schema.
    pub fn render(&self, doc: &PromptDocument, source_name: &str) -> Result<Option<String>, PromptError> {
        let (input, output) = doc.type_models()?;
        if input.is_none() && output.is_none() {
            return Ok(None);
        }
        let (input_name, output_name) = doc.type_names();
        let mut cg = Codegen::new();
        if self.config.banner {
            cg.emit_banner(source_name);
        }
        cg.emit_prelude();
        if let Some(model) = &input {
            cg.emit_model(model, &input_name, &format!("Input of the `{}` prompt.", doc.name));
        }
        if let Some(model) = &output {
            cg.emit_model(model, &output_name, &format!("Output of the `{}` prompt.", doc.name));
        }
        Ok(Some(cg.into_string()))
    }

    pub fn output_path(&self, prompt_path: &Path) -> PathBuf {
        let stem = prompt_stem(prompt_path);
        let dir = match &self.config.output_dir {
            Some(dir) => dir.clone(),
            None => prompt_path.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        dir.join(format!("{stem}.rs"))
    }

    /// Parse, generate and write one prompt. Returns the written path, or
    /// `None` when the prompt has no schema.
    pub fn process_file(&self, path: &Path) -> Result<Option<PathBuf>> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let doc = PromptDocument::parse(&source, prompt_stem(path))
            .with_context(|| format!("failed to parse {}", path.display()))?;
        let source_name = path.file_name().map_or_else(|| doc.name.clone(), |n| n.to_string_lossy().into_owned());
        let Some(rust_src) = self.render(&doc, &source_name)
            .with_context(|| format!("failed to generate types for {}", path.display()))?
        else {
            tracing::info!(path = %path.display(), "no input or output schema; skipping");
            return Ok(None);
        };
        let out = self.output_path(path);
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&out, rust_src)
            .with_context(|| format!("failed to write {}", out.display()))?;
        tracing::info!(prompt = %path.display(), out = %out.display(), "generated");
        Ok(Some(out))
    }

    pub fn process_paths(&self, paths: &[PathBuf]) -> BatchReport {
        let outcomes = paths.par_iter()
            .map(|path| (path.clone(), self.process_file(path)))
            .collect::<Vec<_>>();
        let mut report = BatchReport::default();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(Some(out)) => report.generated.push(out),
                Ok(None) => report.skipped.push(path),
                Err(error) => {
                    tracing::error!(prompt = %path.display(), "{error:#}");
                    report.failed.push((path, error));
                }
            }
        }
        report
    }
}

pub fn prompt_stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

pub fn is_prompt_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == PROMPT_EXTENSION)
}
