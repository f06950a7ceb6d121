//! CLI: prompts → (rust | schema | check)
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;

use crate::generate::{Generator, GeneratorConfig, is_prompt_file, prompt_stem};
use crate::prompt::PromptDocument;
use crate::schema::{SchemaRole, detect_format};
use crate::value::SchemaValue;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate strongly-typed Rust request/response models from dotprompt `.prompt` files
#[derive(Parser, Debug)]
#[command(name = "dotprompt-gen", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// emit one Rust module per prompt
    Rust(RustOut),
    /// print the parsed type model of each prompt as JSON
    Schema(SchemaOut),
    /// validate templates against their input schema
    Check(CheckOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more inputs. May be `.prompt` files, directories, or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct RustOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output directory (beside each prompt if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// omit the "generated, do not edit" banner
    #[arg(long)]
    no_banner: bool,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// only this role (both if omitted)
    #[arg(long, value_enum)]
    role: Option<RoleArg>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    input_settings: InputSettings,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum RoleArg {
    Input,
    Output,
}

impl From<RoleArg> for SchemaRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Input => SchemaRole::Input,
            RoleArg::Output => SchemaRole::Output,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn prompt_paths(&self) -> Result<Vec<PathBuf>> {
        let paths = resolve_file_path_patterns(&self.input)?;
        if paths.is_empty() {
            bail!("no .prompt files found in the given inputs");
        }
        Ok(paths)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Rust(target) => target.run(),
            Command::Schema(target) => target.run(),
            Command::Check(target) => target.run(),
        }
    }
}

impl RustOut {
    fn run(&self) -> Result<()> {
        let paths = self.input_settings.prompt_paths()?;
        let generator = Generator::new(GeneratorConfig {
            output_dir: self.out.clone(),
            banner: !self.no_banner,
        });
        let report = generator.process_paths(&paths);
        for path in &report.generated {
            eprintln!("{} {}", "generated".green().bold(), path.display());
        }
        for path in &report.skipped {
            eprintln!("{} {} (no schema)", "skipped".yellow().bold(), path.display());
        }
        for (path, error) in &report.failed {
            eprintln!("{} {}: {error:#}", "failed".red().bold(), path.display());
        }
        if !report.is_success() {
            bail!("{} of {} prompts failed", report.failed.len(), paths.len());
        }
        Ok(())
    }
}

impl SchemaOut {
    fn run(&self) -> Result<()> {
        let roles: Vec<SchemaRole> = match self.role {
            Some(role) => vec![role.into()],
            None => vec![SchemaRole::Input, SchemaRole::Output],
        };
        let mut prompts = Vec::new();
        for path in self.input_settings.prompt_paths()? {
            let doc = load_prompt(&path)?;
            let mut entry = serde_json::Map::new();
            entry.insert("prompt".into(), path.display().to_string().into());
            let (input, output) = doc.type_models()
                .with_context(|| format!("failed to parse {}", path.display()))?;
            for &role in &roles {
                let model = match role {
                    SchemaRole::Input => &input,
                    SchemaRole::Output => &output,
                };
                let format = doc.schema(role)
                    .map(|raw| SchemaValue::try_from(raw.clone()).and_then(|v| detect_format(&v)))
                    .transpose()
                    .with_context(|| format!("failed to parse {}", path.display()))?;
                entry.insert(role.to_string(), serde_json::json!({
                    "format": format,
                    "order": doc.field_order(role),
                    "model": model,
                }));
            }
            prompts.push(serde_json::Value::Object(entry));
        }
        let schema_src = serde_json::to_string_pretty(&prompts)?;
        if let Some(out) = self.out.as_ref() {
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(out, &schema_src)
                .with_context(|| format!("failed to write {}", out.display()))?;
        } else {
            println!("{schema_src}");
        }
        Ok(())
    }
}

impl CheckOut {
    fn run(&self) -> Result<()> {
        let paths = self.input_settings.prompt_paths()?;
        let mut failing = 0usize;
        for path in &paths {
            let findings = load_prompt(path).and_then(|doc| {
                doc.check_template()
                    .with_context(|| format!("failed to parse {}", path.display()))
            });
            match findings {
                Ok(errors) if errors.is_empty() => {
                    eprintln!("{} {}", "ok".green().bold(), path.display());
                }
                Ok(errors) => {
                    failing += 1;
                    eprintln!("{} {}", "error".red().bold(), path.display());
                    for e in errors {
                        eprintln!("  {}:{}:{} {} {}", path.display(), e.line, e.column, format!("[{}]", e.kind).yellow(), e.message);
                    }
                }
                Err(error) => {
                    failing += 1;
                    eprintln!("{} {}: {error:#}", "error".red().bold(), path.display());
                }
            }
        }
        if failing > 0 {
            bail!("{failing} of {} prompts have template errors", paths.len());
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn load_prompt(path: &Path) -> Result<PromptDocument> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    PromptDocument::parse(&source, prompt_stem(path))
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// Literal files are taken as given; directories contribute their `.prompt`
/// files (sorted, not recursive); globs must match at least one file.
pub fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                let path = entry?;
                if path.is_file() {
                    matched_any = true;
                    out.push(path);
                }
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            let path = PathBuf::from(pattern);
            if path.is_dir() {
                out.extend(prompt_files_in(&path)?);
            } else {
                out.push(path);
            }
        }
    }

    Ok(out)
}

fn prompt_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && is_prompt_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
