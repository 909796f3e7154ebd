//! Command line: schema files → (generated Rust | validation report | resolved schema)
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;

use crate::codegen::{Codegen, GenOptions, order};
use crate::datamodel::Value;
use crate::path_de;
use crate::schema::{Schema, SchemaDoc};
use crate::typed::validate;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate typed node implementations from a schema, or check JSON documents against it
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// more logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// emit Rust implementations of the schema's types
    Generate(GenerateOut),
    /// check JSON documents against a schema type
    Validate(ValidateIn),
    /// print the resolved schema and its emission order
    Schema(SchemaOut),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// One or more schema files. May be literal paths or quoted glob patterns;
    /// the files are merged and a type may be declared only once
    #[arg(long, short, num_args = 1.., required = true)]
    schema: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// generate only the types reachable from these (every type if omitted)
    #[arg(long)]
    root_type: Vec<String>,

    /// output .rs file (stdout if omitted)
    #[arg(short, long, conflicts_with = "out_dir")]
    out: Option<PathBuf>,

    /// output module directory: mod.rs plus one file per type
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// path generated code imports the runtime from
    #[arg(long, default_value = "::typed_node")]
    runtime_path: String,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct ValidateIn {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// schema type every document must conform to
    #[arg(long)]
    root_type: String,

    #[command(flatten)]
    input_settings: InputSettings,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSettings {
    fn load_doc(&self) -> Result<SchemaDoc> {
        let source_paths = resolve_file_path_patterns(&self.schema)
            .context("failed to resolve schema file paths")?;
        let mut doc = SchemaDoc::new();
        for source_path in source_paths {
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read schema file {}", source_path.display()))?;
            let part = path_de::from_str_with_path::<SchemaDoc>(&source)
                .with_context(|| format!("failed to parse schema file {}", source_path.display()))?;
            doc.merge(part)
                .with_context(|| format!("failed to merge schema file {}", source_path.display()))?;
        }
        Ok(doc)
    }

    fn load(&self) -> Result<Arc<Schema>> {
        let schema = Schema::from_doc(&self.load_doc()?).context("failed to resolve schema")?;
        tracing::info!(types = schema.len(), "loaded schema");
        Ok(Arc::new(schema))
    }
}

impl InputSettings {
    /// Call `apply` with a label and the selected value of every document.
    fn load_process(&self, mut apply: impl FnMut(&str, serde_json::Value)) -> Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {source_path_str}"))?;
            if self.ndjson {
                for (index, line) in source.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let label = format!("{source_path_str}:{}", index + 1);
                    let json_value = serde_json::from_str::<serde_json::Value>(line)
                        .with_context(|| format!("failed to parse JSON line ({label})"))?;
                    apply(&label, self.select(json_value, &label)?);
                }
            } else {
                let json_value = serde_json::from_str::<serde_json::Value>(&source)
                    .with_context(|| format!("failed to parse JSON source file ({source_path_str})"))?;
                apply(&source_path_str, self.select(json_value, &source_path_str)?);
            }
        }
        Ok(())
    }

    fn select(&self, json_value: serde_json::Value, label: &str) -> Result<serde_json::Value> {
        match self.json_pointer.as_deref() {
            None => Ok(json_value),
            Some(pointer) => json_value
                .pointer(pointer)
                .cloned()
                .ok_or_else(|| anyhow!("JSON pointer {pointer} selects nothing in {label}")),
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// Default log filter for the `-v` count.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Generate(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let schema = target.schema_settings.load()?;
                let options = GenOptions {
                    runtime_path: target.runtime_path.clone(),
                    ..GenOptions::default()
                };
                let code = Codegen::new(&schema, options)
                    .generate(target.root_type.as_slice())
                    .context("code generation failed")?;
                if let Some(out_dir) = target.out_dir.as_ref() {
                    code.write_to_dir(out_dir)
                        .with_context(|| format!("failed to write {}", out_dir.display()))?;
                    eprintln!(
                        "{} {} types into {}",
                        "generated".green().bold(),
                        code.units.len(),
                        out_dir.display()
                    );
                } else {
                    write_output(target.out.as_deref(), &code.to_single_file())?;
                }
            }
            Command::Validate(target) => {
                let schema = target.schema_settings.load()?;
                let ty = schema
                    .type_ref(&target.root_type)
                    .ok_or_else(|| anyhow!("no type named {:?} in the schema", target.root_type))?;
                let mut total = 0usize;
                let mut failed = 0usize;
                target.input_settings.load_process(|label, json_value| {
                    total += 1;
                    let node = Value::from_json(&json_value).into_node();
                    match validate(&node, &ty) {
                        Ok(()) => eprintln!("{} {label}", "✅".green()),
                        Err(error) => {
                            failed += 1;
                            eprintln!("{} {label}: {error}", "❌".red());
                        }
                    }
                })?;
                if failed > 0 {
                    bail!("{failed} of {total} documents do not conform to {}", ty.name());
                }
                eprintln!("{} {total} documents conform to {}", "ok".green().bold(), ty.name());
            }
            Command::Schema(target) => {
                let schema = target.schema_settings.load()?;
                let groups = order::emission_order(&schema, &[]).context("failed to order types")?;
                let emission_order: Vec<Vec<&str>> = groups
                    .iter()
                    .map(|group| group.members.iter().map(|id| schema.get(*id).name()).collect())
                    .collect();
                let view = serde_json::json!({
                    "types": schema.to_doc().types,
                    "emission_order": emission_order,
                });
                let view_src = serde_json::to_string_pretty(&view)?;
                write_output(target.out.as_deref(), &view_src)?;
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out: Option<&Path>, contents: &str) -> Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            println!("{contents}");
            Ok(())
        }
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched = Vec::new();
            for entry in glob::glob(pattern)? {
                matched.push(entry?);
            }
            if matched.is_empty() {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
            // glob yields alphabetical order; keep it so merges are stable
            out.extend(matched);
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_paths_pass_through_and_empty_globs_fail() {
        let paths = resolve_file_path_patterns(["a.json", "b.json"]).unwrap();
        assert_eq!(paths, [PathBuf::from("a.json"), PathBuf::from("b.json")]);
        assert!(resolve_file_path_patterns(["/nonexistent-dir-for-tests/*.json"]).is_err());
    }

    #[test]
    fn verbosity_raises_the_log_level() {
        let cli = CommandLineInterface::parse_from(["typed-node", "-v", "schema", "--schema", "s.json"]);
        assert_eq!(cli.log_level(), "debug");
        let cli = CommandLineInterface::parse_from(["typed-node", "schema", "--schema", "s.json"]);
        assert_eq!(cli.log_level(), "warn");
    }
}
