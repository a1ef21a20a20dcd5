//! `krishi flows` — Inspect and run advisory flows.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use krishi_core::config::{load_dotenv, ModelConfig};
use krishi_core::flow::media::{mime_from_extension, MediaReference};
use krishi_core::model::build_client;
use krishi_core::{FlowDefinition, FlowExecutor, FlowRegistry};

use super::{load_registry, print_json};

/// List registered flows as a table.
pub fn list(flows_dir: Option<&str>) -> Result<(), String> {
    let registry = load_registry(flows_dir)?;
    print!("{}", flow_table(&registry));
    println!("\n{} flow(s)", registry.len());
    Ok(())
}

/// Print one flow's definition, schemas included.
pub fn show(name: &str, flows_dir: Option<&str>) -> Result<(), String> {
    let registry = load_registry(flows_dir)?;
    let flow = registry.lookup(name).map_err(|e| e.to_string())?;
    print_json(&flow.describe());
    Ok(())
}

/// Parse and check a flow file without registering it anywhere.
pub fn validate(file: &str) -> Result<(), String> {
    let flow = FlowDefinition::from_file(file).map_err(|e| e.to_string())?;

    println!("✅ {} is valid", file);
    println!("   name:   {}", flow.name());
    println!("   input:  {}", field_names(&flow, true));
    println!("   output: {}", field_names(&flow, false));
    Ok(())
}

pub struct RunArgs<'a> {
    pub name: &'a str,
    pub input: Option<&'a str>,
    pub input_file: Option<&'a str>,
    pub media: &'a [String],
    pub dry_run: bool,
    pub flows_dir: Option<&'a str>,
    pub model_config: Option<&'a str>,
}

/// Run a flow and print its output. With `dry_run`, print the rendered
/// request instead; no model settings are needed for that.
pub async fn run(args: RunArgs<'_>) -> Result<(), String> {
    let registry = load_registry(args.flows_dir)?;
    let mut input = read_input(args.input, args.input_file)?;
    for spec in args.media {
        attach_media(&mut input, spec)?;
    }

    if args.dry_run {
        let flow = registry.lookup(args.name).map_err(|e| e.to_string())?;
        let rendered = flow.render(&input).map_err(|e| e.to_string())?;
        print_json(&rendered.summary());
        return Ok(());
    }

    load_dotenv();
    let config = match args.model_config {
        Some(path) => ModelConfig::from_file(path),
        None => ModelConfig::from_env(),
    }
    .map_err(|e| e.to_string())?;
    let client = build_client(&config).map_err(|e| e.to_string())?;

    let mut executor = FlowExecutor::new(Arc::new(registry), client);
    if let Some(deadline) = config.deadline() {
        executor = executor.with_timeout(deadline);
    }
    let output = executor
        .execute(args.name, input)
        .await
        .map_err(|e| e.to_string())?;
    print_json(&output);
    Ok(())
}

/// Input from `--input`, `--input-file`, or an empty object.
pub fn read_input(input: Option<&str>, input_file: Option<&str>) -> Result<Value, String> {
    let raw = match (input, input_file) {
        (Some(_), Some(_)) => {
            return Err("Use either --input or --input-file, not both".to_string())
        }
        (Some(json), None) => json.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read input file '{}': {}", path, e))?,
        (None, None) => return Ok(Value::Object(Default::default())),
    };
    serde_json::from_str(&raw).map_err(|e| format!("Input is not valid JSON: {}", e))
}

/// Apply a `field=path` media argument: the file is read, encoded as a data
/// URI and stored under `field`.
pub fn attach_media(input: &mut Value, spec: &str) -> Result<(), String> {
    let (field, path) = spec
        .split_once('=')
        .filter(|(f, p)| !f.is_empty() && !p.is_empty())
        .ok_or_else(|| format!("Invalid --media '{}', expected field=path", spec))?;

    let object = input
        .as_object_mut()
        .ok_or_else(|| "--media needs the input to be a JSON object".to_string())?;

    let bytes =
        std::fs::read(path).map_err(|e| format!("Failed to read media file '{}': {}", path, e))?;
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    let media = MediaReference::from_bytes(mime_from_extension(ext), &bytes);
    tracing::debug!("Attached {} as '{}'", media, field);

    object.insert(field.to_string(), Value::String(media.to_data_uri()));
    Ok(())
}

pub fn flow_table(registry: &FlowRegistry) -> String {
    let mut out = String::new();
    out.push_str("┌─────────────────────────────┬──────────────────────────────────────────────┐\n");
    out.push_str("│ Flow                        │ Description                                  │\n");
    out.push_str("├─────────────────────────────┼──────────────────────────────────────────────┤\n");
    for flow in registry.flows() {
        out.push_str(&format!(
            "│ {:<27} │ {:<44} │\n",
            truncate(flow.name(), 27),
            truncate(flow.description().unwrap_or("-"), 44)
        ));
    }
    out.push_str("└─────────────────────────────┴──────────────────────────────────────────────┘\n");
    out
}

fn field_names(flow: &FlowDefinition, input: bool) -> String {
    let schema = if input {
        flow.input_schema()
    } else {
        flow.output_schema()
    };
    schema
        .fields()
        .iter()
        .map(|f| {
            if f.required {
                format!("{}: {}", f.name, f.kind.expected())
            } else {
                format!("{}?: {}", f.name, f.kind.expected())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max - 1).collect();
        format!("{}…", cut)
    }
}
