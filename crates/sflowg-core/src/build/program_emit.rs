//! Program Emitter (C9): emits the synthetic entry-point program that wires
//! config initialization, plugin construction, container registration, and
//! runtime start, per spec §4.8.
//!
//! Reflection-based task/handler discovery (spec §9 "Reflective dispatch ->
//! explicit descriptors") is replaced here with a generated descriptor table:
//! for every discovered task/handler method the emitted program registers an
//! explicit trampoline closure with the container, rather than relying on
//! the container to discover methods at runtime. The same substitution
//! applies to config values: the Value Template Parser (C3) classifies each
//! manifest config/property value at codegen time, and the emitted source
//! performs the actual environment lookup at its own startup.

use std::collections::BTreeMap;

use serde::Serialize;
use tera::{Context, Tera};

use crate::build::classifier::PluginRecord;
use crate::build::introspect::{PluginMetadata, TaskKind};
use crate::build::module_manifest::crate_name_from_module_path;
use crate::build::template::Template;

const PROGRAM_TEMPLATE: &str = r#"// Code generated by the sflowg build pipeline. DO NOT EDIT.

use clap::Parser;
use sflowg_core::runtime::app::{App, AppConfig};
use sflowg_core::runtime::container::Container;
{%- for plugin in plugins %}
use {{ plugin.crate_name }}::{{ plugin.type_name }};
{%- if plugin.has_config %}
use {{ plugin.crate_name }}::Config as {{ plugin.type_name }}Config;
{%- endif %}
{%- endfor %}

#[derive(Parser, Debug)]
struct Args {
    /// Overrides the flows directory (defaults to FLOWS_PATH, then the
    /// binary's own directory).
    #[arg(long)]
    flows: Option<std::path::PathBuf>,
    /// Overrides the port declared in the project manifest.
    #[arg(long)]
    port: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut container = Container::new();
{%- for plugin in plugins %}

    // {{ plugin.name }} ({{ plugin.type_name }})
{%- if plugin.has_config %}
    let {{ plugin.var_name }}_config = sflowg_core::runtime::config_init::initialize::<{{ plugin.type_name }}Config>(&{{ plugin.var_name }}_raw_values())?;
    let {{ plugin.var_name }} = std::sync::Arc::new({{ plugin.type_name }}::new(
        {{ plugin.var_name }}_config,
{%- for dep in plugin.dependencies %}
        container.resolve::<{{ dep.plugin_type }}>("{{ dep.target_plugin_name }}")?,
{%- endfor %}
    ));
{%- else %}
    let {{ plugin.var_name }} = std::sync::Arc::new({{ plugin.type_name }}::new(
{%- for dep in plugin.dependencies %}
        container.resolve::<{{ dep.plugin_type }}>("{{ dep.target_plugin_name }}")?,
{%- endfor %}
    ));
{%- endif %}
    container.register("{{ plugin.name }}", {{ plugin.var_name }}.clone())?;
{%- for task in plugin.tasks %}
{%- if task.kind == "map" %}
    container.register_task("{{ task.task_name }}", sflowg_core::runtime::container::task_trampoline({{ plugin.var_name }}.clone(), {{ plugin.type_name }}::{{ task.method_name }}));
{%- elif task.kind == "typed" %}
    container.register_task("{{ task.task_name }}", sflowg_core::runtime::container::typed_task_trampoline({{ plugin.var_name }}.clone(), {{ plugin.type_name }}::{{ task.method_name }}));
{%- elif task.kind == "handler" %}
    container.register_response_handler("{{ task.task_name }}", sflowg_core::runtime::container::handler_trampoline({{ plugin.var_name }}.clone(), {{ plugin.type_name }}::{{ task.method_name }}));
{%- endif %}
{%- endfor %}
{%- endfor %}

    container.initialize().await?;

    let app = App::new(AppConfig {
        port: args.port.clone().unwrap_or_else(|| "{{ port }}".to_string()),
        global_properties: sflowg_core::runtime::value_store::ValueStore::from_properties(properties()),
        flows_dir: args.flows.clone(),
        embedded_flows: Vec::new(),
    }, container);

    app.run().await
}
{%- for plugin in plugins %}
{%- if plugin.has_config %}

fn {{ plugin.var_name }}_raw_values() -> std::collections::HashMap<String, serde_json::Value> {
    sflowg_core::runtime::config_init::raw_values_for([
{%- for entry in plugin.raw_config %}
        ("{{ entry.key }}".to_string(), {{ entry.value_expr }}),
{%- endfor %}
    ])
}
{%- endif %}
{%- endfor %}

fn properties() -> std::collections::HashMap<String, serde_json::Value> {
    let mut m = std::collections::HashMap::new();
{%- for entry in properties %}
    m.insert("{{ entry.key }}".to_string(), {{ entry.value_expr }});
{%- endfor %}
    m
}
"#;

#[derive(Debug, Clone, Serialize)]
struct ProgramDependency {
    plugin_type: String,
    target_plugin_name: String,
}

#[derive(Debug, Clone, Serialize)]
struct ProgramTask {
    method_name: String,
    task_name: String,
    /// One of `"map"`, `"typed"`, `"handler"` (mirrors [`TaskKind`]).
    kind: String,
}

#[derive(Debug, Clone, Serialize)]
struct ProgramConfigEntry {
    key: String,
    /// A ready-to-splice Rust expression producing a `serde_json::Value`.
    value_expr: String,
}

#[derive(Debug, Clone, Serialize)]
struct ProgramPlugin {
    name: String,
    var_name: String,
    type_name: String,
    crate_name: String,
    has_config: bool,
    dependencies: Vec<ProgramDependency>,
    tasks: Vec<ProgramTask>,
    raw_config: Vec<ProgramConfigEntry>,
}

/// Renders the entry program text for `plugins` paired with their
/// introspected `metadata`, listening on `port`, with global `properties`.
pub fn render(
    plugins: &[(PluginRecord, PluginMetadata)],
    port: &str,
    properties: &BTreeMap<String, serde_json::Value>,
) -> tera::Result<String> {
    let mut tera = Tera::default();
    tera.add_raw_template("program", PROGRAM_TEMPLATE)?;

    let program_plugins: Vec<ProgramPlugin> = plugins
        .iter()
        .map(|(record, metadata)| ProgramPlugin {
            name: record.name.clone(),
            var_name: sanitize_ident(&record.name),
            type_name: metadata.type_name.clone(),
            crate_name: crate_name_from_module_path(&record.module_path),
            has_config: metadata.has_config,
            dependencies: metadata
                .dependencies
                .iter()
                .map(|d| ProgramDependency {
                    plugin_type: d.plugin_type.clone(),
                    target_plugin_name: d.target_plugin_name.clone(),
                })
                .collect(),
            tasks: metadata
                .tasks
                .iter()
                .map(|t| ProgramTask {
                    method_name: t.method_name.clone(),
                    task_name: t.task_name.clone(),
                    kind: task_kind_str(&t.kind).to_string(),
                })
                .collect(),
            raw_config: record
                .raw_config
                .iter()
                .map(|(k, v)| ProgramConfigEntry {
                    key: k.clone(),
                    value_expr: render_value_expr(v),
                })
                .collect(),
        })
        .collect();

    let properties_rendered: Vec<ProgramConfigEntry> = properties
        .iter()
        .map(|(k, v)| ProgramConfigEntry {
            key: k.clone(),
            value_expr: render_value_expr(v),
        })
        .collect();

    let mut ctx = Context::new();
    ctx.insert("plugins", &program_plugins);
    ctx.insert("port", port);
    ctx.insert("properties", &properties_rendered);

    tera.render("program", &ctx)
}

fn task_kind_str(kind: &TaskKind) -> &'static str {
    match kind {
        TaskKind::MapTask => "map",
        TaskKind::TypedTask => "typed",
        TaskKind::ResponseHandler => "handler",
    }
}

/// Renders a manifest config/property value to the Rust expression the
/// generated program should evaluate to produce it. String values are run
/// through the Value Template Parser (C3): a literal becomes an embedded
/// string, a `${VAR}` reference becomes a `std::env::var` lookup that panics
/// if required and unset, and `${VAR:default}` falls back to the default.
/// Non-string values (numbers, bools, null, arrays, objects) have no
/// template syntax and are embedded as literal JSON.
fn render_value_expr(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => render_template_expr(s),
        other => format!("serde_json::json!({other})"),
    }
}

fn render_template_expr(raw: &str) -> String {
    match Template::parse(raw) {
        Template::Literal(lit) => format!("serde_json::Value::String({lit:?}.to_string())"),
        Template::Variable { name, default: None } => format!(
            "serde_json::Value::String(std::env::var({name:?}).unwrap_or_else(|_| panic!(\"required environment variable {name} is not set\")))"
        ),
        Template::Variable { name, default: Some(default) } => format!(
            "serde_json::Value::String(std::env::var({name:?}).unwrap_or_else(|_| {default:?}.to_string()))"
        ),
    }
}

fn sanitize_ident(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::classifier::PluginOrigin;
    use crate::build::introspect::{DependencyField, TaskMethod};

    fn sample() -> (PluginRecord, PluginMetadata) {
        let mut raw_config = serde_json::Map::new();
        raw_config.insert("addr".to_string(), serde_json::json!("${HTTP_ADDR:0.0.0.0:8080}"));

        let record = PluginRecord {
            origin: PluginOrigin::Core,
            name: "http".to_string(),
            module_path: "sflowg.dev/plugins/http".to_string(),
            version: "latest".to_string(),
            raw_config,
            source_path: None,
        };
        let metadata = PluginMetadata {
            type_name: "HttpPlugin".to_string(),
            package_name: "http".to_string(),
            has_config: true,
            config_schema: None,
            dependencies: vec![DependencyField {
                field_name: "log".to_string(),
                plugin_type: "LogPlugin".to_string(),
                target_plugin_name: "log".to_string(),
                inject_tag: None,
                is_exported: false,
            }],
            tasks: vec![
                TaskMethod {
                    method_name: "fetch".to_string(),
                    task_name: "http.fetch".to_string(),
                    kind: TaskKind::MapTask,
                    has_valid_signature: true,
                },
                TaskMethod {
                    method_name: "respond".to_string(),
                    task_name: "http.respond".to_string(),
                    kind: TaskKind::ResponseHandler,
                    has_valid_signature: true,
                },
            ],
        };
        (record, metadata)
    }

    #[test]
    fn renders_program_with_plugin_wiring() {
        let plugins = vec![sample()];
        let rendered = render(&plugins, "8080", &Default::default()).unwrap();
        assert!(rendered.contains("use http::HttpPlugin;"));
        assert!(rendered.contains("HttpPlugin::new"));
        assert!(rendered.contains("register(\"http\""));
        assert!(rendered.contains("register_task(\"http.fetch\", sflowg_core::runtime::container::task_trampoline"));
        assert!(rendered.contains("register_response_handler(\"http.respond\""));
        assert!(rendered.contains("resolve::<LogPlugin>(\"log\")"));
        assert!(rendered.contains("config_init::initialize::<HttpPluginConfig>"));
        assert!(rendered.contains("std::env::var(\"HTTP_ADDR\")"));
        assert!(rendered.contains("clap::Parser"));
        assert!(rendered.contains("flows_dir: args.flows.clone()"));
    }

    #[test]
    fn sanitizes_identifiers() {
        assert_eq!(sanitize_ident("my-plugin"), "my_plugin");
        assert_eq!(sanitize_ident("9plugin"), "_9plugin");
    }

    #[test]
    fn typed_task_uses_typed_trampoline() {
        let (record, mut metadata) = sample();
        metadata.tasks = vec![TaskMethod {
            method_name: "convert".to_string(),
            task_name: "http.convert".to_string(),
            kind: TaskKind::TypedTask,
            has_valid_signature: true,
        }];
        let rendered = render(&[(record, metadata)], "8080", &Default::default()).unwrap();
        assert!(rendered.contains("sflowg_core::runtime::container::typed_task_trampoline"));
    }

    #[test]
    fn plugin_without_config_skips_config_init() {
        let (mut record, mut metadata) = sample();
        record.raw_config = serde_json::Map::new();
        metadata.has_config = false;
        metadata.tasks = vec![];
        metadata.dependencies = vec![];
        let rendered = render(&[(record, metadata)], "8080", &Default::default()).unwrap();
        assert!(!rendered.contains("HttpPluginConfig"));
        assert!(!rendered.contains("http_raw_values"));
    }

    #[test]
    fn literal_config_value_is_embedded_directly() {
        let expr = render_value_expr(&serde_json::json!("plain"));
        assert_eq!(expr, "serde_json::Value::String(\"plain\".to_string())");
    }

    #[test]
    fn non_string_config_value_uses_json_macro() {
        let expr = render_value_expr(&serde_json::json!(5));
        assert_eq!(expr, "serde_json::json!(5)");
    }
}
