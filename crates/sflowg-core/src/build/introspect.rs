//! Source Introspector (C5): parses a plugin package's Rust source into an
//! AST and recovers its type name, config schema, dependency fields, and
//! task/handler methods, per spec §4.4.

use std::path::Path;

use quote::ToTokens;
use syn::{File, FnArg, Item, ReturnType, Type};

use super::error::AnalysisError;

/// Discovered shape of a single plugin package (spec §3 PluginMetadata).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMetadata {
    pub type_name: String,
    pub package_name: String,
    pub has_config: bool,
    pub config_schema: Option<ConfigSchema>,
    pub dependencies: Vec<DependencyField>,
    pub tasks: Vec<TaskMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigSchema {
    pub fields: Vec<ConfigField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigField {
    pub name: String,
    pub ty: String,
    pub yaml_key: Option<String>,
    pub default_literal: Option<String>,
    pub validate_rule: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyField {
    pub field_name: String,
    pub plugin_type: String,
    pub target_plugin_name: String,
    pub inject_tag: Option<String>,
    pub is_exported: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    MapTask,
    TypedTask,
    ResponseHandler,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMethod {
    pub method_name: String,
    pub task_name: String,
    pub kind: TaskKind,
    pub has_valid_signature: bool,
}

/// Parses every `.rs` file directly under `package_dir` and merges the
/// results into one `PluginMetadata`. Fails with `AnalysisError` if no
/// exported type whose name ends in `Plugin` is found.
pub fn analyze_package(package_dir: &Path, import_path: &str) -> Result<PluginMetadata, AnalysisError> {
    let package_name = package_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plugin".to_string());

    let mut files = Vec::new();
    let entries = std::fs::read_dir(package_dir).map_err(|e| AnalysisError {
        plugin_name: package_name.clone(),
        import_path: import_path.to_string(),
        message: format!("cannot read package directory: {e}"),
    })?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("rs") {
            if path.file_stem().and_then(|s| s.to_str()) == Some("tests") {
                continue;
            }
            files.push(path);
        }
    }
    files.sort();

    let mut type_name: Option<String> = None;
    let mut has_config = false;
    let mut config_schema = None;
    let mut dependencies = Vec::new();
    let mut tasks = Vec::new();

    for path in &files {
        let source = std::fs::read_to_string(path).map_err(|e| AnalysisError {
            plugin_name: package_name.clone(),
            import_path: import_path.to_string(),
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let parsed: File = syn::parse_file(&source).map_err(|e| AnalysisError {
            plugin_name: package_name.clone(),
            import_path: import_path.to_string(),
            message: format!("parse error in {}: {e}", path.display()),
        })?;

        for item in &parsed.items {
            match item {
                Item::Struct(item_struct) if is_pub(&item_struct.vis) => {
                    let name = item_struct.ident.to_string();
                    if name.ends_with("Plugin") {
                        type_name = Some(name);
                        dependencies.extend(extract_dependencies(item_struct));
                    } else if name == "Config" {
                        has_config = true;
                        config_schema = Some(extract_config_schema(item_struct));
                    }
                }
                Item::Impl(item_impl) => {
                    if let Type::Path(type_path) = item_impl.self_ty.as_ref() {
                        let impl_target = type_path.path.segments.last().map(|s| s.ident.to_string());
                        if impl_target.as_deref() == type_name.as_deref() {
                            tasks.extend(extract_tasks(item_impl, &package_name));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    let type_name = type_name.ok_or_else(|| AnalysisError {
        plugin_name: package_name.clone(),
        import_path: import_path.to_string(),
        message: "no exported type ending in Plugin found".to_string(),
    })?;

    Ok(PluginMetadata {
        type_name,
        package_name,
        has_config,
        config_schema,
        dependencies,
        tasks,
    })
}

fn is_pub(vis: &syn::Visibility) -> bool {
    matches!(vis, syn::Visibility::Public(_))
}

fn extract_dependencies(item_struct: &syn::ItemStruct) -> Vec<DependencyField> {
    let mut deps = Vec::new();
    for field in &item_struct.fields {
        let Some(ident) = &field.ident else { continue };
        let field_name = ident.to_string();
        if field_name.eq_ignore_ascii_case("config") {
            continue;
        }
        let Some(plugin_type) = inner_plugin_type(&field.ty) else {
            continue;
        };
        let inject_tag = read_inject_tag(&field.attrs);
        let target_plugin_name = inject_tag.clone().unwrap_or_else(|| to_snake_case(&field_name));
        deps.push(DependencyField {
            field_name,
            plugin_type,
            target_plugin_name,
            inject_tag,
            is_exported: is_pub(&field.vis),
        });
    }
    deps
}

/// A dependency field must hold (directly or through `Arc<..>`/`Box<..>`, the
/// idiomatic Rust stand-ins for a Go pointer field) a type whose name ends in
/// `Plugin`, optionally behind `dyn`.
fn inner_plugin_type(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(type_path) => {
            let segment = type_path.path.segments.last()?;
            let outer = segment.ident.to_string();
            if outer == "Arc" || outer == "Box" || outer == "Rc" {
                if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                    for arg in &args.args {
                        if let syn::GenericArgument::Type(inner) = arg {
                            if let Some(found) = inner_plugin_type(inner) {
                                return Some(found);
                            }
                        }
                    }
                }
                None
            } else if outer.ends_with("Plugin") {
                Some(outer)
            } else {
                None
            }
        }
        Type::TraitObject(trait_object) => {
            for bound in &trait_object.bounds {
                if let syn::TypeParamBound::Trait(trait_bound) = bound {
                    if let Some(segment) = trait_bound.path.segments.last() {
                        let name = segment.ident.to_string();
                        if name.ends_with("Plugin") {
                            return Some(name);
                        }
                    }
                }
            }
            None
        }
        Type::Reference(type_ref) => inner_plugin_type(&type_ref.elem),
        _ => None,
    }
}

fn read_inject_tag(attrs: &[syn::Attribute]) -> Option<String> {
    for attr in attrs {
        if attr.path().is_ident("inject") {
            let mut found = None;
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: syn::LitStr = meta.value()?.parse()?;
                    found = Some(value.value());
                }
                Ok(())
            });
            if found.is_some() {
                return found;
            }
        }
    }
    None
}

fn extract_config_schema(item_struct: &syn::ItemStruct) -> ConfigSchema {
    let mut fields = Vec::new();
    for field in &item_struct.fields {
        let Some(ident) = &field.ident else { continue };
        let name = ident.to_string();
        let ty = field.ty.to_token_stream().to_string().replace(' ', "");
        let mut yaml_key = None;
        let mut default_literal = None;
        let mut validate_rule = None;

        for attr in &field.attrs {
            if attr.path().is_ident("serde") {
                let _ = attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename") {
                        let value: syn::LitStr = meta.value()?.parse()?;
                        yaml_key = Some(value.value());
                    }
                    Ok(())
                });
            } else if attr.path().is_ident("sflowg") {
                let _ = attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("default") {
                        let value: syn::LitStr = meta.value()?.parse()?;
                        default_literal = Some(value.value());
                    } else if meta.path.is_ident("validate") {
                        let value: syn::LitStr = meta.value()?.parse()?;
                        validate_rule = Some(value.value());
                    }
                    Ok(())
                });
            }
        }

        fields.push(ConfigField {
            name,
            ty,
            yaml_key,
            default_literal,
            validate_rule,
        });
    }
    ConfigSchema { fields }
}

fn extract_tasks(item_impl: &syn::ItemImpl, package_name: &str) -> Vec<TaskMethod> {
    let mut tasks = Vec::new();
    for item in &item_impl.items {
        let syn::ImplItem::Fn(method) = item else { continue };
        if !is_pub(&method.vis) {
            continue;
        }
        let method_name = method.sig.ident.to_string();
        let args: Vec<&FnArg> = method.sig.inputs.iter().filter(|a| !matches!(a, FnArg::Receiver(_))).collect();
        let returns_result = matches!(&method.sig.output, ReturnType::Type(_, ty) if is_result_type(ty));

        let kind = match args.len() {
            2 if returns_result => {
                let second_ty = arg_type_string(args[1]);
                if second_ty.contains("HashMap") || second_ty.contains("Map<") {
                    Some(TaskKind::MapTask)
                } else {
                    Some(TaskKind::TypedTask)
                }
            }
            3 if method.sig.output == ReturnType::Default || matches!(&method.sig.output, ReturnType::Type(_, ty) if is_result_unit_type(ty)) => {
                Some(TaskKind::ResponseHandler)
            }
            _ => None,
        };

        let Some(kind) = kind else { continue };
        let task_name = format!("{}.{}", package_name.to_lowercase(), lowercase_first(&method_name));
        tasks.push(TaskMethod {
            method_name,
            task_name,
            kind,
            has_valid_signature: true,
        });
    }
    tasks
}

fn arg_type_string(arg: &FnArg) -> String {
    match arg {
        FnArg::Typed(pat_type) => pat_type.ty.to_token_stream().to_string(),
        FnArg::Receiver(_) => String::new(),
    }
}

fn is_result_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        return type_path.path.segments.last().map(|s| s.ident == "Result").unwrap_or(false);
    }
    false
}

fn is_result_unit_type(ty: &Type) -> bool {
    is_result_type(ty)
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn to_snake_case(s: &str) -> String {
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, body: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn scenario_s2_introspection() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "plugin.rs",
            r#"
            use std::sync::Arc;

            pub struct Config {
                #[serde(rename = "addr")]
                #[sflowg(default = "x:1", validate = "required,hostname_port")]
                pub addr: String,
            }

            pub struct FooPlugin {
                config: Config,
                #[inject(name = "http_primary")]
                http: Arc<dyn HttpPlugin>,
            }

            impl FooPlugin {
                pub fn do_thing(&self, exec: &Execution, args: std::collections::HashMap<String, Value>) -> Result<std::collections::HashMap<String, Value>, Error> {
                    Ok(args)
                }
            }
            "#,
        );

        let metadata = analyze_package(dir.path(), "example.com/local/foo").unwrap();
        assert_eq!(metadata.type_name, "FooPlugin");
        assert!(metadata.has_config);
        let schema = metadata.config_schema.unwrap();
        assert_eq!(schema.fields.len(), 1);
        assert_eq!(schema.fields[0].yaml_key.as_deref(), Some("addr"));
        assert_eq!(schema.fields[0].default_literal.as_deref(), Some("x:1"));
        assert_eq!(
            schema.fields[0].validate_rule.as_deref(),
            Some("required,hostname_port")
        );
        assert_eq!(metadata.dependencies.len(), 1);
        assert_eq!(metadata.dependencies[0].target_plugin_name, "http_primary");
        assert_eq!(metadata.dependencies[0].plugin_type, "HttpPlugin");
        assert_eq!(metadata.tasks.len(), 1);
        assert_eq!(metadata.tasks[0].kind, TaskKind::MapTask);
    }

    #[test]
    fn fails_without_plugin_struct() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "plugin.rs", "pub struct NotAPlugin { pub x: i32 }");
        let err = analyze_package(dir.path(), "example.com/local/bare").unwrap_err();
        assert!(err.message.contains("Plugin"));
    }
}
