//! Go API extractor using tree-sitter.
//!
//! One compilation unit per package directory, named `<module>/<dir>`. The
//! module path comes from the `go.mod` at the working-copy root. Exported
//! names are those starting with an upper-case letter.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use rayon::prelude::*;
use tracing::{debug, warn};
use tree_sitter::Node;

use super::versioned_namespace;
use super::helpers::{
    field_texts, find_child_by_type, get_node_text, is_exported, normalized_text, parse_tree,
};
use crate::error::{RelimpactError, Result};
use crate::pipeline::SymbolExtractor;
use crate::types::{signature_string, ApiUnit, Snapshot, TypeKind, TypeShape};

/// Directories never scanned for packages.
const SKIPPED_DIRS: &[&str] = &["vendor", "testdata"];

/// Extracts exported Go API from a module checkout.
#[derive(Debug, Clone, Default)]
pub struct GoExtractor;

impl GoExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl SymbolExtractor for GoExtractor {
    fn extract(&self, dir: &Path) -> Result<Snapshot> {
        let module = read_module_path(dir)?;
        let packages = collect_package_dirs(dir);
        debug!(module = %module, packages = packages.len(), "Extracting Go API");

        let units: Vec<(String, Option<ApiUnit>)> = packages
            .par_iter()
            .map(|(rel, files)| {
                let path = if rel.is_empty() {
                    module.clone()
                } else {
                    format!("{}/{}", module, rel)
                };
                extract_package(files).map(|unit| (path, unit))
            })
            .collect::<Result<_>>()?;

        Ok(units
            .into_iter()
            .filter_map(|(path, unit)| match unit {
                Some(unit) => Some((path, unit)),
                None => {
                    warn!(package = %path, "Skipping package with unreadable or invalid sources");
                    None
                }
            })
            .collect())
    }

    fn cache_namespace(&self) -> String {
        versioned_namespace("go")
    }
}

/// Module path declared in `<dir>/go.mod`.
pub fn read_module_path(dir: &Path) -> Result<String> {
    let gomod = dir.join("go.mod");
    let content = fs::read_to_string(&gomod)
        .map_err(|e| RelimpactError::extraction(dir, format!("cannot read go.mod: {}", e)))?;

    content
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("module"))
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .map(|rest| rest.trim().trim_matches('"').to_string())
        .filter(|module| !module.is_empty())
        .ok_or_else(|| RelimpactError::extraction(&gomod, "no module directive"))
}

/// Non-test `.go` files grouped by `/`-separated directory relative to `root`.
fn collect_package_dirs(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut packages: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_dir()) {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !(name.starts_with('.')
                || name.starts_with('_')
                || SKIPPED_DIRS.contains(&&*name)
                || entry.path().join("go.mod").exists())
        })
        .build();

    for entry in walker.flatten() {
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(".go") || name.ends_with("_test.go") {
            continue;
        }
        let Some(parent) = entry.path().parent() else {
            continue;
        };
        let Ok(rel) = parent.strip_prefix(root) else {
            continue;
        };
        let key = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        packages.entry(key).or_default().push(entry.path().to_path_buf());
    }

    for files in packages.values_mut() {
        files.sort();
    }
    packages
}

/// Extract one package. `Ok(None)` means some file is unreadable, not
/// UTF-8, or has syntax errors.
fn extract_package(files: &[PathBuf]) -> Result<Option<ApiUnit>> {
    let mut unit = ApiUnit::new();
    let mut methods: Vec<(String, String)> = Vec::new();

    for file in files {
        let source = match fs::read_to_string(file) {
            Ok(source) => source,
            Err(err) => {
                debug!(file = %file.display(), error = %err, "Unreadable source file");
                return Ok(None);
            }
        };
        let tree = parse_tree(&tree_sitter_go::LANGUAGE.into(), &source, file)?;
        let root = tree.root_node();
        if root.has_error() {
            debug!(file = %file.display(), "Syntax error");
            return Ok(None);
        }
        extract_file(&root, &source, &mut unit, &mut methods);
    }

    // Receivers may be declared in a different file than their type.
    for (receiver, method) in methods {
        if let Some(shape) = unit.types.get_mut(&receiver) {
            shape.methods.insert(method);
        }
    }

    Ok(Some(unit))
}

fn extract_file(root: &Node, source: &str, unit: &mut ApiUnit, methods: &mut Vec<(String, String)>) {
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "function_declaration" => {
                if let Some(sig) = function_signature(&child, source) {
                    unit.functions.insert(sig);
                }
            }
            "method_declaration" => {
                if let Some(entry) = method_entry(&child, source) {
                    methods.push(entry);
                }
            }
            "type_declaration" => extract_types(&child, source, unit),
            "var_declaration" => {
                for decl in value_specs(&child, "var_spec", source) {
                    unit.variables.insert(decl);
                }
            }
            "const_declaration" => {
                for decl in value_specs(&child, "const_spec", source) {
                    unit.constants.insert(decl);
                }
            }
            _ => {}
        }
    }
}

fn function_signature(node: &Node, source: &str) -> Option<String> {
    let name = get_node_text(&node.child_by_field_name("name")?, source);
    if !is_exported(name) {
        return None;
    }
    Some(signature(name, node, source))
}

/// `Name(params) -> (results)` from a node with `parameters`/`result` fields.
fn signature(name: &str, node: &Node, source: &str) -> String {
    let params = node
        .child_by_field_name("parameters")
        .map(|list| parameter_types(&list, source))
        .unwrap_or_default();
    let results = match node.child_by_field_name("result") {
        Some(result) if result.kind() == "parameter_list" => parameter_types(&result, source),
        Some(result) => vec![normalized_text(&result, source)],
        None => Vec::new(),
    };
    signature_string(name, &params, &results)
}

/// One type per declared parameter: `a, b int` contributes `int` twice.
fn parameter_types(list: &Node, source: &str) -> Vec<String> {
    let mut types = Vec::new();
    let mut cursor = list.walk();
    for param in list.named_children(&mut cursor) {
        let Some(ty) = param.child_by_field_name("type") else {
            continue;
        };
        let ty = normalized_text(&ty, source);
        match param.kind() {
            "parameter_declaration" => {
                let names = field_texts(&param, "name", "identifier", source).len().max(1);
                types.extend(std::iter::repeat(ty).take(names));
            }
            "variadic_parameter_declaration" => types.push(format!("...{}", ty)),
            _ => {}
        }
    }
    types
}

/// `(receiver type, method signature)` for an exported method.
fn method_entry(node: &Node, source: &str) -> Option<(String, String)> {
    let name = get_node_text(&node.child_by_field_name("name")?, source);
    if !is_exported(name) {
        return None;
    }
    let receiver = node.child_by_field_name("receiver")?;
    let mut cursor = receiver.walk();
    let param = receiver
        .named_children(&mut cursor)
        .find(|n| n.kind() == "parameter_declaration")?;
    let receiver_type = base_type_name(&param.child_by_field_name("type")?, source)?;
    Some((receiver_type, signature(name, node, source)))
}

/// `*T`, `T[K]` and `*T[K]` all name `T`.
fn base_type_name(node: &Node, source: &str) -> Option<String> {
    match node.kind() {
        "type_identifier" => Some(get_node_text(node, source).to_string()),
        "pointer_type" | "generic_type" | "parenthesized_type" => {
            let inner = node
                .child_by_field_name("type")
                .or_else(|| node.named_child(0))?;
            base_type_name(&inner, source)
        }
        _ => None,
    }
}

fn extract_types(node: &Node, source: &str, unit: &mut ApiUnit) {
    let mut cursor = node.walk();
    for spec in node.named_children(&mut cursor) {
        let Some(name_node) = spec.child_by_field_name("name") else {
            continue;
        };
        let name = get_node_text(&name_node, source);
        if !is_exported(name) {
            continue;
        }
        let shape = match spec.kind() {
            "type_spec" => match spec.child_by_field_name("type") {
                Some(ty) => type_shape(&ty, source),
                None => continue,
            },
            "type_alias" => TypeShape::new(TypeKind::Other("alias".to_string())),
            _ => continue,
        };
        unit.types.insert(name.to_string(), shape);
    }
}

fn type_shape(ty: &Node, source: &str) -> TypeShape {
    match ty.kind() {
        "struct_type" => {
            let mut shape = TypeShape::new(TypeKind::Struct);
            if let Some(list) = find_child_by_type(ty, "field_declaration_list") {
                let mut cursor = list.walk();
                for field in list.named_children(&mut cursor) {
                    if field.kind() == "field_declaration" {
                        shape.fields.extend(struct_fields(&field, source));
                    }
                }
            }
            shape
        }
        "interface_type" => {
            let mut shape = TypeShape::new(TypeKind::Interface);
            let mut cursor = ty.walk();
            for elem in ty.named_children(&mut cursor) {
                if !matches!(elem.kind(), "method_elem" | "method_spec") {
                    continue;
                }
                if let Some(name) = elem.child_by_field_name("name") {
                    let name = get_node_text(&name, source);
                    if is_exported(name) {
                        shape.methods.insert(signature(name, &elem, source));
                    }
                }
            }
            shape
        }
        other => TypeShape::new(TypeKind::Other(other.trim_end_matches("_type").to_string())),
    }
}

/// Exported `"Name Type"` entries of one field declaration.
fn struct_fields(field: &Node, source: &str) -> Vec<String> {
    let Some(ty) = field.child_by_field_name("type") else {
        return Vec::new();
    };
    let ty_text = normalized_text(&ty, source);
    let names = field_texts(field, "name", "field_identifier", source);

    if names.is_empty() {
        // Embedded field: named after its type.
        let embedded = ty_text
            .rsplit('.')
            .next()
            .unwrap_or(ty_text.as_str())
            .split('[')
            .next()
            .unwrap_or_default()
            .trim_start_matches('*')
            .to_string();
        if is_exported(&embedded) {
            return vec![get_node_text(field, source)
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string()];
        }
        return Vec::new();
    }

    names
        .into_iter()
        .filter(|name| is_exported(name))
        .map(|name| format!("{} {}", name, ty_text))
        .collect()
}

/// `"Name Type"` (or bare `"Name"` when untyped) for each exported spec name.
fn value_specs(decl: &Node, spec_kind: &str, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = decl.walk();
    for child in decl.named_children(&mut cursor) {
        if child.kind() == spec_kind {
            let ty = child
                .child_by_field_name("type")
                .map(|t| normalized_text(&t, source));
            for name in field_texts(&child, "name", "identifier", source) {
                if !is_exported(&name) {
                    continue;
                }
                out.push(match &ty {
                    Some(ty) => format!("{} {}", name, ty),
                    None => name,
                });
            }
        } else if child.kind().ends_with("_list") {
            // grouped `var ( ... )` form
            out.extend(value_specs(&child, spec_kind, source));
        }
    }
    out
}
