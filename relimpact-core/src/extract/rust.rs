//! Rust API extractor using tree-sitter.
//!
//! Every `Cargo.toml` with a `[package]` table and a library target is a
//! crate. Units are module paths (`my_crate::net::tcp`) derived from the
//! source files of the library plus inline `pub mod` blocks. Only items with
//! a bare `pub` are part of the API.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use rayon::prelude::*;
use tracing::{debug, warn};
use tree_sitter::Node;

use super::versioned_namespace;
use super::helpers::{find_child_by_type, get_node_text, normalized_text, parse_tree};
use crate::error::Result;
use crate::pipeline::SymbolExtractor;
use crate::types::{signature_string, ApiUnit, Snapshot, TypeKind, TypeShape};

/// Directories never searched for manifests.
const SKIPPED_DIRS: &[&str] = &["target", "vendor"];

/// Extracts public Rust API from every library crate in a checkout.
#[derive(Debug, Clone, Default)]
pub struct RustExtractor;

impl RustExtractor {
    pub fn new() -> Self {
        Self
    }
}

/// A library crate found in the working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LibCrate {
    /// Crate name as used in paths (`-` replaced by `_`).
    name: String,
    /// Directory holding the library root file.
    src_root: PathBuf,
    /// The library root file, usually `src/lib.rs`.
    lib_file: PathBuf,
}

/// Units and inherent-impl methods found in one file.
#[derive(Debug, Default)]
struct FileApi {
    units: BTreeMap<String, ApiUnit>,
    /// `(unit, type, method signature)`
    impl_methods: Vec<(String, String, String)>,
}

impl SymbolExtractor for RustExtractor {
    fn extract(&self, dir: &Path) -> Result<Snapshot> {
        let crates = find_crates(dir);
        debug!(crates = crates.len(), "Extracting Rust API");

        let files: Vec<(String, PathBuf)> = crates.iter().flat_map(module_files).collect();

        let parsed: Vec<Option<FileApi>> = files
            .par_iter()
            .map(|(unit, file)| extract_file(unit, file))
            .collect::<Result<_>>()?;

        let mut snapshot = Snapshot::new();
        let mut impl_methods = Vec::new();
        for (file_api, (unit, _)) in parsed.into_iter().zip(&files) {
            let Some(file_api) = file_api else {
                warn!(module = %unit, "Skipping module with unreadable or invalid source");
                continue;
            };
            for (path, api) in file_api.units {
                merge_unit(snapshot.units.entry(path).or_default(), api);
            }
            impl_methods.extend(file_api.impl_methods);
        }

        for (unit, type_name, method) in impl_methods {
            if let Some(shape) = snapshot
                .units
                .get_mut(&unit)
                .and_then(|api| api.types.get_mut(&type_name))
            {
                shape.methods.insert(method);
            }
        }

        Ok(snapshot)
    }

    fn cache_namespace(&self) -> String {
        versioned_namespace("rust")
    }
}

fn merge_unit(into: &mut ApiUnit, from: ApiUnit) {
    into.functions.extend(from.functions);
    into.variables.extend(from.variables);
    into.constants.extend(from.constants);
    for (name, shape) in from.types {
        let entry = into.types.entry(name).or_insert_with(|| TypeShape::new(shape.kind.clone()));
        entry.fields.extend(shape.fields);
        entry.methods.extend(shape.methods);
    }
}

/// Library crates under `root`, sorted by manifest path.
fn find_crates(root: &Path) -> Vec<LibCrate> {
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_dir()) {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !(name.starts_with('.') || SKIPPED_DIRS.contains(&&*name))
        })
        .build();

    let mut manifests: Vec<PathBuf> = walker
        .flatten()
        .filter(|entry| entry.file_name() == "Cargo.toml")
        .map(|entry| entry.into_path())
        .collect();
    manifests.sort();

    manifests
        .into_iter()
        .filter_map(|manifest| match read_manifest(&manifest) {
            Ok(krate) => krate,
            Err(err) => {
                warn!(manifest = %manifest.display(), error = %err, "Skipping unreadable manifest");
                None
            }
        })
        .collect()
}

/// Parse a manifest; `Ok(None)` if it declares no library crate.
fn read_manifest(manifest: &Path) -> Result<Option<LibCrate>> {
    let content = fs::read_to_string(manifest)?;
    let table: toml::Table = toml::from_str(&content)?;

    let Some(name) = table
        .get("package")
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
    else {
        return Ok(None);
    };

    let crate_dir = manifest.parent().unwrap_or(Path::new("."));
    let lib_path = table
        .get("lib")
        .and_then(|l| l.get("path"))
        .and_then(|p| p.as_str())
        .unwrap_or("src/lib.rs");
    let lib_file = crate_dir.join(lib_path);
    if !lib_file.is_file() {
        return Ok(None);
    }
    let src_root = lib_file.parent().unwrap_or(crate_dir).to_path_buf();

    Ok(Some(LibCrate {
        name: name.replace('-', "_"),
        src_root,
        lib_file,
    }))
}

/// `(module path, file)` for the library root and every module file under it.
fn module_files(krate: &LibCrate) -> Vec<(String, PathBuf)> {
    let mut files = vec![(krate.name.clone(), krate.lib_file.clone())];

    let walker = WalkBuilder::new(&krate.src_root)
        .standard_filters(false)
        .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == "bin"))
        .build();

    for entry in walker.flatten() {
        let path = entry.path();
        if path == krate.lib_file || !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("rs") {
            continue;
        }
        let Ok(rel) = path.strip_prefix(&krate.src_root) else {
            continue;
        };
        if let Some(module) = module_path(&krate.name, rel) {
            files.push((module, path.to_path_buf()));
        }
    }

    files.sort();
    files
}

/// `net/tcp.rs` and `net/tcp/mod.rs` both map to `crate::net::tcp`.
fn module_path(crate_name: &str, rel: &Path) -> Option<String> {
    let mut parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    let file = parts.pop()?;
    let stem = file.strip_suffix(".rs")?;
    if parts.is_empty() && matches!(stem, "lib" | "main") {
        return None;
    }
    if stem != "mod" {
        parts.push(stem.to_string());
    }
    if parts.is_empty() {
        return None;
    }
    Some(format!("{}::{}", crate_name, parts.join("::")))
}

/// Extract one source file. `Ok(None)` means the file is unreadable, not
/// UTF-8, or has syntax errors.
fn extract_file(unit: &str, file: &Path) -> Result<Option<FileApi>> {
    let source = match fs::read_to_string(file) {
        Ok(source) => source,
        Err(err) => {
            debug!(file = %file.display(), error = %err, "Unreadable source file");
            return Ok(None);
        }
    };
    let tree = parse_tree(&tree_sitter_rust::LANGUAGE.into(), &source, file)?;
    let root = tree.root_node();
    if root.has_error() {
        debug!(file = %file.display(), "Syntax error");
        return Ok(None);
    }

    let mut api = FileApi::default();
    extract_module(&root, &source, unit, &mut api);
    Ok(Some(api))
}

fn extract_module(container: &Node, source: &str, path: &str, out: &mut FileApi) {
    let mut unit = ApiUnit::new();

    let mut cursor = container.walk();
    for item in container.named_children(&mut cursor) {
        let kind = item.kind();
        if kind == "impl_item" {
            collect_impl_methods(&item, source, path, out);
            continue;
        }
        if !is_pub(&item, source) {
            continue;
        }
        match kind {
            "function_item" => {
                if let Some(sig) = fn_signature(&item, source) {
                    unit.functions.insert(sig);
                }
            }
            "static_item" => {
                if let Some(decl) = typed_decl(&item, source) {
                    unit.variables.insert(decl);
                }
            }
            "const_item" => {
                if let Some(decl) = typed_decl(&item, source) {
                    unit.constants.insert(decl);
                }
            }
            "struct_item" | "union_item" | "enum_item" | "trait_item" | "type_item" => {
                if let Some((name, shape)) = type_item(&item, source) {
                    unit.types.insert(name, shape);
                }
            }
            "mod_item" => {
                if let (Some(name), Some(body)) = (
                    item.child_by_field_name("name"),
                    item.child_by_field_name("body"),
                ) {
                    let inner = format!("{}::{}", path, get_node_text(&name, source));
                    extract_module(&body, source, &inner, out);
                }
            }
            _ => {}
        }
    }

    merge_unit(out.units.entry(path.to_string()).or_default(), unit);
}

/// Plain `pub`; `pub(crate)`, `pub(super)` and friends are not API.
fn is_pub(item: &Node, source: &str) -> bool {
    find_child_by_type(item, "visibility_modifier")
        .is_some_and(|vis| get_node_text(&vis, source) == "pub")
}

fn fn_signature(item: &Node, source: &str) -> Option<String> {
    let name = get_node_text(&item.child_by_field_name("name")?, source);

    let mut params = Vec::new();
    if let Some(list) = item.child_by_field_name("parameters") {
        let mut cursor = list.walk();
        for param in list.named_children(&mut cursor) {
            match param.kind() {
                "parameter" => {
                    if let Some(ty) = param.child_by_field_name("type") {
                        params.push(normalized_text(&ty, source));
                    }
                }
                "attribute_item" => {}
                _ => params.push(normalized_text(&param, source)),
            }
        }
    }

    let results: Vec<String> = item
        .child_by_field_name("return_type")
        .map(|ty| normalized_text(&ty, source))
        .into_iter()
        .collect();

    Some(signature_string(name, &params, &results))
}

/// `"NAME Type"` for consts and statics.
fn typed_decl(item: &Node, source: &str) -> Option<String> {
    let name = get_node_text(&item.child_by_field_name("name")?, source);
    match item.child_by_field_name("type") {
        Some(ty) => Some(format!("{} {}", name, normalized_text(&ty, source))),
        None => Some(name.to_string()),
    }
}

fn type_item(item: &Node, source: &str) -> Option<(String, TypeShape)> {
    let name = get_node_text(&item.child_by_field_name("name")?, source).to_string();
    let body = item.child_by_field_name("body");

    let shape = match item.kind() {
        "struct_item" => {
            let mut shape = TypeShape::new(TypeKind::Struct);
            if let Some(body) = body {
                shape.fields.extend(pub_fields(&body, source));
            }
            shape
        }
        "union_item" => {
            let mut shape = TypeShape::new(TypeKind::Other("union".to_string()));
            if let Some(body) = body {
                shape.fields.extend(pub_fields(&body, source));
            }
            shape
        }
        "enum_item" => {
            let mut shape = TypeShape::new(TypeKind::Other("enum".to_string()));
            if let Some(body) = body {
                let mut cursor = body.walk();
                for variant in body.named_children(&mut cursor) {
                    if variant.kind() == "enum_variant" {
                        if let Some(v) = enum_variant(&variant, source) {
                            shape.fields.insert(v);
                        }
                    }
                }
            }
            shape
        }
        "trait_item" => {
            let mut shape = TypeShape::new(TypeKind::Interface);
            if let Some(body) = body {
                let mut cursor = body.walk();
                for member in body.named_children(&mut cursor) {
                    if matches!(member.kind(), "function_signature_item" | "function_item") {
                        if let Some(sig) = fn_signature(&member, source) {
                            shape.methods.insert(sig);
                        }
                    }
                }
            }
            shape
        }
        "type_item" => TypeShape::new(TypeKind::Other("alias".to_string())),
        _ => return None,
    };

    Some((name, shape))
}

/// Public fields of a named or tuple field list.
fn pub_fields(body: &Node, source: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut cursor = body.walk();

    match body.kind() {
        "field_declaration_list" => {
            for field in body.named_children(&mut cursor) {
                if field.kind() != "field_declaration" || !is_pub(&field, source) {
                    continue;
                }
                if let (Some(name), Some(ty)) = (
                    field.child_by_field_name("name"),
                    field.child_by_field_name("type"),
                ) {
                    fields.push(format!(
                        "{} {}",
                        get_node_text(&name, source),
                        normalized_text(&ty, source)
                    ));
                }
            }
        }
        "ordered_field_declaration_list" => {
            let mut index = 0;
            let mut public = false;
            for child in body.named_children(&mut cursor) {
                match child.kind() {
                    "visibility_modifier" => public = get_node_text(&child, source) == "pub",
                    "attribute_item" => {}
                    _ => {
                        if public {
                            fields.push(format!("{} {}", index, normalized_text(&child, source)));
                        }
                        index += 1;
                        public = false;
                    }
                }
            }
        }
        _ => {}
    }

    fields
}

/// `Name`, `Name(T, U)` or `Name { a: T }`.
fn enum_variant(variant: &Node, source: &str) -> Option<String> {
    let name = get_node_text(&variant.child_by_field_name("name")?, source);
    Some(match variant.child_by_field_name("body") {
        Some(body) if body.kind() == "field_declaration_list" => {
            format!("{} {}", name, normalized_text(&body, source))
        }
        Some(body) => format!("{}{}", name, normalized_text(&body, source)),
        None => name.to_string(),
    })
}

/// Record `pub` methods of an inherent impl against the implementing type.
fn collect_impl_methods(item: &Node, source: &str, path: &str, out: &mut FileApi) {
    if item.child_by_field_name("trait").is_some() {
        return;
    }
    let Some(type_name) = item
        .child_by_field_name("type")
        .and_then(|ty| impl_type_name(&ty, source))
    else {
        return;
    };
    let Some(body) = item.child_by_field_name("body") else {
        return;
    };

    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        if member.kind() != "function_item" || !is_pub(&member, source) {
            continue;
        }
        if let Some(sig) = fn_signature(&member, source) {
            out.impl_methods
                .push((path.to_string(), type_name.clone(), sig));
        }
    }
}

/// `Foo` and `Foo<T>` name `Foo`; paths to foreign types are ignored.
fn impl_type_name(ty: &Node, source: &str) -> Option<String> {
    match ty.kind() {
        "type_identifier" => Some(get_node_text(ty, source).to_string()),
        "generic_type" => impl_type_name(&ty.child_by_field_name("type")?, source),
        _ => None,
    }
}
