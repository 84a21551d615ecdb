//! Helper functions for tree-sitter AST navigation.

use std::path::Path;

use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::{RelimpactError, Result};

/// Get the text content of a node.
pub fn get_node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    let start = node.start_byte();
    let end = node.end_byte();
    if start < source.len() && end <= source.len() && start < end {
        &source[start..end]
    } else {
        ""
    }
}

/// Node text with all whitespace runs collapsed to a single space.
pub fn normalized_text(node: &Node, source: &str) -> String {
    get_node_text(node, source)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Find the first child of a specific type.
#[allow(clippy::manual_find)]
pub fn find_child_by_type<'a>(node: &Node<'a>, type_name: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == type_name {
            return Some(child);
        }
    }
    None
}

/// Texts of the children under `field` that have the given kind.
///
/// Fields spanning a comma-separated list also tag the separators, so the
/// kind filter is required.
pub fn field_texts(node: &Node, field: &str, kind: &str, source: &str) -> Vec<String> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor)
        .filter(|child| child.kind() == kind)
        .map(|child| get_node_text(&child, source).to_string())
        .collect()
}

/// Parse `source` with `language`, failing only if the parser cannot run.
pub fn parse_tree(language: &Language, source: &str, path: &Path) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|e| RelimpactError::extraction(path, format!("failed to set language: {}", e)))?;
    parser
        .parse(source, None)
        .ok_or_else(|| RelimpactError::extraction(path, "parser returned no tree"))
}

/// Go-style export rule: the name starts with an upper-case letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}
