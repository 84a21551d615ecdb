//! Data models for exported API surfaces.
//!
//! A [`Snapshot`] is the complete externally-visible symbol surface of one
//! working copy. Symbols are kept as pre-normalized strings: the diff engine
//! compares by string identity only and never tries to match renamed or
//! structurally equivalent entries.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Exported surface of a whole working copy, keyed by compilation-unit path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub units: BTreeMap<String, ApiUnit>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a unit.
    pub fn insert(&mut self, path: impl Into<String>, unit: ApiUnit) {
        self.units.insert(path.into(), unit);
    }

    pub fn get(&self, path: &str) -> Option<&ApiUnit> {
        self.units.get(path)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl FromIterator<(String, ApiUnit)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, ApiUnit)>>(iter: I) -> Self {
        Self {
            units: iter.into_iter().collect(),
        }
    }
}

/// Exported surface of one compilation unit (a package or module).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiUnit {
    /// Signatures such as `Open(string) -> (*File, error)`.
    #[serde(default)]
    pub functions: BTreeSet<String>,
    /// `"name type"` strings.
    #[serde(default)]
    pub variables: BTreeSet<String>,
    /// `"name type"` strings.
    #[serde(default)]
    pub constants: BTreeSet<String>,
    #[serde(default)]
    pub types: BTreeMap<String, TypeShape>,
}

impl ApiUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper, mostly for tests and fixtures.
    pub fn with_function(mut self, signature: &str) -> Self {
        self.functions.insert(signature.to_string());
        self
    }

    pub fn with_variable(mut self, decl: &str) -> Self {
        self.variables.insert(decl.to_string());
        self
    }

    pub fn with_constant(mut self, decl: &str) -> Self {
        self.constants.insert(decl.to_string());
        self
    }

    pub fn with_type(mut self, name: &str, shape: TypeShape) -> Self {
        self.types.insert(name.to_string(), shape);
        self
    }

    /// Total number of top-level symbols in this unit.
    pub fn symbol_count(&self) -> usize {
        self.functions.len() + self.variables.len() + self.constants.len() + self.types.len()
    }
}

/// Kind of an exported type.
///
/// Serialized as a plain string (`"struct"`, `"interface"`, or any other label)
/// so external extractors can emit whatever kind names their language uses.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TypeKind {
    Struct,
    Interface,
    /// Anything else (enums, aliases, named basic types); the label is informational.
    Other(String),
}

impl Default for TypeKind {
    fn default() -> Self {
        TypeKind::Other("other".to_string())
    }
}

impl TypeKind {
    pub fn as_str(&self) -> &str {
        match self {
            TypeKind::Struct => "struct",
            TypeKind::Interface => "interface",
            TypeKind::Other(label) => label,
        }
    }
}

impl From<String> for TypeKind {
    fn from(label: String) -> Self {
        match label.as_str() {
            "struct" => TypeKind::Struct,
            "interface" => TypeKind::Interface,
            _ => TypeKind::Other(label),
        }
    }
}

impl From<TypeKind> for String {
    fn from(kind: TypeKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Shape of an exported type: its visible fields and methods.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeShape {
    pub kind: TypeKind,
    /// `"name type"` strings.
    #[serde(default)]
    pub fields: BTreeSet<String>,
    /// `"name(params) -> (results)"` strings.
    #[serde(default)]
    pub methods: BTreeSet<String>,
}

impl TypeShape {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn with_field(mut self, field: &str) -> Self {
        self.fields.insert(field.to_string());
        self
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.methods.insert(method.to_string());
        self
    }
}

/// Render a normalized signature string: `Name(A, B) -> (C, D)`.
///
/// The result list is omitted entirely when empty.
pub fn signature_string(name: &str, params: &[String], results: &[String]) -> String {
    let mut sig = format!("{}({})", name, params.join(", "));
    if !results.is_empty() {
        sig.push_str(&format!(" -> ({})", results.join(", ")));
    }
    sig
}
