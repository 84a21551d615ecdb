//! Change types and result structures for the symbol diff.

use serde::{Deserialize, Serialize};

/// Which side of the comparison an item belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Added,
    Removed,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Added => "Added",
            Direction::Removed => "Removed",
        }
    }

    /// Removals of previously visible symbols break dependents; additions never do.
    pub fn is_breaking(&self) -> bool {
        matches!(self, Direction::Removed)
    }
}

/// Kind of API entity that changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Package,
    Function,
    Variable,
    Constant,
    Type,
    Field,
    Method,
}

impl Category {
    /// All categories in summary-table order.
    pub const ALL: [Category; 7] = [
        Category::Package,
        Category::Function,
        Category::Variable,
        Category::Constant,
        Category::Type,
        Category::Field,
        Category::Method,
    ];

    /// Plural display name used in summaries and bucket labels.
    pub fn plural(&self) -> &'static str {
        match self {
            Category::Package => "Packages",
            Category::Function => "Funcs",
            Category::Variable => "Vars",
            Category::Constant => "Consts",
            Category::Type => "Types",
            Category::Field => "Fields",
            Category::Method => "Methods",
        }
    }
}

/// Where a changed item lives: a compilation unit, optionally narrowed to a type.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl Scope {
    pub fn unit(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            owner: None,
        }
    }

    pub fn member(unit: &str, owner: &str) -> Self {
        Self {
            unit: unit.to_string(),
            owner: Some(owner.to_string()),
        }
    }
}

/// A single added or removed API entity.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChangeItem {
    pub category: Category,
    pub scope: Scope,
    /// Rendered value: a signature, a `"name type"` declaration, a type name or a unit path.
    pub value: String,
}

impl ChangeItem {
    pub fn new(category: Category, scope: Scope, value: impl Into<String>) -> Self {
        Self {
            category,
            scope,
            value: value.into(),
        }
    }

    /// Bucket label within a package, e.g. `Funcs`, `Type` or ``Type `Conn` Methods``.
    pub fn label(&self) -> String {
        match (&self.category, &self.scope.owner) {
            (Category::Type, _) => "Type".to_string(),
            (Category::Field, Some(owner)) => format!("Type `{}` Fields", owner),
            (Category::Method, Some(owner)) => format!("Type `{}` Methods", owner),
            (category, _) => category.plural().to_string(),
        }
    }
}

/// One row of the summary table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub category: Category,
    pub direction: Direction,
    pub count: usize,
}

impl SummaryRow {
    /// Display name such as `Funcs Added`.
    pub fn name(&self) -> String {
        format!("{} {}", self.category.plural(), self.direction.as_str())
    }
}

/// Result of comparing two snapshots.
///
/// `added` holds entities present only in the new snapshot, `removed` those
/// present only in the old one. No item ever appears in both.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<ChangeItem>,
    pub removed: Vec<ChangeItem>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, direction: Direction, item: ChangeItem) {
        match direction {
            Direction::Added => self.added.push(item),
            Direction::Removed => self.removed.push(item),
        }
    }

    pub fn items(&self, direction: Direction) -> &[ChangeItem] {
        match direction {
            Direction::Added => &self.added,
            Direction::Removed => &self.removed,
        }
    }

    /// Items of one category on one side.
    pub fn filter(&self, direction: Direction, category: Category) -> Vec<&ChangeItem> {
        self.items(direction)
            .iter()
            .filter(|item| item.category == category)
            .collect()
    }

    pub fn count(&self, direction: Direction, category: Category) -> usize {
        self.items(direction)
            .iter()
            .filter(|item| item.category == category)
            .count()
    }

    pub fn total(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// All breaking items (every removal).
    pub fn breaking(&self) -> impl Iterator<Item = &ChangeItem> {
        self.removed.iter()
    }

    pub fn breaking_count(&self) -> usize {
        self.removed.len()
    }

    pub fn has_breaking_changes(&self) -> bool {
        !self.removed.is_empty()
    }

    /// Counts per category and direction, in fixed table order.
    pub fn summary(&self) -> Vec<SummaryRow> {
        Category::ALL
            .iter()
            .flat_map(|category| {
                [Direction::Added, Direction::Removed]
                    .into_iter()
                    .map(move |direction| (*category, direction))
            })
            .map(|(category, direction)| SummaryRow {
                category,
                direction,
                count: self.count(direction, category),
            })
            .collect()
    }
}
