//! Set-difference comparison of two API snapshots.

use std::collections::{BTreeMap, BTreeSet};

use crate::differ::changes::{Category, ChangeItem, ChangeSet, Direction, Scope};
use crate::types::{ApiUnit, Snapshot, TypeShape};

/// Compare two snapshots and collect every added and removed entity.
///
/// Units present on only one side produce a single package entry; their
/// members are implied and not enumerated. The same holds for types added or
/// removed wholesale. Because every input collection is ordered, the output is
/// sorted by unit and then by category without any extra work.
pub fn diff(old: &Snapshot, new: &Snapshot) -> ChangeSet {
    let mut result = ChangeSet::new();

    let paths: BTreeSet<&String> = old.units.keys().chain(new.units.keys()).collect();

    for path in paths {
        match (old.units.get(path), new.units.get(path)) {
            (None, Some(_)) => result.push(
                Direction::Added,
                ChangeItem::new(Category::Package, Scope::unit(path), path.as_str()),
            ),
            (Some(_), None) => result.push(
                Direction::Removed,
                ChangeItem::new(Category::Package, Scope::unit(path), path.as_str()),
            ),
            (Some(old_unit), Some(new_unit)) => diff_unit(path, old_unit, new_unit, &mut result),
            (None, None) => {}
        }
    }

    result
}

fn diff_unit(path: &str, old: &ApiUnit, new: &ApiUnit, result: &mut ChangeSet) {
    let scope = Scope::unit(path);

    diff_set(Category::Function, &scope, &old.functions, &new.functions, result);
    diff_set(Category::Variable, &scope, &old.variables, &new.variables, result);
    diff_set(Category::Constant, &scope, &old.constants, &new.constants, result);
    diff_types(path, &old.types, &new.types, result);
}

fn diff_types(
    path: &str,
    old: &BTreeMap<String, TypeShape>,
    new: &BTreeMap<String, TypeShape>,
    result: &mut ChangeSet,
) {
    let names: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

    for name in names {
        match (old.get(name), new.get(name)) {
            (None, Some(_)) => result.push(
                Direction::Added,
                ChangeItem::new(Category::Type, Scope::unit(path), name.as_str()),
            ),
            (Some(_), None) => result.push(
                Direction::Removed,
                ChangeItem::new(Category::Type, Scope::unit(path), name.as_str()),
            ),
            (Some(old_type), Some(new_type)) => {
                let scope = Scope::member(path, name);
                diff_set(Category::Field, &scope, &old_type.fields, &new_type.fields, result);
                diff_set(Category::Method, &scope, &old_type.methods, &new_type.methods, result);
            }
            (None, None) => {}
        }
    }
}

/// Exact string set difference in both directions.
fn diff_set(
    category: Category,
    scope: &Scope,
    old: &BTreeSet<String>,
    new: &BTreeSet<String>,
    result: &mut ChangeSet,
) {
    for value in new.difference(old) {
        result.push(
            Direction::Added,
            ChangeItem::new(category, scope.clone(), value.as_str()),
        );
    }
    for value in old.difference(new) {
        result.push(
            Direction::Removed,
            ChangeItem::new(category, scope.clone(), value.as_str()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;

    fn snapshot(units: Vec<(&str, ApiUnit)>) -> Snapshot {
        units
            .into_iter()
            .map(|(path, unit)| (path.to_string(), unit))
            .collect()
    }

    #[test]
    fn test_function_added() {
        let old = snapshot(vec![("p", ApiUnit::new().with_function("Foo()"))]);
        let new = snapshot(vec![(
            "p",
            ApiUnit::new().with_function("Foo()").with_function("Bar()"),
        )]);

        let changes = diff(&old, &new);

        let added = changes.filter(Direction::Added, Category::Function);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].value, "Bar()");
        assert_eq!(added[0].scope, Scope::unit("p"));
        assert!(changes.filter(Direction::Removed, Category::Function).is_empty());
        assert_eq!(changes.total(), 1);
    }

    #[test]
    fn test_renamed_function_is_removal_plus_addition() {
        let old = snapshot(vec![("p", ApiUnit::new().with_function("Open(string)"))]);
        let new = snapshot(vec![("p", ApiUnit::new().with_function("OpenFile(string)"))]);

        let changes = diff(&old, &new);
        assert_eq!(changes.added.len(), 1);
        assert_eq!(changes.removed.len(), 1);
        assert_eq!(changes.removed[0].value, "Open(string)");
    }

    #[test]
    fn test_package_added_is_not_enumerated() {
        let old = snapshot(vec![]);
        let new = snapshot(vec![(
            "p",
            ApiUnit::new()
                .with_function("Foo()")
                .with_constant("Max int")
                .with_type("T", TypeShape::new(TypeKind::Struct)),
        )]);

        let changes = diff(&old, &new);
        assert_eq!(changes.added.len(), 1);
        assert_eq!(changes.added[0].category, Category::Package);
        assert_eq!(changes.added[0].value, "p");
        assert!(changes.removed.is_empty());
    }

    #[test]
    fn test_package_removed_is_breaking() {
        let old = snapshot(vec![("p", ApiUnit::new().with_function("Foo()"))]);
        let new = snapshot(vec![]);

        let changes = diff(&old, &new);
        assert_eq!(changes.count(Direction::Removed, Category::Package), 1);
        assert_eq!(changes.breaking_count(), 1);
    }

    #[test]
    fn test_type_removed_without_members() {
        let shape = TypeShape::new(TypeKind::Struct)
            .with_field("Name string")
            .with_method("Close() -> (error)");
        let old = snapshot(vec![("p", ApiUnit::new().with_type("Conn", shape))]);
        let new = snapshot(vec![("p", ApiUnit::new())]);

        let changes = diff(&old, &new);
        assert_eq!(changes.removed.len(), 1);
        assert_eq!(changes.removed[0].category, Category::Type);
        assert_eq!(changes.removed[0].value, "Conn");
        assert_eq!(changes.count(Direction::Removed, Category::Field), 0);
        assert_eq!(changes.count(Direction::Removed, Category::Method), 0);
    }

    #[test]
    fn test_fields_and_methods_scoped_to_type() {
        let old_shape = TypeShape::new(TypeKind::Struct)
            .with_field("Name string")
            .with_method("Close() -> (error)");
        let new_shape = TypeShape::new(TypeKind::Struct)
            .with_field("Name string")
            .with_field("Timeout time.Duration")
            .with_method("Shutdown() -> (error)");
        let old = snapshot(vec![("p", ApiUnit::new().with_type("Conn", old_shape))]);
        let new = snapshot(vec![("p", ApiUnit::new().with_type("Conn", new_shape))]);

        let changes = diff(&old, &new);

        let fields = changes.filter(Direction::Added, Category::Field);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].value, "Timeout time.Duration");
        assert_eq!(fields[0].scope, Scope::member("p", "Conn"));
        assert_eq!(fields[0].label(), "Type `Conn` Fields");

        let removed = changes.filter(Direction::Removed, Category::Method);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].value, "Close() -> (error)");
        assert_eq!(changes.count(Direction::Added, Category::Method), 1);
    }

    #[test]
    fn test_variables_and_constants() {
        let old = snapshot(vec![(
            "p",
            ApiUnit::new()
                .with_variable("ErrClosed error")
                .with_constant("Version string"),
        )]);
        let new = snapshot(vec![(
            "p",
            ApiUnit::new()
                .with_variable("ErrClosed error")
                .with_variable("ErrTimeout error")
                .with_constant("Version untyped"),
        )]);

        let changes = diff(&old, &new);
        assert_eq!(changes.count(Direction::Added, Category::Variable), 1);
        assert_eq!(changes.count(Direction::Added, Category::Constant), 1);
        assert_eq!(changes.count(Direction::Removed, Category::Constant), 1);
        assert_eq!(changes.count(Direction::Removed, Category::Variable), 0);
    }

    #[test]
    fn test_output_sorted_by_unit() {
        let old = snapshot(vec![]);
        let new = snapshot(vec![
            ("zeta", ApiUnit::new()),
            ("alpha", ApiUnit::new()),
            ("mid", ApiUnit::new()),
        ]);

        let changes = diff(&old, &new);
        let values: Vec<&str> = changes.added.iter().map(|i| i.value.as_str()).collect();
        assert_eq!(values, vec!["alpha", "mid", "zeta"]);
    }
}
