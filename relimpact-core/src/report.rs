//! Report assembly and rendering.
//!
//! A [`Report`] is the merged result of one pipeline run. Rendering only reads
//! it; any ordering beyond what the diff engines already guarantee is applied
//! to private copies.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::str::FromStr;

use serde::Serialize;
use tabled::{
    builder::Builder,
    settings::{object::Columns, style::Style, Alignment, Modify},
};

use crate::auxiliary::{AuxAction, AuxiliaryReport};
use crate::differ::{Category, ChangeSet, Direction, SummaryRow};
use crate::docs::DocDiff;
use crate::error::Result;

/// Merged output of the three diff stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub old_ref: String,
    pub new_ref: String,
    pub api: ChangeSet,
    pub docs: Vec<DocDiff>,
    pub auxiliary: AuxiliaryReport,
}

/// Output format for a rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Markdown => "markdown",
            ReportFormat::Json => "json",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            _ => Err(format!("Unknown report format: {}", s)),
        }
    }
}

/// Render in the requested format.
pub fn render(report: &Report, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Markdown => Ok(render_markdown(report)),
        ReportFormat::Json => render_json(report),
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    old_ref: &'a str,
    new_ref: &'a str,
    summary: Vec<JsonSummaryRow>,
    total_changes: usize,
    breaking_changes: usize,
    api: &'a ChangeSet,
    docs: &'a [DocDiff],
    auxiliary: &'a AuxiliaryReport,
}

#[derive(Serialize)]
struct JsonSummaryRow {
    kind: String,
    count: usize,
}

/// Pretty-printed JSON with the summary counts precomputed.
pub fn render_json(report: &Report) -> Result<String> {
    let view = JsonReport {
        old_ref: &report.old_ref,
        new_ref: &report.new_ref,
        summary: report
            .api
            .summary()
            .iter()
            .map(|row| JsonSummaryRow {
                kind: row.name(),
                count: row.count,
            })
            .collect(),
        total_changes: report.api.total(),
        breaking_changes: report.api.breaking_count(),
        api: &report.api,
        docs: &report.docs,
        auxiliary: &report.auxiliary,
    };
    Ok(serde_json::to_string_pretty(&view)?)
}

/// Markdown document with sections API, Documentation, Other Files, in that order.
pub fn render_markdown(report: &Report) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Release Impact Report\n");
    let _ = writeln!(
        out,
        "Changes from `{}` to `{}`.\n",
        report.old_ref, report.new_ref
    );

    write_api_section(&mut out, &report.api);
    out.push('\n');
    write_docs_section(&mut out, &report.docs);
    out.push('\n');
    write_auxiliary_section(&mut out, &report.auxiliary);

    out
}

fn write_api_section(out: &mut String, api: &ChangeSet) {
    let packages_added = sorted_values(api, Direction::Added, Category::Package);
    let packages_removed = sorted_values(api, Direction::Removed, Category::Package);

    out.push_str("## API Changes\n\n");
    out.push_str("- [Summary](#summary)\n");
    out.push_str("- [Breaking Changes](#breaking-changes)\n");
    if !packages_added.is_empty() {
        out.push_str("- [Packages Added](#packages-added)\n");
    }
    if !packages_removed.is_empty() {
        out.push_str("- [Packages Removed](#packages-removed)\n");
    }
    out.push_str("- [Package Changes](#package-changes)\n");

    let rows = api.summary();
    out.push_str("\n### Summary\n\n");
    out.push_str(&summary_table(&rows, api.total()));
    out.push('\n');

    out.push_str("\n### Breaking Changes\n\n");
    let breaking: Vec<&SummaryRow> = rows
        .iter()
        .filter(|row| row.direction.is_breaking() && row.count > 0)
        .collect();
    if breaking.is_empty() {
        out.push_str("_No breaking changes detected._\n");
    } else {
        for row in breaking {
            let _ = writeln!(out, "- {}: **{}**", row.name(), row.count);
        }
    }

    write_package_list(out, "Packages Added", &packages_added);
    write_package_list(out, "Packages Removed", &packages_removed);

    out.push_str("\n### Package Changes\n");
    let grouped = group_by_package(api);
    if grouped.is_empty() {
        out.push_str("\n_No package changes detected._\n");
        return;
    }
    for (unit, buckets) in grouped {
        let _ = writeln!(out, "\n#### Package `{}`\n", unit);
        out.push_str("<details>\n<summary>Click to expand</summary>\n\n");
        for (label, mut values) in buckets {
            values.sort_unstable();
            let _ = writeln!(out, "- {}:", label);
            for value in values {
                let _ = writeln!(out, "    - {}", value);
            }
        }
        out.push_str("\n</details>\n");
    }
}

fn summary_table(rows: &[SummaryRow], total: usize) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Kind of Change", "Count"]);
    for row in rows {
        builder.push_record([row.name(), row.count.to_string()]);
    }
    builder.push_record(["Total Changes".to_string(), total.to_string()]);

    let mut table = builder.build();
    table.with(Style::markdown());
    table.with(Modify::new(Columns::single(1)).with(Alignment::right()));
    table.to_string()
}

fn sorted_values(api: &ChangeSet, direction: Direction, category: Category) -> Vec<&str> {
    let mut values: Vec<&str> = api
        .filter(direction, category)
        .into_iter()
        .map(|item| item.value.as_str())
        .collect();
    values.sort_unstable();
    values
}

fn write_package_list(out: &mut String, title: &str, packages: &[&str]) {
    if packages.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n### {}\n", title);
    for package in packages {
        let _ = writeln!(out, "- `{}`", package);
    }
}

/// unit -> "Added Funcs" style bucket label -> values
fn group_by_package(api: &ChangeSet) -> BTreeMap<&str, BTreeMap<String, Vec<&str>>> {
    let mut grouped: BTreeMap<&str, BTreeMap<String, Vec<&str>>> = BTreeMap::new();

    for direction in [Direction::Added, Direction::Removed] {
        for item in api.items(direction) {
            if item.category == Category::Package {
                continue;
            }
            grouped
                .entry(item.scope.unit.as_str())
                .or_default()
                .entry(format!("{} {}", direction.as_str(), item.label()))
                .or_default()
                .push(item.value.as_str());
        }
    }

    grouped
}

fn write_docs_section(out: &mut String, docs: &[DocDiff]) {
    out.push_str("## Documentation Changes\n\n");

    if docs.is_empty() {
        out.push_str("_No documentation changes detected._\n");
        return;
    }

    let mut docs: Vec<&DocDiff> = docs.iter().collect();
    docs.sort_by(|a, b| a.file.cmp(&b.file));

    for doc in docs {
        let _ = writeln!(out, "### Doc File Changes: **`{}`**\n", doc.file);
        write_doc_list(out, "Headings added", &doc.headings_added);
        write_doc_list(out, "Headings removed", &doc.headings_removed);
        write_doc_list(out, "Links added", &doc.links_added);
        write_doc_list(out, "Links removed", &doc.links_removed);
        write_doc_list(out, "Images added", &doc.images_added);
        write_doc_list(out, "Images removed", &doc.images_removed);

        if !doc.section_changes.is_empty() {
            out.push_str("#### Section Word Count Changes:\n");
            for change in &doc.section_changes {
                let _ = writeln!(out, "{}", change);
            }
            out.push('\n');
        }
    }
}

fn write_doc_list(out: &mut String, title: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    let _ = writeln!(out, "#### {}:", title);
    for value in values {
        let _ = writeln!(out, "- {}", value);
    }
    out.push('\n');
}

fn write_auxiliary_section(out: &mut String, auxiliary: &AuxiliaryReport) {
    out.push_str("## Other Files Changes\n\n");

    if auxiliary.is_empty() {
        out.push_str("_No other file changes detected._\n");
        return;
    }

    for (extension, actions) in &auxiliary.groups {
        let _ = writeln!(out, "### `{}`\n", extension);
        for action in AuxAction::ALL {
            let Some(paths) = actions.get(&action) else {
                continue;
            };
            if paths.is_empty() {
                continue;
            }
            let _ = writeln!(out, "- {}:", action.as_str());
            for path in paths {
                let _ = writeln!(out, "  - {}", path);
            }
            out.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auxiliary::classify;
    use crate::differ::{diff, ChangeItem, Scope};
    use crate::docs::SectionChange;
    use crate::types::{ApiUnit, Snapshot, TypeKind, TypeShape};

    fn empty_report() -> Report {
        Report {
            old_ref: "v1".to_string(),
            new_ref: "v2".to_string(),
            api: ChangeSet::new(),
            docs: Vec::new(),
            auxiliary: AuxiliaryReport::default(),
        }
    }

    #[test]
    fn test_section_order() {
        let text = render_markdown(&empty_report());

        let api = text.find("## API Changes").unwrap();
        let docs = text.find("## Documentation Changes").unwrap();
        let other = text.find("## Other Files Changes").unwrap();
        assert!(api < docs && docs < other);
        assert!(text.starts_with("# Release Impact Report"));
        assert!(text.contains("`v1`"));
        assert!(text.contains("`v2`"));
    }

    #[test]
    fn test_empty_sections_have_placeholders() {
        let text = render_markdown(&empty_report());

        assert!(text.contains("_No breaking changes detected._"));
        assert!(text.contains("_No documentation changes detected._"));
        assert!(text.contains("_No other file changes detected._"));
        assert!(!text.contains("### Packages Added"));
        assert!(!text.contains("[Packages Added]"));
    }

    #[test]
    fn test_summary_table_rows() {
        let mut report = empty_report();
        report.api.push(
            Direction::Added,
            ChangeItem::new(Category::Function, Scope::unit("p"), "Bar()"),
        );

        let text = render_markdown(&report);
        let row = text
            .lines()
            .find(|line| line.contains("Funcs Added"))
            .unwrap();
        assert!(row.starts_with('|'));
        assert!(row.contains(" 1 "));
        assert!(text.lines().any(|l| l.contains("Total Changes") && l.contains(" 1 ")));
        assert!(text.lines().any(|l| l.contains("Methods Removed")));
    }

    #[test]
    fn test_breaking_callout_fixed_order() {
        let mut old = Snapshot::new();
        old.insert(
            "p",
            ApiUnit::new()
                .with_function("Foo()")
                .with_type("T", TypeShape::new(TypeKind::Struct)),
        );
        old.insert("q", ApiUnit::new());
        let mut new = Snapshot::new();
        new.insert("p", ApiUnit::new());

        let mut report = empty_report();
        report.api = diff(&old, &new);
        let text = render_markdown(&report);

        let packages = text.find("- Packages Removed: **1**").unwrap();
        let funcs = text.find("- Funcs Removed: **1**").unwrap();
        let types = text.find("- Types Removed: **1**").unwrap();
        assert!(packages < funcs && funcs < types);
        assert!(!text.contains("_No breaking changes detected._"));
    }

    #[test]
    fn test_package_details_block() {
        let mut old = Snapshot::new();
        old.insert("p", ApiUnit::new().with_function("Foo()"));
        let mut new = Snapshot::new();
        new.insert("p", ApiUnit::new().with_function("Foo()").with_function("Bar()"));
        new.insert("r", ApiUnit::new());

        let mut report = empty_report();
        report.api = diff(&old, &new);
        let text = render_markdown(&report);

        assert!(text.contains("### Packages Added\n\n- `r`\n"));
        assert!(text.contains(
            "#### Package `p`\n\n<details>\n<summary>Click to expand</summary>\n\n- Added Funcs:\n    - Bar()\n\n</details>\n"
        ));
        assert!(!text.contains("#### Package `r`"));
    }

    #[test]
    fn test_type_buckets_use_singular_label() {
        let mut old = Snapshot::new();
        old.insert("p", ApiUnit::new().with_type("Old", TypeShape::new(TypeKind::Struct)));
        let mut new = Snapshot::new();
        new.insert("p", ApiUnit::new().with_type("Conn", TypeShape::new(TypeKind::Interface)));

        let mut report = empty_report();
        report.api = diff(&old, &new);
        let text = render_markdown(&report);

        assert!(text.contains("- Added Type:\n    - Conn\n"));
        assert!(text.contains("- Removed Type:\n    - Old\n"));
        assert!(text.contains("- Types Removed: **1**"));
        assert!(text.lines().any(|l| l.contains("Types Added") && l.contains(" 1 ")));
    }

    #[test]
    fn test_docs_and_auxiliary_blocks() {
        let mut report = empty_report();
        report.docs.push(DocDiff {
            file: "README.md".to_string(),
            headings_added: vec!["New Section".to_string()],
            section_changes: vec![SectionChange::Changed {
                heading: "Intro".to_string(),
                old: 10,
                new: 12,
            }],
            ..Default::default()
        });
        report.auxiliary = classify(
            &[
                ("M".to_string(), "config/app.yaml".to_string()),
                ("A".to_string(), "logo.png".to_string()),
            ],
            &[".yaml"],
        );

        let text = render_markdown(&report);

        assert!(text.contains("### Doc File Changes: **`README.md`**\n\n#### Headings added:\n- New Section\n"));
        assert!(text.contains("#### Section Word Count Changes:\n- Section `Intro`: 10 -> 12 words\n"));
        assert!(!text.contains("Headings removed"));
        assert!(text.contains("### `.yaml`\n\n- Modified:\n  - config/app.yaml\n"));
        assert!(!text.contains("logo.png"));
    }

    #[test]
    fn test_render_does_not_mutate_input() {
        let mut report = empty_report();
        report.api.push(
            Direction::Added,
            ChangeItem::new(Category::Function, Scope::unit("p"), "Zed()"),
        );
        report.api.push(
            Direction::Added,
            ChangeItem::new(Category::Function, Scope::unit("p"), "Alpha()"),
        );
        let before = report.clone();

        let text = render_markdown(&report);
        assert!(text.find("- Alpha()").unwrap() < text.find("- Zed()").unwrap());
        assert_eq!(report, before);
    }

    #[test]
    fn test_render_json() {
        let mut report = empty_report();
        report.api.push(
            Direction::Removed,
            ChangeItem::new(Category::Function, Scope::unit("p"), "Foo()"),
        );

        let json = render_json(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["old_ref"], "v1");
        assert_eq!(value["breaking_changes"], 1);
        assert_eq!(value["total_changes"], 1);
        assert_eq!(value["api"]["removed"][0]["value"], "Foo()");
        assert_eq!(value["summary"][3]["kind"], "Funcs Removed");
    }

    #[test]
    fn test_report_format_from_str() {
        assert_eq!("markdown".parse::<ReportFormat>(), Ok(ReportFormat::Markdown));
        assert_eq!("JSON".parse::<ReportFormat>(), Ok(ReportFormat::Json));
        assert!("xml".parse::<ReportFormat>().is_err());
    }
}
