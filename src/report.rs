use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{Datelike, NaiveDate};

use crate::aggregate::{self, RoleOverview};
use crate::engine::ProgressReport;
use crate::models::{CaseRecord, CategoryCount, CategoryCounts, ProgressRow, Role};

pub fn overview_sentence(overview: &RoleOverview<'_>) -> String {
    format!(
        "As {} surgeon, you completed {} cases ({} unique procedures or surgeries).",
        overview.role.as_str().to_lowercase(),
        overview.total_cases(),
        overview.unique_surgeries()
    )
}

pub fn cases_per_month(records: &[&CaseRecord]) -> BTreeMap<(i32, u32), usize> {
    let mut months = BTreeMap::new();
    for (date, count) in aggregate::timeline(records) {
        *months.entry((date.year(), date.month())).or_insert(0) += count;
    }
    months
}

fn category_width<'a>(categories: impl Iterator<Item = &'a str>) -> usize {
    categories
        .map(|category| category.chars().count())
        .max()
        .unwrap_or(0)
        .max("Category".len())
}

pub fn progress_table(rows: &[ProgressRow]) -> String {
    let width = category_width(rows.iter().map(|row| row.category.as_str()));

    let mut output = String::new();
    let _ = writeln!(
        output,
        "{:<width$}  {:>7}  {:>9}  {:>5}  {:>7}",
        "Category", "Primary", "Assistant", "Total", "Minimum"
    );
    for row in rows {
        let _ = writeln!(
            output,
            "{:<width$}  {:>7}  {:>9}  {:>5}  {:>7}",
            row.category, row.primary_count, row.assistant_count, row.total_count, row.minimum
        );
    }
    output
}

/// Per-category role counts with a totals line.
pub fn category_table(counts: &CategoryCounts) -> String {
    if counts.is_empty() {
        return "No categorized cases.\n".to_string();
    }

    let width = category_width(counts.iter().map(|(category, _)| category));
    let mut output = String::new();
    let _ = writeln!(output, "{:<width$}  {:>7}  {:>9}", "Category", "Primary", "Assistant");
    for (category, row) in counts.iter() {
        let _ = writeln!(
            output,
            "{:<width$}  {:>7}  {:>9}",
            category, row.primary, row.assistant
        );
    }
    let _ = writeln!(
        output,
        "{:<width$}  {:>7}  {:>9}",
        "(all)",
        counts.role_total(Role::Primary),
        counts.role_total(Role::Assistant)
    );
    output
}

pub fn write_category_csv<W: std::io::Write>(writer: W, entries: &[CategoryCount]) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_progress_csv<W: std::io::Write>(writer: W, rows: &[ProgressRow]) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Normalized cases, newest first.
pub fn write_cases_csv<W: std::io::Write>(writer: W, records: &[&CaseRecord]) -> csv::Result<()> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.procedure_date.cmp(&a.procedure_date));

    let mut writer = csv::Writer::from_writer(writer);
    for record in sorted {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn build_report(
    overview: &RoleOverview<'_>,
    progress: &ProgressReport,
    generated_on: NaiveDate,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Surgical Case Log Report");
    let _ = writeln!(
        output,
        "Cases as {} surgeon, generated {}",
        overview.role, generated_on
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "{}", overview_sentence(overview));

    let breakdown = aggregate::area_breakdown(&overview.role_subset);
    if breakdown.is_empty() {
        let _ = writeln!(output, "No cases logged in this role.");
    } else {
        let _ = writeln!(output);
        for area in breakdown.iter() {
            let _ = writeln!(output, "- {}: {} cases", area.area, area.count);
            for (type_desc, count) in area.types.iter() {
                let _ = writeln!(output, "  - {type_desc}: {count}");
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Timeline");
    let months = cases_per_month(&overview.role_subset);
    if months.is_empty() {
        let _ = writeln!(output, "No cases logged in this role.");
    } else {
        for ((year, month), count) in months {
            let _ = writeln!(output, "- {year}-{month:02}: {count}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Minimums");
    let _ = writeln!(output, "Requirements: {}", progress.requirements_source);
    let _ = writeln!(output);
    let _ = writeln!(output, "| Category | Primary | Assistant | Total | Minimum | Status |");
    let _ = writeln!(output, "|---|---:|---:|---:|---:|---|");
    for row in progress.rows.iter() {
        let status = if row.is_met() {
            "met".to_string()
        } else {
            format!("{} to go", row.remaining())
        };
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} |",
            row.category,
            row.primary_count,
            row.assistant_count,
            row.total_count,
            row.minimum,
            status
        );
    }

    if !progress.excluded.is_empty() || progress.uncategorized > 0 {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Data Notes");
        if progress.uncategorized > 0 {
            let _ = writeln!(
                output,
                "- {} cases have no defined category.",
                progress.uncategorized
            );
        }
        for err in progress.excluded.iter() {
            let _ = writeln!(output, "- Excluded: {err}");
        }
    }

    output
}
