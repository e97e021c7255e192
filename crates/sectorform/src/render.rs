//! Text and JSON rendering of sectors, choices and form errors.

use serde::Serialize;

use crate::error::Result;
use crate::model::Choice;
use crate::sectors::SectorIndex;
use crate::validation::ValidationErrors;

/// Spaces per nesting level.
const INDENT_STEP: &str = "  ";

const SELECTED_MARKER: &str = "[x] ";
const UNSELECTED_MARKER: &str = "[ ] ";

/// Leading whitespace for a sector at `depth`; top level has none.
#[must_use]
pub fn indent(depth: usize) -> String {
    INDENT_STEP.repeat(depth.saturating_sub(1))
}

/// `Yes` / `No` for a flag.
#[must_use]
pub fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// One line per sector in index order: id column, then the indented name.
///
/// With `selected`, every line starts with a checkbox marker.
#[must_use]
pub fn sector_options(index: &SectorIndex, selected: Option<&[String]>) -> String {
    let width = index
        .sectors()
        .iter()
        .map(|s| s.id.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (sector, depth) in index.entries() {
        if let Some(selected) = selected {
            let marker = if selected.iter().any(|id| *id == sector.id) {
                SELECTED_MARKER
            } else {
                UNSELECTED_MARKER
            };
            out.push_str(marker);
        }
        out.push_str(&format!(
            "{:>width$}  {}{}\n",
            sector.id,
            indent(depth),
            sector.name
        ));
    }
    out
}

#[derive(Serialize)]
struct SectorRow<'a> {
    id: &'a str,
    name: &'a str,
    nesting: &'a str,
    depth: usize,
}

/// The ordered sector list as a JSON array, depth included.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn sectors_json(index: &SectorIndex) -> Result<String> {
    let rows: Vec<SectorRow<'_>> = index
        .entries()
        .map(|(sector, depth)| SectorRow {
            id: &sector.id,
            name: &sector.name,
            nesting: &sector.nesting,
            depth,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

/// Sector names of a choice, in selection order. Unresolved ids are left out.
#[must_use]
pub fn sector_names(choice: &Choice, index: &SectorIndex) -> String {
    index
        .resolve(&choice.chosen_ids)
        .into_iter()
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Tab-separated lines: id, user, sector names, terms flag.
#[must_use]
pub fn choice_lines(choices: &[Choice], index: &SectorIndex) -> String {
    let mut out = String::new();
    for choice in choices {
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\n",
            choice.id.as_deref().unwrap_or_default(),
            choice.user,
            sector_names(choice, index),
            yes_no(choice.agree_to_terms)
        ));
    }
    out
}

/// The choice list as an aligned table.
#[must_use]
pub fn choice_table(choices: &[Choice], index: &SectorIndex) -> String {
    let header = ["User", "Sectors", "Agree to Terms", "Id"].map(String::from);
    let rows: Vec<[String; 4]> = choices
        .iter()
        .map(|c| {
            [
                c.user.clone(),
                sector_names(c, index),
                yes_no(c.agree_to_terms).to_string(),
                c.id.clone().unwrap_or_default(),
            ]
        })
        .collect();

    let mut widths = header.clone().map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChoiceRow<'a> {
    id: Option<&'a str>,
    user: &'a str,
    chosen_ids: &'a [String],
    sector_names: Vec<&'a str>,
    agree_to_terms: bool,
}

/// The choice list as a JSON array with resolved sector names.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn choices_json(choices: &[Choice], index: &SectorIndex) -> Result<String> {
    let rows: Vec<ChoiceRow<'_>> = choices
        .iter()
        .map(|c| ChoiceRow {
            id: c.id.as_deref(),
            user: &c.user,
            chosen_ids: &c.chosen_ids,
            sector_names: index.resolve(&c.chosen_ids),
            agree_to_terms: c.agree_to_terms,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

/// `field: message` lines, in schema order.
#[must_use]
pub fn field_errors(errors: &ValidationErrors) -> Vec<String> {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect()
}
