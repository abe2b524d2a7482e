//! CSV row parser for permission matrix sources.
//!
//! The format is deliberately narrow: comma-separated cells, whitespace
//! trimmed per cell, no quoting. Blank lines and lines whose first
//! non-space character is `#` or `;` are comments. The header's fixed
//! columns are `Model, App, Action, Is Global`; every column after those
//! names a user type.

use crate::errors::{CompileError, CompileResult};
use crate::matrix::PermissionKey;

/// Fixed leading header columns, in order.
pub const FIXED_COLUMNS: [&str; 4] = ["Model", "App", "Action", "Is Global"];

/// One parsed data row: the permission it declares plus the raw cell
/// value for each user-type column of its source (aligned by index with
/// [`SourceRows::user_types`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRow {
    pub key: PermissionKey,
    pub is_global: bool,
    pub cells: Vec<String>,
}

/// Parsed contents of one CSV source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRows {
    /// Source identifier, carried into error messages.
    pub source_name: String,
    /// User-type column names, in header order.
    pub user_types: Vec<String>,
    pub rows: Vec<MatrixRow>,
}

fn is_comment_or_blank(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';')
}

fn split_cells(line: &str) -> Vec<String> {
    line.split(',').map(|cell| cell.trim().to_string()).collect()
}

fn parse_is_global(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

/// Parses one source's text into a header and typed data rows.
///
/// `name` identifies the source in errors (a file path, usually).
pub fn parse_source(name: &str, text: &str) -> CompileResult<SourceRows> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !is_comment_or_blank(line));

    let (header_index, header_line) = lines
        .next()
        .ok_or_else(|| CompileError::malformed_row(name, 0, "source has no header row"))?;
    let user_types = parse_header(name, header_index + 1, &split_cells(header_line))?;

    let mut rows = Vec::new();
    for (index, line) in lines {
        let line_no = index + 1;
        let cells = split_cells(line);

        let column_count = FIXED_COLUMNS.len() + user_types.len();
        if cells.len() > column_count {
            return Err(CompileError::malformed_row(
                name,
                line_no,
                format!("{} cells but only {} columns", cells.len(), column_count),
            ));
        }
        if cells.iter().all(|cell| cell.is_empty()) {
            // A line of bare commas carries no data.
            continue;
        }

        let cell = |i: usize| cells.get(i).map(String::as_str).unwrap_or("");

        let model = cell(0);
        let app = cell(1);
        let action = cell(2);
        if app.is_empty() {
            return Err(CompileError::malformed_row(name, line_no, "App must not be empty"));
        }
        if action.is_empty() {
            return Err(CompileError::malformed_row(name, line_no, "Action must not be empty"));
        }
        let is_global = match parse_is_global(cell(3)) {
            Some(flag) => flag,
            None => {
                return Err(CompileError::malformed_row(
                    name,
                    line_no,
                    format!("Is Global must be yes or no, got {:?}", cell(3)),
                ))
            }
        };

        let key = PermissionKey::new(app, (!model.is_empty()).then(|| model.to_string()), action);
        let cell_values = (0..user_types.len())
            .map(|i| cell(FIXED_COLUMNS.len() + i).to_string())
            .collect();

        rows.push(MatrixRow {
            key,
            is_global,
            cells: cell_values,
        });
    }

    if rows.is_empty() {
        return Err(CompileError::malformed_row(name, 0, "source has no permission rows"));
    }

    Ok(SourceRows {
        source_name: name.to_string(),
        user_types,
        rows,
    })
}

fn parse_header(name: &str, line_no: usize, cells: &[String]) -> CompileResult<Vec<String>> {
    for (i, expected) in FIXED_COLUMNS.iter().enumerate() {
        if cells.get(i).map(String::as_str) != Some(*expected) {
            return Err(CompileError::malformed_row(
                name,
                line_no,
                format!(
                    "header must start with {:?}, got {:?}",
                    FIXED_COLUMNS.join(", "),
                    cells.join(", ")
                ),
            ));
        }
    }

    let user_types: Vec<String> = cells[FIXED_COLUMNS.len()..].to_vec();
    if user_types.is_empty() {
        return Err(CompileError::malformed_row(
            name,
            line_no,
            "header declares no user-type columns",
        ));
    }
    if user_types.iter().any(|ut| ut.is_empty()) {
        return Err(CompileError::malformed_row(
            name,
            line_no,
            "user-type column name must not be empty",
        ));
    }
    for (i, ut) in user_types.iter().enumerate() {
        if user_types[..i].contains(ut) {
            return Err(CompileError::malformed_row(
                name,
                line_no,
                format!("duplicate user-type column {ut:?}"),
            ));
        }
    }

    Ok(user_types)
}
