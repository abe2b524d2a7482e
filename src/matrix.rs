//! The unified raw permission matrix, merged from any number of parsed
//! CSV sources before evaluators are resolved.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{CompileError, CompileResult};
use crate::parse::SourceRows;

/// Identity of one permission before name formatting: the `(app, model,
/// action)` triple from the matrix's fixed columns.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionKey {
    pub app: String,
    /// Absent for app-wide permissions (global-only; see the validate-model
    /// resolver).
    pub model: Option<String>,
    pub action: String,
}

impl PermissionKey {
    pub fn new(app: impl Into<String>, model: Option<String>, action: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            model,
            action: action.into(),
        }
    }
}

impl std::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.model {
            Some(model) => write!(f, "{}.{}.{}", self.app, model, self.action),
            None => write!(f, "{}.{}", self.app, self.action),
        }
    }
}

/// One permission's accumulated state across all sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub is_global: bool,
    /// user type -> raw cell value. A key present with an empty value means
    /// the column existed in some source but every cell for it was empty.
    pub cells: BTreeMap<String, String>,
}

/// All sources merged into one map, keyed and ordered by [`PermissionKey`].
///
/// Ordered maps make iteration deterministic, so merging the same sources
/// in any order produces an identical matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMatrix {
    entries: BTreeMap<PermissionKey, RawEntry>,
}

impl RawMatrix {
    /// Merges parsed sources into one matrix.
    ///
    /// Conflicts are a hard error regardless of source order: a key whose
    /// `is_global` differs between occurrences, or a (key, user type) cell
    /// holding two different non-empty values. An empty cell never
    /// overwrites and never conflicts.
    pub fn merge<'a>(sources: impl IntoIterator<Item = &'a SourceRows>) -> CompileResult<Self> {
        let mut matrix = Self::default();
        for source in sources {
            matrix.merge_source(source)?;
        }
        Ok(matrix)
    }

    fn merge_source(&mut self, source: &SourceRows) -> CompileResult<()> {
        for row in &source.rows {
            let entry = self
                .entries
                .entry(row.key.clone())
                .or_insert_with(|| RawEntry {
                    is_global: row.is_global,
                    cells: BTreeMap::new(),
                });

            if entry.is_global != row.is_global {
                return Err(CompileError::inconsistent(format!(
                    "{} declared both global and per-object (saw the conflict in {})",
                    row.key, source.source_name,
                )));
            }

            for (user_type, value) in source.user_types.iter().zip(&row.cells) {
                let slot = entry.cells.entry(user_type.clone()).or_default();
                if value.is_empty() {
                    continue;
                }
                if slot.is_empty() {
                    *slot = value.clone();
                } else if slot != value {
                    return Err(CompileError::inconsistent(format!(
                        "{} / user type {:?} declared as both {:?} and {:?} (saw the conflict in {})",
                        row.key, user_type, slot, value, source.source_name,
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PermissionKey, &RawEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
