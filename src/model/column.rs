//! Qualified column names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A column name, optionally qualified by the table source that exposes it.
///
/// Qualified names compare exactly. An unqualified name matches any column
/// with the same name regardless of its table (see [`ColumnName::matches`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnName {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnName {
    /// Create an unqualified column name.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    /// Create a qualified column name (table.column).
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    /// Parse `table.column` or `column`. The last dot separates the column.
    pub fn parse(name: &str) -> Self {
        match name.rsplit_once('.') {
            Some((table, column)) if !table.is_empty() => Self::qualified(table, column),
            _ => Self::new(name),
        }
    }

    /// Whether a reference written as `self` resolves to the exposed column `exposed`.
    pub fn matches(&self, exposed: &ColumnName) -> bool {
        if self.column != exposed.column {
            return false;
        }
        match (&self.table, &exposed.table) {
            (Some(a), Some(b)) => a == b,
            (None, _) => true,
            (Some(_), None) => false,
        }
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

impl From<&str> for ColumnName {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}
