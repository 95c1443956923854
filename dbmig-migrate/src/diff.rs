//! Line-level diffing of `CREATE TABLE` statements.
//!
//! Both statements are split into lines and each side is reduced to the lines
//! the other side does not contain. Lines are equal when they match after
//! trimming, dropping a trailing comma and folding case. The leftover lines are
//! parsed into [`RowToken`]s and paired by identity:
//!
//! - a named column or key present on both sides is one `MODIFIED` change;
//! - a leftover local line is an `ADD`, carrying a placement hint for columns;
//! - a leftover live line is a `REMOVE`.
//!
//! Nothing here generates `ALTER TABLE`; the result is a report.

use std::fmt;

use indexmap::IndexMap;

use crate::row::{RowKind, RowLocation, RowToken, lines_match, normalize};

/// Kind of change to a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeAction {
    /// Present locally, missing live.
    Add,
    /// Present live, missing locally.
    Remove,
    /// Same column or key, different definition.
    Modified,
}

impl ChangeAction {
    /// Display symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Remove => "-",
            Self::Modified => "?",
        }
    }
}

/// One changed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableChange {
    /// Row text.
    pub field: String,
    /// What happened to it.
    pub action: ChangeAction,
}

impl TableChange {
    fn new(field: impl Into<String>, action: ChangeAction) -> Self {
        Self {
            field: field.into(),
            action,
        }
    }
}

impl fmt::Display for TableChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action.symbol(), self.field)
    }
}

/// Changes between a declared and a live table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDiff {
    changes: Vec<TableChange>,
}

impl TableDiff {
    /// Diff declared DDL against live DDL.
    ///
    /// Without live DDL the table is new and there is nothing to diff.
    pub fn compare(local: &str, live: Option<&str>) -> Self {
        let Some(live) = live else {
            return Self::default();
        };

        let local_lines: Vec<&str> = local.lines().collect();
        let live_lines: Vec<&str> = live.lines().collect();

        let mut added: IndexMap<String, RowToken> = IndexMap::new();
        for (index, line) in local_lines.iter().enumerate() {
            if is_blank(line) || live_lines.iter().any(|other| lines_match(line, other)) {
                continue;
            }
            let row = RowToken::parse(line);
            let row = if row.kind() == RowKind::Column {
                let location = resolve_location(&local_lines, index);
                row.with_location(location)
            } else {
                row
            };
            added.insert(row.key(), row);
        }

        let mut removed: IndexMap<String, RowToken> = IndexMap::new();
        for line in &live_lines {
            if is_blank(line) || local_lines.iter().any(|other| lines_match(line, other)) {
                continue;
            }
            let row = RowToken::parse(line);
            removed.insert(row.key(), row);
        }

        let mut changes = Vec::with_capacity(added.len() + removed.len());
        for (key, row) in &added {
            let action = if removed.shift_remove(key).is_some() {
                ChangeAction::Modified
            } else {
                ChangeAction::Add
            };
            changes.push(TableChange::new(row.located_text(), action));
        }
        for row in removed.values() {
            changes.push(TableChange::new(row.raw().trim(), ChangeAction::Remove));
        }

        Self { changes }
    }

    /// All changes in diff order.
    pub fn changes(&self) -> &[TableChange] {
        &self.changes
    }

    /// Consume into the change list.
    pub fn into_changes(self) -> Vec<TableChange> {
        self.changes
    }

    /// Check if the tables are equivalent.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Changes of one kind.
    pub fn by_action(&self, action: ChangeAction) -> impl Iterator<Item = &TableChange> {
        self.changes.iter().filter(move |c| c.action == action)
    }

    /// Get a human-readable summary of the diff.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "No changes".to_string();
        }

        let mut parts = Vec::new();
        for (action, label) in [
            (ChangeAction::Add, "added"),
            (ChangeAction::Modified, "modified"),
            (ChangeAction::Remove, "removed"),
        ] {
            let count = self.by_action(action).count();
            if count > 0 {
                parts.push(format!("{count} {label}"));
            }
        }
        parts.join(", ")
    }
}

fn is_blank(line: &str) -> bool {
    normalize(line).is_empty()
}

fn is_table_header(line: &str) -> bool {
    normalize(line).to_ascii_uppercase().starts_with("CREATE ")
}

/// Placement of an added column relative to the line above it in the
/// declared DDL.
fn resolve_location(lines: &[&str], index: usize) -> Option<RowLocation> {
    let previous = lines[..index].iter().rev().find(|line| !is_blank(line));

    match previous {
        None => Some(RowLocation::First),
        Some(line) if is_table_header(line) => Some(RowLocation::First),
        Some(line) => {
            let row = RowToken::parse(line);
            match (row.kind(), row.name()) {
                (RowKind::Column, Some(name)) => Some(RowLocation::After(name.to_string())),
                _ => None,
            }
        }
    }
}
