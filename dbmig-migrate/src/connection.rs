//! Connection seam between the engine and a database driver.
//!
//! The engine owns every SQL string it runs. A driver only has to move those
//! statements to the server and hand rows back as [`SqlRow`] values.

use async_trait::async_trait;

use crate::error::{MigrateResult, MigrationError};

/// A scalar bound as a statement parameter or read back from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Float(f64),
    /// Text or binary data rendered as UTF-8.
    Text(String),
}

impl SqlValue {
    /// Check if the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Read the value as text. Numbers are rendered, NULL yields `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Int(v) => Some(v.to_string()),
            Self::UInt(v) => Some(v.to_string()),
            Self::Float(v) => Some(v.to_string()),
            Self::Text(v) => Some(v.clone()),
        }
    }

    /// Read the value as an unsigned integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(v) => u64::try_from(*v).ok(),
            Self::UInt(v) => Some(*v),
            Self::Float(v) if *v >= 0.0 => Some(*v as u64),
            Self::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read the value as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::UInt(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(v) => v.trim().parse().ok(),
            Self::Null => None,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<u64> for SqlValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// One result row, values in select-list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRow {
    values: Vec<SqlValue>,
}

impl SqlRow {
    /// Create a row from its values.
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a column index.
    pub fn get(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Text at a column index, `None` for NULL or a missing column.
    pub fn text(&self, index: usize) -> Option<String> {
        self.get(index).and_then(SqlValue::as_text)
    }

    /// Required text column.
    pub fn require_text(&self, index: usize) -> MigrateResult<String> {
        self.text(index)
            .ok_or_else(|| MigrationError::format(format!("expected text in column {index}")))
    }

    /// Required unsigned integer column.
    pub fn require_u64(&self, index: usize) -> MigrateResult<u64> {
        self.get(index)
            .and_then(SqlValue::as_u64)
            .ok_or_else(|| MigrationError::format(format!("expected integer in column {index}")))
    }

    /// Required float column.
    pub fn require_f64(&self, index: usize) -> MigrateResult<f64> {
        self.get(index)
            .and_then(SqlValue::as_f64)
            .ok_or_else(|| MigrationError::format(format!("expected number in column {index}")))
    }
}

/// A live, single-owner connection to one database server.
#[async_trait]
pub trait Connection: Send {
    /// Execute a statement, returning the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64>;

    /// Run a query and collect every row.
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<SqlRow>>;

    /// Auto-increment id generated by the last insert.
    fn last_insert_id(&self) -> Option<u64>;

    /// Start a transaction.
    async fn begin(&mut self) -> MigrateResult<()>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> MigrateResult<()>;

    /// Roll back the open transaction.
    async fn rollback(&mut self) -> MigrateResult<()>;

    /// Whether a transaction is open.
    fn in_transaction(&self) -> bool;
}

/// Quote an identifier with backticks, doubling embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a `db.table` pair.
pub fn quote_qualified(db: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(db), quote_ident(table))
}

/// Split a script into statements on `;`, ignoring separators inside quotes
/// and comments. Empty statements are dropped.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = script.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            current.push(c);
            if c == '\\' && q != '`' {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                current.push(c);
            }
            '-' if chars.peek() == Some(&'-') => {
                // line comment
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            '#' => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
                current.push(' ');
            }
            ';' => {
                push_statement(&mut statements, &mut current);
            }
            _ => current.push(c),
        }
    }
    push_statement(&mut statements, &mut current);

    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "`users`");
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
        assert_eq!(quote_qualified("shop", "users"), "`shop`.`users`");
    }

    #[test]
    fn test_split_statements() {
        let script = "INSERT INTO t VALUES ('a;b');\n-- comment; here\nDELETE FROM t;\n\n";
        assert_eq!(
            split_statements(script),
            vec!["INSERT INTO t VALUES ('a;b')", "DELETE FROM t"]
        );
    }

    #[test]
    fn test_split_statements_block_comment() {
        let script = "/* setup; */ UPDATE t SET a = 1; # trailing; note\nUPDATE t SET b = 2";
        assert_eq!(
            split_statements(script),
            vec!["UPDATE t SET a = 1", "UPDATE t SET b = 2"]
        );
    }

    #[test]
    fn test_row_accessors() {
        let row = SqlRow::new(vec![
            SqlValue::UInt(7),
            SqlValue::from("20240101000000000000"),
            SqlValue::Float(1.5),
            SqlValue::Null,
        ]);
        assert_eq!(row.require_u64(0).unwrap(), 7);
        assert_eq!(row.require_text(1).unwrap(), "20240101000000000000");
        assert_eq!(row.require_f64(2).unwrap(), 1.5);
        assert!(row.text(3).is_none());
        assert!(row.require_text(9).is_err());
    }
}
