//! Classification of single `CREATE TABLE` body lines.

use std::fmt;
use std::sync::LazyLock;

use regex_lite::Regex;

static COLUMN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^`([^`]+)`\s+\S").expect("column pattern is valid"));

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"KEY\s+\(?`([^`)]+)`\)?").expect("key pattern is valid"));

/// What a DDL line declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKind {
    /// A column definition.
    Column,
    /// An index or constraint.
    Key,
    /// Anything else (table header, table options, closing paren).
    Other,
}

impl RowKind {
    /// Lowercase tag used in row identity keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Column => "column",
            Self::Key => "key",
            Self::Other => "other",
        }
    }
}

/// Where an added column goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowLocation {
    /// Before every other column.
    First,
    /// Directly after the named column.
    After(String),
}

impl fmt::Display for RowLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str("FIRST"),
            Self::After(name) => write!(f, "AFTER `{name}`"),
        }
    }
}

/// One parsed line of table DDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowToken {
    raw: String,
    text: String,
    kind: RowKind,
    name: Option<String>,
    location: Option<RowLocation>,
}

impl RowToken {
    /// Parse a DDL line. Never fails: unrecognised lines are [`RowKind::Other`].
    pub fn parse(line: &str) -> Self {
        let text = normalize(line).to_string();

        let (kind, name) = if let Some(caps) = COLUMN_RE.captures(&text) {
            (RowKind::Column, Some(caps[1].to_string()))
        } else if let Some(caps) = KEY_RE.captures(&text) {
            (RowKind::Key, Some(caps[1].to_string()))
        } else {
            (RowKind::Other, None)
        };

        Self {
            raw: line.to_string(),
            text,
            kind,
            name,
            location: None,
        }
    }

    /// The line exactly as it was read.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Trimmed text without a trailing comma.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Row kind.
    pub fn kind(&self) -> RowKind {
        self.kind
    }

    /// Column or index name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Placement hint for an added column.
    pub fn location(&self) -> Option<&RowLocation> {
        self.location.as_ref()
    }

    /// Attach a placement hint.
    pub fn with_location(mut self, location: Option<RowLocation>) -> Self {
        self.location = location;
        self
    }

    /// Identity used to pair added and removed rows.
    ///
    /// Named rows pair by kind and name; unnamed rows only pair with an
    /// identical line.
    pub fn key(&self) -> String {
        match &self.name {
            Some(name) => format!("{}_{}", self.kind.as_str(), name),
            None => format!("{}_{}", self.kind.as_str(), self.text),
        }
    }

    /// Text with the placement hint appended, if any.
    pub fn located_text(&self) -> String {
        match &self.location {
            Some(location) => format!("{} {}", self.text, location),
            None => self.text.clone(),
        }
    }
}

/// Trim whitespace and a single trailing comma.
pub fn normalize(line: &str) -> &str {
    let trimmed = line.trim();
    trimmed.strip_suffix(',').unwrap_or(trimmed).trim_end()
}

/// Compare two DDL lines ignoring surrounding whitespace, a trailing comma
/// and letter case.
pub fn lines_match(left: &str, right: &str) -> bool {
    normalize(left).eq_ignore_ascii_case(normalize(right))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_column() {
        let row = RowToken::parse("  `email` varchar(255) NOT NULL,");
        assert_eq!(row.kind(), RowKind::Column);
        assert_eq!(row.name(), Some("email"));
        assert_eq!(row.text(), "`email` varchar(255) NOT NULL");
        assert_eq!(row.key(), "column_email");
    }

    #[test]
    fn test_parse_keys() {
        let primary = RowToken::parse("  PRIMARY KEY (`id`),");
        assert_eq!(primary.kind(), RowKind::Key);
        assert_eq!(primary.name(), Some("id"));

        let unique = RowToken::parse("  UNIQUE KEY `uq_email` (`email`),");
        assert_eq!(unique.kind(), RowKind::Key);
        assert_eq!(unique.name(), Some("uq_email"));

        let foreign = RowToken::parse(
            "  CONSTRAINT `fk_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`)",
        );
        assert_eq!(foreign.kind(), RowKind::Key);
        assert_eq!(foreign.name(), Some("user_id"));
    }

    #[test]
    fn test_parse_other() {
        let header = RowToken::parse("CREATE TABLE `users` (");
        assert_eq!(header.kind(), RowKind::Other);
        assert_eq!(header.name(), None);

        let footer = RowToken::parse(") ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;");
        assert_eq!(footer.kind(), RowKind::Other);
        assert_eq!(footer.key(), "other_) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;");
    }

    #[test]
    fn test_located_text() {
        let row = RowToken::parse("`name` varchar(50),")
            .with_location(Some(RowLocation::After("id".to_string())));
        assert_eq!(row.located_text(), "`name` varchar(50) AFTER `id`");

        let first = RowToken::parse("`id` int").with_location(Some(RowLocation::First));
        assert_eq!(first.located_text(), "`id` int FIRST");
    }

    #[test]
    fn test_lines_match() {
        assert!(lines_match("  `id` INT,", "`id` int"));
        assert!(!lines_match("`id` int", "`id` bigint"));
    }
}
