//! Migration identifiers and file names.
//!
//! A migration is named `Migration_<id>_<Name>` where `<id>` is a UTC
//! timestamp with microsecond precision (`YYYYMMDDhhmmss` + six digits). The
//! fixed width makes lexicographic order chronological.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex_lite::Regex;

use crate::error::{MigrateResult, MigrationError};

/// Extension of migration script files.
pub const MIGRATION_EXTENSION: &str = "sql";

/// Prefix of every migration file and class name.
pub const MIGRATION_PREFIX: &str = "Migration";

static FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Migration_(\d+)_([a-zA-Z0-9]+)(\.sql)?$").expect("filename pattern is valid")
});

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]{3,}$").expect("name pattern is valid"));

/// Split a migration file or class name into `(id, name)`.
pub fn parse_filename(filename: &str) -> MigrateResult<(String, String)> {
    FILENAME_RE
        .captures(filename)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .ok_or_else(|| {
            MigrationError::format(format!(
                "invalid migration name '{filename}', expected {MIGRATION_PREFIX}_<id>_<Name>.{MIGRATION_EXTENSION}"
            ))
        })
}

/// Class-style name of a migration: `Migration_<id>_<Name>`.
pub fn class_name(id: &str, name: &str) -> String {
    format!("{MIGRATION_PREFIX}_{id}_{name}")
}

/// File name of a migration script.
pub fn make_filename(id: &str, name: &str) -> String {
    format!("{}.{MIGRATION_EXTENSION}", class_name(id, name))
}

/// Identifier for a migration created at `at`.
pub fn id_at(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S%6f").to_string()
}

/// Identifier for a migration created now.
pub fn generate_id() -> String {
    id_at(Utc::now())
}

/// Validate a new migration name and upper-case its first letter.
pub fn normalize_name(name: &str) -> MigrateResult<String> {
    if !NAME_RE.is_match(name) {
        return Err(MigrationError::validation(format!(
            "migration name '{name}' must be at least 3 letters or digits"
        )));
    }

    let mut chars = name.chars();
    Ok(match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_filename() {
        let (id, name) = parse_filename("Migration_20240105101112000123_AddUsers.sql").unwrap();
        assert_eq!(id, "20240105101112000123");
        assert_eq!(name, "AddUsers");

        let (id, _) = parse_filename("/srv/db/structure/shop/Migration_001_A").unwrap();
        assert_eq!(id, "001");
    }

    #[test]
    fn test_parse_filename_invalid() {
        for bad in ["Migration_abc_Name.sql", "Migration_001_.sql", "001_Name.sql", "Migration_001_Bad-Name.sql"] {
            assert!(
                matches!(parse_filename(bad), Err(MigrationError::Format(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_filename_round_trip() {
        let id = id_at(Utc.with_ymd_and_hms(2024, 1, 5, 10, 11, 12).unwrap());
        for name in ["AddUsers", "x", "Backfill2024"] {
            let filename = make_filename(&id, name);
            assert_eq!(parse_filename(&filename).unwrap(), (id.clone(), name.to_string()));
        }
    }

    #[test]
    fn test_generated_ids_are_fixed_width() {
        let id = id_at(Utc.with_ymd_and_hms(2024, 1, 5, 10, 11, 12).unwrap());
        assert_eq!(id, "20240105101112000000");
        assert_eq!(generate_id().len(), 20);
        assert!(generate_id().chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("addUsers").unwrap(), "AddUsers");
        assert_eq!(normalize_name("v2x").unwrap(), "V2x");
        assert!(matches!(normalize_name("ab"), Err(MigrationError::Validation(_))));
        assert!(matches!(normalize_name("add_users"), Err(MigrationError::Validation(_))));
    }
}
