//! # dbmig-migrate
//!
//! Schema reconciliation and migration engine for MySQL-compatible servers.
//!
//! This crate provides functionality for:
//! - Comparing declared `CREATE TABLE` files with live `SHOW CREATE TABLE` output
//! - Creating, recreating and dropping databases and tables to match the schema
//! - Dumping live DDL back into schema files
//! - Discovering versioned structure and data migrations per database
//! - Applying and reverting migrations in transactions, tracked in `_db_<type>` ledgers
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌─────────────┐
//! │ Schema Files │────▶│ Table Differ   │────▶│ Reconciler  │
//! └──────────────┘     └────────────────┘     └─────────────┘
//!                              ▲                     │
//!                              │                     ▼
//!                      ┌────────────────┐     ┌─────────────┐
//!                      │ Schema Catalog │◀────│ Connections │
//!                      └────────────────┘     └─────────────┘
//!                                                    ▲
//! ┌──────────────┐     ┌────────────────┐            │
//! │ Migration    │────▶│ Migration      │────────────┘
//! │ Scripts      │     │ Engine         │
//! └──────────────┘     └────────────────┘
//!                              │
//!                              ▼
//!                      ┌────────────────┐
//!                      │ _db_<type>     │
//!                      └────────────────┘
//! ```
//!
//! ## Project Layout
//!
//! ```text
//! db/
//! ├── schema/
//! │   └── shop/
//! │       ├── users.sql
//! │       └── init/
//! │           └── users.sql
//! ├── structure/
//! │   └── shop/
//! │       └── Migration_20240105101112000123_AddOrders.sql
//! └── data/
//!     └── shop/
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbmig_migrate::{ConnectionRegistry, FixedAnswer, SchemaLoader, SchemaReconciler};
//!
//! let mut registry = ConnectionRegistry::new().with("default", conn)?;
//! let prompt = FixedAnswer(true);
//! let mut reconciler = SchemaReconciler::new(&mut registry, SchemaLoader::new("db/schema"), &prompt);
//! let report = reconciler.reconcile(Some("shop"), None, false).await?;
//! println!("{}", report.summary());
//! ```

pub mod catalog;
pub mod config;
pub mod connection;
pub mod diff;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod file;
pub mod history;
pub mod identity;
pub mod loader;
pub mod migration;
pub mod prompt;
pub mod reconcile;
pub mod registry;
pub mod row;
pub mod status;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exports
pub use catalog::SchemaCatalog;
pub use config::{MigrationType, ProjectPaths};
pub use connection::{Connection, SqlRow, SqlValue};
pub use diff::{ChangeAction, TableChange, TableDiff};
pub use discovery::{MigrationDescriptor, MigrationDiscovery, MigrationState};
pub use engine::{Direction, ExecutedMigration, MigrationEngine, MigrationResult, MigrationStatus};
pub use error::{DriverError, MigrateResult, MigrationError};
pub use file::{MigrationFile, MigrationFileManager};
pub use history::{LedgerManager, MigrationLedger, MigrationRecord, NewMigrationRecord};
pub use identity::{generate_id, normalize_name, parse_filename};
pub use loader::{LocalDatabase, SchemaFile, SchemaLoader};
pub use migration::{Migration, MigrationFactory, MigrationRegistry, ScriptMigration};
pub use prompt::{FixedAnswer, Forced, Prompt};
pub use reconcile::{
    DatabaseOutcome, DatabaseReport, ReconcileReport, SchemaReconciler, TableOutcome, TableReport,
};
pub use registry::{ConnectionRegistry, DEFAULT_CONNECTION};
pub use row::{RowKind, RowLocation, RowToken};
pub use status::{DatabaseStatus, SchemaStatus, TableStatus};
