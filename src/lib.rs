//! # dbmig
//!
//! Schema reconciliation and versioned migrations for MySQL databases.
//!
//! dbmig provides:
//! - Declared `CREATE TABLE` files per database, compared row by row with the live server
//! - One-shot reconciliation that creates, recreates or drops tables to match
//! - Dumping live definitions back into the schema tree
//! - Structure and data migrations, applied in transactions and tracked per database
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dbmig::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MysqlConfig::from_url("mysql://root@localhost")?;
//!     let mut registry = ConnectionRegistry::new().with("default", MysqlConnection::connect(&config).await?)?;
//!
//!     let paths = ProjectPaths::new("db");
//!     let factory = MigrationRegistry::new();
//!     let mut engine = MigrationEngine::new(&mut registry, paths, &factory);
//!     let result = engine.up(MigrationType::Structure, Some("shop"), None, false).await?;
//!     println!("{}", result.summary());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Schema reconciliation and migration engine.
pub mod migrate {
    pub use dbmig_migrate::*;
}

/// MySQL driver.
#[cfg(feature = "mysql")]
pub mod mysql {
    pub use dbmig_mysql::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        Connection, ConnectionRegistry, MigrateResult, MigrationEngine, MigrationError, MigrationRegistry,
        MigrationType, ProjectPaths, Prompt, SchemaLoader, SchemaReconciler,
    };
    #[cfg(feature = "mysql")]
    pub use crate::mysql::{MysqlConfig, MysqlConnection};
}

// Re-export key types at the crate root
pub use dbmig_migrate::{MigrateResult, MigrationError};
