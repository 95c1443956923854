//! Integration tests for structure and data migrations.
//!
//! Scripts live in a temporary project folder and run against the in-memory
//! server, so ledger bookkeeping and transaction handling can be inspected.

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use dbmig::prelude::*;
use dbmig_migrate::testing::{MemoryConnection, MemoryServer};
use dbmig_migrate::{DEFAULT_CONNECTION, Direction, Migration, MigrationResult, MigrationState};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const CREATE_USERS: &str = "-- Migration_001_CreateUsers\n\
    -- up\n\
    CREATE TABLE `users` (\n  `id` int NOT NULL\n);\n\
    \n\
    -- down\n\
    DROP TABLE `users`;\n";

const CREATE_ORDERS: &str = "-- Migration_002_CreateOrders\n\
    -- up\n\
    CREATE TABLE `orders` (\n  `id` int NOT NULL\n);\n\
    \n\
    -- down\n\
    DROP TABLE `orders`;\n";

const SEED_USERS: &str = "-- Migration_003_SeedUsers\n\
    -- heavy: true\n\
    -- up\n\
    INSERT INTO `users` (`id`) VALUES (1);\n\
    \n\
    -- down\n\
    DELETE FROM `users`;\n";

struct Project {
    temp: TempDir,
    server: MemoryServer,
}

impl Project {
    fn new() -> Self {
        let project = Self {
            temp: TempDir::new().unwrap(),
            server: MemoryServer::new().with_database("shop"),
        };
        project.script(MigrationType::Structure, "shop", "Migration_001_CreateUsers.sql", CREATE_USERS);
        project.script(MigrationType::Structure, "shop", "Migration_002_CreateOrders.sql", CREATE_ORDERS);
        project.script(MigrationType::Structure, "shop", "Migration_003_SeedUsers.sql", SEED_USERS);
        project
    }

    fn paths(&self) -> ProjectPaths {
        ProjectPaths::new(self.temp.path().join("db"))
    }

    fn script(&self, kind: MigrationType, db: &str, file: &str, content: &str) {
        let dir = self.paths().migrations_dir(kind, db);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), content).unwrap();
    }

    fn script_path(&self, kind: MigrationType, db: &str, file: &str) -> std::path::PathBuf {
        self.paths().migrations_dir(kind, db).join(file)
    }

    fn registry(&self) -> ConnectionRegistry<MemoryConnection> {
        ConnectionRegistry::new()
            .with(DEFAULT_CONNECTION, self.server.connect())
            .unwrap()
    }

    fn ledger(&self, kind: MigrationType) -> Vec<String> {
        self.server.ledger_ids("shop", &kind.ledger_table())
    }
}

fn ids(result: &MigrationResult) -> Vec<&str> {
    result.executed.iter().map(|m| m.migration_id.as_str()).collect()
}

fn file_exists(path: &Path) -> bool {
    path.is_file()
}

#[tokio::test]
async fn test_up_to_selected_then_rest() {
    let project = Project::new();
    let factory = MigrationRegistry::new();
    let mut registry = project.registry();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    let result = engine
        .up(MigrationType::Structure, Some("shop"), Some("002"), false)
        .await
        .unwrap();
    assert_eq!(result.direction, Direction::Up);
    assert_eq!(ids(&result), vec!["001", "002"]);
    assert_eq!(project.ledger(MigrationType::Structure), vec!["001", "002"]);

    let result = engine.up(MigrationType::Structure, None, None, false).await.unwrap();
    assert_eq!(ids(&result), vec!["003"]);
    assert!(result.executed[0].heavy);

    let result = engine.up(MigrationType::Structure, None, None, false).await.unwrap();
    assert!(!result.has_changes());

    let tables = project.server.tables("shop");
    assert!(tables.contains(&"users".to_string()));
    assert!(tables.contains(&"orders".to_string()));
    assert!(tables.contains(&"_db_structure".to_string()));
}

#[tokio::test]
async fn test_up_only_single() {
    let project = Project::new();
    let factory = MigrationRegistry::new();
    let mut registry = project.registry();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    let result = engine
        .up(MigrationType::Structure, Some("shop"), Some("002"), true)
        .await
        .unwrap();
    assert_eq!(ids(&result), vec!["002"]);
    assert_eq!(project.ledger(MigrationType::Structure), vec!["002"]);
}

#[tokio::test]
async fn test_each_migration_runs_in_a_transaction() {
    let project = Project::new();
    let factory = MigrationRegistry::new();
    let mut registry = project.registry();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    engine
        .up(MigrationType::Structure, Some("shop"), Some("001"), true)
        .await
        .unwrap();

    let journal = project.server.journal();
    let begin = journal.iter().position(|sql| sql == "BEGIN").unwrap();
    let create = journal.iter().position(|sql| sql.starts_with("CREATE TABLE `users`")).unwrap();
    let commit = journal.iter().position(|sql| sql == "COMMIT").unwrap();
    let insert = journal
        .iter()
        .position(|sql| sql.starts_with("INSERT INTO `_db_structure`"))
        .unwrap();
    assert!(begin < create && create < commit && commit < insert);
}

#[tokio::test]
async fn test_status_lists_applied_and_new() {
    let project = Project::new();
    let factory = MigrationRegistry::new();
    let mut registry = project.registry();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    engine
        .up(MigrationType::Structure, Some("shop"), Some("001"), false)
        .await
        .unwrap();

    let statuses = engine.status(MigrationType::Structure, Some("shop")).await.unwrap();
    assert_eq!(statuses.len(), 1);
    let states: Vec<_> = statuses[0]
        .migrations
        .iter()
        .map(|m| (m.migration_id.as_str(), m.state))
        .collect();
    assert_eq!(
        states,
        vec![
            ("001", MigrationState::Applied),
            ("002", MigrationState::New),
            ("003", MigrationState::New),
        ]
    );
    assert_eq!(statuses[0].applied().count(), 1);
    assert_eq!(statuses[0].pending().count(), 2);
    assert!(statuses[0].migrations[0].applied_at.is_some());
}

#[tokio::test]
async fn test_down_to_selected() {
    let project = Project::new();
    let factory = MigrationRegistry::new();
    let mut registry = project.registry();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    engine.up(MigrationType::Structure, None, None, false).await.unwrap();

    let result = engine
        .down(MigrationType::Structure, "shop", "002", false)
        .await
        .unwrap();
    assert_eq!(result.direction, Direction::Down);
    assert_eq!(ids(&result), vec!["003", "002"]);
    assert_eq!(project.ledger(MigrationType::Structure), vec!["001"]);
    assert!(!project.server.tables("shop").contains(&"orders".to_string()));
}

#[tokio::test]
async fn test_down_only_single() {
    let project = Project::new();
    let factory = MigrationRegistry::new();
    let mut registry = project.registry();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    engine.up(MigrationType::Structure, None, None, false).await.unwrap();

    let result = engine
        .down(MigrationType::Structure, "shop", "001", true)
        .await
        .unwrap();
    assert_eq!(ids(&result), vec!["001"]);
    assert_eq!(project.ledger(MigrationType::Structure), vec!["002", "003"]);
}

#[tokio::test]
async fn test_down_skips_pending() {
    let project = Project::new();
    let factory = MigrationRegistry::new();
    let mut registry = project.registry();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    engine
        .up(MigrationType::Structure, Some("shop"), Some("001"), false)
        .await
        .unwrap();

    let result = engine
        .down(MigrationType::Structure, "shop", "001", false)
        .await
        .unwrap();
    assert_eq!(ids(&result), vec!["001"]);
    assert!(project.ledger(MigrationType::Structure).is_empty());
}

#[tokio::test]
async fn test_failed_migration_rolls_back() {
    let project = Project::new();
    project.script(
        MigrationType::Structure,
        "shop",
        "Migration_004_Broken.sql",
        "-- up\nINSERT INTO `broken` VALUES (1);\n",
    );
    project.server.fail_on("`broken`");

    let factory = MigrationRegistry::new();
    let mut registry = project.registry();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    let err = engine
        .up(MigrationType::Structure, Some("shop"), None, false)
        .await
        .unwrap_err();
    assert!(err.is_sql());

    assert!(project.server.journal().iter().any(|sql| sql == "ROLLBACK"));
    assert_eq!(project.ledger(MigrationType::Structure), vec!["001", "002", "003"]);
}

#[tokio::test]
async fn test_unknown_migration_id() {
    let project = Project::new();
    let factory = MigrationRegistry::new();
    let mut registry = project.registry();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    let err = engine
        .up(MigrationType::Structure, Some("shop"), Some("999"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::NotFound(_)));

    let err = engine
        .down(MigrationType::Structure, "shop", "999", false)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::NotFound(_)));
    assert!(project.ledger(MigrationType::Structure).is_empty());
}

#[tokio::test]
async fn test_missing_database_is_a_logic_error() {
    let project = Project::new();
    project.script(MigrationType::Structure, "ghost", "Migration_001_CreateUsers.sql", CREATE_USERS);

    let factory = MigrationRegistry::new();
    let mut registry = project.registry();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    let err = engine
        .up(MigrationType::Structure, Some("ghost"), None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Logic(_)));
}

#[tokio::test]
async fn test_missing_database_never_writes_into_previous_selection() {
    let project = Project::new();
    project.script(MigrationType::Structure, "zeta", "Migration_004_CreateAudit.sql", CREATE_USERS);

    let factory = MigrationRegistry::new();
    let mut registry = project.registry();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    let err = engine.up(MigrationType::Structure, None, None, false).await.unwrap_err();
    assert!(matches!(err, MigrationError::Logic(_)));
    assert!(project.ledger(MigrationType::Structure).is_empty());

    engine
        .up(MigrationType::Structure, Some("shop"), None, false)
        .await
        .unwrap();
    let err = engine
        .up(MigrationType::Structure, Some("zeta"), None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Logic(_)));

    assert_eq!(project.ledger(MigrationType::Structure), vec!["001", "002", "003"]);
    assert!(!project.server.has_database("zeta"));
}

#[tokio::test]
async fn test_up_with_id_unknown_everywhere() {
    let project = Project::new();
    let factory = MigrationRegistry::new();
    let mut registry = project.registry();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    let err = engine
        .up(MigrationType::Structure, None, Some("999"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::NotFound(_)));
    assert!(project.ledger(MigrationType::Structure).is_empty());

    let result = engine
        .up(MigrationType::Structure, None, Some("002"), false)
        .await
        .unwrap();
    assert_eq!(ids(&result), vec!["001", "002"]);
}

#[tokio::test]
async fn test_types_keep_separate_ledgers() {
    let project = Project::new();
    project.script(
        MigrationType::Data,
        "shop",
        "Migration_001_SeedUsers.sql",
        "-- up\nINSERT INTO `users` (`id`) VALUES (7);\n-- down\nDELETE FROM `users` WHERE `id` = 7;\n",
    );

    let factory = MigrationRegistry::new();
    let mut registry = project.registry();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    engine.up(MigrationType::Data, None, None, false).await.unwrap();

    assert_eq!(project.ledger(MigrationType::Data), vec!["001"]);
    assert!(project.ledger(MigrationType::Structure).is_empty());
}

#[tokio::test]
async fn test_applied_migration_without_file() {
    let project = Project::new();
    let factory = MigrationRegistry::new();
    let mut registry = project.registry();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    engine
        .up(MigrationType::Structure, Some("shop"), Some("001"), false)
        .await
        .unwrap();
    fs::remove_file(project.script_path(MigrationType::Structure, "shop", "Migration_001_CreateUsers.sql")).unwrap();

    let statuses = engine.status(MigrationType::Structure, Some("shop")).await.unwrap();
    let first = &statuses[0].migrations[0];
    assert_eq!(first.migration_id, "001");
    assert!(first.is_applied());
    assert!(first.path.is_none());

    let err = engine
        .down(MigrationType::Structure, "shop", "001", true)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::NotFound(_)));
}

struct CompiledUsers;

#[async_trait]
impl Migration for CompiledUsers {
    fn id(&self) -> &str {
        "001"
    }

    fn name(&self) -> &str {
        "CreateUsers"
    }

    async fn up(&self, conn: &mut dyn Connection) -> MigrateResult<()> {
        conn.execute("CREATE TABLE `compiled_users` (\n  `id` int NOT NULL\n)", &[])
            .await?;
        Ok(())
    }

    async fn down(&self, conn: &mut dyn Connection) -> MigrateResult<()> {
        conn.execute("DROP TABLE `compiled_users`", &[]).await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_registered_migration_takes_precedence() {
    let project = Project::new();
    let mut factory = MigrationRegistry::new();
    factory.register(MigrationType::Structure, "shop", "001", || Box::new(CompiledUsers));
    assert!(factory.contains(MigrationType::Structure, "shop", "001"));

    let mut registry = project.registry();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    engine
        .up(MigrationType::Structure, Some("shop"), Some("001"), true)
        .await
        .unwrap();

    let tables = project.server.tables("shop");
    assert!(tables.contains(&"compiled_users".to_string()));
    assert!(!tables.contains(&"users".to_string()));
}

#[tokio::test]
async fn test_create_scaffolds_file() {
    let project = Project::new();
    let factory = MigrationRegistry::new();
    let mut registry = project.registry();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    let file = engine
        .create(MigrationType::Data, "shop", "BackfillEmails", true)
        .await
        .unwrap();
    assert!(file_exists(&file.path));
    assert_eq!(file.path.parent().unwrap(), engine.migrations_dir(MigrationType::Data, "shop"));

    let content = fs::read_to_string(&file.path).unwrap();
    assert!(content.contains("-- heavy: true"));
    assert!(content.contains("-- up"));
    assert!(content.contains("-- down"));

    let statuses = engine.status(MigrationType::Data, Some("shop")).await.unwrap();
    assert_eq!(statuses[0].migrations.len(), 1);
    assert_eq!(statuses[0].migrations[0].state, MigrationState::New);
}

#[tokio::test]
async fn test_create_rejects_bad_input() {
    let project = Project::new();
    let factory = MigrationRegistry::new();
    let mut registry = ConnectionRegistry::new()
        .with("shop", project.server.connect())
        .unwrap();
    let mut engine = MigrationEngine::new(&mut registry, project.paths(), &factory);

    let err = engine
        .create(MigrationType::Structure, "", "AddIndex", false)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Validation(_)));

    let err = engine
        .create(MigrationType::Structure, "billing", "AddIndex", false)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::NotFound(_)));
}
