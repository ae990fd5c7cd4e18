//! Migration discovery, application and bookkeeping.
//!
//! Applied migrations are tracked in the `migratehistory` table. Each
//! migration runs in its own transaction together with its history row, so
//! a failing migration leaves neither schema changes nor a record behind.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sqlx::{Any, Executor, Transaction};

use super::script::{self, MigrationScript};
use crate::db::{Database, Dialect};
use crate::error::OrmError;
use crate::model::{ModelRegistry, schema};

const HISTORY_TABLE: &str = "migratehistory";
const DEFAULT_MERGE_NAME: &str = "initial";

/// Applies and rolls back the migrations found in one directory.
#[derive(Debug, Clone)]
pub struct MigrationRouter {
    database: Database,
    registry: ModelRegistry,
    dir: PathBuf,
}

impl MigrationRouter {
    /// Router over the `NNN_name.sql` files in `dir`.
    #[must_use]
    pub fn new(database: Database, registry: ModelRegistry, dir: impl Into<PathBuf>) -> Self {
        Self {
            database,
            registry,
            dir: dir.into(),
        }
    }

    /// Directory holding the migration files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of all migration files, in order. A missing directory has none.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Migration`] if the directory cannot be read.
    pub async fn todo(&self) -> Result<Vec<String>, OrmError> {
        Ok(self
            .files()
            .await?
            .into_iter()
            .map(|(_, name)| name)
            .collect())
    }

    /// Names of applied migrations, in the order they were applied.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Migration`] if the history table cannot be read.
    pub async fn done(&self) -> Result<Vec<String>, OrmError> {
        self.ensure_history().await?;
        let sql = format!("SELECT name FROM {HISTORY_TABLE} ORDER BY id");
        sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(self.database.pool())
            .await
            .map_err(|e| OrmError::Migration(format!("cannot read migration history: {e}")))
    }

    /// Migrations present on disk but not applied yet, in order.
    ///
    /// # Errors
    ///
    /// See [`MigrationRouter::todo`] and [`MigrationRouter::done`].
    pub async fn diff(&self) -> Result<Vec<String>, OrmError> {
        let done = self.done().await?;
        Ok(self
            .todo()
            .await?
            .into_iter()
            .filter(|name| !done.contains(name))
            .collect())
    }

    /// Applies pending migrations in order, up to and including `target`.
    ///
    /// With `fake` the migrations are recorded without executing them.
    /// Returns the names applied; a `target` that is already applied
    /// applies nothing.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Migration`] when `target` is unknown or a
    /// migration fails. Migrations before the failing one stay applied.
    pub async fn run(&self, target: Option<&str>, fake: bool) -> Result<Vec<String>, OrmError> {
        let pending = self.diff().await?;
        let selected = match target {
            None => pending,
            Some(target) => match pending.iter().position(|name| name == target) {
                Some(index) => pending.into_iter().take(index + 1).collect(),
                None if self.done().await?.iter().any(|name| name == target) => Vec::new(),
                None => {
                    return Err(OrmError::Migration(format!("unknown migration: {target}")));
                }
            },
        };

        if selected.is_empty() {
            tracing::info!("there is nothing to migrate");
        }
        for name in &selected {
            let script = self.read(name).await?;
            let statements = if fake {
                Vec::new()
            } else {
                script.up_statements()
            };
            let mut tx = self.database.begin().await?;
            execute_all(&mut tx, name, &statements).await?;
            self.record(&mut tx, name).await?;
            commit(tx, name).await?;
            tracing::info!(migration = %name, fake, "migrated");
        }
        Ok(selected)
    }

    /// Rolls back applied migrations newest-first, down to and including
    /// `target`. Without a target only the last one is rolled back.
    ///
    /// Returns the names rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Migration`] when nothing is applied, `target` is
    /// not applied, or a rollback fails.
    pub async fn rollback(&self, target: Option<&str>) -> Result<Vec<String>, OrmError> {
        let done = self.done().await?;
        if done.is_empty() {
            return Err(OrmError::Migration(
                "there are no migrations to roll back".to_string(),
            ));
        }
        let from = match target {
            None => done.len() - 1,
            Some(target) => done.iter().position(|name| name == target).ok_or_else(|| {
                OrmError::Migration(format!("migration {target} is not applied"))
            })?,
        };

        let selected: Vec<String> = done.into_iter().skip(from).rev().collect();
        for name in &selected {
            let script = self.read(name).await?;
            let mut tx = self.database.begin().await?;
            execute_all(&mut tx, name, &script.down_statements()).await?;
            self.forget(&mut tx, name).await?;
            commit(tx, name).await?;
            tracing::info!(migration = %name, "rolled back");
        }
        Ok(selected)
    }

    /// Collapses every migration file into a single `001_<name>` file.
    ///
    /// Allowed when either no migration or every migration is applied; in
    /// the latter case the history is rewritten to the merged name. The
    /// merged file is staged and the history rewritten before any existing
    /// file is touched, so a failure up to that point leaves the directory
    /// and the history as they were.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Migration`] when there is nothing to merge, the
    /// name is invalid, only some migrations are applied, or the files
    /// cannot be rewritten.
    pub async fn merge(&self, name: Option<&str>) -> Result<String, OrmError> {
        let name = name.unwrap_or(DEFAULT_MERGE_NAME);
        if !script::is_valid_name(name) {
            return Err(OrmError::Migration(format!("invalid migration name: {name}")));
        }
        let todo = self.todo().await?;
        if todo.is_empty() {
            return Err(OrmError::Migration("there are no migrations to merge".to_string()));
        }
        let pending = self.diff().await?;
        let all_applied = pending.is_empty();
        if !all_applied && pending.len() != todo.len() {
            return Err(OrmError::Migration(format!(
                "cannot merge while {} of {} migrations are pending",
                pending.len(),
                todo.len()
            )));
        }

        let mut up = Vec::new();
        let mut down = Vec::new();
        for migration in &todo {
            let script = self.read(migration).await?;
            up.extend(script.up_statements());
            down.splice(0..0, script.down_statements());
        }

        let merged = script::file_name(1, name);
        let merged_name = merged.trim_end_matches(".sql").to_string();
        let staged = format!(".{merged}.tmp");
        self.write(&staged, &MigrationScript::from_statements(&up, &down))
            .await?;

        let rewritten = if all_applied {
            self.rewrite_history(&merged_name).await
        } else {
            Ok(())
        };
        if let Err(e) = rewritten {
            tokio::fs::remove_file(self.dir.join(&staged)).await.ok();
            return Err(e);
        }

        tokio::fs::rename(self.dir.join(&staged), self.dir.join(&merged))
            .await
            .map_err(|e| {
                OrmError::Migration(format!("cannot move {staged} to {merged}: {e}"))
            })?;
        for migration in todo.iter().filter(|migration| **migration != merged_name) {
            let path = self.path(migration);
            tokio::fs::remove_file(&path).await.map_err(|e| {
                OrmError::Migration(format!(
                    "{merged} is in place but {} could not be removed: {e}",
                    path.display()
                ))
            })?;
        }

        tracing::info!(migration = %merged_name, merged = todo.len(), "migrations merged");
        Ok(merged_name)
    }

    /// Writes a new migration file and returns its name.
    ///
    /// With `module` the up and down sections create and drop the tables of
    /// the models registered in that module; otherwise the file is an empty
    /// template.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Migration`] for an invalid name, a module with
    /// no registered models, or when the file cannot be written.
    pub async fn create(&self, name: &str, module: Option<&str>) -> Result<String, OrmError> {
        if !script::is_valid_name(name) {
            return Err(OrmError::Migration(format!("invalid migration name: {name}")));
        }

        let script = match module {
            None => MigrationScript::default(),
            Some(module) => {
                let models = self.registry.list_module(module);
                if models.is_empty() {
                    return Err(OrmError::Migration(format!(
                        "no models found in module {module}"
                    )));
                }
                let dialect = self.database.dialect();
                let up: Vec<String> = models
                    .iter()
                    .map(|model| schema::create_table_sql(model, dialect))
                    .collect();
                let down: Vec<String> = models
                    .iter()
                    .rev()
                    .map(|model| schema::drop_table_sql(model))
                    .collect();
                MigrationScript::from_statements(&up, &down)
            }
        };

        let next = self
            .files()
            .await?
            .last()
            .map_or(1, |(number, _)| number + 1);
        let file = script::file_name(next, name);
        self.write(&file, &script).await?;

        let created = file.trim_end_matches(".sql").to_string();
        tracing::info!(migration = %created, auto = module.is_some(), "migration created");
        Ok(created)
    }

    async fn rewrite_history(&self, merged_name: &str) -> Result<(), OrmError> {
        let mut tx = self.database.begin().await?;
        let sql = format!("DELETE FROM {HISTORY_TABLE}");
        (&mut *tx)
            .execute(sql.as_str())
            .await
            .map_err(|e| OrmError::Migration(format!("cannot clear migration history: {e}")))?;
        self.record(&mut tx, merged_name).await?;
        commit(tx, merged_name).await
    }

    async fn files(&self) -> Result<Vec<(u32, String)>, OrmError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(&e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| self.io_error(&e))? {
            let file_name = entry.file_name();
            if let Some((number, name)) = file_name.to_str().and_then(script::parse_file_name) {
                files.push((number, name.to_string()));
            }
        }
        files.sort();
        Ok(files)
    }

    fn io_error(&self, e: &std::io::Error) -> OrmError {
        OrmError::Migration(format!("cannot read {}: {e}", self.dir.display()))
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.sql"))
    }

    async fn read(&self, name: &str) -> Result<MigrationScript, OrmError> {
        let path = self.path(name);
        let source = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| OrmError::Migration(format!("cannot read {}: {e}", path.display())))?;
        Ok(MigrationScript::parse(&source))
    }

    async fn write(&self, file: &str, script: &MigrationScript) -> Result<(), OrmError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| self.io_error(&e))?;
        let path = self.dir.join(file);
        tokio::fs::write(&path, script.render())
            .await
            .map_err(|e| OrmError::Migration(format!("cannot write {}: {e}", path.display())))
    }

    async fn ensure_history(&self) -> Result<(), OrmError> {
        let id = match self.database.dialect() {
            Dialect::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
            Dialect::Postgres => "SERIAL PRIMARY KEY",
        };
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {HISTORY_TABLE} \
             (id {id}, name VARCHAR(255) NOT NULL, migrated_at VARCHAR(64) NOT NULL)"
        );
        self.database
            .pool()
            .execute(sql.as_str())
            .await
            .map_err(|e| OrmError::Migration(format!("cannot create migration history: {e}")))?;
        Ok(())
    }

    async fn record(&self, tx: &mut Transaction<'static, Any>, name: &str) -> Result<(), OrmError> {
        let dialect = self.database.dialect();
        let sql = format!(
            "INSERT INTO {HISTORY_TABLE} (name, migrated_at) VALUES ({}, {})",
            dialect.placeholder(1),
            dialect.placeholder(2)
        );
        sqlx::query(&sql)
            .bind(name.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(&mut **tx)
            .await
            .map_err(|e| OrmError::Migration(format!("cannot record {name}: {e}")))?;
        Ok(())
    }

    async fn forget(&self, tx: &mut Transaction<'static, Any>, name: &str) -> Result<(), OrmError> {
        let sql = format!(
            "DELETE FROM {HISTORY_TABLE} WHERE name = {}",
            self.database.dialect().placeholder(1)
        );
        sqlx::query(&sql)
            .bind(name.to_string())
            .execute(&mut **tx)
            .await
            .map_err(|e| OrmError::Migration(format!("cannot forget {name}: {e}")))?;
        Ok(())
    }
}

async fn execute_all(
    tx: &mut Transaction<'static, Any>,
    migration: &str,
    statements: &[String],
) -> Result<(), OrmError> {
    for statement in statements {
        (&mut **tx)
            .execute(statement.as_str())
            .await
            .map_err(|e| OrmError::Migration(format!("migration {migration} failed: {e}")))?;
    }
    Ok(())
}

async fn commit(tx: Transaction<'static, Any>, migration: &str) -> Result<(), OrmError> {
    tx.commit()
        .await
        .map_err(|e| OrmError::Migration(format!("cannot commit {migration}: {e}")))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::db::{DatabaseOptions, DatabaseUrl};
    use crate::model::{Field, ModelDefinition};

    async fn router() -> (MigrationRouter, TempDir) {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir should be created");
        };
        let Ok(url) = DatabaseUrl::parse("sqlite://") else {
            panic!("memory url should parse");
        };
        let Ok(db) = Database::open(url, &DatabaseOptions::default()).await else {
            panic!("memory database should open");
        };
        let registry = ModelRegistry::new();
        registry.declare(
            ModelDefinition::builder("Puppy", "puppies.models")
                .field(Field::char("name"))
                .build(),
        );
        (MigrationRouter::new(db, registry, dir.path()), dir)
    }

    async fn table_exists(router: &MigrationRouter, table: &str) -> bool {
        let count: Result<i64, _> = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table.to_string())
        .fetch_one(router.database.pool())
        .await;
        count.ok() == Some(1)
    }

    async fn write(router: &MigrationRouter, file: &str, body: &str) {
        let written = tokio::fs::write(router.dir().join(file), body).await;
        assert!(written.is_ok());
    }

    #[tokio::test]
    async fn missing_directory_has_no_migrations() {
        let (router, _dir) = router().await;
        let router = MigrationRouter::new(
            router.database.clone(),
            router.registry.clone(),
            router.dir().join("absent"),
        );
        assert_eq!(router.todo().await.ok(), Some(Vec::new()));
        assert_eq!(router.diff().await.ok(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn create_auto_generates_from_module_models() {
        let (router, _dir) = router().await;
        assert_eq!(
            router.create("add_puppy", Some("puppies")).await.ok().as_deref(),
            Some("001_add_puppy")
        );
        assert_eq!(
            router.create("empty", None).await.ok().as_deref(),
            Some("002_empty")
        );
        assert_eq!(router.todo().await.ok(), Some(vec![
            "001_add_puppy".to_string(),
            "002_empty".to_string()
        ]));

        let Ok(script) = router.read("001_add_puppy").await else {
            panic!("generated migration should be readable");
        };
        assert!(script.up.contains("CREATE TABLE IF NOT EXISTS \"puppy\""));
        assert!(script.down.contains("DROP TABLE IF EXISTS \"puppy\""));

        let unknown = router.create("nothing", Some("kittens")).await;
        assert!(matches!(unknown, Err(OrmError::Migration(_))));
        let invalid = router.create("Bad Name", None).await;
        assert!(matches!(invalid, Err(OrmError::Migration(_))));
    }

    #[tokio::test]
    async fn run_and_rollback_follow_targets() {
        let (router, _dir) = router().await;
        write(&router, "001_a.sql", "-- migrate:up\nCREATE TABLE a (id INTEGER);\n-- migrate:down\nDROP TABLE a;").await;
        write(&router, "002_b.sql", "-- migrate:up\nCREATE TABLE b (id INTEGER);\n-- migrate:down\nDROP TABLE b;").await;
        write(&router, "003_c.sql", "-- migrate:up\nCREATE TABLE c (id INTEGER);\n-- migrate:down\nDROP TABLE c;").await;

        assert_eq!(router.run(Some("002_b"), false).await.ok().map(|v| v.len()), Some(2));
        assert!(table_exists(&router, "a").await);
        assert!(table_exists(&router, "b").await);
        assert!(!table_exists(&router, "c").await);
        assert_eq!(router.diff().await.ok(), Some(vec!["003_c".to_string()]));

        // already applied targets are a no-op, unknown ones an error
        assert_eq!(router.run(Some("001_a"), false).await.ok(), Some(Vec::new()));
        assert!(matches!(
            router.run(Some("009_zzz"), false).await,
            Err(OrmError::Migration(_))
        ));

        assert_eq!(router.run(None, false).await.ok().map(|v| v.len()), Some(1));
        assert_eq!(
            router.rollback(None).await.ok(),
            Some(vec!["003_c".to_string()])
        );
        assert!(!table_exists(&router, "c").await);

        assert_eq!(
            router.rollback(Some("001_a")).await.ok(),
            Some(vec!["002_b".to_string(), "001_a".to_string()])
        );
        assert!(!table_exists(&router, "a").await);
        assert_eq!(router.done().await.ok(), Some(Vec::new()));
        assert!(matches!(router.rollback(None).await, Err(OrmError::Migration(_))));
    }

    #[tokio::test]
    async fn fake_run_records_without_executing() {
        let (router, _dir) = router().await;
        write(&router, "001_a.sql", "CREATE TABLE a (id INTEGER);").await;

        assert!(router.run(None, true).await.is_ok());
        assert_eq!(router.done().await.ok(), Some(vec!["001_a".to_string()]));
        assert!(!table_exists(&router, "a").await);
    }

    #[tokio::test]
    async fn failing_migration_leaves_no_trace() {
        let (router, _dir) = router().await;
        write(&router, "001_a.sql", "CREATE TABLE a (id INTEGER);").await;
        write(&router, "002_bad.sql", "CREATE TABLE b (id INTEGER);\nNOT VALID SQL;").await;

        assert!(matches!(router.run(None, false).await, Err(OrmError::Migration(_))));
        assert_eq!(router.done().await.ok(), Some(vec!["001_a".to_string()]));
        assert!(table_exists(&router, "a").await);
        assert!(!table_exists(&router, "b").await);
    }

    #[tokio::test]
    async fn merge_collapses_applied_migrations() {
        let (router, _dir) = router().await;
        write(&router, "001_a.sql", "-- migrate:up\nCREATE TABLE a (id INTEGER);\n-- migrate:down\nDROP TABLE a;").await;
        write(&router, "002_b.sql", "-- migrate:up\nCREATE TABLE b (id INTEGER);\n-- migrate:down\nDROP TABLE b;").await;
        assert!(router.run(None, false).await.is_ok());

        assert_eq!(router.merge(None).await.ok().as_deref(), Some("001_initial"));
        assert_eq!(router.todo().await.ok(), Some(vec!["001_initial".to_string()]));
        assert_eq!(router.done().await.ok(), Some(vec!["001_initial".to_string()]));

        let Ok(script) = router.read("001_initial").await else {
            panic!("merged migration should be readable");
        };
        assert_eq!(
            script.down_statements(),
            ["DROP TABLE b", "DROP TABLE a"]
        );
    }

    #[tokio::test]
    async fn generated_defaults_with_semicolons_apply_and_merge() {
        let (router, _dir) = router().await;
        router.registry.declare(
            ModelDefinition::builder("Note", "notes.models")
                .field(Field::char("body").default("a;b"))
                .build(),
        );

        assert_eq!(
            router.create("auto", Some("notes.models")).await.ok().as_deref(),
            Some("001_auto")
        );
        let applied = router.run(None, false).await;
        assert!(applied.is_ok(), "generated migration should apply: {applied:?}");
        assert!(table_exists(&router, "note").await);

        assert!(router.merge(None).await.is_ok());
        assert!(router.rollback(None).await.is_ok());
        assert!(!table_exists(&router, "note").await);
    }

    #[tokio::test]
    async fn failed_merge_keeps_files_and_history() {
        let (router, _dir) = router().await;
        write(&router, "001_a.sql", "-- migrate:up\nCREATE TABLE a (id INTEGER);\n-- migrate:down\nDROP TABLE a;").await;
        write(&router, "002_b.sql", "-- migrate:up\nCREATE TABLE b (id INTEGER);\n-- migrate:down\nDROP TABLE b;").await;
        assert!(router.run(None, false).await.is_ok());

        // a directory where the merged file is staged makes the write fail
        let blocked = router.dir().join(".001_initial.sql.tmp");
        assert!(tokio::fs::create_dir(&blocked).await.is_ok());

        assert!(matches!(router.merge(None).await, Err(OrmError::Migration(_))));
        let expected = Some(vec!["001_a".to_string(), "002_b".to_string()]);
        assert_eq!(router.todo().await.ok(), expected);
        assert_eq!(router.done().await.ok(), expected);

        assert!(tokio::fs::remove_dir(&blocked).await.is_ok());
        assert_eq!(router.merge(None).await.ok().as_deref(), Some("001_initial"));
        assert!(!tokio::fs::try_exists(&blocked).await.unwrap_or(true));
    }

    #[tokio::test]
    async fn merge_into_an_existing_name() {
        let (router, _dir) = router().await;
        write(&router, "001_a.sql", "-- migrate:up\nCREATE TABLE a (id INTEGER);\n-- migrate:down\nDROP TABLE a;").await;
        write(&router, "002_b.sql", "-- migrate:up\nCREATE TABLE b (id INTEGER);\n-- migrate:down\nDROP TABLE b;").await;

        assert_eq!(router.merge(Some("a")).await.ok().as_deref(), Some("001_a"));
        assert_eq!(router.todo().await.ok(), Some(vec!["001_a".to_string()]));
        let Ok(script) = router.read("001_a").await else {
            panic!("merged migration should be readable");
        };
        assert_eq!(
            script.up_statements(),
            ["CREATE TABLE a (id INTEGER)", "CREATE TABLE b (id INTEGER)"]
        );
    }

    #[tokio::test]
    async fn merge_refuses_partial_state() {
        let (router, _dir) = router().await;
        assert!(matches!(router.merge(None).await, Err(OrmError::Migration(_))));

        write(&router, "001_a.sql", "CREATE TABLE a (id INTEGER);").await;
        write(&router, "002_b.sql", "CREATE TABLE b (id INTEGER);").await;
        assert!(router.run(Some("001_a"), false).await.is_ok());
        assert!(matches!(router.merge(Some("squashed")).await, Err(OrmError::Migration(_))));
        assert_eq!(router.todo().await.ok().map(|v| v.len()), Some(2));
    }
}
