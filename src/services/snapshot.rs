//! Snapshot persistence.
//!
//! Two interchangeable sinks behind one trait, selected by configuration:
//! pretty-printed JSON documents under the backup directory, or rows in the
//! local SQLite database. The file sink replaces whole documents per run;
//! the database sink inserts with no-op-on-conflict semantics, so a rerun
//! over an unchanged remote writes nothing new.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::db::pool::DbPool;
use crate::error::BackupError;
use crate::models::{pipeline, project, user, Pipeline, Project, User};

/// Destination for catalog snapshots.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Prepare the destination (directory, schema). Safe to call on every run.
    async fn init(&self) -> Result<(), BackupError>;

    /// Persist the full user catalog.
    async fn persist_users(&self, users: &[User]) -> Result<(), BackupError>;

    /// Persist the full project catalog.
    async fn persist_projects(&self, projects: &[Project]) -> Result<(), BackupError>;

    /// Persist one project's pipeline history.
    async fn persist_pipelines(
        &self,
        project: &Project,
        pipelines: &[Pipeline],
    ) -> Result<(), BackupError>;
}

/// JSON file sink: one document per catalog under `backup_dir`.
pub struct FileSink {
    backup_dir: PathBuf,
}

impl FileSink {
    pub fn new(backup_dir: PathBuf) -> Self {
        Self { backup_dir }
    }

    /// Serialize `records` and replace `backup_dir/<filename>` wholesale.
    fn write_document<T: serde::Serialize>(
        &self,
        records: &[T],
        filename: &str,
    ) -> Result<(), BackupError> {
        let body = serde_json::to_string_pretty(records)?;
        let path = self.backup_dir.join(filename);
        std::fs::write(&path, body).map_err(|e| {
            BackupError::persistence_for(
                format!("failed to write snapshot: {}", e),
                path.display().to_string(),
            )
        })
    }

    /// Snapshot file name for a project's pipelines. The namespace path is
    /// flattened so the document always lands directly in `backup_dir`.
    fn pipelines_filename(project: &Project) -> String {
        format!(
            "{}_{}_pipelines.json",
            project.namespace_path().replace('/', "_"),
            project.name
        )
    }
}

#[async_trait]
impl SnapshotSink for FileSink {
    async fn init(&self) -> Result<(), BackupError> {
        std::fs::create_dir_all(&self.backup_dir).map_err(|e| {
            BackupError::persistence_for(
                format!("failed to create backup directory: {}", e),
                self.backup_dir.display().to_string(),
            )
        })
    }

    async fn persist_users(&self, users: &[User]) -> Result<(), BackupError> {
        self.write_document(users, "users.json")
    }

    async fn persist_projects(&self, projects: &[Project]) -> Result<(), BackupError> {
        self.write_document(projects, "projects.json")
    }

    async fn persist_pipelines(
        &self,
        project: &Project,
        pipelines: &[Pipeline],
    ) -> Result<(), BackupError> {
        self.write_document(pipelines, &Self::pipelines_filename(project))
    }
}

/// SQLite sink: one row per entity, keyed by remote id.
///
/// Each catalog batch commits as a single transaction. A primary-key
/// conflict is routine (the row is skipped), never an error.
pub struct DatabaseSink {
    pool: DbPool,
}

impl DatabaseSink {
    /// Wrap an initialized pool (schema already migrated).
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotSink for DatabaseSink {
    async fn init(&self) -> Result<(), BackupError> {
        // Schema is created by db::initialize before the sink is built.
        Ok(())
    }

    async fn persist_users(&self, users: &[User]) -> Result<(), BackupError> {
        let mut tx = self.pool.begin().await?;
        let inserted = user::insert_users(&mut *tx, users).await?;
        tx.commit().await?;
        log::debug!("users batch: {} new of {}", inserted, users.len());
        Ok(())
    }

    async fn persist_projects(&self, projects: &[Project]) -> Result<(), BackupError> {
        let mut tx = self.pool.begin().await?;
        let inserted = project::insert_projects(&mut *tx, projects).await?;
        tx.commit().await?;
        log::debug!("projects batch: {} new of {}", inserted, projects.len());
        Ok(())
    }

    async fn persist_pipelines(
        &self,
        project: &Project,
        pipelines: &[Pipeline],
    ) -> Result<(), BackupError> {
        let mut tx = self.pool.begin().await?;
        let inserted = pipeline::insert_pipelines(&mut *tx, pipelines).await?;
        tx.commit().await?;
        log::debug!(
            "pipelines batch for {}: {} new of {}",
            project.slug(),
            inserted,
            pipelines.len()
        );
        Ok(())
    }
}

/// Fan-out sink for `--sink both`: persists to every inner sink in order.
pub struct CompositeSink {
    sinks: Vec<Box<dyn SnapshotSink>>,
}

impl CompositeSink {
    pub fn new(sinks: Vec<Box<dyn SnapshotSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl SnapshotSink for CompositeSink {
    async fn init(&self) -> Result<(), BackupError> {
        for sink in &self.sinks {
            sink.init().await?;
        }
        Ok(())
    }

    async fn persist_users(&self, users: &[User]) -> Result<(), BackupError> {
        for sink in &self.sinks {
            sink.persist_users(users).await?;
        }
        Ok(())
    }

    async fn persist_projects(&self, projects: &[Project]) -> Result<(), BackupError> {
        for sink in &self.sinks {
            sink.persist_projects(projects).await?;
        }
        Ok(())
    }

    async fn persist_pipelines(
        &self,
        project: &Project,
        pipelines: &[Pipeline],
    ) -> Result<(), BackupError> {
        for sink in &self.sinks {
            sink.persist_pipelines(project, pipelines).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::project::Namespace;
    use tempfile::tempdir;

    fn sample_user(id: i64, username: &str) -> User {
        User {
            id,
            username: username.to_string(),
            name: username.to_string(),
            state: "active".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    fn sample_project(id: i64, namespace: &str, name: &str) -> Project {
        Project {
            id,
            name: name.to_string(),
            namespace: Namespace {
                full_path: namespace.to_string(),
            },
            http_url_to_repo: format!("https://gitlab.example.com/{}/{}.git", namespace, name),
            created_at: None,
            updated_at: None,
        }
    }

    fn sample_pipeline(id: i64, project_id: i64) -> Pipeline {
        Pipeline {
            id,
            project_id,
            status: "success".to_string(),
            ref_name: "main".to_string(),
            sha: "a1b2c3".to_string(),
            web_url: format!("https://gitlab.example.com/-/pipelines/{}", id),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_file_sink_writes_documents() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path().to_path_buf());
        sink.init().await.unwrap();

        sink.persist_users(&[sample_user(1, "root")]).await.unwrap();

        let body = std::fs::read_to_string(dir.path().join("users.json")).unwrap();
        let parsed: Vec<User> = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].username, "root");
    }

    #[tokio::test]
    async fn test_file_sink_overwrite_is_byte_identical() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path().to_path_buf());
        sink.init().await.unwrap();

        let projects = vec![
            sample_project(1, "team", "api"),
            sample_project(2, "team", "web"),
        ];

        sink.persist_projects(&projects).await.unwrap();
        let first = std::fs::read(dir.path().join("projects.json")).unwrap();

        sink.persist_projects(&projects).await.unwrap();
        let second = std::fs::read(dir.path().join("projects.json")).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_file_sink_flattens_pipeline_namespace() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path().to_path_buf());
        sink.init().await.unwrap();

        let project = sample_project(42, "group/subgroup", "api");
        sink.persist_pipelines(&project, &[sample_pipeline(1, 42)])
            .await
            .unwrap();

        assert!(dir
            .path()
            .join("group_subgroup_api_pipelines.json")
            .exists());
    }

    #[tokio::test]
    async fn test_db_sink_conflict_is_a_no_op() {
        let dir = tempdir().unwrap();
        let pool = db::initialize(&dir.path().join("backup.db")).await.unwrap();
        let sink = DatabaseSink::new(pool.clone());

        sink.persist_users(&[sample_user(1, "alice")]).await.unwrap();

        // Same id, renamed on the remote: the second insert must not win.
        sink.persist_users(&[sample_user(1, "alice-renamed")])
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let stored = user::get_user(&pool, 1).await.unwrap().unwrap();
        assert_eq!(stored.username, "alice");
    }

    #[tokio::test]
    async fn test_db_sink_pipelines_reference_their_project() {
        let dir = tempdir().unwrap();
        let pool = db::initialize(&dir.path().join("backup.db")).await.unwrap();
        let sink = DatabaseSink::new(pool.clone());

        let project = sample_project(42, "team", "api");
        sink.persist_projects(&[project.clone()]).await.unwrap();
        sink.persist_pipelines(&project, &[sample_pipeline(1, 42), sample_pipeline(2, 42)])
            .await
            .unwrap();

        // Namespace is flattened to its full path in the row.
        let row = crate::models::project::get_project_row(&pool, 42)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row, ("api".to_string(), "team".to_string()));

        // Rerun inserts nothing new.
        sink.persist_pipelines(&project, &[sample_pipeline(1, 42), sample_pipeline(2, 42)])
            .await
            .unwrap();

        let count = pipeline::count_for_project(&pool, 42).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_composite_sink_writes_everywhere() {
        let dir = tempdir().unwrap();
        let pool = db::initialize(&dir.path().join("backup.db")).await.unwrap();

        let sink = CompositeSink::new(vec![
            Box::new(FileSink::new(dir.path().to_path_buf())),
            Box::new(DatabaseSink::new(pool.clone())),
        ]);
        sink.init().await.unwrap();

        sink.persist_users(&[sample_user(1, "root")]).await.unwrap();

        assert!(dir.path().join("users.json").exists());
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
