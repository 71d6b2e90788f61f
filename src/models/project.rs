//! GitLab project model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Namespace a project lives under (group or user path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
    /// Hierarchical path, e.g. `group/subgroup`.
    pub full_path: String,
}

/// A project as returned by `GET /projects`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// GitLab project ID.
    pub id: i64,

    /// Short project name (e.g., "infra-tools").
    pub name: String,

    /// Owning namespace.
    pub namespace: Namespace,

    /// HTTP clone URL.
    pub http_url_to_repo: String,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Namespace path, e.g. `group/subgroup`.
    pub fn namespace_path(&self) -> &str {
        &self.namespace.full_path
    }

    /// Human-readable `namespace/name` label used in progress output.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.namespace.full_path, self.name)
    }
}

/// Insert a batch of projects, skipping rows whose id already exists.
///
/// The namespace is flattened to its full path; existing rows are never
/// updated. Returns the number of rows actually inserted.
pub async fn insert_projects(
    conn: &mut sqlx::SqliteConnection,
    projects: &[Project],
) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;
    for project in projects {
        let result = sqlx::query(
            "INSERT INTO projects (id, name, namespace, http_url_to_repo, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(project.id)
        .bind(&project.name)
        .bind(&project.namespace.full_path)
        .bind(&project.http_url_to_repo)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&mut *conn)
        .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

/// Look up a project's (name, namespace) row by id.
pub async fn get_project_row(
    pool: &sqlx::SqlitePool,
    project_id: i64,
) -> Result<Option<(String, String)>, sqlx::Error> {
    sqlx::query_as::<_, (String, String)>(
        "SELECT name, namespace FROM projects WHERE id = ?",
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await
}
