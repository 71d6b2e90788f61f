//! GitLab pipeline model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A pipeline as returned by `GET /projects/:id/pipelines`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Pipeline {
    /// GitLab pipeline ID.
    pub id: i64,

    /// Owning project ID.
    pub project_id: i64,

    /// Pipeline status (`success`, `failed`, `running`, ...).
    pub status: String,

    /// Git ref the pipeline ran against.
    #[serde(rename = "ref")]
    #[sqlx(rename = "ref")]
    pub ref_name: String,

    /// Commit SHA.
    pub sha: String,

    /// Web URL of the pipeline page.
    pub web_url: String,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert a batch of pipelines, skipping rows whose id already exists.
///
/// Pipelines are insert-once: status changes on the remote after the first
/// sync are not reflected. Returns the number of rows actually inserted.
pub async fn insert_pipelines(
    conn: &mut sqlx::SqliteConnection,
    pipelines: &[Pipeline],
) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;
    for pipeline in pipelines {
        let result = sqlx::query(
            "INSERT INTO pipelines (id, project_id, ref, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(pipeline.id)
        .bind(pipeline.project_id)
        .bind(&pipeline.ref_name)
        .bind(&pipeline.status)
        .bind(pipeline.created_at)
        .bind(pipeline.updated_at)
        .execute(&mut *conn)
        .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

/// Count pipelines stored for a project.
pub async fn count_for_project(
    pool: &sqlx::SqlitePool,
    project_id: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM pipelines WHERE project_id = ?")
        .bind(project_id)
        .fetch_one(pool)
        .await
}
