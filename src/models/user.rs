//! GitLab user account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user account as returned by `GET /users`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// GitLab user ID.
    pub id: i64,

    /// Login name.
    pub username: String,

    /// Display name.
    pub name: String,

    /// Account state (`active`, `blocked`, ...).
    pub state: String,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert a batch of users, skipping rows whose id already exists.
///
/// Existing rows are never updated; a remote-side rename after the first
/// sync is intentionally not reflected. Returns the number of rows
/// actually inserted.
pub async fn insert_users(
    conn: &mut sqlx::SqliteConnection,
    users: &[User],
) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;
    for user in users {
        let result = sqlx::query(
            "INSERT INTO users (id, username, name, state, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.state)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *conn)
        .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

/// Look up a user by id.
pub async fn get_user(
    pool: &sqlx::SqlitePool,
    user_id: i64,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, name, state, created_at, updated_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}
