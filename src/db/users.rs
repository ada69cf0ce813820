use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::User;

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Decrement the remaining request counter. Returns the new value, or `None`
/// when the user has nothing left (or no longer exists).
pub async fn charge(pool: &PgPool, id: Uuid) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        "UPDATE users SET remaining_requests = remaining_requests - 1
         WHERE id = $1 AND remaining_requests > 0
         RETURNING remaining_requests",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Restore the full quota of every user whose last reset is at or before `due_before`.
/// With `due_before = now - 24h` this is `User::reset_due` evaluated in SQL.
pub async fn reset_quotas(
    pool: &PgPool,
    due_before: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET remaining_requests = daily_request_quota, last_reset = $2
         WHERE last_reset <= $1",
    )
    .bind(due_before)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
