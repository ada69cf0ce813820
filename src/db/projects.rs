use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Endpoint, Project};

pub async fn list_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        "SELECT * FROM projects WHERE owner_id = $1 ORDER BY created_at DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

pub async fn create(
    pool: &PgPool,
    owner_id: Uuid,
    name: &str,
    spreadsheet_id: &str,
) -> Result<Project, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        "INSERT INTO projects (owner_id, name, spreadsheet_id) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(owner_id)
    .bind(name)
    .bind(spreadsheet_id)
    .fetch_one(pool)
    .await
}

/// Unscoped lookup, used by the public data API.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Owner-scoped lookup for the management API.
pub async fn find_by_id_scoped(
    pool: &PgPool,
    id: Uuid,
    owner_id: Uuid,
) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await
}

/// Swap the whole embedded endpoint list in one statement.
pub async fn replace_endpoints(
    pool: &PgPool,
    id: Uuid,
    endpoints: &[Endpoint],
) -> Result<Project, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        "UPDATE projects SET endpoints = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(Json(endpoints))
    .fetch_one(pool)
    .await
}

pub async fn set_protection(
    pool: &PgPool,
    id: Uuid,
    is_protected: bool,
    protection_token: &str,
) -> Result<Project, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        "UPDATE projects SET is_protected = $2, protection_token = $3, updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(is_protected)
    .bind(protection_token)
    .fetch_one(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
