pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Endpoint, Project, User};

pub use postgres::PgStore;

/// Persistence seen by the engine. Production uses [`PgStore`]; anything that
/// keeps last-write-wins semantics per row can stand in for it.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_project(&self, id: Uuid) -> Result<Option<Project>, sqlx::Error>;

    async fn find_owned_project(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Project>, sqlx::Error>;

    async fn list_projects(&self, owner_id: Uuid) -> Result<Vec<Project>, sqlx::Error>;

    async fn create_project(
        &self,
        owner_id: Uuid,
        name: &str,
        spreadsheet_id: &str,
    ) -> Result<Project, sqlx::Error>;

    /// Returns false when no project with that id belongs to `owner_id`.
    async fn delete_project(&self, id: Uuid, owner_id: Uuid) -> Result<bool, sqlx::Error>;

    /// Replace the embedded endpoint list as a single write.
    async fn replace_endpoints(
        &self,
        id: Uuid,
        endpoints: &[Endpoint],
    ) -> Result<Project, sqlx::Error>;

    async fn set_protection(
        &self,
        id: Uuid,
        is_protected: bool,
        protection_token: &str,
    ) -> Result<Project, sqlx::Error>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error>;

    /// Atomically take one request from the user's quota. `None` means the
    /// quota was already exhausted; the counter never goes below zero.
    async fn charge_user(&self, id: Uuid) -> Result<Option<i32>, sqlx::Error>;

    /// Reset every user whose last reset happened at or before `due_before`.
    async fn reset_quotas(
        &self,
        due_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>;
}
