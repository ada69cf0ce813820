use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::models::{Endpoint, Project, User};

use super::Store;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_project(&self, id: Uuid) -> Result<Option<Project>, sqlx::Error> {
        db::projects::find_by_id(&self.pool, id).await
    }

    async fn find_owned_project(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Project>, sqlx::Error> {
        db::projects::find_by_id_scoped(&self.pool, id, owner_id).await
    }

    async fn list_projects(&self, owner_id: Uuid) -> Result<Vec<Project>, sqlx::Error> {
        db::projects::list_by_owner(&self.pool, owner_id).await
    }

    async fn create_project(
        &self,
        owner_id: Uuid,
        name: &str,
        spreadsheet_id: &str,
    ) -> Result<Project, sqlx::Error> {
        db::projects::create(&self.pool, owner_id, name, spreadsheet_id).await
    }

    async fn delete_project(&self, id: Uuid, owner_id: Uuid) -> Result<bool, sqlx::Error> {
        db::projects::delete(&self.pool, id, owner_id).await
    }

    async fn replace_endpoints(
        &self,
        id: Uuid,
        endpoints: &[Endpoint],
    ) -> Result<Project, sqlx::Error> {
        db::projects::replace_endpoints(&self.pool, id, endpoints).await
    }

    async fn set_protection(
        &self,
        id: Uuid,
        is_protected: bool,
        protection_token: &str,
    ) -> Result<Project, sqlx::Error> {
        db::projects::set_protection(&self.pool, id, is_protected, protection_token).await
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        db::users::find_by_id(&self.pool, id).await
    }

    async fn charge_user(&self, id: Uuid) -> Result<Option<i32>, sqlx::Error> {
        db::users::charge(&self.pool, id).await
    }

    async fn reset_quotas(
        &self,
        due_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        db::users::reset_quotas(&self.pool, due_before, now).await
    }
}
