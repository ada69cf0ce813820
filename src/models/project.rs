use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use super::Endpoint;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub spreadsheet_id: String,
    pub is_protected: bool,
    pub protection_token: String,
    pub endpoints: Json<Vec<Endpoint>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn endpoint(&self, endpoint_name: &str) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|e| e.endpoint_name == endpoint_name)
    }
}
