use std::sync::LazyLock;

use axum::extract::{Path, State};
use axum::Json;
use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::cache;
use crate::error::AppError;
use crate::models::{Endpoint, Project, User};
use crate::schema;
use crate::sheets::Credentials;
use crate::state::SharedState;

const PROTECTION_TOKEN_LEN: usize = 32;

static SPREADSHEET_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://docs\.google\.com/spreadsheets/d/([A-Za-z0-9_-]+)")
        .expect("spreadsheet URL pattern is valid")
});

#[derive(Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProtection {
    pub is_protected: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMethods {
    pub get: Option<bool>,
    pub get_one: Option<bool>,
    pub post: Option<bool>,
    pub put: Option<bool>,
    pub delete: Option<bool>,
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Project>>, AppError> {
    let projects = state.store.list_projects(auth.user_id).await?;
    Ok(Json(projects))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<CreateProject>,
) -> Result<Json<Project>, AppError> {
    let name = req.name.trim();
    if name.is_empty() || name.len() > 100 {
        return Err(AppError::InvalidInput(
            "Name must be between 1 and 100 characters".to_string(),
        ));
    }

    let spreadsheet_id = extract_spreadsheet_id(&req.url)
        .ok_or_else(|| AppError::InvalidInput("Invalid Google Sheet URI".to_string()))?;

    let owner = current_user(&state, &auth).await?;
    let project = state
        .store
        .create_project(owner.id, name, spreadsheet_id)
        .await?;

    tracing::info!("Project {} created by {}", project.id, owner.id);
    Ok(Json(project))
}

pub async fn get(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    let project = owned_project(&state, &auth, id).await?;
    Ok(Json(project))
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.store.delete_project(id, auth.user_id).await? {
        return Err(AppError::NotFound("Project not found".to_string()));
    }

    state.cache.invalidate_prefix(&cache::project_key(id));
    tracing::info!("Project {id} deleted");

    Ok(Json(json!({ "success": true, "message": "Project deleted" })))
}

/// Rebuild the endpoints from the spreadsheet with the owner's credentials.
pub async fn sync(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    let project = owned_project(&state, &auth, id).await?;
    let owner = current_user(&state, &auth).await?;
    let gateway = state.sheets.connect(Credentials::from(&owner));

    let updated = schema::resync(state.store.as_ref(), gateway.as_ref(), &project).await?;
    state.cache.invalidate_prefix(&cache::project_key(id));

    Ok(Json(updated))
}

pub async fn update_protection(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProtection>,
) -> Result<Json<Project>, AppError> {
    let project = owned_project(&state, &auth, id).await?;

    let token = if req.is_protected && project.protection_token.is_empty() {
        generate_token()
    } else {
        project.protection_token.clone()
    };

    let updated = state
        .store
        .set_protection(id, req.is_protected, &token)
        .await?;

    tracing::info!(
        "Project {id} protection {}",
        if req.is_protected { "enabled" } else { "disabled" }
    );
    Ok(Json(updated))
}

pub async fn update_methods(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path((id, endpoint_name)): Path<(Uuid, String)>,
    Json(req): Json<UpdateMethods>,
) -> Result<Json<Endpoint>, AppError> {
    let project = owned_project(&state, &auth, id).await?;

    let mut endpoints = project.endpoints.0;
    let endpoint = endpoints
        .iter_mut()
        .find(|e| e.endpoint_name == endpoint_name)
        .ok_or_else(|| AppError::NotFound("Endpoint not found".to_string()))?;

    let methods = &mut endpoint.methods;
    methods.get = req.get.unwrap_or(methods.get);
    methods.get_one = req.get_one.unwrap_or(methods.get_one);
    methods.post = req.post.unwrap_or(methods.post);
    methods.put = req.put.unwrap_or(methods.put);
    methods.delete = req.delete.unwrap_or(methods.delete);
    let endpoint = endpoint.clone();

    state.store.replace_endpoints(id, &endpoints).await?;

    Ok(Json(endpoint))
}

/// Spreadsheet id from a `https://docs.google.com/spreadsheets/d/<id>/...` URL.
pub fn extract_spreadsheet_id(url: &str) -> Option<&str> {
    SPREADSHEET_URL
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(PROTECTION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

async fn owned_project(state: &SharedState, auth: &AuthUser, id: Uuid) -> Result<Project, AppError> {
    state
        .store
        .find_owned_project(id, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
}

async fn current_user(state: &SharedState, auth: &AuthUser) -> Result<User, AppError> {
    state
        .store
        .find_user(auth.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unknown user".to_string()))
}
