//! The public data API: one collection route and one item route per endpoint,
//! accepting any verb so gating and errors stay in one place.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::access::{self, ResolvedEndpoint};
use crate::cache;
use crate::config::CachePolicy;
use crate::error::AppError;
use crate::models::{Operation, QuotaInfo};
use crate::quota;
use crate::records::{self, WriteMode};
use crate::sheets::{SheetRange, FIRST_DATA_ROW};
use crate::state::SharedState;

const ID_BASE: u64 = FIRST_DATA_ROW as u64;

#[derive(Deserialize)]
pub struct DataParams {
    pub format: Option<String>,
}

impl DataParams {
    fn formatting(&self) -> bool {
        matches!(self.format.as_deref(), Some("true" | "1" | "yes"))
    }
}

pub async fn collection(
    State(state): State<SharedState>,
    Path((project_id, endpoint_name)): Path<(String, String)>,
    Query(params): Query<DataParams>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    handle(&state, &project_id, &endpoint_name, None, method, &headers, &params, &body).await
}

pub async fn item(
    State(state): State<SharedState>,
    Path((project_id, endpoint_name, item_id)): Path<(String, String, String)>,
    Query(params): Query<DataParams>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    handle(
        &state,
        &project_id,
        &endpoint_name,
        Some(&item_id),
        method,
        &headers,
        &params,
        &body,
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn handle(
    state: &SharedState,
    project_id: &str,
    endpoint_name: &str,
    item_id: Option<&str>,
    method: Method,
    headers: &HeaderMap,
    params: &DataParams,
    body: &Bytes,
) -> Result<Response, AppError> {
    let authorization = headers
        .get(AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default());

    let resolved = access::resolve(
        state.store.as_ref(),
        state.sheets.as_ref(),
        project_id,
        endpoint_name,
        authorization,
    )
    .await?;

    let operation = access::verify_method(&resolved.endpoint, &method, item_id.is_some())?;

    let item_id = item_id
        .map(|raw| records::parse_item_id(raw, ID_BASE))
        .transpose()?;

    tracing::debug!(
        "{method} {}/{} (item {:?})",
        resolved.project.id,
        resolved.endpoint.endpoint_name,
        item_id
    );

    match (operation, item_id) {
        (Operation::GetAll, _) => get_all(state, &resolved, params.formatting()).await,
        (Operation::GetOne, Some(id)) => get_one(state, &resolved, id, params.formatting()).await,
        (Operation::Create, _) => create(state, &resolved, body).await,
        (Operation::Update, Some(id)) => update(state, &resolved, id, body).await,
        (Operation::Delete, Some(id)) => delete(state, &resolved, id).await,
        _ => Err(AppError::InvalidInput("Missing item id".to_string())),
    }
}

async fn get_all(
    state: &SharedState,
    resolved: &ResolvedEndpoint,
    formatting: bool,
) -> Result<Response, AppError> {
    let ResolvedEndpoint {
        project, endpoint, ..
    } = resolved;
    let key = cache::collection_key(project.id, &endpoint.endpoint_name);
    let generation = state.cache.generation(&key);

    let (data, fresh) = match state.cache.get(&key) {
        Some(hit) => (hit, false),
        None => {
            let rows = resolved
                .gateway
                .read_range(
                    &project.spreadsheet_id,
                    &SheetRange::data(&endpoint.worksheet_name),
                )
                .await?;
            let records = records::rows_to_records(&rows, &endpoint.schema, ID_BASE);
            (
                Value::Array(records.into_iter().map(Value::Object).collect()),
                true,
            )
        }
    };

    let info = charge_read(state, resolved).await?;
    if fresh {
        store_read(state, key, &data, generation);
    }

    let data = if formatting { format_value(data) } else { data };
    Ok(respond(StatusCode::OK, Some(data), info))
}

async fn get_one(
    state: &SharedState,
    resolved: &ResolvedEndpoint,
    item_id: u64,
    formatting: bool,
) -> Result<Response, AppError> {
    let ResolvedEndpoint {
        project, endpoint, ..
    } = resolved;
    let key = cache::item_key(project.id, &endpoint.endpoint_name, item_id);
    let generation = state.cache.generation(&key);

    let (data, fresh) = match state.cache.get(&key) {
        Some(hit) => (hit, false),
        None => {
            let rows = resolved
                .gateway
                .read_range(
                    &project.spreadsheet_id,
                    &SheetRange::data(&endpoint.worksheet_name),
                )
                .await?;
            let record = records::record_at(&rows, &endpoint.schema, ID_BASE, item_id)?;
            (Value::Object(record), true)
        }
    };

    let info = charge_read(state, resolved).await?;
    if fresh {
        store_read(state, key, &data, generation);
    }

    let data = if formatting { format_value(data) } else { data };
    Ok(respond(StatusCode::OK, Some(data), info))
}

async fn create(
    state: &SharedState,
    resolved: &ResolvedEndpoint,
    body: &Bytes,
) -> Result<Response, AppError> {
    let ResolvedEndpoint {
        project, endpoint, ..
    } = resolved;
    let row: Vec<String> = records::record_to_row(&parse_body(body)?, &endpoint.schema, WriteMode::Create)?
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect();

    resolved
        .gateway
        .append_row(&project.spreadsheet_id, &endpoint.worksheet_name, &row)
        .await?;

    invalidate_collection(state, resolved);
    let info = charge_write(state, resolved).await;
    Ok(respond(StatusCode::CREATED, None, info))
}

async fn update(
    state: &SharedState,
    resolved: &ResolvedEndpoint,
    item_id: u64,
    body: &Bytes,
) -> Result<Response, AppError> {
    let ResolvedEndpoint {
        project, endpoint, ..
    } = resolved;
    let row = records::record_to_row(&parse_body(body)?, &endpoint.schema, WriteMode::Update)?;
    let sheet_row = existing_row(resolved, item_id).await?;

    resolved
        .gateway
        .update_row(
            &project.spreadsheet_id,
            &SheetRange::row(&endpoint.worksheet_name, sheet_row, Some(endpoint.schema.len())),
            &row,
        )
        .await?;

    invalidate_collection(state, resolved);
    let info = charge_write(state, resolved).await;
    Ok(respond(StatusCode::OK, None, info))
}

async fn delete(
    state: &SharedState,
    resolved: &ResolvedEndpoint,
    item_id: u64,
) -> Result<Response, AppError> {
    let ResolvedEndpoint {
        project, endpoint, ..
    } = resolved;
    let sheet_row = existing_row(resolved, item_id).await?;

    // Clearing keeps the row in place, so ids below it do not shift.
    resolved
        .gateway
        .clear_range(
            &project.spreadsheet_id,
            &SheetRange::row(&endpoint.worksheet_name, sheet_row, None),
        )
        .await?;

    invalidate_collection(state, resolved);
    let info = charge_write(state, resolved).await;
    Ok(respond(StatusCode::OK, None, info))
}

/// Sheet row of `item_id`, failing with NotFound when the row is blank or absent.
async fn existing_row(resolved: &ResolvedEndpoint, item_id: u64) -> Result<u32, AppError> {
    let not_found = || AppError::NotFound("Record not found".to_string());
    let sheet_row = u32::try_from(item_id).map_err(|_| not_found())?;

    let rows = resolved
        .gateway
        .read_range(
            &resolved.project.spreadsheet_id,
            &SheetRange::row(&resolved.endpoint.worksheet_name, sheet_row, None),
        )
        .await?;

    match rows.first() {
        Some(row) if !records::is_blank(row) => Ok(sheet_row),
        _ => Err(not_found()),
    }
}

fn parse_body(body: &Bytes) -> Result<Value, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidInput(format!("Malformed JSON body: {e}")))
}

/// A write that landed while the sheet was being read leaves `data` stale, so
/// it is only cached when no invalidation happened since `generation`.
fn store_read(state: &SharedState, key: String, data: &Value, generation: u64) {
    if !state.cache.put_if_unchanged(key.as_str(), data.clone(), generation) {
        tracing::debug!("Skipped caching {key}: invalidated during the read");
    }
}

fn invalidate_collection(state: &SharedState, resolved: &ResolvedEndpoint) {
    if state.config.cache == CachePolicy::InvalidateOnWrite {
        state.cache.invalidate_prefix(&cache::collection_key(
            resolved.project.id,
            &resolved.endpoint.endpoint_name,
        ));
    }
}

async fn charge_read(state: &SharedState, resolved: &ResolvedEndpoint) -> Result<QuotaInfo, AppError> {
    let remaining = quota::charge(state.store.as_ref(), resolved.user.id).await?;
    Ok(QuotaInfo {
        remaining_requests: remaining,
        ..resolved.user.quota_info()
    })
}

/// The write already reached the sheet, so a failed charge must not turn it
/// into an error response.
async fn charge_write(state: &SharedState, resolved: &ResolvedEndpoint) -> QuotaInfo {
    let user = &resolved.user;
    match quota::charge(state.store.as_ref(), user.id).await {
        Ok(remaining) => QuotaInfo {
            remaining_requests: remaining,
            ..user.quota_info()
        },
        Err(e) => {
            tracing::warn!("Could not charge user {} after a write: {e}", user.id);
            QuotaInfo {
                remaining_requests: (user.remaining_requests - 1).max(0),
                ..user.quota_info()
            }
        }
    }
}

fn format_value(data: Value) -> Value {
    match data {
        Value::Array(items) => Value::Array(items.into_iter().map(format_value).collect()),
        Value::Object(record) => Value::Object(records::format_record(record)),
        other => other,
    }
}

fn respond(status: StatusCode, data: Option<Value>, info: QuotaInfo) -> Response {
    let mut body = json!({ "success": true });
    if let Some(data) = data {
        body["data"] = data;
    }
    body["info"] = json!(info);
    (status, Json(body)).into_response()
}
