//! Rebuilds a project's endpoints from the live tabs of its spreadsheet.

pub mod normalize;

use std::collections::HashMap;

use futures_util::future::try_join_all;

use crate::error::AppError;
use crate::models::{Endpoint, EndpointMethods, Project};
use crate::sheets::{GatewayError, SheetRange, SpreadsheetGateway};
use crate::store::Store;

pub use normalize::camel_case;

/// Derive one endpoint per tab that has a header row.
///
/// Tabs with a missing or blank header row are left out. Method flags of an
/// endpoint that already existed under the same name are carried over;
/// new endpoints start read-only. Any gateway failure aborts the whole sync.
pub async fn sync_endpoints(
    gateway: &dyn SpreadsheetGateway,
    spreadsheet_id: &str,
    previous: &[Endpoint],
) -> Result<Vec<Endpoint>, GatewayError> {
    let tabs = gateway.list_tabs(spreadsheet_id).await?;

    let headers = try_join_all(tabs.iter().map(|tab| async move {
        let rows = gateway
            .read_range(spreadsheet_id, &SheetRange::header(tab))
            .await?;
        Ok::<_, GatewayError>(rows.into_iter().next())
    }))
    .await?;

    let previous_methods: HashMap<&str, EndpointMethods> = previous
        .iter()
        .map(|e| (e.endpoint_name.as_str(), e.methods))
        .collect();

    let mut endpoints: Vec<Endpoint> = Vec::with_capacity(tabs.len());

    for (tab, header) in tabs.iter().zip(headers) {
        let Some(header) = header.filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
        else {
            tracing::debug!("Skipping tab '{tab}' without a header row");
            continue;
        };

        let endpoint_name = camel_case(tab);
        if endpoint_name.is_empty() {
            tracing::warn!("Skipping tab '{tab}': name has no usable characters");
            continue;
        }
        if endpoints.iter().any(|e| e.endpoint_name == endpoint_name) {
            tracing::warn!("Skipping tab '{tab}': endpoint '{endpoint_name}' already taken");
            continue;
        }

        let mut schema: Vec<String> = header.iter().map(|cell| camel_case(cell)).collect();
        while schema.last().is_some_and(|name| name.is_empty()) {
            schema.pop();
        }

        let methods = previous_methods
            .get(endpoint_name.as_str())
            .copied()
            .unwrap_or_default();

        endpoints.push(Endpoint {
            worksheet_name: tab.clone(),
            endpoint_name,
            schema,
            methods,
        });
    }

    Ok(endpoints)
}

/// Sync `project` against its spreadsheet and persist the new endpoint list.
/// Nothing is written when the spreadsheet cannot be read.
pub async fn resync(
    store: &dyn Store,
    gateway: &dyn SpreadsheetGateway,
    project: &Project,
) -> Result<Project, AppError> {
    let endpoints = sync_endpoints(gateway, &project.spreadsheet_id, &project.endpoints)
        .await
        .map_err(|e| {
            tracing::warn!("Sync of project {} failed: {e}", project.id);
            AppError::from(e)
        })?;

    let updated = store.replace_endpoints(project.id, &endpoints).await?;

    tracing::info!(
        "Synced project {} ({} endpoints)",
        project.id,
        updated.endpoints.len()
    );

    Ok(updated)
}
