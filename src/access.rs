//! Resolution of `(project, endpoint)` pairs for the data API and the checks
//! every call has to pass before touching the spreadsheet.

use std::sync::Arc;

use axum::http::Method;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Endpoint, Operation, Project, User};
use crate::quota::QUOTA_EXCEEDED_MESSAGE;
use crate::sheets::{Credentials, SheetsConnector, SpreadsheetGateway};
use crate::store::Store;

/// Everything a data API call needs once access is granted. The gateway is
/// bound to the project owner's credentials and belongs to this request only.
pub struct ResolvedEndpoint {
    pub project: Project,
    pub user: User,
    pub endpoint: Endpoint,
    pub gateway: Arc<dyn SpreadsheetGateway>,
}

/// Look up the endpoint and its owner, then check the protection token and
/// the owner's remaining quota.
pub async fn resolve(
    store: &dyn Store,
    sheets: &dyn SheetsConnector,
    project_id: &str,
    endpoint_name: &str,
    authorization: Option<&str>,
) -> Result<ResolvedEndpoint, AppError> {
    let project_id = Uuid::parse_str(project_id)
        .map_err(|_| AppError::NotFound("Project not found".to_string()))?;

    let project = store
        .find_project(project_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    let endpoint = project
        .endpoint(endpoint_name)
        .cloned()
        .ok_or_else(|| {
            AppError::NotFound("The endpoint you requested does not exist".to_string())
        })?;

    let user = store.find_user(project.owner_id).await?.ok_or_else(|| {
        tracing::error!(
            "Project {} references missing owner {}",
            project.id,
            project.owner_id
        );
        AppError::NotFound("Project owner not found".to_string())
    })?;

    check_protection(&project, authorization)?;

    if user.remaining_requests <= 0 {
        return Err(AppError::QuotaExceeded(QUOTA_EXCEEDED_MESSAGE.to_string()));
    }

    let gateway = sheets.connect(Credentials::from(&user));

    Ok(ResolvedEndpoint {
        project,
        user,
        endpoint,
        gateway,
    })
}

/// Protected projects require `Authorization: Bearer <token>` with the exact
/// project token.
pub fn check_protection(project: &Project, authorization: Option<&str>) -> Result<(), AppError> {
    if !project.is_protected {
        return Ok(());
    }

    let header = authorization
        .ok_or_else(|| AppError::Unauthorized("Missing protection token".to_string()))?;

    let token = header.strip_prefix("Bearer ").unwrap_or_default();
    let expected = project.protection_token.as_bytes();

    let matches = !expected.is_empty() && bool::from(token.as_bytes().ct_eq(expected));
    if !matches {
        return Err(AppError::Unauthorized("Invalid protection token".to_string()));
    }

    Ok(())
}

/// Map an HTTP verb and path shape to a record operation and check that the
/// endpoint has it enabled.
pub fn verify_method(
    endpoint: &Endpoint,
    method: &Method,
    has_item_id: bool,
) -> Result<Operation, AppError> {
    let operation = match (method.as_str(), has_item_id) {
        ("GET", false) => Operation::GetAll,
        ("GET", true) => Operation::GetOne,
        ("POST", false) => Operation::Create,
        ("PUT", true) => Operation::Update,
        ("DELETE", true) => Operation::Delete,
        ("POST" | "PUT" | "DELETE", _) => {
            let target = if has_item_id { "a record" } else { "a collection" };
            return Err(AppError::UnsupportedMethod(format!(
                "{method} is not supported on {target}"
            )));
        }
        _ => {
            return Err(AppError::UnsupportedMethod(format!(
                "{method} is not supported"
            )));
        }
    };

    if !endpoint.methods.allows(operation) {
        return Err(AppError::MethodDisabled(format!(
            "The {} method is disabled for this endpoint",
            operation.flag_name()
        )));
    }

    Ok(operation)
}
