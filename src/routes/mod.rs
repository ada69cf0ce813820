pub mod account;
pub mod data;
pub mod projects;

use axum::routing::{any, get, post, put};
use axum::Router;

use crate::state::SharedState;

pub fn management_routes() -> Router<SharedState> {
    Router::new()
        .route("/v1/me", get(account::me))
        .route("/v1/projects", get(projects::list).post(projects::create))
        .route(
            "/v1/projects/{id}",
            get(projects::get).delete(projects::delete),
        )
        .route("/v1/projects/{id}/sync", post(projects::sync))
        .route("/v1/projects/{id}/protection", put(projects::update_protection))
        .route(
            "/v1/projects/{id}/endpoints/{endpoint_name}",
            put(projects::update_methods),
        )
}

pub fn data_routes() -> Router<SharedState> {
    Router::new()
        .route("/api/{project_id}/{endpoint_name}", any(data::collection))
        .route("/api/{project_id}/{endpoint_name}/{item_id}", any(data::item))
}
