pub mod access;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod quota;
pub mod rate_limit;
pub mod records;
pub mod routes;
pub mod schema;
pub mod sheets;
pub mod state;
pub mod store;
pub mod worker;

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::middleware::rate_limit::limit_api;
use crate::rate_limit::ApiRateLimiter;
use crate::sheets::SheetsConnector;
use crate::state::{AppState, SharedState};
use crate::store::Store;

pub fn build_app(
    store: Arc<dyn Store>,
    sheets: Arc<dyn SheetsConnector>,
    config: Config,
) -> (Router, SharedState) {
    let state: SharedState = Arc::new(AppState {
        store,
        sheets,
        api_limiter: ApiRateLimiter::new(config.rate_limit, config.rate_limit_window),
        cache: ResponseCache::new(),
        config,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let data = routes::data_routes()
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), limit_api))
        .layer(cors);

    let app = Router::new()
        .merge(data)
        .merge(routes::management_routes())
        .route("/health", axum::routing::get(health))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (app, state)
}

async fn health() -> &'static str {
    "ok"
}
