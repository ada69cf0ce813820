use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::RETRY_AFTER;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;
use crate::state::SharedState;

/// Reject data API calls from clients that spent their window budget.
pub async fn limit_api(State(state): State<SharedState>, req: Request, next: Next) -> Response {
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::from([127, 0, 0, 1]));

    if let Err(retry_after) = state.api_limiter.check(ip) {
        tracing::debug!("Rate limited {ip}, retry after {retry_after}s");
        let mut response =
            AppError::RateLimited(format!("Too many requests. Retry after {retry_after}s"))
                .into_response();
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(retry_after));
        return response;
    }

    next.run(req).await
}
